/// PBMap auth service
///
/// Social login (Google, LINE), JWT app tokens revocable through a token
/// cache, and device-bound refresh-token sessions stored in SQLite.

pub mod account;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod identity;
pub mod jobs;
pub mod jwt;
pub mod server;
