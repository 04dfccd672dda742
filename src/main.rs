/// PBMap auth service binary
use pbmap_auth::{
    config::{LoggingConfig, ServerConfig},
    context::AppContext,
    error::ApiResult,
    jobs, server,
};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = ServerConfig::from_env()?;

    init_tracing(&config.logging);

    print_banner();

    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.level.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn print_banner() {
    println!(
        r#"
    ____  ____  __  ___
   / __ \/ __ )/  |/  /___ _____
  / /_/ / __  / /|_/ / __ `/ __ \
 / ____/ /_/ / /  / / /_/ / /_/ /
/_/   /_____/_/  /_/\__,_/ .___/
                        /_/
        PBMap auth service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
