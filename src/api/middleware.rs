/// Request helpers shared by the API handlers
use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use validator::Validate;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Run the request body's field validators
pub fn validate_body<T: Validate>(body: &T) -> ApiResult<()> {
    body.validate().map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        ApiError::Validation(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")), Some("abc.def".to_string()));
        assert_eq!(extract_bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer ")), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
