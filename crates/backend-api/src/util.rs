use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::ApiError;

/// Legacy clients send the raw session token in a `token` header.
const TOKEN_HEADER: &str = "token";

/// Session token from `Authorization: Bearer <token>`, falling back to the
/// `token` header.
pub fn require_token(headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(value) = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
    {
        return parse_bearer(value);
    }

    let token = headers
        .get(TOKEN_HEADER)
        .and_then(|header| header.to_str().ok())
        .map(str::trim)
        .unwrap_or("");
    if token.is_empty() {
        return Err(ApiError::unauthorized("missing authorization header"));
    }

    Ok(token.to_string())
}

/// Bearer token if present, without failing the request.
pub fn optional_bearer(headers: &HeaderMap) -> Option<String> {
    require_token(headers).ok()
}

fn parse_bearer(value: &str) -> Result<String, ApiError> {
    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(ApiError::unauthorized("invalid authorization scheme"));
    }

    let token = parts.next().unwrap_or("");
    if token.is_empty() {
        return Err(ApiError::unauthorized("missing bearer token"));
    }

    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn require_token_extracts_bearer_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer TOKEN123"));

        let token = require_token(&headers).expect("token should be extracted");
        assert_eq!(token, "TOKEN123");
    }

    #[test]
    fn require_token_rejects_missing_bearer_value() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer"));

        let error = require_token(&headers).expect_err("should reject missing token");
        assert_eq!(error.status, axum::http::StatusCode::UNAUTHORIZED);
        assert!(error.message.contains("missing bearer token"));
    }

    #[test]
    fn require_token_accepts_token_header() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static(" abc "));

        assert_eq!(require_token(&headers).unwrap(), "abc");
    }

    #[test]
    fn require_token_rejects_empty_request() {
        let error = require_token(&HeaderMap::new()).expect_err("no credential");
        assert!(error.message.contains("missing authorization header"));
        assert!(optional_bearer(&HeaderMap::new()).is_none());
    }
}
