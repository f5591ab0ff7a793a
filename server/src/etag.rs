//! Conditional JSON responses with a weak body ETag.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sha2::{Digest, Sha256};

const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// Serialize `value`, tag it with `W/"<hex sha-256 of body>"`, and answer
/// 304 with no body when `If-None-Match` already carries that tag. `ETag`
/// and `Cache-Control` are set on both outcomes.
pub fn respond_with_cache<T: Serialize>(
    request_headers: &HeaderMap,
    value: &T,
    cache_control: &'static str,
) -> Response {
    let body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(err) => {
            tracing::error!(error = %err, "response serialization failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let tag = weak_etag(&body);
    let not_modified = request_headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|inm| inm == tag);

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&tag) {
        headers.insert(header::ETAG, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );

    if not_modified {
        return (StatusCode::NOT_MODIFIED, headers).into_response();
    }

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(CONTENT_TYPE_JSON),
    );
    (StatusCode::OK, headers, body).into_response()
}

fn weak_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("W/\"{}\"", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_bodies_produce_equal_tags() {
        assert_eq!(weak_etag(b"{\"a\":1}"), weak_etag(b"{\"a\":1}"));
        assert_ne!(weak_etag(b"{\"a\":1}"), weak_etag(b"{\"a\":2}"));
    }

    #[test]
    fn tags_are_weak_quoted_hex() {
        let tag = weak_etag(b"x");
        assert!(tag.starts_with("W/\""));
        assert!(tag.ends_with('"'));
        assert_eq!(tag.len(), "W/\"\"".len() + 64);
    }

    #[test]
    fn fresh_request_gets_a_full_response() {
        let response = respond_with_cache(&HeaderMap::new(), &42, "public, max-age=60");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::ETAG));
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "public, max-age=60"
        );
    }

    #[test]
    fn matching_if_none_match_gets_304() {
        let body = serde_json::to_vec(&42).unwrap();
        let tag = weak_etag(&body);

        let mut request_headers = HeaderMap::new();
        request_headers.insert(header::IF_NONE_MATCH, tag.parse().unwrap());

        let response = respond_with_cache(&request_headers, &42, "public, max-age=60");
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(
            response.headers().get(header::ETAG).unwrap().to_str().unwrap(),
            tag
        );
    }

    #[test]
    fn stale_if_none_match_gets_the_body() {
        let mut request_headers = HeaderMap::new();
        request_headers.insert(header::IF_NONE_MATCH, "W/\"stale\"".parse().unwrap());

        let response = respond_with_cache(&request_headers, &42, "public, max-age=15");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
