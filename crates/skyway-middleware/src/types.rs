//! Request and response types shared by every stage.

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;

/// Request type flowing through a chain.
pub type Request = http::Request<Full<Bytes>>;

/// Response type produced by a chain.
pub type Response = http::Response<Full<Bytes>>;

/// Constructors for the responses stages and handlers commonly build.
pub trait ResponseExt {
    /// An empty response with the given status.
    fn empty(status: StatusCode) -> Response;

    /// A JSON response. Serialization failures yield an empty 500.
    fn json<T: Serialize>(status: StatusCode, body: &T) -> Response;
}

impl ResponseExt for Response {
    fn empty(status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }

    fn json<T: Serialize>(status: StatusCode, body: &T) -> Response {
        let Ok(bytes) = serde_json::to_vec(body) else {
            return Self::empty(StatusCode::INTERNAL_SERVER_ERROR);
        };
        let mut response = http::Response::new(Full::new(Bytes::from(bytes)));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response() {
        let response = Response::json(StatusCode::CREATED, &serde_json::json!({ "id": 1 }));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_empty_response() {
        let response = Response::empty(StatusCode::NO_CONTENT);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().is_empty());
    }
}
