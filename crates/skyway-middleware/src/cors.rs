//! CORS headers and preflight responses.
//!
//! Options come in layers, each a JSON object: the root options given to
//! the API instance, then `x-cors-options` on the document, the path item
//! and the operation. Later layers override earlier ones key by key.
//! Preflight responses use the layers up to the path item; actual requests
//! also apply the operation layer.
//!
//! ## Options
//!
//! - `origin`: `"*"` (default), `true` to reflect the request origin,
//!   `false` to disable CORS, a fixed origin, or a list of allowed origins.
//! - `allowedHeaders`: list or comma separated string. When absent, the
//!   preflight reflects `Access-Control-Request-Headers`.
//! - `exposedHeaders`: list or comma separated string.
//! - `credentials`: send `Access-Control-Allow-Credentials: true`.
//! - `maxAge`: preflight cache lifetime in seconds.
//!
//! `Access-Control-Allow-Methods` is always the path's declared methods
//! plus `OPTIONS`.

use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use skyway_core::SkywayResult;

use crate::context::{CorsHeaders, MiddlewareContext};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Expose-Headers` header.
    pub const EXPOSE_HEADERS: &str = "access-control-expose-headers";
    /// `Access-Control-Request-Headers` header (preflight).
    pub const REQUEST_HEADERS: &str = "access-control-request-headers";
    /// `Origin` header.
    pub const ORIGIN: &str = "origin";
}

/// Which origins may read the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// `true` reflects the request origin, `false` disables CORS.
    Flag(bool),
    /// A fixed origin, or `*`.
    Fixed(String),
    /// Origins reflected when the request comes from one of them.
    List(Vec<String>),
}

impl Default for CorsOrigin {
    fn default() -> Self {
        Self::Fixed("*".to_string())
    }
}

impl CorsOrigin {
    /// `Access-Control-Allow-Origin` value for a request, and whether the
    /// response varies by origin.
    fn resolve(&self, request_origin: Option<&str>) -> (Option<String>, bool) {
        match self {
            Self::Flag(false) => (None, false),
            Self::Flag(true) => (request_origin.map(ToString::to_string), true),
            Self::Fixed(origin) if origin == "*" => (Some(origin.clone()), false),
            Self::Fixed(origin) => (Some(origin.clone()), true),
            Self::List(origins) => (
                request_origin
                    .filter(|origin| origins.iter().any(|allowed| allowed == origin))
                    .map(ToString::to_string),
                true,
            ),
        }
    }
}

/// Header names given as a list or as one comma separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderList {
    /// `"a, b"`.
    Joined(String),
    /// `["a", "b"]`.
    List(Vec<String>),
}

impl HeaderList {
    fn joined(&self) -> String {
        match self {
            Self::Joined(joined) => joined.clone(),
            Self::List(list) => list.join(","),
        }
    }
}

/// Merged CORS options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsOptions {
    /// Allowed origins.
    #[serde(default)]
    pub origin: CorsOrigin,
    /// Headers a preflight allows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_headers: Option<HeaderList>,
    /// Headers exposed to scripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposed_headers: Option<HeaderList>,
    /// Whether credentials are allowed.
    #[serde(default)]
    pub credentials: bool,
    /// Preflight cache lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
}

impl CorsOptions {
    /// Merges option layers, later keys winning, and reads the result.
    ///
    /// Every layer must be a JSON object.
    pub fn from_layers<'v, I>(layers: I) -> Result<Self, serde_json::Error>
    where
        I: IntoIterator<Item = &'v Value>,
    {
        let mut merged = Map::new();
        for layer in layers {
            let Value::Object(options) = layer else {
                return Err(serde::de::Error::custom(format!(
                    "CORS options must be an object, got {layer}"
                )));
            };
            merged.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        serde_json::from_value(Value::Object(merged))
    }
}

/// CORS behaviour for one path or operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    options: CorsOptions,
    allow_methods: String,
}

impl CorsPolicy {
    /// Creates a policy. `allow_methods` is the comma separated method list.
    #[must_use]
    pub fn new(options: CorsOptions, allow_methods: impl Into<String>) -> Self {
        Self {
            options,
            allow_methods: allow_methods.into(),
        }
    }

    /// The merged options.
    #[must_use]
    pub fn options(&self) -> &CorsOptions {
        &self.options
    }

    /// Whether any header is ever emitted.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.options.origin != CorsOrigin::Flag(false)
    }

    /// Headers for an actual (non-preflight) request.
    #[must_use]
    pub fn response_headers(&self, request: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();
        if !self.is_enabled() {
            return out;
        }
        self.origin_headers(request, &mut out);
        if let Some(exposed) = &self.options.exposed_headers {
            insert(&mut out, headers::EXPOSE_HEADERS, &exposed.joined());
        }
        out
    }

    /// Headers for a preflight request.
    #[must_use]
    pub fn preflight_headers(&self, request: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();
        if !self.is_enabled() {
            return out;
        }
        self.origin_headers(request, &mut out);
        insert(&mut out, headers::ALLOW_METHODS, &self.allow_methods);

        match &self.options.allowed_headers {
            Some(allowed) => insert(&mut out, headers::ALLOW_HEADERS, &allowed.joined()),
            None => {
                if let Some(requested) = request.get(headers::REQUEST_HEADERS) {
                    out.insert(headers::ALLOW_HEADERS, requested.clone());
                }
                out.append(
                    header::VARY,
                    HeaderValue::from_static("Access-Control-Request-Headers"),
                );
            }
        }

        if let Some(max_age) = self.options.max_age {
            insert(&mut out, headers::MAX_AGE, &max_age.to_string());
        }
        out
    }

    /// A `204 No Content` preflight answer carrying `allow` and the
    /// preflight headers.
    #[must_use]
    pub fn preflight_response(&self, request: &HeaderMap, allow: &str) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::NO_CONTENT;
        insert(response.headers_mut(), header::ALLOW.as_str(), allow);
        apply_headers(&self.preflight_headers(request), response.headers_mut());
        response
    }

    fn origin_headers(&self, request: &HeaderMap, out: &mut HeaderMap) {
        let request_origin = request
            .get(headers::ORIGIN)
            .and_then(|value| value.to_str().ok());
        let (origin, vary) = self.options.origin.resolve(request_origin);
        if let Some(origin) = origin {
            insert(out, headers::ALLOW_ORIGIN, &origin);
        }
        if vary {
            out.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        if self.options.credentials {
            out.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
    }
}

fn insert(out: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
        out.insert(name, value);
    }
}

/// Copies CORS headers onto a response. `Vary` values are appended, the
/// rest replace what is there.
pub fn apply_headers(cors: &HeaderMap, target: &mut HeaderMap) {
    for (name, value) in cors {
        if name == header::VARY {
            target.append(name.clone(), value.clone());
        } else {
            target.insert(name.clone(), value.clone());
        }
    }
}

/// Chain stage adding CORS headers to the operation's responses.
///
/// The headers are also stored as [`CorsHeaders`] so the error handler can
/// add them to failure responses.
#[derive(Debug, Clone)]
pub struct CorsStage {
    policy: CorsPolicy,
}

impl CorsStage {
    /// Wraps a policy.
    #[must_use]
    pub fn new(policy: CorsPolicy) -> Self {
        Self { policy }
    }
}

impl Middleware for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, SkywayResult<Response>> {
        Box::pin(async move {
            let cors = self.policy.response_headers(request.headers());
            ctx.set_extension(CorsHeaders(cors.clone()));

            let mut response = next.run(ctx, request).await?;
            apply_headers(&cors, response.headers_mut());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseExt;
    use serde_json::json;
    use skyway_core::SkywayError;

    fn policy(layers: &[Value]) -> CorsPolicy {
        CorsPolicy::new(CorsOptions::from_layers(layers).unwrap(), "GET,POST,OPTIONS")
    }

    fn request_headers(pairs: &[(&str, &str)]) -> HeaderMap {
        pairs
            .iter()
            .map(|(k, v)| (HeaderName::try_from(*k).unwrap(), HeaderValue::from_str(v).unwrap()))
            .collect()
    }

    #[test]
    fn test_layers_override_in_order() {
        let options = CorsOptions::from_layers(&[
            json!({ "origin": "https://a.example", "maxAge": 60 }),
            json!({ "credentials": true }),
            json!({ "origin": ["https://b.example"] }),
        ])
        .unwrap();
        assert_eq!(options.origin, CorsOrigin::List(vec!["https://b.example".to_string()]));
        assert!(options.credentials);
        assert_eq!(options.max_age, Some(60));

        assert!(CorsOptions::from_layers(&[json!(true)]).is_err());
        let none: [Value; 0] = [];
        assert_eq!(CorsOptions::from_layers(&none).unwrap(), CorsOptions::default());
    }

    #[test]
    fn test_default_origin_is_wildcard() {
        let headers = policy(&[]).response_headers(&request_headers(&[("origin", "https://x")]));
        assert_eq!(headers[headers::ALLOW_ORIGIN], "*");
        assert!(headers.get(header::VARY).is_none());
    }

    #[test]
    fn test_origin_variants() {
        let from = request_headers(&[("origin", "https://b.example")]);

        let reflected = policy(&[json!({ "origin": true })]).response_headers(&from);
        assert_eq!(reflected[headers::ALLOW_ORIGIN], "https://b.example");
        assert_eq!(reflected[header::VARY], "Origin");

        let listed = policy(&[json!({ "origin": ["https://a.example"] })]).response_headers(&from);
        assert!(listed.get(headers::ALLOW_ORIGIN).is_none());
        assert_eq!(listed[header::VARY], "Origin");

        let disabled = policy(&[json!({ "origin": false, "credentials": true })]);
        assert!(!disabled.is_enabled());
        assert!(disabled.response_headers(&from).is_empty());
    }

    #[test]
    fn test_preflight_headers() {
        let preflight = policy(&[json!({ "maxAge": 600, "credentials": true })]);
        let response = preflight.preflight_response(
            &request_headers(&[("origin", "https://x"), ("access-control-request-headers", "x-api-key")]),
            "GET,POST,OPTIONS",
        );
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::ALLOW], "GET,POST,OPTIONS");
        assert_eq!(headers[headers::ALLOW_METHODS], "GET,POST,OPTIONS");
        assert_eq!(headers[headers::ALLOW_HEADERS], "x-api-key");
        assert_eq!(headers[headers::ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[headers::MAX_AGE], "600");

        let fixed = policy(&[json!({ "allowedHeaders": ["content-type", "x-api-key"] })]);
        let headers = fixed.preflight_headers(&HeaderMap::new());
        assert_eq!(headers[headers::ALLOW_HEADERS], "content-type,x-api-key");
    }

    #[tokio::test]
    async fn test_stage_decorates_responses_and_records_headers() {
        let stage = CorsStage::new(policy(&[json!({ "exposedHeaders": "x-request-id" })]));
        let request = http::Request::builder()
            .header("origin", "https://x")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let mut ctx = MiddlewareContext::new();
        let next = Next::terminal(|_ctx, _req| {
            Box::pin(async { Ok(Response::empty(StatusCode::OK)) })
        });
        let response = stage.process(&mut ctx, request, next).await.unwrap();
        assert_eq!(response.headers()[headers::ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[headers::EXPOSE_HEADERS], "x-request-id");

        let request = http::Request::new(Full::new(Bytes::new()));
        let mut ctx = MiddlewareContext::new();
        let next = Next::terminal(|_ctx, _req| Box::pin(async { Err(SkywayError::NotFound) }));
        assert!(stage.process(&mut ctx, request, next).await.is_err());
        assert!(ctx.get_extension::<CorsHeaders>().is_some());
    }
}
