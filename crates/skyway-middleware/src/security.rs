//! Security group evaluation.
//!
//! A requirement list is an OR of groups and each group is an AND of
//! schemes. Groups are tried in order; the first group whose schemes all
//! succeed admits the request. Each scheme is resolved once, when the
//! evaluator is built, into a concrete [`SchemeCheck`].
//!
//! Within a group a scheme fails softly when its credentials are absent or
//! malformed, or when the caller's handler answers `false`; evaluation then
//! moves to the next group. A handler error, an undefined scheme or a
//! scheme without a handler aborts the whole evaluation.

use std::future::Future;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::{HeaderMap, Method, Uri};
use indexmap::IndexMap;
use serde_json::Value;
use skyway_core::{
    ApiKeyLocation, SchemeKind, SecurityRequirement, SecurityScheme, SkywayError, SkywayResult,
};
use tracing::debug;

use crate::context::{Authenticated, MiddlewareContext};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// Credentials extracted for a scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Decoded `Authorization: Basic` pair.
    Basic {
        /// User name, before the first `:`.
        username: String,
        /// Password, after the first `:`.
        password: String,
    },
    /// The API key value.
    ApiKey(String),
    /// Scopes the requirement asks for.
    OAuth2 {
        /// Required scopes.
        scopes: Vec<String>,
    },
}

/// Everything a security handler gets to decide on.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Scheme name under `securityDefinitions`.
    pub scheme: String,
    /// Raw scheme definition.
    pub definition: Value,
    /// Extracted credentials.
    pub credentials: Credentials,
    /// Request method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
}

/// Caller-supplied check for one scheme.
///
/// `Ok(true)` accepts, `Ok(false)` fails the scheme, and `Err` aborts the
/// whole evaluation with that error.
pub trait SecurityHandler: Send + Sync + 'static {
    /// Decides whether the credentials are acceptable.
    fn authenticate(&self, auth: AuthContext) -> BoxFuture<'static, SkywayResult<bool>>;
}

impl<F, Fut> SecurityHandler for F
where
    F: Fn(AuthContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SkywayResult<bool>> + Send + 'static,
{
    fn authenticate(&self, auth: AuthContext) -> BoxFuture<'static, SkywayResult<bool>> {
        Box::pin(self(auth))
    }
}

/// Security handlers by scheme name.
pub type SecurityHandlers = IndexMap<String, Arc<dyn SecurityHandler>>;

/// One scheme of a group, resolved at build time.
#[derive(Clone)]
pub enum SchemeCheck {
    /// `Authorization: Basic` credentials.
    Basic {
        /// The scheme.
        scheme: SecurityScheme,
        /// Caller handler.
        handler: Arc<dyn SecurityHandler>,
    },
    /// Key from a query parameter or header.
    ApiKey {
        /// The scheme.
        scheme: SecurityScheme,
        /// Caller handler.
        handler: Arc<dyn SecurityHandler>,
        /// Parameter or header name.
        name: String,
        /// Where the key is read from.
        location: ApiKeyLocation,
    },
    /// Scopes handed straight to the handler.
    OAuth2 {
        /// The scheme.
        scheme: SecurityScheme,
        /// Caller handler.
        handler: Arc<dyn SecurityHandler>,
        /// Required scopes.
        scopes: Vec<String>,
    },
    /// Defined scheme with no registered handler.
    NotImplemented {
        /// Scheme name.
        name: String,
    },
    /// Scheme missing from `securityDefinitions`.
    NotDefined {
        /// Scheme name.
        name: String,
    },
}

impl std::fmt::Debug for SchemeCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (kind, name) = match self {
            Self::Basic { scheme, .. } => ("basic", scheme.name()),
            Self::ApiKey { scheme, .. } => ("apiKey", scheme.name()),
            Self::OAuth2 { scheme, .. } => ("oauth2", scheme.name()),
            Self::NotImplemented { name } => ("notImplemented", name.as_str()),
            Self::NotDefined { name } => ("notDefined", name.as_str()),
        };
        f.debug_tuple(kind).field(&name).finish()
    }
}

impl SchemeCheck {
    fn resolve(
        name: &str,
        scopes: &[String],
        definitions: &IndexMap<String, SecurityScheme>,
        handlers: &SecurityHandlers,
    ) -> Self {
        let Some(scheme) = definitions.get(name) else {
            return Self::NotDefined {
                name: name.to_string(),
            };
        };
        let Some(handler) = handlers.get(name) else {
            return Self::NotImplemented {
                name: name.to_string(),
            };
        };
        let scheme = scheme.clone();
        let handler = Arc::clone(handler);
        match scheme.kind().clone() {
            SchemeKind::Basic => Self::Basic { scheme, handler },
            SchemeKind::ApiKey { name, location } => Self::ApiKey {
                scheme,
                handler,
                name,
                location,
            },
            SchemeKind::OAuth2 => Self::OAuth2 {
                scheme,
                handler,
                scopes: scopes.to_vec(),
            },
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Basic { scheme, .. } | Self::ApiKey { scheme, .. } | Self::OAuth2 { scheme, .. } => {
                scheme.name()
            }
            Self::NotImplemented { name } | Self::NotDefined { name } => name,
        }
    }

    /// Runs the check. `Ok(false)` is a soft failure.
    async fn check(&self, request: &Request) -> SkywayResult<bool> {
        let (scheme, handler, credentials) = match self {
            Self::NotDefined { name } => return Err(SkywayError::scheme_not_defined(name)),
            Self::NotImplemented { name } => {
                debug!(scheme = %name, "no security handler registered");
                return Err(SkywayError::not_implemented(
                    "Authentication scheme not implemented",
                ));
            }
            Self::Basic { scheme, handler } => {
                let Some(credentials) = basic_credentials(request.headers()) else {
                    debug!(scheme = scheme.name(), "Invalid Credentials");
                    return Ok(false);
                };
                (scheme, handler, credentials)
            }
            Self::ApiKey {
                scheme,
                handler,
                name,
                location,
            } => {
                let Some(key) = api_key(request, name, *location) else {
                    debug!(scheme = scheme.name(), "Invalid API Key");
                    return Ok(false);
                };
                (scheme, handler, Credentials::ApiKey(key))
            }
            Self::OAuth2 {
                scheme,
                handler,
                scopes,
            } => (
                scheme,
                handler,
                Credentials::OAuth2 {
                    scopes: scopes.clone(),
                },
            ),
        };

        handler
            .authenticate(AuthContext {
                scheme: scheme.name().to_string(),
                definition: scheme.definition().clone(),
                credentials,
                method: request.method().clone(),
                uri: request.uri().clone(),
                headers: request.headers().clone(),
            })
            .await
    }
}

/// Decodes `Authorization: Basic <base64(user:pass)>`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    let (scheme, encoded) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials::Basic {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn api_key(request: &Request, name: &str, location: ApiKeyLocation) -> Option<String> {
    let value = match location {
        ApiKeyLocation::Header => request.headers().get(name)?.to_str().ok()?.to_string(),
        ApiKeyLocation::Query => {
            let pairs: Vec<(String, String)> =
                serde_urlencoded::from_str(request.uri().query()?).ok()?;
            pairs.into_iter().find(|(key, _)| key == name)?.1
        }
    };
    (!value.is_empty()).then_some(value)
}

/// OR-of-AND evaluator for one operation.
#[derive(Debug, Clone, Default)]
pub struct SecurityEvaluator {
    groups: Vec<Vec<SchemeCheck>>,
}

impl SecurityEvaluator {
    /// Resolves every requirement against the definitions and handlers.
    #[must_use]
    pub fn build(
        requirements: &[SecurityRequirement],
        definitions: &IndexMap<String, SecurityScheme>,
        handlers: &SecurityHandlers,
    ) -> Self {
        let groups = requirements
            .iter()
            .map(|requirement| {
                requirement
                    .iter()
                    .map(|(name, scopes)| SchemeCheck::resolve(name, scopes, definitions, handlers))
                    .collect()
            })
            .collect();
        Self { groups }
    }

    /// Whether no security is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The resolved groups.
    #[must_use]
    pub fn groups(&self) -> &[Vec<SchemeCheck>] {
        &self.groups
    }

    /// Evaluates the groups, returning the scheme names of the group that
    /// admitted the request.
    pub async fn evaluate(&self, request: &Request) -> SkywayResult<Vec<String>> {
        if self.groups.is_empty() {
            return Ok(Vec::new());
        }

        'groups: for (index, group) in self.groups.iter().enumerate() {
            for check in group {
                if !check.check(request).await? {
                    debug!(group = index, scheme = check.name(), "security group failed");
                    continue 'groups;
                }
            }
            return Ok(group.iter().map(|check| check.name().to_string()).collect());
        }

        Err(SkywayError::unauthorized("Unauthorized"))
    }
}

/// Chain stage running a [`SecurityEvaluator`].
#[derive(Debug, Clone)]
pub struct SecurityStage {
    evaluator: SecurityEvaluator,
}

impl SecurityStage {
    /// Wraps an evaluator. Returns `None` when nothing is required.
    #[must_use]
    pub fn new(evaluator: SecurityEvaluator) -> Option<Self> {
        (!evaluator.is_empty()).then_some(Self { evaluator })
    }
}

impl Middleware for SecurityStage {
    fn name(&self) -> &'static str {
        "security"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, SkywayResult<Response>> {
        Box::pin(async move {
            let schemes = self.evaluator.evaluate(&request).await?;
            debug!(request_id = %ctx.request_id(), schemes = ?schemes, "request authenticated");
            ctx.set_extension(Authenticated(schemes));
            next.run(ctx, request).await
        })
    }
}
