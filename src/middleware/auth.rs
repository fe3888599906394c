use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::FromRequestParts;
use http::request::Parts;
use http::Request as HttpRequest;
use tower::{Layer, Service};
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::{Identity, IdentityGate};
use crate::models::Role;

/// Authenticated caller injected by the auth middleware into request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
    pub university: String,
}

impl From<Identity> for AuthenticatedUser {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            role: identity.role,
            university: identity.university,
        }
    }
}

/// Paths that never carry a credential
const PUBLIC_PATHS: &[&str] = &["/health"];

fn bearer_token<B>(req: &HttpRequest<B>) -> Option<&str> {
    req.headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[derive(Clone)]
pub struct AuthLayer {
    gate: Arc<dyn IdentityGate>,
}

impl AuthLayer {
    pub fn new(gate: Arc<dyn IdentityGate>) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            gate: self.gate.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    gate: Arc<dyn IdentityGate>,
}

impl<S, ReqBody> Service<HttpRequest<ReqBody>> for AuthMiddleware<S>
where
    S: Service<HttpRequest<ReqBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: HttpRequest<ReqBody>) -> Self::Future {
        let mut inner = self.inner.clone();
        std::mem::swap(&mut self.inner, &mut inner);

        let path = req.uri().path().to_string();
        if !PUBLIC_PATHS.iter().any(|p| path == *p) {
            let token = bearer_token(&req).map(str::to_string);
            if let Some(token) = token {
                match self.gate.authenticate(&token) {
                    Ok(identity) => {
                        req.extensions_mut()
                            .insert(AuthenticatedUser::from(identity));
                    }
                    Err(e) => {
                        tracing::debug!("Ignoring bearer token on {}: {}", path, e);
                    }
                }
            }
        }
        // No valid token: pass through. Handlers that need a caller reject with 401.

        Box::pin(async move { inner.call(req).await })
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("Not authenticated".to_string()))
    }
}
