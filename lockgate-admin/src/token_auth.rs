use poem::http::StatusCode;
use poem::{Endpoint, Middleware, Request};
use lockgate_common::Secret;

pub const TOKEN_HEADER: &str = "x-lockgate-token";

/// Rejects requests without the configured admin token. With no token
/// configured the API is open; `LockgateConfig::validate` warns about that
/// unless the listener is loopback-only.
pub struct TokenAuthMiddleware {
    token: Option<Secret<String>>,
}

impl TokenAuthMiddleware {
    pub fn new(token: Option<Secret<String>>) -> Self {
        TokenAuthMiddleware { token }
    }
}

pub struct TokenAuthEndpoint<E: Endpoint> {
    inner: E,
    token: Option<Secret<String>>,
}

impl<E: Endpoint> Middleware<E> for TokenAuthMiddleware {
    type Output = TokenAuthEndpoint<E>;

    fn transform(&self, inner: E) -> Self::Output {
        TokenAuthEndpoint {
            inner,
            token: self.token.clone(),
        }
    }
}

impl<E: Endpoint> Endpoint for TokenAuthEndpoint<E> {
    type Output = E::Output;

    async fn call(&self, req: Request) -> poem::Result<Self::Output> {
        if let Some(token) = &self.token {
            let provided = req
                .headers()
                .get(TOKEN_HEADER)
                .and_then(|v| v.to_str().ok());
            if provided != Some(token.expose_secret().as_str()) {
                return Err(poem::Error::from_status(StatusCode::UNAUTHORIZED));
            }
        }
        self.inner.call(req).await
    }
}
