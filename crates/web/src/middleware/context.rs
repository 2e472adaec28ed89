//! Render context (pipeline stage 5).

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::middleware::flash::{Flash, FlashCategory};
use crate::middleware::session::session_of;
use crate::models::Principal;

/// Values every rendered page receives, alongside its own data.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Logged-in principal, if any.
    pub current_user: Option<Principal>,
    /// Success notices drained for this response.
    pub success: Vec<String>,
    /// Error notices drained for this response.
    pub error: Vec<String>,
}

impl RenderContext {
    /// Username of the logged-in principal.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.current_user.as_ref().map(|p| p.username.as_str())
    }
}

impl<S> FromRequestParts<S> for RenderContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Stage 5: build the [`RenderContext`] once for the whole request.
///
/// Both flash queues are drained here, so handlers see the messages queued by
/// earlier requests and anything they queue themselves waits for the next
/// one. The context is also attached to the response, where the error
/// normalizer picks it up.
///
/// # Errors
///
/// Returns `AppError::Session` if the flash queues cannot be drained.
pub async fn populate_render_context(
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let flash = Flash::new(session_of(&request)?);
    let current_user = request
        .extensions()
        .get::<CurrentUser>()
        .and_then(|user| user.0.clone());

    let ctx = RenderContext {
        current_user,
        success: flash.drain(FlashCategory::Success).await?,
        error: flash.drain(FlashCategory::Error).await?,
    };

    request.extensions_mut().insert(ctx.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);

    Ok(response)
}
