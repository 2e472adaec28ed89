//! Account route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::IntoResponse;

use crate::filters;
use crate::middleware::{RenderContext, RequireAuth};
use crate::models::Principal;

/// Account overview template.
#[derive(Template, WebTemplate)]
#[template(path = "account.html")]
pub struct AccountTemplate {
    pub ctx: RenderContext,
    pub user: Principal,
}

/// Display the account overview.
pub async fn index(RequireAuth(user): RequireAuth, ctx: RenderContext) -> impl IntoResponse {
    AccountTemplate { ctx, user }
}
