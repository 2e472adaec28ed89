//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::IntoResponse;

use crate::filters;
use crate::middleware::RenderContext;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub ctx: RenderContext,
}

/// Display the home page.
pub async fn home(ctx: RenderContext) -> impl IntoResponse {
    HomeTemplate { ctx }
}
