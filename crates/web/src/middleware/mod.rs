//! The request pipeline.
//!
//! # Stage Order (outermost first)
//!
//! 0. Sentry, `TraceLayer`, request ID (observability, wrap everything)
//! 1. Body decoding - form payloads become [`FormFields`]
//! 2. Method override - `_method` rewrites the verb of a `POST`
//! 3. Session resolution - tower-sessions layer, then [`touch_session`].
//!    [`restore_failure_status`] and [`park_failure_status`] wrap the layer
//!    so failed requests are saved too
//! 4. Authentication resolution - [`resolve_principal`] attaches [`CurrentUser`]
//! 5. Flash resolution - [`populate_render_context`] drains the flash queues
//!    into the [`RenderContext`]
//! 6. Static assets - `ServeDir` answers file-matching paths
//! 7. Route dispatch
//! 8. Not-found fallback
//! 9. Error normalizer - [`crate::error::normalize_errors`]
//!
//! The normalizer sits just inside the observability layers so that a failure
//! raised by any stage, including a panic caught by `CatchPanicLayer`, is
//! rendered the same way. See [`crate::app::build_router`] for the wiring.

pub mod auth;
pub mod context;
pub mod flash;
pub mod form;
pub mod request_id;
pub mod session;

pub use auth::{CurrentUser, RequireAuth, login, logout, resolve_principal, start_session};
pub use context::{RenderContext, populate_render_context};
pub use flash::{Flash, FlashCategory};
pub use form::{FormFields, decode_form, method_override};
pub use request_id::request_id_middleware;
pub use session::{
    SESSION_COOKIE_NAME, create_session_layer, park_failure_status, restore_failure_status,
    touch_session,
};
