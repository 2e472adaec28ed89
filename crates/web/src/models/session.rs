//! Session-related types.
//!
//! Everything the pipeline keeps in a session record is addressed by one of
//! these keys. Flash queues use [`crate::middleware::FlashCategory::session_key`].

/// Session keys for authentication and bookkeeping data.
pub mod keys {
    /// Serialized principal token of the logged-in user.
    pub const USER_TOKEN: &str = "auth.user";

    /// Path to return to after a login forced by `RequireAuth`.
    pub const RETURN_TO: &str = "auth.return_to";

    /// Unix timestamp (seconds) of the last time the record was refreshed.
    pub const TOUCHED_AT: &str = "session.touched_at";
}
