//! User domain types.

use secrecy::SecretString;

use lantern_core::{UserId, Username};

/// The authenticated user attached to a request.
///
/// The credential hash never leaves the crate: it has no public accessor,
/// is redacted from `Debug` output, and is never serialized into a session.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Stable identifier; its string form is the session token.
    pub id: UserId,
    /// Login name.
    pub username: Username,
    password_hash: SecretString,
}

impl Principal {
    /// Create a principal from its stored parts.
    #[must_use]
    pub const fn new(id: UserId, username: Username, password_hash: SecretString) -> Self {
        Self {
            id,
            username,
            password_hash,
        }
    }

    /// The stored argon2 PHC string.
    pub(crate) const fn password_hash(&self) -> &SecretString {
        &self.password_hash
    }
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.username == other.username
    }
}

impl Eq for Principal {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_hash() {
        let principal = Principal::new(
            UserId::new(1),
            Username::parse("ada").unwrap(),
            SecretString::from("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"),
        );
        let debug_output = format!("{principal:?}");
        assert!(debug_output.contains("ada"));
        assert!(!debug_output.contains("argon2id"));
    }
}
