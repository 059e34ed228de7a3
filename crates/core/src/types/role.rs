//! User roles.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Role attached to an authenticated identity.
///
/// Serialized as the backend's uppercase strings (`"USER"`, `"VENDOR"`,
/// `"ADMIN"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Regular customer: browse, buy, wishlist.
    User,
    /// Vendor: manages their own catalog and fulfillment.
    Vendor,
    /// Admin: moderates vendors, books, and users.
    Admin,
}

impl Role {
    /// Returns the wire representation of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Vendor => "VENDOR",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
