//! Shared newtype wrappers and domain enums.

mod email;
mod id;
mod money;
mod role;

pub use email::{Email, EmailError};
pub use id::{AddressId, BookId, OrderId, UserId, VendorId};
pub use money::{format_money, line_total, round_money};
pub use role::Role;
