//! Wire DTOs and client-side domain snapshots.
//!
//! Field names follow the backend's camelCase JSON. Collections owned by the
//! backend (cart items, wishlist entries) carry a display-only `id` on the
//! wire; the stable key on the client is always `book.id`.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use paperback_core::{AddressId, BookId, Email, OrderId, Role, UserId, VendorId};

// =============================================================================
// Catalog
// =============================================================================

/// Read-only book summary owned by the remote catalog.
///
/// The cart and wishlist hold snapshots of this; they never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock_quantity: u32,
}

// =============================================================================
// Cart & Wishlist
// =============================================================================

/// A single cart line: one book and a positive quantity.
///
/// An entry with quantity 0 never exists; the store deletes it instead.
#[derive(Debug, Clone, PartialEq)]
pub struct CartEntry {
    pub book: Book,
    pub quantity: u32,
}

/// Cart line as the backend sends it.
///
/// The backend's row `id` is deserialized but ignored; `book.id` is the key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    #[serde(default)]
    pub id: Option<i64>,
    pub book: Book,
    pub quantity: u32,
}

impl From<CartItemDto> for CartEntry {
    fn from(dto: CartItemDto) -> Self {
        Self {
            book: dto.book,
            quantity: dto.quantity,
        }
    }
}

/// Wishlist entry as the backend sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItemDto {
    #[serde(default)]
    pub id: Option<i64>,
    pub book: Book,
}

// =============================================================================
// Session & Identity
// =============================================================================

/// Vendor-specific identity fields, present only for `Role::Vendor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorInfo {
    pub id: VendorId,
    pub business_name: String,
    /// Whether an admin has approved this vendor. Unapproved vendors are
    /// gated away from the vendor dashboard.
    pub approved: bool,
}

/// The authenticated identity held by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub vendor: Option<VendorInfo>,
}

impl Identity {
    /// Whether this identity is a vendor that has been approved.
    #[must_use]
    pub fn is_approved_vendor(&self) -> bool {
        self.role == Role::Vendor && self.vendor.as_ref().is_some_and(|v| v.approved)
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `data` payload of a successful `POST /auth/login`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub vendor_approved: Option<bool>,
}

/// `data` payload of `GET /auth/profile`.
///
/// Vendor fields are optional on the wire; absent means "not a vendor" or
/// "backend variant that omits them", both of which deserialize the same.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub vendor_approved: Option<bool>,
}

/// Body of the registration endpoints.
///
/// `business_name` is required by `POST /auth/register-vendor` and ignored
/// by the other registration endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// A single line of a placed order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub book: Book,
    pub quantity: u32,
    /// Unit price at the time the order was placed.
    pub price: Decimal,
}

/// A placed order as the backend reports it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub address_id: Option<AddressId>,
}
