//! User-scoped aggregate stores.
//!
//! Each store is a client-side cache of a server-owned collection, kept
//! consistent by re-fetching server truth after every mutation instead of
//! patching optimistically. All operations require an authenticated session
//! and fail fast locally without one.
//!
//! Mutations on the same aggregate are serialized: a new mutation waits for
//! the prior one's refresh to complete, so rapid repeated actions cannot
//! lose updates to response reordering.

mod cart;
mod orders;
mod wishlist;

pub use cart::CartStore;
pub use orders::OrderStore;
pub use wishlist::WishlistStore;
