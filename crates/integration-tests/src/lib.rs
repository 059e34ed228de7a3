//! Test harness for the Paperback client.
//!
//! Runs an in-process fake of the bookstore REST backend (same envelope,
//! same endpoints, in-memory state) and wires a full [`AppState`] against
//! it over a real HTTP socket. Tests drive the client exactly as a UI
//! layer would and assert on the state it exposes.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::significant_drop_tightening,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Json;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use paperback_client::config::ClientConfig;
use paperback_client::state::AppState;
use paperback_client::storage::{CredentialStore, MemoryCredentialStore};

// =============================================================================
// Fixtures
// =============================================================================

/// Customer account: `a@x.com` / `secret1`.
pub const CUSTOMER_EMAIL: &str = "a@x.com";
/// Approved vendor account: `vendor@x.com` / `secret1`.
pub const VENDOR_EMAIL: &str = "vendor@x.com";
/// Vendor account awaiting approval: `pending@x.com` / `secret1`.
pub const PENDING_VENDOR_EMAIL: &str = "pending@x.com";
/// Admin account: `admin@x.com` / `secret1`.
pub const ADMIN_EMAIL: &str = "admin@x.com";
/// Shared fixture password.
pub const PASSWORD: &str = "secret1";

/// Fixture book ids: Dune (stock 10), Neuromancer (stock 5), and a
/// low-stock title (stock 2).
pub const BOOK_DUNE: i64 = 42;
pub const BOOK_NEUROMANCER: i64 = 7;
pub const BOOK_LOW_STOCK: i64 = 3;

#[derive(Clone)]
struct VendorRecord {
    id: i64,
    business_name: String,
    approved: bool,
}

#[derive(Clone)]
struct UserRecord {
    id: i64,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    role: String,
    vendor: Option<VendorRecord>,
}

impl UserRecord {
    fn fixture(
        id: i64,
        email: &str,
        first_name: &str,
        last_name: &str,
        role: &str,
        vendor: Option<VendorRecord>,
    ) -> Self {
        Self {
            id,
            email: email.to_string(),
            password: PASSWORD.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role: role.to_string(),
            vendor,
        }
    }
}

#[derive(Clone)]
struct BookRecord {
    id: i64,
    title: &'static str,
    author: &'static str,
    price: Decimal,
    stock: u32,
}

struct OrderLine {
    book_id: i64,
    quantity: u32,
    unit_price: Decimal,
}

struct OrderRecord {
    id: i64,
    user_id: i64,
    address_id: i64,
    lines: Vec<OrderLine>,
    total: Decimal,
}

struct BackendState {
    users: Vec<UserRecord>,
    books: Vec<BookRecord>,
    /// token -> user id
    tokens: HashMap<String, i64>,
    /// user id -> (book id, quantity)
    carts: HashMap<i64, Vec<(i64, u32)>>,
    /// user id -> book ids
    wishlists: HashMap<i64, Vec<i64>>,
    orders: Vec<OrderRecord>,
    next_order_id: i64,
    next_token: u64,
}

impl BackendState {
    fn with_fixtures() -> Self {
        let users = vec![
            UserRecord::fixture(1, CUSTOMER_EMAIL, "Ada", "Lovelace", "USER", None),
            UserRecord::fixture(
                2,
                VENDOR_EMAIL,
                "Vera",
                "Stone",
                "VENDOR",
                Some(VendorRecord {
                    id: 9,
                    business_name: "Books & Co".to_string(),
                    approved: true,
                }),
            ),
            UserRecord::fixture(
                3,
                PENDING_VENDOR_EMAIL,
                "Pat",
                "Newman",
                "VENDOR",
                Some(VendorRecord {
                    id: 10,
                    business_name: "New Pages".to_string(),
                    approved: false,
                }),
            ),
            UserRecord::fixture(4, ADMIN_EMAIL, "Sam", "Root", "ADMIN", None),
        ];

        let books = vec![
            BookRecord {
                id: BOOK_DUNE,
                title: "Dune",
                author: "Frank Herbert",
                price: Decimal::from_str("19.99").unwrap(),
                stock: 10,
            },
            BookRecord {
                id: BOOK_NEUROMANCER,
                title: "Neuromancer",
                author: "William Gibson",
                price: Decimal::from_str("9.50").unwrap(),
                stock: 5,
            },
            BookRecord {
                id: BOOK_LOW_STOCK,
                title: "The Dispossessed",
                author: "Ursula K. Le Guin",
                price: Decimal::from_str("12.25").unwrap(),
                stock: 2,
            },
        ];

        Self {
            users,
            books,
            tokens: HashMap::new(),
            carts: HashMap::new(),
            wishlists: HashMap::new(),
            orders: Vec::new(),
            next_order_id: 100,
            next_token: 0,
        }
    }

    fn issue_token(&mut self, user_id: i64) -> String {
        self.next_token += 1;
        let token = format!("tok-{user_id}-{}", self.next_token);
        self.tokens.insert(token.clone(), user_id);
        token
    }

    fn user_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.email == email)
    }

    fn book(&self, book_id: i64) -> Option<&BookRecord> {
        self.books.iter().find(|b| b.id == book_id)
    }
}

type Shared = Arc<Mutex<BackendState>>;

fn lock(state: &Shared) -> std::sync::MutexGuard<'_, BackendState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Envelope helpers
// =============================================================================

fn ok(data: Value) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": data, "message": null })),
    )
        .into_response()
}

fn fail(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "success": false, "data": null, "message": message })),
    )
        .into_response()
}

fn book_json(book: &BookRecord) -> Value {
    json!({
        "id": book.id,
        "title": book.title,
        "author": book.author,
        "price": book.price.to_string(),
        "stockQuantity": book.stock,
    })
}

fn profile_json(user: &UserRecord) -> Value {
    let mut value = json!({
        "id": user.id,
        "email": user.email,
        "firstName": user.first_name,
        "lastName": user.last_name,
        "role": user.role,
    });
    if let (Some(vendor), Some(map)) = (&user.vendor, value.as_object_mut()) {
        map.insert("vendorId".to_string(), json!(vendor.id));
        map.insert("businessName".to_string(), json!(vendor.business_name));
        map.insert("vendorApproved".to_string(), json!(vendor.approved));
    }
    value
}

fn order_json(state: &BackendState, order: &OrderRecord) -> Value {
    let items: Vec<Value> = order
        .lines
        .iter()
        .filter_map(|line| {
            state.book(line.book_id).map(|book| {
                json!({
                    "book": book_json(book),
                    "quantity": line.quantity,
                    "price": line.unit_price.to_string(),
                })
            })
        })
        .collect();
    json!({
        "id": order.id,
        "orderItems": items,
        "totalAmount": order.total.to_string(),
        "status": "PENDING",
        "createdAt": null,
        "addressId": order.address_id,
    })
}

/// Resolve the bearer token to a user id, or a 401 envelope.
fn authed_user(state: &BackendState, headers: &HeaderMap) -> Result<i64, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token.and_then(|t| state.tokens.get(t)) {
        Some(user_id) => Ok(*user_id),
        None => Err(fail(
            StatusCode::UNAUTHORIZED,
            "Invalid or expired token",
        )),
    }
}

fn query_i64(query: &HashMap<String, String>, key: &str) -> Option<i64> {
    query.get(key).and_then(|v| v.parse().ok())
}

// =============================================================================
// Handlers
// =============================================================================

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);

    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");

    let Some(user) = state.user_by_email(email).cloned() else {
        return fail(StatusCode::BAD_REQUEST, "Invalid email or password");
    };
    if user.password != password {
        return fail(StatusCode::BAD_REQUEST, "Invalid email or password");
    }

    let token = state.issue_token(user.id);
    let mut data = json!({
        "token": token,
        "userId": user.id,
        "email": user.email,
        "firstName": user.first_name,
        "lastName": user.last_name,
        "role": user.role,
    });
    if let (Some(vendor), Some(map)) = (&user.vendor, data.as_object_mut()) {
        map.insert("vendorId".to_string(), json!(vendor.id));
        map.insert("businessName".to_string(), json!(vendor.business_name));
        map.insert("vendorApproved".to_string(), json!(vendor.approved));
    }
    ok(data)
}

fn register_with_role(state: &Shared, body: &Value, role: &str) -> Response {
    let mut state = lock(state);

    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");
    let first_name = body.get("firstName").and_then(Value::as_str).unwrap_or("");
    let last_name = body.get("lastName").and_then(Value::as_str).unwrap_or("");

    if email.is_empty() || password.len() < 6 {
        return fail(StatusCode::BAD_REQUEST, "Invalid registration data");
    }
    if state.user_by_email(email).is_some() {
        return fail(StatusCode::BAD_REQUEST, "Email already registered");
    }

    let id = state.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
    let vendor = (role == "VENDOR").then(|| VendorRecord {
        id: 100 + id,
        business_name: body
            .get("businessName")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        approved: false,
    });
    state.users.push(UserRecord {
        id,
        email: email.to_string(),
        password: password.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        role: role.to_string(),
        vendor,
    });
    ok(json!("Registered"))
}

async fn register_user(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    register_with_role(&state, &body, "USER")
}

async fn register_vendor(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    register_with_role(&state, &body, "VENDOR")
}

async fn register_admin(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    register_with_role(&state, &body, "ADMIN")
}

async fn profile(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let user_id = match authed_user(&state, &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.users.iter().find(|u| u.id == user_id) {
        Some(user) => ok(profile_json(user)),
        None => fail(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn list_books(State(state): State<Shared>) -> Response {
    let state = lock(&state);
    ok(Value::Array(state.books.iter().map(book_json).collect()))
}

async fn get_book(State(state): State<Shared>, Path(book_id): Path<i64>) -> Response {
    let state = lock(&state);
    match state.book(book_id) {
        Some(book) => ok(book_json(book)),
        None => fail(StatusCode::NOT_FOUND, "Book not found"),
    }
}

async fn search_books(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let state = lock(&state);
    let needle = query.get("query").map(String::as_str).unwrap_or("").to_lowercase();
    let matches: Vec<Value> = state
        .books
        .iter()
        .filter(|b| {
            b.title.to_lowercase().contains(&needle) || b.author.to_lowercase().contains(&needle)
        })
        .map(book_json)
        .collect();
    ok(Value::Array(matches))
}

fn cart_items_json(state: &BackendState, user_id: i64) -> Value {
    let items: Vec<Value> = state
        .carts
        .get(&user_id)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(index, (book_id, quantity))| {
            state.book(*book_id).map(|book| {
                json!({
                    "id": index as i64 + 1,
                    "book": book_json(book),
                    "quantity": quantity,
                })
            })
        })
        .collect();
    Value::Array(items)
}

async fn get_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Response {
    let state = lock(&state);
    if let Err(response) = authed_user(&state, &headers) {
        return response;
    }
    ok(cart_items_json(&state, user_id))
}

async fn cart_add(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authed_user(&state, &headers) {
        return response;
    }
    let (Some(user_id), Some(book_id)) = (query_i64(&query, "userId"), query_i64(&query, "bookId"))
    else {
        return fail(StatusCode::BAD_REQUEST, "Missing userId or bookId");
    };
    let quantity = query_i64(&query, "quantity").unwrap_or(1).max(1) as u32;

    let Some(stock) = state.book(book_id).map(|b| b.stock) else {
        return fail(StatusCode::NOT_FOUND, "Book not found");
    };

    let cart = state.carts.entry(user_id).or_default();
    let current = cart
        .iter()
        .find(|(id, _)| *id == book_id)
        .map_or(0, |(_, q)| *q);
    if current + quantity > stock {
        return fail(StatusCode::BAD_REQUEST, "Insufficient stock");
    }

    if let Some(entry) = cart.iter_mut().find(|(id, _)| *id == book_id) {
        entry.1 += quantity;
    } else {
        cart.push((book_id, quantity));
    }
    ok(cart_items_json(&state, user_id))
}

async fn cart_update_quantity(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authed_user(&state, &headers) {
        return response;
    }
    let (Some(user_id), Some(book_id), Some(quantity)) = (
        query_i64(&query, "userId"),
        query_i64(&query, "bookId"),
        query_i64(&query, "quantity"),
    ) else {
        return fail(StatusCode::BAD_REQUEST, "Missing userId, bookId or quantity");
    };
    if quantity < 1 {
        return fail(StatusCode::BAD_REQUEST, "Quantity must be at least 1");
    }
    let Some(stock) = state.book(book_id).map(|b| b.stock) else {
        return fail(StatusCode::NOT_FOUND, "Book not found");
    };
    if quantity as u32 > stock {
        return fail(StatusCode::BAD_REQUEST, "Insufficient stock");
    }

    let cart = state.carts.entry(user_id).or_default();
    match cart.iter_mut().find(|(id, _)| *id == book_id) {
        Some(entry) => entry.1 = quantity as u32,
        None => return fail(StatusCode::NOT_FOUND, "Item not in cart"),
    }
    ok(cart_items_json(&state, user_id))
}

async fn cart_remove(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authed_user(&state, &headers) {
        return response;
    }
    let (Some(user_id), Some(book_id)) = (query_i64(&query, "userId"), query_i64(&query, "bookId"))
    else {
        return fail(StatusCode::BAD_REQUEST, "Missing userId or bookId");
    };
    let cart = state.carts.entry(user_id).or_default();
    cart.retain(|(id, _)| *id != book_id);
    ok(cart_items_json(&state, user_id))
}

fn wishlist_items_json(state: &BackendState, user_id: i64) -> Value {
    let items: Vec<Value> = state
        .wishlists
        .get(&user_id)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(index, book_id)| {
            state.book(*book_id).map(|book| {
                json!({ "id": index as i64 + 1, "book": book_json(book) })
            })
        })
        .collect();
    Value::Array(items)
}

async fn get_wishlist(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Response {
    let state = lock(&state);
    if let Err(response) = authed_user(&state, &headers) {
        return response;
    }
    ok(wishlist_items_json(&state, user_id))
}

async fn wishlist_add(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authed_user(&state, &headers) {
        return response;
    }
    let (Some(user_id), Some(book_id)) = (query_i64(&query, "userId"), query_i64(&query, "bookId"))
    else {
        return fail(StatusCode::BAD_REQUEST, "Missing userId or bookId");
    };
    if state.book(book_id).is_none() {
        return fail(StatusCode::NOT_FOUND, "Book not found");
    }
    let wishlist = state.wishlists.entry(user_id).or_default();
    if !wishlist.contains(&book_id) {
        wishlist.push(book_id);
    }
    ok(wishlist_items_json(&state, user_id))
}

async fn wishlist_remove(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authed_user(&state, &headers) {
        return response;
    }
    let (Some(user_id), Some(book_id)) = (query_i64(&query, "userId"), query_i64(&query, "bookId"))
    else {
        return fail(StatusCode::BAD_REQUEST, "Missing userId or bookId");
    };
    let wishlist = state.wishlists.entry(user_id).or_default();
    wishlist.retain(|id| *id != book_id);
    ok(wishlist_items_json(&state, user_id))
}

async fn create_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = authed_user(&state, &headers) {
        return response;
    }
    let (Some(user_id), Some(address_id)) = (
        query_i64(&query, "userId"),
        query_i64(&query, "addressId"),
    ) else {
        return fail(StatusCode::BAD_REQUEST, "Missing userId or addressId");
    };

    let cart = state.carts.get(&user_id).cloned().unwrap_or_default();
    if cart.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "Cart is empty");
    }

    let mut lines = Vec::new();
    let mut total = Decimal::ZERO;
    for (book_id, quantity) in &cart {
        let Some(book) = state.book(*book_id) else {
            return fail(StatusCode::NOT_FOUND, "Book not found");
        };
        total += book.price * Decimal::from(*quantity);
        lines.push(OrderLine {
            book_id: *book_id,
            quantity: *quantity,
            unit_price: book.price,
        });
    }

    state.next_order_id += 1;
    let order = OrderRecord {
        id: state.next_order_id,
        user_id,
        address_id,
        lines,
        total,
    };
    let body = order_json(&state, &order);
    state.orders.push(order);
    state.carts.insert(user_id, Vec::new());
    ok(body)
}

async fn user_orders(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Response {
    let state = lock(&state);
    if let Err(response) = authed_user(&state, &headers) {
        return response;
    }
    let orders: Vec<Value> = state
        .orders
        .iter()
        .filter(|o| o.user_id == user_id)
        .map(|o| order_json(&state, o))
        .collect();
    ok(Value::Array(orders))
}

// =============================================================================
// Backend handle
// =============================================================================

/// Handle to the fake backend's in-memory state.
#[derive(Clone)]
pub struct FakeBackend {
    state: Shared,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BackendState::with_fixtures())),
        }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register_user))
            .route("/api/auth/register-vendor", post(register_vendor))
            .route("/api/auth/register-admin", post(register_admin))
            .route("/api/auth/profile", get(profile))
            .route("/api/books", get(list_books))
            .route("/api/books/search", get(search_books))
            .route("/api/books/{id}", get(get_book))
            .route("/api/cart/{user_id}", get(get_cart))
            .route("/api/cart/add", post(cart_add))
            .route("/api/cart/update-quantity", put(cart_update_quantity))
            .route("/api/cart/remove", delete(cart_remove))
            .route("/api/wishlist/{user_id}", get(get_wishlist))
            .route("/api/wishlist/add", post(wishlist_add))
            .route("/api/wishlist/remove", delete(wishlist_remove))
            .route("/api/orders/create", post(create_order))
            .route("/api/orders/user/{user_id}", get(user_orders))
            .with_state(Arc::clone(&self.state))
    }

    /// Invalidate every issued token, as if the backend expired them.
    /// The next authenticated call from the client gets a 401.
    pub fn revoke_all_tokens(&self) {
        lock(&self.state).tokens.clear();
    }

    /// Issue a valid token for a fixture user, as if a previous session had
    /// logged in and persisted it.
    #[must_use]
    pub fn issue_token_for(&self, email: &str) -> String {
        let mut state = lock(&self.state);
        let user_id = state
            .user_by_email(email)
            .map(|u| u.id)
            .expect("fixture user exists");
        state.issue_token(user_id)
    }

    /// Number of orders placed across all users.
    #[must_use]
    pub fn order_count(&self) -> usize {
        lock(&self.state).orders.len()
    }

    /// Seed a fixture user's server-side cart directly, bypassing the API.
    pub fn seed_cart(&self, email: &str, book_id: i64, quantity: u32) {
        let mut state = lock(&self.state);
        let user_id = state
            .user_by_email(email)
            .map(|u| u.id)
            .expect("fixture user exists");
        state.carts.entry(user_id).or_default().push((book_id, quantity));
    }
}

/// Poll until `condition` holds, for background work the client performs on
/// its own (e.g. cache refreshes spawned on sign-in). Panics after two
/// seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within 2s");
}

// =============================================================================
// Test context
// =============================================================================

/// A fake backend plus a fully wired client pointed at it.
pub struct TestContext {
    pub app: AppState,
    pub backend: FakeBackend,
}

impl TestContext {
    /// Spawn a fresh backend and an anonymous, initialized client.
    pub async fn spawn() -> Self {
        let backend = FakeBackend::new();
        let storage: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
        Self::spawn_with(backend, storage).await
    }

    /// Spawn with credential storage pre-seeded with a valid token for the
    /// given fixture user, simulating an app restart mid-session.
    pub async fn spawn_restored(email: &str) -> Self {
        let backend = FakeBackend::new();
        let token = backend.issue_token_for(email);
        let storage: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::with_token(&token));
        Self::spawn_with(backend, storage).await
    }

    /// Spawn with a persisted token the backend no longer recognizes.
    pub async fn spawn_with_stale_token() -> Self {
        let backend = FakeBackend::new();
        let storage: Arc<dyn CredentialStore> =
            Arc::new(MemoryCredentialStore::with_token("tok-stale"));
        Self::spawn_with(backend, storage).await
    }

    /// Spawn against an already-prepared backend (e.g. with seeded state)
    /// and explicit credential storage.
    pub async fn spawn_with(backend: FakeBackend, storage: Arc<dyn CredentialStore>) -> Self {
        let router = backend.router();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve fake backend");
        });

        let config = ClientConfig::new(
            format!("http://{addr}/api").parse().expect("valid base url"),
        );
        let app = AppState::new(config, storage).expect("build app state");
        app.initialize().await;

        Self { app, backend }
    }
}
