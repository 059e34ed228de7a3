//! Session service.
//!
//! Owns the authenticated identity and the bearer credential, and is the
//! single authority on whether user-scoped stores may talk to the backend.
//!
//! # Lifecycle
//!
//! `Initializing -> Anonymous | Authenticated` at startup, then
//! `Anonymous -> Authenticating -> Authenticated` on login and back to
//! `Anonymous` on logout or a 401 from any authenticated call.
//!
//! Startup resolution completes before dependent stores are permitted to
//! fetch user-scoped data; a fetch with no identity fails fast locally.
//!
//! # Invariant
//!
//! At every observation point the credential and the identity are either
//! both present or both absent. Login commits them together only after the
//! profile fetch succeeds; logout and invalidation clear them together.
//!
//! # Epoch
//!
//! Every transition that sets or clears the identity bumps a monotonic
//! epoch. Stores tag in-flight requests with the epoch at request time and
//! discard responses that resolve under a different one.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use secrecy::SecretString;
use tracing::{debug, info, instrument, warn};

use paperback_core::{Email, Role, UserId};

use crate::error::ClientError;
use crate::gateway::ApiGateway;
use crate::models::{Identity, LoginData, LoginRequest, ProfileData, RegisterRequest, VendorInfo};
use crate::storage::CredentialStore;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Startup: persisted credential not yet validated.
    Initializing,
    /// No identity; user-scoped operations fail fast.
    Anonymous,
    /// A login call is in flight.
    Authenticating,
    /// Identity and credential are present and validated.
    Authenticated,
}

/// Read-only snapshot of session state, for navigation decisions.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub identity: Option<Identity>,
}

/// Per-request authentication context handed to stores.
///
/// Captures the epoch at request time so the response can be discarded if
/// the session it belongs to has ended.
pub(crate) struct AuthContext {
    pub user_id: UserId,
    pub credential: SecretString,
    pub epoch: u64,
}

type Hook = Box<dyn Fn() + Send + Sync>;

struct SessionState {
    phase: SessionPhase,
    credential: Option<SecretString>,
    identity: Option<Identity>,
    epoch: u64,
}

struct SessionInner {
    gateway: ApiGateway,
    storage: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    /// Run when the identity is cleared (logout or invalidation).
    cleared_hooks: RwLock<Vec<Hook>>,
    /// Run after any identity transition, including login.
    changed_hooks: RwLock<Vec<Hook>>,
}

/// The session service. Cheaply cloneable handle.
#[derive(Clone)]
pub struct SessionService {
    inner: Arc<SessionInner>,
}

impl SessionService {
    /// Create the session service and register its auth-rejected callback
    /// with the gateway.
    #[must_use]
    pub fn new(gateway: ApiGateway, storage: Arc<dyn CredentialStore>) -> Self {
        let inner = Arc::new(SessionInner {
            gateway: gateway.clone(),
            storage,
            state: RwLock::new(SessionState {
                phase: SessionPhase::Initializing,
                credential: None,
                identity: None,
                epoch: 0,
            }),
            cleared_hooks: RwLock::new(Vec::new()),
            changed_hooks: RwLock::new(Vec::new()),
        });

        // The gateway holds only a Weak reference; dropping the session
        // drops the hook's effect.
        let weak: Weak<SessionInner> = Arc::downgrade(&inner);
        gateway.set_auth_rejected_hook(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.clear_session("credential rejected");
            }
        }));

        Self { inner }
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Resolve the startup state from the persisted credential.
    ///
    /// Validates a persisted token against `GET /auth/profile`. Any failure
    /// resolves to `Anonymous`; initialization never errors. A rejected
    /// token is also removed from durable storage, but a transport failure
    /// leaves it persisted: the backend gave no verdict, and the next start
    /// can retry the restore.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionPhase {
        let Some(token) = self.inner.storage.load() else {
            debug!("no persisted credential, starting anonymous");
            self.inner.write_state(|state| {
                state.phase = SessionPhase::Anonymous;
            });
            self.inner.run_changed_hooks();
            return SessionPhase::Anonymous;
        };

        let credential = SecretString::from(token);
        let envelope = self
            .inner
            .gateway
            .get::<ProfileData>("/auth/profile", &[], Some(&credential))
            .await;

        match envelope
            .into_data()
            .and_then(|profile| identity_from_profile(profile, None))
        {
            Ok(identity) => {
                info!(user_id = %identity.id, "session restored from persisted credential");
                self.inner.write_state(|state| {
                    state.credential = Some(credential.clone());
                    state.identity = Some(identity);
                    state.phase = SessionPhase::Authenticated;
                    state.epoch += 1;
                });
                self.inner.run_changed_hooks();
                SessionPhase::Authenticated
            }
            Err(ClientError::Transport(e)) => {
                // No backend verdict on the credential; keep it persisted so
                // the session can still be restored once the network is back.
                warn!(error = %e, "backend unreachable at startup, starting anonymous");
                self.inner.write_state(|state| {
                    state.phase = SessionPhase::Anonymous;
                });
                self.inner.run_changed_hooks();
                SessionPhase::Anonymous
            }
            Err(e) => {
                warn!(error = %e, "persisted credential did not validate, starting anonymous");
                self.inner.clear_session("credential validation failed");
                SessionPhase::Anonymous
            }
        }
    }

    /// Log in with email and password.
    ///
    /// On success the credential is persisted, the full profile is fetched,
    /// and the session transitions to `Authenticated`. On failure the
    /// backend's rejection reason is returned and state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] with the backend's message for bad
    /// credentials or a pending vendor approval, [`ClientError::Transport`]
    /// for network failures.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        self.inner.write_state(|state| {
            state.phase = SessionPhase::Authenticating;
        });

        let body = LoginRequest { email, password };
        let envelope = self
            .inner
            .gateway
            .post::<LoginData, _>("/auth/login", &[], Some(&body), None)
            .await;

        let login = match envelope.into_data() {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "login rejected");
                self.inner.write_state(|state| {
                    state.phase = SessionPhase::Anonymous;
                });
                return Err(e);
            }
        };

        let credential = SecretString::from(login.token.clone());

        // Fetch the full profile with the new credential before committing
        // anything, so a failure here leaves no partial state.
        let profile_envelope = self
            .inner
            .gateway
            .get::<ProfileData>("/auth/profile", &[], Some(&credential))
            .await;

        let identity = match profile_envelope
            .into_data()
            .and_then(|profile| identity_from_profile(profile, Some(&login)))
        {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "profile fetch after login failed");
                self.inner.write_state(|state| {
                    state.phase = SessionPhase::Anonymous;
                });
                return Err(e);
            }
        };

        if let Err(e) = self.inner.storage.store(&login.token) {
            // The session still works for this process; it just won't
            // survive a restart.
            warn!(error = %e, "failed to persist credential");
        }

        self.inner.write_state(|state| {
            state.credential = Some(credential);
            state.identity = Some(identity.clone());
            state.phase = SessionPhase::Authenticated;
            state.epoch += 1;
        });
        self.inner.run_changed_hooks();

        info!(user_id = %identity.id, role = %identity.role, "login succeeded");
        Ok(identity)
    }

    /// Register a new account. Stateless passthrough; does not authenticate.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] with the backend's validation
    /// message verbatim.
    #[instrument(skip(self, request))]
    pub async fn register(&self, request: &RegisterRequest, role: Role) -> Result<(), ClientError> {
        let path = match role {
            Role::User => "/auth/register",
            Role::Vendor => "/auth/register-vendor",
            Role::Admin => "/auth/register-admin",
        };

        self.inner
            .gateway
            .post::<serde_json::Value, _>(path, &[], Some(request), None)
            .await
            .require_success()
    }

    /// Log out: clear credential and identity synchronously.
    ///
    /// Complete on the client without a network round-trip. Dependent
    /// stores are signalled to clear their caches.
    pub fn logout(&self) {
        info!("logging out");
        self.inner.clear_session("logout");
    }

    /// Re-fetch the identity with the current credential.
    ///
    /// Used at startup and when server-side identity fields may have
    /// changed (e.g. a vendor-approval notification).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] with no credential,
    /// [`ClientError::SessionExpired`] if the backend rejected it (the
    /// session has already been invalidated), or the transport failure.
    /// The current identity is kept on transport failures.
    #[instrument(skip(self))]
    pub async fn refresh_profile(&self) -> Result<Identity, ClientError> {
        let credential = self
            .inner
            .read_state(|state| state.credential.clone())
            .ok_or(ClientError::NotAuthenticated)?;

        let envelope = self
            .inner
            .gateway
            .get::<ProfileData>("/auth/profile", &[], Some(&credential))
            .await;

        let fallback_vendor = self
            .inner
            .read_state(|state| state.identity.as_ref().and_then(|i| i.vendor.clone()));

        let profile = envelope.into_data()?;
        let identity = identity_from_profile_with_vendor(profile, fallback_vendor)?;

        self.inner.write_state(|state| {
            state.identity = Some(identity.clone());
        });
        self.inner.run_changed_hooks();

        Ok(identity)
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register a hook run when the identity is cleared.
    ///
    /// Stores register their cache-clear here. Hooks run after the state
    /// transition completes and no session lock is held.
    pub fn on_cleared(&self, hook: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut hooks) = self.inner.cleared_hooks.write() {
            hooks.push(Box::new(hook));
        }
    }

    /// Register a hook run after any identity transition (login included).
    pub fn on_changed(&self, hook: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut hooks) = self.inner.changed_hooks.write() {
            hooks.push(Box::new(hook));
        }
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.inner.read_state(|state| state.phase)
    }

    /// Current identity, if authenticated.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.inner.read_state(|state| state.identity.clone())
    }

    /// Current user id, if authenticated.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.inner
            .read_state(|state| state.identity.as_ref().map(|i| i.id))
    }

    /// Snapshot for navigation decisions.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.inner.read_state(|state| SessionView {
            phase: state.phase,
            identity: state.identity.clone(),
        })
    }

    /// Current epoch. Bumped on every identity set/clear.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.read_state(|state| state.epoch)
    }

    /// Whether a response tagged with `epoch` is still current.
    #[must_use]
    pub fn is_current_epoch(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    /// Authentication context for a user-scoped request, or a fast local
    /// failure when there is no identity.
    pub(crate) fn auth_context(&self) -> Result<AuthContext, ClientError> {
        self.inner.read_state(|state| {
            match (&state.identity, &state.credential) {
                (Some(identity), Some(credential)) => Ok(AuthContext {
                    user_id: identity.id,
                    credential: credential.clone(),
                    epoch: state.epoch,
                }),
                _ => Err(ClientError::NotAuthenticated),
            }
        })
    }
}

impl SessionInner {
    fn read_state<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        let guard: RwLockReadGuard<'_, SessionState> =
            self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write_state<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let mut guard: RwLockWriteGuard<'_, SessionState> =
            self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Clear credential and identity together and notify dependents.
    ///
    /// Idempotent; safe to call from the gateway's 401 callback while a
    /// store's request is still unwinding.
    fn clear_session(&self, reason: &str) {
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "failed to clear persisted credential");
        }

        let had_identity = self.write_state(|state| {
            let had = state.identity.is_some() || state.credential.is_some();
            state.credential = None;
            state.identity = None;
            state.phase = SessionPhase::Anonymous;
            state.epoch += 1;
            had
        });

        if had_identity {
            debug!(reason, "session cleared");
            self.run_cleared_hooks();
        }
        self.run_changed_hooks();
    }

    fn run_cleared_hooks(&self) {
        if let Ok(hooks) = self.cleared_hooks.read() {
            for hook in hooks.iter() {
                hook();
            }
        }
    }

    fn run_changed_hooks(&self) {
        if let Ok(hooks) = self.changed_hooks.read() {
            for hook in hooks.iter() {
                hook();
            }
        }
    }
}

/// Build an [`Identity`] from a profile payload, falling back to login
/// response fields for vendor data the profile variant omits.
fn identity_from_profile(
    profile: ProfileData,
    login: Option<&LoginData>,
) -> Result<Identity, ClientError> {
    let fallback_vendor = login.and_then(|login| {
        login.vendor_id.map(|id| VendorInfo {
            id,
            business_name: login.business_name.clone().unwrap_or_default(),
            approved: login.vendor_approved.unwrap_or(false),
        })
    });
    identity_from_profile_with_vendor(profile, fallback_vendor)
}

fn identity_from_profile_with_vendor(
    profile: ProfileData,
    fallback_vendor: Option<VendorInfo>,
) -> Result<Identity, ClientError> {
    let email = Email::parse(&profile.email)
        .map_err(|e| ClientError::Transport(format!("invalid email in profile: {e}")))?;

    let vendor = if profile.role == Role::Vendor {
        profile
            .vendor_id
            .map(|id| VendorInfo {
                id,
                business_name: profile.business_name.clone().unwrap_or_default(),
                approved: profile.vendor_approved.unwrap_or(false),
            })
            .or(fallback_vendor)
    } else {
        None
    };

    Ok(Identity {
        id: profile.id,
        email,
        first_name: profile.first_name,
        last_name: profile.last_name,
        role: profile.role,
        vendor,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::storage::{CredentialStore, MemoryCredentialStore};
    use paperback_core::VendorId;

    fn profile(role: Role) -> ProfileData {
        ProfileData {
            id: UserId::new(1),
            email: "a@x.com".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            role,
            vendor_id: None,
            business_name: None,
            vendor_approved: None,
        }
    }

    fn unreachable_session(storage: Arc<MemoryCredentialStore>) -> SessionService {
        // Port 9 (discard) is not listening; connection is refused locally.
        let config = ClientConfig::new("http://127.0.0.1:9/api".parse().unwrap());
        let gateway = ApiGateway::new(&config).unwrap();
        SessionService::new(gateway, storage)
    }

    #[tokio::test]
    async fn test_initialize_keeps_credential_when_backend_unreachable() {
        let storage = Arc::new(MemoryCredentialStore::with_token("persisted-token"));
        let session = unreachable_session(Arc::clone(&storage));

        let phase = session.initialize().await;

        assert_eq!(phase, SessionPhase::Anonymous);
        assert!(session.identity().is_none());
        // No backend verdict: the durable token survives for the next start.
        assert_eq!(storage.load().as_deref(), Some("persisted-token"));
    }

    #[tokio::test]
    async fn test_logout_still_clears_durable_credential() {
        let storage = Arc::new(MemoryCredentialStore::with_token("persisted-token"));
        let session = unreachable_session(Arc::clone(&storage));

        session.logout();

        assert!(storage.load().is_none());
    }

    #[test]
    fn test_identity_from_customer_profile() {
        let identity = identity_from_profile(profile(Role::User), None).unwrap();
        assert_eq!(identity.role, Role::User);
        assert!(identity.vendor.is_none());
    }

    #[test]
    fn test_identity_rejects_invalid_email() {
        let mut p = profile(Role::User);
        p.email = "not-an-email".to_string();
        assert!(matches!(
            identity_from_profile(p, None),
            Err(ClientError::Transport(_))
        ));
    }

    #[test]
    fn test_vendor_fields_fall_back_to_login_data() {
        let login = LoginData {
            token: "tok".to_string(),
            user_id: UserId::new(1),
            email: "a@x.com".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            role: Role::Vendor,
            vendor_id: Some(VendorId::new(9)),
            business_name: Some("Books & Co".to_string()),
            vendor_approved: Some(true),
        };
        let identity = identity_from_profile(profile(Role::Vendor), Some(&login)).unwrap();
        let vendor = identity.vendor.unwrap();
        assert_eq!(vendor.id, VendorId::new(9));
        assert!(vendor.approved);
    }

    #[test]
    fn test_vendor_fields_ignored_for_customer_role() {
        let mut p = profile(Role::User);
        p.vendor_id = Some(VendorId::new(9));
        let identity = identity_from_profile(p, None).unwrap();
        assert!(identity.vendor.is_none());
    }

    #[test]
    fn test_profile_vendor_fields_take_precedence() {
        let mut p = profile(Role::Vendor);
        p.vendor_id = Some(VendorId::new(3));
        p.business_name = Some("Fresh Name".to_string());
        p.vendor_approved = Some(true);

        let stale = Some(VendorInfo {
            id: VendorId::new(3),
            business_name: "Old Name".to_string(),
            approved: false,
        });
        let identity = identity_from_profile_with_vendor(p, stale).unwrap();
        let vendor = identity.vendor.unwrap();
        assert_eq!(vendor.business_name, "Fresh Name");
        assert!(vendor.approved);
    }
}
