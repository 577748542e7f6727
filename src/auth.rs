//! Authorization header providers.
//!
//! The transport asks an [`AuthorizationProvider`] for the `Authorization`
//! header value once per request. Signing (SAS tokens, bearer tokens) happens
//! outside this crate; the providers here only hand out or cache what a
//! signer produced.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{ProvisioningError, Result};

/// Safety buffer subtracted from a header's lifetime so requests do not race
/// the expiry boundary.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Produces the current `Authorization` header value.
pub trait AuthorizationProvider: Send + Sync {
    /// Header value for the next request.
    fn authorization_header(&self) -> Result<String>;
}

impl<F> AuthorizationProvider for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn authorization_header(&self) -> Result<String> {
        self()
    }
}

/// A fixed header value, e.g. a long-lived SAS token or a test token.
#[derive(Clone)]
pub struct StaticAuthorization {
    header: String,
}

impl StaticAuthorization {
    /// Wraps a ready-made header value.
    pub fn new(header: impl Into<String>) -> Self {
        StaticAuthorization {
            header: header.into(),
        }
    }
}

impl std::fmt::Debug for StaticAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAuthorization")
            .field("header", &"<redacted>")
            .finish()
    }
}

impl AuthorizationProvider for StaticAuthorization {
    fn authorization_header(&self) -> Result<String> {
        if self.header.trim().is_empty() {
            return Err(ProvisioningError::Validation(
                "authorization header must not be empty".to_string(),
            ));
        }
        Ok(self.header.clone())
    }
}

struct CachedHeader {
    header: String,
    lifetime: Duration,
    acquired_at: Instant,
}

impl CachedHeader {
    fn is_expired(&self) -> bool {
        let usable = self.lifetime.saturating_sub(EXPIRY_BUFFER);
        self.acquired_at.elapsed() >= usable
    }
}

/// Caches a header produced by an external signer until shortly before it
/// expires.
///
/// Invariants:
/// - The signer is called lazily on the first request and again whenever the
///   cached header is within [`EXPIRY_BUFFER`] of its lifetime.
/// - The lock is held only while checking or refreshing the cache, never
///   across a network call.
pub struct ExpiringAuthorization<F> {
    issue: F,
    cached: Mutex<Option<CachedHeader>>,
}

impl<F> ExpiringAuthorization<F>
where
    F: Fn() -> Result<(String, Duration)> + Send + Sync,
{
    /// `issue` returns a fresh header and how long it stays valid.
    pub fn new(issue: F) -> Self {
        ExpiringAuthorization {
            issue,
            cached: Mutex::new(None),
        }
    }

    /// Drops the cached header so the next request re-issues one.
    pub fn invalidate(&self) {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        *cached = None;
    }
}

impl<F> AuthorizationProvider for ExpiringAuthorization<F>
where
    F: Fn() -> Result<(String, Duration)> + Send + Sync,
{
    fn authorization_header(&self) -> Result<String> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = cached.as_ref().filter(|c| !c.is_expired()) {
            return Ok(entry.header.clone());
        }

        let (header, lifetime) = (self.issue)()?;
        tracing::debug!(lifetime_secs = lifetime.as_secs(), "issued authorization header");
        *cached = Some(CachedHeader {
            header: header.clone(),
            lifetime,
            acquired_at: Instant::now(),
        });
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_signer(
        calls: &AtomicUsize,
        lifetime: Duration,
    ) -> impl Fn() -> Result<(String, Duration)> + Send + Sync + '_ {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok((format!("SharedAccessSignature sig={n}"), lifetime))
        }
    }

    #[test]
    fn static_authorization_returns_header() {
        let auth = StaticAuthorization::new("SharedAccessSignature sr=host&sig=abc");
        assert_eq!(
            auth.authorization_header().unwrap(),
            "SharedAccessSignature sr=host&sig=abc"
        );
    }

    #[test]
    fn static_authorization_rejects_blank_header() {
        let auth = StaticAuthorization::new("   ");
        assert!(matches!(
            auth.authorization_header(),
            Err(ProvisioningError::Validation(_))
        ));
    }

    #[test]
    fn static_authorization_debug_redacts_secret() {
        let auth = StaticAuthorization::new("secret-token");
        assert!(!format!("{auth:?}").contains("secret-token"));
    }

    #[test]
    fn closure_is_a_provider() {
        let provider = || -> Result<String> { Ok("Bearer closure".to_string()) };
        assert_eq!(provider.authorization_header().unwrap(), "Bearer closure");
    }

    #[test]
    fn expiring_authorization_caches_fresh_header() {
        let calls = AtomicUsize::new(0);
        let auth = ExpiringAuthorization::new(counting_signer(&calls, Duration::from_secs(3600)));
        let first = auth.authorization_header().unwrap();
        let second = auth.authorization_header().unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "signer should run once");
    }

    #[test]
    fn expiring_authorization_reissues_within_buffer() {
        // 90s lifetime minus the 60s buffer leaves 30s of use.
        let calls = AtomicUsize::new(0);
        let auth = ExpiringAuthorization::new(counting_signer(&calls, Duration::from_secs(90)));
        auth.authorization_header().unwrap();
        {
            let mut cached = auth.cached.lock().unwrap();
            cached.as_mut().unwrap().acquired_at = Instant::now() - Duration::from_secs(31);
        }
        let header = auth.authorization_header().unwrap();
        assert_eq!(header, "SharedAccessSignature sig=1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expiring_authorization_keeps_header_before_buffer() {
        let calls = AtomicUsize::new(0);
        let auth = ExpiringAuthorization::new(counting_signer(&calls, Duration::from_secs(90)));
        auth.authorization_header().unwrap();
        {
            let mut cached = auth.cached.lock().unwrap();
            cached.as_mut().unwrap().acquired_at = Instant::now() - Duration::from_secs(10);
        }
        auth.authorization_header().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_forces_reissue() {
        let calls = AtomicUsize::new(0);
        let auth = ExpiringAuthorization::new(counting_signer(&calls, Duration::from_secs(3600)));
        auth.authorization_header().unwrap();
        auth.invalidate();
        auth.authorization_header().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn signer_failure_propagates() {
        let auth = ExpiringAuthorization::new(|| -> Result<(String, Duration)> {
            Err(ProvisioningError::Client("key vault unreachable".to_string()))
        });
        assert!(matches!(
            auth.authorization_header(),
            Err(ProvisioningError::Client(_))
        ));
    }
}
