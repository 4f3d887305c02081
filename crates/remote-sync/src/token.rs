//! In-memory bearer token store with a fixed expiry window.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use auditdesk_core::sync::{AccessTokenProvider, TransportError, TransportResult};

/// Tokens issued by the audit service are valid for eight hours.
const TOKEN_TTL_HOURS: i64 = 8;

struct TokenState {
    token: String,
    acquired_at: DateTime<Utc>,
}

/// Holds the current access token and refuses to hand it out once expired.
/// The coordinator treats that refusal as a signal to stop until the user
/// re-authenticates.
#[derive(Default)]
pub struct BearerTokenStore {
    state: Mutex<Option<TokenState>>,
}

impl BearerTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = Some(TokenState {
            token: token.into(),
            acquired_at: Utc::now(),
        });
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = None;
    }

    fn token_at(&self, now: DateTime<Utc>) -> TransportResult<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(current) = state.as_ref() else {
            return Err(TransportError::Auth(
                "no access token configured".to_string(),
            ));
        };
        if now - current.acquired_at >= Duration::hours(TOKEN_TTL_HOURS) {
            return Err(TransportError::Auth("access token expired".to_string()));
        }
        Ok(current.token.clone())
    }
}

impl AccessTokenProvider for BearerTokenStore {
    fn access_token(&self) -> TransportResult<String> {
        self.token_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_an_auth_error() {
        let store = BearerTokenStore::new();
        assert!(matches!(
            store.access_token(),
            Err(TransportError::Auth(_))
        ));
    }

    #[test]
    fn fresh_token_is_returned() {
        let store = BearerTokenStore::new();
        store.set_token("tok-123");
        assert_eq!(store.access_token().expect("token"), "tok-123");
    }

    #[test]
    fn token_expires_after_eight_hours() {
        let store = BearerTokenStore::new();
        store.set_token("tok-123");

        let now = Utc::now();
        assert!(store.token_at(now + Duration::hours(7)).is_ok());
        assert!(matches!(
            store.token_at(now + Duration::hours(8) + Duration::seconds(1)),
            Err(TransportError::Auth(_))
        ));
    }

    #[test]
    fn clear_drops_the_token() {
        let store = BearerTokenStore::new();
        store.set_token("tok-123");
        store.clear();
        assert!(store.access_token().is_err());
    }
}
