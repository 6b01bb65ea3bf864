//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Auth token issued at login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Token value
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session for `user_id` valid for `lifetime` from now
    pub fn new(id: String, user_id: i64, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            expires_at: now + lifetime,
            created_at: now,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry() {
        let live = Session::new("a".to_string(), 1, Duration::days(7));
        assert!(!live.is_expired());

        let stale = Session::new("b".to_string(), 1, Duration::seconds(-1));
        assert!(stale.is_expired());
    }
}
