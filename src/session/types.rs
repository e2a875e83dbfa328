// SPDX-License-Identifier: GPL-3.0-only

//! Remote session types

use crate::constants::remote;
use chrono::{DateTime, Duration, Utc};

/// A remote session as seen from the primary device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Backend-side expiry; authoritative expiry is still the 403 from polling
    pub expires_at: DateTime<Utc>,
    /// Id of the last result applied from this session
    pub last_result_id: Option<String>,
}

impl RemoteSession {
    pub fn new(id: String, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id,
            created_at,
            expires_at: created_at + ttl,
            last_result_id: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    /// URL the second device opens to join this session
    pub fn join_url(&self, base: &str) -> String {
        format!(
            "{}/{}/{}",
            base.trim_end_matches('/'),
            remote::JOIN_PATH,
            self.id
        )
    }
}
