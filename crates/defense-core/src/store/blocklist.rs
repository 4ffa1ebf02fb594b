// Blocklist Store (SPEC_FULL.md §4.2, §3 "Blocklist entry").
//
// Open Question (a): the Python original used `setex`, which — like here —
// replaces the value and TTL on every write, but callers occasionally read
// the existing TTL first and tried to extend it additively. This store never
// does that: every write is a single `SET key value EX ttl`, so repeated
// blocks on the same IP simply refresh the TTL to exactly `ttl`, never add to it.

use crate::error::DefenseError;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEntry {
    pub reason: String,
    pub timestamp_utc: String,
    pub user_agent: String,
}

pub struct BlocklistStore {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

fn key_for(ip: &str) -> String {
    format!("blocklist:ip:{ip}")
}

impl BlocklistStore {
    pub fn new(conn: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { conn, ttl_seconds }
    }

    /// Writes (or refreshes) a blocklist entry. Returns `Ok(true)` on success.
    /// A `StoreTransient` error means the caller should degrade gracefully,
    /// not fail the request.
    pub async fn block(
        &self,
        ip: &str,
        reason: &str,
        user_agent: &str,
    ) -> Result<(), DefenseError> {
        let entry = BlockEntry {
            reason: reason.to_string(),
            timestamp_utc: Utc::now().to_rfc3339(),
            user_agent: user_agent.to_string(),
        };
        let payload = serde_json::to_string(&entry).map_err(DefenseError::internal)?;

        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key_for(ip), payload, self.ttl_seconds)
            .await
            .map_err(DefenseError::store_transient)?;
        Ok(())
    }

    pub async fn is_blocked(&self, ip: &str) -> Result<bool, DefenseError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(key_for(ip))
            .await
            .map_err(DefenseError::store_transient)?;
        Ok(exists)
    }

    pub async fn ttl_remaining(&self, ip: &str) -> Result<Option<i64>, DefenseError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn
            .ttl(key_for(ip))
            .await
            .map_err(DefenseError::store_transient)?;
        // redis TTL returns -2 if missing, -1 if no expiry set.
        Ok(if ttl >= 0 { Some(ttl) } else { None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_matches_spec_namespace() {
        assert_eq!(key_for("10.0.0.1"), "blocklist:ip:10.0.0.1");
    }
}
