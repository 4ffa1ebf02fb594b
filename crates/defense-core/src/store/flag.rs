// "Recently tarpitted" flag (SPEC_FULL.md §3, §4.4 step 4). Informational
// only — consumed by analytics tooling outside this system's scope — so a
// write failure here is logged and swallowed, never escalated.

use crate::error::DefenseError;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

pub struct FlagStore {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

fn key_for(ip: &str) -> String {
    format!("tarpit_flag:{ip}")
}

impl FlagStore {
    pub fn new(conn: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { conn, ttl_seconds }
    }

    pub async fn flag(&self, ip: &str) -> Result<(), DefenseError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key_for(ip), Utc::now().to_rfc3339(), self.ttl_seconds)
            .await
            .map_err(DefenseError::store_transient)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_matches_spec_namespace() {
        assert_eq!(key_for("10.0.0.1"), "tarpit_flag:10.0.0.1");
    }
}
