// Hop Counter (SPEC_FULL.md §4.2, §4.4 step 2).
//
// Open Question (b): the Python original issued `INCR` then `EXPIRE` as two
// separate round trips, leaving a window where the first hit's key has no
// TTL yet. This store pipelines both commands into a single round trip so
// the increment and the expiry refresh land atomically from Redis's point
// of view — no other request can observe the incremented count without the
// refreshed TTL already applied.

use crate::error::DefenseError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

pub struct HopCounter {
    conn: ConnectionManager,
    window_seconds: u64,
}

fn key_for(ip: &str) -> String {
    format!("tarpit:hops:{ip}")
}

impl HopCounter {
    pub fn new(conn: ConnectionManager, window_seconds: u64) -> Self {
        Self {
            conn,
            window_seconds,
        }
    }

    /// Increments the hop count for `ip` and refreshes its window TTL,
    /// atomically, returning the post-increment count.
    pub async fn increment(&self, ip: &str) -> Result<u64, DefenseError> {
        let mut conn = self.conn.clone();
        let key = key_for(ip);

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, self.window_seconds as i64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(DefenseError::store_transient)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_matches_spec_namespace() {
        assert_eq!(key_for("10.0.0.1"), "tarpit:hops:10.0.0.1");
    }
}
