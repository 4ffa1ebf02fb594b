// Frequency Tracker (SPEC_FULL.md §3 "Frequency record", §4.2). Grounded on
// `original_source/escalation/escalation_engine.py`'s pipelined
// zremrangebyscore/zadd/zcount/zrange/expire sequence, issued here as one
// atomic Redis pipeline so the prune-insert-read-expire unit is indivisible.

use crate::error::DefenseError;
use redis::aio::ConnectionManager;

pub struct FrequencyReading {
    pub count: u64,
    /// `-1.0` if there was no prior hit inside the window.
    pub time_since_last_sec: f64,
}

pub struct FrequencyTracker {
    conn: ConnectionManager,
    window_seconds: f64,
    /// Extra seconds of slack added to the key's TTL beyond the window, so a
    /// key doesn't expire mid-window on a quiet IP right before a new hit.
    expiry_margin_seconds: i64,
}

fn key_for(ip: &str) -> String {
    format!("freq:{ip}")
}

impl FrequencyTracker {
    pub fn new(conn: ConnectionManager, window_seconds: f64, expiry_margin_seconds: i64) -> Self {
        Self {
            conn,
            window_seconds,
            expiry_margin_seconds,
        }
    }

    /// Records a hit at `now` (unix seconds, fractional) and returns the
    /// reading that follows it. Each hit is stored under a microsecond-unique
    /// member string so two hits landing in the same millisecond don't
    /// collide as sorted-set members.
    pub async fn record(&self, ip: &str, now: f64) -> Result<FrequencyReading, DefenseError> {
        let mut conn = self.conn.clone();
        let key = key_for(ip);
        let cutoff = now - self.window_seconds;
        let member = format!("{now:.6}");
        let ttl = (self.window_seconds as i64) + self.expiry_margin_seconds;

        let (_, _, members, _): (i64, i64, Vec<(String, f64)>, bool) = redis::pipe()
            .atomic()
            .zrembyscore(&key, f64::NEG_INFINITY, cutoff)
            .zadd(&key, &member, now)
            .zrange_withscores(&key, 0, -1)
            .expire(&key, ttl)
            .query_async(&mut conn)
            .await
            .map_err(DefenseError::store_transient)?;

        let count = members.len() as u64;
        let time_since_last_sec = members
            .iter()
            .map(|(_, score)| *score)
            .filter(|&t| t < now)
            .fold(None::<f64>, |acc, t| Some(acc.map_or(t, |a| a.max(t))))
            .map(|last| now - last)
            .unwrap_or(-1.0);

        Ok(FrequencyReading {
            count,
            time_since_last_sec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_matches_spec_namespace() {
        assert_eq!(key_for("10.0.0.1"), "freq:10.0.0.1");
    }
}
