// Thin contracts over the shared KV store (SPEC_FULL.md §4.2). Each contract
// lives in its own logical Redis database so one outage doesn't cascade, and
// each degrades to "fail closed, count an error, keep serving" if Redis is
// unreachable — never bubbles a store error up as a request failure.

pub mod blocklist;
pub mod flag;
pub mod frequency;
pub mod hop;

use redis::aio::ConnectionManager;

/// Connects lazily-reconnecting to one logical Redis database. `ConnectionManager`
/// already retries/reconnects under the hood, so callers just await calls and
/// treat any `Err` as `StoreTransient`.
pub async fn connect(url: &str) -> redis::RedisResult<ConnectionManager> {
    let client = redis::Client::open(url)?;
    ConnectionManager::new(client).await
}
