use crate::error::DefenseError;
use crate::markov::CANDIDATE_LIMIT;
use async_trait::async_trait;
use deadpool_postgres::Pool;

#[derive(Debug, Clone, PartialEq)]
pub struct MarkovCandidate {
    pub next_id: i64,
    pub word: String,
    pub freq: i64,
}

/// Abstracts the `markov_words`/`markov_sequences` lookups (SPEC_FULL.md §6
/// "Relational store schema") so the page renderer can be tested against a
/// fixed in-memory table without a running Postgres instance.
#[async_trait]
pub trait MarkovStore: Send + Sync {
    async fn candidates(&self, p1: i64, p2: i64) -> Result<Vec<MarkovCandidate>, DefenseError>;
}

pub struct PostgresMarkovStore {
    pool: Pool,
}

impl PostgresMarkovStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarkovStore for PostgresMarkovStore {
    async fn candidates(&self, p1: i64, p2: i64) -> Result<Vec<MarkovCandidate>, DefenseError> {
        let client = self.pool.get().await.map_err(DefenseError::store_transient)?;
        let rows = client
            .query(
                "SELECT s.next_id, w.word, s.freq \
                 FROM markov_sequences s \
                 JOIN markov_words w ON s.next_id = w.id \
                 WHERE s.p1 = $1 AND s.p2 = $2 \
                 ORDER BY s.freq DESC, s.next_id ASC \
                 LIMIT $3",
                &[&p1, &p2, &CANDIDATE_LIMIT],
            )
            .await
            .map_err(DefenseError::store_transient)?;

        Ok(rows
            .iter()
            .map(|row| MarkovCandidate {
                next_id: row.get(0),
                word: row.get(1),
                freq: row.get(2),
            })
            .collect())
    }
}
