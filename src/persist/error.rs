// =============================================================================
// PersistError — typed error taxonomy for the persistence layer
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to acquire a database connection: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("transaction failed during {step}: {source}")]
    Transaction {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to serialize metrics blob for {address}: {source}")]
    Serialize {
        address: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {query}: {source}")]
    Query {
        query: &'static str,
        #[source]
        source: sqlx::Error,
    },
}
