//! Error types for the knowledge store.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// Errors surfaced by knowledge-store operations.
///
/// Lookups of absent ids are NOT errors — `read` returns `Option`.
/// `NotFound` is reserved for mutations that name a missing entry.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// `create` was called with an id that already exists.
    #[error("entry already exists: {id}")]
    DuplicateKey { id: String },

    /// An update or targeted mutation named an absent entry.
    #[error("entry not found: {id}")]
    NotFound { id: String },

    /// A payload failed domain validation (shape mismatch, confidence
    /// out of range, empty required field).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The underlying engine is unreachable, closed, or corrupt.
    /// Transient busy states are retried once before landing here.
    #[error("knowledge store unavailable: {0}")]
    StoreUnavailable(String),
}

impl KnowledgeError {
    /// Whether this error is a transient engine contention state that
    /// is eligible for a single internal retry.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            KnowledgeError::StoreUnavailable(msg) => {
                msg.contains("database is locked") || msg.contains("database table is locked")
            }
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for KnowledgeError {
    fn from(err: rusqlite::Error) -> Self {
        KnowledgeError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for KnowledgeError {
    fn from(err: serde_json::Error) -> Self {
        KnowledgeError::StoreUnavailable(format!("payload codec: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_errors_are_transient() {
        let busy = KnowledgeError::StoreUnavailable("database is locked".into());
        assert!(busy.is_transient());

        let gone = KnowledgeError::StoreUnavailable("unable to open database file".into());
        assert!(!gone.is_transient());

        let dup = KnowledgeError::DuplicateKey { id: "unit_swordsman".into() };
        assert!(!dup.is_transient());
    }
}
