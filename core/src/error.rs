use thiserror::Error;

/// Engine errors with a meaning callers are expected to react to.
/// General plumbing failures travel as plain `anyhow` errors; these
/// variants stay downcastable so the CLI can distinguish, say, a
/// rejected cycle from a broken paste buffer.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid bundle format or corrupted data")]
    InvalidBundleFormat,
    #[error("Unsupported bundle version {0}")]
    UnsupportedBundleVersion(i64),
    #[error("Adding \"{candidate}\" to \"{recipe}\" would create a cycle")]
    CyclicCompositionRejected { candidate: String, recipe: String },
    #[error("Item \"{0}\" not found")]
    ItemNotFound(String),
    #[error("Log for {0} is finalized")]
    LogFinalized(String),
}
