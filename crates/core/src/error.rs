/// Domain-level errors shared across crates.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Configuration or request input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),
}
