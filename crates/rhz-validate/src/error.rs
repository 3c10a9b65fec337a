use rhz_links::LinkError;
use rhz_store::StoreError;

/// Errors that can occur during validation.
///
/// Any error here means the proposal is not admitted: validation fails
/// closed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A registered validator panicked.
    #[error("validator for {validator} faulted: {message}")]
    ValidatorFault { validator: String, message: String },

    /// A stage could not read the state it needed.
    #[error("store read failed during validation: {0}")]
    Store(#[from] StoreError),

    #[error("link index read failed during validation: {0}")]
    Link(#[from] LinkError),

    /// The validator table is malformed.
    #[error("configuration error: {0}")]
    Config(String),
}
