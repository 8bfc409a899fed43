/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the core data structures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// An order statistic was requested past the end of a collection.
    #[error("select index {index} out of range for collection of size {len}")]
    SelectOutOfRange {
        /// The requested zero-based index.
        index: usize,
        /// The collection size at the time of the request.
        len: usize,
    },

    /// A random draw fell outside `[0, 1)`.
    #[error("uniform draw {0} is outside [0, 1)")]
    InvalidDraw(f64),

    /// The null entity id was used where a live entity is required.
    #[error("the null entity cannot be stored in a collection")]
    NullEntity,

    /// A run-status code character is not recognised.
    #[error("unknown run status code '{0}'")]
    UnknownStatusCode(char),
}
