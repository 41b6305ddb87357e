//! Error taxonomy for outline reads, reconciliation, and overlays.

use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::keys::{CourseKey, KeyParseError};

/// Errors surfaced by the outline API.
///
/// Nothing in this crate retries or swallows these; retry policy belongs to
/// the caller.
#[derive(Debug, Error)]
pub enum OutlineError {
    /// No learning context is stored for the key.
    #[error("no course outline stored for {0}")]
    NotFound(CourseKey),

    /// The key is in the deprecated slash-separated format.
    #[error("course key {0} uses the deprecated format and is not supported")]
    UnsupportedKey(CourseKey),

    /// The key text could not be parsed at all.
    #[error(transparent)]
    InvalidKey(#[from] KeyParseError),

    /// A uniqueness or referential invariant was broken; nothing was written.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// An overlay processor (or the outline source) failed its one-time load.
    #[error("failed to load data for {processor}")]
    ExternalLoad {
        processor: String,
        #[source]
        source: anyhow::Error,
    },

    /// Any other storage failure.
    #[error("storage error")]
    Storage(#[source] anyhow::Error),
}

impl OutlineError {
    /// Classify a storage error: database constraint violations anywhere in
    /// the chain become [`OutlineError::ConstraintViolation`].
    pub fn from_storage(err: anyhow::Error) -> Self {
        let violation = err
            .chain()
            .find_map(|cause| match cause.downcast_ref::<sqlx::Error>() {
                Some(sqlx::Error::Database(db))
                    if matches!(
                        db.kind(),
                        ErrorKind::UniqueViolation
                            | ErrorKind::ForeignKeyViolation
                            | ErrorKind::NotNullViolation
                            | ErrorKind::CheckViolation
                    ) =>
                {
                    Some(db.message().to_owned())
                }
                _ => None,
            });

        match violation {
            Some(message) => Self::ConstraintViolation(format!("{err:#}: {message}")),
            None => Self::Storage(err),
        }
    }

    /// Wrap a raw `sqlx` error with a context message and classify it.
    pub(crate) fn sqlx(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |err| Self::from_storage(anyhow::Error::new(err).context(context))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = OutlineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_stay_storage() {
        let err = OutlineError::from_storage(
            anyhow::Error::new(sqlx::Error::PoolTimedOut).context("failed to acquire"),
        );
        assert!(matches!(err, OutlineError::Storage(_)));
    }

    #[test]
    fn plain_anyhow_is_storage() {
        let err = OutlineError::from_storage(anyhow::anyhow!("disk on fire"));
        assert!(matches!(err, OutlineError::Storage(_)));
    }

    #[test]
    fn display_names_the_key() {
        let key: CourseKey = "edX/DemoX/2020".parse().unwrap();
        let err = OutlineError::UnsupportedKey(key);
        assert!(err.to_string().contains("edX/DemoX/2020"));
    }
}
