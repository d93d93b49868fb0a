//! Background job error classification
//!
//! Burn jobs report failures as [`JobError`] so the queue can tell a transient
//! blob or database hiccup (retry with backoff) from a failure that will never
//! succeed (give up on the first attempt).

use std::fmt;

use crate::error::AppError;

#[derive(Debug)]
pub enum JobError {
    /// Retried according to the queue's retry policy.
    Recoverable(anyhow::Error),
    /// Fails the job immediately.
    Unrecoverable(anyhow::Error),
}

impl JobError {
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        JobError::Recoverable(err.into())
    }

    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        JobError::Unrecoverable(err.into())
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, JobError::Recoverable(_))
    }

    pub fn inner(&self) -> &anyhow::Error {
        match self {
            JobError::Recoverable(e) | JobError::Unrecoverable(e) => e,
        }
    }

    pub fn into_inner(self) -> anyhow::Error {
        match self {
            JobError::Recoverable(e) | JobError::Unrecoverable(e) => e,
        }
    }

    /// Classify an [`AppError`] by its own recoverability.
    pub fn from_app_error(err: AppError) -> Self {
        use crate::error::ErrorMetadata;

        if err.is_recoverable() {
            JobError::Recoverable(err.into())
        } else {
            JobError::Unrecoverable(err.into())
        }
    }

    /// Whether an `anyhow` error returned by a job handler should be retried.
    /// Errors that are not a `JobError` are treated as recoverable.
    pub fn is_retryable(err: &anyhow::Error) -> bool {
        err.downcast_ref::<JobError>()
            .map(JobError::is_recoverable)
            .unwrap_or(true)
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner().source()
    }
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        JobError::Recoverable(err)
    }
}

/// Extension trait for marking a failed result as not worth retrying
pub trait JobResultExt<T> {
    fn unrecoverable(self) -> Result<T, JobError>;
}

impl<T, E: Into<anyhow::Error>> JobResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, JobError> {
        self.map_err(JobError::unrecoverable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_app_errors() {
        let transient = JobError::from_app_error(AppError::Internal("disk busy".into()));
        assert!(transient.is_recoverable());

        let permanent = JobError::from_app_error(AppError::InvalidInput("bad key".into()));
        assert!(!permanent.is_recoverable());
        assert!(permanent.to_string().contains("bad key"));
    }

    #[test]
    fn retryable_through_anyhow() {
        let err: anyhow::Error = JobError::unrecoverable(anyhow::anyhow!("bad key")).into();
        assert!(!JobError::is_retryable(&err));

        let err: anyhow::Error = JobError::recoverable(anyhow::anyhow!("timeout")).into();
        assert!(JobError::is_retryable(&err));

        assert!(JobError::is_retryable(&anyhow::anyhow!("plain")));
    }

    #[test]
    fn result_ext_marks_unrecoverable() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::other("permission denied"));
        assert!(!result.unrecoverable().unwrap_err().is_recoverable());
    }
}
