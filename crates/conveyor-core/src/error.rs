//! Error types.
//!
//! 呼び出し側に見えるエラーは構築時のものだけ。
//! handler 実行時のエラーは worker 内で閉じる（`HandlerError` として error handler に渡す）。

use thiserror::Error;

/// Boxed error returned by user handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ConveyorError {
    #[error("a work queue requires a handler")]
    MissingHandler,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("invalid queue options: {0}")]
    InvalidOptions(String),

    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Failure of a single handler invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(#[source] BoxError),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Build a `Panicked` error from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        HandlerError::Panicked(message)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, HandlerError::Panicked(_))
    }
}

pub type Result<T> = std::result::Result<T, ConveyorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let err = HandlerError::from_panic(Box::new("boom"));
        assert!(err.is_panic());
        assert_eq!(err.to_string(), "handler panicked: boom");

        let err = HandlerError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.to_string(), "handler panicked: owned boom");

        let err = HandlerError::from_panic(Box::new(42_u32));
        assert_eq!(err.to_string(), "handler panicked: non-string panic payload");
    }

    #[test]
    fn failed_keeps_source() {
        let inner: BoxError = "bad item".into();
        let err = HandlerError::Failed(inner);
        assert!(!err.is_panic());
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "handler failed: bad item");
    }
}
