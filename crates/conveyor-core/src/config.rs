//! Config - WorkQueue の構築パラメータ
//!
//! # 構成
//! - **QueueOptions**: serde で読める値オブジェクト（TOML など）
//! - **QueueConfig**: handler + error handler + options
//! - **QueueBuilder**: handler 未設定なら build() で失敗する（Fail-fast）

use serde::{Deserialize, Serialize};

use crate::error::{ConveyorError, Result};
use crate::handler::{DiscardErrors, ErrorHandler, Handler};
use crate::queue::WorkQueue;

/// Plain settings for a [`WorkQueue`].
///
/// Missing fields fall back to their defaults, so an empty TOML table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    /// Used in the worker thread name and in log fields.
    pub name: String,

    /// Begin in the running state.
    pub start_immediately: bool,

    /// Accept items while paused (they are delivered after `start`).
    pub enqueue_when_stopped: bool,

    /// Discard the backlog whenever the worker pauses.
    ///
    /// The clear happens on the worker thread once it notices the pause. Items
    /// enqueued while still paused after that point survive until `start`;
    /// items enqueued after a `start` that beat the clear are never discarded.
    pub clear_on_stop: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            name: "worker".to_string(),
            start_immediately: true,
            enqueue_when_stopped: true,
            clear_on_stop: false,
        }
    }
}

impl QueueOptions {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ConveyorError::InvalidOptions(e.to_string()))
    }
}

/// Everything a [`WorkQueue`] needs to start.
pub struct QueueConfig<T> {
    pub(crate) handler: Box<dyn Handler<T>>,
    pub(crate) error_handler: Box<dyn ErrorHandler>,
    pub options: QueueOptions,
}

impl<T> QueueConfig<T> {
    /// Config with the given handler and default everything else.
    pub fn new<H: Handler<T> + 'static>(handler: H) -> Self {
        Self {
            handler: Box::new(handler),
            error_handler: Box::new(DiscardErrors),
            options: QueueOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueueOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_error_handler<E: ErrorHandler + 'static>(mut self, error_handler: E) -> Self {
        self.error_handler = Box::new(error_handler);
        self
    }
}

/// Builder for [`QueueConfig`] / [`WorkQueue`].
///
/// ```ignore
/// let queue = QueueBuilder::new()
///     .handler(from_fn(|job: Job| job.run()))
///     .clear_on_stop(true)
///     .spawn()?;
/// ```
pub struct QueueBuilder<T> {
    handler: Option<Box<dyn Handler<T>>>,
    error_handler: Option<Box<dyn ErrorHandler>>,
    options: QueueOptions,
}

impl<T> QueueBuilder<T> {
    pub fn new() -> Self {
        Self {
            handler: None,
            error_handler: None,
            options: QueueOptions::default(),
        }
    }

    pub fn handler<H: Handler<T> + 'static>(mut self, handler: H) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Leaving this unset discards handler errors.
    pub fn error_handler<E: ErrorHandler + 'static>(mut self, error_handler: E) -> Self {
        self.error_handler = Some(Box::new(error_handler));
        self
    }

    pub fn options(mut self, options: QueueOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    pub fn start_immediately(mut self, yes: bool) -> Self {
        self.options.start_immediately = yes;
        self
    }

    pub fn enqueue_when_stopped(mut self, yes: bool) -> Self {
        self.options.enqueue_when_stopped = yes;
        self
    }

    pub fn clear_on_stop(mut self, yes: bool) -> Self {
        self.options.clear_on_stop = yes;
        self
    }

    /// # 検証
    /// - handler が未設定なら `ConveyorError::MissingHandler`
    pub fn build(self) -> Result<QueueConfig<T>> {
        let handler = self.handler.ok_or(ConveyorError::MissingHandler)?;
        Ok(QueueConfig {
            handler,
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Box::new(DiscardErrors)),
            options: self.options,
        })
    }
}

impl<T: Send + 'static> QueueBuilder<T> {
    /// Build the config and spawn the queue's worker thread.
    pub fn spawn(self) -> Result<WorkQueue<T>> {
        WorkQueue::from_config(self.build()?)
    }
}

impl<T> Default for QueueBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;

    #[test]
    fn defaults_match_documented_values() {
        let opts = QueueOptions::default();
        assert!(opts.start_immediately);
        assert!(opts.enqueue_when_stopped);
        assert!(!opts.clear_on_stop);
        assert_eq!(opts.name, "worker");
    }

    #[test]
    fn build_without_handler_fails() {
        let res = QueueBuilder::<u32>::new().clear_on_stop(true).build();
        assert!(matches!(res, Err(ConveyorError::MissingHandler)));
    }

    #[test]
    fn build_keeps_options() {
        let config = QueueBuilder::<u32>::new()
            .handler(from_fn(|_: u32| {}))
            .name("mailer")
            .start_immediately(false)
            .enqueue_when_stopped(false)
            .clear_on_stop(true)
            .build()
            .unwrap();
        assert_eq!(
            config.options,
            QueueOptions {
                name: "mailer".to_string(),
                start_immediately: false,
                enqueue_when_stopped: false,
                clear_on_stop: true,
            }
        );
    }

    #[test]
    fn options_from_partial_toml() {
        let opts = QueueOptions::from_toml_str("clear_on_stop = true\nname = \"audit\"\n").unwrap();
        assert!(opts.clear_on_stop);
        assert!(opts.start_immediately);
        assert_eq!(opts.name, "audit");

        assert_eq!(QueueOptions::from_toml_str("").unwrap(), QueueOptions::default());
    }

    #[test]
    fn options_from_bad_toml() {
        let err = QueueOptions::from_toml_str("clear_on_stop = \"yes\"").unwrap_err();
        assert!(matches!(err, ConveyorError::InvalidOptions(_)));
    }

    #[test]
    fn options_roundtrip_through_json() {
        let opts = QueueOptions {
            clear_on_stop: true,
            ..QueueOptions::default()
        };
        let json = serde_json::to_string(&opts).unwrap();
        let back: QueueOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, opts);
    }
}
