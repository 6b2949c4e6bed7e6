//! conveyor-core
//!
//! Single-consumer work queue: producers push from any thread, one dedicated
//! worker thread feeds items to a handler, and the worker can be paused and
//! resumed without being torn down.
//!
//! # モジュール構成
//! - **queue**: `WorkQueue` 本体、running-state controller、二値 signal、worker の状態
//! - **worker**: worker thread のループ
//! - **handler**: `Handler` / `ErrorHandler` と保護付き呼び出し
//! - **config**: `QueueOptions`, `QueueConfig`, `QueueBuilder`
//! - **observability**: `QueueStats`
//! - **error**: エラー型

pub mod config;
pub mod error;
pub mod handler;
pub mod observability;
pub mod queue;
mod worker;

pub use config::{QueueBuilder, QueueConfig, QueueOptions};
pub use error::{BoxError, ConveyorError, HandlerError, Result};
pub use handler::{DiscardErrors, ErrorHandler, Handler, from_fn};
pub use observability::QueueStats;
pub use queue::{QueueId, WorkQueue, WorkerState};
