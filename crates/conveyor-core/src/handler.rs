//! Handler - item を処理する capability の定義
//!
//! worker thread だけが handler を呼ぶので、`Sync` は要求しない（`Send` のみ）。
//! handler は worker thread に move され、queue 本体とは共有されない。
//!
//! # 失敗の扱い
//! - handler の `Err` と panic はどちらも `HandlerError` に変換され、error handler に渡る
//! - error handler 自身の panic は捨てる（結果は無条件に無視）

use std::panic::{self, AssertUnwindSafe};

use crate::error::{BoxError, HandlerError};

/// Handler processes one dequeued item.
///
/// Closures of shape `FnMut(T) -> Result<(), E>` implement this directly.
/// For handlers that cannot fail, wrap a plain `FnMut(T)` with [`from_fn`].
///
/// ```ignore
/// let queue = WorkQueue::new(|line: String| -> Result<(), std::io::Error> {
///     writeln!(out, "{line}")
/// })?;
/// ```
pub trait Handler<T>: Send {
    fn handle(&mut self, item: T) -> Result<(), BoxError>;
}

impl<T, F, E> Handler<T> for F
where
    F: FnMut(T) -> Result<(), E> + Send,
    E: Into<BoxError>,
{
    fn handle(&mut self, item: T) -> Result<(), BoxError> {
        self(item).map_err(Into::into)
    }
}

/// Adapter for handlers that never return an error.
pub struct FromFn<F>(F);

/// Wrap an infallible closure as a [`Handler`].
pub fn from_fn<T, F>(f: F) -> FromFn<F>
where
    F: FnMut(T) + Send,
{
    FromFn(f)
}

impl<T, F> Handler<T> for FromFn<F>
where
    F: FnMut(T) + Send,
{
    fn handle(&mut self, item: T) -> Result<(), BoxError> {
        (self.0)(item);
        Ok(())
    }
}

/// Receives failures raised by the [`Handler`].
pub trait ErrorHandler: Send {
    fn on_error(&mut self, error: HandlerError);
}

impl<F> ErrorHandler for F
where
    F: FnMut(HandlerError) + Send,
{
    fn on_error(&mut self, error: HandlerError) {
        self(error)
    }
}

/// Default error handler: drops every error.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardErrors;

impl ErrorHandler for DiscardErrors {
    fn on_error(&mut self, _error: HandlerError) {}
}

/// Run the handler on one item, turning both `Err` and panics into `HandlerError`.
pub(crate) fn invoke<T>(handler: &mut dyn Handler<T>, item: T) -> Result<(), HandlerError> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(item))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(HandlerError::Failed(e)),
        Err(payload) => Err(HandlerError::from_panic(payload)),
    }
}

/// Hand the error to the error handler. Anything it raises is discarded.
pub(crate) fn report(error_handler: &mut dyn ErrorHandler, error: HandlerError) {
    let _ = panic::catch_unwind(AssertUnwindSafe(|| error_handler.on_error(error)));
}
