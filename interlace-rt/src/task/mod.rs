//! Controlled tasks: futures whose every suspension is a scheduling point.

pub mod cancellation;
pub mod completion;
pub mod handle;
pub mod lock;
pub mod semaphore;

pub use cancellation::CancellationToken;
pub use completion::{CompletionError, TaskCompletionSource};
pub use handle::{when_all, when_any, TaskError, TaskHandle};
pub use lock::{Lock, LockGuard};
pub use semaphore::Semaphore;

/// Synchronous-style variant of [`when_all`] with identical ordering
/// semantics; under the controlled runtime every wait is cooperative.
pub async fn wait_all<T: Send + 'static>(
    handles: Vec<TaskHandle<T>>,
) -> Result<Vec<T>, TaskError> {
    when_all(handles).await
}

/// Synchronous-style variant of [`when_any`] with identical ordering
/// semantics.
pub async fn wait_any<T: Send + 'static>(
    handles: Vec<TaskHandle<T>>,
) -> (usize, Vec<TaskHandle<T>>) {
    when_any(handles).await
}
