use std::future::Future;
use std::pin::Pin;

/// Type alias for a boxed future that can be sent between threads.
///
/// Service traits return these so they stay dyn-compatible.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
