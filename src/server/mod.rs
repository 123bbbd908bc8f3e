//! Accept loop and the worker pool that runs one relay per connection.

pub mod listener;
pub mod pool;

pub use pool::WorkerPool;
