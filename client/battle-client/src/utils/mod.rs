pub mod retry;

pub use retry::{retry_async_if, retry_async_with_config, RetryConfig};
