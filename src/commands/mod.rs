pub mod classifier;
pub mod executor;
pub mod retry;

pub use classifier::{classify, strip_invalid_chars, JsonErrorKind};
pub use executor::RemoteExecutor;
pub use retry::{RetryPolicy, RETRY_ATTEMPTS, RETRY_DELAY};
