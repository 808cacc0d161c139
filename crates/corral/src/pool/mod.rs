mod handle;
mod queue;
#[cfg(test)]
mod tests;
mod thread;
#[cfg(feature = "async-tokio")]
mod tokio;

pub use handle::TaskHandle;
pub use thread::*;
#[cfg_attr(docsrs, doc(cfg(feature = "async-tokio")))]
#[cfg(feature = "async-tokio")]
pub use self::tokio::*;
