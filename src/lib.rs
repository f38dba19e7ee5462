//! Tail a file that another process keeps appending to, `tail -f` style,
//! without assuming anything about its content.
//!
//! A [`TailingReader`] hands out bytes in the order they were written and
//! waits for more when it has caught up. Truncation, deletion and
//! replacement of the file are detected and, depending on [`Options`],
//! either end the stream or are followed transparently.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tailreader::{Options, TailingReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = Options::new()
//!         .with_wait_for_file(true, Duration::from_secs(30))
//!         .with_idle_timeout(Duration::from_secs(60))
//!         .with_close_on_delete(true);
//!     let mut reader = TailingReader::with_options("/tmp/the-file-to-tail", options)?;
//!
//!     let mut buf = vec![0u8; 1024];
//!     loop {
//!         let n = reader.read(&mut buf).await?;
//!         if n == 0 {
//!             break;
//!         }
//!         println!("{}", String::from_utf8_lossy(&buf[..n]));
//!     }
//!
//!     reader.close()?;
//!     Ok(())
//! }
//! ```

mod error;
mod options;
mod reader;
mod stream;
mod watcher;

#[cfg(test)]
mod test_helpers;

pub use error::{Error, Result, SetupSource};
pub use options::{Options, TailOption};
pub use reader::TailingReader;
pub use watcher::{
    ChangeEvent, ChangeKind, ChangeMask, ChangeNotifier, ChannelNotifier, ChannelNotifierHandle,
    NotifyWatcher,
};

use std::path::Path;

/// Starts tailing `path`, falling back to [`Options::DEFAULT`] when no
/// options are given.
///
/// # Example
///
/// ```rust,no_run
/// use tailreader::tail_file;
/// use tokio_stream::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let stream = tail_file("app.bin", None)?.into_stream(4096);
///     tokio::pin!(stream);
///
///     while let Some(chunk) = stream.next().await {
///         println!("{} new bytes", chunk?.len());
///     }
///
///     Ok(())
/// }
/// ```
pub fn tail_file<P: AsRef<Path>>(path: P, options: Option<Options>) -> Result<TailingReader> {
    TailingReader::with_options(path, options.unwrap_or(Options::DEFAULT))
}
