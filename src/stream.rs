//! Stream adapter over a [`TailingReader`].

use crate::error::Result;
use crate::reader::TailingReader;
use crate::watcher::ChangeNotifier;
use futures::Stream;
use futures::stream;
use tracing::warn;

impl<N: ChangeNotifier> TailingReader<N> {
    /// Turns the reader into a stream of chunks of at most `chunk_size`
    /// bytes. The stream ends at end-of-stream, closing the reader, or
    /// right after yielding the first error.
    pub fn into_stream(self, chunk_size: usize) -> impl Stream<Item = Result<Vec<u8>>> {
        let chunk_size = chunk_size.max(1);

        stream::unfold(Some(self), move |state| async move {
            let Some(mut reader) = state else {
                return None;
            };

            let mut buf = vec![0u8; chunk_size];
            match reader.read(&mut buf).await {
                Ok(0) => {
                    if let Err(e) = reader.close() {
                        warn!("failed to close tailing reader: {}", e);
                    }
                    None
                }
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(buf), Some(reader)))
                }
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
