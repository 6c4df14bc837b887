use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

const CHUNK_SIZE: usize = 64 * 1024;

/// Streams `reader` in chunks. `guard` lives until the stream ends, fails, or
/// is dropped by the consumer, whichever happens first.
pub fn reader_stream<R, G>(reader: R, guard: G) -> ByteStream
where
    R: AsyncRead + Unpin + Send + 'static,
    G: Unpin + Send + 'static,
{
    Box::pin(Guarded {
        inner: ReaderStream::with_capacity(reader, CHUNK_SIZE),
        guard: Some(guard),
    })
}

struct Guarded<R, G> {
    inner: ReaderStream<R>,
    guard: Option<G>,
}

impl<R, G> Stream for Guarded<R, G>
where
    R: AsyncRead + Unpin,
    G: Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            this.guard.take();
        }
        polled
    }
}

/// Re-emits an already consumed first chunk ahead of the rest of the stream.
pub fn prepend(first: Bytes, rest: ByteStream) -> ByteStream {
    Box::pin(stream::once(async move { Ok(first) }).chain(rest))
}

/// Collects a stream into memory.
pub async fn collect(mut body: ByteStream) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    while let Some(chunk) = body.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn guard_released_at_end_of_stream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let data = vec![7u8; CHUNK_SIZE + 10];
        let mut body = reader_stream(std::io::Cursor::new(data.clone()), DropFlag(dropped.clone()));

        let first = body.next().await.unwrap().unwrap();
        assert!(!first.is_empty() && first.len() <= CHUNK_SIZE);
        assert!(!dropped.load(Ordering::SeqCst));

        let mut received = first.to_vec();
        while let Some(chunk) = body.next().await {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(received, data);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn guard_released_on_read_error() {
        struct Broken;

        impl AsyncRead for Broken {
            fn poll_read(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> Poll<io::Result<()>> {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let mut body = reader_stream(Broken, DropFlag(dropped.clone()));

        assert!(body.next().await.unwrap().is_err());
        assert!(dropped.load(Ordering::SeqCst));
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn prepend_keeps_order() {
        let rest = reader_stream(std::io::Cursor::new(b"world".to_vec()), ());
        let body = prepend(Bytes::from_static(b"hello "), rest);
        assert_eq!(collect(body).await.unwrap(), b"hello world");
    }
}
