//! Byte streams and the fixed-block chunker

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use stripeio_common::Result;

/// Stream of byte blocks with in-band errors
///
/// The write path consumes one of these from the client; the read path
/// returns one backed by the producer's bounded pipe.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Wrap an in-memory payload as a `ByteStream`
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream {
    let items: [Result<Bytes>; 1] = [Ok(data.into())];
    Box::pin(futures::stream::iter(items))
}

/// Re-chunk an incoming stream into fixed-size blocks
///
/// Incoming items may be arbitrarily sized; `next_block` yields exactly
/// `block_size` bytes per call until the stream ends, where the final
/// block may be shorter.
pub struct StreamChunker {
    stream: ByteStream,
    block_size: usize,
    buf: VecDeque<Bytes>,
    buf_len: usize,
    eof: bool,
}

impl StreamChunker {
    /// Create a chunker cutting `stream` into `block_size` blocks
    pub fn new(stream: ByteStream, block_size: usize) -> Self {
        Self {
            stream,
            block_size,
            buf: VecDeque::new(),
            buf_len: 0,
            eof: false,
        }
    }

    /// Next block, or `None` once the stream is fully consumed
    pub async fn next_block(&mut self) -> Result<Option<Bytes>> {
        while !self.eof && self.buf_len < self.block_size {
            match self.stream.next().await {
                Some(Ok(bytes)) => {
                    self.buf_len += bytes.len();
                    self.buf.push_back(bytes);
                }
                Some(Err(e)) => return Err(e),
                None => self.eof = true,
            }
        }

        if self.buf_len == 0 {
            return Ok(None);
        }

        let take = self.block_size.min(self.buf_len);
        let mut block = BytesMut::with_capacity(take);
        while block.len() < take {
            let Some(mut front) = self.buf.pop_front() else {
                break;
            };
            let need = take - block.len();
            if front.len() <= need {
                block.extend_from_slice(&front);
                self.buf_len -= front.len();
            } else {
                block.extend_from_slice(&front.split_to(need));
                self.buf_len -= need;
                self.buf.push_front(front);
            }
        }
        Ok(Some(block.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stripeio_common::Error;

    fn stream_of(parts: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(futures::stream::iter(
            parts.into_iter().map(|p| Ok::<_, Error>(Bytes::from_static(p))),
        ))
    }

    #[tokio::test]
    async fn test_rechunks_across_item_boundaries() {
        let mut chunker = StreamChunker::new(stream_of(vec![b"abcd", b"efg", b"hij"]), 5);

        assert_eq!(chunker.next_block().await.unwrap().unwrap(), &b"abcde"[..]);
        assert_eq!(chunker.next_block().await.unwrap().unwrap(), &b"fghij"[..]);
        assert!(chunker.next_block().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_final_block() {
        let mut chunker = StreamChunker::new(stream_of(vec![b"abcdefg"]), 4);

        assert_eq!(chunker.next_block().await.unwrap().unwrap(), &b"abcd"[..]);
        assert_eq!(chunker.next_block().await.unwrap().unwrap(), &b"efg"[..]);
        assert!(chunker.next_block().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut chunker = StreamChunker::new(stream_of(vec![]), 4);
        assert!(chunker.next_block().await.unwrap().is_none());
        assert!(chunker.next_block().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_propagates() {
        let stream: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(Error::invalid_argument("broken body")),
        ]));
        let mut chunker = StreamChunker::new(stream, 4);
        assert!(chunker.next_block().await.is_err());
    }
}
