use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::trace;

/// Byte-oriented view of one client connection.
///
/// Reads hand out owned [`Bytes`], a span that was read but not consumed can be returned with
/// [`Transport::push_back`] and is handed out again by the next read. An expired read deadline
/// reads like end of stream: the caller decides whether that is a clean end.
#[derive(Debug)]
pub struct Transport<R, W> {
    reader: R,
    writer: W,
    buf: BytesMut,
    pushed_back: Option<Bytes>,
    read_buffer_size: usize,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl<R, W> Transport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, read_buffer_size: usize) -> Self {
        Self {
            reader,
            writer,
            buf: BytesMut::with_capacity(read_buffer_size),
            pushed_back: None,
            read_buffer_size,
            read_timeout: None,
            write_timeout: None,
        }
    }

    pub fn set_read_timeout(&mut self, read_timeout: Option<Duration>) {
        self.read_timeout = read_timeout;
    }

    pub fn set_write_timeout(&mut self, write_timeout: Option<Duration>) {
        self.write_timeout = write_timeout;
    }

    /// Returns the next span of input, empty at end of stream or when the read deadline expired.
    pub async fn read(&mut self) -> io::Result<Bytes> {
        if let Some(bytes) = self.pushed_back.take() {
            return Ok(bytes);
        }

        self.buf.reserve(self.read_buffer_size);
        let read = match self.read_timeout {
            Some(duration) => match timeout(duration, self.reader.read_buf(&mut self.buf)).await {
                Ok(read) => read?,
                Err(_elapsed) => {
                    trace!(?duration, "read deadline expired");
                    0
                }
            },
            None => self.reader.read_buf(&mut self.buf).await?,
        };

        if read == 0 {
            return Ok(Bytes::new());
        }
        Ok(self.buf.split().freeze())
    }

    /// Returns unread input to the front of the stream.
    pub fn push_back(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        self.pushed_back = Some(match self.pushed_back.take() {
            None => bytes,
            Some(later) => {
                let mut joined = BytesMut::with_capacity(bytes.len() + later.len());
                joined.extend_from_slice(&bytes);
                joined.extend_from_slice(&later);
                joined.freeze()
            }
        });
    }

    /// Writes and flushes `data`, bounded by the write deadline.
    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let writer = &mut self.writer;
        let write = async move {
            writer.write_all(data).await?;
            writer.flush().await
        };
        match self.write_timeout {
            Some(duration) => timeout(duration, write).await.map_err(|_elapsed| io::Error::from(io::ErrorKind::TimedOut))?,
            None => write.await,
        }
    }
}
