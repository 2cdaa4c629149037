use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN, Serialize};

/// The sending end handle of the communication.
///
/// Frames are written as a length prefixed head built in a reusable buffer,
/// followed by the message's parameter block straight from the caller's memory.
pub struct OnoSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    head: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> OnoSender<W> {
    /// Creates a new `OnoSender` instance.
    ///
    /// # Arguments
    /// * `tx` - The underlying writer.
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            head: Vec::with_capacity(64),
        }
    }

    /// Sends `msg` as a single frame.
    ///
    /// # Arguments
    /// * `msg` - A serializable object.
    ///
    /// # Returns
    /// An `InvalidInput` error if the frame is over the size limit, nothing is
    /// written then. Any other error comes from the underlying writer.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        let Self { tx, head } = self;

        head.clear();
        head.extend_from_slice(&[0; LEN_TYPE_SIZE]);

        let tail = msg.serialize(head).unwrap_or_default();
        let body_len = head.len() - LEN_TYPE_SIZE + tail.len();

        if body_len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to send a frame of {body_len} bytes, the limit is {MAX_FRAME_LEN}"),
            ));
        }

        head[..LEN_TYPE_SIZE].copy_from_slice(&(body_len as LenType).to_be_bytes());
        tx.write_all(head).await?;

        if !tail.is_empty() {
            tx.write_all(tail).await?;
        }

        tx.flush().await
    }

    /// Shuts down the underlying writer, the peer will read an end of stream.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.tx.shutdown().await
    }
}
