//! Length-prefixed frame I/O over a reliable async stream.
//!
//! A frame is `LENGTH(4 bytes, big-endian) || BODY(LENGTH bytes)`. The framer
//! never interprets `BODY` — it's opaque bytes to this layer.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(u32),
}

/// Safety bound on an incoming frame's declared length, independent of any
/// configured timeout — protects against a peer claiming an absurd length
/// and then trickling bytes forever.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

pub struct WireFramer {
    timeout: Duration,
}

impl WireFramer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn send_frame<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        body: &[u8],
    ) -> Result<(), WireError> {
        let len = u32::try_from(body.len()).map_err(|_| WireError::FrameTooLarge(u32::MAX))?;
        let mut package = Vec::with_capacity(4 + body.len());
        package.extend_from_slice(&len.to_be_bytes());
        package.extend_from_slice(body);

        timeout(self.timeout, writer.write_all(&package))
            .await
            .map_err(|_| WireError::Timeout(self.timeout))??;
        timeout(self.timeout, writer.flush())
            .await
            .map_err(|_| WireError::Timeout(self.timeout))??;
        Ok(())
    }

    pub async fn recv_frame<R: AsyncRead + Unpin>(&self, reader: &mut R) -> Result<Vec<u8>, WireError> {
        let mut len_buf = [0u8; 4];
        timeout(self.timeout, reader.read_exact(&mut len_buf))
            .await
            .map_err(|_| WireError::Timeout(self.timeout))??;
        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge(len));
        }

        let mut body = vec![0u8; len as usize];
        timeout(self.timeout, reader.read_exact(&mut body))
            .await
            .map_err(|_| WireError::Timeout(self.timeout))??;
        Ok(body)
    }
}
