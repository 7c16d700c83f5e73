// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefixed framing shared by the control and broadcast endpoints.
//!
//! Wire format:
//! ```text
//! +----------------+-------------------+
//! | Length (4B BE) | body              |
//! +----------------+-------------------+
//! ```
//!
//! The control endpoint carries one JSON-encoded `Request`/`Reply` per
//! frame. The broadcast endpoint carries two raw frames per event: topic
//! bytes, then payload bytes (spec.md's two-frame multipart contract).

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Read one length-prefixed frame. Returns `Ok(None)` on a clean EOF
/// (peer closed the connection between frames).
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, max: max_len });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
    max_len: usize,
) -> Result<(), ProtocolError> {
    if body.len() > max_len {
        return Err(ProtocolError::FrameTooLarge {
            len: body.len(),
            max: max_len,
        });
    }
    let len = body.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}
