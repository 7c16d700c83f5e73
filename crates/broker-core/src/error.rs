// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol and framing error types.

use thiserror::Error;

/// Errors surfaced while reading or writing a length-prefixed wire frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("empty frame")]
    EmptyFrame,

    #[error("malformed JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("malformed UTF-8 topic frame: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}
