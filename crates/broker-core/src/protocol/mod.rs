// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire protocol: framing + message shapes.

mod frame;
mod messages;

pub use frame::{read_frame, write_frame};
pub use messages::{BrokerCmd, Reply, Request, BROKER_CMD};

/// Parse a control-endpoint request body. A `type` discriminant the
/// broker doesn't recognize (or a malformed body) is not a transport
/// fault — the dispatcher replies `{"type":"unknown","result":false}"`
/// for it (spec.md §4.1), so parse failures are folded into `None`
/// rather than propagated as an error.
pub fn parse_request(body: &[u8]) -> Option<Request> {
    serde_json::from_slice(body).ok()
}

/// Serialize a reply for the control endpoint.
pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>, crate::error::ProtocolError> {
    Ok(serde_json::to_vec(reply)?)
}
