// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control-endpoint wire messages.
//!
//! Field names match the wire contract in spec.md §4.1 verbatim
//! (`addr`, `ownStr`, `history_cnt`, ...) even where that diverges from
//! Rust naming conventions, since these are serialized identifiers, not
//! Rust identifiers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved topic used for the broker's heartbeat broadcast.
pub const BROKER_CMD: &str = "BROKER_CMD";

/// A request sent by a client over the control endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "client_reg")]
    ClientReg { addr: String },

    #[serde(rename = "pub_reg")]
    PubReg {
        addr: String,
        topic: String,
        #[serde(rename = "ownStr", default)]
        own_str: i32,
        #[serde(default)]
        history_cnt: usize,
    },

    #[serde(rename = "sub_reg")]
    SubReg {
        topic: String,
        #[serde(default)]
        history_cnt: usize,
    },

    #[serde(rename = "pub")]
    Publish {
        addr: String,
        topic: String,
        content: Value,
    },

    #[serde(rename = "disconnect")]
    Disconnect { addr: String, topic: String },

    #[serde(rename = "ping")]
    Ping { addr: String },

    #[serde(rename = "shutdown")]
    Shutdown,
}

/// A reply sent by the broker over the control endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Reply {
    #[serde(rename = "client_reg")]
    ClientReg { result: bool },

    #[serde(rename = "pub_reg")]
    PubReg { result: bool },

    #[serde(rename = "sub_reg")]
    SubReg {
        result: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        history: Option<Vec<Value>>,
    },

    #[serde(rename = "pub")]
    Publish { result: bool },

    /// Reply to `disconnect`. The original protocol replies with the bare
    /// string "ACK"; here it's a tagged variant for wire-format
    /// uniformity, but the semantics are identical: always sent, whether
    /// or not a matching publisher record existed.
    #[serde(rename = "ack")]
    Ack,

    #[serde(rename = "ping")]
    Ping { result: bool },

    #[serde(rename = "shutdown")]
    Shutdown { result: bool },

    #[serde(rename = "unknown")]
    Unknown { result: bool },
}

/// The payload broadcast on the reserved `BROKER_CMD` topic each heartbeat
/// tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BrokerCmd {
    #[serde(rename = "heartbeat")]
    Heartbeat,
}
