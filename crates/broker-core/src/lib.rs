// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry, ownership-strength selection, durability history and wire
//! protocol for the pub/sub broker. No sockets or runtime live here —
//! `broker-server` and `broker-client` own the I/O, this crate owns the
//! rules.

pub mod dispatcher;
pub mod error;
pub mod heartbeat;
pub mod protocol;
pub mod registry;

pub use dispatcher::{dispatch, Effect};
pub use error::ProtocolError;
pub use registry::{BrokerState, Stats, HEARTBEAT_MS, INIT_COUNT};
