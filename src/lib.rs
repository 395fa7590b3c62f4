// illustrator-relay/src/lib.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Command relay between a Socket.IO proxy and a document host.
//!
//! The proxy sends `command_packet` events naming an action and its
//! parameters; the relay runs the matching handler against the [`host::Host`]
//! and answers with a `command_packet_response` envelope.

pub mod color;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod host;
pub mod log;
pub mod panel;
pub mod protocol;
