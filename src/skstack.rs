// SKSTACK/IP
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
pub mod active_scan;
pub mod authn;
pub mod command;
pub mod join;
#[cfg(test)]
pub mod mock;
pub mod parser;
pub mod sendto;
pub mod skrxd;
pub mod transport;

pub use active_scan::NetworkInfo;
pub use command::{CommandSession, Shape};
pub use join::{JoinState, NetworkJoin, Session};
pub use sendto::command_from_echonetliteframe;
pub use skrxd::*;
pub use transport::{LineTransport, Port};
