/*
 * Copyright 2021 Actyx AG
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */
//! The bus transport collaborator (spec §6): the on-wire framing that
//! carries memory-configuration datagrams is out of core. Only the
//! operations below are contracted; a real implementation sits on top of a
//! CAN/TCP/USB OpenLCB transport and is injected into the
//! [`crate::orchestrator::Orchestrator`] and [`crate::cache::MemorySpaceCache`].
use async_trait::async_trait;
use derive_more::{Display, Error};

use crate::space::MemorySpace;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[display(fmt = "transport error talking to node {}: {}", node, reason)]
    Failed { node: String, reason: String },
    #[display(fmt = "node {} did not respond in time", node)]
    Timeout { node: String },
}

/// The three operations the core needs from a bus transport (spec §6).
///
/// Implementations must tolerate callbacks/responses arriving after the
/// owning [`crate::orchestrator::Orchestrator`] has moved to `Failed` — the
/// core does not cancel in-flight requests (spec §5), it just ignores their
/// results once failed.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read the CDI space as a character stream, terminated by a `0x00` byte
    /// or the end of the space, whichever comes first.
    async fn read_cdi_stream(&self, node: &str) -> Result<String, TransportError>;

    /// Read `length` bytes starting at `offset` in `space` on `node`.
    async fn read_bytes(
        &self,
        node: &str,
        space: MemorySpace,
        offset: i64,
        length: u32,
    ) -> Result<Vec<u8>, TransportError>;

    /// Write `bytes` starting at `offset` in `space` on `node`, returning
    /// once the remote node has acknowledged the write.
    async fn write_bytes(
        &self,
        node: &str,
        space: MemorySpace,
        offset: i64,
        bytes: Vec<u8>,
    ) -> Result<(), TransportError>;
}
