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
//! The CDI Source Reader (component A): obtains the raw CDI XML as a
//! character stream from the remote node's CDI memory space.
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::transport::{Transport, TransportError};

/// Fetches the CDI document from a single node. Serializes concurrent
/// fetches so at most one is ever in flight per instance (spec §4.1).
pub struct CdiSourceReader {
    node: String,
    transport: Arc<dyn Transport>,
    in_flight: Mutex<()>,
}

impl CdiSourceReader {
    pub fn new(node: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            node: node.into(),
            transport,
            in_flight: Mutex::new(()),
        }
    }

    /// Fetch the CDI XML as a character stream, stripping any trailing
    /// `0x00` padding the transport left in place.
    pub async fn fetch(&self) -> Result<String, TransportError> {
        let _guard = self.in_flight.lock().await;
        let raw = self.transport.read_cdi_stream(&self.node).await?;
        let trimmed = raw.trim_end_matches('\0').to_string();
        tracing::debug!(node = %self.node, bytes = trimmed.len(), "fetched CDI document");
        Ok(trimmed)
    }
}
