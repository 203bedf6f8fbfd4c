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
//! Client-side Configuration Description Information (CDI) representation
//! engine for OpenLCB/LCC nodes.
//!
//! A remote node publishes an XML document describing its configuration
//! variables and the byte layout of those variables across one or more
//! numbered memory spaces. This crate retrieves and parses that document,
//! builds an in-memory tree whose leaves are typed variables bound to
//! absolute `(space, offset, size)` byte ranges, and serves typed reads and
//! writes against those ranges through a cached window over the node's
//! memory, coordinating asynchronous transport I/O.
//!
//! ```text
//! Orchestrator -> CdiSourceReader -> parser::parse_cdi -> layout::resolve
//!              -> MemorySpaceCache (registered, prefilled) -> observers notified
//! ```

pub mod accessors;
#[cfg(any(test, feature = "arb"))]
pub mod arb;
pub mod cache;
pub mod entry;
pub mod layout;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod reader;
pub mod registry;
pub mod space;
pub mod transport;
pub mod visitor;

pub use accessors::{EventAccessor, EventId, IntegerAccessor, StringAccessor};
pub use cache::{CacheConfig, MemorySpaceCache, WriteError};
pub use entry::{Entry, EntryKey, Root};
pub use layout::LayoutError;
pub use model::CdiDocument;
pub use orchestrator::{Observer, Orchestrator, OrchestratorError, State};
pub use parser::ParseError;
pub use reader::CdiSourceReader;
pub use registry::CacheRegistry;
pub use space::MemorySpace;
pub use transport::{Transport, TransportError};
pub use visitor::Visitor;
