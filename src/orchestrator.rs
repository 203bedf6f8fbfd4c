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
//! The Orchestrator (component G): drives Source Reader → Parser → Layout
//! Resolver, then triggers the Memory-Space Caches' prefill, publishing
//! lifecycle state changes to observers along the way.
use std::sync::{Arc, RwLock};

use derive_more::Display;
use futures::future::join_all;

use crate::{
    cache::CacheConfig,
    entry::{EntryKey, Root},
    layout::{self, LayoutError},
    parser::{self, ParseError},
    reader::CdiSourceReader,
    registry::CacheRegistry,
    transport::{Transport, TransportError},
};

/// The four distinct, fire-once-per-event notifications from spec §6
/// (`UPDATE_STATE`, `UPDATE_REP`, `UPDATE_CACHE_COMPLETE`,
/// `UPDATE_ENTRY_DATA`), expressed as trait methods instead of a single
/// stringly-typed callback — Rust's trait system gives the four tags static
/// distinctness for free.
pub trait Observer: Send + Sync {
    /// `UPDATE_STATE`: fires on every state transition, with a human
    /// readable description (`Failed`'s description is the failure
    /// message).
    fn on_state_changed(&self, state: &State) {
        let _ = state;
    }

    /// `UPDATE_REP`: fires exactly once, when the resolved representation
    /// becomes available.
    fn on_representation_ready(&self, root: &Arc<Root>) {
        let _ = root;
    }

    /// `UPDATE_CACHE_COMPLETE`: fires exactly once per `start()`, after
    /// every registered space's prefill has completed.
    fn on_cache_complete(&self) {}

    /// `UPDATE_ENTRY_DATA`: fires whenever the cached bytes backing `key`
    /// change.
    fn on_entry_data(&self, key: &EntryKey) {
        let _ = key;
    }
}

#[derive(Debug, Clone, Display, PartialEq, Eq)]
pub enum State {
    #[display(fmt = "uninitialized")]
    Uninitialized,
    #[display(fmt = "fetching CDI document")]
    Fetching,
    #[display(fmt = "parsing CDI document")]
    Parsing,
    #[display(fmt = "representation ready")]
    Ready,
    #[display(fmt = "prefilling memory-space caches")]
    Prefilling,
    #[display(fmt = "cache complete")]
    CacheComplete,
    #[display(fmt = "failed: {}", _0)]
    Failed(String),
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Failed(_) | State::CacheComplete)
    }
}

#[derive(Debug, Display)]
pub enum OrchestratorError {
    #[display(fmt = "{}", _0)]
    Transport(TransportError),
    #[display(fmt = "{}", _0)]
    Parse(ParseError),
    #[display(fmt = "{}", _0)]
    Layout(LayoutError),
}

impl std::error::Error for OrchestratorError {}

/// Drives one node's CDI representation from `Uninitialized` through
/// `CacheComplete` (or `Failed`), per the state machine in spec §4.7.
pub struct Orchestrator {
    node: String,
    reader: CdiSourceReader,
    registry: Arc<CacheRegistry>,
    state: RwLock<State>,
    observers: Arc<RwLock<Vec<Arc<dyn Observer>>>>,
    root: RwLock<Option<Arc<Root>>>,
}

impl Orchestrator {
    pub fn new(node: impl Into<String>, transport: Arc<dyn Transport>, cache_config: CacheConfig) -> Self {
        let node = node.into();
        Self {
            reader: CdiSourceReader::new(node.clone(), transport.clone()),
            registry: Arc::new(CacheRegistry::new(node.clone(), transport, cache_config)),
            node,
            state: RwLock::new(State::Uninitialized),
            observers: Arc::new(RwLock::new(Vec::new())),
            root: RwLock::new(None),
        }
    }

    /// Register an observer. Observers added before [`Orchestrator::start`]
    /// see the full lifecycle sequence (spec §5).
    pub fn add_observer(&self, observer: Arc<dyn Observer>) {
        self.observers.write().unwrap().push(observer);
    }

    pub fn state(&self) -> State {
        self.state.read().unwrap().clone()
    }

    pub fn representation(&self) -> Option<Arc<Root>> {
        self.root.read().unwrap().clone()
    }

    pub fn cache_registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    fn set_state(&self, state: State) {
        if state.is_terminal() {
            tracing::error!(node = %self.node, state = %state, "CDI representation terminal state");
        } else {
            tracing::info!(node = %self.node, state = %state, "CDI representation state changed");
        }
        *self.state.write().unwrap() = state.clone();
        for observer in self.observers.read().unwrap().iter() {
            observer.on_state_changed(&state);
        }
    }

    /// Run the full lifecycle once: fetch, parse, resolve, prefill. A
    /// `Failed` transition is terminal for this instance (spec §4.7); the
    /// transport may still deliver late responses to already-registered
    /// range listeners afterwards, which is tolerated — it just means those
    /// entries' cached bytes still update, with no further effect on this
    /// state machine.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        self.set_state(State::Fetching);
        let xml = match self.reader.fetch().await {
            Ok(xml) => xml,
            Err(err) => {
                self.set_state(State::Failed(err.to_string()));
                return Err(OrchestratorError::Transport(err));
            }
        };

        self.set_state(State::Parsing);
        let document = match parser::parse_cdi(&xml) {
            Ok(doc) => doc,
            Err(err) => {
                self.set_state(State::Failed(err.to_string()));
                return Err(OrchestratorError::Parse(err));
            }
        };
        let root = match layout::resolve(&document) {
            Ok(root) => Arc::new(root),
            Err(err) => {
                self.set_state(State::Failed(err.to_string()));
                return Err(OrchestratorError::Layout(err));
            }
        };

        *self.root.write().unwrap() = Some(root.clone());
        self.set_state(State::Ready);
        for observer in self.observers.read().unwrap().iter() {
            observer.on_representation_ready(&root);
        }

        self.set_state(State::Prefilling);
        self.register_prefill(&root);
        let caches = self.registry.all();
        join_all(caches.iter().map(|c| c.fill_cache())).await;

        self.set_state(State::CacheComplete);
        for observer in self.observers.read().unwrap().iter() {
            observer.on_cache_complete();
        }
        Ok(())
    }

    /// Register every leaf entry's byte range with its space's cache, and
    /// attach a listener that re-emits `UPDATE_ENTRY_DATA` (both to the
    /// entry's own observer list and to this orchestrator's observers) when
    /// the backing bytes change.
    fn register_prefill(&self, root: &Arc<Root>) {
        for entry in root.iter_all() {
            if !entry.is_leaf() {
                continue;
            }
            let header = entry.header();
            let cache = self.registry.get_or_create(header.space);
            let (lo, hi) = header.range();
            cache.add_range_to_cache(lo, hi);

            let root = root.clone();
            let key = header.key.clone();
            let observers = self.observers.clone();
            cache.add_range_listener(
                lo,
                hi,
                Arc::new(move || {
                    if let Some(found) = root.find(key.as_str()) {
                        found.header().notify();
                    }
                    for observer in observers.read().unwrap().iter() {
                        observer.on_entry_data(&key);
                    }
                }),
            );
        }
    }
}
