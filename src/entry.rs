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
//! The resolved entry tree: the Layout Resolver's (component C) output and
//! the Typed Accessors' (component E) and Visitor's (component F) input.
use std::{
    fmt,
    sync::{Arc, RwLock},
};

use crate::{model::ItemMeta, space::MemorySpace};

/// Dotted-path identifier of an entry, unique across a resolved tree (spec
/// §3 invariant). Cheaply cloneable, following the teacher's `ArcVal<str>`
/// convention for strings that get handed around a lot (entry lookups,
/// observer registration keys).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey(Arc<str>);

impl EntryKey {
    pub fn new(s: impl Into<String>) -> Self {
        EntryKey(Arc::from(s.into().into_boxed_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a child key by appending `.name`.
    pub fn child(&self, name: &str) -> Self {
        EntryKey::new(format!("{}.{}", self.0, name))
    }

    /// Build a replica key by appending `(index)` with a 0-based index, per
    /// spec §4.3's key-construction rule.
    pub fn replica(&self, index: u32) -> Self {
        EntryKey::new(format!("{}({})", self.0, index))
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntryKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A change-notification callback attached to a single entry. Fired after
/// the underlying [`crate::cache::MemorySpaceCache`] range backing this
/// entry is updated (`UPDATE_ENTRY_DATA`, spec §6).
pub type EntryObserver = Arc<dyn Fn() + Send + Sync>;

/// Fields shared by every entry variant (spec §3: "Every entry has...").
pub struct EntryHeader {
    pub space: MemorySpace,
    pub origin: i64,
    pub size: i64,
    pub key: EntryKey,
    observers: RwLock<Vec<EntryObserver>>,
}

impl EntryHeader {
    pub fn new(space: MemorySpace, origin: i64, size: i64, key: EntryKey) -> Self {
        Self {
            space,
            origin,
            size,
            key,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Half-open byte interval `[origin, origin + size)` this entry occupies
    /// in `space`.
    pub fn range(&self) -> (i64, i64) {
        (self.origin, self.origin + self.size)
    }

    /// Register an observer. May be called at any point in the entry's
    /// lifetime (spec §3: "Per-entry observer lists may be mutated
    /// anytime").
    pub fn add_observer(&self, obs: EntryObserver) {
        self.observers.write().unwrap().push(obs);
    }

    /// Fire every registered observer, in registration order. Does not hold
    /// the lock while calling out, matching the deadlock-free callback
    /// contract required of the cache in spec §5.
    pub fn notify(&self) {
        let observers = self.observers.read().unwrap().clone();
        for obs in observers {
            obs();
        }
    }
}

impl fmt::Debug for EntryHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryHeader")
            .field("space", &self.space)
            .field("origin", &self.origin)
            .field("size", &self.size)
            .field("key", &self.key)
            .finish()
    }
}

#[derive(Debug)]
pub struct SegmentEntry {
    pub header: EntryHeader,
    pub children: Vec<Entry>,
}

#[derive(Debug)]
pub struct GroupEntry {
    pub header: EntryHeader,
    pub replication: u32,
    /// If `replication <= 1`, these are the group's items resolved in
    /// place. If `replication > 1`, these are [`Entry::GroupRep`] replicas
    /// (spec §3/§4.3).
    pub children: Vec<Entry>,
}

#[derive(Debug)]
pub struct GroupRepEntry {
    pub header: EntryHeader,
    /// 1-based display index of this replica (spec §4.3: the key uses a
    /// 0-based index, but the displayed/human index is 1-based).
    pub index: u32,
    pub children: Vec<Entry>,
}

#[derive(Debug)]
pub struct IntegerEntry {
    pub header: EntryHeader,
    pub meta: ItemMeta,
    pub unit: Option<String>,
    pub map: Vec<crate::model::MapEntry>,
}

#[derive(Debug)]
pub struct EventEntry {
    pub header: EntryHeader,
    pub meta: ItemMeta,
    pub unit: Option<String>,
    pub map: Vec<crate::model::MapEntry>,
}

#[derive(Debug)]
pub struct StringEntry {
    pub header: EntryHeader,
    pub meta: ItemMeta,
}

/// A node in the resolved tree: a tagged sum over the six entry variants
/// from spec §3, matched externally by the visitor rather than dispatched
/// virtually (design notes §9: "polymorphism over entries").
#[derive(Debug)]
pub enum Entry {
    Segment(SegmentEntry),
    Group(GroupEntry),
    GroupRep(GroupRepEntry),
    Integer(IntegerEntry),
    Event(EventEntry),
    String(StringEntry),
}

impl Entry {
    pub fn header(&self) -> &EntryHeader {
        match self {
            Entry::Segment(e) => &e.header,
            Entry::Group(e) => &e.header,
            Entry::GroupRep(e) => &e.header,
            Entry::Integer(e) => &e.header,
            Entry::Event(e) => &e.header,
            Entry::String(e) => &e.header,
        }
    }

    pub fn children(&self) -> &[Entry] {
        match self {
            Entry::Segment(e) => &e.children,
            Entry::Group(e) => &e.children,
            Entry::GroupRep(e) => &e.children,
            Entry::Integer(_) | Entry::Event(_) | Entry::String(_) => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Entry::Integer(_) | Entry::Event(_) | Entry::String(_))
    }

    /// Depth-first iterator over this entry and all of its descendants.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        EntryIter { stack: vec![self] }
    }
}

struct EntryIter<'a> {
    stack: Vec<&'a Entry>,
}

impl<'a> Iterator for EntryIter<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.stack.pop()?;
        for child in entry.children().iter().rev() {
            self.stack.push(child);
        }
        Some(entry)
    }
}

/// The root of a resolved CDI representation: a container whose children are
/// segments (spec §4.3: `resolve(rep) -> Root`). Stored as `Entry` so the
/// whole tree, segments included, can be walked with one iterator; every
/// element is guaranteed to be an [`Entry::Segment`] by construction.
#[derive(Debug)]
pub struct Root {
    pub segments: Vec<Entry>,
}

impl Root {
    pub fn new(segments: Vec<SegmentEntry>) -> Self {
        Self {
            segments: segments.into_iter().map(Entry::Segment).collect(),
        }
    }

    /// Find an entry anywhere in the tree (segments included) by its dotted
    /// key.
    pub fn find(&self, key: &str) -> Option<&Entry> {
        self.iter_all().find(|e| e.header().key.as_str() == key)
    }

    /// Depth-first iterator over every entry in the tree, segments included.
    pub fn iter_all(&self) -> impl Iterator<Item = &Entry> {
        self.segments.iter().flat_map(Entry::iter)
    }
}
