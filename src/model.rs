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
//! The untyped description-item tree that a CDI parser produces.
//!
//! This is the collaborator contract of component B in the CDI representation
//! engine: the parser itself (XML dialect, schema validation, entities) is out
//! of core. Only the shape below is contracted. [`crate::parser`] ships one
//! concrete producer of this shape built on `quick-xml`; it is not the only
//! possible one — a hand test fixture or another dialect's reader can build
//! the same tree and feed it to [`crate::layout::resolve`].
use crate::space::MemorySpace;

/// A value/label pair from a CDI `<map><relation>` table, carried as inert
/// metadata (not enforced, per the Non-goals: variable semantics are not
/// interpreted by this crate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub value: String,
    pub label: String,
}

/// Metadata common to every description item: name, human-readable
/// description, and the declared offset (in bytes, relative to the current
/// layout cursor) at which it starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemMeta {
    pub name: String,
    pub description: String,
    pub declared_offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerItem {
    pub meta: ItemMeta,
    pub size: u8,
    /// Engineering unit label from the CDI `<min>`/`<max>`/`<default>`
    /// sibling `<unit>` element, if present. Inert metadata (Non-goals:
    /// not enforced).
    pub unit: Option<String>,
    pub map: Vec<MapEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventItem {
    pub meta: ItemMeta,
    /// See [`IntegerItem::unit`].
    pub unit: Option<String>,
    pub map: Vec<MapEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringItem {
    pub meta: ItemMeta,
    pub size: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub meta: ItemMeta,
    /// Number of times this group repeats; `1` means "not replicated".
    pub replication: u32,
    pub items: Vec<Item>,
}

/// One description item: a container (`Group`) or one of the three leaf
/// kinds. `Segment` is deliberately not a variant here — per the
/// container/item duality in the design notes, a segment is both a
/// top-level container and, for addressing purposes, an item with its own
/// offset, but it never nests inside another container, so it is modeled as
/// its own top-level type rather than forced through this enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Group(Group),
    Integer(IntegerItem),
    Event(EventItem),
    String(StringItem),
    /// An item kind the parser did not recognize. Carries only enough to let
    /// the resolver log and skip it (spec's `UnknownItem`, §4.3/§7).
    Unknown { tag: String },
}

impl Item {
    pub fn meta(&self) -> Option<&ItemMeta> {
        match self {
            Item::Group(g) => Some(&g.meta),
            Item::Integer(i) => Some(&i.meta),
            Item::Event(e) => Some(&e.meta),
            Item::String(s) => Some(&s.meta),
            Item::Unknown { .. } => None,
        }
    }
}

/// A top-level CDI segment: bound to a specific `(space, origin)` and, like a
/// group, a container of items in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub meta: ItemMeta,
    pub space: MemorySpace,
    pub origin: i64,
    pub items: Vec<Item>,
}

/// The parsed CDI document: an ordered sequence of segments. This is the
/// output shape the Layout Resolver (component C) consumes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CdiDocument {
    segments: Vec<Segment>,
}

impl CdiDocument {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Ordered sequence of segments, per the parser contract in spec §4.2.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}
