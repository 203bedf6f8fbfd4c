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
//! The Layout Resolver (component C): walks the untyped description tree
//! ([`crate::model`]) and assigns every leaf an absolute `(space, origin,
//! size)` byte address, expanding replicated groups and nested offsets along
//! the way.
use derive_more::{Display, Error};

use crate::{
    entry::{Entry, EntryHeader, EntryKey, EventEntry, GroupEntry, GroupRepEntry, IntegerEntry, Root, SegmentEntry, StringEntry},
    model::{CdiDocument, Group, Item, Segment},
    space::MemorySpace,
};

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[display(fmt = "item {} has a negative declared offset ({})", key, offset)]
    NegativeOffset { key: String, offset: i64 },
    #[display(fmt = "item {} is missing required size metadata", key)]
    MissingSize { key: String },
    #[display(fmt = "group {} has an invalid replication count ({})", key, replication)]
    InvalidReplication { key: String, replication: u32 },
}

/// Resolve a parsed CDI document into its addressed entry tree.
///
/// Per spec §4.3, each group-like container maintains a running cursor
/// initialised to its starting absolute address; every item advances the
/// cursor by its declared offset, is assigned the cursor as its origin, and
/// then advances the cursor again by its own size. A container's own size is
/// the distance the cursor moved while resolving it.
pub fn resolve(doc: &CdiDocument) -> Result<Root, LayoutError> {
    let mut segments = Vec::with_capacity(doc.segments().len());
    for segment in doc.segments() {
        segments.push(resolve_segment(segment)?);
    }
    Ok(Root::new(segments))
}

fn resolve_segment(segment: &Segment) -> Result<SegmentEntry, LayoutError> {
    let key = EntryKey::new(&segment.meta.name);
    let (children, size) = resolve_items(&segment.items, segment.origin, segment.space, &key)?;
    Ok(SegmentEntry {
        header: EntryHeader::new(segment.space, segment.origin, size, key),
        children,
    })
}

/// Lay out one container's items starting at `start_origin`. Returns the
/// resolved children in declared order and the container's total size
/// (`cursor_final - start_origin`).
fn resolve_items(
    items: &[Item],
    start_origin: i64,
    space: MemorySpace,
    parent_key: &EntryKey,
) -> Result<(Vec<Entry>, i64), LayoutError> {
    let mut origin = start_origin;
    let mut children = Vec::with_capacity(items.len());

    for item in items {
        match item {
            Item::Unknown { tag } => {
                // Spec §4.3/§7: unknown item kinds are skipped with a
                // warning, preserving the cursor — they contribute no size.
                tracing::warn!(tag = %tag, parent = %parent_key, "skipping unknown CDI item kind");
                continue;
            }
            Item::Integer(int_item) => {
                let key = parent_key.child(&int_item.meta.name);
                origin = advance(origin, int_item.meta.declared_offset, &key)?;
                if int_item.size == 0 {
                    return Err(LayoutError::MissingSize { key: key.to_string() });
                }
                let size = int_item.size as i64;
                children.push(Entry::Integer(IntegerEntry {
                    header: EntryHeader::new(space, origin, size, key),
                    meta: int_item.meta.clone(),
                    unit: int_item.unit.clone(),
                    map: int_item.map.clone(),
                }));
                origin += size;
            }
            Item::Event(event_item) => {
                let key = parent_key.child(&event_item.meta.name);
                origin = advance(origin, event_item.meta.declared_offset, &key)?;
                const EVENT_SIZE: i64 = 8;
                children.push(Entry::Event(EventEntry {
                    header: EntryHeader::new(space, origin, EVENT_SIZE, key),
                    meta: event_item.meta.clone(),
                    unit: event_item.unit.clone(),
                    map: event_item.map.clone(),
                }));
                origin += EVENT_SIZE;
            }
            Item::String(string_item) => {
                let key = parent_key.child(&string_item.meta.name);
                origin = advance(origin, string_item.meta.declared_offset, &key)?;
                if string_item.size == 0 {
                    return Err(LayoutError::MissingSize { key: key.to_string() });
                }
                let size = string_item.size as i64;
                children.push(Entry::String(StringEntry {
                    header: EntryHeader::new(space, origin, size, key),
                    meta: string_item.meta.clone(),
                }));
                origin += size;
            }
            Item::Group(group) => {
                let key = parent_key.child(&group.meta.name);
                origin = advance(origin, group.meta.declared_offset, &key)?;
                let (entry, size) = resolve_group(group, origin, space, &key)?;
                children.push(entry);
                origin += size;
            }
        }
    }

    Ok((children, origin - start_origin))
}

fn advance(origin: i64, declared_offset: i64, key: &EntryKey) -> Result<i64, LayoutError> {
    if declared_offset < 0 {
        return Err(LayoutError::NegativeOffset {
            key: key.to_string(),
            offset: declared_offset,
        });
    }
    Ok(origin + declared_offset)
}

fn resolve_group(group: &Group, origin: i64, space: MemorySpace, key: &EntryKey) -> Result<(Entry, i64), LayoutError> {
    if group.replication == 0 {
        return Err(LayoutError::InvalidReplication {
            key: key.to_string(),
            replication: group.replication,
        });
    }

    if group.replication <= 1 {
        let (children, size) = resolve_items(&group.items, origin, space, key)?;
        let entry = Entry::Group(GroupEntry {
            header: EntryHeader::new(space, origin, size, key.clone()),
            replication: 1,
            children,
        });
        return Ok((entry, size));
    }

    // Replicated group: resolve one repeat to determine its size `S`, then
    // lay out the remaining repeats contiguously at `origin + i * S`
    // (spec §4.3/§8 property 2).
    let mut reps = Vec::with_capacity(group.replication as usize);
    let mut rep_size = 0i64;
    for i in 0..group.replication {
        let rep_key = key.replica(i);
        let rep_origin = origin + i as i64 * rep_size;
        let (children, size) = resolve_items(&group.items, rep_origin, space, &rep_key)?;
        if i == 0 {
            rep_size = size;
        }
        reps.push(Entry::GroupRep(GroupRepEntry {
            header: EntryHeader::new(space, rep_origin, size, rep_key),
            index: i + 1,
            children,
        }));
    }
    let total_size = rep_size * group.replication as i64;
    let entry = Entry::Group(GroupEntry {
        header: EntryHeader::new(space, origin, total_size, key.clone()),
        replication: group.replication,
        children: reps,
    });
    Ok((entry, total_size))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use quickcheck::quickcheck;

    use super::*;
    use crate::{
        arb::ArbitraryDocument,
        model::{EventItem, ItemMeta, Segment},
    };

    fn meta(name: &str, offset: i64) -> ItemMeta {
        ItemMeta {
            name: name.to_string(),
            description: String::new(),
            declared_offset: offset,
        }
    }

    /// Scenario 1 (spec §8): single integer at offset 4 in a segment at
    /// origin 0.
    #[test]
    fn single_integer_scenario() {
        let doc = CdiDocument::new(vec![Segment {
            meta: meta("root", 0),
            space: MemorySpace(251),
            origin: 0,
            items: vec![Item::Integer(crate::model::IntegerItem {
                meta: meta("v", 4),
                size: 2,
                unit: None,
                map: Vec::new(),
            })],
        }]);
        let root = resolve(&doc).unwrap();
        let leaf = root.find("root.v").unwrap();
        let header = leaf.header();
        assert_eq!(header.space, MemorySpace(251));
        assert_eq!(header.origin, 4);
        assert_eq!(header.size, 2);
    }

    /// Scenario 2 (spec §8): a 3x-replicated group of two uint8 fields.
    #[test]
    fn repeated_group_scenario() {
        let doc = CdiDocument::new(vec![Segment {
            meta: meta("root", 0),
            space: MemorySpace(1),
            origin: 0,
            items: vec![Item::Group(Group {
                meta: meta("g", 0),
                replication: 3,
                items: vec![
                    Item::Integer(crate::model::IntegerItem {
                        meta: meta("a", 0),
                        size: 1,
                        unit: None,
                        map: Vec::new(),
                    }),
                    Item::Integer(crate::model::IntegerItem {
                        meta: meta("b", 1),
                        size: 1,
                        unit: None,
                        map: Vec::new(),
                    }),
                ],
            })],
        }]);
        let root = resolve(&doc).unwrap();
        let group = root.find("root.g").unwrap();
        assert_eq!(group.header().size, 6);
        for i in 0..3i64 {
            let rep = root.find(&format!("root.g({})", i)).unwrap();
            assert_eq!(rep.header().origin, i * 2);
            let a = root.find(&format!("root.g({}).a", i)).unwrap();
            let b = root.find(&format!("root.g({}).b", i)).unwrap();
            assert_eq!(a.header().origin, rep.header().origin);
            assert_eq!(b.header().origin, rep.header().origin + 1);
        }
    }

    /// Scenario 3 (spec §8): nested offsets inside a segment at origin 100.
    #[test]
    fn nested_offsets_scenario() {
        let doc = CdiDocument::new(vec![Segment {
            meta: meta("root", 0),
            space: MemorySpace(2),
            origin: 100,
            items: vec![
                Item::Integer(crate::model::IntegerItem {
                    meta: meta("i", 8),
                    size: 4,
                    unit: None,
                    map: Vec::new(),
                }),
                Item::String(crate::model::StringItem {
                    meta: meta("s", 4),
                    size: 16,
                }),
            ],
        }]);
        let root = resolve(&doc).unwrap();
        let int_entry = root.find("root.i").unwrap();
        assert_eq!(int_entry.header().origin, 108);
        assert_eq!(int_entry.header().size, 4);
        let string_entry = root.find("root.s").unwrap();
        assert_eq!(string_entry.header().origin, 116);
        assert_eq!(string_entry.header().size, 16);
        let segment = root.segments.first().unwrap();
        assert_eq!(segment.header().size, 32);
    }

    #[test]
    fn negative_offset_is_rejected() {
        let doc = CdiDocument::new(vec![Segment {
            meta: meta("root", 0),
            space: MemorySpace(0),
            origin: 0,
            items: vec![Item::Event(EventItem { meta: meta("e", -1), unit: None, map: Vec::new() })],
        }]);
        assert!(matches!(resolve(&doc), Err(LayoutError::NegativeOffset { .. })));
    }

    #[test]
    fn zero_replication_is_rejected() {
        let doc = CdiDocument::new(vec![Segment {
            meta: meta("root", 0),
            space: MemorySpace(0),
            origin: 0,
            items: vec![Item::Group(Group {
                meta: meta("g", 0),
                replication: 0,
                items: vec![Item::Event(EventItem { meta: meta("e", 0), unit: None, map: Vec::new() })],
            })],
        }]);
        assert!(matches!(resolve(&doc), Err(LayoutError::InvalidReplication { .. })));
    }

    #[test]
    fn unknown_item_is_skipped_without_consuming_cursor() {
        let doc = CdiDocument::new(vec![Segment {
            meta: meta("root", 0),
            space: MemorySpace(0),
            origin: 0,
            items: vec![
                Item::Unknown { tag: "mystery".to_string() },
                Item::Event(EventItem { meta: meta("e", 0), unit: None, map: Vec::new() }),
            ],
        }]);
        let root = resolve(&doc).unwrap();
        let e = root.find("root.e").unwrap();
        assert_eq!(e.header().origin, 0);
    }

    quickcheck! {
        /// Property 1 (spec §8): every leaf entry's byte range is disjoint
        /// from every other leaf entry's in the same space.
        fn leaf_ranges_are_disjoint_per_space(doc: ArbitraryDocument) -> bool {
            let root = match resolve(&doc.0) {
                Ok(root) => root,
                Err(_) => return true,
            };
            let mut by_space: HashMap<MemorySpace, Vec<(i64, i64)>> = HashMap::new();
            for entry in root.iter_all() {
                if entry.is_leaf() {
                    let h = entry.header();
                    by_space.entry(h.space).or_default().push(h.range());
                }
            }
            for ranges in by_space.values() {
                for i in 0..ranges.len() {
                    for j in (i + 1)..ranges.len() {
                        let (a_lo, a_hi) = ranges[i];
                        let (b_lo, b_hi) = ranges[j];
                        if a_lo < b_hi && b_lo < a_hi {
                            return false;
                        }
                    }
                }
            }
            true
        }

        /// Property 2 (spec §8): a replicated group's size is `R * S` and
        /// replica `i`'s origin is `group.origin + i * S`.
        fn replicated_group_geometry(doc: ArbitraryDocument) -> bool {
            let root = match resolve(&doc.0) {
                Ok(root) => root,
                Err(_) => return true,
            };
            for entry in root.iter_all() {
                if let Entry::Group(group) = entry {
                    if group.replication <= 1 {
                        continue;
                    }
                    if group.children.len() != group.replication as usize {
                        return false;
                    }
                    let rep_size = group.header.size / group.replication as i64;
                    if group.header.size != rep_size * group.replication as i64 {
                        return false;
                    }
                    for (i, child) in group.children.iter().enumerate() {
                        let expected_origin = group.header.origin + i as i64 * rep_size;
                        if child.header().origin != expected_origin {
                            return false;
                        }
                    }
                }
            }
            true
        }
    }
}
