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
//! `quickcheck::Arbitrary` instances for the description-item tree, used by
//! the property tests in [`crate::layout`]. Gated behind the `arb` feature
//! exactly like the teacher's own `arb` module, which hand-writes
//! `Arbitrary` for its domain types rather than deriving them (recursive
//! trees need bounded-depth generation, which `#[derive(Arbitrary)]` cannot
//! express).
use quickcheck::{Arbitrary, Gen};

use crate::{
    model::{CdiDocument, EventItem, Group, IntegerItem, Item, ItemMeta, Segment, StringItem},
    space::MemorySpace,
};

const MAX_DEPTH: u32 = 2;
const MAX_ITEMS: usize = 4;
const MAX_REPLICATION: u32 = 3;

fn arbitrary_name(g: &mut Gen) -> String {
    let choices: Vec<char> = ('a'..='z').collect();
    let len = (usize::arbitrary(g) % 6) + 1;
    (0..len).map(|_| *g.choose(&choices).unwrap()).collect()
}

fn arbitrary_meta(g: &mut Gen) -> ItemMeta {
    ItemMeta {
        name: arbitrary_name(g),
        description: String::new(),
        declared_offset: (u8::arbitrary(g) % 4) as i64,
    }
}

fn arbitrary_item(g: &mut Gen, depth: u32) -> Item {
    let choices: &[u32] = if depth >= MAX_DEPTH { &[0, 1, 2] } else { &[0, 1, 2, 3] };
    match *g.choose(choices).unwrap() {
        0 => Item::Integer(IntegerItem {
            meta: arbitrary_meta(g),
            size: *g.choose(&[1u8, 2, 4, 8]).unwrap(),
            unit: None,
            map: Vec::new(),
        }),
        1 => Item::Event(EventItem {
            meta: arbitrary_meta(g),
            unit: None,
            map: Vec::new(),
        }),
        2 => Item::String(StringItem {
            meta: arbitrary_meta(g),
            size: (u8::arbitrary(g) % 16) + 1,
        }),
        _ => Item::Group(arbitrary_group(g, depth + 1)),
    }
}

fn arbitrary_group(g: &mut Gen, depth: u32) -> Group {
    let count = (usize::arbitrary(g) % MAX_ITEMS) + 1;
    Group {
        meta: arbitrary_meta(g),
        replication: (u32::arbitrary(g) % MAX_REPLICATION) + 1,
        items: (0..count).map(|_| arbitrary_item(g, depth)).collect(),
    }
}

/// A bounded-depth, bounded-width random CDI document, suitable for the
/// resolver's property tests (spec §8). Wrapped rather than implemented
/// directly on [`CdiDocument`] so callers that need an unwrapped document
/// can still construct one by hand without going through `Arbitrary`.
#[derive(Debug, Clone)]
pub struct ArbitraryDocument(pub CdiDocument);

impl Arbitrary for ArbitraryDocument {
    fn arbitrary(g: &mut Gen) -> Self {
        let count = (usize::arbitrary(g) % 3) + 1;
        let segments = (0..count)
            .map(|i| {
                let item_count = (usize::arbitrary(g) % MAX_ITEMS) + 1;
                Segment {
                    meta: ItemMeta {
                        name: format!("seg{}", i),
                        description: String::new(),
                        declared_offset: 0,
                    },
                    space: MemorySpace(i as u8),
                    origin: (u8::arbitrary(g) % 8) as i64,
                    items: (0..item_count).map(|_| arbitrary_item(g, 0)).collect(),
                }
            })
            .collect();
        ArbitraryDocument(CdiDocument::new(segments))
    }
}
