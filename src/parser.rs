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
//! A concrete CDI Parser (component B's default producer): turns the CDI XML
//! document into the [`CdiDocument`] tree contracted in spec §4.2. The
//! contract itself treats the XML dialect as out of core; this module is one
//! producer of the contracted shape, built on `quick_xml`.
use derive_more::{Display, Error};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{
    model::{CdiDocument, EventItem, Group, IntegerItem, Item, ItemMeta, MapEntry, Segment, StringItem},
    space::MemorySpace,
};

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
#[display(fmt = "CDI parse error at byte {}: {}", position, reason)]
pub struct ParseError {
    pub position: usize,
    pub reason: String,
}

#[derive(Default, Clone)]
struct MetaBuilder {
    name: String,
    description: String,
    /// Text of a `<unit>` child element, carried on `<int>`/`<eventid>`
    /// items as inert metadata (spec expansion §3: restored, not enforced).
    unit: Option<String>,
}

impl MetaBuilder {
    fn build(self, declared_offset: i64) -> ItemMeta {
        ItemMeta {
            name: self.name,
            description: self.description,
            declared_offset,
        }
    }
}

enum Frame {
    Cdi { segments: Vec<Segment> },
    Segment { space: MemorySpace, origin: i64, meta: MetaBuilder, items: Vec<Item> },
    Group { replication: u32, offset: i64, meta: MetaBuilder, items: Vec<Item> },
    Int { size: u8, offset: i64, meta: MetaBuilder, map: Vec<MapEntry> },
    Event { offset: i64, meta: MetaBuilder, map: Vec<MapEntry> },
    Str { size: u8, offset: i64, meta: MetaBuilder },
    Map { relations: Vec<MapEntry> },
    Relation { property: Option<String>, value: Option<String> },
    Unknown { tag: String },
}

/// Parse a CDI XML document into its untyped description-item tree.
pub fn parse_cdi(xml: &str) -> Result<CdiDocument, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut text_tag: Option<&'static str> = None;
    let mut text_buf = String::new();
    let mut result: Option<CdiDocument> = None;

    loop {
        let position = reader.buffer_position();
        match reader.read_event().map_err(|e| ParseError {
            position,
            reason: e.to_string(),
        })? {
            Event::Start(e) => {
                let tag = tag_name(&e);
                handle_start(&tag, &e, &mut stack, &mut text_tag, &mut text_buf, position)?;
            }
            Event::Empty(e) => {
                let tag = tag_name(&e);
                handle_start(&tag, &e, &mut stack, &mut text_tag, &mut text_buf, position)?;
                handle_end(&tag, &mut stack, &mut text_tag, &mut text_buf, &mut result);
            }
            Event::End(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                handle_end(&tag, &mut stack, &mut text_tag, &mut text_buf, &mut result);
            }
            Event::Text(e) => {
                if text_tag.is_some() {
                    let decoded = e.unescape().map_err(|err| ParseError {
                        position,
                        reason: err.to_string(),
                    })?;
                    text_buf.push_str(&decoded);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    result.ok_or_else(|| ParseError {
        position: xml.len(),
        reason: "document contained no <cdi> root element".to_string(),
    })
}

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn get_attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name.as_bytes())
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn get_attr_i64(e: &BytesStart, name: &str, default: i64) -> i64 {
    get_attr(e, name).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn handle_start(
    tag: &str,
    e: &BytesStart,
    stack: &mut Vec<Frame>,
    text_tag: &mut Option<&'static str>,
    text_buf: &mut String,
    position: usize,
) -> Result<(), ParseError> {
    match tag {
        "cdi" => stack.push(Frame::Cdi { segments: Vec::new() }),
        "segment" => {
            let space = get_attr(e, "space")
                .and_then(|s| s.parse::<u8>().ok())
                .ok_or_else(|| ParseError {
                    position,
                    reason: "<segment> is missing a numeric space attribute".to_string(),
                })?;
            let origin = get_attr_i64(e, "origin", 0);
            stack.push(Frame::Segment {
                space: MemorySpace(space),
                origin,
                meta: MetaBuilder::default(),
                items: Vec::new(),
            });
        }
        "group" => {
            let replication = get_attr(e, "replication").and_then(|s| s.parse().ok()).unwrap_or(1);
            let offset = get_attr_i64(e, "offset", 0);
            stack.push(Frame::Group {
                replication,
                offset,
                meta: MetaBuilder::default(),
                items: Vec::new(),
            });
        }
        "int" => {
            let size = get_attr(e, "size").and_then(|s| s.parse().ok()).ok_or_else(|| ParseError {
                position,
                reason: "<int> is missing a numeric size attribute".to_string(),
            })?;
            let offset = get_attr_i64(e, "offset", 0);
            stack.push(Frame::Int {
                size,
                offset,
                meta: MetaBuilder::default(),
                map: Vec::new(),
            });
        }
        "eventid" => {
            let offset = get_attr_i64(e, "offset", 0);
            stack.push(Frame::Event {
                offset,
                meta: MetaBuilder::default(),
                map: Vec::new(),
            });
        }
        "string" => {
            let size = get_attr(e, "size").and_then(|s| s.parse().ok()).ok_or_else(|| ParseError {
                position,
                reason: "<string> is missing a numeric size attribute".to_string(),
            })?;
            let offset = get_attr_i64(e, "offset", 0);
            stack.push(Frame::Str {
                size,
                offset,
                meta: MetaBuilder::default(),
            });
        }
        "name" => {
            *text_tag = Some("name");
            text_buf.clear();
        }
        "description" => {
            *text_tag = Some("description");
            text_buf.clear();
        }
        "unit" => {
            *text_tag = Some("unit");
            text_buf.clear();
        }
        "map" => stack.push(Frame::Map { relations: Vec::new() }),
        "relation" => stack.push(Frame::Relation {
            property: None,
            value: None,
        }),
        "property" => {
            *text_tag = Some("property");
            text_buf.clear();
        }
        "value" => {
            *text_tag = Some("value");
            text_buf.clear();
        }
        other => stack.push(Frame::Unknown { tag: other.to_string() }),
    }
    Ok(())
}

fn handle_end(
    tag: &str,
    stack: &mut Vec<Frame>,
    text_tag: &mut Option<&'static str>,
    text_buf: &mut String,
    result: &mut Option<CdiDocument>,
) {
    match tag {
        "name" => {
            if *text_tag == Some("name") {
                set_meta_field(stack, |m| m.name = std::mem::take(text_buf));
                *text_tag = None;
            }
        }
        "description" => {
            if *text_tag == Some("description") {
                set_meta_field(stack, |m| m.description = std::mem::take(text_buf));
                *text_tag = None;
            }
        }
        "unit" => {
            if *text_tag == Some("unit") {
                set_meta_field(stack, |m| m.unit = Some(std::mem::take(text_buf)));
                *text_tag = None;
            }
        }
        "property" => {
            *text_tag = None;
            if let Some(Frame::Relation { property, .. }) = stack.last_mut() {
                *property = Some(std::mem::take(text_buf));
            }
        }
        "value" => {
            *text_tag = None;
            if let Some(Frame::Relation { value, .. }) = stack.last_mut() {
                *value = Some(std::mem::take(text_buf));
            }
        }
        "relation" => {
            if let Some(Frame::Relation { property, value }) = stack.pop() {
                if let Some(Frame::Map { relations }) = stack.last_mut() {
                    relations.push(MapEntry {
                        value: property.unwrap_or_default(),
                        label: value.unwrap_or_default(),
                    });
                }
            }
        }
        "map" => {
            if let Some(Frame::Map { relations }) = stack.pop() {
                match stack.last_mut() {
                    Some(Frame::Int { map, .. }) => *map = relations,
                    Some(Frame::Event { map, .. }) => *map = relations,
                    _ => {}
                }
            }
        }
        "int" => {
            if let Some(Frame::Int { size, offset, meta, map }) = stack.pop() {
                let unit = meta.unit.clone();
                push_item(
                    stack,
                    Item::Integer(IntegerItem {
                        meta: meta.build(offset),
                        size,
                        unit,
                        map,
                    }),
                );
            }
        }
        "eventid" => {
            if let Some(Frame::Event { offset, meta, map }) = stack.pop() {
                let unit = meta.unit.clone();
                push_item(
                    stack,
                    Item::Event(EventItem {
                        meta: meta.build(offset),
                        unit,
                        map,
                    }),
                );
            }
        }
        "string" => {
            if let Some(Frame::Str { size, offset, meta }) = stack.pop() {
                push_item(
                    stack,
                    Item::String(StringItem {
                        meta: meta.build(offset),
                        size,
                    }),
                );
            }
        }
        "group" => {
            if let Some(Frame::Group {
                replication,
                offset,
                meta,
                items,
            }) = stack.pop()
            {
                push_item(
                    stack,
                    Item::Group(Group {
                        meta: meta.build(offset),
                        replication,
                        items,
                    }),
                );
            }
        }
        "segment" => {
            if let Some(Frame::Segment { space, origin, meta, items }) = stack.pop() {
                let segment = Segment {
                    meta: meta.build(0),
                    space,
                    origin,
                    items,
                };
                if let Some(Frame::Cdi { segments }) = stack.last_mut() {
                    segments.push(segment);
                }
            }
        }
        "cdi" => {
            if let Some(Frame::Cdi { segments }) = stack.pop() {
                *result = Some(CdiDocument::new(segments));
            }
        }
        _ => {
            if let Some(Frame::Unknown { tag }) = stack.pop() {
                push_item(stack, Item::Unknown { tag });
            }
        }
    }
}

fn set_meta_field(stack: &mut [Frame], set: impl FnOnce(&mut MetaBuilder)) {
    if let Some(frame) = stack.last_mut() {
        let meta = match frame {
            Frame::Segment { meta, .. } => meta,
            Frame::Group { meta, .. } => meta,
            Frame::Int { meta, .. } => meta,
            Frame::Event { meta, .. } => meta,
            Frame::Str { meta, .. } => meta,
            _ => return,
        };
        set(meta);
    }
}

fn push_item(stack: &mut [Frame], item: Item) {
    if let Some(frame) = stack.last_mut() {
        match frame {
            Frame::Segment { items, .. } => items.push(item),
            Frame::Group { items, .. } => items.push(item),
            _ => {}
        }
    }
}
