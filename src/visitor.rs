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
//! Uniform traversal of the resolved entry tree (component F). Parameterised
//! by per-variant callbacks with sensible descend-by-default behavior, so a
//! caller that only cares about leaves can implement `visit_leaf` alone.
use crate::entry::{Entry, EventEntry, GroupEntry, GroupRepEntry, IntegerEntry, Root, SegmentEntry, StringEntry};

pub trait Visitor {
    fn visit_segment(&mut self, entry: &SegmentEntry) {
        walk(self, &entry.children);
    }

    fn visit_group(&mut self, entry: &GroupEntry) {
        walk(self, &entry.children);
    }

    fn visit_group_rep(&mut self, entry: &GroupRepEntry) {
        walk(self, &entry.children);
    }

    fn visit_int(&mut self, _entry: &IntegerEntry) {}

    fn visit_event(&mut self, _entry: &EventEntry) {}

    fn visit_string(&mut self, _entry: &StringEntry) {}

    /// Fallback invoked, by default, after every leaf-specific `visit_*`
    /// call (Integer, Event, String) so a caller that only cares about
    /// leaves in general can override this one method instead of all three.
    fn visit_leaf(&mut self, _entry: &Entry) {}
}

/// Walk `entries` in declared order, dispatching each to the matching
/// `visit_*` method. Replicas of a repeated group are visited in ascending
/// index order, which holds automatically since `GroupEntry::children` is
/// already stored in that order (spec §4.6).
pub fn walk<V: Visitor + ?Sized>(visitor: &mut V, entries: &[Entry]) {
    for entry in entries {
        visit_one(visitor, entry);
    }
}

fn visit_one<V: Visitor + ?Sized>(visitor: &mut V, entry: &Entry) {
    match entry {
        Entry::Segment(e) => visitor.visit_segment(e),
        Entry::Group(e) => visitor.visit_group(e),
        Entry::GroupRep(e) => visitor.visit_group_rep(e),
        Entry::Integer(e) => {
            visitor.visit_int(e);
            visitor.visit_leaf(entry);
        }
        Entry::Event(e) => {
            visitor.visit_event(e);
            visitor.visit_leaf(entry);
        }
        Entry::String(e) => {
            visitor.visit_string(e);
            visitor.visit_leaf(entry);
        }
    }
}

/// Walk an entire resolved representation, segments included.
pub fn walk_root<V: Visitor + ?Sized>(visitor: &mut V, root: &Root) {
    walk(visitor, &root.segments);
}
