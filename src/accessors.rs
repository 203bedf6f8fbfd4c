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
//! Typed Accessors (component E): encode/decode integers, event IDs, and
//! strings against cached byte windows. None of these talk to a transport
//! directly — they all route through a [`CacheRegistry`]-resolved
//! [`MemorySpaceCache`].
use std::fmt;

use crate::{
    cache::WriteError,
    entry::{EntryHeader, EventEntry, IntegerEntry, StringEntry},
    registry::CacheRegistry,
};

/// An 8-byte OpenLCB event identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventId(pub [u8; 8]);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

/// Decode `bytes` most-significant-byte-first into a `u64`.
///
/// Bytes are `u8`, so widening with `as u64` is always a zero-extension —
/// there is no sign bit to accidentally propagate. This is the corrected
/// form of the subtle bug noted in spec §9 (some historical
/// implementations "unsign" a byte with `p += 128`, which is wrong; the
/// only correct operation is an unsigned mask/widen, which is what plain
/// unsigned-byte arithmetic already gives here).
pub(crate) fn decode_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Encode the low `size` bytes of `value` most-significant-byte-first,
/// silently truncating any higher bits (spec §4.5).
pub(crate) fn encode_be(value: u64, size: u8) -> Vec<u8> {
    (0..size).map(|i| (value >> (8 * (size - 1 - i) as u32)) as u8).collect()
}

pub struct IntegerAccessor<'a> {
    registry: &'a CacheRegistry,
    header: &'a EntryHeader,
}

impl<'a> IntegerAccessor<'a> {
    pub fn new(registry: &'a CacheRegistry, entry: &'a IntegerEntry) -> Self {
        Self {
            registry,
            header: &entry.header,
        }
    }

    /// Read the cached bytes and decode them big-endian. Returns `0` if the
    /// bytes are not (yet) cached, per spec §4.5 — integers have no
    /// separate "unknown" state.
    pub fn get(&self) -> u64 {
        let cache = self.registry.get_or_create(self.header.space);
        match cache.read(self.header.origin, self.header.size) {
            Some(bytes) => decode_be(&bytes),
            None => 0,
        }
    }

    /// Encode `value` big-endian, truncating high bits that do not fit in
    /// this entry's byte size, and write it through the cache.
    pub async fn set(&self, value: u64) -> Result<(), WriteError> {
        let cache = self.registry.get_or_create(self.header.space);
        let bytes = encode_be(value, self.header.size as u8);
        cache.write(self.header.origin, bytes).await
    }
}

pub struct EventAccessor<'a> {
    registry: &'a CacheRegistry,
    header: &'a EntryHeader,
}

impl<'a> EventAccessor<'a> {
    pub fn new(registry: &'a CacheRegistry, entry: &'a EventEntry) -> Self {
        Self {
            registry,
            header: &entry.header,
        }
    }

    pub fn get(&self) -> Option<EventId> {
        let cache = self.registry.get_or_create(self.header.space);
        let bytes = cache.read(self.header.origin, 8)?;
        let mut id = [0u8; 8];
        id.copy_from_slice(&bytes);
        Some(EventId(id))
    }

    pub async fn set(&self, event: EventId) -> Result<(), WriteError> {
        let cache = self.registry.get_or_create(self.header.space);
        cache.write(self.header.origin, event.0.to_vec()).await
    }
}

pub struct StringAccessor<'a> {
    registry: &'a CacheRegistry,
    header: &'a EntryHeader,
}

impl<'a> StringAccessor<'a> {
    pub fn new(registry: &'a CacheRegistry, entry: &'a StringEntry) -> Self {
        Self {
            registry,
            header: &entry.header,
        }
    }

    /// Read the fixed-size buffer, scan for the first `0x00`, and decode the
    /// prefix as UTF-8. Returns `None` if the buffer is not fully cached.
    pub fn get(&self) -> Option<String> {
        let cache = self.registry.get_or_create(self.header.space);
        let bytes = cache.read(self.header.origin, self.header.size)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Encode `value` as UTF-8, truncate to fit in `size - 1` bytes (always
    /// leaving room for a terminating `0x00`), zero-pad the remainder, and
    /// write the whole buffer through the cache (spec §4.5).
    pub async fn set(&self, value: &str) -> Result<(), WriteError> {
        let cache = self.registry.get_or_create(self.header.space);
        let size = self.header.size as usize;
        let mut buf = vec![0u8; size];
        let encoded = value.as_bytes();
        let copy_len = encoded.len().min(size.saturating_sub(1));
        buf[..copy_len].copy_from_slice(&encoded[..copy_len]);
        cache.write(self.header.origin, buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_be_does_not_sign_extend() {
        // High bit set: the historically buggy `p += 128` unsigning would
        // corrupt this. Plain unsigned widening must not.
        assert_eq!(decode_be(&[0x80]), 0x80);
        assert_eq!(decode_be(&[0x12, 0x34, 0x56, 0x78]), 0x12345678);
    }

    #[test]
    fn encode_be_truncates_high_bits() {
        assert_eq!(encode_be(0x1_0000_00FF, 1), vec![0xFF]);
        assert_eq!(encode_be(0x1234, 2), vec![0x12, 0x34]);
    }

    #[test]
    fn event_id_display_is_dotted_hex() {
        let id = EventId([0x05, 0x01, 0x01, 0x01, 0x01, 0x77, 0x00, 0x05]);
        assert_eq!(id.to_string(), "05.01.01.01.01.77.00.05");
    }
}
