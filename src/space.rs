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
use std::fmt;

/// Identifies a numbered memory space (0..=255) on a remote node, addressable via
/// the bus's memory-configuration protocol.
///
/// The CDI space itself (the one the [`crate::reader`] fetches the XML document
/// from) is conventionally `0xFF`, matching the OpenLCB memory-configuration
/// protocol's reserved space number for configuration description.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemorySpace(pub u8);

impl MemorySpace {
    /// The well-known space carrying the CDI XML document.
    pub const CDI: MemorySpace = MemorySpace(0xFF);

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "space {}", self.0)
    }
}

impl From<u8> for MemorySpace {
    fn from(n: u8) -> Self {
        MemorySpace(n)
    }
}

#[cfg(any(test, feature = "arb"))]
impl quickcheck::Arbitrary for MemorySpace {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        MemorySpace(u8::arbitrary(g))
    }
}
