//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! The pluggable bytes↔value boundary used by the network transports.
//!
//! A [`Codec`] is a two-method contract: `encode(value) → bytes` and
//! `decode(bytes) → value`, with the roundtrip being an identity for every
//! supported value. Two implementations are provided:
//!
//! - [`JsonCodec`]: general purpose, self-describing, human-inspectable.
//! - [`CompactCodec`]: postcard; the wire form carries no type tags at all,
//!   which is the compact path for envelope-heavy traffic where both ends
//!   already know the schema.
//!
//! Both are stateless and safe for concurrent use by many threads. Failures
//! on either direction produce [`BusError::Serialization`].

use crate::error::BusError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes and deserializes the values that cross a transport: the
/// envelope itself, argument payloads, and results.
///
/// Implementations must be `Send + Sync + 'static`; a single codec instance
/// is shared by every dispatcher, receiver, and pump thread of a transport.
pub trait Codec: Send + Sync + 'static {
    /// Encodes a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Serialization`] if the value cannot be
    /// represented in this codec's format.
    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, BusError>
    where
        T: Serialize + ?Sized;

    /// Decodes bytes back into a value of the expected type.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Serialization`] if the bytes are corrupt,
    /// truncated, or encode a different shape than `T`.
    fn decode<T>(&self, bytes: &[u8]) -> Result<T, BusError>
    where
        T: DeserializeOwned;

    /// Short name of the wire format, for logs.
    fn name(&self) -> &'static str;
}

/// General-purpose JSON codec.
///
/// Self-describing and easy to inspect on the wire; the right default while
/// integrating or debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Creates a new JSON codec.
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, BusError>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value).map_err(|e| BusError::Serialization(e.to_string()))
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<T, BusError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(|e| BusError::Serialization(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Compact binary codec built on postcard.
///
/// Emits no field names or type tags, so both ends must agree on the
/// envelope schema, which they do, since both ends are this crate. Use it
/// when wire size or encode cost matters more than inspectability.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactCodec;

impl CompactCodec {
    /// Creates a new compact codec.
    pub fn new() -> Self {
        Self
    }
}

impl Codec for CompactCodec {
    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, BusError>
    where
        T: Serialize + ?Sized,
    {
        postcard::to_stdvec(value).map_err(|e| BusError::Serialization(e.to_string()))
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<T, BusError>
    where
        T: DeserializeOwned,
    {
        postcard::from_bytes(bytes).map_err(|e| BusError::Serialization(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "postcard"
    }
}
