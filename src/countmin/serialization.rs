// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::io::Cursor;
use std::io::Read;
use std::mem::size_of;

use byteorder::ReadBytesExt;
use byteorder::LE;

use crate::countmin::sketch::CountMinSketch;
use crate::countmin::top_n::TopNEntry;
use crate::countmin::top_n::TopNIndex;
use crate::error::Error;
use crate::hash::murmur3_x64_128;

pub(super) const PREAMBLE_LONGS: u8 = 2;
pub(super) const SERIAL_VERSION: u8 = 1;
pub(super) const COUNTMIN_TOPN_FAMILY_ID: u8 = 18;
pub(super) const FLAGS_HAS_TOP_N: u8 = 1 << 0;

const MAX_TABLE_ENTRIES: usize = 1 << 30;

impl CountMinSketch {
    /// Serializes the sketch, externalizing Top-N key bytes.
    ///
    /// Returns the wire blob plus the Top-N key payloads in the order their
    /// entries appear on the wire, so callers can store keys in a separate
    /// column of a key-value store. The blob itself carries only the exact
    /// counts; [`decode`](Self::decode) re-attaches the payloads by
    /// position.
    ///
    /// A sketch that holds no counts at all encodes to an absent blob.
    pub fn encode(&self) -> (Option<Vec<u8>>, Vec<Vec<u8>>) {
        if self.is_empty() {
            return (None, Vec::new());
        }

        let entries = self
            .top_n
            .as_ref()
            .map(TopNIndex::sorted_entries)
            .unwrap_or_default();
        let header_size = PREAMBLE_LONGS as usize * 8 + size_of::<u64>();
        let table_size = self.table.len() * size_of::<u32>();
        let top_n_size = size_of::<u32>() + entries.len() * (size_of::<u64>() + size_of::<u32>());
        let mut bytes = Vec::with_capacity(header_size + table_size + top_n_size);

        bytes.push(PREAMBLE_LONGS);
        bytes.push(SERIAL_VERSION);
        bytes.push(COUNTMIN_TOPN_FAMILY_ID);
        bytes.push(if self.top_n.is_some() {
            FLAGS_HAS_TOP_N
        } else {
            0
        });
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(self.depth as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.width as u32).to_le_bytes());
        bytes.extend_from_slice(&self.default_value.to_le_bytes());
        for counter in &self.table {
            bytes.extend_from_slice(&counter.to_le_bytes());
        }

        if self.top_n.is_none() {
            return (Some(bytes), Vec::new());
        }
        let mut payloads = Vec::with_capacity(entries.len());
        bytes.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for entry in entries {
            bytes.extend_from_slice(&entry.count.to_le_bytes());
            // Key bytes travel in the side channel; the wire record keeps
            // only an empty length slot.
            bytes.extend_from_slice(&0u32.to_le_bytes());
            payloads.push(entry.data.clone());
        }
        (Some(bytes), payloads)
    }

    /// Deserializes a sketch, re-attaching externalized Top-N key bytes.
    ///
    /// Empty `data` decodes to `Ok(None)`: absence is the wire form of a
    /// sketch with nothing in it. `top_n_payloads` is consulted when its
    /// length matches the number of Top-N entries on the wire; entries may
    /// alternatively carry their key bytes inline. The table-side `count`
    /// is reconstructed as the sum of row 0.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::BrokenTopN`](crate::error::ErrorKind) if any Top-N
    /// entry ends up with no key bytes, and
    /// [`ErrorKind::InvalidData`](crate::error::ErrorKind) for a malformed
    /// blob. No partial sketch is returned on failure.
    pub fn decode(data: &[u8], top_n_payloads: &[Vec<u8>]) -> Result<Option<Self>, Error> {
        if data.is_empty() {
            return Ok(None);
        }
        fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
            move |_| Error::insufficient_data(tag)
        }

        let mut cursor = Cursor::new(data);
        let preamble_longs = cursor.read_u8().map_err(make_error("preamble_longs"))?;
        let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
        let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
        let flags = cursor.read_u8().map_err(make_error("flags"))?;
        cursor.read_u32::<LE>().map_err(make_error("unused32"))?;

        if family_id != COUNTMIN_TOPN_FAMILY_ID {
            return Err(Error::invalid_family(
                COUNTMIN_TOPN_FAMILY_ID,
                family_id,
                "CountMinSketch",
            ));
        }
        if serial_version != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(
                SERIAL_VERSION,
                serial_version,
            ));
        }
        if preamble_longs != PREAMBLE_LONGS {
            return Err(Error::invalid_preamble_longs(PREAMBLE_LONGS, preamble_longs));
        }

        let depth = cursor.read_u32::<LE>().map_err(make_error("depth"))? as usize;
        let width = cursor.read_u32::<LE>().map_err(make_error("width"))? as usize;
        if depth == 0 {
            return Err(Error::deserial("depth must be at least 1"));
        }
        if width < 2 {
            return Err(Error::deserial("width must be at least 2"));
        }
        let entries = depth
            .checked_mul(width)
            .ok_or_else(|| Error::deserial("depth * width overflows usize"))?;
        if entries >= MAX_TABLE_ENTRIES {
            return Err(Error::deserial(format!(
                "depth * width must be < {MAX_TABLE_ENTRIES}",
            )));
        }

        let mut sketch = CountMinSketch::new(depth, width);
        sketch.default_value = cursor
            .read_u64::<LE>()
            .map_err(make_error("default_value"))?;
        for counter in sketch.table.iter_mut() {
            *counter = cursor.read_u32::<LE>().map_err(make_error("counters"))?;
        }
        sketch.count = sketch.table[..width].iter().map(|&c| u64::from(c)).sum();

        if (flags & FLAGS_HAS_TOP_N) != 0 {
            let num_entries = cursor.read_u32::<LE>().map_err(make_error("top_n_len"))? as usize;
            let attach = top_n_payloads.len() == num_entries;
            let mut index = TopNIndex::new();
            for i in 0..num_entries {
                let count = cursor.read_u64::<LE>().map_err(make_error("top_n count"))?;
                let data_len = cursor.read_u32::<LE>().map_err(make_error("top_n data len"))? as usize;
                let mut data = vec![0u8; data_len];
                cursor
                    .read_exact(&mut data)
                    .map_err(make_error("top_n data"))?;
                if attach {
                    data = top_n_payloads[i].clone();
                }
                if data.is_empty() {
                    return Err(Error::broken_top_n(format!(
                        "entry {i} of {num_entries} has no key bytes, inline or side-channel",
                    )));
                }
                let (h1, h2) = murmur3_x64_128(&data);
                index.insert(TopNEntry {
                    h1,
                    h2,
                    data,
                    count,
                });
            }
            sketch.top_n = Some(index);
        }

        Ok(Some(sketch))
    }
}
