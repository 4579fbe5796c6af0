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

use std::collections::HashMap;

/// An exact heavy-hitter record.
///
/// `h1` keys the bucket; `(h2, data)` disambiguates within it. The original
/// key bytes are kept so that a 128-bit hash collision cannot conflate two
/// values and so that the entry survives serialization.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TopNEntry {
    pub(crate) h1: u64,
    pub(crate) h2: u64,
    pub(crate) data: Vec<u8>,
    pub(crate) count: u64,
}

/// Exact side index for the most frequent values, consulted ahead of the
/// probabilistic table.
///
/// Buckets are keyed by the first hash half; expected bucket size is a
/// handful of entries at most, so lookups probe linearly.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TopNIndex {
    buckets: HashMap<u64, Vec<TopNEntry>>,
}

impl TopNIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all buckets.
    pub(crate) fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub(crate) fn insert(&mut self, entry: TopNEntry) {
        self.buckets.entry(entry.h1).or_default().push(entry);
    }

    /// Returns the exact count for the key, if it is tracked.
    pub(crate) fn get(&self, h1: u64, h2: u64, data: &[u8]) -> Option<u64> {
        self.buckets.get(&h1)?.iter().find_map(|entry| {
            if entry.h2 == h2 && entry.data == data {
                Some(entry.count)
            } else {
                None
            }
        })
    }

    /// Adds `delta` to the key's exact count. Returns false if the key is
    /// not tracked; the caller then routes the increment to the table.
    pub(crate) fn increment(&mut self, h1: u64, h2: u64, data: &[u8], delta: u64) -> bool {
        let Some(bucket) = self.buckets.get_mut(&h1) else {
            return false;
        };
        for entry in bucket.iter_mut() {
            if entry.h2 == h2 && entry.data == data {
                entry.count += delta;
                return true;
            }
        }
        false
    }

    /// Iterates buckets in ascending `h1` order, entries in bucket order.
    ///
    /// The ordering makes the wire form deterministic; decode re-inserts
    /// entries in this order, so a round trip preserves bucket contents.
    pub(crate) fn sorted_entries(&self) -> Vec<&TopNEntry> {
        let mut keys: Vec<u64> = self.buckets.keys().copied().collect();
        keys.sort_unstable();
        let mut entries = Vec::with_capacity(self.len());
        for key in keys {
            entries.extend(self.buckets[&key].iter());
        }
        entries
    }
}
