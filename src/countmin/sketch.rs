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

use crate::countmin::top_n::TopNIndex;
use crate::error::Error;
use crate::hash::murmur3_x64_128;

/// Count-Min sketch with an exact Top-N side index, used to estimate the
/// cardinality of point queries over a sampled column.
///
/// The probabilistic table answers with a noise-corrected median-of-rows
/// estimate; values heavy enough to be tracked exactly bypass the table
/// entirely, and values too rare to have been sampled fall back to a
/// precomputed default frequency.
///
/// The sketch is single-writer. Concurrent reads are safe only while no
/// thread mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct CountMinSketch {
    pub(super) depth: usize,
    pub(super) width: usize,
    /// Sum of all increments routed to the table; Top-N counts are not
    /// included.
    pub(super) count: u64,
    /// Estimated frequency of an average unseen value, returned when the
    /// table answer is implausibly low. Zero disables the fallback.
    pub(super) default_value: u64,
    /// Saturation-free `depth x width` counters, row-major. Cells wrap on
    /// overflow.
    pub(super) table: Vec<u32>,
    pub(super) top_n: Option<TopNIndex>,
}

impl CountMinSketch {
    /// Creates an empty sketch with the given dimensions.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is 0 or `width` is less than 2.
    ///
    /// # Examples
    ///
    /// ```
    /// # use statsketch::countmin::CountMinSketch;
    /// let sketch = CountMinSketch::new(5, 2048);
    /// assert_eq!(sketch.total_count(), 0);
    /// assert_eq!(sketch.query_bytes(b"anything"), 0);
    /// ```
    pub fn new(depth: usize, width: usize) -> Self {
        assert!(depth >= 1, "depth must be at least 1");
        assert!(width >= 2, "width must be at least 2");
        CountMinSketch {
            depth,
            width,
            count: 0,
            default_value: 0,
            table: vec![0; depth * width],
            top_n: None,
        }
    }

    /// Returns the number of rows in the counting table.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the number of counters per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the sum of all increments routed to the table.
    ///
    /// Counts held by the Top-N index are not part of this total.
    pub fn total_count(&self) -> u64 {
        self.count
    }

    /// Returns the fallback frequency for values the sample never saw.
    pub fn default_value(&self) -> u64 {
        self.default_value
    }

    /// Returns true if a Top-N index was built for this sketch.
    ///
    /// Sketches with a Top-N index refuse to [merge](Self::merge).
    pub fn has_top_n(&self) -> bool {
        self.top_n.is_some()
    }

    /// Returns true if the sketch holds no counts at all.
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.top_n.as_ref().map_or(true, TopNIndex::is_empty)
    }

    /// Hashes a key the way the sketch does, returning both 64-bit halves.
    ///
    /// The pair addresses the same bucket in every sketch of this crate, so
    /// callers can use it with [`set_value`](Self::set_value).
    pub fn hash(bytes: &[u8]) -> (u64, u64) {
        murmur3_x64_128(bytes)
    }

    // Row `i` reads column (h1 + i * h2) mod width.
    #[inline]
    fn position(&self, row: usize, h1: u64, h2: u64) -> usize {
        let col = h1.wrapping_add(h2.wrapping_mul(row as u64)) % self.width as u64;
        row * self.width + col as usize
    }

    /// Inserts one occurrence of the key.
    ///
    /// If the key is tracked by the Top-N index its exact count is bumped
    /// and the table is left untouched; otherwise every row's cell for the
    /// key is incremented with wrapping arithmetic.
    pub fn insert_bytes(&mut self, bytes: &[u8]) {
        self.update_bytes_with_count(bytes, 1);
    }

    /// Inserts `n` occurrences of the key in one step.
    pub(crate) fn update_bytes_with_count(&mut self, bytes: &[u8], n: u64) {
        let (h1, h2) = murmur3_x64_128(bytes);
        if let Some(top_n) = self.top_n.as_mut() {
            if top_n.increment(h1, h2, bytes, n) {
                return;
            }
        }
        self.count = self.count.wrapping_add(n);
        for row in 0..self.depth {
            let pos = self.position(row, h1, h2);
            self.table[pos] = self.table[pos].wrapping_add(n as u32);
        }
    }

    /// Returns the estimated count of the key.
    ///
    /// Top-N members answer exactly. Everything else gets the table
    /// estimate, or the default value when the estimate is implausibly low
    /// for a sketch built from a sample.
    pub fn query_bytes(&self, bytes: &[u8]) -> u64 {
        let (h1, h2) = murmur3_x64_128(bytes);
        if let Some(count) = self
            .top_n
            .as_ref()
            .and_then(|top_n| top_n.get(h1, h2, bytes))
        {
            return count;
        }
        self.query_hash_value(h1, h2)
    }

    /// Table-side estimate for a bucket address; the Top-N index is never
    /// consulted.
    pub(super) fn query_hash_value(&self, h1: u64, h2: u64) -> u64 {
        let mut vals = vec![0u32; self.depth];
        let mut min_counter = u32::MAX;
        for (row, val) in vals.iter_mut().enumerate() {
            let cell = self.table[self.position(row, h1, h2)];
            min_counter = min_counter.min(cell);
            // Every other key is expected to contribute count/width to this
            // cell; subtract that expectation, clamping at zero.
            let noise = self.count.wrapping_sub(u64::from(cell)) / (self.width as u64 - 1);
            *val = if u64::from(cell) < noise {
                0
            } else {
                cell - noise as u32
            };
        }
        vals.sort_unstable();
        // Integer median: lower middle plus half the gap, not the mean of
        // the two middles. Cross-implementation sketches must agree on this
        // bit-exactly.
        let mut res =
            vals[(self.depth - 1) / 2] + (vals[self.depth / 2] - vals[(self.depth - 1) / 2]) / 2;
        if res > min_counter {
            res = min_counter;
        }
        if self.consider_default(u64::from(res)) {
            // A value this rare in the sample stands in for a broader
            // residual population.
            return self.default_value;
        }
        u64::from(res)
    }

    pub(super) fn consider_default(&self, cnt: u64) -> bool {
        cnt < 2 * (self.count / self.width as u64) && self.default_value > 0
    }

    /// Overwrites the count of the bucket addressed by `(h1, h2)`, e.g. to
    /// graft in better information from a histogram bucket.
    ///
    /// The Top-N index is unaffected. The delta against the previous
    /// estimate is applied to every row with wrapping arithmetic, so the
    /// new value may be lower than the old one.
    pub fn set_value(&mut self, h1: u64, h2: u64, count: u32) {
        let ori = self.query_hash_value(h1, h2);
        if self.consider_default(ori) {
            // Blend instead of overwriting so repeated calibration cannot
            // collapse the fallback to zero. The coefficients currently
            // cancel out.
            let blended =
                (self.default_value as f64 * 0.95 + self.default_value as f64 * 0.05) as u64;
            self.default_value = blended.max(1);
        }
        self.count = self.count.wrapping_add(u64::from(count)).wrapping_sub(ori);
        let delta = count.wrapping_sub(ori as u32);
        for row in 0..self.depth {
            let pos = self.position(row, h1, h2);
            self.table[pos] = self.table[pos].wrapping_add(delta);
        }
    }

    /// Merges another sketch into this one by pointwise counter addition.
    ///
    /// Only plain sketches merge: pointwise summation of two Top-N indices
    /// could silently lose values that are heavy on one side only, and the
    /// default values cannot be recombined.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::DimensionMismatch`](crate::error::ErrorKind) if the
    /// dimensions differ, [`ErrorKind::TopNNotMergeable`](crate::error::ErrorKind)
    /// if either operand carries a Top-N index. The failed merge leaves both
    /// sketches untouched.
    pub fn merge(&mut self, other: &CountMinSketch) -> Result<(), Error> {
        if self.depth != other.depth || self.width != other.width {
            return Err(Error::dimension_mismatch(
                "dimensions of Count-Min sketches should be the same",
            )
            .with_context("left", format!("{}x{}", self.depth, self.width))
            .with_context("right", format!("{}x{}", other.depth, other.width)));
        }
        if self.top_n.is_some() || other.top_n.is_some() {
            return Err(Error::top_n_not_mergeable());
        }
        self.count = self.count.wrapping_add(other.count);
        for (dst, src) in self.table.iter_mut().zip(other.table.iter()) {
            *dst = dst.wrapping_add(*src);
        }
        Ok(())
    }
}
