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

use std::cmp;
use std::collections::HashMap;
use std::mem;

use crate::countmin::sketch::CountMinSketch;
use crate::countmin::top_n::TopNEntry;
use crate::countmin::top_n::TopNIndex;
use crate::hash::murmur3_x64_128;

/// Minimum share of sample mass the heavy hitters must carry for a Top-N
/// index to be worthwhile: 10 means one tenth.
const TOP_N_THRESHOLD: u64 = 10;

/// Frequency statistics of one sample, shared by the heavy-hitter cutoff,
/// the population scaling, and the default-value computation.
struct SampleFrequencies {
    sample_size: u64,
    num_top: u32,
    counter: HashMap<Vec<u8>, u64>,
    /// Distinct sample frequencies, descending.
    sorted: Vec<u64>,
    only_once_items: u64,
    /// Sample mass carried by the values selected for the Top-N index.
    sum_top_n: u64,
    /// Smallest frequency selected for the Top-N index.
    last_val: u64,
}

impl SampleFrequencies {
    fn new<B: AsRef<[u8]>>(sample: &[B], num_top: u32) -> Self {
        let mut counter: HashMap<Vec<u8>, u64> = HashMap::new();
        for key in sample {
            *counter.entry(key.as_ref().to_vec()).or_insert(0) += 1;
        }
        let only_once_items = counter.values().filter(|&&cnt| cnt == 1).count() as u64;
        let mut sorted: Vec<u64> = counter.values().copied().collect();
        sorted.sort_unstable_by(|a, b| b.cmp(a));

        let num_top = cmp::min(num_top, sorted.len() as u32);
        let cutoff = num_top as usize;
        let mut sum_top_n = 0;
        let mut last_val = 0;
        // The top `num_top` frequencies are always in. Keep extending while
        // the next frequency is at least 2/3 of the cutoff frequency; a run
        // of equal values ends the extension so the index stops growing at
        // 2 * num_top.
        for i in 0..sorted.len().min(cutoff * 2) {
            if i >= cutoff && (sorted[i] * 3 < sorted[cutoff - 1] * 2 || sorted[i] == sorted[i - 1])
            {
                break;
            }
            last_val = sorted[i];
            sum_top_n += sorted[i];
        }

        SampleFrequencies {
            sample_size: sample.len() as u64,
            num_top,
            counter,
            sorted,
            only_once_items,
            sum_top_n,
            last_val,
        }
    }

    fn sample_ndv(&self) -> u64 {
        self.sorted.len() as u64
    }
}

impl CountMinSketch {
    /// Builds a sketch in one shot from a sample of encoded keys.
    ///
    /// Sampled frequencies are scaled by `max(1, row_count / sample_size)`
    /// to project them back to the population of `row_count` rows. If the
    /// most frequent values carry at least a tenth of the sample, up to
    /// roughly `num_top` of them (at most twice that) are tracked exactly
    /// in a Top-N index instead of the table. The remaining mass the sample
    /// never saw is spread over the estimated unseen distinct values and
    /// recorded as the sketch's default value.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is 0 or `width` is less than 2.
    ///
    /// # Examples
    ///
    /// ```
    /// # use statsketch::countmin::CountMinSketch;
    /// let mut sample: Vec<Vec<u8>> = vec![b"hot".to_vec(); 95];
    /// for i in 0..5u8 {
    ///     sample.push(vec![i]);
    /// }
    /// let sketch = CountMinSketch::with_top_n(5, 2048, &sample, 1, 1000);
    /// // 95 occurrences in a 100-row sample of a 1000-row column.
    /// assert_eq!(sketch.query_bytes(b"hot"), 950);
    /// ```
    pub fn with_top_n<B: AsRef<[u8]>>(
        depth: usize,
        width: usize,
        sample: &[B],
        num_top: u32,
        row_count: u64,
    ) -> Self {
        let freqs = SampleFrequencies::new(sample, num_top);
        let ndv = estimate_ndv(
            freqs.sample_size,
            freqs.sample_ndv(),
            freqs.only_once_items,
            row_count,
        );
        build_with_top_n(depth, width, freqs, ndv, row_count)
    }

    /// Like [`with_top_n`](Self::with_top_n), but with a caller-supplied
    /// population NDV instead of the built-in [`estimate_ndv`].
    pub fn with_top_n_and_ndv<B: AsRef<[u8]>>(
        depth: usize,
        width: usize,
        sample: &[B],
        num_top: u32,
        row_count: u64,
        estimate_ndv: u64,
    ) -> Self {
        let freqs = SampleFrequencies::new(sample, num_top);
        build_with_top_n(depth, width, freqs, estimate_ndv, row_count)
    }
}

fn build_with_top_n(
    depth: usize,
    width: usize,
    mut freqs: SampleFrequencies,
    estimate_ndv: u64,
    row_count: u64,
) -> CountMinSketch {
    let ratio = sample_ratio(freqs.sample_size, row_count);
    let mut sketch = CountMinSketch::new(depth, width);
    let enable_top_n = freqs.sample_size / TOP_N_THRESHOLD <= freqs.sum_top_n;
    let mut scaled_top_n = 0u64;
    let mut index = TopNIndex::new();
    for (data, cnt) in mem::take(&mut freqs.counter) {
        if enable_top_n && cnt >= freqs.last_val {
            let (h1, h2) = murmur3_x64_128(&data);
            scaled_top_n += cnt * ratio;
            index.insert(TopNEntry {
                h1,
                h2,
                data,
                count: cnt * ratio,
            });
        } else {
            sketch.update_bytes_with_count(&data, cnt * ratio);
        }
    }
    let num_top = if enable_top_n {
        index.len() as u32
    } else {
        freqs.num_top
    };
    if enable_top_n {
        sketch.top_n = Some(index);
    }
    sketch.default_value =
        default_value(&freqs, num_top, estimate_ndv, ratio, row_count, scaled_top_n);
    sketch
}

/// Fallback frequency for values outside both the sample and the Top-N
/// index.
///
/// When the Top-N index already covers the population, or the estimated
/// population NDV says nothing lives outside what we tracked, the fallback
/// collapses to 1. Otherwise the population mass not explained by repeated
/// sample values is divided among the estimated unseen distinct values.
fn default_value(
    freqs: &SampleFrequencies,
    num_top: u32,
    estimate_ndv: u64,
    ratio: u64,
    row_count: u64,
    scaled_top_n: u64,
) -> u64 {
    let sample_ndv = freqs.sample_ndv();
    if row_count <= scaled_top_n {
        return 1;
    }
    if estimate_ndv <= u64::from(num_top) {
        return 1;
    }
    if estimate_ndv + freqs.only_once_items <= sample_ndv {
        return 1;
    }
    let seen_mass = (freqs.sample_size - freqs.only_once_items) * ratio;
    let remaining = row_count.saturating_sub(seen_mass);
    remaining / (estimate_ndv + freqs.only_once_items - sample_ndv)
}

/// Sample-to-population expansion factor applied to every sampled count.
fn sample_ratio(sample_size: u64, row_count: u64) -> u64 {
    if sample_size == 0 {
        1
    } else {
        cmp::max(1, row_count / sample_size)
    }
}

/// Estimates the number of distinct values in a population of `row_count`
/// rows from a sample of `sample_size` rows with `sample_ndv` distinct
/// values, `only_once_items` of which occurred exactly once.
///
/// This is the guaranteed-error estimator `sqrt(N/n) * f1 + d - f1` of
/// Charikar, Chaudhuri, Motwani and Narasayya, with two shortcuts: a sample
/// of nothing but singletons is treated as a unique column, and a sample
/// with no singletons is assumed to have seen every distinct value. The
/// result is clamped to `[sample_ndv, row_count]`.
pub fn estimate_ndv(
    sample_size: u64,
    sample_ndv: u64,
    only_once_items: u64,
    row_count: u64,
) -> u64 {
    if sample_size == 0 {
        return 0;
    }
    if only_once_items == sample_size {
        return row_count;
    }
    if only_once_items == 0 {
        return sample_ndv;
    }
    let f1 = only_once_items as f64;
    let n = sample_size as f64;
    let total = row_count as f64;
    let d = sample_ndv as f64;
    let ndv = ((total / n).sqrt() * f1 + d - f1) as u64;
    ndv.clamp(sample_ndv, cmp::max(sample_ndv, row_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_of(counts: &[(&[u8], u64)]) -> Vec<Vec<u8>> {
        let mut sample = Vec::new();
        for (key, cnt) in counts {
            for _ in 0..*cnt {
                sample.push(key.to_vec());
            }
        }
        sample
    }

    #[test]
    fn test_cutoff_keeps_top_frequencies() {
        let sample = sample_of(&[(b"a", 600), (b"b", 300), (b"c", 4), (b"d", 4)]);
        let freqs = SampleFrequencies::new(&sample, 2);
        // 4 * 3 < 300 * 2: the extension stops at the cutoff.
        assert_eq!(freqs.last_val, 300);
        assert_eq!(freqs.sum_top_n, 900);
    }

    #[test]
    fn test_cutoff_extends_past_num_top() {
        let sample = sample_of(&[(b"a", 9), (b"b", 8), (b"c", 7), (b"d", 2)]);
        let freqs = SampleFrequencies::new(&sample, 2);
        // 7 * 3 >= 8 * 2 admits the third value; 2 * 3 < 8 * 2 stops there.
        assert_eq!(freqs.last_val, 7);
        assert_eq!(freqs.sum_top_n, 24);
    }

    #[test]
    fn test_cutoff_stops_at_equal_run() {
        let sample = sample_of(&[(b"a", 9), (b"b", 8), (b"c", 8), (b"d", 7)]);
        let freqs = SampleFrequencies::new(&sample, 2);
        // sorted[2] == sorted[1] ends the extension even though 8 * 3 >= 16.
        assert_eq!(freqs.last_val, 8);
        assert_eq!(freqs.sum_top_n, 17);
    }

    #[test]
    fn test_viability_rejects_flat_sample() {
        // 100 distinct values, two occurrences each: the top 3 carry 6 of
        // 200 samples, well under a tenth, so everything goes to the table.
        let mut sample = Vec::new();
        for i in 0..100u32 {
            sample.push(i.to_be_bytes().to_vec());
            sample.push(i.to_be_bytes().to_vec());
        }
        let sketch = CountMinSketch::with_top_n(5, 2048, &sample, 3, 200);
        assert!(!sketch.has_top_n());
        assert_eq!(sketch.total_count(), 200);
    }

    #[test]
    fn test_unseen_mass_becomes_default_value() {
        // One heavy value and ten singletons in a 100-row sample of a
        // 10000-row column. GEE says sqrt(100) * 10 + 11 - 10 = 101
        // distinct values; the 1000 rows not explained by the repeated
        // value spread over the 100 unseen ones.
        let mut sample = sample_of(&[(b"heavy", 90)]);
        for i in 0..10u32 {
            sample.push(i.to_be_bytes().to_vec());
        }
        let sketch = CountMinSketch::with_top_n(5, 2048, &sample, 1, 10_000);
        assert!(sketch.has_top_n());
        assert_eq!(sketch.query_bytes(b"heavy"), 9_000);
        assert_eq!(sketch.default_value(), 10);
    }

    #[test]
    fn test_top_n_covering_population_defaults_to_one() {
        // All-singleton sample: a unique column. Every sampled value lands
        // in the Top-N index and covers the whole population estimate.
        let sample: Vec<Vec<u8>> = (0..100u32).map(|i| i.to_be_bytes().to_vec()).collect();
        let sketch = CountMinSketch::with_top_n(5, 2048, &sample, 20, 10_000);
        assert!(sketch.has_top_n());
        assert_eq!(sketch.default_value(), 1);
        assert_eq!(sketch.query_bytes(&5u32.to_be_bytes()), 100);
    }

    #[test]
    fn test_estimate_ndv() {
        // All singletons: unique column.
        assert_eq!(estimate_ndv(100, 100, 100, 50_000), 50_000);
        // No singletons: the sample saw everything.
        assert_eq!(estimate_ndv(100, 40, 0, 50_000), 40);
        // GEE: sqrt(10000 / 100) * 10 + 11 - 10 = 101.
        assert_eq!(estimate_ndv(100, 11, 10, 10_000), 101);
        // sqrt(120 / 100) * 89 + 90 - 89 = 98, inside [sample_ndv, row_count].
        assert_eq!(estimate_ndv(100, 90, 89, 120), 98);
        // A population smaller than the sample NDV cannot shrink the answer
        // below what was observed.
        assert_eq!(estimate_ndv(100, 40, 0, 10), 40);
        assert!(estimate_ndv(100, 50, 1, 1_000_000) >= 50);
        // Empty sample knows nothing.
        assert_eq!(estimate_ndv(0, 0, 0, 1_000), 0);
    }

    #[test]
    fn test_ratio_scales_table_counts() {
        // 10 distinct values, ten occurrences each, population 10x the
        // sample and no singletons: no value is heavy enough relative to
        // the rest to clear the viability bar.
        let mut sample = Vec::new();
        for i in 0..10u32 {
            for _ in 0..10 {
                sample.push(i.to_be_bytes().to_vec());
            }
        }
        let sketch = CountMinSketch::with_top_n(5, 2048, &sample, 0, 1_000);
        assert!(!sketch.has_top_n());
        // Each sampled count of 10 is projected to 100.
        assert_eq!(sketch.query_bytes(&3u32.to_be_bytes()), 100);
    }
}
