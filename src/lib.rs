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

//! Compact, lossy frequency summaries for point-query cardinality estimation.
//!
//! The crate provides a [Count-Min sketch](https://en.wikipedia.org/wiki/Count-min_sketch)
//! variant used by relational query optimizers to estimate the selectivity of
//! `column = value` predicates over a sampled column. On top of the classical
//! probabilistic counting table it keeps a small side index of heavy-hitter
//! values with *exact* counts, so heavily skewed distributions do not degrade
//! estimation quality, and a fallback frequency for values that were never
//! sampled at all.
//!
//! Keys are opaque byte strings; what they encode is the caller's business.
//!
//! # Usage
//!
//! ```rust
//! use statsketch::countmin::CountMinSketch;
//!
//! let mut sketch = CountMinSketch::new(5, 2048);
//! sketch.insert_bytes(b"apple");
//! sketch.insert_bytes(b"apple");
//! sketch.insert_bytes(b"banana");
//!
//! assert_eq!(sketch.query_bytes(b"apple"), 2);
//! assert_eq!(sketch.total_count(), 3);
//! ```
//!
//! Sketches built from a sample scale the observed counts up to the
//! population and may track the most frequent values exactly:
//!
//! ```rust
//! use statsketch::countmin::CountMinSketch;
//!
//! let mut sample: Vec<Vec<u8>> = Vec::new();
//! for _ in 0..900 {
//!     sample.push(b"hot".to_vec());
//! }
//! for i in 0..100u32 {
//!     sample.push(i.to_be_bytes().to_vec());
//! }
//! let row_count = sample.len() as u64;
//! let sketch = CountMinSketch::with_top_n(5, 2048, &sample, 1, row_count);
//!
//! assert_eq!(sketch.query_bytes(b"hot"), 900);
//! ```
//!
//! A sketch is single-writer: construct, mutate, and serialize it from one
//! thread, then publish it immutably for concurrent readers.

pub mod countmin;
pub mod error;

pub(crate) mod hash;
