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

//! Count-Min sketch with an exact Top-N side index.
//!
//! The sketch estimates point-query cardinalities (`column = value`) from a
//! fixed-size table of counters. Unlike the classical Count-Min formulation
//! it corrects each row for expected collision noise and answers with the
//! median of the corrected rows, capped by the raw minimum. Two additions
//! keep estimates useful on sampled, skewed data:
//!
//! - a **Top-N index** tracking the most frequent values exactly, decided at
//!   build time from the sample's frequency distribution;
//! - a **default value**, the estimated frequency of an average value the
//!   sample never saw, returned when the table answer is implausibly low.
//!
//! # Usage
//!
//! ```rust
//! use statsketch::countmin::CountMinSketch;
//! use statsketch::countmin::DEFAULT_DEPTH;
//! use statsketch::countmin::DEFAULT_WIDTH;
//!
//! let mut sketch = CountMinSketch::new(DEFAULT_DEPTH, DEFAULT_WIDTH);
//! sketch.insert_bytes(b"k1");
//! sketch.insert_bytes(b"k1");
//! assert_eq!(sketch.query_bytes(b"k1"), 2);
//!
//! let (blob, payloads) = sketch.encode();
//! let decoded = CountMinSketch::decode(&blob.unwrap(), &payloads).unwrap();
//! assert_eq!(decoded.unwrap(), sketch);
//! ```

mod builder;
mod serialization;
mod sketch;
mod top_n;

pub use self::builder::estimate_ndv;
pub use self::sketch::CountMinSketch;

/// Table depth used by analyze executors unless configured otherwise.
pub const DEFAULT_DEPTH: usize = 5;
/// Table width used by analyze executors unless configured otherwise.
pub const DEFAULT_WIDTH: usize = 2048;
