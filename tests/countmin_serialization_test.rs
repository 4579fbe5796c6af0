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

use googletest::assert_that;
use googletest::prelude::eq;

use statsketch::countmin::CountMinSketch;
use statsketch::error::ErrorKind;

fn top_n_sketch() -> CountMinSketch {
    let mut sample = Vec::new();
    for _ in 0..500 {
        sample.push(b"heavy-hitter-payload-one".to_vec());
    }
    for _ in 0..300 {
        sample.push(b"heavy-hitter-payload-two".to_vec());
    }
    for i in 0..40u32 {
        sample.push(format!("tail-value-{i}").into_bytes());
    }
    let row_count = sample.len() as u64;
    let sketch = CountMinSketch::with_top_n(5, 2048, &sample, 2, row_count);
    assert!(sketch.has_top_n());
    sketch
}

#[test]
fn test_empty_sketch_encodes_to_absent() {
    let sketch = CountMinSketch::new(5, 2048);
    let (blob, payloads) = sketch.encode();
    assert!(blob.is_none());
    assert!(payloads.is_empty());
}

#[test]
fn test_absent_blob_decodes_to_none() {
    assert!(CountMinSketch::decode(&[], &[]).unwrap().is_none());
}

#[test]
fn test_round_trip_plain_sketch() {
    let mut sketch = CountMinSketch::new(5, 512);
    for i in 0..300 {
        sketch.insert_bytes(format!("value-{}", i % 70).as_bytes());
    }
    let (blob, payloads) = sketch.encode();
    assert!(payloads.is_empty());
    let decoded = CountMinSketch::decode(&blob.unwrap(), &payloads)
        .unwrap()
        .unwrap();
    assert_eq!(decoded, sketch);
    assert_that!(decoded.total_count(), eq(300));
}

#[test]
fn test_round_trip_externalized_top_n() {
    let sketch = top_n_sketch();
    let (blob, payloads) = sketch.encode();
    let blob = blob.unwrap();
    assert_that!(payloads.len(), eq(2));

    // The blob must not leak any key bytes; they travel out of band.
    for payload in &payloads {
        assert!(
            !blob
                .windows(payload.len())
                .any(|window| window == payload.as_slice()),
            "blob contains top-n key bytes"
        );
    }

    let decoded = CountMinSketch::decode(&blob, &payloads).unwrap().unwrap();
    assert_eq!(decoded, sketch);
    assert_eq!(
        decoded.query_bytes(b"heavy-hitter-payload-one"),
        sketch.query_bytes(b"heavy-hitter-payload-one")
    );
}

#[test]
fn test_round_trip_preserves_default_value() {
    let mut sample = vec![b"heavy".to_vec(); 90];
    for i in 0..10u32 {
        sample.push(i.to_be_bytes().to_vec());
    }
    let sketch = CountMinSketch::with_top_n(5, 64, &sample, 1, 10_000);
    assert!(sketch.default_value() > 1);

    let (blob, payloads) = sketch.encode();
    let decoded = CountMinSketch::decode(&blob.unwrap(), &payloads)
        .unwrap()
        .unwrap();
    assert_that!(decoded.default_value(), eq(sketch.default_value()));
    // A fallback answer survives the round trip bit-for-bit.
    assert_eq!(
        decoded.query_bytes(b"never sampled"),
        sketch.query_bytes(b"never sampled")
    );
}

#[test]
fn test_decode_rejects_missing_payloads() {
    let sketch = top_n_sketch();
    let (blob, payloads) = sketch.encode();
    assert!(!payloads.is_empty());
    let err = CountMinSketch::decode(&blob.unwrap(), &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BrokenTopN);
}

#[test]
fn test_decode_rejects_partial_payloads() {
    let sketch = top_n_sketch();
    let (blob, payloads) = sketch.encode();
    let err = CountMinSketch::decode(&blob.unwrap(), &payloads[..1]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BrokenTopN);
}

#[test]
fn test_decode_rejects_foreign_blob() {
    let mut sketch = CountMinSketch::new(2, 16);
    sketch.insert_bytes(b"x");
    let (blob, _) = sketch.encode();
    let mut blob = blob.unwrap();

    // Flip the family byte.
    blob[2] = blob[2].wrapping_add(1);
    let err = CountMinSketch::decode(&blob, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_decode_rejects_unknown_serial_version() {
    let mut sketch = CountMinSketch::new(2, 16);
    sketch.insert_bytes(b"x");
    let (blob, _) = sketch.encode();
    let mut blob = blob.unwrap();

    blob[1] = 99;
    let err = CountMinSketch::decode(&blob, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_decode_rejects_truncated_blob() {
    let mut sketch = CountMinSketch::new(2, 16);
    sketch.insert_bytes(b"x");
    let (blob, _) = sketch.encode();
    let blob = blob.unwrap();

    for len in 1..blob.len() {
        let err = CountMinSketch::decode(&blob[..len], &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData, "prefix of {len}");
    }
}

#[test]
fn test_decode_recomputes_count_from_first_row() {
    let mut sketch = CountMinSketch::new(5, 512);
    for i in 0..250 {
        sketch.insert_bytes(format!("row-{i}").as_bytes());
    }
    let (blob, payloads) = sketch.encode();
    let decoded = CountMinSketch::decode(&blob.unwrap(), &payloads)
        .unwrap()
        .unwrap();
    assert_that!(decoded.total_count(), eq(250));
}
