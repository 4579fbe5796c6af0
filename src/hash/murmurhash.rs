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

use byteorder::ByteOrder;
use byteorder::LE;

const C1: u64 = 0x87c37b91114253d5;
const C2: u64 = 0x4cf5ad432745937f;

/// Hashes a whole key with MurmurHash3 x64 128 and seed 0, returning both
/// 64-bit halves.
///
/// The sketch derives every table column, Top-N bucket, and on-wire Top-N
/// identity from this pair, so the function must stay bit-compatible with
/// the reference MurmurHash3: sketches persisted by other implementations
/// are expected to agree on every hash.
pub(crate) fn murmur3_x64_128(data: &[u8]) -> (u64, u64) {
    let mut h1: u64 = 0;
    let mut h2: u64 = 0;

    // Process the full 128-bit blocks (the body) into the hash.
    let blocks = data.len() >> 4; // bytes / 16
    for i in 0..blocks {
        let lo = i << 4;
        let mi = lo + 8;
        let hi = mi + 8;
        let k1 = LE::read_u64(&data[lo..mi]);
        let k2 = LE::read_u64(&data[mi..hi]);

        h1 ^= mix_k1(k1);
        h1 = h1.rotate_left(27);
        h1 = h1.wrapping_add(h2);
        h1 = h1.wrapping_mul(5).wrapping_add(0x52dce729);

        h2 ^= mix_k2(k2);
        h2 = h2.rotate_left(31);
        h2 = h2.wrapping_add(h1);
        h2 = h2.wrapping_mul(5).wrapping_add(0x38495ab5);
    }

    // tail
    let tail = &data[blocks << 4..];
    let rem = tail.len();
    if rem > 8 {
        let mut buf = [0u8; 8];
        buf[..rem - 8].copy_from_slice(&tail[8..]);
        h2 ^= mix_k2(u64::from_le_bytes(buf));
    }
    if rem > 0 {
        let mut buf = [0u8; 8];
        let k1_len = rem.min(8);
        buf[..k1_len].copy_from_slice(&tail[..k1_len]);
        h1 ^= mix_k1(u64::from_le_bytes(buf));
    }

    h1 ^= data.len() as u64;
    h2 ^= data.len() as u64;
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    h1 = fmix64(h1);
    h2 = fmix64(h2);
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    (h1, h2)
}

#[inline]
fn mix_k1(mut k1: u64) -> u64 {
    k1 = k1.wrapping_mul(C1);
    k1 = k1.rotate_left(31);
    k1.wrapping_mul(C2)
}

#[inline]
fn mix_k2(mut k2: u64) -> u64 {
    k2 = k2.wrapping_mul(C2);
    k2 = k2.rotate_left(33);
    k2.wrapping_mul(C1)
}

/// Finalization mix: force all bits of a hash block to avalanche.
#[inline]
fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51afd7ed558ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ceb9fe1a85ec53);
    k ^ (k >> 33)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remainder() {
        // remainder > 8
        let key = "The quick brown fox jumps over the lazy dog";
        let (h1, h2) = murmur3_x64_128(key.as_bytes());
        assert_eq!(h1, 0xe34bbc7bbc071b6c);
        assert_eq!(h2, 0x7a433ca9c49a9347);

        // change one bit
        let key = "The quick brown fox jumps over the lazy eog";
        let (h1, h2) = murmur3_x64_128(key.as_bytes());
        assert_eq!(h1, 0x362108102c62d1c9);
        assert_eq!(h2, 0x3285cd100292b305);

        // test a remainder < 8
        let key = "The quick brown fox jumps over the lazy dogdogdog";
        let (h1, h2) = murmur3_x64_128(key.as_bytes());
        assert_eq!(h1, 0x9c8205300e612fc4);
        assert_eq!(h2, 0xcbc0af6136aa3df9);

        // test a remainder = 8
        let key = "The quick brown fox jumps over the lazy1";
        let (h1, h2) = murmur3_x64_128(key.as_bytes());
        assert_eq!(h1, 0xe3301a827e5cdfe3);
        assert_eq!(h2, 0xbdbf05f8da0f0392);

        // test a remainder = 0
        let key = "The quick brown fox jumps over t";
        let (h1, h2) = murmur3_x64_128(key.as_bytes());
        assert_eq!(h1, 0xdf6af91bb29bdacf);
        assert_eq!(h2, 0x91a341c58df1f3a6);
    }

    #[test]
    fn test_multi_byte_keys() {
        // Vectors shared with the sibling coprocessor implementation of the
        // same sketch; both halves must agree for persisted interop.
        let (h1, h2) = murmur3_x64_128("€".as_bytes());
        assert_eq!(h1, 0x59E3303A2FDD9555);
        assert_eq!(h2, 0x4F9D8BB3E4BC3164);

        let (h1, h2) = murmur3_x64_128("€€€€€€€€€€".as_bytes());
        assert_eq!(h1, 0xCECFEB77375EEF6F);
        assert_eq!(h2, 0xE9830BC26869E2C6);
    }

    #[test]
    fn test_empty_key() {
        let (h1, h2) = murmur3_x64_128(b"");
        assert_eq!(h1, 0);
        assert_eq!(h2, 0);
    }
}
