/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Canonical huffman codes, decode tables for inflate and
//! length limited code construction for deflate.
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::bitstream::BitStreamReader;
use crate::constants::DEFLATE_MAX_CODEWORD_LENGTH;
use crate::errors::DecodeErrorStatus;

/// Number of bits resolved with a single table lookup.
///
/// Longer codes fall back to a canonical bit by bit walk.
const FAST_BITS: usize = 10;

/// Count how many codewords each length has
fn count_lengths(lengths: &[u8]) -> [u16; DEFLATE_MAX_CODEWORD_LENGTH + 1]
{
    let mut counts = [0_u16; DEFLATE_MAX_CODEWORD_LENGTH + 1];

    for len in lengths
    {
        counts[usize::from(*len)] += 1;
    }
    counts[0] = 0;
    counts
}

/// First canonical code of every length, per RFC 1951 3.2.2
fn first_codes(counts: &[u16; DEFLATE_MAX_CODEWORD_LENGTH + 1]) -> [u16; DEFLATE_MAX_CODEWORD_LENGTH + 1]
{
    let mut next_code = [0_u16; DEFLATE_MAX_CODEWORD_LENGTH + 1];
    let mut code = 0_u16;

    for bits in 1..=DEFLATE_MAX_CODEWORD_LENGTH
    {
        code = (code + counts[bits - 1]) << 1;
        next_code[bits] = code;
    }
    next_code
}

#[inline(always)]
fn reverse_bits(code: u16, length: u8) -> u16
{
    code.reverse_bits() >> (16 - u16::from(length))
}

/// Canonical codes for `lengths`, bit reversed so they
/// can be written least significant bit first.
pub(crate) fn reversed_codes(lengths: &[u8]) -> Vec<u16>
{
    let counts = count_lengths(lengths);
    let mut next_code = first_codes(&counts);

    lengths
        .iter()
        .map(|len| {
            if *len == 0
            {
                return 0;
            }
            let code = next_code[usize::from(*len)];
            next_code[usize::from(*len)] += 1;
            reverse_bits(code, *len)
        })
        .collect()
}

/// A decode table for one canonical huffman code
pub(crate) struct HuffmanDecodeTable
{
    /// `(symbol << 4) | length` for codes at most FAST_BITS long, zero marks a miss
    fast:    Vec<u16>,
    counts:  [u16; DEFLATE_MAX_CODEWORD_LENGTH + 1],
    /// symbols ordered by code
    symbols: Vec<u16>
}

impl HuffmanDecodeTable
{
    /// Build a table from code lengths, returning `None` if the
    /// lengths describe an over-subscribed code.
    ///
    /// Incomplete codes are accepted, a codeword which was never
    /// assigned is reported when it is decoded.
    pub fn new(lengths: &[u8]) -> Option<HuffmanDecodeTable>
    {
        if lengths
            .iter()
            .any(|x| usize::from(*x) > DEFLATE_MAX_CODEWORD_LENGTH)
        {
            return None;
        }
        let counts = count_lengths(lengths);

        let mut left = 1_i32;

        for len in 1..=DEFLATE_MAX_CODEWORD_LENGTH
        {
            left <<= 1;
            left -= i32::from(counts[len]);

            if left < 0
            {
                return None;
            }
        }
        Some(Self::build(lengths))
    }

    /// Build a table without validating the lengths.
    pub fn build(lengths: &[u8]) -> HuffmanDecodeTable
    {
        let counts = count_lengths(lengths);

        let mut offsets = [0_usize; DEFLATE_MAX_CODEWORD_LENGTH + 2];

        for len in 1..=DEFLATE_MAX_CODEWORD_LENGTH
        {
            offsets[len + 1] = offsets[len] + usize::from(counts[len]);
        }
        let mut symbols = vec![0; offsets[DEFLATE_MAX_CODEWORD_LENGTH + 1]];

        for (sym, len) in lengths.iter().enumerate()
        {
            if *len != 0
            {
                let offset = &mut offsets[usize::from(*len)];
                symbols[*offset] = sym as u16;
                *offset += 1;
            }
        }

        let mut fast = vec![0_u16; 1 << FAST_BITS];
        let mut next_code = first_codes(&counts);

        for (sym, len) in lengths.iter().enumerate()
        {
            let len = *len;

            if len == 0
            {
                continue;
            }
            let code = next_code[usize::from(len)];
            next_code[usize::from(len)] += 1;

            if usize::from(len) <= FAST_BITS
            {
                let entry = ((sym as u16) << 4) | u16::from(len);
                let step = 1 << len;
                let mut pos = usize::from(reverse_bits(code, len));

                while pos < (1 << FAST_BITS)
                {
                    fast[pos] = entry;
                    pos += step;
                }
            }
        }

        HuffmanDecodeTable {
            fast,
            counts,
            symbols
        }
    }

    /// Decode one symbol from the stream
    #[inline(always)]
    pub fn decode_symbol(&self, stream: &mut BitStreamReader) -> Result<u16, DecodeErrorStatus>
    {
        stream.refill();

        let entry = self.fast[stream.peek_var_bits(FAST_BITS)];

        if entry != 0
        {
            let len = (entry & 15) as u8;

            if !stream.has(len)
            {
                return Err(DecodeErrorStatus::InsufficientData);
            }
            stream.drop_bits(len);

            return Ok(entry >> 4);
        }
        self.decode_slow(stream)
    }

    #[inline(never)]
    fn decode_slow(&self, stream: &mut BitStreamReader) -> Result<u16, DecodeErrorStatus>
    {
        let bits = stream.peek_var_bits(DEFLATE_MAX_CODEWORD_LENGTH);

        let mut code = 0_i32;
        let mut first = 0_i32;
        let mut index = 0_i32;

        for len in 1..=DEFLATE_MAX_CODEWORD_LENGTH
        {
            code |= ((bits >> (len - 1)) & 1) as i32;

            let count = i32::from(self.counts[len]);

            if code - count < first
            {
                if !stream.has(len as u8)
                {
                    return Err(DecodeErrorStatus::InsufficientData);
                }
                stream.drop_bits(len as u8);

                return Ok(self.symbols[(index + (code - first)) as usize]);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }
        Err(DecodeErrorStatus::CorruptData)
    }
}

/// Compute code lengths for `freqs` with no code longer than
/// `max_bits`.
///
/// The result always describes a complete code with at least
/// two codewords, unused symbols get length zero.
pub(crate) fn build_code_lengths(freqs: &[u32], max_bits: u8) -> Vec<u8>
{
    let mut lengths = vec![0_u8; freqs.len()];

    let used: Vec<usize> = freqs
        .iter()
        .enumerate()
        .filter(|(_, f)| **f != 0)
        .map(|(i, _)| i)
        .collect();

    if used.len() < 2
    {
        // a lone symbol still gets a sibling so the code stays complete
        let first = used.first().copied().unwrap_or(0);
        let second = if first == 0 { 1 } else { 0 };
        lengths[first] = 1;
        lengths[second] = 1;
        return lengths;
    }

    // leaves are 0..used.len(), internal nodes follow
    let num_leaves = used.len();
    let mut parent = vec![0_usize; 2 * num_leaves - 1];
    let mut heap = BinaryHeap::with_capacity(num_leaves);

    for (node, sym) in used.iter().enumerate()
    {
        heap.push(Reverse((u64::from(freqs[*sym]), node)));
    }
    let mut next_node = num_leaves;

    while let (Some(Reverse((fa, a))), Some(Reverse((fb, b)))) = (heap.pop(), heap.pop())
    {
        parent[a] = next_node;
        parent[b] = next_node;
        heap.push(Reverse((fa + fb, next_node)));
        next_node += 1;
    }
    // parents are always created after their children, walk down from the root
    let root = next_node - 1;
    let mut depth = vec![0_usize; next_node];

    for node in (0..root).rev()
    {
        depth[node] = depth[parent[node]] + 1;
    }

    let max_bits = usize::from(max_bits);
    let mut counts = vec![0_u32; num_leaves.max(max_bits) + 1];

    for leaf_depth in &depth[..num_leaves]
    {
        counts[*leaf_depth] += 1;
    }
    enforce_max_code_size(&mut counts, max_bits);

    // most frequent symbols take the shortest codes
    let mut sorted = used;
    sorted.sort_by_key(|sym| (freqs[*sym], Reverse(*sym)));

    let mut remaining = sorted.len();

    for len in 1..=max_bits
    {
        for _ in 0..counts[len]
        {
            remaining -= 1;
            lengths[sorted[remaining]] = len as u8;
        }
    }
    lengths
}

/// Move overlong codes to `max_bits` and rebalance the
/// shorter ones until the Kraft sum is exactly one again.
fn enforce_max_code_size(counts: &mut [u32], max_bits: usize)
{
    for i in max_bits + 1..counts.len()
    {
        counts[max_bits] += counts[i];
        counts[i] = 0;
    }
    let mut total: u64 = 0;

    for i in (1..=max_bits).rev()
    {
        total += u64::from(counts[i]) << (max_bits - i);
    }

    while total != (1 << max_bits)
    {
        counts[max_bits] -= 1;

        for i in (1..max_bits).rev()
        {
            if counts[i] != 0
            {
                counts[i] -= 1;
                counts[i + 1] += 2;
                break;
            }
        }
        total -= 1;
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn kraft_sum(lengths: &[u8], max_bits: u8) -> u64
    {
        lengths
            .iter()
            .filter(|x| **x != 0)
            .map(|x| 1_u64 << (max_bits - *x))
            .sum()
    }

    #[test]
    fn rfc_example_codes()
    {
        // RFC 1951 3.2.2: lengths (3, 3, 3, 3, 3, 2, 4, 4)
        let lengths = [3, 3, 3, 3, 3, 2, 4, 4];
        let codes = reversed_codes(&lengths);
        let expected = [0b010, 0b011, 0b100, 0b101, 0b110, 0b00, 0b1110, 0b1111];

        for ((code, len), exp) in codes.iter().zip(lengths).zip(expected)
        {
            assert_eq!(reverse_bits(*code, len), exp);
        }
    }

    #[test]
    fn lengths_are_limited_and_complete()
    {
        // fibonacci frequencies produce a maximally skewed tree
        let mut freqs = vec![0_u32; 40];
        let (mut a, mut b) = (1_u32, 1_u32);

        for f in freqs.iter_mut().take(30)
        {
            *f = a;
            let c = a.saturating_add(b);
            a = b;
            b = c;
        }
        let lengths = build_code_lengths(&freqs, 15);

        assert!(lengths.iter().all(|x| *x <= 15));
        assert!(lengths[..30].iter().all(|x| *x > 0));
        assert!(lengths[30..].iter().all(|x| *x == 0));
        assert_eq!(kraft_sum(&lengths, 15), 1 << 15);
        // the most frequent symbol never has a longer code than the least frequent
        assert!(lengths[29] <= lengths[0]);
    }

    #[test]
    fn degenerate_inputs_stay_decodable()
    {
        let lengths = build_code_lengths(&[0, 0, 0], 7);
        assert_eq!(lengths, [1, 1, 0]);

        let lengths = build_code_lengths(&[0, 0, 9], 7);
        assert_eq!(lengths, [1, 0, 1]);
    }

    #[test]
    fn oversubscribed_code_is_rejected()
    {
        assert!(HuffmanDecodeTable::new(&[1, 1, 1]).is_none());
        assert!(HuffmanDecodeTable::new(&[1, 2, 2]).is_some());
        // incomplete, but legal to build
        assert!(HuffmanDecodeTable::new(&[1, 0, 0]).is_some());
    }

    #[test]
    fn decode_long_and_short_codes()
    {
        use crate::bitstream::BitStreamWriter;
        // one 1 bit code, then lengths up to 13 bits
        let lengths = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 13];
        let codes = reversed_codes(&lengths);
        let table = HuffmanDecodeTable::new(&lengths).unwrap();

        let order = [13, 0, 12, 5, 11, 1, 10];
        let mut writer = BitStreamWriter::with_capacity(16);

        for sym in order
        {
            writer.put_bits(u32::from(codes[sym]), lengths[sym]);
        }
        let bytes = writer.finish();
        let mut reader = BitStreamReader::new(&bytes);

        for sym in order
        {
            assert_eq!(table.decode_symbol(&mut reader).unwrap(), sym as u16);
        }
    }
}
