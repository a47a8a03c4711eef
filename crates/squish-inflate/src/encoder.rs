/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::sync::OnceLock;

use crate::bitstream::BitStreamWriter;
use crate::constants::{
    static_litlen_lengths, static_offset_lengths, DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN,
    DEFLATE_BLOCKTYPE_STATIC_HUFFMAN, DEFLATE_BLOCKTYPE_UNCOMPRESSED, DEFLATE_END_OF_BLOCK,
    DEFLATE_MAX_CODEWORD_LENGTH, DEFLATE_MAX_LITLEN_SYMS, DEFLATE_MAX_OFFSET_SYMS,
    DEFLATE_MAX_PRE_CODEWORD_LEN, DEFLATE_NUM_PRECODE_SYMS, DEFLATE_PRECODE_LENS_PERMUTATION,
    LENGTH_BASE, LENGTH_EXTRA_BITS, OFFSET_BASE, OFFSET_EXTRA_BITS
};
use crate::huffman::{build_code_lengths, reversed_codes};
use crate::lz77::{MatchFinder, MatchParams, Token};

/// Raw bytes covered by a single block
const BLOCK_SIZE: usize = 1 << 17;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeflateEncodingStrategy
{
    /// Emit stored blocks only
    NoCompression,
    /// Short hash chains, greedy matching
    Fast,
    /// Balanced chains with lazy matching
    Default,
    /// Long chains with lazy matching
    Best
}

impl DeflateEncodingStrategy
{
    const fn to_level(self) -> u8
    {
        match self
        {
            Self::NoCompression => 0,
            Self::Fast => 1,
            Self::Default => 6,
            Self::Best => 9
        }
    }
}

/// Options that influence compression
#[derive(Debug, Copy, Clone)]
pub struct DeflateEncodingOptions
{
    level: u8
}

impl Default for DeflateEncodingOptions
{
    fn default() -> Self
    {
        DeflateEncodingOptions {
            level: DeflateEncodingStrategy::Default.to_level()
        }
    }
}

impl DeflateEncodingOptions
{
    /// Set the compression level, 0 (stored) to 9 (smallest), larger values are clamped
    pub fn set_level(mut self, level: u8) -> Self
    {
        self.level = level.min(9);
        self
    }
    pub const fn get_level(&self) -> u8
    {
        self.level
    }
    pub fn set_strategy(mut self, strategy: DeflateEncodingStrategy) -> Self
    {
        self.level = strategy.to_level();
        self
    }
}

/// Codes of the static block type, built once
struct StaticCodes
{
    litlen_lens:  [u8; 288],
    litlen_codes: Vec<u16>,
    offset_lens:  [u8; 32],
    offset_codes: Vec<u16>
}

fn static_codes() -> &'static StaticCodes
{
    static CODES: OnceLock<StaticCodes> = OnceLock::new();

    CODES.get_or_init(|| {
        let litlen_lens = static_litlen_lengths();
        let offset_lens = static_offset_lengths();

        StaticCodes {
            litlen_codes: reversed_codes(&litlen_lens),
            offset_codes: reversed_codes(&offset_lens),
            litlen_lens,
            offset_lens
        }
    })
}

#[inline]
fn length_symbol(length: usize) -> usize
{
    LENGTH_BASE.partition_point(|base| usize::from(*base) <= length) - 1
}

#[inline]
fn offset_symbol(distance: usize) -> usize
{
    OFFSET_BASE.partition_point(|base| usize::from(*base) <= distance) - 1
}

/// Symbol frequencies of one block
struct BlockFrequencies
{
    litlen: [u32; DEFLATE_MAX_LITLEN_SYMS],
    offset: [u32; DEFLATE_MAX_OFFSET_SYMS]
}

impl BlockFrequencies
{
    fn new(tokens: &[Token]) -> BlockFrequencies
    {
        let mut litlen = [0_u32; DEFLATE_MAX_LITLEN_SYMS];
        let mut offset = [0_u32; DEFLATE_MAX_OFFSET_SYMS];

        for token in tokens
        {
            match *token
            {
                Token::Literal(byte) => litlen[usize::from(byte)] += 1,
                Token::Match { length, distance } =>
                {
                    litlen[257 + length_symbol(usize::from(length))] += 1;
                    offset[offset_symbol(usize::from(distance))] += 1;
                }
            }
        }
        litlen[DEFLATE_END_OF_BLOCK] = 1;

        BlockFrequencies { litlen, offset }
    }
    /// Bits needed for the block body with the given code lengths
    fn cost(&self, litlen_lens: &[u8], offset_lens: &[u8]) -> usize
    {
        let mut bits = 0;

        for (sym, (freq, len)) in self.litlen.iter().zip(litlen_lens).enumerate()
        {
            let extra = if sym > 256 { LENGTH_EXTRA_BITS[sym - 257] } else { 0 };
            bits += *freq as usize * usize::from(len + extra);
        }
        for (sym, (freq, len)) in self.offset.iter().zip(offset_lens).enumerate()
        {
            bits += *freq as usize * usize::from(len + OFFSET_EXTRA_BITS[sym]);
        }
        bits
    }
}

/// The code length description that starts a dynamic block
struct DynamicHeader
{
    num_litlen_syms:  usize,
    num_offset_syms:  usize,
    num_precode_lens: usize,
    precode_lens:     Vec<u8>,
    precode_codes:    Vec<u16>,
    /// (precode symbol, extra bits value)
    items:            Vec<(u8, u8)>
}

impl DynamicHeader
{
    fn new(litlen_lens: &[u8], offset_lens: &[u8]) -> DynamicHeader
    {
        let used = |lens: &[u8]| lens.iter().rposition(|x| *x != 0).map_or(0, |x| x + 1);

        let num_litlen_syms = used(litlen_lens).max(257);
        let num_offset_syms = used(offset_lens).max(1);

        let mut lens = Vec::with_capacity(num_litlen_syms + num_offset_syms);
        lens.extend_from_slice(&litlen_lens[..num_litlen_syms]);
        lens.extend_from_slice(&offset_lens[..num_offset_syms]);

        let items = run_length_encode(&lens);

        let mut freqs = [0_u32; DEFLATE_NUM_PRECODE_SYMS];

        for (sym, _) in &items
        {
            freqs[usize::from(*sym)] += 1;
        }
        let precode_lens = build_code_lengths(&freqs, DEFLATE_MAX_PRE_CODEWORD_LEN as u8);
        let precode_codes = reversed_codes(&precode_lens);

        let mut num_precode_lens = DEFLATE_NUM_PRECODE_SYMS;

        while num_precode_lens > 4
            && precode_lens[usize::from(DEFLATE_PRECODE_LENS_PERMUTATION[num_precode_lens - 1])]
                == 0
        {
            num_precode_lens -= 1;
        }

        DynamicHeader {
            num_litlen_syms,
            num_offset_syms,
            num_precode_lens,
            precode_lens,
            precode_codes,
            items
        }
    }

    fn cost(&self) -> usize
    {
        let items: usize = self
            .items
            .iter()
            .map(|(sym, _)| usize::from(self.precode_lens[usize::from(*sym)]) + precode_extra_bits(*sym))
            .sum();

        5 + 5 + 4 + 3 * self.num_precode_lens + items
    }

    fn write(&self, writer: &mut BitStreamWriter)
    {
        writer.put_bits((self.num_litlen_syms - 257) as u32, 5);
        writer.put_bits((self.num_offset_syms - 1) as u32, 5);
        writer.put_bits((self.num_precode_lens - 4) as u32, 4);

        for i in DEFLATE_PRECODE_LENS_PERMUTATION
            .iter()
            .take(self.num_precode_lens)
        {
            writer.put_bits(u32::from(self.precode_lens[usize::from(*i)]), 3);
        }
        for (sym, extra) in &self.items
        {
            let sym = usize::from(*sym);

            writer.put_bits(u32::from(self.precode_codes[sym]), self.precode_lens[sym]);
            writer.put_bits(u32::from(*extra), precode_extra_bits(sym as u8) as u8);
        }
    }
}

const fn precode_extra_bits(sym: u8) -> usize
{
    match sym
    {
        16 => 2,
        17 => 3,
        18 => 7,
        _ => 0
    }
}

/// Run length encode code lengths with the precode repeat symbols
fn run_length_encode(lens: &[u8]) -> Vec<(u8, u8)>
{
    let mut items = Vec::with_capacity(lens.len());
    let mut i = 0;

    while i < lens.len()
    {
        let value = lens[i];
        let run = lens[i..].iter().take_while(|x| **x == value).count();
        let mut remaining = run;

        if value == 0
        {
            while remaining >= 11
            {
                let take = remaining.min(138);
                items.push((18, (take - 11) as u8));
                remaining -= take;
            }
            if remaining >= 3
            {
                items.push((17, (remaining - 3) as u8));
                remaining = 0;
            }
        }
        else
        {
            items.push((value, 0));
            remaining -= 1;

            while remaining >= 3
            {
                let take = remaining.min(6);
                items.push((16, (take - 3) as u8));
                remaining -= take;
            }
        }
        for _ in 0..remaining
        {
            items.push((value, 0));
        }
        i += run;
    }
    items
}

pub struct DeflateEncoder<'a>
{
    data:    &'a [u8],
    options: DeflateEncodingOptions
}

impl<'a> DeflateEncoder<'a>
{
    /// Create a new deflate encoder with default options
    pub fn new(data: &'a [u8]) -> DeflateEncoder<'a>
    {
        DeflateEncoder::new_with_options(data, DeflateEncodingOptions::default())
    }
    pub fn new_with_options(data: &'a [u8], options: DeflateEncodingOptions) -> DeflateEncoder<'a>
    {
        DeflateEncoder { data, options }
    }

    /// Encode the data as a raw deflate stream
    pub fn encode_deflate(&mut self) -> Vec<u8>
    {
        let mut writer = BitStreamWriter::with_capacity(self.data.len() / 2 + 64);
        self.encode_blocks(&mut writer);
        writer.finish()
    }

    /// Encode the data as a zlib stream, a deflate stream
    /// with a two byte header and an Adler-32 trailer
    #[cfg(feature = "zlib")]
    pub fn encode_zlib(&mut self) -> Vec<u8>
    {
        use crate::utils::calc_adler_hash;

        let mut writer = BitStreamWriter::with_capacity(self.data.len() / 2 + 64);

        writer.write_bytes(&self.zlib_header().to_be_bytes());
        self.encode_blocks(&mut writer);

        let mut output = writer.finish();
        // add adler hash
        output.extend_from_slice(&calc_adler_hash(self.data).to_be_bytes());

        output
    }

    #[cfg(feature = "zlib")]
    fn zlib_header(&self) -> u16
    {
        const ZLIB_CM_DEFLATE: u16 = 8;
        const ZLIB_CINFO_32K_WINDOW: u16 = 7;

        let level_hint: u16 = match self.options.level
        {
            0 | 1 => 0,
            2..=5 => 1,
            6 => 2,
            _ => 3
        };

        let mut hdr = (ZLIB_CM_DEFLATE << 8) | (ZLIB_CINFO_32K_WINDOW << 12);

        hdr |= level_hint << 6;
        hdr |= 31 - (hdr % 31);

        hdr
    }

    fn encode_blocks(&self, writer: &mut BitStreamWriter)
    {
        if self.options.level == 0
        {
            write_stored_blocks(writer, self.data, true);
            return;
        }
        let mut finder = MatchFinder::new(self.data, MatchParams::from_level(self.options.level));
        let mut tokens = Vec::with_capacity(BLOCK_SIZE / 2);
        let mut start = 0;

        loop
        {
            let end = (start + BLOCK_SIZE).min(self.data.len());
            let is_last = end == self.data.len();

            tokens.clear();
            finder.tokenize(start, end, &mut tokens);

            write_block(writer, &tokens, &self.data[start..end], is_last);

            if is_last
            {
                break;
            }
            start = end;
        }
    }
}

/// Write a block as stored, static or dynamic, whichever is smallest
fn write_block(writer: &mut BitStreamWriter, tokens: &[Token], raw: &[u8], is_last: bool)
{
    let freqs = BlockFrequencies::new(tokens);

    let litlen_lens = build_code_lengths(&freqs.litlen, DEFLATE_MAX_CODEWORD_LENGTH as u8);
    let offset_lens = build_code_lengths(&freqs.offset, DEFLATE_MAX_CODEWORD_LENGTH as u8);
    let header = DynamicHeader::new(&litlen_lens, &offset_lens);

    let statics = static_codes();

    let dynamic_cost = 3 + header.cost() + freqs.cost(&litlen_lens, &offset_lens);
    let static_cost = 3 + freqs.cost(&statics.litlen_lens, &statics.offset_lens);
    let stored_cost = stored_cost(raw.len(), writer.bit_position());

    if stored_cost < dynamic_cost.min(static_cost)
    {
        write_stored_blocks(writer, raw, is_last);
    }
    else if static_cost <= dynamic_cost
    {
        writer.put_bits(u32::from(is_last) | (DEFLATE_BLOCKTYPE_STATIC_HUFFMAN << 1), 3);
        write_tokens(
            writer,
            tokens,
            (&statics.litlen_codes, &statics.litlen_lens),
            (&statics.offset_codes, &statics.offset_lens)
        );
    }
    else
    {
        writer.put_bits(u32::from(is_last) | (DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN << 1), 3);
        header.write(writer);

        let litlen_codes = reversed_codes(&litlen_lens);
        let offset_codes = reversed_codes(&offset_lens);

        write_tokens(
            writer,
            tokens,
            (&litlen_codes, &litlen_lens),
            (&offset_codes, &offset_lens)
        );
    }
}

fn write_tokens(
    writer: &mut BitStreamWriter, tokens: &[Token], litlen: (&[u16], &[u8]),
    offset: (&[u16], &[u8])
)
{
    let (litlen_codes, litlen_lens) = litlen;
    let (offset_codes, offset_lens) = offset;

    for token in tokens
    {
        match *token
        {
            Token::Literal(byte) =>
            {
                let sym = usize::from(byte);
                writer.put_bits(u32::from(litlen_codes[sym]), litlen_lens[sym]);
            }
            Token::Match { length, distance } =>
            {
                let length = usize::from(length);
                let distance = usize::from(distance);

                let len_sym = length_symbol(length);
                let sym = 257 + len_sym;
                writer.put_bits(u32::from(litlen_codes[sym]), litlen_lens[sym]);
                writer.put_bits(
                    (length - usize::from(LENGTH_BASE[len_sym])) as u32,
                    LENGTH_EXTRA_BITS[len_sym]
                );

                let off_sym = offset_symbol(distance);
                writer.put_bits(u32::from(offset_codes[off_sym]), offset_lens[off_sym]);
                writer.put_bits(
                    (distance - usize::from(OFFSET_BASE[off_sym])) as u32,
                    OFFSET_EXTRA_BITS[off_sym]
                );
            }
        }
    }
    writer.put_bits(
        u32::from(litlen_codes[DEFLATE_END_OF_BLOCK]),
        litlen_lens[DEFLATE_END_OF_BLOCK]
    );
}

/// Bits needed to store `len` bytes verbatim starting at `bit_position`
fn stored_cost(len: usize, bit_position: usize) -> usize
{
    let chunks = len.div_ceil(usize::from(u16::MAX)).max(1);
    let first_padding = (8 - (bit_position + 3) % 8) % 8;

    chunks * (3 + 32) + first_padding + (chunks - 1) * 5 + len * 8
}

/// Store `data` verbatim in as many stored blocks as needed
fn write_stored_blocks(writer: &mut BitStreamWriter, data: &[u8], is_last: bool)
{
    /*
     * If the input is zero-length, we still must output a block in order
     * for the output to be a valid DEFLATE stream.
     */
    let mut chunks = data.chunks(usize::from(u16::MAX)).peekable();

    if chunks.peek().is_none()
    {
        writer.put_bits(u32::from(is_last) | (DEFLATE_BLOCKTYPE_UNCOMPRESSED << 1), 3);
        writer.align_to_byte();
        writer.write_bytes(&0xFFFF_0000_u32.to_le_bytes());
        return;
    }
    while let Some(chunk) = chunks.next()
    {
        let bfinal = is_last && chunks.peek().is_none();

        writer.put_bits(u32::from(bfinal) | (DEFLATE_BLOCKTYPE_UNCOMPRESSED << 1), 3);
        writer.align_to_byte();

        // output len and nlen
        let len = chunk.len() as u16;
        writer.write_bytes(&len.to_le_bytes());
        writer.write_bytes(&(!len).to_le_bytes());
        writer.write_bytes(chunk);
    }
}
