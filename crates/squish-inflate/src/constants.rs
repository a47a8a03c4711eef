/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

/// Number of symbols in each Huffman code.  Note: for the literal/length
/// and offset codes, these are actually the maximum values; a given block
/// might use fewer symbols.
pub const DEFLATE_NUM_PRECODE_SYMS: usize = 19;
pub const DEFLATE_NUM_LITLEN_SYMS: usize = 288;
pub const DEFLATE_NUM_OFFSET_SYMS: usize = 32;

/// Symbols a block may actually reference
pub const DEFLATE_MAX_LITLEN_SYMS: usize = 286;
pub const DEFLATE_MAX_OFFSET_SYMS: usize = 30;

pub const DEFLATE_END_OF_BLOCK: usize = 256;

/// Order which precode lengths are stored
pub static DEFLATE_PRECODE_LENS_PERMUTATION: [u8; DEFLATE_NUM_PRECODE_SYMS] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15
];

/// Maximum codeword length across all codes.
pub const DEFLATE_MAX_CODEWORD_LENGTH: usize = 15;
/// Maximum codeword length for the precode
pub const DEFLATE_MAX_PRE_CODEWORD_LEN: usize = 7;

pub const DEFLATE_BLOCKTYPE_UNCOMPRESSED: u32 = 0;
pub const DEFLATE_BLOCKTYPE_STATIC_HUFFMAN: u32 = 1;
pub const DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN: u32 = 2;

pub const DEFLATE_MIN_MATCH_LEN: usize = 3;
pub const DEFLATE_MAX_MATCH_LEN: usize = 258;
pub const DEFLATE_WINDOW_SIZE: usize = 1 << 15;

/// Base match length for length symbols 257..=285
pub static LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258
];
pub static LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0
];

/// Base match distance for offset symbols 0..=29
pub static OFFSET_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577
];
pub static OFFSET_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13
];

/// Code lengths of the static litlen code
pub const fn static_litlen_lengths() -> [u8; DEFLATE_NUM_LITLEN_SYMS]
{
    let mut lens = [0; DEFLATE_NUM_LITLEN_SYMS];
    let mut i = 0;

    while i < DEFLATE_NUM_LITLEN_SYMS
    {
        lens[i] = match i
        {
            0..=143 => 8,
            144..=255 => 9,
            256..=279 => 7,
            _ => 8
        };
        i += 1;
    }
    lens
}

/// Code lengths of the static offset code
pub const fn static_offset_lengths() -> [u8; DEFLATE_NUM_OFFSET_SYMS]
{
    [5; DEFLATE_NUM_OFFSET_SYMS]
}
