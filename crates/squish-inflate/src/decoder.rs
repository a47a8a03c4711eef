/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::sync::OnceLock;

use crate::bitstream::BitStreamReader;
use crate::constants::{
    static_litlen_lengths, static_offset_lengths, DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN,
    DEFLATE_BLOCKTYPE_STATIC_HUFFMAN, DEFLATE_BLOCKTYPE_UNCOMPRESSED, DEFLATE_END_OF_BLOCK,
    DEFLATE_MAX_LITLEN_SYMS, DEFLATE_MAX_OFFSET_SYMS, DEFLATE_NUM_PRECODE_SYMS,
    DEFLATE_PRECODE_LENS_PERMUTATION, LENGTH_BASE, LENGTH_EXTRA_BITS, OFFSET_BASE,
    OFFSET_EXTRA_BITS
};
use crate::errors::{DecodeErrorStatus, InflateDecodeErrors};
use crate::huffman::HuffmanDecodeTable;
use crate::utils::copy_rep_matches;

/// Options that influence decompression
#[derive(Copy, Clone, Debug)]
pub struct DeflateOptions
{
    limit:            usize,
    confirm_checksum: bool,
    size_hint:        usize
}

impl Default for DeflateOptions
{
    fn default() -> Self
    {
        DeflateOptions {
            limit:            1 << 30,
            confirm_checksum: true,
            size_hint:        37000
        }
    }
}

impl DeflateOptions
{
    /// Get deflate/zlib limit option
    ///
    /// The decoder won't extend the inbuilt limit and will
    /// return an error if the limit is exceeded
    pub const fn get_limit(&self) -> usize
    {
        self.limit
    }
    /// Set a limit to the internal vector
    /// used to store decoded zlib/deflate output.
    pub fn set_limit(mut self, limit: usize) -> Self
    {
        self.limit = limit;
        self
    }
    /// Get whether the decoder will confirm a checksum
    /// after decoding
    pub const fn get_confirm_checksum(&self) -> bool
    {
        self.confirm_checksum
    }
    /// Set whether the decoder should confirm a checksum
    /// after decoding
    ///
    /// Note, you should definitely confirm your checksum, use
    /// this with caution, otherwise data returned may be corrupt
    pub fn set_confirm_checksum(mut self, yes: bool) -> Self
    {
        self.confirm_checksum = yes;
        self
    }
    /// Get the default set size hint for the decompressor
    pub const fn get_size_hint(&self) -> usize
    {
        self.size_hint
    }
    /// Set the size hint for the decompressor
    ///
    /// This is the initial capacity of the output vector, a good hint
    /// avoids reallocations, a wrong one only costs them
    pub fn set_size_hint(mut self, hint: usize) -> Self
    {
        self.size_hint = hint;
        self
    }
}

/// The static code tables, built once on first use
struct StaticTables
{
    litlen: HuffmanDecodeTable,
    offset: HuffmanDecodeTable
}

fn static_tables() -> &'static StaticTables
{
    static TABLES: OnceLock<StaticTables> = OnceLock::new();

    TABLES.get_or_init(|| StaticTables {
        litlen: HuffmanDecodeTable::build(&static_litlen_lengths()),
        offset: HuffmanDecodeTable::build(&static_offset_lengths())
    })
}

/// A deflate decoder instance.
///
/// The decoder manages output buffer as opposed to requiring the caller to provide a pre-allocated buffer
/// it tracks number of bytes written and on successfully reaching the
/// end of the block, will return a vector with exactly
/// the number of decompressed bytes.
///
/// This means that it may use up huge amounts of memory if not checked, but
/// there are [options] that can prevent that
///
/// [options]: DeflateOptions
pub struct DeflateDecoder<'a>
{
    data:     &'a [u8],
    position: usize,
    options:  DeflateOptions
}

impl<'a> DeflateDecoder<'a>
{
    /// Create a new decompressor that will read compressed
    /// data from `data` and return a new vector containing new data
    ///
    /// # Arguments
    /// - `data`: The compressed data. Data can be of any format i.e
    /// gzip, zlib or raw deflate.
    pub fn new(data: &'a [u8]) -> DeflateDecoder<'a>
    {
        let options = DeflateOptions::default();

        Self::new_with_options(data, options)
    }
    /// Create new decoder with specified options
    ///
    /// This can be used to fine tune the decoder to the user's
    /// needs.
    ///
    /// # Arguments
    /// - `data`: The compressed data
    /// - `options`: A set of user defined options which tune how the decompressor
    pub fn new_with_options(data: &'a [u8], options: DeflateOptions) -> DeflateDecoder<'a>
    {
        DeflateDecoder {
            data,
            position: 0,
            options
        }
    }
    /// Decode zlib-encoded data returning the uncompressed in a `Vec<u8>`
    /// or an error if something went wrong.
    ///
    /// Bytes after the Adler-32 trailer are ignored.
    ///
    /// # Returns
    /// - `Ok(data)`: Uncompressed data
    /// - `Err(error)`: The error that occurred together with whatever was decoded
    #[cfg(feature = "zlib")]
    pub fn decode_zlib(&mut self) -> Result<Vec<u8>, InflateDecodeErrors>
    {
        use crate::utils::calc_adler_hash;

        if self.data.len()
            < 2 /* zlib header */
            + 4
        /* adler trailer */
        {
            return Err(InflateDecodeErrors::new_with_error(
                DecodeErrorStatus::InsufficientData
            ));
        }

        // Zlib flags
        // See https://www.ietf.org/rfc/rfc1950.txt for
        // the RFC
        let cmf = self.data[0];
        let flg = self.data[1];

        let cm = cmf & 0xF;
        let cinfo = cmf >> 4;

        // confirm we have the right deflate methods
        if cm != 8
        {
            if cm == 15
            {
                return Err(InflateDecodeErrors::new_with_error(DecodeErrorStatus::Generic(
                    "CM of 15 is preserved by the standard,currently don't know how to handle it"
                )));
            }
            return Err(InflateDecodeErrors::new_with_error(
                DecodeErrorStatus::GenericStr(format!("Unknown zlib compression method {cm}"))
            ));
        }
        if cinfo > 7
        {
            return Err(InflateDecodeErrors::new_with_error(
                DecodeErrorStatus::GenericStr(format!(
                    "Unknown cinfo `{cinfo}` greater than 7, not allowed"
                ))
            ));
        }
        let flag_checks = (u16::from(cmf) * 256) + u16::from(flg);

        if flag_checks % 31 != 0
        {
            return Err(InflateDecodeErrors::new_with_error(DecodeErrorStatus::Generic(
                "FCHECK integrity not preserved"
            )));
        }
        if (flg >> 5) & 1 == 1
        {
            return Err(InflateDecodeErrors::new_with_error(DecodeErrorStatus::Generic(
                "Preset dictionaries are not supported"
            )));
        }

        self.position = 2;

        let data = self.decode_deflate()?;

        if self.options.confirm_checksum
        {
            let adler_bytes = match self.data.get(self.position..self.position + 4)
            {
                Some(bytes) => bytes,
                None =>
                {
                    return Err(InflateDecodeErrors::new(
                        DecodeErrorStatus::InsufficientData,
                        data
                    ))
                }
            };
            let mut adler = [0; 4];
            adler.copy_from_slice(adler_bytes);

            let expected = u32::from_be_bytes(adler);
            let found = calc_adler_hash(&data);

            if expected != found
            {
                return Err(InflateDecodeErrors::new(
                    DecodeErrorStatus::MismatchedAdler(expected, found),
                    data
                ));
            }
        }

        Ok(data)
    }

    /// Decode a raw deflate stream, starting at the current position.
    ///
    /// On success the position is left at the first byte after the
    /// final block.
    pub fn decode_deflate(&mut self) -> Result<Vec<u8>, InflateDecodeErrors>
    {
        let mut out = Vec::with_capacity(self.options.size_hint.min(self.options.limit));
        let src = self.data.get(self.position..).unwrap_or(&[]);
        let mut stream = BitStreamReader::new(src);

        match self.decode_blocks(&mut stream, &mut out)
        {
            Ok(()) =>
            {
                self.position += stream.align_to_byte();
                Ok(out)
            }
            Err(err) => Err(InflateDecodeErrors::new(err, out))
        }
    }

    fn decode_blocks(
        &self, stream: &mut BitStreamReader, out: &mut Vec<u8>
    ) -> Result<(), DecodeErrorStatus>
    {
        loop
        {
            let header = read_bits(stream, 3)? as u32;
            let is_last_block = header & 1 == 1;
            let block_type = header >> 1;

            if block_type == DEFLATE_BLOCKTYPE_UNCOMPRESSED
            {
                self.decode_stored_block(stream, out)?;
            }
            else if block_type == DEFLATE_BLOCKTYPE_STATIC_HUFFMAN
            {
                let tables = static_tables();
                self.decode_huffman_block(stream, out, &tables.litlen, &tables.offset)?;
            }
            else if block_type == DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN
            {
                let (litlen, offset) = read_dynamic_tables(stream)?;
                self.decode_huffman_block(stream, out, &litlen, &offset)?;
            }
            else
            {
                return Err(DecodeErrorStatus::CorruptData);
            }

            if is_last_block
            {
                return Ok(());
            }
        }
    }

    fn check_limit(&self, out: &[u8], extra: usize) -> Result<(), DecodeErrorStatus>
    {
        let new_size = out.len() + extra;

        if new_size > self.options.limit
        {
            return Err(DecodeErrorStatus::OutputLimitExceeded(
                self.options.limit,
                new_size
            ));
        }
        Ok(())
    }

    fn decode_stored_block(
        &self, stream: &mut BitStreamReader, out: &mut Vec<u8>
    ) -> Result<(), DecodeErrorStatus>
    {
        stream.align_to_byte();

        let header = stream
            .get_aligned_bytes(4)
            .ok_or(DecodeErrorStatus::InsufficientData)?;

        let len = u16::from_le_bytes([header[0], header[1]]);
        let nlen = u16::from_le_bytes([header[2], header[3]]);

        if len != !nlen
        {
            return Err(DecodeErrorStatus::Generic(
                "Stored block length does not match its complement"
            ));
        }
        self.check_limit(out, usize::from(len))?;

        let bytes = stream
            .get_aligned_bytes(usize::from(len))
            .ok_or(DecodeErrorStatus::InsufficientData)?;

        out.extend_from_slice(bytes);

        Ok(())
    }

    fn decode_huffman_block(
        &self, stream: &mut BitStreamReader, out: &mut Vec<u8>, litlen: &HuffmanDecodeTable,
        offset: &HuffmanDecodeTable
    ) -> Result<(), DecodeErrorStatus>
    {
        loop
        {
            let symbol = usize::from(litlen.decode_symbol(stream)?);

            if symbol < 256
            {
                self.check_limit(out, 1)?;
                out.push(symbol as u8);
                continue;
            }
            if symbol == DEFLATE_END_OF_BLOCK
            {
                return Ok(());
            }
            let length_symbol = symbol - 257;

            if length_symbol >= LENGTH_BASE.len()
            {
                return Err(DecodeErrorStatus::CorruptData);
            }
            let length = usize::from(LENGTH_BASE[length_symbol])
                + read_bits(stream, LENGTH_EXTRA_BITS[length_symbol])? as usize;

            let offset_symbol = usize::from(offset.decode_symbol(stream)?);

            if offset_symbol >= OFFSET_BASE.len()
            {
                return Err(DecodeErrorStatus::CorruptData);
            }
            let distance = usize::from(OFFSET_BASE[offset_symbol])
                + read_bits(stream, OFFSET_EXTRA_BITS[offset_symbol])? as usize;

            if distance > out.len()
            {
                return Err(DecodeErrorStatus::CorruptData);
            }
            self.check_limit(out, length)?;

            copy_rep_matches(out, distance, length);
        }
    }
}

/// Read `num_bits` from the stream, refilling as needed
#[inline(always)]
fn read_bits(stream: &mut BitStreamReader, num_bits: u8) -> Result<u64, DecodeErrorStatus>
{
    if num_bits == 0
    {
        return Ok(0);
    }
    stream.refill();

    if !stream.has(num_bits)
    {
        return Err(DecodeErrorStatus::InsufficientData);
    }
    Ok(stream.get_bits(num_bits))
}

/// Read the code length code and then the litlen and offset code
/// lengths of a dynamic block
fn read_dynamic_tables(
    stream: &mut BitStreamReader
) -> Result<(HuffmanDecodeTable, HuffmanDecodeTable), DecodeErrorStatus>
{
    let num_litlen_syms = 257 + read_bits(stream, 5)? as usize;
    let num_offset_syms = 1 + read_bits(stream, 5)? as usize;
    let num_explicit_precode_lens = 4 + read_bits(stream, 4)? as usize;

    if num_litlen_syms > DEFLATE_MAX_LITLEN_SYMS || num_offset_syms > DEFLATE_MAX_OFFSET_SYMS
    {
        return Err(DecodeErrorStatus::CorruptData);
    }

    let mut precode_lens = [0_u8; DEFLATE_NUM_PRECODE_SYMS];

    for i in DEFLATE_PRECODE_LENS_PERMUTATION
        .iter()
        .take(num_explicit_precode_lens)
    {
        precode_lens[usize::from(*i)] = read_bits(stream, 3)? as u8;
    }
    let precode = HuffmanDecodeTable::new(&precode_lens).ok_or(DecodeErrorStatus::CorruptData)?;

    let total = num_litlen_syms + num_offset_syms;
    let mut lens = [0_u8; DEFLATE_MAX_LITLEN_SYMS + DEFLATE_MAX_OFFSET_SYMS];
    let mut i = 0;

    while i < total
    {
        let presym = precode.decode_symbol(stream)?;

        let (value, repeat) = match presym
        {
            0..=15 => (presym as u8, 1),
            16 =>
            {
                // repeat the previous length 3 - 6 times
                if i == 0
                {
                    return Err(DecodeErrorStatus::CorruptData);
                }
                (lens[i - 1], 3 + read_bits(stream, 2)? as usize)
            }
            // repeat zero 3 - 10 times
            17 => (0, 3 + read_bits(stream, 3)? as usize),
            // repeat zero 11 - 138 times
            18 => (0, 11 + read_bits(stream, 7)? as usize),
            _ => return Err(DecodeErrorStatus::CorruptData)
        };

        if i + repeat > total
        {
            return Err(DecodeErrorStatus::CorruptData);
        }
        lens[i..i + repeat].fill(value);
        i += repeat;
    }

    if lens[DEFLATE_END_OF_BLOCK] == 0
    {
        return Err(DecodeErrorStatus::Generic("Dynamic block without an end of block code"));
    }
    let litlen = HuffmanDecodeTable::new(&lens[..num_litlen_syms])
        .ok_or(DecodeErrorStatus::CorruptData)?;
    let offset = HuffmanDecodeTable::new(&lens[num_litlen_syms..total])
        .ok_or(DecodeErrorStatus::CorruptData)?;

    Ok((litlen, offset))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn stored_block()
    {
        // final stored block holding "abc"
        let data = [0x01, 0x03, 0x00, 0xFC, 0xFF, b'a', b'b', b'c'];
        let out = DeflateDecoder::new(&data).decode_deflate().unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn fixed_block_with_back_reference()
    {
        // zlib's output for "aaaaaaaaaa" at level 9, raw deflate part
        let data = [0x4B, 0x4C, 0x84, 0x01, 0x00];
        let out = DeflateDecoder::new(&data).decode_deflate().unwrap();
        assert_eq!(out, b"aaaaaaaaaa");
    }

    #[test]
    fn reserved_block_type_is_corrupt()
    {
        // BFINAL=1, BTYPE=11
        let data = [0x07, 0x00, 0x00, 0x00];
        let err = DeflateDecoder::new(&data).decode_deflate().unwrap_err();
        assert!(matches!(err.error, DecodeErrorStatus::CorruptData));
    }

    #[test]
    fn distance_past_start_is_corrupt()
    {
        use crate::bitstream::BitStreamWriter;
        use crate::huffman::reversed_codes;

        let litlen = reversed_codes(&static_litlen_lengths());
        let offset = reversed_codes(&static_offset_lengths());

        let mut writer = BitStreamWriter::with_capacity(8);
        writer.put_bits(1 | (1 << 1), 3);
        // literal 'a'
        writer.put_bits(u32::from(litlen[usize::from(b'a')]), 8);
        // length 3 (symbol 257, 7 bits), distance 4 (symbol 3)
        writer.put_bits(u32::from(litlen[257]), 7);
        writer.put_bits(u32::from(offset[3]), 5);
        writer.put_bits(u32::from(litlen[256]), 7);
        let data = writer.finish();

        let err = DeflateDecoder::new(&data).decode_deflate().unwrap_err();
        assert!(matches!(err.error, DecodeErrorStatus::CorruptData));
        assert_eq!(err.data, b"a");
    }

    #[test]
    fn limit_is_respected()
    {
        let data = [0x01, 0x03, 0x00, 0xFC, 0xFF, b'a', b'b', b'c'];
        let options = DeflateOptions::default().set_limit(2);
        let err = DeflateDecoder::new_with_options(&data, options)
            .decode_deflate()
            .unwrap_err();
        assert!(matches!(
            err.error,
            DecodeErrorStatus::OutputLimitExceeded(2, 3)
        ));
    }

    #[test]
    fn truncated_stream()
    {
        let data = [0x4B, 0x4C];
        let err = DeflateDecoder::new(&data).decode_deflate().unwrap_err();
        assert!(matches!(err.error, DecodeErrorStatus::InsufficientData));
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn zlib_header_checks()
    {
        // bad FCHECK
        let data = [0x78, 0x9D, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01];
        assert!(DeflateDecoder::new(&data).decode_zlib().is_err());
        // empty zlib stream
        let data = [0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01];
        assert_eq!(DeflateDecoder::new(&data).decode_zlib().unwrap(), b"");
    }
}
