/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Chunk serialization
use squish_core::bytestream::ZByteWriter;
use squish_inflate::{DeflateEncoder, DeflateEncodingOptions};

use crate::apng::FrameInfo;
use crate::constants::IDAT_CHUNK_SIZE;
use crate::crc::calc_crc_with_bytes;
use crate::enums::{InterlaceMethod, PngColor};
use crate::error::PngEncodeErrors;

/// Write a complete chunk, length, type, data and CRC
pub(crate) fn write_chunk(name: &[u8; 4], data: &[u8], output: &mut Vec<u8>)
{
    let mut writer = ZByteWriter::new(output);

    writer.write_u32_be(data.len() as u32);
    writer.write_all(name);
    writer.write_all(data);
    // crc is a continuous function, so first crc the chunk name
    // and then crc that with the chunk bytes passing in the previous crc
    let crc = calc_crc_with_bytes(name, u32::MAX);
    let crc = !calc_crc_with_bytes(data, crc);

    writer.write_u32_be(crc);
}

/// Write a chunk whose data is produced by `func`
pub(crate) fn write_header_fn<F: FnOnce(&mut ZByteWriter)>(
    name: &[u8; 4], output: &mut Vec<u8>, func: F
)
{
    let mut data = Vec::with_capacity(32);
    {
        let mut writer = ZByteWriter::new(&mut data);
        (func)(&mut writer);
    }
    write_chunk(name, &data, output);
}

pub(crate) fn write_ihdr(
    width: usize, height: usize, depth: u8, color: PngColor, interlace: InterlaceMethod,
    output: &mut Vec<u8>
)
{
    write_header_fn(b"IHDR", output, |writer| {
        writer.write_u32_be(width as u32);
        writer.write_u32_be(height as u32);
        writer.write_u8(depth);
        writer.write_u8(color.to_int());
        // compression method
        writer.write_u8(0);
        // filter method
        writer.write_u8(0);
        writer.write_u8(interlace.to_int());
    });
}

pub(crate) fn write_actl(num_frames: usize, num_plays: u32, output: &mut Vec<u8>)
{
    write_header_fn(b"acTL", output, |writer| {
        writer.write_u32_be(num_frames as u32);
        writer.write_u32_be(num_plays);
    });
}

pub(crate) fn write_fctl(info: &FrameInfo, output: &mut Vec<u8>)
{
    write_header_fn(b"fcTL", output, |writer| {
        writer.write_u32_be(info.sequence);
        writer.write_u32_be(info.width as u32);
        writer.write_u32_be(info.height as u32);
        writer.write_u32_be(info.x_offset as u32);
        writer.write_u32_be(info.y_offset as u32);
        writer.write_u16_be(info.delay_num);
        writer.write_u16_be(info.delay_den);
        writer.write_u8(info.dispose_op.to_int());
        writer.write_u8(info.blend_op.to_int());
    });
}

/// Write `PLTE` and, when some entry is not opaque, `tRNS` truncated after
/// the last translucent entry
pub(crate) fn write_palette(palette: &[[u8; 4]], output: &mut Vec<u8>)
{
    write_header_fn(b"PLTE", output, |writer| {
        for entry in palette
        {
            writer.write_all(&entry[..3]);
        }
    });

    if let Some(last) = palette.iter().rposition(|entry| entry[3] != 255)
    {
        let alphas: Vec<u8> = palette[..=last].iter().map(|entry| entry[3]).collect();
        write_chunk(b"tRNS", &alphas, output);
    }
}

/// Write compressed image data, as `IDAT` chunks or as `fdAT` chunks
/// numbered from `sequence` on
///
/// Returns the next free sequence number.
pub(crate) fn write_image_data(
    data: &[u8], sequence: Option<u32>, output: &mut Vec<u8>
) -> Option<u32>
{
    match sequence
    {
        None =>
        {
            for chunk in data.chunks(IDAT_CHUNK_SIZE)
            {
                write_chunk(b"IDAT", chunk, output);
            }
            None
        }
        Some(mut sequence) =>
        {
            let mut buffer = Vec::with_capacity(IDAT_CHUNK_SIZE + 4);

            for chunk in data.chunks(IDAT_CHUNK_SIZE)
            {
                buffer.clear();
                buffer.extend_from_slice(&sequence.to_be_bytes());
                buffer.extend_from_slice(chunk);
                write_chunk(b"fdAT", &buffer, output);
                sequence += 1;
            }
            Some(sequence)
        }
    }
}

fn check_keyword(keyword: &str) -> Result<(), PngEncodeErrors>
{
    if keyword.is_empty() || keyword.len() > 79 || !keyword.bytes().all(|x| (32..=126).contains(&x))
    {
        return Err(PngEncodeErrors::Generic(format!(
            "Invalid chunk keyword {keyword:?}, expected 1 to 79 printable ASCII characters"
        )));
    }
    Ok(())
}

fn to_latin1(text: &str) -> Result<Vec<u8>, PngEncodeErrors>
{
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| PngEncodeErrors::Generic(format!("{text:?} is not latin-1 text")))
}

pub(crate) fn write_text(keyword: &str, text: &str, output: &mut Vec<u8>) -> Result<(), PngEncodeErrors>
{
    check_keyword(keyword)?;

    let text = to_latin1(text)?;

    let mut data = Vec::with_capacity(keyword.len() + 1 + text.len());
    data.extend_from_slice(keyword.as_bytes());
    data.push(0);
    data.extend_from_slice(&text);

    write_chunk(b"tEXt", &data, output);

    Ok(())
}

pub(crate) fn write_iccp(
    name: &str, profile: &[u8], level: u8, output: &mut Vec<u8>
) -> Result<(), PngEncodeErrors>
{
    check_keyword(name)?;

    let options = DeflateEncodingOptions::default().set_level(level);
    let compressed = DeflateEncoder::new_with_options(profile, options).encode_zlib();

    let mut data = Vec::with_capacity(name.len() + 2 + compressed.len());
    data.extend_from_slice(name.as_bytes());
    // null separator and compression method
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(&compressed);

    write_chunk(b"iCCP", &data, output);

    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::crc::calc_crc;

    #[test]
    fn iend_chunk_bytes()
    {
        let mut out = vec![];
        write_chunk(b"IEND", &[], &mut out);
        assert_eq!(out, [0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82]);
    }

    #[test]
    fn crc_covers_type_and_data()
    {
        let mut out = vec![];
        write_chunk(b"tEXt", b"a\0b", &mut out);

        let crc = u32::from_be_bytes([out[11], out[12], out[13], out[14]]);
        assert_eq!(crc, calc_crc(&out[4..11]));
    }

    #[test]
    fn trns_is_truncated()
    {
        let palette = [[0, 0, 0, 0], [1, 1, 1, 100], [2, 2, 2, 255], [3, 3, 3, 255]];
        let mut out = vec![];
        write_palette(&palette, &mut out);

        // PLTE: 12 header bytes + 12 data bytes, then tRNS with two entries
        assert_eq!(&out[24 + 4..24 + 8], b"tRNS");
        assert_eq!(&out[24..24 + 4], &[0, 0, 0, 2]);
        assert_eq!(&out[24 + 8..24 + 10], &[0, 100]);

        let mut opaque = vec![];
        write_palette(&[[1, 2, 3, 255]], &mut opaque);
        assert_eq!(opaque.len(), 12 + 3);
    }

    #[test]
    fn fdat_chunks_are_numbered()
    {
        let data = vec![7_u8; IDAT_CHUNK_SIZE + 10];
        let mut out = vec![];
        let next = write_image_data(&data, Some(5), &mut out);
        assert_eq!(next, Some(7));
        assert_eq!(&out[4..8], b"fdAT");
        assert_eq!(&out[8..12], &5_u32.to_be_bytes());

        let mut out = vec![];
        assert_eq!(write_image_data(&data, None, &mut out), None);
        assert_eq!(out.len(), 2 * 12 + data.len());
    }

    #[test]
    fn text_must_be_latin1()
    {
        let mut out = vec![];
        assert!(write_text("Comment", "café", &mut out).is_ok());
        assert!(write_text("Comment", "日本", &mut out).is_err());
        assert!(write_text("", "x", &mut out).is_err());
    }
}
