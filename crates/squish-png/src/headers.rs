/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Chunk parsers
//!
//! Every parser receives the chunk and its data, the CRC has already been
//! checked and the main stream already points past the chunk.
use log::{info, trace, warn};
use squish_core::bytestream::ZByteReader;

use crate::apng::FrameInfo;
use crate::decoder::{
    AnimationControl, BackgroundColor, FrameData, IccProfile, ItxtChunk, PhysicalDimensions,
    PngChunk, TextChunk, TimeInfo, TransparentColor, ZtxtChunk
};
use crate::enums::{BlendOp, DisposeOp, InterlaceMethod, PngChunkType, PngColor};
use crate::error::PngDecodeErrors;
use crate::PngDecoder;

pub(crate) mod writers;

/// Largest dimension IHDR and fcTL may carry
const MAX_DIMENSION: usize = (1 << 31) - 1;

fn check_length(chunk: &PngChunk, expected: usize) -> Result<(), PngDecodeErrors>
{
    if chunk.length != expected
    {
        return Err(PngDecodeErrors::Format(format!(
            "{:?} chunk length is {} and not {expected}",
            chunk.chunk_type, chunk.length
        )));
    }
    Ok(())
}

/// Split at the first null byte, used by the keyword of text chunks
fn split_at_null(data: &[u8]) -> Result<(&[u8], &[u8]), PngDecodeErrors>
{
    let position = data
        .iter()
        .position(|x| *x == 0)
        .ok_or(PngDecodeErrors::GenericStatic("Missing null separator"))?;

    Ok((&data[..position], &data[position + 1..]))
}

fn latin1_to_string(data: &[u8]) -> String
{
    data.iter().map(|x| char::from(*x)).collect()
}

fn read_keyword(data: &[u8]) -> Result<(String, &[u8]), PngDecodeErrors>
{
    let (keyword, rest) = split_at_null(data)?;

    if keyword.is_empty() || keyword.len() > 79
    {
        return Err(PngDecodeErrors::Format(format!(
            "Invalid keyword length {}",
            keyword.len()
        )));
    }
    Ok((latin1_to_string(keyword), rest))
}

impl<'a> PngDecoder<'a>
{
    pub(crate) fn parse_ihdr(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        if self.seen_hdr
        {
            return Err(PngDecodeErrors::GenericStatic("Multiple IHDR, corrupt PNG"));
        }
        check_length(&chunk, 13)?;

        let mut stream = ZByteReader::new(data);

        let width = stream.get_u32_be() as usize;
        let height = stream.get_u32_be() as usize;

        if width == 0 || height == 0
        {
            return Err(PngDecodeErrors::GenericStatic("Width or height cannot be zero"));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION
        {
            return Err(PngDecodeErrors::GenericStatic(
                "Width or height does not fit in 31 bits"
            ));
        }
        let options = &self.options.options;

        if width > options.get_max_width()
        {
            return Err(PngDecodeErrors::TooLarge(format!(
                "Image width {width}, larger than maximum configured width {}, aborting",
                options.get_max_width()
            )));
        }
        if height > options.get_max_height()
        {
            return Err(PngDecodeErrors::TooLarge(format!(
                "Image height {height}, larger than maximum configured height {}, aborting",
                options.get_max_height()
            )));
        }

        let depth = stream.get_u8();
        let color_int = stream.get_u8();

        let color = PngColor::from_int(color_int).ok_or_else(|| {
            PngDecodeErrors::Unsupported(format!("Unknown color type {color_int}"))
        })?;

        if !color.allows_depth(depth)
        {
            return Err(PngDecodeErrors::Unsupported(format!(
                "Bit depth {depth} is not allowed for color type {color:?}"
            )));
        }

        if stream.get_u8() != 0
        {
            return Err(PngDecodeErrors::Unsupported(
                "Unknown compression method".to_string()
            ));
        }
        if stream.get_u8() != 0
        {
            return Err(PngDecodeErrors::Unsupported("Unknown filter method".to_string()));
        }

        let interlace_int = stream.get_u8();

        let interlace = InterlaceMethod::from_int(interlace_int).ok_or_else(|| {
            PngDecodeErrors::Unsupported(format!("Unknown interlace method {interlace_int}"))
        })?;

        let png_info = &mut self.png_info;

        png_info.width = width;
        png_info.height = height;
        png_info.depth = depth;
        png_info.color = color;
        png_info.component = color.num_components();
        png_info.interlace_method = interlace;

        info!("Width: {}", width);
        info!("Height: {}", height);
        info!("Color type: {:?}", color);
        info!("Depth: {:?}", depth);
        info!("Interlace: {:?}", interlace);

        self.seen_hdr = true;

        Ok(())
    }

    pub(crate) fn parse_plte(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        if self.seen_plte
        {
            return Err(PngDecodeErrors::GenericStatic("Multiple PLTE chunks"));
        }
        if chunk.length % 3 != 0 || chunk.length == 0 || chunk.length > 256 * 3
        {
            return Err(PngDecodeErrors::Format(format!(
                "Invalid PLTE length {}, corrupt PNG",
                chunk.length
            )));
        }
        match self.png_info.color
        {
            PngColor::Luma | PngColor::LumaA =>
            {
                if self.options.options.get_strict_mode()
                {
                    return Err(PngDecodeErrors::GenericStatic(
                        "PLTE chunk in a greyscale image"
                    ));
                }
                warn!("Ignoring PLTE chunk in a greyscale image");
                return Ok(());
            }
            PngColor::Palette => (),
            // a suggested palette for truecolor images, not needed to decode
            PngColor::RGB | PngColor::RGBA => trace!("Suggested palette present")
        }

        self.png_info.palette = data
            .chunks_exact(3)
            .map(|entry| [entry[0], entry[1], entry[2], 255])
            .collect();

        self.seen_plte = true;

        Ok(())
    }

    pub(crate) fn parse_idat(&mut self, _chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        if self.png_info.color == PngColor::Palette && !self.seen_plte
        {
            return Err(PngDecodeErrors::GenericStatic(
                "IDAT chunk before the PLTE of an indexed image"
            ));
        }
        if !self.seen_idat && !self.frames.is_empty()
        {
            // the fcTL seen so far describes the default image
            self.default_is_frame = true;
        }
        self.seen_idat = true;
        self.idat_chunks.extend_from_slice(data);

        Ok(())
    }

    fn check_sequence(&mut self, chunk: &PngChunk, sequence: u32) -> Result<(), PngDecodeErrors>
    {
        if sequence != self.next_sequence
        {
            let message = format!(
                "{:?} has sequence number {sequence}, expected {}",
                chunk.chunk_type, self.next_sequence
            );
            if self.options.options.get_strict_mode()
            {
                return Err(PngDecodeErrors::Format(message));
            }
            warn!("{message}");
        }
        self.next_sequence = sequence.wrapping_add(1);

        Ok(())
    }

    pub(crate) fn parse_fctl(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        if self.png_info.animation.is_none()
        {
            if self.options.options.get_strict_mode()
            {
                return Err(PngDecodeErrors::GenericStatic("fcTL chunk without acTL"));
            }
            warn!("Ignoring fcTL chunk of an image without acTL");
            return Ok(());
        }
        check_length(&chunk, 26)?;

        let mut stream = ZByteReader::new(data);

        let sequence = stream.get_u32_be();
        let width = stream.get_u32_be() as usize;
        let height = stream.get_u32_be() as usize;
        let x_offset = stream.get_u32_be() as usize;
        let y_offset = stream.get_u32_be() as usize;
        let delay_num = stream.get_u16_be();
        let delay_den = stream.get_u16_be();
        let dispose_int = stream.get_u8();
        let blend_int = stream.get_u8();

        self.check_sequence(&chunk, sequence)?;

        let dispose_op = DisposeOp::from_int(dispose_int).ok_or_else(|| {
            PngDecodeErrors::Format(format!("Unknown dispose operation {dispose_int}"))
        })?;
        let blend_op = BlendOp::from_int(blend_int).ok_or_else(|| {
            PngDecodeErrors::Format(format!("Unknown blend operation {blend_int}"))
        })?;

        let info = &self.png_info;

        if width == 0
            || height == 0
            || x_offset.saturating_add(width) > info.width
            || y_offset.saturating_add(height) > info.height
        {
            return Err(PngDecodeErrors::Format(format!(
                "Frame {width}x{height} at ({x_offset},{y_offset}) lies outside the {}x{} canvas",
                info.width, info.height
            )));
        }
        if !self.seen_idat
            && (x_offset != 0 || y_offset != 0 || width != info.width || height != info.height)
        {
            return Err(PngDecodeErrors::GenericStatic(
                "The frame of the default image must cover the whole canvas"
            ));
        }
        if let Some(previous) = self.frames.last()
        {
            let is_default = self.frames.len() == 1 && self.default_is_frame;

            if !is_default && previous.data.is_empty()
            {
                return Err(PngDecodeErrors::GenericStatic("fcTL chunk without frame data"));
            }
        }
        trace!("Frame {}: {width}x{height} at ({x_offset},{y_offset})", self.frames.len());

        self.frames.push(FrameData {
            info: FrameInfo {
                sequence,
                width,
                height,
                x_offset,
                y_offset,
                delay_num,
                delay_den,
                dispose_op,
                blend_op
            },
            data: Vec::new()
        });

        Ok(())
    }

    pub(crate) fn parse_fdat(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        if chunk.length < 4
        {
            return Err(PngDecodeErrors::GenericStatic("fdAT chunk too short"));
        }
        if !self.seen_idat
        {
            return Err(PngDecodeErrors::GenericStatic("fdAT chunk before IDAT"));
        }
        let sequence = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);

        self.check_sequence(&chunk, sequence)?;

        let owns_default = self.frames.len() == 1 && self.default_is_frame;

        match self.frames.last_mut()
        {
            Some(frame) if !owns_default =>
            {
                frame.data.extend_from_slice(&data[4..]);
                Ok(())
            }
            _ => Err(PngDecodeErrors::GenericStatic(
                "fdAT chunk without a preceding fcTL"
            ))
        }
    }

    /// Dispatch the ancillary chunks that only carry information
    pub(crate) fn parse_ancillary(
        &mut self, chunk: PngChunk, data: &[u8]
    ) -> Result<(), PngDecodeErrors>
    {
        match chunk.chunk_type
        {
            PngChunkType::tRNS => self.parse_trns(chunk, data),
            PngChunkType::gAMA => self.parse_gama(chunk, data),
            PngChunkType::sRGB => self.parse_srgb(chunk, data),
            PngChunkType::iCCP => self.parse_iccp(data),
            PngChunkType::pHYs => self.parse_phys(chunk, data),
            PngChunkType::cHRM => self.parse_chrm(chunk, data),
            PngChunkType::bKGD => self.parse_bkgd(chunk, data),
            PngChunkType::hIST => self.parse_hist(chunk, data),
            PngChunkType::tIME => self.parse_time(chunk, data),
            PngChunkType::tEXt => self.parse_text(data),
            PngChunkType::zTXt => self.parse_ztxt(data),
            PngChunkType::iTXt => self.parse_itxt(data),
            PngChunkType::acTL => self.parse_actl(chunk, data),
            _ => Ok(())
        }
    }

    fn parse_trns(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        let mut stream = ZByteReader::new(data);

        match self.png_info.color
        {
            PngColor::Luma =>
            {
                check_length(&chunk, 2)?;
                let grey = stream.get_u16_be();
                self.png_info.transparency = Some(TransparentColor::Luma(grey));
            }
            PngColor::RGB =>
            {
                check_length(&chunk, 6)?;
                let red = stream.get_u16_be();
                let green = stream.get_u16_be();
                let blue = stream.get_u16_be();
                self.png_info.transparency = Some(TransparentColor::Rgb([red, green, blue]));
            }
            PngColor::Palette =>
            {
                if !self.seen_plte
                {
                    return Err(PngDecodeErrors::GenericStatic("tRNS chunk before PLTE"));
                }
                if chunk.length > self.png_info.palette.len()
                {
                    return Err(PngDecodeErrors::GenericStatic(
                        "tRNS chunk with more entries than the palette"
                    ));
                }
                for (entry, alpha) in self.png_info.palette.iter_mut().zip(data)
                {
                    entry[3] = *alpha;
                }
            }
            _ =>
            {
                return Err(PngDecodeErrors::Format(format!(
                    "A tRNS chunk shall not appear for colour type {:?} as it is already transparent",
                    self.png_info.color
                )));
            }
        }
        Ok(())
    }

    fn parse_gama(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        check_length(&chunk, 4)?;

        let gamma = ZByteReader::new(data).get_u32_be();

        if gamma == 0
        {
            return Err(PngDecodeErrors::GenericStatic("Gamma of zero is invalid"));
        }
        self.png_info.gamma = Some(gamma);

        Ok(())
    }

    fn parse_srgb(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        check_length(&chunk, 1)?;

        if data[0] > 3
        {
            return Err(PngDecodeErrors::Format(format!(
                "Unknown rendering intent {}",
                data[0]
            )));
        }
        self.png_info.srgb_intent = Some(data[0]);

        Ok(())
    }

    fn parse_iccp(&mut self, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        let (name, rest) = read_keyword(data)?;

        match rest.split_first()
        {
            Some((&0, compressed)) =>
            {
                let profile = self.inflate(compressed, *b"iCCP", compressed.len() * 2)?;

                self.png_info.icc_profile = Some(IccProfile {
                    name,
                    data: profile
                });
                Ok(())
            }
            _ => Err(PngDecodeErrors::GenericStatic(
                "Unknown iCCP compression method"
            ))
        }
    }

    fn parse_phys(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        check_length(&chunk, 9)?;

        let mut stream = ZByteReader::new(data);

        self.png_info.physical_dimensions = Some(PhysicalDimensions {
            x_pixels_per_unit: stream.get_u32_be(),
            y_pixels_per_unit: stream.get_u32_be(),
            unit:              stream.get_u8()
        });
        Ok(())
    }

    fn parse_chrm(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        check_length(&chunk, 32)?;

        let mut stream = ZByteReader::new(data);
        let mut values = [0; 8];

        for value in &mut values
        {
            *value = stream.get_u32_be();
        }
        self.png_info.chromaticities = Some(values);

        Ok(())
    }

    fn parse_bkgd(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        let mut stream = ZByteReader::new(data);

        let background = match self.png_info.color
        {
            PngColor::Palette =>
            {
                check_length(&chunk, 1)?;
                BackgroundColor::Palette(data[0])
            }
            PngColor::Luma | PngColor::LumaA =>
            {
                check_length(&chunk, 2)?;
                BackgroundColor::Luma(stream.get_u16_be())
            }
            PngColor::RGB | PngColor::RGBA =>
            {
                check_length(&chunk, 6)?;
                BackgroundColor::Rgb([
                    stream.get_u16_be(),
                    stream.get_u16_be(),
                    stream.get_u16_be()
                ])
            }
        };
        self.png_info.background = Some(background);

        Ok(())
    }

    fn parse_hist(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        if !self.seen_plte
        {
            return Err(PngDecodeErrors::GenericStatic("hIST chunk before PLTE"));
        }
        check_length(&chunk, self.png_info.palette.len() * 2)?;

        self.png_info.histogram = data
            .chunks_exact(2)
            .map(|x| u16::from_be_bytes([x[0], x[1]]))
            .collect();

        Ok(())
    }

    fn parse_time(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        check_length(&chunk, 7)?;

        let mut stream = ZByteReader::new(data);

        let year = stream.get_u16_be();
        let month = stream.get_u8() % 13;
        let day = stream.get_u8() % 32;
        let hour = stream.get_u8() % 24;
        let minute = stream.get_u8() % 60;
        let second = stream.get_u8() % 61;

        self.png_info.time_info = Some(TimeInfo {
            year,
            month,
            day,
            hour,
            minute,
            second
        });
        Ok(())
    }

    fn parse_text(&mut self, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        let (keyword, text) = read_keyword(data)?;

        self.png_info.text_chunks.push(TextChunk {
            keyword,
            text: latin1_to_string(text)
        });
        Ok(())
    }

    fn parse_ztxt(&mut self, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        let (keyword, rest) = read_keyword(data)?;

        match rest.split_first()
        {
            Some((&0, compressed)) =>
            {
                let text = self.inflate(compressed, *b"zTXt", compressed.len() * 2)?;

                self.png_info.ztxt_chunks.push(ZtxtChunk {
                    keyword,
                    text: latin1_to_string(&text)
                });
                Ok(())
            }
            _ => Err(PngDecodeErrors::GenericStatic(
                "Unknown zTXt compression method"
            ))
        }
    }

    fn parse_itxt(&mut self, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        let (keyword, rest) = read_keyword(data)?;

        if rest.len() < 2
        {
            return Err(PngDecodeErrors::GenericStatic("iTXt chunk too short"));
        }
        let compressed = rest[0] == 1;
        let method = rest[1];

        let (language_tag, rest) = split_at_null(&rest[2..])?;
        let (translated_keyword, text) = split_at_null(rest)?;

        let text = if compressed
        {
            if method != 0
            {
                return Err(PngDecodeErrors::GenericStatic(
                    "Unknown iTXt compression method"
                ));
            }
            self.inflate(text, *b"iTXt", text.len() * 2)?
        }
        else
        {
            text.to_vec()
        };

        self.png_info.itxt_chunks.push(ItxtChunk {
            keyword,
            compressed,
            language_tag: String::from_utf8_lossy(language_tag).into_owned(),
            translated_keyword: String::from_utf8_lossy(translated_keyword).into_owned(),
            text: String::from_utf8_lossy(&text).into_owned()
        });
        Ok(())
    }

    fn parse_actl(&mut self, chunk: PngChunk, data: &[u8]) -> Result<(), PngDecodeErrors>
    {
        check_length(&chunk, 8)?;

        if self.png_info.animation.is_some()
        {
            return Err(PngDecodeErrors::GenericStatic("Multiple acTL chunks"));
        }
        let mut stream = ZByteReader::new(data);

        let num_frames = stream.get_u32_be();
        let num_plays = stream.get_u32_be();

        if num_frames == 0
        {
            return Err(PngDecodeErrors::GenericStatic("acTL with zero frames"));
        }
        self.png_info.animation = Some(AnimationControl {
            num_frames,
            num_plays
        });
        Ok(())
    }
}
