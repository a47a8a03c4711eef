/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use log::{info, trace, warn};
use squish_core::bit_depth::BitDepth;
use squish_core::bytestream::ZByteReader;
use squish_core::colorspace::ColorSpace;
use squish_inflate::{DeflateDecoder, DeflateOptions};

use crate::apng::{Compositor, Frame, FrameInfo};
use crate::constants::{PNG_MAX_CHUNK_LENGTH, PNG_SIGNATURE};
use crate::enums::{FilterMethod, InterlaceMethod, PngChunkType, PngColor};
use crate::error::PngDecodeErrors;
use crate::filters::de_filter_scanline;
use crate::interlace::{passes, scatter};
use crate::options::PngOptions;
use crate::utils::{
    expand_palette, packed_row_bytes, sample_bytes, sample_to_u8, scale_luma, to_rgba8,
    unpack_bits
};

#[derive(Copy, Clone, Debug)]
pub(crate) struct PngChunk
{
    pub length:     usize,
    pub chunk_type: PngChunkType,
    pub chunk:      [u8; 4],
    pub crc:        u32,
    /// Offset of the chunk's length field
    pub offset:     usize
}

/// Colour key from a `tRNS` chunk of a non palette image
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransparentColor
{
    Luma(u16),
    Rgb([u16; 3])
}

/// Contents of a `bKGD` chunk, in the image's own sample format
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BackgroundColor
{
    Palette(u8),
    Luma(u16),
    Rgb([u16; 3])
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TimeInfo
{
    pub year:   u16,
    pub month:  u8,
    pub day:    u8,
    pub hour:   u8,
    pub minute: u8,
    pub second: u8
}

/// Contents of a `pHYs` chunk
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PhysicalDimensions
{
    pub x_pixels_per_unit: u32,
    pub y_pixels_per_unit: u32,
    /// 1 when the unit is the metre, 0 when only the aspect ratio is known
    pub unit:              u8
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IccProfile
{
    pub name: String,
    /// The decompressed profile
    pub data: Vec<u8>
}

/// A `tEXt` chunk
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TextChunk
{
    pub keyword: String,
    pub text:    String
}

/// A `zTXt` chunk, text already decompressed
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ZtxtChunk
{
    pub keyword: String,
    pub text:    String
}

/// An `iTXt` chunk, text already decompressed
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ItxtChunk
{
    pub keyword:            String,
    pub compressed:         bool,
    pub language_tag:       String,
    pub translated_keyword: String,
    pub text:               String
}

/// Contents of an `acTL` chunk
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AnimationControl
{
    pub num_frames: u32,
    /// Zero means loop forever
    pub num_plays:  u32
}

/// Everything known about an image after its headers have been parsed
#[derive(Default, Debug, Clone)]
pub struct PngInfo
{
    pub width:               usize,
    pub height:              usize,
    pub depth:               u8,
    pub color:               PngColor,
    pub component:           u8,
    pub interlace_method:    InterlaceMethod,
    /// RGBA palette, alpha taken from `tRNS`
    pub palette:             Vec<[u8; 4]>,
    pub transparency:        Option<TransparentColor>,
    /// Gamma times 100000
    pub gamma:               Option<u32>,
    /// Rendering intent from `sRGB`
    pub srgb_intent:         Option<u8>,
    pub icc_profile:         Option<IccProfile>,
    pub physical_dimensions: Option<PhysicalDimensions>,
    /// White point and red, green, blue x/y, times 100000
    pub chromaticities:      Option<[u32; 8]>,
    pub background:          Option<BackgroundColor>,
    pub histogram:           Vec<u16>,
    pub time_info:           Option<TimeInfo>,
    pub text_chunks:         Vec<TextChunk>,
    pub ztxt_chunks:         Vec<ZtxtChunk>,
    pub itxt_chunks:         Vec<ItxtChunk>,
    pub animation:           Option<AnimationControl>
}

/// A frame control chunk and its compressed data
pub(crate) struct FrameData
{
    pub info: FrameInfo,
    pub data: Vec<u8>
}

/// A PNG and APNG decoder
///
/// The whole chunk stream is parsed on the first call that needs it,
/// pixel data is inflated when one of the `decode_*` functions is called.
///
/// # Example
/// ```
/// use squish_png::PngDecoder;
///
/// fn decode(data: &[u8]) -> Vec<u8> {
///     let mut decoder = PngDecoder::new(data);
///     decoder.decode_rgba().unwrap()
/// }
/// ```
pub struct PngDecoder<'a>
{
    pub(crate) stream:           ZByteReader<'a>,
    pub(crate) options:          PngOptions,
    pub(crate) png_info:         PngInfo,
    pub(crate) idat_chunks:      Vec<u8>,
    pub(crate) frames:           Vec<FrameData>,
    pub(crate) seen_hdr:         bool,
    pub(crate) seen_plte:        bool,
    pub(crate) seen_idat:        bool,
    pub(crate) seen_iend:        bool,
    pub(crate) headers_decoded:  bool,
    /// The default image is the first frame of the animation
    pub(crate) default_is_frame: bool,
    pub(crate) next_sequence:    u32
}

impl<'a> PngDecoder<'a>
{
    pub fn new(data: &'a [u8]) -> PngDecoder<'a>
    {
        PngDecoder::new_with_options(data, PngOptions::default())
    }

    pub fn new_with_options(data: &'a [u8], options: PngOptions) -> PngDecoder<'a>
    {
        PngDecoder {
            stream: ZByteReader::new(data),
            options,
            png_info: PngInfo::default(),
            idat_chunks: Vec::new(),
            frames: Vec::new(),
            seen_hdr: false,
            seen_plte: false,
            seen_idat: false,
            seen_iend: false,
            headers_decoded: false,
            default_is_frame: false,
            next_sequence: 0
        }
    }

    /// Image information, `None` before headers were decoded
    pub const fn get_info(&self) -> Option<&PngInfo>
    {
        if !self.headers_decoded
        {
            return None;
        }
        Some(&self.png_info)
    }

    pub const fn get_dimensions(&self) -> Option<(usize, usize)>
    {
        if !self.seen_hdr
        {
            return None;
        }

        Some((self.png_info.width, self.png_info.height))
    }

    /// Depth of the samples returned by [`decode_raw`](Self::decode_raw)
    pub const fn get_depth(&self) -> Option<BitDepth>
    {
        if !self.seen_hdr
        {
            return None;
        }
        if self.png_info.depth == 16
        {
            Some(BitDepth::Sixteen)
        }
        else
        {
            Some(BitDepth::Eight)
        }
    }

    /// Colorspace of the samples returned by [`decode_raw`](Self::decode_raw)
    pub fn get_colorspace(&self) -> Option<ColorSpace>
    {
        if !self.seen_hdr
        {
            return None;
        }
        let colorspace = match self.png_info.color
        {
            PngColor::Palette =>
            {
                if self.png_info.palette.iter().any(|entry| entry[3] != 255)
                {
                    ColorSpace::RGBA
                }
                else
                {
                    ColorSpace::RGB
                }
            }
            PngColor::Luma => ColorSpace::Luma,
            PngColor::LumaA => ColorSpace::LumaA,
            PngColor::RGB => ColorSpace::RGB,
            PngColor::RGBA => ColorSpace::RGBA
        };
        Some(colorspace)
    }

    /// Whether the stream carries an animation that will be decoded as such
    pub fn is_animated(&self) -> bool
    {
        self.png_info.animation.is_some()
            && !self.frames.is_empty()
            && self.options.options.png_get_decode_animated()
    }

    fn read_chunk_header(&mut self) -> Result<PngChunk, PngDecodeErrors>
    {
        // Format is length - chunk type - [data] -  crc chunk
        let offset = self.stream.get_position();
        let header = self.stream.get_as_ref(8)?;

        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let chunk = [header[4], header[5], header[6], header[7]];
        let chunk_type = PngChunkType::from_bytes(&chunk);

        if length > PNG_MAX_CHUNK_LENGTH
        {
            return Err(PngDecodeErrors::Format(format!(
                "Chunk {} at offset {offset} has an invalid length {length}",
                String::from_utf8_lossy(&chunk)
            )));
        }

        if !self.stream.has(length + 4 /*crc*/)
        {
            return Err(PngDecodeErrors::UnexpectedEof {
                chunk,
                offset,
                needed: length + 4,
                remaining: self.stream.get_bytes_left()
            });
        }
        let crc_bytes = self.stream.peek_at(length, 4)?;
        let crc = u32::from_be_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        #[cfg(feature = "crc")]
        {
            if self.options.options.png_get_confirm_crc()
            {
                use crate::crc::calc_crc_with_bytes;

                let data = self.stream.peek_at(0, length)?;
                // crc covers the chunk type and the data
                let calculated = !calc_crc_with_bytes(data, calc_crc_with_bytes(&chunk, u32::MAX));

                if crc != calculated
                {
                    return Err(PngDecodeErrors::BadCrc {
                        chunk,
                        offset,
                        expected: crc,
                        found: calculated
                    });
                }
            }
        }
        trace!(
            "Chunk {} of length {length} at offset {offset}",
            String::from_utf8_lossy(&chunk)
        );

        Ok(PngChunk {
            length,
            chunk_type,
            chunk,
            crc,
            offset
        })
    }

    /// Parse every chunk up to `IEND`
    ///
    /// This is called by all `decode_*` functions, call it directly to only
    /// read image information.
    pub fn decode_headers(&mut self) -> Result<(), PngDecodeErrors>
    {
        if self.headers_decoded
        {
            return Ok(());
        }
        let strict = self.options.options.get_strict_mode();

        let signature = self
            .stream
            .get_u64_be_err()
            .map_err(|_| PngDecodeErrors::BadSignature)?;

        if signature != PNG_SIGNATURE
        {
            return Err(PngDecodeErrors::BadSignature);
        }

        loop
        {
            if !self.stream.has(12)
            {
                // not even room for an empty chunk, the stream ends before IEND
                return Err(PngDecodeErrors::UnexpectedEof {
                    chunk:     *b"IEND",
                    offset:    self.stream.get_position(),
                    needed:    12,
                    remaining: self.stream.get_bytes_left()
                });
            }
            let chunk = self.read_chunk_header()?;

            if !self.seen_hdr && chunk.chunk_type != PngChunkType::IHDR
            {
                return Err(PngDecodeErrors::Format(format!(
                    "First chunk is {} and not IHDR, corrupt PNG",
                    String::from_utf8_lossy(&chunk.chunk)
                )));
            }
            let data = self.stream.get_as_ref(chunk.length)?;
            // skip crc
            self.stream.skip(4);

            if self.seen_idat && chunk.chunk_type.should_appear_before_idat()
            {
                if strict || chunk.chunk_type == PngChunkType::PLTE
                {
                    return Err(PngDecodeErrors::Format(format!(
                        "{:?} chunk after IDAT",
                        chunk.chunk_type
                    )));
                }
                warn!("Ignoring {:?} chunk after IDAT", chunk.chunk_type);
                continue;
            }
            if self.seen_plte && chunk.chunk_type.should_appear_before_plte()
            {
                warn!("{:?} chunk should appear before PLTE", chunk.chunk_type);
            }

            match chunk.chunk_type
            {
                PngChunkType::IHDR => self.parse_ihdr(chunk, data)?,
                PngChunkType::PLTE => self.parse_plte(chunk, data)?,
                PngChunkType::IDAT => self.parse_idat(chunk, data)?,
                PngChunkType::fcTL => self.parse_fctl(chunk, data)?,
                PngChunkType::fdAT => self.parse_fdat(chunk, data)?,
                PngChunkType::IEND =>
                {
                    self.seen_iend = true;
                    break;
                }
                PngChunkType::unkn =>
                {
                    let end = self.stream.get_position();
                    self.stream.set_position(chunk.offset + 8)?;

                    (self.options.chunk_handler)(
                        chunk.length,
                        chunk.chunk,
                        &mut self.stream,
                        chunk.crc
                    )?;

                    self.stream.set_position(end)?;
                }
                _ =>
                {
                    let result = self.parse_ancillary(chunk, data);
                    self.tolerate(chunk, result)?;
                }
            }
        }

        if self.seen_iend && !self.stream.eof()
        {
            warn!(
                "{} bytes of trailing data after IEND",
                self.stream.get_bytes_left()
            );
        }
        if !self.seen_idat
        {
            return Err(PngDecodeErrors::GenericStatic("No IDAT chunk, corrupt PNG"));
        }
        if self.png_info.color == PngColor::Palette && !self.seen_plte
        {
            return Err(PngDecodeErrors::GenericStatic(
                "Indexed image without a PLTE chunk"
            ));
        }
        if let Some(animation) = self.png_info.animation
        {
            if animation.num_frames as usize != self.frames.len()
            {
                if strict
                {
                    return Err(PngDecodeErrors::Format(format!(
                        "acTL announces {} frames but {} are present",
                        animation.num_frames,
                        self.frames.len()
                    )));
                }
                warn!(
                    "acTL announces {} frames but {} are present",
                    animation.num_frames,
                    self.frames.len()
                );
            }
            info!("Animation with {} frames", self.frames.len());
        }
        self.headers_decoded = true;

        Ok(())
    }

    /// Errors from ancillary chunks only abort decoding in strict mode
    fn tolerate(
        &self, chunk: PngChunk, result: Result<(), PngDecodeErrors>
    ) -> Result<(), PngDecodeErrors>
    {
        match result
        {
            Err(err) if !self.options.options.get_strict_mode() =>
            {
                warn!(
                    "Ignoring malformed {} chunk: {err:?}",
                    String::from_utf8_lossy(&chunk.chunk)
                );
                Ok(())
            }
            result => result
        }
    }

    pub(crate) fn inflate(
        &self, data: &[u8], chunk: [u8; 4], size_hint: usize
    ) -> Result<Vec<u8>, PngDecodeErrors>
    {
        let decoder_options = &self.options.options;

        let options = DeflateOptions::default()
            .set_size_hint(size_hint)
            .set_limit(decoder_options.get_deflate_limit())
            .set_confirm_checksum(decoder_options.inflate_get_confirm_adler());

        DeflateDecoder::new_with_options(data, options)
            .decode_zlib()
            .map_err(|error| PngDecodeErrors::ZlibDecodeErrors { chunk, error })
    }

    /// Inflate, de-filter and de-interlace one image of `width` x `height`
    ///
    /// Returns unpacked samples, see the `utils` module.
    fn decode_image(
        &self, data: &[u8], chunk: [u8; 4], width: usize, height: usize
    ) -> Result<Vec<u8>, PngDecodeErrors>
    {
        let info = &self.png_info;
        let components = usize::from(info.component);
        let depth = info.depth;
        let pixel_bytes = components * sample_bytes(depth);
        // bytes between a byte and the same byte of the pixel to its left
        let filter_bpp = ((components * usize::from(depth)) / 8).max(1);

        let image_passes = passes(width, height, info.interlace_method);

        let expected: usize = image_passes
            .iter()
            .filter(|pass| !pass.is_empty())
            .map(|pass| (packed_row_bytes(pass.width, components, depth) + 1) * pass.height)
            .sum();

        let inflated = self.inflate(data, chunk, expected)?;

        if inflated.len() < expected
        {
            return Err(PngDecodeErrors::UnexpectedEof {
                chunk,
                offset: inflated.len(),
                needed: expected,
                remaining: inflated.len()
            });
        }

        let mut out = vec![0_u8; width * height * pixel_bytes];
        let mut offset = 0;

        for pass in image_passes.iter().filter(|pass| !pass.is_empty())
        {
            let row_bytes = packed_row_bytes(pass.width, components, depth);
            let unpacked_row = pass.width * pixel_bytes;

            let mut prev_row = vec![0_u8; row_bytes];
            let mut current = vec![0_u8; row_bytes];
            let mut pass_pixels = vec![0_u8; unpacked_row * pass.height];

            for y in 0..pass.height
            {
                let filter_byte = inflated[offset];
                let raw = &inflated[offset + 1..offset + 1 + row_bytes];
                offset += row_bytes + 1;

                let filter = FilterMethod::from_int(filter_byte).ok_or_else(|| {
                    PngDecodeErrors::Format(format!("Unknown filter type {filter_byte}"))
                })?;

                de_filter_scanline(filter, &prev_row, raw, &mut current, filter_bpp);

                let out_row = &mut pass_pixels[y * unpacked_row..(y + 1) * unpacked_row];

                if depth < 8
                {
                    unpack_bits(&current, depth, pass.width * components, out_row);
                }
                else
                {
                    out_row.copy_from_slice(&current[..unpacked_row]);
                }
                std::mem::swap(&mut prev_row, &mut current);
            }
            scatter(pass, &pass_pixels, &mut out, width, pixel_bytes);
        }
        Ok(out)
    }

    /// Decode the default image into its own sample layout
    ///
    /// - Sub byte grey samples are scaled to 0..=255, one sample per byte
    /// - Indexed images are expanded to RGB, or RGBA when the palette has
    ///   transparency, see [`get_colorspace`](Self::get_colorspace)
    /// - 16 bit samples are two big endian bytes
    pub fn decode_raw(&mut self) -> Result<Vec<u8>, PngDecodeErrors>
    {
        self.decode_headers()?;

        let info = &self.png_info;
        let mut samples = self.decode_image(&self.idat_chunks, *b"IDAT", info.width, info.height)?;

        match info.color
        {
            PngColor::Palette =>
            {
                let components = match self.get_colorspace()
                {
                    Some(ColorSpace::RGBA) => 4,
                    _ => 3
                };
                samples = expand_palette(&samples, &info.palette, components);
            }
            PngColor::Luma => scale_luma(&mut samples, info.depth),
            _ => ()
        }
        Ok(samples)
    }

    /// Decode the default image to 8 bit RGBA
    pub fn decode_rgba(&mut self) -> Result<Vec<u8>, PngDecodeErrors>
    {
        self.decode_headers()?;

        let info = &self.png_info;
        let samples = self.decode_image(&self.idat_chunks, *b"IDAT", info.width, info.height)?;

        Ok(to_rgba8(
            &samples,
            info.color,
            info.depth,
            &info.palette,
            info.transparency
        ))
    }

    /// Decode every frame of an animation, composited onto the canvas
    ///
    /// A still image, or an animation when animated decoding is disabled in
    /// the options, is returned as a single full canvas frame.
    /// A default image that is not part of the animation is skipped.
    pub fn decode_frames(&mut self) -> Result<Vec<Frame>, PngDecodeErrors>
    {
        self.decode_headers()?;

        if !self.is_animated()
        {
            let pixels = self.decode_rgba()?;
            let info = FrameInfo::full_canvas(self.png_info.width, self.png_info.height);

            return Ok(vec![Frame { info, pixels }]);
        }
        let info = &self.png_info;
        let mut compositor = Compositor::new(info.width, info.height);
        let mut output = Vec::with_capacity(self.frames.len());

        for (i, frame) in self.frames.iter().enumerate()
        {
            let (data, chunk) = if i == 0 && self.default_is_frame
            {
                (&self.idat_chunks, *b"IDAT")
            }
            else
            {
                (&frame.data, *b"fdAT")
            };
            let samples = self.decode_image(data, chunk, frame.info.width, frame.info.height)?;
            let rgba = to_rgba8(
                &samples,
                info.color,
                info.depth,
                &info.palette,
                info.transparency
            );
            let pixels = compositor.render(&frame.info, &rgba)?;

            output.push(Frame {
                info: frame.info,
                pixels
            });
        }
        Ok(output)
    }

    /// The `bKGD` colour as 8 bit RGBA, resolved like pixels are
    pub fn background_rgba(&mut self) -> Result<Option<[u8; 4]>, PngDecodeErrors>
    {
        self.decode_headers()?;

        let info = &self.png_info;
        let depth = info.depth;

        let colour = info.background.map(|background| match background
        {
            BackgroundColor::Palette(index) => crate::utils::palette_entry(&info.palette, index),
            BackgroundColor::Luma(value) =>
            {
                let grey = sample_to_u8(value, depth);
                [grey, grey, grey, 255]
            }
            BackgroundColor::Rgb([r, g, b]) => [
                sample_to_u8(r, depth),
                sample_to_u8(g, depth),
                sample_to_u8(b, depth),
                255
            ]
        });
        Ok(colour)
    }
}
