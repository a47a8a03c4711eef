/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! PNG and APNG encoders
//!
//! [`PngEncoder`] writes samples exactly as given, [`RgbaEncoder`] takes
//! RGBA frames and picks the smallest representation for them, diffing
//! animation frames and reducing colours to a palette where possible.
use std::collections::HashMap;

use log::{debug, info, warn};
use squish_core::bit_depth::BitDepth;
use squish_core::colorspace::ColorSpace;
use squish_core::options::EncoderOptions;
use squish_inflate::{DeflateEncoder, DeflateEncodingOptions};
use squish_quant::{DitherMode, QuantizeError, MAX_PALETTE_SIZE};

use crate::apng::FrameInfo;
use crate::constants::{PNG_SIGNATURE, TRIAL_FILTER_LIMIT};
use crate::decoder::{IccProfile, PhysicalDimensions, TextChunk};
use crate::enums::{BlendOp, DisposeOp, FilterMethod, InterlaceMethod, PngColor};
use crate::error::PngEncodeErrors;
use crate::filters::{choose_filter, filter_scanline};
use crate::framize::{framize, FramizeOptions};
use crate::headers::writers::{
    write_actl, write_chunk, write_fctl, write_header_fn, write_iccp, write_ihdr,
    write_image_data, write_palette, write_text
};
use crate::interlace::{gather, passes};
use crate::utils::{pack_bits, packed_row_bytes, sample_bytes};

/// Distinct colours counted before giving up on a palette
const COLOR_COUNT_LIMIT: usize = 300;

/// Most frames an APNG can describe
const MAX_FRAMES: usize = (1 << 31) - 1;

/// How scanline filters are picked when encoding
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum FilterStrategy
{
    /// Compress the image once per filter type, keep the smallest result
    ///
    /// Large images and images with one byte per pixel only use no filter.
    #[default]
    Trial,
    /// Per scanline, the filter with the smallest sum of absolute residuals
    Heuristic,
    /// The same filter for every scanline
    Fixed(FilterMethod)
}

/// Ancillary chunks written by the encoders
#[derive(Clone, Debug, Default)]
pub struct PngMetadata
{
    /// Rendering intent for an `sRGB` chunk, 0 to 3
    pub srgb_intent:         Option<u8>,
    /// Gamma times 100000
    pub gamma:               Option<u32>,
    pub physical_dimensions: Option<PhysicalDimensions>,
    /// Profile name and uncompressed profile, written as `iCCP`
    pub icc_profile:         Option<IccProfile>,
    pub text:                Vec<TextChunk>
}

/// A frame ready to be written
struct EncodedFrame
{
    info: FrameInfo,
    data: Vec<u8>
}

/// Everything needed to lay out the chunks of a file
struct ChunkLayout<'a>
{
    width:     usize,
    height:    usize,
    depth:     u8,
    color:     PngColor,
    interlace: InterlaceMethod,
    palette:   Option<&'a [[u8; 4]]>,
    metadata:  &'a PngMetadata,
    level:     u8,
    num_plays: u32,
    frames:    Vec<EncodedFrame>
}

/// Convert a delay in milliseconds to an `fcTL` fraction
fn delay_fraction(delay_ms: u32) -> (u16, u16)
{
    match u16::try_from(delay_ms)
    {
        Ok(ms) => (ms, 1000),
        Err(_) => (u16::try_from(delay_ms / 10).unwrap_or(u16::MAX), 100)
    }
}

fn write_metadata(layout: &ChunkLayout, output: &mut Vec<u8>) -> Result<(), PngEncodeErrors>
{
    let metadata = layout.metadata;

    if let Some(intent) = metadata.srgb_intent
    {
        if intent > 3
        {
            return Err(PngEncodeErrors::Generic(format!(
                "Unknown rendering intent {intent}"
            )));
        }
        if metadata.icc_profile.is_some()
        {
            warn!("Both an ICC profile and sRGB were given, only writing the profile");
        }
        else
        {
            write_chunk(b"sRGB", &[intent], output);
        }
    }
    if let Some(gamma) = metadata.gamma
    {
        write_chunk(b"gAMA", &gamma.to_be_bytes(), output);
    }
    if let Some(profile) = &metadata.icc_profile
    {
        write_iccp(&profile.name, &profile.data, layout.level, output)?;
    }
    if let Some(dimensions) = metadata.physical_dimensions
    {
        write_header_fn(b"pHYs", output, |writer| {
            writer.write_u32_be(dimensions.x_pixels_per_unit);
            writer.write_u32_be(dimensions.y_pixels_per_unit);
            writer.write_u8(dimensions.unit);
        });
    }
    Ok(())
}

/// Write signature, chunks and frames
fn assemble(layout: ChunkLayout) -> Result<Vec<u8>, PngEncodeErrors>
{
    let animated = layout.frames.len() > 1;

    if layout.frames.len() > MAX_FRAMES
    {
        return Err(PngEncodeErrors::TooManyFrames(layout.frames.len()));
    }
    let data_size: usize = layout.frames.iter().map(|x| x.data.len()).sum();
    let mut output = Vec::with_capacity(data_size + 1024);

    output.extend_from_slice(&PNG_SIGNATURE.to_be_bytes());

    write_ihdr(
        layout.width,
        layout.height,
        layout.depth,
        layout.color,
        layout.interlace,
        &mut output
    );
    write_metadata(&layout, &mut output)?;

    if animated
    {
        write_actl(layout.frames.len(), layout.num_plays, &mut output);
    }
    if let Some(palette) = layout.palette
    {
        write_palette(palette, &mut output);
    }
    for text in &layout.metadata.text
    {
        write_text(&text.keyword, &text.text, &mut output)?;
    }

    let mut sequence = 0_u32;

    for (i, frame) in layout.frames.iter().enumerate()
    {
        if animated
        {
            let mut info = frame.info;
            info.sequence = sequence;
            write_fctl(&info, &mut output);
            sequence += 1;
        }
        if i == 0
        {
            write_image_data(&frame.data, None, &mut output);
        }
        else if let Some(next) = write_image_data(&frame.data, Some(sequence), &mut output)
        {
            sequence = next;
        }
    }
    write_chunk(b"IEND", &[], &mut output);

    info!(
        "Encoded {}x{} {:?} image, {} frames, {} bytes",
        layout.width,
        layout.height,
        layout.color,
        layout.frames.len(),
        output.len()
    );
    Ok(output)
}

/// Rows of one pass, packed but not filtered
struct PassRows
{
    row_bytes: usize,
    height:    usize,
    data:      Vec<u8>
}

/// Filter every row of every pass, `choose` picks the filter of a row from
/// the previous and the current row
fn filter_passes<F>(passes: &[PassRows], bpp: usize, mut choose: F) -> Vec<u8>
where
    F: FnMut(&[u8], &[u8]) -> FilterMethod
{
    let total: usize = passes.iter().map(|x| (x.row_bytes + 1) * x.height).sum();
    let mut out = vec![0_u8; total];
    let mut offset = 0;

    for pass in passes
    {
        let zero_row = vec![0_u8; pass.row_bytes];
        let mut previous: &[u8] = &zero_row;

        for row in pass.data.chunks_exact(pass.row_bytes).take(pass.height)
        {
            let filter = choose(previous, row);

            out[offset] = filter.to_int();
            filter_scanline(
                filter,
                previous,
                row,
                &mut out[offset + 1..offset + 1 + pass.row_bytes],
                bpp
            );
            offset += pass.row_bytes + 1;
            previous = row;
        }
    }
    out
}

fn compress(data: &[u8], level: u8) -> Vec<u8>
{
    let options = DeflateEncodingOptions::default().set_level(level);
    DeflateEncoder::new_with_options(data, options).encode_zlib()
}

/// Filter and compress one image
///
/// `samples` holds one byte per sample, two big endian bytes for 16 bit
/// images. Sub byte depths are packed here.
pub(crate) fn encode_image_data(
    samples: &[u8], width: usize, height: usize, depth: u8, components: usize,
    interlace: InterlaceMethod, strategy: FilterStrategy, level: u8
) -> Vec<u8>
{
    let pixel_bytes = components * sample_bytes(depth);
    let bpp = ((components * usize::from(depth)) / 8).max(1);

    let pass_rows: Vec<PassRows> = passes(width, height, interlace)
        .iter()
        .filter(|pass| !pass.is_empty())
        .map(|pass| {
            let pixels = match interlace
            {
                InterlaceMethod::Standard => samples.to_vec(),
                InterlaceMethod::Adam7 => gather(pass, samples, width, pixel_bytes)
            };
            let row_bytes = packed_row_bytes(pass.width, components, depth);

            let data = if depth < 8
            {
                let mut packed = vec![0_u8; row_bytes * pass.height];
                let row_samples = pass.width * components;

                for (row, out) in pixels
                    .chunks_exact(row_samples)
                    .zip(packed.chunks_exact_mut(row_bytes))
                {
                    pack_bits(row, depth, out);
                }
                packed
            }
            else
            {
                pixels
            };
            PassRows {
                row_bytes,
                height: pass.height,
                data
            }
        })
        .collect();

    match strategy
    {
        FilterStrategy::Fixed(filter) =>
        {
            compress(&filter_passes(&pass_rows, bpp, |_, _| filter), level)
        }
        FilterStrategy::Heuristic =>
        {
            let widest = pass_rows.iter().map(|x| x.row_bytes).max().unwrap_or(0);
            let mut scratch = vec![0_u8; widest];

            let filtered = filter_passes(&pass_rows, bpp, |previous, row| {
                choose_filter(previous, row, &mut scratch[..row.len()], bpp)
            });
            compress(&filtered, level)
        }
        FilterStrategy::Trial =>
        {
            let total: usize = pass_rows.iter().map(|x| x.row_bytes * x.height).sum();

            let candidates: &[FilterMethod] = if total > TRIAL_FILTER_LIMIT || bpp == 1
            {
                &[FilterMethod::None]
            }
            else
            {
                &FilterMethod::ALL
            };

            let mut best: Option<Vec<u8>> = None;

            for filter in candidates
            {
                let compressed = compress(&filter_passes(&pass_rows, bpp, |_, _| *filter), level);

                debug!("Filter {:?} compresses to {} bytes", filter, compressed.len());

                if best.as_ref().map_or(true, |x| compressed.len() < x.len())
                {
                    best = Some(compressed);
                }
            }
            best.unwrap_or_default()
        }
    }
}

/// Encoder writing raw samples of a known colorspace
///
/// This does no colour analysis, samples are written as given.
/// 16 bit samples must be big endian.
///
/// # Example
/// ```
/// use squish_core::bit_depth::BitDepth;
/// use squish_core::colorspace::ColorSpace;
/// use squish_core::options::EncoderOptions;
/// use squish_png::{PngDecoder, PngEncoder};
///
/// let pixels = vec![100_u8; 40 * 10];
/// let options = EncoderOptions::new(40, 10, ColorSpace::Luma, BitDepth::Eight);
///
/// let encoded = PngEncoder::new(&pixels, options).encode().unwrap();
/// let decoded = PngDecoder::new(&encoded).decode_raw().unwrap();
/// assert_eq!(decoded, pixels);
/// ```
pub struct PngEncoder<'a>
{
    options:   EncoderOptions,
    frames:    Vec<&'a [u8]>,
    delays:    Vec<u32>,
    num_plays: u32,
    interlace: InterlaceMethod,
    filter:    FilterStrategy,
    metadata:  PngMetadata
}

impl<'a> PngEncoder<'a>
{
    /// Create an encoder for a single image
    pub fn new(data: &'a [u8], options: EncoderOptions) -> PngEncoder<'a>
    {
        PngEncoder::new_animated(&[data], options)
    }
    /// Create an encoder for an animation of full canvas frames
    pub fn new_animated(frames: &[&'a [u8]], options: EncoderOptions) -> PngEncoder<'a>
    {
        PngEncoder {
            options,
            frames: frames.to_vec(),
            delays: Vec::new(),
            num_plays: 0,
            interlace: InterlaceMethod::Standard,
            filter: FilterStrategy::default(),
            metadata: PngMetadata::default()
        }
    }
    /// Frame delays in milliseconds, missing delays are zero
    pub fn set_delays(&mut self, delays: &[u32])
    {
        self.delays = delays.to_vec();
    }
    /// Times the animation plays, zero loops forever
    pub fn set_num_plays(&mut self, num_plays: u32)
    {
        self.num_plays = num_plays;
    }
    pub fn set_interlace(&mut self, interlace: InterlaceMethod)
    {
        self.interlace = interlace;
    }
    pub fn set_filter_strategy(&mut self, filter: FilterStrategy)
    {
        self.filter = filter;
    }
    pub fn set_metadata(&mut self, metadata: PngMetadata)
    {
        self.metadata = metadata;
    }

    pub fn encode(&self) -> Result<Vec<u8>, PngEncodeErrors>
    {
        let options = &self.options;

        let color = match options.get_colorspace()
        {
            ColorSpace::Luma => PngColor::Luma,
            ColorSpace::LumaA => PngColor::LumaA,
            ColorSpace::RGB => PngColor::RGB,
            ColorSpace::RGBA => PngColor::RGBA,
            colorspace =>
            {
                return Err(PngEncodeErrors::Unsupported(format!(
                    "Cannot encode colorspace {colorspace:?}"
                )))
            }
        };
        let depth = match options.get_depth()
        {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
            depth =>
            {
                return Err(PngEncodeErrors::Unsupported(format!(
                    "Cannot encode bit depth {depth:?}"
                )))
            }
        };
        let (width, height) = (options.get_width(), options.get_height());

        if width == 0 || height == 0
        {
            return Err(PngEncodeErrors::Generic(
                "Width and height must be non zero".to_string()
            ));
        }
        if self.frames.is_empty()
        {
            return Err(PngEncodeErrors::Generic("No frames to encode".to_string()));
        }
        let components = options.get_colorspace().num_components();
        let expected = width
            .checked_mul(height)
            .and_then(|x| x.checked_mul(components * options.get_depth().size_of()))
            .ok_or_else(|| PngEncodeErrors::Generic("Image dimensions overflow".to_string()))?;

        let mut frames = Vec::with_capacity(self.frames.len());

        for (i, frame) in self.frames.iter().enumerate()
        {
            if frame.len() != expected
            {
                return Err(PngEncodeErrors::WrongBufferSize {
                    expected,
                    found: frame.len()
                });
            }
            let (delay_num, delay_den) = delay_fraction(self.delays.get(i).copied().unwrap_or(0));

            frames.push(EncodedFrame {
                info: FrameInfo {
                    sequence: 0,
                    width,
                    height,
                    x_offset: 0,
                    y_offset: 0,
                    delay_num,
                    delay_den,
                    dispose_op: DisposeOp::Background,
                    blend_op: BlendOp::Source
                },
                data: encode_image_data(
                    frame,
                    width,
                    height,
                    depth,
                    components,
                    self.interlace,
                    self.filter,
                    options.get_effort()
                )
            });
        }

        assemble(ChunkLayout {
            width,
            height,
            depth,
            color,
            interlace: self.interlace,
            palette: None,
            metadata: &self.metadata,
            level: options.get_effort(),
            num_plays: self.num_plays,
            frames
        })
    }
}

/// Options for [`RgbaEncoder`]
#[derive(Clone, Debug)]
pub struct PngEncoderOptions
{
    palette_size:     usize,
    dither:           DitherMode,
    delays:           Vec<u32>,
    num_plays:        u32,
    interlace:        InterlaceMethod,
    filter:           FilterStrategy,
    level:            u8,
    even_coordinates: bool,
    always_blend:     bool,
    forbid_previous:  bool,
    forbid_palette:   bool,
    min_bits:         u8,
    metadata:         PngMetadata
}

impl Default for PngEncoderOptions
{
    fn default() -> Self
    {
        PngEncoderOptions {
            palette_size:     0,
            dither:           DitherMode::None,
            delays:           Vec::new(),
            num_plays:        0,
            interlace:        InterlaceMethod::Standard,
            filter:           FilterStrategy::Trial,
            level:            6,
            even_coordinates: false,
            always_blend:     false,
            forbid_previous:  false,
            forbid_palette:   false,
            min_bits:         0,
            metadata:         PngMetadata::default()
        }
    }
}

impl PngEncoderOptions
{
    /// Quantize to at most this many colours, zero keeps the image lossless
    pub fn set_palette_size(mut self, palette_size: usize) -> Self
    {
        self.palette_size = palette_size;
        self
    }
    /// Dithering used when quantizing
    pub fn set_dither(mut self, dither: DitherMode) -> Self
    {
        self.dither = dither;
        self
    }
    /// Frame delays in milliseconds
    pub fn set_delays(mut self, delays: &[u32]) -> Self
    {
        self.delays = delays.to_vec();
        self
    }
    pub fn set_num_plays(mut self, num_plays: u32) -> Self
    {
        self.num_plays = num_plays;
        self
    }
    pub fn set_interlace(mut self, interlace: InterlaceMethod) -> Self
    {
        self.interlace = interlace;
        self
    }
    pub fn set_filter_strategy(mut self, filter: FilterStrategy) -> Self
    {
        self.filter = filter;
        self
    }
    /// Deflate level, clamped to 0..=9
    pub fn set_level(mut self, level: u8) -> Self
    {
        self.level = level.min(9);
        self
    }
    /// Snap frame rectangles to even coordinates
    pub fn set_even_coordinates(mut self, yes: bool) -> Self
    {
        self.even_coordinates = yes;
        self
    }
    /// Make every frame an alpha blended one
    pub fn set_always_blend(mut self, yes: bool) -> Self
    {
        self.always_blend = yes;
        self
    }
    /// Never compare a frame against the frame two back
    pub fn set_forbid_previous(mut self, yes: bool) -> Self
    {
        self.forbid_previous = yes;
        self
    }
    /// Never write indexed images
    pub fn set_forbid_palette(mut self, yes: bool) -> Self
    {
        self.forbid_palette = yes;
        self
    }
    /// Smallest bit depth for indexed images
    pub fn set_min_bits(mut self, min_bits: u8) -> Self
    {
        self.min_bits = min_bits;
        self
    }
    pub fn set_metadata(mut self, metadata: PngMetadata) -> Self
    {
        self.metadata = metadata;
        self
    }
    pub fn set_srgb_intent(mut self, intent: u8) -> Self
    {
        self.metadata.srgb_intent = Some(intent);
        self
    }
    pub fn set_gamma(mut self, gamma: u32) -> Self
    {
        self.metadata.gamma = Some(gamma);
        self
    }
    pub fn set_physical_dimensions(mut self, dimensions: PhysicalDimensions) -> Self
    {
        self.metadata.physical_dimensions = Some(dimensions);
        self
    }
    pub fn set_icc_profile(mut self, name: &str, profile: &[u8]) -> Self
    {
        self.metadata.icc_profile = Some(IccProfile {
            name: name.to_string(),
            data: profile.to_vec()
        });
        self
    }
    pub fn add_text(mut self, keyword: &str, text: &str) -> Self
    {
        self.metadata.text.push(TextChunk {
            keyword: keyword.to_string(),
            text:    text.to_string()
        });
        self
    }
    pub const fn get_palette_size(&self) -> usize
    {
        self.palette_size
    }
    pub const fn get_level(&self) -> u8
    {
        self.level
    }
}

/// Smallest indexed depth holding `colors` entries, at least `min_bits`
fn palette_depth(colors: usize, min_bits: u8) -> u8
{
    let depth = match colors
    {
        0..=2 => 1,
        3..=4 => 2,
        5..=16 => 4,
        _ => 8
    };
    let depth = depth.max(min_bits);

    // round up to a legal depth
    [1, 2, 4, 8]
        .into_iter()
        .find(|x| *x >= depth)
        .unwrap_or(8)
}

/// Copy of `pixels` with the colour of fully transparent pixels cleared
fn clear_transparent(pixels: &[u8]) -> Vec<u8>
{
    let mut out = pixels.to_vec();

    for pixel in out.chunks_exact_mut(4)
    {
        if pixel[3] == 0
        {
            pixel[..3].fill(0);
        }
    }
    out
}

/// Palette of first appearance and per frame indices, `None` when there are
/// more colours than a palette holds
fn count_colors(frames: &[Vec<u8>]) -> Option<(Vec<[u8; 4]>, Vec<Vec<u8>>)>
{
    let mut lookup: HashMap<[u8; 4], usize> = HashMap::new();
    let mut palette = Vec::new();
    let mut indices = Vec::with_capacity(frames.len());

    for frame in frames
    {
        let mut frame_indices = Vec::with_capacity(frame.len() / 4);

        for pixel in frame.chunks_exact(4)
        {
            let color = [pixel[0], pixel[1], pixel[2], pixel[3]];

            let index = *lookup.entry(color).or_insert_with(|| {
                palette.push(color);
                palette.len() - 1
            });

            if palette.len() >= COLOR_COUNT_LIMIT
            {
                return None;
            }
            frame_indices.push(index as u8);
        }
        indices.push(frame_indices);
    }
    if palette.len() > MAX_PALETTE_SIZE
    {
        return None;
    }
    Some((palette, indices))
}

/// An encoder for RGBA images and animations that picks the smallest
/// representation
///
/// # Example
/// ```
/// use squish_png::{PngDecoder, PngEncoderOptions, RgbaEncoder};
///
/// let pixels = [255, 0, 0, 255, 0, 0, 255, 255].repeat(8);
/// let encoder = RgbaEncoder::new(&pixels, 4, 4, PngEncoderOptions::default());
/// let encoded = encoder.encode().unwrap();
///
/// assert_eq!(PngDecoder::new(&encoded).decode_rgba().unwrap(), pixels);
/// ```
pub struct RgbaEncoder<'a>
{
    frames:  Vec<&'a [u8]>,
    width:   usize,
    height:  usize,
    options: PngEncoderOptions
}

impl<'a> RgbaEncoder<'a>
{
    pub fn new(
        data: &'a [u8], width: usize, height: usize, options: PngEncoderOptions
    ) -> RgbaEncoder<'a>
    {
        RgbaEncoder::new_animated(&[data], width, height, options)
    }

    /// Encode full canvas RGBA `frames`, an APNG when there is more than one
    pub fn new_animated(
        frames: &[&'a [u8]], width: usize, height: usize, options: PngEncoderOptions
    ) -> RgbaEncoder<'a>
    {
        RgbaEncoder {
            frames: frames.to_vec(),
            width,
            height,
            options
        }
    }

    fn validate(&self) -> Result<(), PngEncodeErrors>
    {
        if self.width == 0 || self.height == 0
        {
            return Err(PngEncodeErrors::Generic(
                "Width and height must be non zero".to_string()
            ));
        }
        if self.frames.is_empty()
        {
            return Err(PngEncodeErrors::Generic("No frames to encode".to_string()));
        }
        if self.frames.len() > MAX_FRAMES
        {
            return Err(PngEncodeErrors::TooManyFrames(self.frames.len()));
        }
        if self.options.palette_size > MAX_PALETTE_SIZE
        {
            return Err(QuantizeError::InvalidPaletteSize(self.options.palette_size).into());
        }
        let expected = self
            .width
            .checked_mul(self.height)
            .and_then(|x| x.checked_mul(4))
            .ok_or_else(|| PngEncodeErrors::Generic("Image dimensions overflow".to_string()))?;

        for frame in &self.frames
        {
            if frame.len() != expected
            {
                return Err(PngEncodeErrors::WrongBufferSize {
                    expected,
                    found: frame.len()
                });
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>, PngEncodeErrors>
    {
        self.validate()?;

        let options = &self.options;

        let got_alpha = self
            .frames
            .iter()
            .any(|frame| frame.chunks_exact(4).any(|pixel| pixel[3] != 255));

        let mut plans = framize(
            &self.frames,
            self.width,
            self.height,
            FramizeOptions {
                always_blend:     options.always_blend,
                even_coordinates: options.even_coordinates,
                forbid_previous:  options.forbid_previous
            }
        );

        let (palette, indices) = if options.palette_size > 0
        {
            let cleared: Vec<Vec<u8>> = plans.iter().map(|x| clear_transparent(&x.pixels)).collect();
            let views: Vec<&[u8]> = cleared.iter().map(|x| x.as_slice()).collect();

            let quantized = squish_quant::quantize(&views, options.palette_size)?;
            let (palette, all_indices) = quantized.into_parts();

            let mut indices = Vec::with_capacity(plans.len());
            let mut offset = 0;

            for (plan, pixels) in plans.iter_mut().zip(&cleared)
            {
                let count = pixels.len() / 4;

                let frame_indices = if options.dither == DitherMode::None
                {
                    all_indices[offset..offset + count].to_vec()
                }
                else
                {
                    squish_quant::dither(
                        pixels,
                        plan.rect.width,
                        plan.rect.height,
                        &palette,
                        options.dither
                    )?
                };
                offset += count;

                // the frame now shows palette colours, a truecolor fallback writes these
                plan.pixels = frame_indices
                    .iter()
                    .flat_map(|x| palette[usize::from(*x)])
                    .collect();

                indices.push(frame_indices);
            }
            debug!("Quantized to {} colours", palette.len());

            (Some(palette), indices)
        }
        else
        {
            let frames: Vec<Vec<u8>> = plans.iter().map(|x| x.pixels.clone()).collect();

            match count_colors(&frames)
            {
                Some((palette, indices)) => (Some(palette), indices),
                None => (None, Vec::new())
            }
        };

        let palette = palette.filter(|_| !options.forbid_palette);

        let (color, depth) = match &palette
        {
            Some(palette) => (PngColor::Palette, palette_depth(palette.len(), options.min_bits)),
            None if !got_alpha && plans.len() == 1 => (PngColor::RGB, 8),
            None => (PngColor::RGBA, 8)
        };
        info!("Writing {:?} at depth {}", color, depth);

        let mut frames = Vec::with_capacity(plans.len());

        for (i, plan) in plans.iter().enumerate()
        {
            let samples: Vec<u8> = match color
            {
                PngColor::Palette => indices[i].clone(),
                PngColor::RGB => plan
                    .pixels
                    .chunks_exact(4)
                    .flat_map(|x| [x[0], x[1], x[2]])
                    .collect(),
                _ => plan.pixels.clone()
            };
            let (delay_num, delay_den) =
                delay_fraction(options.delays.get(i).copied().unwrap_or(0));

            frames.push(EncodedFrame {
                info: FrameInfo {
                    sequence: 0,
                    width: plan.rect.width,
                    height: plan.rect.height,
                    x_offset: plan.rect.x,
                    y_offset: plan.rect.y,
                    delay_num,
                    delay_den,
                    dispose_op: plan.dispose,
                    blend_op: plan.blend
                },
                data: encode_image_data(
                    &samples,
                    plan.rect.width,
                    plan.rect.height,
                    depth,
                    usize::from(color.num_components()),
                    options.interlace,
                    options.filter,
                    options.level
                )
            });
        }

        assemble(ChunkLayout {
            width: self.width,
            height: self.height,
            depth,
            color,
            interlace: options.interlace,
            palette: palette.as_deref(),
            metadata: &options.metadata,
            level: options.level,
            num_plays: options.num_plays,
            frames
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::PngDecoder;

    #[test]
    fn palette_depths()
    {
        assert_eq!(palette_depth(1, 0), 1);
        assert_eq!(palette_depth(2, 0), 1);
        assert_eq!(palette_depth(3, 0), 2);
        assert_eq!(palette_depth(16, 0), 4);
        assert_eq!(palette_depth(17, 0), 8);
        assert_eq!(palette_depth(2, 4), 4);
        assert_eq!(palette_depth(2, 3), 4);
    }

    #[test]
    fn delays_fit_in_sixteen_bits()
    {
        assert_eq!(delay_fraction(40), (40, 1000));
        assert_eq!(delay_fraction(100_000), (10_000, 100));
    }

    #[test]
    fn colour_counting_stops()
    {
        let few = vec![[1, 2, 3, 255, 4, 5, 6, 255, 1, 2, 3, 255].to_vec()];
        let (palette, indices) = count_colors(&few).unwrap();
        assert_eq!(palette, [[1, 2, 3, 255], [4, 5, 6, 255]]);
        assert_eq!(indices, [vec![0, 1, 0]]);

        let many: Vec<u8> = (0..300_u32).flat_map(|x| [x as u8, (x >> 8) as u8, 0, 255]).collect();
        assert!(count_colors(&[many]).is_none());
    }

    #[test]
    fn low_level_luma_round_trip()
    {
        let width = 40;
        let height = 10;
        let data: Vec<u8> = (0..width * height).map(|x| (x * 7) as u8).collect();

        let options = EncoderOptions::default()
            .set_colorspace(ColorSpace::Luma)
            .set_width(width)
            .set_height(height)
            .set_depth(BitDepth::Eight);

        let encoded = PngEncoder::new(&data, options).encode().unwrap();
        let decoded = PngDecoder::new(&encoded).decode_raw().unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn wrong_buffer_size_is_rejected()
    {
        let options = EncoderOptions::new(4, 4, ColorSpace::RGB, BitDepth::Eight);
        let data = [0_u8; 10];

        assert!(matches!(
            PngEncoder::new(&data, options).encode(),
            Err(PngEncodeErrors::WrongBufferSize {
                expected: 48,
                found:    10
            })
        ));
        let rgba = RgbaEncoder::new(&data, 4, 4, PngEncoderOptions::default());
        assert!(rgba.encode().is_err());
    }

    #[test]
    fn two_colours_become_one_bit()
    {
        let pixels = [0, 0, 0, 255, 255, 255, 255, 255].repeat(8);
        let encoded = RgbaEncoder::new(&pixels, 4, 4, PngEncoderOptions::default())
            .encode()
            .unwrap();

        let mut decoder = PngDecoder::new(&encoded);
        decoder.decode_headers().unwrap();
        let info = decoder.get_info().unwrap();
        assert_eq!(info.color, PngColor::Palette);
        assert_eq!(info.depth, 1);
        assert_eq!(decoder.decode_rgba().unwrap(), pixels);
    }
}
