/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A png and apng decoder and encoder
//!
//! This features a PNG reader and writer in Rust which supports valid
//! ISO/IEC 15948:2003 (E) images and their animated extension.
//!
//! # Features
//! - All colour types and bit depths, Adam7 interlacing
//! - Animated PNG decoding with frame composition
//! - An encoder that diffs animation frames and reduces colours to a palette
//! - `crc`: Check chunk checksums, enabled by default.
//!   Can also be disabled at runtime via [`DecoderOptions`](squish_core::options::DecoderOptions)
//!
//! # Decode to raw bytes
//!
//! Returns samples as stored, one byte per sample, two big endian bytes
//! per sample for 16 bit images and one byte per index for palette images.
//!
//!```no_run
//! use squish_png::PngDecoder;
//! let mut decoder = PngDecoder::new(&[]);
//!
//! let pixels = decoder.decode_raw();
//! ```
//!
//! # Decode to RGBA
//!
//! Any image converted to 8 bit RGBA, palette and transparency applied.
//!
//!```no_run
//! use squish_png::PngDecoder;
//! let mut decoder = PngDecoder::new(&[]);
//!
//! let pixels = decoder.decode_rgba();
//! ```
//!
//! # Animations
//!
//! [`decode_frames`](PngDecoder::decode_frames) composes every frame onto the
//! canvas and returns one full canvas RGBA buffer per frame.
//!
//! # Encoding
//!
//! [`RgbaEncoder`] writes RGBA images and animations in the smallest form it
//! finds, optionally quantizing to a palette of a given size.
//! [`PngEncoder`] writes samples exactly as given.
//!
//! # Extracting metadata
//!
//! Once headers have been decoded, image metadata can be accessed via [`get_info()`](PngDecoder::get_info) method
#![forbid(unsafe_code)]
#![allow(clippy::op_ref, clippy::identity_op)]

pub use apng::{Frame, FrameInfo};
pub use decoder::{
    AnimationControl, BackgroundColor, IccProfile, ItxtChunk, PhysicalDimensions, PngDecoder,
    PngInfo, TextChunk, TimeInfo, TransparentColor, ZtxtChunk
};
pub use encoder::{FilterStrategy, PngEncoder, PngEncoderOptions, PngMetadata, RgbaEncoder};
pub use enums::{BlendOp, DisposeOp, FilterMethod, InterlaceMethod, PngChunkType, PngColor};
pub use options::{default_chunk_handler, PngOptions, UnknownChunkHandler};
pub use squish_core;
pub use squish_quant::DitherMode;

mod apng;
mod constants;
mod crc;
mod decoder;
mod encoder;
mod enums;
pub mod error;
mod filters;
mod framize;
mod headers;
mod interlace;
mod options;
mod utils;
