/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A deflate compressor and decompressor
//!
//! This crate features a raw deflate/zlib decoder and encoder
//! good enough to carry PNG `IDAT` streams.
//!
//! # Decoding
//!
//! ```
//! use squish_inflate::{DeflateDecoder, DeflateEncoder};
//! let compressed = DeflateEncoder::new(b"hello hello hello").encode_zlib();
//! let mut decoder = DeflateDecoder::new(&compressed);
//! assert_eq!(decoder.decode_zlib().unwrap(), b"hello hello hello");
//! ```
//!
//! # Features
//! - `zlib`: Adds the zlib wrapper (header and Adler-32 trailer) on top of raw deflate.
//!   Enabled by default
pub use crate::decoder::{DeflateDecoder, DeflateOptions};
pub use crate::encoder::{DeflateEncoder, DeflateEncodingOptions, DeflateEncodingStrategy};

mod bitstream;
mod constants;
mod decoder;
mod encoder;
pub mod errors;
mod huffman;
mod lz77;
mod utils;
