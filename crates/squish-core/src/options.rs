/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Decoder and Encoder options
//!
//! This module exposes structs for which the decoders and encoders
//! get shared options
pub use decoder::{DecoderFlags, DecoderOptions};
pub use encoder::EncoderOptions;

mod decoder;
mod encoder;
