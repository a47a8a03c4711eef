/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use log::trace;
use squish_core::bytestream::ZByteReader;
use squish_core::options::DecoderOptions;

use crate::enums::is_critical;
use crate::error::PngDecodeErrors;

/// Callback invoked for chunks the decoder does not know
///
/// The reader is positioned at the start of the chunk data,
/// the decoder moves it past the chunk once the handler returns so
/// a handler need not consume anything.
pub type UnknownChunkHandler = fn(
    length: usize,
    chunk_type: [u8; 4],
    reader: &mut ZByteReader,
    crc: u32
) -> Result<(), PngDecodeErrors>;

/// Skip ancillary chunks, reject critical ones
pub fn default_chunk_handler(
    length: usize, chunk_type: [u8; 4], reader: &mut ZByteReader, _crc: u32
) -> Result<(), PngDecodeErrors>
{
    let chunk_name = std::str::from_utf8(&chunk_type).unwrap_or("XXXX");

    if is_critical(&chunk_type)
    {
        return Err(PngDecodeErrors::UnknownCriticalChunk {
            chunk:  chunk_type,
            offset: reader.get_position().saturating_sub(8)
        });
    }

    trace!("Encountered unknown chunk {:?}", chunk_name);
    trace!("Skipping {} bytes", length + 4);

    Ok(())
}

/// Options for the png decoder
#[derive(Copy, Clone)]
pub struct PngOptions
{
    pub(crate) options:       DecoderOptions,
    pub(crate) chunk_handler: UnknownChunkHandler
}

impl Default for PngOptions
{
    fn default() -> Self
    {
        Self {
            options:       DecoderOptions::default(),
            chunk_handler: default_chunk_handler
        }
    }
}

impl From<DecoderOptions> for PngOptions
{
    fn from(options: DecoderOptions) -> Self
    {
        PngOptions {
            options,
            ..Default::default()
        }
    }
}

impl PngOptions
{
    pub const fn get_decoder_options(&self) -> &DecoderOptions
    {
        &self.options
    }
    pub fn set_decoder_options(mut self, options: DecoderOptions) -> Self
    {
        self.options = options;
        self
    }
    /// Replace the handler called for unknown chunks
    pub fn set_chunk_handler(mut self, handler: UnknownChunkHandler) -> Self
    {
        self.chunk_handler = handler;
        self
    }
}
