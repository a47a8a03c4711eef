/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Global Decoder options
use bitflags::bitflags;

fn decoder_strict_mode() -> DecoderFlags
{
    let mut flags = DecoderFlags::empty();

    flags.set(DecoderFlags::INFLATE_CONFIRM_ADLER, true);
    flags.set(DecoderFlags::PNG_CONFIRM_CRC, true);
    flags.set(DecoderFlags::ERROR_ON_NON_CONFORMANCE, true);
    flags.set(DecoderFlags::PNG_DECODE_ANIMATED, true);

    flags
}

/// Lenient options, the default.
///
/// CRCs are still confirmed, Adler-32 trailers are not
/// and trailing garbage after IEND is tolerated.
fn lenient_options() -> DecoderFlags
{
    let mut flags = DecoderFlags::empty();

    flags.set(DecoderFlags::INFLATE_CONFIRM_ADLER, false);
    flags.set(DecoderFlags::PNG_CONFIRM_CRC, true);
    flags.set(DecoderFlags::ERROR_ON_NON_CONFORMANCE, false);
    flags.set(DecoderFlags::PNG_DECODE_ANIMATED, true);

    flags
}

bitflags! {
    /// Decoder options that are flags
    ///
    /// NOTE: When you extend this, add true or false to
    /// all options above that return a `DecoderFlag`
    #[derive(Copy, Debug, Clone, Eq, PartialEq)]
    pub struct DecoderFlags: u64 {
        /// Whether the decoder should confirm and report adler mismatch
        const INFLATE_CONFIRM_ADLER    = 0b0000_0001;
        /// Whether the PNG decoder should confirm crc
        const PNG_CONFIRM_CRC          = 0b0000_0010;
        /// Whether the decoder should error out on image non-conformance
        const ERROR_ON_NON_CONFORMANCE = 0b0000_0100;
        /// Decode all frames for an animated image
        const PNG_DECODE_ANIMATED      = 0b0000_1000;
    }
}

/// Decoder options
///
/// Not all options are respected by all decoders
#[derive(Debug, Copy, Clone)]
pub struct DecoderOptions
{
    /// Maximum width for which decoders will
    /// not try to decode images larger than
    /// the specified width.
    ///
    /// - Default value: 16384
    max_width:     usize,
    /// Maximum height for which decoders will not
    /// try to decode images larger than the
    /// specified height
    ///
    /// - Default value: 16384
    max_height:    usize,
    /// Maximum size of a single inflated stream.
    ///
    /// - Default value: 1 GiB
    deflate_limit: usize,
    /// Boolean flags that influence decoding
    flags:         DecoderFlags
}

impl Default for DecoderOptions
{
    fn default() -> Self
    {
        Self {
            max_width:     1 << 14,
            max_height:    1 << 14,
            deflate_limit: 1 << 30,
            flags:         lenient_options()
        }
    }
}

/// Initializers
impl DecoderOptions
{
    /// Create options that confirm every checksum and reject
    /// anything that does not conform
    pub fn new_strict() -> DecoderOptions
    {
        DecoderOptions::default().set_decoder_flags(decoder_strict_mode())
    }
    /// Set the flags wholesale
    pub fn set_decoder_flags(mut self, flags: DecoderFlags) -> Self
    {
        self.flags = flags;
        self
    }
    pub const fn get_decoder_flags(&self) -> DecoderFlags
    {
        self.flags
    }
}

/// Global options respected by all decoders
impl DecoderOptions
{
    /// Get maximum width configured for which the decoder
    /// should not try to decode images greater than this width
    pub const fn get_max_width(&self) -> usize
    {
        self.max_width
    }
    /// Get maximum height configured for which the decoder should
    /// not try to decode images greater than this height
    pub const fn get_max_height(&self) -> usize
    {
        self.max_height
    }
    /// Get the maximum number of bytes a single inflate call may produce
    pub const fn get_deflate_limit(&self) -> usize
    {
        self.deflate_limit
    }
    /// Return true whether the decoder should be in strict mode
    /// and reject most errors
    pub fn get_strict_mode(&self) -> bool
    {
        self.flags.contains(DecoderFlags::ERROR_ON_NON_CONFORMANCE)
    }

    /// Set maximum width for which the decoder should not try
    /// decoding images greater than that width
    pub fn set_max_width(mut self, width: usize) -> Self
    {
        self.max_width = width;
        self
    }
    /// Set maximum height for which the decoder should not try
    /// decoding images greater than that height
    pub fn set_max_height(mut self, height: usize) -> Self
    {
        self.max_height = height;
        self
    }
    /// Set the maximum size of a single inflated stream
    pub fn set_deflate_limit(mut self, limit: usize) -> Self
    {
        self.deflate_limit = limit;
        self
    }
    /// Set whether the decoder should be in strict mode
    pub fn set_strict_mode(mut self, yes: bool) -> Self
    {
        self.flags.set(DecoderFlags::ERROR_ON_NON_CONFORMANCE, yes);
        self
    }
}

/// PNG and inflate specific options
impl DecoderOptions
{
    /// Whether the inflate decoder should confirm
    /// adler checksums
    pub const fn inflate_get_confirm_adler(&self) -> bool
    {
        self.flags.contains(DecoderFlags::INFLATE_CONFIRM_ADLER)
    }
    /// Set whether the inflate decoder should confirm
    /// adler checksums
    pub fn inflate_set_confirm_adler(mut self, yes: bool) -> Self
    {
        self.flags.set(DecoderFlags::INFLATE_CONFIRM_ADLER, yes);
        self
    }
    /// Whether the png decoder should confirm
    /// CRC of chunks
    pub const fn png_get_confirm_crc(&self) -> bool
    {
        self.flags.contains(DecoderFlags::PNG_CONFIRM_CRC)
    }
    /// Set whether the png decoder should confirm
    /// CRC of chunks
    pub fn png_set_confirm_crc(mut self, yes: bool) -> Self
    {
        self.flags.set(DecoderFlags::PNG_CONFIRM_CRC, yes);
        self
    }
    /// Whether animated images decode every frame
    pub const fn png_get_decode_animated(&self) -> bool
    {
        self.flags.contains(DecoderFlags::PNG_DECODE_ANIMATED)
    }
    /// Set whether animated images decode every frame, when false only the
    /// default image is decoded
    pub fn png_set_decode_animated(mut self, yes: bool) -> Self
    {
        self.flags.set(DecoderFlags::PNG_DECODE_ANIMATED, yes);
        self
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_are_lenient_but_check_crc()
    {
        let options = DecoderOptions::default();
        assert!(options.png_get_confirm_crc());
        assert!(!options.inflate_get_confirm_adler());
        assert!(!options.get_strict_mode());

        let strict = DecoderOptions::new_strict();
        assert!(strict.inflate_get_confirm_adler());
        assert!(strict.get_strict_mode());
    }

    #[test]
    fn setters_toggle_flags()
    {
        let options = DecoderOptions::default()
            .png_set_confirm_crc(false)
            .set_strict_mode(true)
            .set_max_width(10);

        assert!(!options.png_get_confirm_crc());
        assert!(options.get_strict_mode());
        assert_eq!(options.get_max_width(), 10);
    }
}
