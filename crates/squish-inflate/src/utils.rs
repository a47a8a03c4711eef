/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

/// Copy `length` bytes starting `distance` bytes behind the end
/// of `out` to the end of `out`.
///
/// The source and destination may overlap (`distance < length`),
/// in that case bytes written by this very copy are read back,
/// which is how LZ77 encodes runs.
///
/// The caller guarantees `0 < distance <= out.len()`
#[inline(always)]
pub(crate) fn copy_rep_matches(out: &mut Vec<u8>, distance: usize, length: usize)
{
    let start = out.len() - distance;

    if distance >= length
    {
        // no overlap, the whole source range already exists
        out.extend_from_within(start..start + length);
    }
    else
    {
        out.reserve(length);

        for i in start..start + length
        {
            let byte = out[i];
            out.push(byte);
        }
    }
}

/// Calculate adler hash of a piece of data
#[cfg(feature = "zlib")]
pub(crate) fn calc_adler_hash(data: &[u8]) -> u32
{
    use simd_adler32::Adler32;
    let mut hasher = Adler32::new();

    hasher.write(data);

    hasher.finish()
}
