/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Scanline reconstruction
//!
//! Every function takes the previous reconstructed row (all zeroes for the
//! first row of an image or pass), the filtered bytes of the current row
//! and writes the reconstructed row into `current`.
//!
//! `components` is the number of bytes per complete pixel, rounded up to one.

use crate::filters::paeth;

pub fn handle_none(raw: &[u8], current: &mut [u8])
{
    let end = current.len().min(raw.len());
    current[..end].copy_from_slice(&raw[..end]);
}

pub fn handle_sub(raw: &[u8], current: &mut [u8], components: usize)
{
    let end = current.len().min(raw.len());

    for i in 0..end.min(components)
    {
        current[i] = raw[i];
    }
    for i in components..end
    {
        let a = current[i - components];
        current[i] = raw[i].wrapping_add(a);
    }
}

pub fn handle_up(prev_row: &[u8], raw: &[u8], current: &mut [u8])
{
    for ((filt, recon), up) in raw.iter().zip(current).zip(prev_row)
    {
        *recon = (*filt).wrapping_add(*up)
    }
}

pub fn handle_avg(prev_row: &[u8], raw: &[u8], current: &mut [u8], components: usize)
{
    let end = current.len().min(raw.len()).min(prev_row.len());

    // handle leftmost pixel explicitly
    for i in 0..end.min(components)
    {
        current[i] = raw[i].wrapping_add(prev_row[i] >> 1);
    }

    for i in components..end
    {
        let a = current[i - components];
        let b = prev_row[i];

        // average without overflow,
        // from stanford bit-hacks.
        let c = (a & b) + ((a ^ b) >> 1);

        current[i] = raw[i].wrapping_add(c);
    }
}

pub fn handle_paeth(prev_row: &[u8], raw: &[u8], current: &mut [u8], components: usize)
{
    let end = current.len().min(raw.len()).min(prev_row.len());

    // with no left pixel, paeth picks the pixel above
    for i in 0..end.min(components)
    {
        current[i] = raw[i].wrapping_add(paeth(0, prev_row[i], 0));
    }

    for i in components..end
    {
        let paeth_res = paeth(
            current[i - components],
            prev_row[i],
            prev_row[i - components]
        );
        current[i] = raw[i].wrapping_add(paeth_res)
    }
}
