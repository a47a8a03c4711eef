/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Scanline filters, both directions
pub(crate) use de_filter::{handle_avg, handle_none, handle_paeth, handle_sub, handle_up};

use crate::enums::FilterMethod;

mod de_filter;

/// The Paeth predictor
///
/// Picks whichever of left (`a`), up (`b`) and upper left (`c`) is
/// closest to `a + b - c`, preferring them in that order on ties.
#[inline(always)]
pub fn paeth(a: u8, b: u8, c: u8) -> u8
{
    let a = i16::from(a);
    let b = i16::from(b);
    let c = i16::from(c);
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc
    {
        a as u8
    }
    else if pb <= pc
    {
        b as u8
    }
    else
    {
        c as u8
    }
}

/// Reverse `filter` on one scanline
pub(crate) fn de_filter_scanline(
    filter: FilterMethod, prev_row: &[u8], raw: &[u8], current: &mut [u8], components: usize
)
{
    match filter
    {
        FilterMethod::None => handle_none(raw, current),
        FilterMethod::Sub => handle_sub(raw, current, components),
        FilterMethod::Up => handle_up(prev_row, raw, current),
        FilterMethod::Average => handle_avg(prev_row, raw, current, components),
        FilterMethod::Paeth => handle_paeth(prev_row, raw, current, components)
    }
}

/// Apply `filter` to `current`, writing the residuals to `out`
///
/// `prev_row` is the previous unfiltered row, all zeroes for the first row.
pub(crate) fn filter_scanline(
    filter: FilterMethod, prev_row: &[u8], current: &[u8], out: &mut [u8], components: usize
)
{
    let end = current.len().min(out.len()).min(prev_row.len());

    for i in 0..end
    {
        let x = current[i];
        let a = if i >= components { current[i - components] } else { 0 };
        let b = prev_row[i];
        let c = if i >= components { prev_row[i - components] } else { 0 };

        let predicted = match filter
        {
            FilterMethod::None => 0,
            FilterMethod::Sub => a,
            FilterMethod::Up => b,
            FilterMethod::Average => ((u16::from(a) + u16::from(b)) >> 1) as u8,
            FilterMethod::Paeth => paeth(a, b, c)
        };
        out[i] = x.wrapping_sub(predicted);
    }
}

/// Pick a filter for `current` by the minimum sum of absolute differences
/// heuristic, residuals being read as signed bytes.
pub(crate) fn choose_filter(
    prev_row: &[u8], current: &[u8], scratch: &mut [u8], components: usize
) -> FilterMethod
{
    let mut best = FilterMethod::None;
    let mut best_sum = u64::MAX;

    for filter in FilterMethod::ALL
    {
        filter_scanline(filter, prev_row, current, scratch, components);

        let sum: u64 = scratch
            .iter()
            .map(|x| u64::from((*x as i8).unsigned_abs()))
            .sum();

        if sum < best_sum
        {
            best_sum = sum;
            best = filter;
        }
    }
    best
}
