/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Exact nearest palette entry search and k-means refinement

use log::debug;

/// Palettes at most this big are searched exhaustively, bigger ones
/// go through the split tree first
pub(crate) const BRUTE_FORCE_LIMIT: usize = 60;

const KMEANS_ITERATIONS: usize = 10;

/// Stop refining once an iteration keeps more than this share of the error
const KMEANS_MIN_GAIN: f64 = 0.997;

#[inline(always)]
pub(crate) fn color_distance(a: [i32; 4], b: [u8; 4]) -> u32
{
    let dr = a[0] - i32::from(b[0]);
    let dg = a[1] - i32::from(b[1]);
    let db = a[2] - i32::from(b[2]);
    let da = a[3] - i32::from(b[3]);

    (dr * dr + dg * dg + db * db + da * da) as u32
}

#[inline(always)]
pub(crate) fn widen(pixel: [u8; 4]) -> [i32; 4]
{
    pixel.map(i32::from)
}

/// A palette together with, for every entry, the squared distance to
/// its closest other entry
///
/// A colour within half that distance of an entry cannot be closer to
/// any other entry, which lets most lookups stop early.
pub(crate) struct NearestPalette<'a>
{
    colors:    &'a [[u8; 4]],
    neighbour: Vec<u64>
}

impl<'a> NearestPalette<'a>
{
    pub fn new(colors: &'a [[u8; 4]]) -> NearestPalette<'a>
    {
        let neighbour = colors
            .iter()
            .enumerate()
            .map(|(i, c)| {
                colors
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, other)| u64::from(color_distance(widen(*c), *other)))
                    .min()
                    .unwrap_or(u64::MAX)
            })
            .collect();

        NearestPalette { colors, neighbour }
    }

    #[inline]
    fn inside_half_distance(&self, error: u32, index: usize) -> bool
    {
        // (d/2)^2 compared without the square root
        u64::from(error) * 4 < self.neighbour[index]
    }

    /// Nearest entry to `color`, starting from the guess `hint`
    pub fn nearest(&self, color: [i32; 4], hint: usize) -> (usize, u32)
    {
        let mut best = hint.min(self.colors.len().saturating_sub(1));
        let mut best_error = color_distance(color, self.colors[best]);

        if u64::from(best_error) * 4 <= self.neighbour[best]
        {
            return (best, best_error);
        }
        for (index, entry) in self.colors.iter().enumerate()
        {
            let error = color_distance(color, *entry);

            if error < best_error
            {
                best = index;
                best_error = error;

                if self.inside_half_distance(error, index)
                {
                    break;
                }
            }
        }
        (best, best_error)
    }

    /// Reassign every pixel, starting from its current index, and return
    /// the mean squared error
    pub fn assign(&self, pixels: &[[u8; 4]], indices: &mut [u8]) -> f64
    {
        let mut total = 0_u64;

        for (pixel, index) in pixels.iter().zip(indices.iter_mut())
        {
            let (found, error) = self.nearest(widen(*pixel), usize::from(*index));

            *index = found as u8;
            total += u64::from(error);
        }
        total as f64 / pixels.len().max(1) as f64
    }
}

/// Move each palette entry to the centroid of the pixels assigned to it,
/// entries nothing maps to stay where they are
fn update_palette(pixels: &[[u8; 4]], indices: &[u8], palette: &mut [[u8; 4]])
{
    let mut sums = vec![[0_u64; 4]; palette.len()];
    let mut counts = vec![0_u64; palette.len()];

    for (pixel, index) in pixels.iter().zip(indices)
    {
        let index = usize::from(*index);

        counts[index] += 1;

        for (sum, channel) in sums[index].iter_mut().zip(pixel)
        {
            *sum += u64::from(*channel);
        }
    }
    for ((entry, sum), count) in palette.iter_mut().zip(&sums).zip(&counts)
    {
        if *count == 0
        {
            continue;
        }
        for (channel, total) in entry.iter_mut().zip(sum)
        {
            *channel = ((*total as f64) / (*count as f64)).round() as u8;
        }
    }
}

/// Lloyd iterations over `palette`, `indices` must hold a valid assignment
pub(crate) fn refine(pixels: &[[u8; 4]], indices: &mut [u8], palette: &mut [[u8; 4]])
{
    let mut last_error = f64::MAX;

    for iteration in 0..KMEANS_ITERATIONS
    {
        update_palette(pixels, indices, palette);

        let error = NearestPalette::new(palette).assign(pixels, indices);

        debug!("k-means iteration {iteration}, mean error {error:.3}");

        if error == 0.0 || error / last_error > KMEANS_MIN_GAIN
        {
            break;
        }
        last_error = error;
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn finds_exact_entry()
    {
        let palette = [[0, 0, 0, 255], [255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 0]];
        let search = NearestPalette::new(&palette);

        assert_eq!(search.nearest([250, 3, 0, 255], 0), (1, 5 * 5 + 9));
        assert_eq!(search.nearest([0, 0, 255, 0], 2).0, 3);
        assert_eq!(search.nearest([0, 0, 0, 255], 3).0, 0);
    }

    #[test]
    fn early_exit_agrees_with_full_scan()
    {
        let palette: Vec<[u8; 4]> = (0..40_u32)
            .map(|i| [(i * 53 % 256) as u8, (i * 97 % 256) as u8, (i * 29 % 256) as u8, 255])
            .collect();
        let search = NearestPalette::new(&palette);

        for r in (0..=255).step_by(15)
        {
            for g in (0..=255).step_by(17)
            {
                let color = [r, g, 100, 255];
                let (_, error) = search.nearest(color, 0);
                let expected = palette.iter().map(|p| color_distance(color, *p)).min();

                assert_eq!(Some(error), expected);
            }
        }
    }

    #[test]
    fn refinement_moves_entries_to_centroids()
    {
        let pixels = [[10, 10, 10, 255], [20, 20, 20, 255], [200, 200, 200, 255]];
        let mut palette = [[0, 0, 0, 255], [255, 255, 255, 255]];
        let mut indices = [0, 0, 1];

        refine(&pixels, &mut indices, &mut palette);

        assert_eq!(palette, [[15, 15, 15, 255], [200, 200, 200, 255]]);
        assert_eq!(indices, [0, 0, 1]);
    }
}
