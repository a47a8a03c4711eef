/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Colour statistics of a pixel range and the principal axis derived from them
//!
//! Channels are scaled to `[0, 1]` before accumulation.

const SCALE: f64 = 1.0 / 255.0;

/// Power iteration start, any vector not orthogonal to the dominant axis works
const START_AXIS: [f64; 4] = [0.73, 0.52, 0.37, 0.21];

const MAX_POWER_ITERATIONS: usize = 16;

const CONVERGENCE: f64 = 1e-9;

/// Sums and sums of outer products of a pixel range
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct ColorStats
{
    sums:     [f64; 4],
    products: [f64; 16],
    count:    usize
}

impl ColorStats
{
    pub fn from_pixels(pixels: &[[u8; 4]]) -> ColorStats
    {
        let mut sums = [0.0; 4];
        let mut products = [0.0; 16];

        for pixel in pixels
        {
            let c = pixel.map(|x| f64::from(x) * SCALE);

            for i in 0..4
            {
                sums[i] += c[i];

                for j in i..4
                {
                    products[i * 4 + j] += c[i] * c[j];
                }
            }
        }
        // mirror the upper triangle
        for i in 0..4
        {
            for j in 0..i
            {
                products[i * 4 + j] = products[j * 4 + i];
            }
        }
        ColorStats {
            sums,
            products,
            count: pixels.len()
        }
    }

    /// Statistics of the pixels in `self` that are not in `part`
    pub fn minus(&self, part: &ColorStats) -> ColorStats
    {
        let mut out = *self;

        for (a, b) in out.sums.iter_mut().zip(part.sums.iter())
        {
            *a -= b;
        }
        for (a, b) in out.products.iter_mut().zip(part.products.iter())
        {
            *a -= b;
        }
        out.count = self.count.saturating_sub(part.count);
        out
    }

    pub const fn count(&self) -> usize
    {
        self.count
    }
}

/// Derived quantities of a [`ColorStats`]
#[derive(Copy, Clone, Debug)]
pub(crate) struct Estimate
{
    /// Mean colour in `[0, 1]`
    pub mean:     [f64; 4],
    /// Unit vector along the dominant axis of the scatter matrix
    pub axis:     [f64; 4],
    /// Magnitude of the dominant eigenvalue, used to rank leaves for splitting
    pub variance: f64,
    /// Projection of the mean onto `axis`
    pub offset:   f64,
    /// Mean rounded to 8 bit channels
    pub color:    [u8; 4]
}

impl Estimate
{
    pub fn new(stats: &ColorStats) -> Estimate
    {
        let inv_n = if stats.count == 0 { 0.0 } else { 1.0 / stats.count as f64 };
        let m = stats.sums;

        let mut scatter = [0.0; 16];

        for i in 0..4
        {
            for j in 0..4
            {
                scatter[i * 4 + j] = stats.products[i * 4 + j] - m[i] * m[j] * inv_n;
            }
        }

        let mut axis = normalize(START_AXIS);
        let mut variance = 0.0;

        if stats.count != 0
        {
            for i in 0..MAX_POWER_ITERATIONS
            {
                let next = mult_vec(&scatter, &axis);
                let norm = dot(&next, &next).sqrt();

                if norm < f64::EPSILON
                {
                    // every sample is the same colour
                    variance = 0.0;
                    break;
                }
                axis = next.map(|x| x / norm);

                let converged = i != 0 && (norm - variance).abs() < CONVERGENCE;
                variance = norm;

                if converged
                {
                    break;
                }
            }
        }
        let mean = m.map(|x| x * inv_n);

        Estimate {
            offset: dot(&axis, &mean),
            color: mean.map(|x| (x * 255.0).round().clamp(0.0, 255.0) as u8),
            mean,
            axis,
            variance
        }
    }

    /// Signed distance of `color` (in `[0, 1]`) from the splitting plane
    #[inline]
    pub fn plane_distance(&self, color: &[f64; 4]) -> f64
    {
        dot(&self.axis, color) - self.offset
    }
}

#[inline]
pub(crate) fn dot(a: &[f64; 4], b: &[f64; 4]) -> f64
{
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

fn mult_vec(m: &[f64; 16], v: &[f64; 4]) -> [f64; 4]
{
    let mut out = [0.0; 4];

    for (i, o) in out.iter_mut().enumerate()
    {
        *o = dot(&[m[i * 4], m[i * 4 + 1], m[i * 4 + 2], m[i * 4 + 3]], v);
    }
    out
}

fn normalize(v: [f64; 4]) -> [f64; 4]
{
    let norm = dot(&v, &v).sqrt();
    v.map(|x| x / norm)
}
