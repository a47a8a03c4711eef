/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Variance splitting tree
//!
//! Nodes live in an arena and refer to their children by index. Each node
//! owns a contiguous range of the (reordered) pixel buffer, splitting a node
//! partitions its range in place around the plane through its mean that is
//! normal to its dominant axis.

use log::debug;

use crate::stats::{ColorStats, Estimate};

/// Leaves whose variance falls below this are not split further
const MIN_VARIANCE: f64 = 1e-4;

#[derive(Debug)]
struct Node
{
    start:    usize,
    end:      usize,
    stats:    ColorStats,
    estimate: Estimate,
    children: Option<(usize, usize)>,
    /// Palette index, only meaningful for leaves
    index:    usize
}

impl Node
{
    fn new(start: usize, end: usize, stats: ColorStats) -> Node
    {
        Node {
            start,
            end,
            estimate: Estimate::new(&stats),
            stats,
            children: None,
            index: 0
        }
    }
}

#[derive(Debug)]
pub(crate) struct SplitTree
{
    nodes:  Vec<Node>,
    /// Leaf node handles, most populous first
    leaves: Vec<usize>
}

impl SplitTree
{
    /// Build a tree with at most `max_leaves` leaves, reordering `pixels`
    pub fn build(pixels: &mut [[u8; 4]], max_leaves: usize) -> SplitTree
    {
        let root = Node::new(0, pixels.len(), ColorStats::from_pixels(pixels));

        let mut nodes = vec![root];
        let mut leaves = vec![0];

        while leaves.len() < max_leaves
        {
            let (slot, variance) = leaves
                .iter()
                .enumerate()
                .map(|(slot, node)| (slot, nodes[*node].estimate.variance))
                .fold((0, 0.0), |best, current| if current.1 > best.1 { current } else { best });

            if variance < MIN_VARIANCE
            {
                break;
            }
            let handle = leaves[slot];
            let (start, end) = (nodes[handle].start, nodes[handle].end);
            let estimate = nodes[handle].estimate;

            let mid = start + partition(&mut pixels[start..end], &estimate.axis, estimate.offset * 255.0);

            if mid == start || mid == end
            {
                // all pixels on one side, rounding left nothing to split
                nodes[handle].estimate.variance = 0.0;
                continue;
            }
            let left_stats = ColorStats::from_pixels(&pixels[start..mid]);
            let right_stats = nodes[handle].stats.minus(&left_stats);

            let left = nodes.len();
            let right = left + 1;

            nodes.push(Node::new(start, mid, left_stats));
            nodes.push(Node::new(mid, end, right_stats));
            nodes[handle].children = Some((left, right));

            leaves[slot] = left;
            leaves.push(right);
        }

        leaves.sort_by(|a, b| nodes[*b].stats.count().cmp(&nodes[*a].stats.count()));

        for (index, leaf) in leaves.iter().enumerate()
        {
            nodes[*leaf].index = index;
        }
        debug!("Split tree built with {} leaves", leaves.len());

        SplitTree { nodes, leaves }
    }

    /// Representative colour of every leaf, in palette order
    pub fn palette(&self) -> Vec<[u8; 4]>
    {
        self.leaves
            .iter()
            .map(|leaf| self.nodes[*leaf].estimate.color)
            .collect()
    }

    /// Palette index of the leaf whose mean is nearest to `pixel`
    pub fn nearest(&self, pixel: [u8; 4]) -> usize
    {
        let color = pixel.map(|x| f64::from(x) / 255.0);
        let (leaf, _) = self.search(0, &color);

        self.nodes[leaf].index
    }

    fn search(&self, handle: usize, color: &[f64; 4]) -> (usize, f64)
    {
        let node = &self.nodes[handle];

        match node.children
        {
            None => (handle, distance(&node.estimate.mean, color)),
            Some((left, right)) =>
            {
                let plane = node.estimate.plane_distance(color);

                let (near, far) = if plane > 0.0 { (right, left) } else { (left, right) };

                let best = self.search(near, color);

                if best.1 <= plane * plane
                {
                    return best;
                }
                let other = self.search(far, color);

                if other.1 < best.1
                {
                    other
                }
                else
                {
                    best
                }
            }
        }
    }
}

fn distance(a: &[f64; 4], b: &[f64; 4]) -> f64
{
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2], a[3] - b[3]];

    d[0] * d[0] + d[1] * d[1] + d[2] * d[2] + d[3] * d[3]
}

/// Move pixels whose projection onto `axis` is at most `threshold` to the
/// front, returning how many there are
fn partition(pixels: &mut [[u8; 4]], axis: &[f64; 4], threshold: f64) -> usize
{
    let project = |p: &[u8; 4]| {
        f64::from(p[0]) * axis[0]
            + f64::from(p[1]) * axis[1]
            + f64::from(p[2]) * axis[2]
            + f64::from(p[3]) * axis[3]
    };

    let mut lo = 0;
    let mut hi = pixels.len();

    while lo < hi
    {
        if project(&pixels[lo]) <= threshold
        {
            lo += 1;
        }
        else
        {
            hi -= 1;
            pixels.swap(lo, hi);
        }
    }
    lo
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn partition_splits_around_threshold()
    {
        let mut pixels: Vec<[u8; 4]> = (0..50_u8).rev().map(|x| [x, 0, 0, 0]).collect();
        let mid = partition(&mut pixels, &[1.0, 0.0, 0.0, 0.0], 20.0);

        assert_eq!(mid, 21);
        assert!(pixels[..mid].iter().all(|p| p[0] <= 20));
        assert!(pixels[mid..].iter().all(|p| p[0] > 20));
    }

    #[test]
    fn two_clusters_give_two_leaves()
    {
        let mut pixels = vec![[0, 0, 0, 255]; 300];
        pixels.extend(vec![[250, 250, 250, 255]; 100]);

        let tree = SplitTree::build(&mut pixels, 2);
        let palette = tree.palette();

        // bigger cluster comes first
        assert_eq!(palette, [[0, 0, 0, 255], [250, 250, 250, 255]]);
        assert_eq!(tree.nearest([10, 5, 0, 255]), 0);
        assert_eq!(tree.nearest([200, 240, 255, 255]), 1);
    }

    #[test]
    fn tree_search_matches_brute_force()
    {
        let mut pixels: Vec<[u8; 4]> = (0..4096_u32)
            .map(|i| {
                [
                    (i * 37 % 256) as u8,
                    (i * 91 % 256) as u8,
                    (i * 13 % 256) as u8,
                    if i % 5 == 0 { 128 } else { 255 }
                ]
            })
            .collect();
        let probe = pixels.clone();

        let tree = SplitTree::build(&mut pixels, 100);

        for pixel in probe.iter().step_by(7)
        {
            let color = pixel.map(|x| f64::from(x) / 255.0);
            let found = tree.search(0, &color).1;

            let brute = tree
                .leaves
                .iter()
                .map(|leaf| distance(&tree.nodes[*leaf].estimate.mean, &color))
                .fold(f64::MAX, f64::min);

            assert!((found - brute).abs() < 1e-12);
        }
    }
}
