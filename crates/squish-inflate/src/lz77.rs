/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Hash chain match finder over a 32 KiB window
use crate::constants::{DEFLATE_MAX_MATCH_LEN, DEFLATE_MIN_MATCH_LEN, DEFLATE_WINDOW_SIZE};

const HASH_BITS: usize = 15;
const HASH_SIZE: usize = 1 << HASH_BITS;
const WINDOW_MASK: usize = DEFLATE_WINDOW_SIZE - 1;
const NIL: usize = usize::MAX;
/// Three byte matches further than this cost more than the literals
const TOO_FAR: usize = 4096;

/// A literal byte or a length/distance pair
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Token
{
    Literal(u8),
    Match
    {
        length:   u16,
        distance: u16
    }
}

/// How hard the match finder looks
#[derive(Copy, Clone, Debug)]
pub(crate) struct MatchParams
{
    /// Maximum number of chain links followed per search
    pub max_chain:   usize,
    /// Stop searching once a match this long is found
    pub nice_length: usize,
    /// Check whether the next position has a longer match before committing
    pub lazy:        bool
}

impl MatchParams
{
    pub fn from_level(level: u8) -> MatchParams
    {
        let (max_chain, nice_length, lazy) = match level
        {
            0 | 1 => (4, 8, false),
            2 => (8, 16, false),
            3 => (16, 32, false),
            4 => (16, 16, true),
            5 => (32, 32, true),
            6 => (128, 128, true),
            7 => (256, 128, true),
            8 => (1024, 258, true),
            _ => (4096, 258, true)
        };
        MatchParams {
            max_chain,
            nice_length,
            lazy
        }
    }
}

#[derive(Copy, Clone, Default)]
struct Match
{
    length:   usize,
    distance: usize
}

pub(crate) struct MatchFinder<'a>
{
    data:          &'a [u8],
    head:          Vec<usize>,
    prev:          Vec<usize>,
    next_to_index: usize,
    params:        MatchParams
}

impl<'a> MatchFinder<'a>
{
    pub fn new(data: &'a [u8], params: MatchParams) -> MatchFinder<'a>
    {
        MatchFinder {
            data,
            head: vec![NIL; HASH_SIZE],
            prev: vec![NIL; DEFLATE_WINDOW_SIZE],
            next_to_index: 0,
            params
        }
    }

    #[inline(always)]
    fn hash(&self, pos: usize) -> usize
    {
        let bytes = &self.data[pos..pos + 3];
        let value = (usize::from(bytes[0]) << 16) | (usize::from(bytes[1]) << 8) | usize::from(bytes[2]);

        (value.wrapping_mul(0x9E37_79B1) >> 8) & (HASH_SIZE - 1)
    }

    /// Index every position before `pos` that still has three bytes behind it
    fn index_until(&mut self, pos: usize)
    {
        let last = pos.min(self.data.len().saturating_sub(DEFLATE_MIN_MATCH_LEN - 1));

        while self.next_to_index < last
        {
            let current = self.next_to_index;
            let hash = self.hash(current);
            self.prev[current & WINDOW_MASK] = self.head[hash];
            self.head[hash] = current;
            self.next_to_index += 1;
        }
    }

    fn longest_match(&mut self, pos: usize) -> Match
    {
        self.index_until(pos);

        let data = self.data;
        let max_length = DEFLATE_MAX_MATCH_LEN.min(data.len() - pos);

        let mut best = Match::default();

        if max_length < DEFLATE_MIN_MATCH_LEN
        {
            return best;
        }
        let mut candidate = self.head[self.hash(pos)];
        let mut chain = self.params.max_chain;
        let mut best_length = DEFLATE_MIN_MATCH_LEN - 1;

        while candidate != NIL && chain > 0
        {
            let distance = pos - candidate;

            if distance > DEFLATE_WINDOW_SIZE
            {
                break;
            }
            // cheap reject before comparing the whole run
            if data[candidate + best_length] == data[pos + best_length]
            {
                let length = data[candidate..candidate + max_length]
                    .iter()
                    .zip(&data[pos..pos + max_length])
                    .take_while(|(a, b)| a == b)
                    .count();

                if length > best_length
                {
                    best_length = length;
                    best = Match { length, distance };

                    if length >= self.params.nice_length || length == max_length
                    {
                        break;
                    }
                }
            }
            let next = self.prev[candidate & WINDOW_MASK];

            if next == NIL || next >= candidate
            {
                break;
            }
            candidate = next;
            chain -= 1;
        }
        if best.length == DEFLATE_MIN_MATCH_LEN && best.distance > TOO_FAR
        {
            return Match::default();
        }
        best
    }

    /// Tokenize `data[start..end]`, earlier bytes act as history
    pub fn tokenize(&mut self, start: usize, end: usize, tokens: &mut Vec<Token>)
    {
        let mut pos = start;
        let mut pending: Option<Match> = None;

        while pos < end
        {
            let current = match pending.take()
            {
                Some(found) => found,
                None => self.longest_match(pos)
            };
            // matches never cross the end of the block
            let current = Match {
                length: current.length.min(end - pos),
                ..current
            };

            if current.length < DEFLATE_MIN_MATCH_LEN
            {
                tokens.push(Token::Literal(self.data[pos]));
                pos += 1;
                continue;
            }
            if self.params.lazy && current.length < self.params.nice_length && pos + 1 < end
            {
                let next = self.longest_match(pos + 1);

                if next.length > current.length
                {
                    tokens.push(Token::Literal(self.data[pos]));
                    pos += 1;
                    pending = Some(next);
                    continue;
                }
            }
            tokens.push(Token::Match {
                length:   current.length as u16,
                distance: current.distance as u16
            });
            pos += current.length;
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn expand(tokens: &[Token]) -> Vec<u8>
    {
        let mut out: Vec<u8> = vec![];

        for token in tokens
        {
            match *token
            {
                Token::Literal(byte) => out.push(byte),
                Token::Match { length, distance } =>
                {
                    let start = out.len() - usize::from(distance);
                    for i in 0..usize::from(length)
                    {
                        out.push(out[start + i]);
                    }
                }
            }
        }
        out
    }

    #[test]
    fn tokens_reproduce_input()
    {
        let data: Vec<u8> = b"abcabcabcabcXYZabcabcabc-the quick brown fox-the quick brown fox"
            .iter()
            .cycle()
            .take(5000)
            .copied()
            .collect();

        for level in [1, 6, 9]
        {
            let mut finder = MatchFinder::new(&data, MatchParams::from_level(level));
            let mut tokens = vec![];
            finder.tokenize(0, 2000, &mut tokens);
            finder.tokenize(2000, data.len(), &mut tokens);

            assert_eq!(expand(&tokens), data);
            assert!(tokens.len() < data.len() / 2);
        }
    }

    #[test]
    fn run_uses_overlapping_match()
    {
        let data = [7_u8; 300];
        let mut finder = MatchFinder::new(&data, MatchParams::from_level(6));
        let mut tokens = vec![];
        finder.tokenize(0, data.len(), &mut tokens);

        assert_eq!(tokens[0], Token::Literal(7));
        assert_eq!(
            tokens[1],
            Token::Match {
                length:   258,
                distance: 1
            }
        );
        assert_eq!(expand(&tokens), data);
    }
}
