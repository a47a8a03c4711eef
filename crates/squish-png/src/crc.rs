/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! CRC-32 as used by png chunks (ISO 3309, polynomial 0xEDB88320)
use std::sync::OnceLock;

fn crc_table() -> &'static [u32; 256]
{
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();

    TABLE.get_or_init(|| {
        let mut table = [0_u32; 256];

        for (n, entry) in table.iter_mut().enumerate()
        {
            let mut c = n as u32;

            for _ in 0..8
            {
                c = if c & 1 == 1 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            }
            *entry = c;
        }
        table
    })
}

/// Update a running crc with `data`, the crc is neither pre nor post
/// inverted
pub fn calc_crc_with_bytes(data: &[u8], crc: u32) -> u32
{
    let table = crc_table();

    data.iter().fold(crc, |c, byte| {
        table[usize::from((c as u8) ^ *byte)] ^ (c >> 8)
    })
}

/// Calculate the crc of `data`
pub fn calc_crc(data: &[u8]) -> u32
{
    !calc_crc_with_bytes(data, u32::MAX)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn known_vectors()
    {
        assert_eq!(calc_crc(b""), 0);
        assert_eq!(calc_crc(b"123456789"), 0xCBF4_3926);
        // crc of an IEND chunk type
        assert_eq!(calc_crc(b"IEND"), 0xAE42_6082);
    }

    #[test]
    fn running_crc_matches_single_pass()
    {
        let whole = calc_crc(b"IHDRsome data");
        let split = !calc_crc_with_bytes(b"some data", calc_crc_with_bytes(b"IHDR", u32::MAX));

        assert_eq!(whole, split);
    }
}
