/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

pub const PNG_SIGNATURE: u64 = 0x89504E470D0A1A0A;

/// Largest chunk length the format allows, 2^31 - 1
pub const PNG_MAX_CHUNK_LENGTH: usize = (1 << 31) - 1;

/// IDAT payloads are split into chunks of this size when writing
pub const IDAT_CHUNK_SIZE: usize = 1 << 13;

/// Above this many filtered bytes, trial filtering only tries filter 0
pub const TRIAL_FILTER_LIMIT: usize = 500_000;
