/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Core routines shared by the squish codec crates
//!
//! It currently contains
//!
//! - A bytestream reader and writer with endian aware reads and writes
//! - Colorspace and bit depth information shared by images
//! - Image decoder and encoder options
//!
//! # Features
//!  - `std`: Implements `std::error::Error` for the error types in this crate.
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod bit_depth;
pub mod bytestream;
pub mod colorspace;
pub mod options;
