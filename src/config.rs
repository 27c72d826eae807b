// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Size of one erase unit in bytes for the reference device geometry.
pub const FLASH_SECTOR_SIZE: u32 = 64 * 1024;

/// Number of sectors in the reference device geometry.
pub const FLASH_SECTOR_COUNT: u32 = 64;

/// Total reference device size in bytes.
pub const FLASH_SIZE: u32 = FLASH_SECTOR_SIZE * FLASH_SECTOR_COUNT;
