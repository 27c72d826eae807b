// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! CRC32 capability.

/// CRC32 over `data`: reversed polynomial 0xEDB88320, seed 0xFFFFFFFF,
/// reflected input/output, final XOR 0xFFFFFFFF.
///
/// Deterministic integrity check for headers and payloads; not a security
/// primitive.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
