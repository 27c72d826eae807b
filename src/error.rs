// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FcbError {
    /// Empty payload, over-length payload, or a bad sector range.
    InvalidInput,
    /// Rotation would reclaim the sector still holding the tail.
    RingFull,
    /// Sector header magic or CRC mismatch.
    HeaderInvalid,
    /// No record sync marker at this address.
    NotARecord,
    /// Erased flash: free space rather than a record.
    FreeSpace,
}

pub type FcbResult<T> = core::result::Result<T, FcbError>;
