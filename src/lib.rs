// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![no_std]

//! fcb: a persistent, log-structured FIFO over a NOR-flash-like device.
//!
//! Records are appended to a ring of block-erasable sectors and never
//! overwritten in place. Sector and record lifecycle words are encoded so
//! every forward transition only clears bits, which NOR flash permits
//! without an erase; mount reconstructs the head and tail of the log from
//! media alone, so every mount doubles as crash recovery.

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod codec;
pub mod config;
pub mod crc;
pub mod error;
pub mod fcb;
pub mod flash;

#[cfg(test)]
pub mod tests;

pub use error::{FcbError, FcbResult};
pub use fcb::{Fcb, RecordEntry};
pub use flash::{FlashDevice, SimFlash};
