// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! On-media record and sector header codec.
//!
//! Two fixed little-endian layouts exist on media and nothing else:
//!
//! ```text
//! SectorHeader (16 bytes, offset 0 of every sector)
//!   0  magic        0xCAFEBABE
//!   4  sequence_id  monotonic counter assigned on allocation
//!   8  header_crc   CRC32 over bytes 0..8 (magic || sequence_id)
//!  12  state        lifecycle word, written incrementally
//!
//! ItemKey (12 bytes, followed by `len` payload bytes)
//!   0  magic        0xA55A
//!   2  len          payload length in bytes
//!   4  crc          CRC32 of the payload
//!   8  status       lifecycle word
//! ```
//!
//! The header CRC deliberately excludes `state`: lifecycle writes clear bits
//! in `state` without invalidating an already-programmed header.

use byteorder::{ByteOrder, LittleEndian};

use crate::crc::crc32;
use crate::error::{FcbError, FcbResult};
use crate::flash::FlashDevice;

/// Sector magic number for identification.
pub const SECTOR_MAGIC: u32 = 0xCAFE_BABE;

/// Record sync marker.
pub const ITEM_MAGIC: u16 = 0xA55A;

/// Record status: untouched flash.
pub const STATUS_ERASED: u32 = 0xFFFF_FFFF;

/// Record status: written, not yet consumed. The high 16 bits are cleared at
/// write time; the low 16 are cleared later on consume.
pub const STATUS_VALID: u32 = 0x0000_FFFF;

/// Record status: consumed. Still occupies space until sector erase.
pub const STATUS_POPPED: u32 = 0x0000_0000;

/// Free-slot probe width during head recovery: two ItemKey strides of erased
/// flash must follow the candidate offset.
pub const FREE_SLOT_MARGIN: u32 = 2 * ItemKey::SIZE as u32;

/// Sector lifecycle.
///
/// The on-media encodings are chosen so each forward transition only clears
/// bits, which NOR flash permits without an erase:
///
/// ```text
/// FRESH (erased) -> ALLOCATED (writing) -> CONSUMED (garbage)
/// 0xFFFFFFFF     -> 0x7FFFFFFF          -> 0x0FFFFFFF
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorState {
    /// Erased sector, ready for use.
    Fresh,
    /// Header programmed; accepting records.
    Allocated,
    /// All records consumed; ready for erase.
    Consumed,
    /// In-memory sentinel for an unrecognized state word; never programmed.
    Invalid,
}

impl SectorState {
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0xFFFF_FFFF => SectorState::Fresh,
            0x7FFF_FFFF => SectorState::Allocated,
            0x0FFF_FFFF => SectorState::Consumed,
            _ => SectorState::Invalid,
        }
    }

    pub const fn as_raw(self) -> u32 {
        match self {
            SectorState::Fresh => 0xFFFF_FFFF,
            SectorState::Allocated => 0x7FFF_FFFF,
            SectorState::Consumed => 0x0FFF_FFFF,
            SectorState::Invalid => 0x0000_0000,
        }
    }
}

/// Sector header placed at offset 0 of each sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorHeader {
    pub magic: u32,
    pub sequence_id: u32,
    pub header_crc: u32,
    pub state: u32,
}

impl SectorHeader {
    pub const SIZE: usize = 16;

    /// Build an `ALLOCATED` header for a freshly reserved sector, with the
    /// CRC computed over the first 8 encoded bytes.
    pub fn allocated(sequence_id: u32) -> Self {
        let mut prefix = [0u8; 8];
        LittleEndian::write_u32(&mut prefix[0..4], SECTOR_MAGIC);
        LittleEndian::write_u32(&mut prefix[4..8], sequence_id);
        Self {
            magic: SECTOR_MAGIC,
            sequence_id,
            header_crc: crc32(&prefix),
            state: SectorState::Allocated.as_raw(),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.magic);
        LittleEndian::write_u32(&mut buf[4..8], self.sequence_id);
        LittleEndian::write_u32(&mut buf[8..12], self.header_crc);
        LittleEndian::write_u32(&mut buf[12..16], self.state);
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            magic: LittleEndian::read_u32(&buf[0..4]),
            sequence_id: LittleEndian::read_u32(&buf[4..8]),
            header_crc: LittleEndian::read_u32(&buf[8..12]),
            state: LittleEndian::read_u32(&buf[12..16]),
        }
    }

    /// Whether `header_crc` matches the first 8 encoded bytes.
    pub fn crc_valid(&self) -> bool {
        let bytes = self.to_bytes();
        crc32(&bytes[0..8]) == self.header_crc
    }

    /// Magic and CRC both check out: the sector is FCB-owned.
    pub fn is_valid(&self) -> bool {
        self.magic == SECTOR_MAGIC && self.crc_valid()
    }

    pub fn state(&self) -> SectorState {
        SectorState::from_raw(self.state)
    }
}

/// Record header: 12 bytes, followed by `len` payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemKey {
    pub magic: u16,
    pub len: u16,
    pub crc: u32,
    pub status: u32,
}

impl ItemKey {
    pub const SIZE: usize = 12;

    /// Build a `VALID` key for a payload of `len` bytes with checksum `crc`.
    pub fn valid(len: u16, crc: u32) -> Self {
        Self {
            magic: ITEM_MAGIC,
            len,
            crc,
            status: STATUS_VALID,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u16(&mut buf[0..2], self.magic);
        LittleEndian::write_u16(&mut buf[2..4], self.len);
        LittleEndian::write_u32(&mut buf[4..8], self.crc);
        LittleEndian::write_u32(&mut buf[8..12], self.status);
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            magic: LittleEndian::read_u16(&buf[0..2]),
            len: LittleEndian::read_u16(&buf[2..4]),
            crc: LittleEndian::read_u32(&buf[4..8]),
            status: LittleEndian::read_u32(&buf[8..12]),
        }
    }
}

/// Read the 16-byte header at the start of `sector_num`.
///
/// An out-of-range sector yields an all-zero header, which fails validation.
pub fn read_sector_header<F: FlashDevice>(dev: &F, sector_num: u32) -> SectorHeader {
    let mut buf = [0u8; SectorHeader::SIZE];
    if sector_num < dev.sector_count() {
        dev.read(sector_num * dev.sector_size(), &mut buf);
    }
    SectorHeader::from_bytes(&buf)
}

/// Read and validate the header of `sector_num`.
///
/// Returns [`FcbError::HeaderInvalid`] on a magic or CRC mismatch; the
/// mount scan treats such sectors as not FCB-owned.
pub fn read_valid_sector_header<F: FlashDevice>(
    dev: &F,
    sector_num: u32,
) -> FcbResult<SectorHeader> {
    let header = read_sector_header(dev, sector_num);
    if !header.is_valid() {
        return Err(FcbError::HeaderInvalid);
    }
    Ok(header)
}

/// Try to parse a record header at absolute address `addr`.
///
/// Distinguishes free space (erased status) from a non-record (bad sync
/// marker, zero length, or a length that would cross the sector boundary).
/// A `POPPED` record parses successfully; it still occupies space.
pub fn read_item_at<F: FlashDevice>(dev: &F, addr: u32) -> FcbResult<ItemKey> {
    let sector_size = dev.sector_size();
    let offset = addr % sector_size;
    if offset < SectorHeader::SIZE as u32
        || offset + ItemKey::SIZE as u32 > sector_size
        || addr.saturating_add(ItemKey::SIZE as u32) > dev.flash_size()
    {
        return Err(FcbError::NotARecord);
    }

    let mut buf = [0u8; ItemKey::SIZE];
    dev.read(addr, &mut buf);
    let key = ItemKey::from_bytes(&buf);

    if key.status == STATUS_ERASED {
        return Err(FcbError::FreeSpace);
    }
    if key.magic != ITEM_MAGIC {
        return Err(FcbError::NotARecord);
    }
    if key.len == 0 || offset + ItemKey::SIZE as u32 + key.len as u32 > sector_size {
        return Err(FcbError::NotARecord);
    }

    Ok(key)
}
