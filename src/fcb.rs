// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Flash circular buffer engine.
//!
//! A log-structured FIFO over a contiguous range of flash sectors. Records
//! are appended head-first; sectors rotate round-robin; mount reconstructs
//! the head and tail positions from media alone. Nothing is ever overwritten
//! in place: record and sector lifecycle words advance by clearing bits, and
//! the only backward transition is a sector erase.

use alloc::vec;
use alloc::vec::Vec;

use crate::codec::{self, ItemKey, SectorHeader, SectorState, FREE_SLOT_MARGIN};
use crate::crc::crc32;
use crate::error::{FcbError, FcbResult};
use crate::flash::FlashDevice;

/// Rollover-safe sequence comparison: `a` was assigned after `b`.
///
/// Serial-number arithmetic: the signed 32-bit delta carries the ordering as
/// long as live sequence IDs differ by less than 2^31. An unsigned compare
/// would break at the 0xFFFFFFFF -> 0x00000000 wrap.
pub fn seq_is_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

/// Rollover-safe sequence comparison: `a` was assigned before `b`.
pub fn seq_is_older(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// One decoded record yielded by [`Fcb::records`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// Absolute address of the record header.
    pub addr: u32,
    pub key: ItemKey,
    pub payload: Vec<u8>,
}

/// Flash circular buffer over an inclusive sector range of one device.
///
/// The control block is volatile; every field below except the configured
/// range is reconstructed by [`Fcb::mount`]. One instance exclusively owns
/// its range; instances on disjoint ranges of the same device coexist.
pub struct Fcb<F: FlashDevice> {
    dev: F,
    first_sector: u32,
    last_sector: u32,
    sector_size: u32,
    /// Sequence ID of the most recently allocated sector.
    current_sector_id: u32,
    /// Next record header is programmed here.
    write_addr: u32,
    /// Next record to be consumed by the reader.
    read_addr: u32,
    /// Next record to be marked POPPED.
    delete_addr: u32,
}

impl<F: FlashDevice> Fcb<F> {
    /// Bind an FCB to `[first_sector, last_sector]` of `dev`.
    ///
    /// The control block starts cold; call [`Fcb::mount`] to recover state
    /// from media.
    pub fn new(dev: F, first_sector: u32, last_sector: u32) -> FcbResult<Self> {
        if first_sector > last_sector || last_sector >= dev.sector_count() {
            return Err(FcbError::InvalidInput);
        }
        let sector_size = dev.sector_size();
        // Head recovery probes FREE_SLOT_MARGIN bytes past offset 16; a
        // smaller sector would report a fresh head as full on every mount
        // and rotate live data away.
        if sector_size < SectorHeader::SIZE as u32 + FREE_SLOT_MARGIN {
            return Err(FcbError::InvalidInput);
        }
        let start = first_sector * sector_size + SectorHeader::SIZE as u32;
        Ok(Self {
            dev,
            first_sector,
            last_sector,
            sector_size,
            current_sector_id: 0,
            write_addr: start,
            read_addr: start,
            delete_addr: start,
        })
    }

    pub fn first_sector(&self) -> u32 {
        self.first_sector
    }

    pub fn last_sector(&self) -> u32 {
        self.last_sector
    }

    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    pub fn current_sector_id(&self) -> u32 {
        self.current_sector_id
    }

    pub fn write_addr(&self) -> u32 {
        self.write_addr
    }

    pub fn read_addr(&self) -> u32 {
        self.read_addr
    }

    pub fn delete_addr(&self) -> u32 {
        self.delete_addr
    }

    pub fn device(&self) -> &F {
        &self.dev
    }

    /// Largest payload that fits an empty sector, capped by the 16-bit
    /// length field of the record header.
    pub fn max_payload(&self) -> u32 {
        let fit = self.sector_size - SectorHeader::SIZE as u32 - ItemKey::SIZE as u32;
        fit.min(u16::MAX as u32)
    }

    /// Ring successor of `sector` within the owned range.
    fn ring_next(&self, sector: u32) -> u32 {
        if sector == self.last_sector {
            self.first_sector
        } else {
            sector + 1
        }
    }

    fn sector_base(&self, sector: u32) -> u32 {
        sector * self.sector_size
    }

    /// Reconstruct the control block from media.
    ///
    /// Scans every owned sector, elects head and tail among live sectors by
    /// serial-number arithmetic, then walks records to recover byte-accurate
    /// write and read addresses. Never programs user data, but rotates to a
    /// freshly allocated sector when the recovered head is full.
    pub fn mount(&mut self) -> FcbResult<()> {
        let mut newest: Option<(u32, u32)> = None; // (sequence_id, sector)
        let mut oldest: Option<(u32, u32)> = None;

        for i in self.first_sector..=self.last_sector {
            let Ok(header) = codec::read_valid_sector_header(&self.dev, i) else {
                continue;
            };
            if header.state() == SectorState::Fresh {
                continue;
            }
            match newest {
                Some((seq, _)) if !seq_is_newer(header.sequence_id, seq) => {}
                _ => newest = Some((header.sequence_id, i)),
            }
            match oldest {
                Some((seq, _)) if !seq_is_older(header.sequence_id, seq) => {}
                _ => oldest = Some((header.sequence_id, i)),
            }
        }

        let Some((highest_seq, head_sector)) = newest else {
            // Cold start: no live sector anywhere in the range.
            self.current_sector_id = 0;
            let start = self.sector_base(self.first_sector) + SectorHeader::SIZE as u32;
            self.write_addr = start;
            self.read_addr = start;
            self.delete_addr = start;
            return Ok(());
        };
        // A live head implies a live tail; they coincide for a single live
        // sector.
        let (_, tail_sector) = oldest.unwrap_or((highest_seq, head_sector));

        self.current_sector_id = highest_seq;

        match self.head_free_offset(head_sector) {
            Some(offset) => {
                self.write_addr = self.sector_base(head_sector) + offset;
            }
            None => {
                // Head sector is full: rotate now so the next append has a
                // home. Overwrite protection is append's concern, not ours.
                let next = self.ring_next(head_sector);
                self.dev.erase_sector(self.sector_base(next));
                self.allocate_sector(next);
                self.write_addr = self.sector_base(next) + SectorHeader::SIZE as u32;
            }
        }

        let tail = self
            .find_tail(tail_sector, head_sector)
            .unwrap_or(self.write_addr);
        self.read_addr = tail;
        self.delete_addr = tail;
        Ok(())
    }

    /// Erase every owned sector and reset the control block.
    pub fn erase(&mut self) -> FcbResult<()> {
        self.current_sector_id = 0;
        for i in self.first_sector..=self.last_sector {
            self.dev.erase_sector(self.sector_base(i));
        }
        let start = self.sector_base(self.first_sector) + SectorHeader::SIZE as u32;
        self.write_addr = start;
        self.read_addr = start;
        self.delete_addr = start;
        Ok(())
    }

    /// Append one record: 12-byte key followed by the payload.
    ///
    /// Rejects empty and over-length payloads without touching media.
    /// Returns [`FcbError::RingFull`] if rotation would reclaim the sector
    /// still holding the tail; the control block is not mutated in that case.
    pub fn append(&mut self, data: &[u8]) -> FcbResult<()> {
        if data.is_empty() || data.len() > self.max_payload() as usize {
            return Err(FcbError::InvalidInput);
        }
        let sector_size = self.sector_size;
        let need = ItemKey::SIZE as u32 + data.len() as u32;
        // A previous record may have ended flush with a sector boundary; the
        // ring position is then still the filled sector, at offset B.
        let (sector, offset) = if self.write_addr % sector_size == 0 {
            (self.write_addr / sector_size - 1, sector_size)
        } else {
            (self.write_addr / sector_size, self.write_addr % sector_size)
        };

        if offset + need > sector_size {
            let next = self.ring_next(sector);
            if next == self.read_addr / sector_size {
                return Err(FcbError::RingFull);
            }
            self.dev.erase_sector(self.sector_base(next));
            self.allocate_sector(next);
            self.write_addr = self.sector_base(next) + SectorHeader::SIZE as u32;
        } else {
            let state = codec::read_valid_sector_header(&self.dev, sector).map(|h| h.state());
            if state != Ok(SectorState::Allocated) {
                // First write into this sector (cold start or post-erase):
                // claim it in place before laying down records.
                self.dev.erase_sector(self.sector_base(sector));
                self.allocate_sector(sector);
                self.write_addr = self.sector_base(sector) + SectorHeader::SIZE as u32;
            }
        }

        let key = ItemKey::valid(data.len() as u16, crc32(data));
        self.dev.program(self.write_addr, &key.to_bytes());
        self.dev.program(self.write_addr + ItemKey::SIZE as u32, data);
        self.write_addr += need;
        Ok(())
    }

    /// Decoded records from the tail to the head, in append order.
    ///
    /// Payload CRC is verified on read; records whose payload fails the
    /// check are walked over by length and not yielded.
    pub fn records(&self) -> Records<'_, F> {
        Records {
            fcb: self,
            cursor: self.read_addr,
        }
    }

    /// Reserve `sector` by programming an `ALLOCATED` header with the next
    /// sequence ID. The caller has already erased the sector.
    fn allocate_sector(&mut self, sector: u32) {
        self.current_sector_id = self.current_sector_id.wrapping_add(1);
        let header = SectorHeader::allocated(self.current_sector_id);
        self.dev.program(self.sector_base(sector), &header.to_bytes());
    }

    /// Recover the first free offset in the head sector, or `None` if full.
    ///
    /// Free means a 0xFFFFFFFF word with [`FREE_SLOT_MARGIN`] bytes of erased
    /// flash from that offset on; the margin keeps a stray erased word inside
    /// a record body from being mistaken for the head. Valid records are
    /// stepped over by length; anything else advances one byte so the walk
    /// resynchronizes after interrupted writes.
    fn head_free_offset(&self, sector: u32) -> Option<u32> {
        let base = self.sector_base(sector);
        let mut offset = SectorHeader::SIZE as u32;
        while offset + FREE_SLOT_MARGIN <= self.sector_size {
            let mut word = [0u8; 4];
            self.dev.read(base + offset, &mut word);
            if word == [0xFF; 4] {
                let mut margin = [0u8; FREE_SLOT_MARGIN as usize];
                self.dev.read(base + offset, &mut margin);
                if margin.iter().all(|&b| b == 0xFF) {
                    return Some(offset);
                }
            }
            match codec::read_item_at(&self.dev, base + offset) {
                Ok(key) => offset += ItemKey::SIZE as u32 + key.len as u32,
                Err(_) => offset += 1,
            }
        }
        None
    }

    /// Recover the tail: the first parseable record from `tail_sector`
    /// forward in ring order up to `head_sector` inclusive.
    fn find_tail(&self, tail_sector: u32, head_sector: u32) -> Option<u32> {
        let mut sector = tail_sector;
        loop {
            let base = self.sector_base(sector);
            let mut offset = SectorHeader::SIZE as u32;
            while offset + ItemKey::SIZE as u32 <= self.sector_size {
                if codec::read_item_at(&self.dev, base + offset).is_ok() {
                    return Some(base + offset);
                }
                offset += 1;
            }
            if sector == head_sector {
                return None;
            }
            sector = self.ring_next(sector);
        }
    }
}

/// Iterator over the records between `read_addr` and `write_addr`.
pub struct Records<'a, F: FlashDevice> {
    fcb: &'a Fcb<F>,
    cursor: u32,
}

impl<'a, F: FlashDevice> Iterator for Records<'a, F> {
    type Item = RecordEntry;

    fn next(&mut self) -> Option<RecordEntry> {
        let sector_size = self.fcb.sector_size;
        let write_addr = self.fcb.write_addr;
        // Boundary-flush write_addr still belongs to the filled sector.
        let (head_sector, write_offset) = if write_addr % sector_size == 0 {
            (write_addr / sector_size - 1, sector_size)
        } else {
            (write_addr / sector_size, write_addr % sector_size)
        };
        loop {
            if self.cursor == write_addr {
                return None;
            }
            let sector = self.cursor / sector_size;
            let offset = self.cursor % sector_size;
            if offset < SectorHeader::SIZE as u32 {
                // A record ended flush with the previous sector boundary;
                // skip the sector header of the one we just entered.
                self.cursor = self.fcb.sector_base(sector) + SectorHeader::SIZE as u32;
                continue;
            }
            let in_head = sector == head_sector;
            if in_head && offset >= write_offset {
                return None;
            }
            if offset + ItemKey::SIZE as u32 > sector_size {
                if in_head {
                    return None;
                }
                self.hop(sector);
                continue;
            }
            match codec::read_item_at(&self.fcb.dev, self.cursor) {
                Ok(key) => {
                    let addr = self.cursor;
                    let mut payload = vec![0u8; key.len as usize];
                    self.fcb
                        .dev
                        .read(addr + ItemKey::SIZE as u32, &mut payload);
                    self.cursor = addr + ItemKey::SIZE as u32 + key.len as u32;
                    if crc32(&payload) == key.crc {
                        return Some(RecordEntry { addr, key, payload });
                    }
                    // Torn payload: walked over, not yielded.
                }
                Err(FcbError::FreeSpace) => {
                    if in_head {
                        return None;
                    }
                    self.hop(sector);
                }
                Err(_) => {
                    // Resynchronize byte-by-byte past interrupted writes.
                    self.cursor += 1;
                }
            }
        }
    }
}

impl<'a, F: FlashDevice> Records<'a, F> {
    fn hop(&mut self, sector: u32) {
        let next = self.fcb.ring_next(sector);
        self.cursor = self.fcb.sector_base(next) + SectorHeader::SIZE as u32;
    }
}
