// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::codec::{read_item_at, read_sector_header, ItemKey, SectorState, STATUS_VALID};
use crate::crc::crc32;
use crate::error::FcbError;
use crate::fcb::Fcb;
use crate::flash::{FlashDevice, SimFlash};
use std::vec::Vec;

#[test]
fn test_cold_mount_and_first_append() {
    let mut dev = SimFlash::with_default_geometry();
    let mut fcb = Fcb::new(&mut dev, 0, 63).unwrap();
    fcb.mount().unwrap();

    assert_eq!(fcb.current_sector_id(), 0);
    assert_eq!(fcb.write_addr(), 16);
    assert_eq!(fcb.read_addr(), 16);
    assert_eq!(fcb.delete_addr(), 16);

    fcb.append(b"hi").unwrap();
    assert_eq!(fcb.write_addr(), 16 + 12 + 2);

    // First append claims the fresh sector before laying down the record.
    let header = read_sector_header(fcb.device(), 0);
    assert!(header.is_valid());
    assert_eq!(header.sequence_id, 1);
    assert_eq!(header.state(), SectorState::Allocated);

    // Byte-level record layout at offset 16.
    let mut raw = [0u8; 14];
    fcb.device().read(16, &mut raw);
    assert_eq!(raw[0], 0x5A); // magic, little-endian
    assert_eq!(raw[1], 0xA5);
    assert_eq!(&raw[2..4], &[0x02, 0x00]); // len
    assert_eq!(&raw[8..12], &[0xFF, 0xFF, 0x00, 0x00]); // status VALID
    assert_eq!(&raw[12..14], b"hi");
}

#[test]
fn test_sector_rotation_assigns_sequence_ids() {
    let mut dev = SimFlash::with_default_geometry();
    let mut fcb = Fcb::new(&mut dev, 0, 63).unwrap();
    fcb.mount().unwrap();

    // 12 + 65500 bytes per record: one record fills a 64 KiB sector.
    let payload = vec![0xA5u8; 65500];
    for _ in 0..5 {
        fcb.append(&payload).unwrap();
    }

    assert_eq!(fcb.current_sector_id(), 5);
    assert_eq!(fcb.write_addr(), 4 * 65536 + 16 + 12 + 65500);

    for sector in 0..5 {
        let header = read_sector_header(fcb.device(), sector);
        assert!(header.is_valid());
        assert_eq!(header.sequence_id, sector + 1);
        assert_eq!(header.state(), SectorState::Allocated);
    }
    assert_eq!(read_sector_header(fcb.device(), 5).state(), SectorState::Fresh);
}

#[test]
fn test_ring_full_rejection() {
    let mut dev = SimFlash::new(256, 3);
    let mut fcb = Fcb::new(&mut dev, 0, 2).unwrap();
    fcb.mount().unwrap();

    // need = 112: two records per 256-byte sector. Six fit before the next
    // rotation would reclaim the tail sector.
    let payload = [0x42u8; 100];
    for _ in 0..6 {
        fcb.append(&payload).unwrap();
    }
    let write_before = fcb.write_addr();
    let seq_before = fcb.current_sector_id();

    assert_eq!(fcb.append(&payload), Err(FcbError::RingFull));

    // Rejection must not mutate any state.
    assert_eq!(fcb.write_addr(), write_before);
    assert_eq!(fcb.current_sector_id(), seq_before);
    assert_eq!(fcb.read_addr(), 16);
}

#[test]
fn test_append_argument_errors() {
    let mut dev = SimFlash::new(256, 3);
    let mut fcb = Fcb::new(&mut dev, 0, 2).unwrap();
    fcb.mount().unwrap();

    assert_eq!(fcb.append(&[]), Err(FcbError::InvalidInput));

    // 256 - 16 - 12 = 228 is the largest payload any empty sector can hold.
    assert_eq!(fcb.max_payload(), 228);
    let oversize = vec![0u8; 229];
    assert_eq!(fcb.append(&oversize), Err(FcbError::InvalidInput));

    // Neither error touched the control block or the media.
    assert_eq!(fcb.write_addr(), 16);
    assert_eq!(read_sector_header(fcb.device(), 0).state(), SectorState::Fresh);

    let exact = vec![0u8; 228];
    fcb.append(&exact).unwrap();
    assert_eq!(fcb.write_addr(), 256);
}

#[test]
fn test_append_after_exact_sector_fill() {
    let mut dev = SimFlash::new(256, 3);
    let mut fcb = Fcb::new(&mut dev, 0, 2).unwrap();
    fcb.mount().unwrap();

    // The first record ends flush with the sector boundary; the next append
    // must rotate to sector 1 rather than trample sector 1's header.
    fcb.append(&vec![0x11u8; 228]).unwrap();
    assert_eq!(fcb.write_addr(), 256);

    fcb.append(b"next").unwrap();
    assert_eq!(fcb.write_addr(), 256 + 16 + 12 + 4);
    let header = read_sector_header(fcb.device(), 1);
    assert_eq!(header.sequence_id, 2);
    assert_eq!(header.state(), SectorState::Allocated);

    let collected: Vec<_> = fcb.records().map(|r| r.payload).collect();
    assert_eq!(collected.len(), 2);
    assert_eq!(collected[1], b"next");
}

#[test]
fn test_erase_resets_media_and_control_block() {
    let mut dev = SimFlash::new(256, 3);
    let mut fcb = Fcb::new(&mut dev, 0, 2).unwrap();
    fcb.mount().unwrap();
    for _ in 0..4 {
        fcb.append(&[0x33u8; 100]).unwrap();
    }

    fcb.erase().unwrap();
    assert_eq!(fcb.current_sector_id(), 0);
    assert_eq!(fcb.write_addr(), 16);
    assert_eq!(fcb.read_addr(), 16);
    assert_eq!(fcb.delete_addr(), 16);
    drop(fcb);
    assert!(dev.as_bytes().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_erase_is_idempotent() {
    let mut dev = SimFlash::new(256, 3);
    let mut fcb = Fcb::new(&mut dev, 0, 2).unwrap();
    fcb.mount().unwrap();
    fcb.append(b"payload").unwrap();

    fcb.erase().unwrap();
    let state_one = (
        fcb.current_sector_id(),
        fcb.write_addr(),
        fcb.read_addr(),
        fcb.delete_addr(),
    );
    drop(fcb);
    let image_one = dev.as_bytes().to_vec();

    let mut fcb = Fcb::new(&mut dev, 0, 2).unwrap();
    fcb.erase().unwrap();
    let state_two = (
        fcb.current_sector_id(),
        fcb.write_addr(),
        fcb.read_addr(),
        fcb.delete_addr(),
    );
    drop(fcb);

    assert_eq!(state_one, state_two);
    assert_eq!(image_one, dev.as_bytes());
}

#[test]
fn test_erase_then_append_parity() {
    let mut dev = SimFlash::new(256, 3);
    let mut fcb = Fcb::new(&mut dev, 0, 2).unwrap();
    fcb.mount().unwrap();
    fcb.append(&[0x55u8; 40]).unwrap();
    fcb.append(&[0x66u8; 40]).unwrap();

    fcb.erase().unwrap();
    fcb.append(b"A").unwrap();

    let header = read_sector_header(fcb.device(), 0);
    assert!(header.is_valid());
    assert_eq!(header.sequence_id, 1);

    let key = read_item_at(fcb.device(), 16).unwrap();
    assert_eq!(key.len, 1);
    assert_eq!(key.crc, crc32(b"A"));
    assert_eq!(key.status, STATUS_VALID);

    let mut payload = [0u8; 1];
    fcb.device().read(16 + ItemKey::SIZE as u32, &mut payload);
    assert_eq!(&payload, b"A");
}

#[test]
fn test_record_walk_preserves_append_order() {
    let mut dev = SimFlash::new(256, 4);
    let mut fcb = Fcb::new(&mut dev, 0, 3).unwrap();
    fcb.mount().unwrap();

    // Varied lengths spanning three sector rotations.
    let payloads: Vec<Vec<u8>> = (0u8..10)
        .map(|i| vec![i; 20 + 7 * i as usize])
        .collect();
    for p in &payloads {
        fcb.append(p).unwrap();
    }

    let walked: Vec<_> = fcb.records().collect();
    assert_eq!(walked.len(), payloads.len());
    for (entry, expected) in walked.iter().zip(&payloads) {
        assert_eq!(&entry.payload, expected);
        assert_eq!(entry.key.len as usize, expected.len());
        assert_eq!(entry.key.crc, crc32(expected));
    }

    // Addresses are strictly increasing: the ring never wrapped here.
    for pair in walked.windows(2) {
        assert!(pair[0].addr < pair[1].addr);
    }
}

#[test]
fn test_disjoint_ranges_share_one_device() {
    let mut dev = SimFlash::new(256, 4);

    {
        let mut low = Fcb::new(&mut dev, 0, 1).unwrap();
        low.mount().unwrap();
        low.append(b"low half").unwrap();
    }
    {
        let mut high = Fcb::new(&mut dev, 2, 3).unwrap();
        high.mount().unwrap();
        high.append(b"high half").unwrap();
        assert_eq!(high.write_addr(), 2 * 256 + 16 + 12 + 9);
    }

    // Each instance recovers only its own record.
    let mut low = Fcb::new(&mut dev, 0, 1).unwrap();
    low.mount().unwrap();
    let records: Vec<_> = low.records().map(|r| r.payload).collect();
    assert_eq!(records, vec![b"low half".to_vec()]);
}

#[test]
fn test_new_rejects_bad_ranges() {
    let mut dev = SimFlash::new(256, 4);
    assert!(Fcb::new(&mut dev, 2, 1).is_err());
    assert!(Fcb::new(&mut dev, 0, 4).is_err());
    assert!(Fcb::new(&mut dev, 0, 3).is_ok());
}

#[test]
fn test_new_rejects_sector_size_below_free_slot_margin() {
    // Head recovery needs 24 erased bytes past offset 16 to recognize a free
    // slot, so sectors smaller than 40 bytes could never report one.
    let mut dev = SimFlash::new(32, 4);
    assert_eq!(Fcb::new(&mut dev, 0, 3).err(), Some(FcbError::InvalidInput));

    let mut dev = SimFlash::new(64, 4);
    assert!(Fcb::new(&mut dev, 0, 3).is_ok());
}

#[test]
fn test_max_payload_is_capped_by_len_field() {
    // A 128 KiB sector leaves more room than the 16-bit len field can
    // describe; the cap keeps the encoded length honest.
    let mut dev = SimFlash::new(128 * 1024, 2);
    let mut fcb = Fcb::new(&mut dev, 0, 1).unwrap();
    fcb.mount().unwrap();
    assert_eq!(fcb.max_payload(), 65535);

    let oversize = vec![0x77u8; 65536];
    assert_eq!(fcb.append(&oversize), Err(FcbError::InvalidInput));
    assert_eq!(fcb.write_addr(), 16);

    let payload = vec![0x77u8; 65535];
    fcb.append(&payload).unwrap();
    assert_eq!(fcb.write_addr(), 16 + 12 + 65535);

    let key = read_item_at(fcb.device(), 16).unwrap();
    assert_eq!(key.len, 65535);
    let walked: Vec<_> = fcb.records().collect();
    assert_eq!(walked.len(), 1);
    assert_eq!(walked[0].payload, payload);
}
