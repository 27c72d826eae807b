use anyhow::anyhow;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use fcb::codec::{read_sector_header, SectorHeader, SectorState};
use fcb::Fcb;
use std::path::PathBuf;

use crate::image;

pub fn run(image_path: PathBuf, sector_size: u32, sector_count: u32) -> anyhow::Result<()> {
    let mut flash = image::load(&image_path, sector_size, sector_count)?;

    let mut fcb = Fcb::new(&mut flash, 0, sector_count - 1)
        .map_err(|e| anyhow!("failed to bind FCB: {:?}", e))?;
    fcb.mount().map_err(|e| anyhow!("mount failed: {:?}", e))?;

    println!("\nFCB Control Block");
    println!("-----------------");
    println!("Current Sector ID: {}", fcb.current_sector_id());
    println!("Write Addr:  0x{:08X}", fcb.write_addr());
    println!("Read Addr:   0x{:08X}", fcb.read_addr());
    println!("Delete Addr: 0x{:08X}", fcb.delete_addr());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Sector", "State", "Sequence", "Records"]);

    for sector in 0..sector_count {
        let header = read_sector_header(fcb.device(), sector);
        let (state, sequence) = describe(&header);
        let records = fcb
            .records()
            .filter(|r| r.addr / sector_size == sector)
            .count();
        table.add_row(vec![
            sector.to_string(),
            state.to_string(),
            sequence,
            records.to_string(),
        ]);
    }
    println!("{table}\n");

    drop(fcb);
    // Mount may have rotated to a fresh head sector; keep the image current.
    image::save(&image_path, &flash)
}

fn describe(header: &SectorHeader) -> (&'static str, String) {
    if header.is_valid() {
        let state = match header.state() {
            SectorState::Fresh => "FRESH",
            SectorState::Allocated => "ALLOCATED",
            SectorState::Consumed => "CONSUMED",
            SectorState::Invalid => "INVALID",
        };
        (state, header.sequence_id.to_string())
    } else if header.magic == 0xFFFF_FFFF && header.state == 0xFFFF_FFFF {
        ("FRESH", "-".to_string())
    } else {
        ("INVALID", "-".to_string())
    }
}
