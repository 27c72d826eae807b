use anyhow::anyhow;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use fcb::codec::{STATUS_POPPED, STATUS_VALID};
use fcb::Fcb;
use std::path::PathBuf;

use crate::image;

pub fn run(image_path: PathBuf, sector_size: u32, sector_count: u32) -> anyhow::Result<()> {
    let mut flash = image::load(&image_path, sector_size, sector_count)?;

    let mut fcb = Fcb::new(&mut flash, 0, sector_count - 1)
        .map_err(|e| anyhow!("failed to bind FCB: {:?}", e))?;
    fcb.mount().map_err(|e| anyhow!("mount failed: {:?}", e))?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Addr", "Len", "Status", "CRC", "Payload"]);

    let mut count = 0usize;
    for record in fcb.records() {
        let status = match record.key.status {
            STATUS_VALID => "VALID".to_string(),
            STATUS_POPPED => "POPPED".to_string(),
            other => format!("0x{other:08X}"),
        };
        table.add_row(vec![
            format!("0x{:08X}", record.addr),
            record.key.len.to_string(),
            status,
            format!("0x{:08X}", record.key.crc),
            preview(&record.payload),
        ]);
        count += 1;
    }
    println!("{table}");
    println!("{count} record(s) between tail and head\n");
    Ok(())
}

fn preview(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    if text.chars().count() > 24 {
        let head: String = text.chars().take(24).collect();
        format!("{head}...")
    } else {
        text.into_owned()
    }
}
