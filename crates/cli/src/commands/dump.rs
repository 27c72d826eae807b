use anyhow::bail;
use std::path::PathBuf;

use crate::image;

/// Hex dump of the first `num_bytes` of a sector, 16 bytes per row.
pub fn run(
    image_path: PathBuf,
    sector_size: u32,
    sector_count: u32,
    sector: u32,
    num_bytes: u32,
) -> anyhow::Result<()> {
    if sector >= sector_count {
        bail!("sector {sector} out of range (device has {sector_count})");
    }
    let flash = image::load(&image_path, sector_size, sector_count)?;

    let base = (sector * sector_size) as usize;
    let len = num_bytes.min(sector_size) as usize;
    let cells = &flash.as_bytes()[base..base + len];

    println!("--- Sector {sector} at 0x{base:08X} (printing {len} bytes) ---");
    for (i, row) in cells.chunks(16).enumerate() {
        print!("{:08X}: ", base + i * 16);
        for byte in row {
            print!("{byte:02X} ");
        }
        println!();
    }
    println!("---------------------------");
    Ok(())
}
