use anyhow::anyhow;
use fcb::Fcb;
use std::path::PathBuf;

use crate::image;

pub fn run(
    image_path: PathBuf,
    sector_size: u32,
    sector_count: u32,
    data: String,
) -> anyhow::Result<()> {
    let mut flash = image::load(&image_path, sector_size, sector_count)?;

    let mut fcb = Fcb::new(&mut flash, 0, sector_count - 1)
        .map_err(|e| anyhow!("failed to bind FCB: {:?}", e))?;
    fcb.mount().map_err(|e| anyhow!("mount failed: {:?}", e))?;

    fcb.append(data.as_bytes())
        .map_err(|e| anyhow!("append failed: {:?}", e))?;
    println!(
        "Appended {} bytes; write addr now 0x{:08X}",
        data.len(),
        fcb.write_addr()
    );

    drop(fcb);
    image::save(&image_path, &flash)
}
