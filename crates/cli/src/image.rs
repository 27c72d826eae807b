use anyhow::{bail, Context, Result};
use fcb::SimFlash;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load a flash image from disk, or start from erased cells if the file does
/// not exist yet.
pub fn load(path: &Path, sector_size: u32, sector_count: u32) -> Result<SimFlash> {
    if path.exists() {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        let expected = (sector_size as usize) * (sector_count as usize);
        if bytes.len() != expected {
            bail!(
                "image {} is {} bytes, expected {} ({} sectors of {} bytes)",
                path.display(),
                bytes.len(),
                expected,
                sector_count,
                sector_size
            );
        }
        let flash = SimFlash::from_bytes(sector_size, bytes)
            .context("image is not a whole number of sectors")?;
        debug!(path = %path.display(), "loaded flash image");
        Ok(flash)
    } else {
        debug!(path = %path.display(), "no image on disk, starting erased");
        Ok(SimFlash::new(sector_size, sector_count))
    }
}

/// Write the cell image back to disk.
pub fn save(path: &Path, flash: &SimFlash) -> Result<()> {
    fs::write(path, flash.as_bytes())
        .with_context(|| format!("failed to write image {}", path.display()))?;
    debug!(path = %path.display(), bytes = flash.as_bytes().len(), "saved flash image");
    Ok(())
}
