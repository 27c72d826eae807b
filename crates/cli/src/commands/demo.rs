use anyhow::anyhow;
use fcb::config::{FLASH_SECTOR_COUNT, FLASH_SECTOR_SIZE, FLASH_SIZE};
use fcb::{Fcb, SimFlash};

/// In-memory walkthrough: erase, mount, append a few records, report.
pub fn run() -> anyhow::Result<()> {
    let mut flash = SimFlash::with_default_geometry();
    println!(
        "Flash emulation initialized: {} sectors of {} KB each ({} MB total)",
        FLASH_SECTOR_COUNT,
        FLASH_SECTOR_SIZE / 1024,
        FLASH_SIZE / (1024 * 1024)
    );

    let mut fcb = Fcb::new(&mut flash, 0, FLASH_SECTOR_COUNT - 1)
        .map_err(|e| anyhow!("failed to bind FCB: {:?}", e))?;
    fcb.mount().map_err(|e| anyhow!("mount failed: {:?}", e))?;

    println!("FCB mounted successfully!");
    println!("Current Sector ID: {}", fcb.current_sector_id());
    println!("Write Addr:  0x{:08X}", fcb.write_addr());
    println!("Read Addr:   0x{:08X}", fcb.read_addr());
    println!("Delete Addr: 0x{:08X}", fcb.delete_addr());

    for payload in [&b"hello"[..], b"flash", b"circular buffer"] {
        fcb.append(payload)
            .map_err(|e| anyhow!("append failed: {:?}", e))?;
    }

    println!();
    println!("After 3 appends:");
    println!("Current Sector ID: {}", fcb.current_sector_id());
    println!("Write Addr:  0x{:08X}", fcb.write_addr());
    for record in fcb.records() {
        println!(
            "  record at 0x{:08X}: {} bytes: {:?}",
            record.addr,
            record.key.len,
            String::from_utf8_lossy(&record.payload)
        );
    }
    Ok(())
}
