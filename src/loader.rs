//! Kernel image loading: ELF program segments or raw binaries, placed into
//! the platform's ROM/RAM targets by physical address.

use goblin::elf::{program_header::PT_LOAD, Elf};
use thiserror::Error;

use crate::bus::SystemBus;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to parse ELF: {0}")]
    Elf(#[from] goblin::error::Error),
    #[error("ELF segment exceeds file bounds at offset {0:#x}")]
    FileBounds(usize),
    #[error("segment of {size} bytes at {addr:#010x} does not fit a ROM or RAM region")]
    Unmapped { addr: u32, size: usize },
    #[error("entry point {0:#x} does not fit a 32-bit address space")]
    EntryOutOfRange(u64),
}

/// Load a kernel image, auto-detecting ELF by magic. Raw binaries are placed
/// at `load_addr`. Returns the entry PC.
pub fn load_kernel(bus: &mut SystemBus, image: &[u8], load_addr: u32) -> Result<u32, LoaderError> {
    if image.starts_with(b"\x7FELF") {
        load_elf(bus, image)
    } else {
        load_raw(bus, image, load_addr)
    }
}

/// Place a raw binary at a physical address and return that address.
pub fn load_raw(bus: &mut SystemBus, image: &[u8], addr: u32) -> Result<u32, LoaderError> {
    write_phys(bus, addr, image)?;
    log::debug!("loaded raw binary: {} bytes at {addr:#010x}", image.len());
    Ok(addr)
}

/// Walk PT_LOAD segments and place them by physical address (p_paddr when
/// present, p_vaddr otherwise), zeroing the BSS tail of each segment.
pub fn load_elf(bus: &mut SystemBus, image: &[u8]) -> Result<u32, LoaderError> {
    let elf = Elf::parse(image)?;

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD || ph.p_memsz == 0 {
            continue;
        }

        let file_size = ph.p_filesz as usize;
        let mem_size = ph.p_memsz as usize;
        let file_offset = ph.p_offset as usize;
        if file_offset + file_size > image.len() {
            return Err(LoaderError::FileBounds(file_offset));
        }

        let target = (if ph.p_paddr != 0 { ph.p_paddr } else { ph.p_vaddr }) as u32;

        if file_size > 0 {
            write_phys(bus, target, &image[file_offset..file_offset + file_size])?;
        }
        if mem_size > file_size {
            zero_phys(bus, target.wrapping_add(file_size as u32), mem_size - file_size)?;
        }
        log::debug!(
            "loaded segment: addr={target:#010x} filesz={file_size:#x} memsz={mem_size:#x}"
        );
    }

    u32::try_from(elf.entry).map_err(|_| LoaderError::EntryOutOfRange(elf.entry))
}

/// Direct-write a byte slice into whichever target contains `addr`. The ROM
/// path bypasses its read-only enforcement, exactly like the original
/// loader poking the ROM array.
fn write_phys(bus: &mut SystemBus, addr: u32, bytes: &[u8]) -> Result<(), LoaderError> {
    let unmapped = || LoaderError::Unmapped {
        addr,
        size: bytes.len(),
    };
    if let Some(off) = bus.rom.offset(addr) {
        return bus.rom.load_image(bytes, off).map_err(|_| unmapped());
    }
    if let Some(off) = bus.sram.offset(addr) {
        return bus.sram.write_bytes(off, bytes).map_err(|_| unmapped());
    }
    if let Some(off) = bus.dram.offset(addr) {
        return bus.dram.write_bytes(off, bytes).map_err(|_| unmapped());
    }
    Err(unmapped())
}

fn zero_phys(bus: &mut SystemBus, addr: u32, len: usize) -> Result<(), LoaderError> {
    let unmapped = || LoaderError::Unmapped { addr, size: len };
    // ROM images are zero-initialised already; BSS in ROM would be odd but
    // is tolerated for completeness.
    if bus.rom.offset(addr).is_some() {
        return Ok(());
    }
    if let Some(off) = bus.sram.offset(addr) {
        return bus.sram.zero_range(off, len).map_err(|_| unmapped());
    }
    if let Some(off) = bus.dram.offset(addr) {
        return bus.dram.zero_range(off, len).map_err(|_| unmapped());
    }
    Err(unmapped())
}
