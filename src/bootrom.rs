//! Read-only boot ROM target, initialised from a binary image.
//!
//! Bus writes are rejected with a warning; the kernel loader bypasses the
//! read-only enforcement through [`BootRom::load_image`], the same way the
//! original platform's ELF loader pokes the ROM array directly.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootRomError {
    #[error("image of {image} bytes does not fit in ROM of {rom} bytes")]
    ImageTooLarge { image: usize, rom: usize },
    #[error("failed to read ROM image: {0}")]
    Io(#[from] std::io::Error),
}

pub struct BootRom {
    base: u32,
    data: Vec<u8>,
}

impl BootRom {
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn offset(&self, addr: u32) -> Option<u32> {
        let off = addr.checked_sub(self.base)?;
        ((off as usize) < self.data.len()).then_some(off)
    }

    /// Place a raw image into the ROM at `offset`. Loader-only path.
    pub fn load_image(&mut self, image: &[u8], offset: u32) -> Result<(), BootRomError> {
        let off = offset as usize;
        let end = off.checked_add(image.len()).unwrap_or(usize::MAX);
        if end > self.data.len() {
            return Err(BootRomError::ImageTooLarge {
                image: image.len(),
                rom: self.data.len(),
            });
        }
        self.data[off..end].copy_from_slice(image);
        Ok(())
    }

    /// Load a raw binary file at ROM offset zero.
    pub fn load_binary<P: AsRef<Path>>(&mut self, path: P) -> Result<(), BootRomError> {
        let image = std::fs::read(path)?;
        self.load_image(&image, 0)
    }

    /// Little-endian read, zero-extended. Out-of-range reads return zero
    /// (the router only dispatches in-range addresses; the tail guard is for
    /// multi-byte reads straddling the end).
    pub fn read(&self, offset: u32, bytes: u32) -> u32 {
        let off = offset as usize;
        let n = bytes as usize;
        if off + n > self.data.len() {
            return 0;
        }
        let mut v = 0u32;
        for i in 0..n {
            v |= (self.data[off + i] as u32) << (8 * i);
        }
        v
    }

    /// ROM ignores bus writes.
    pub fn write(&mut self, offset: u32, _data: u32, _bytes: u32) {
        log::warn!(
            "write to read-only boot ROM at {:#010x} ignored",
            self.base.wrapping_add(offset)
        );
    }
}
