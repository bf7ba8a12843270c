//! Platform assembly: the memory map, one ISS wired to one system bus, and
//! a bounded run loop.
//!
//! The map mirrors the regions the platform actually models. Peripheral
//! windows (CLINT, PLIC, UART) are reserved in the map but have no targets
//! yet; their interrupt lines would drive the CSR file's `set_mip_*` hooks.

use crate::bootrom::BootRom;
use crate::bus::{MemPort, SystemBus};
use crate::iss::{Iss, StepOutcome};
use crate::loader::{self, LoaderError};
use crate::memory::Memory;

/// Boot ROM: 64 KiB at the bottom of the address space.
pub const BOOTROM_BASE: u32 = 0x0000_0000;
pub const BOOTROM_SIZE: usize = 0x0001_0000;

/// On-chip SRAM: 64 KiB.
pub const SRAM_BASE: u32 = 0x0100_0000;
pub const SRAM_SIZE: usize = 0x0001_0000;

/// External RAM.
pub const RAM_BASE: u32 = 0x8000_0000;
pub const DEFAULT_RAM_SIZE: usize = 0x0800_0000; // 128 MiB

/// HTIF-style exit channel used by ISA compliance tests: a non-zero word
/// written here stops the run loop.
pub const TOHOST_ADDR: u32 = 0x8000_1000;

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub ram_size: usize,
    pub reset_pc: u32,
    pub stop_on_ebreak: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            ram_size: DEFAULT_RAM_SIZE,
            reset_pc: RAM_BASE,
            stop_on_ebreak: false,
        }
    }
}

/// Why the run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// EBREAK retired with `stop_on_ebreak` set.
    Break,
    /// The guest wrote this non-zero value to `tohost`.
    Tohost(u32),
    /// The step limit was reached.
    StepLimit,
}

pub struct Platform {
    pub iss: Iss,
    pub bus: SystemBus,
}

impl Platform {
    pub fn new(config: &PlatformConfig) -> Self {
        let bus = SystemBus::new(
            BootRom::new(BOOTROM_BASE, BOOTROM_SIZE),
            Memory::new(SRAM_BASE, SRAM_SIZE),
            Memory::new(RAM_BASE, config.ram_size),
            TOHOST_ADDR,
        );
        let mut iss = Iss::new(config.reset_pc);
        iss.stop_on_ebreak = config.stop_on_ebreak;
        Self { iss, bus }
    }

    /// Load a kernel image (ELF or raw) and point the PC at its entry.
    pub fn load_kernel(&mut self, image: &[u8], load_addr: u32) -> Result<u32, LoaderError> {
        let entry = loader::load_kernel(&mut self.bus, image, load_addr)?;
        self.iss.cpu.pc = entry;
        Ok(entry)
    }

    /// Convenience for poking guest memory from the host side.
    pub fn write_word(&mut self, addr: u32, word: u32) {
        self.bus.write(addr, word, 4);
    }

    pub fn read_word(&mut self, addr: u32) -> u32 {
        self.bus.read(addr, 4)
    }

    /// Step until an exit condition or until `max_steps` steps were taken.
    pub fn run(&mut self, max_steps: u64) -> RunExit {
        for _ in 0..max_steps {
            if self.iss.step(&mut self.bus) == StepOutcome::Break {
                return RunExit::Break;
            }
            if let Some(code) = self.bus.take_tohost() {
                log::debug!("tohost write {code:#010x} after {} insns", self.iss.insn_count);
                return RunExit::Tohost(code);
            }
        }
        RunExit::StepLimit
    }
}
