//! Memory port capability and the address-routing system bus.

use crate::bootrom::BootRom;
use crate::memory::Memory;

/// The only view the core has of the outside world: little-endian reads and
/// writes of 1, 2 or 4 bytes. Reads are zero-extended to 32 bits; writes
/// take the low `bytes * 8` bits of `data`.
///
/// Bus errors are not surfaced through this interface. A future extension
/// will report them so the ISS can raise access-fault exceptions; today
/// unmapped reads return zero and unmapped writes are dropped.
pub trait MemPort {
    fn read(&mut self, addr: u32, bytes: u32) -> u32;
    fn write(&mut self, addr: u32, data: u32, bytes: u32);
}

/// Address-decoding front-end over the platform's targets. Routing order is
/// fixed: boot ROM, on-chip SRAM, DRAM.
///
/// A write of a non-zero word to the `tohost` address is additionally
/// latched so the platform run loop can observe the guest's exit request
/// (ISA compliance tests use this channel).
pub struct SystemBus {
    pub rom: BootRom,
    pub sram: Memory,
    pub dram: Memory,
    tohost_addr: u32,
    tohost: Option<u32>,
}

impl SystemBus {
    pub fn new(rom: BootRom, sram: Memory, dram: Memory, tohost_addr: u32) -> Self {
        Self {
            rom,
            sram,
            dram,
            tohost_addr,
            tohost: None,
        }
    }

    /// Take the latched `tohost` value, if the guest wrote one.
    pub fn take_tohost(&mut self) -> Option<u32> {
        self.tohost.take()
    }
}

impl MemPort for SystemBus {
    fn read(&mut self, addr: u32, bytes: u32) -> u32 {
        if let Some(off) = self.rom.offset(addr) {
            return self.rom.read(off, bytes);
        }
        if let Some(off) = self.sram.offset(addr) {
            return self.sram.read(off, bytes).unwrap_or(0);
        }
        if let Some(off) = self.dram.offset(addr) {
            return self.dram.read(off, bytes).unwrap_or(0);
        }
        log::warn!("read of unmapped address {addr:#010x} returns 0");
        0
    }

    fn write(&mut self, addr: u32, data: u32, bytes: u32) {
        if addr == self.tohost_addr && bytes == 4 && data != 0 {
            self.tohost = Some(data);
        }
        if let Some(off) = self.rom.offset(addr) {
            self.rom.write(off, data, bytes);
            return;
        }
        if let Some(off) = self.sram.offset(addr) {
            if self.sram.write(off, data, bytes).is_err() {
                log::warn!("SRAM write at {addr:#010x} crosses region end, dropped");
            }
            return;
        }
        if let Some(off) = self.dram.offset(addr) {
            if self.dram.write(off, data, bytes).is_err() {
                log::warn!("DRAM write at {addr:#010x} crosses region end, dropped");
            }
            return;
        }
        log::warn!("write to unmapped address {addr:#010x} dropped");
    }
}

/// A bare RAM region can serve as the whole address space; handy for tests
/// and for embedders that bring their own routing. Out-of-region reads
/// return zero and writes are dropped, like the system bus.
impl MemPort for Memory {
    fn read(&mut self, addr: u32, bytes: u32) -> u32 {
        match self.offset(addr) {
            Some(off) => Memory::read(self, off, bytes).unwrap_or(0),
            None => 0,
        }
    }

    fn write(&mut self, addr: u32, data: u32, bytes: u32) {
        if let Some(off) = self.offset(addr) {
            let _ = Memory::write(self, off, data, bytes);
        }
    }
}
