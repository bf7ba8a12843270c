//! Snapshot and restore of the platform's architectural state.
//!
//! A snapshot carries the full hart state (registers, privilege, every CSR,
//! the LR/SC monitor, retirement count) plus the RAM images, each guarded by
//! a SHA-256 hash so a corrupted file is rejected instead of silently
//! resuming garbage. Serialized with bincode.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::csr::Mode;
use crate::platform::Platform;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("snapshot region base {snapshot:#010x} does not match platform base {platform:#010x}")]
    BaseMismatch { snapshot: u32, platform: u32 },
    #[error("snapshot region at {0:#010x} has a different size than the platform")]
    SizeMismatch(u32),
    #[error("snapshot region at {0:#010x} failed its integrity check")]
    HashMismatch(u32),
    #[error("snapshot is missing a memory region")]
    MissingRegion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrSnapshot {
    pub mstatus: u32,
    pub misa: u32,
    pub medeleg: u32,
    pub mideleg: u32,
    pub mie: u32,
    pub mtvec: u32,
    pub mcounteren: u32,
    pub mscratch: u32,
    pub mepc: u32,
    pub mcause: u32,
    pub mtval: u32,
    pub stvec: u32,
    pub scounteren: u32,
    pub sscratch: u32,
    pub sepc: u32,
    pub scause: u32,
    pub stval: u32,
    pub satp: u32,
    pub mcycle: u32,
    pub mcycleh: u32,
    pub minstret: u32,
    pub minstreth: u32,
    pub hw_mip: u32,
    pub sw_mip: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub regs: [u32; 32],
    pub pc: u32,
    pub next_pc: u32,
    pub mode: Mode,
    pub reservation_addr: u32,
    pub reservation_valid: bool,
    pub csr: CsrSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub base: u32,
    pub hash: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub cpu: CpuSnapshot,
    pub insn_count: u64,
    /// SRAM first, then DRAM.
    pub memory: Vec<MemoryRegion>,
}

fn hash_of(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn region_of(base: u32, data: &[u8]) -> MemoryRegion {
    MemoryRegion {
        base,
        hash: hash_of(data),
        data: data.to_vec(),
    }
}

impl Snapshot {
    pub fn capture(platform: &Platform) -> Self {
        let cpu = &platform.iss.cpu;
        let csr = &cpu.csr;
        Self {
            cpu: CpuSnapshot {
                regs: cpu.regs,
                pc: cpu.pc,
                next_pc: cpu.next_pc,
                mode: cpu.mode,
                reservation_addr: cpu.reservation.addr,
                reservation_valid: cpu.reservation.valid,
                csr: CsrSnapshot {
                    mstatus: csr.mstatus,
                    misa: csr.misa,
                    medeleg: csr.medeleg,
                    mideleg: csr.mideleg,
                    mie: csr.mie,
                    mtvec: csr.mtvec,
                    mcounteren: csr.mcounteren,
                    mscratch: csr.mscratch,
                    mepc: csr.mepc,
                    mcause: csr.mcause,
                    mtval: csr.mtval,
                    stvec: csr.stvec,
                    scounteren: csr.scounteren,
                    sscratch: csr.sscratch,
                    sepc: csr.sepc,
                    scause: csr.scause,
                    stval: csr.stval,
                    satp: csr.satp,
                    mcycle: csr.mcycle,
                    mcycleh: csr.mcycleh,
                    minstret: csr.minstret,
                    minstreth: csr.minstreth,
                    hw_mip: csr.hw_mip,
                    sw_mip: csr.sw_mip,
                },
            },
            insn_count: platform.iss.insn_count,
            memory: vec![
                region_of(platform.bus.sram.base(), platform.bus.sram.as_bytes()),
                region_of(platform.bus.dram.base(), platform.bus.dram.as_bytes()),
            ],
        }
    }

    /// Restore this snapshot into a platform with matching memory geometry.
    pub fn apply(&self, platform: &mut Platform) -> Result<(), SnapshotError> {
        if self.memory.len() < 2 {
            return Err(SnapshotError::MissingRegion);
        }

        for (region, mem) in self
            .memory
            .iter()
            .zip([&mut platform.bus.sram, &mut platform.bus.dram])
        {
            if region.base != mem.base() {
                return Err(SnapshotError::BaseMismatch {
                    snapshot: region.base,
                    platform: mem.base(),
                });
            }
            if region.data.len() != mem.size() {
                return Err(SnapshotError::SizeMismatch(region.base));
            }
            if hash_of(&region.data) != region.hash {
                return Err(SnapshotError::HashMismatch(region.base));
            }
            mem.set_bytes(&region.data)
                .map_err(|_| SnapshotError::SizeMismatch(region.base))?;
        }

        let cpu = &mut platform.iss.cpu;
        cpu.regs = self.cpu.regs;
        cpu.regs[0] = 0;
        cpu.pc = self.cpu.pc;
        cpu.next_pc = self.cpu.next_pc;
        cpu.mode = self.cpu.mode;
        cpu.reservation.addr = self.cpu.reservation_addr;
        cpu.reservation.valid = self.cpu.reservation_valid;

        let s = &self.cpu.csr;
        let csr = &mut cpu.csr;
        csr.mstatus = s.mstatus;
        csr.misa = s.misa;
        csr.medeleg = s.medeleg;
        csr.mideleg = s.mideleg;
        csr.mie = s.mie;
        csr.mtvec = s.mtvec;
        csr.mcounteren = s.mcounteren;
        csr.mscratch = s.mscratch;
        csr.mepc = s.mepc;
        csr.mcause = s.mcause;
        csr.mtval = s.mtval;
        csr.stvec = s.stvec;
        csr.scounteren = s.scounteren;
        csr.sscratch = s.sscratch;
        csr.sepc = s.sepc;
        csr.scause = s.scause;
        csr.stval = s.stval;
        csr.satp = s.satp;
        csr.mcycle = s.mcycle;
        csr.mcycleh = s.mcycleh;
        csr.minstret = s.minstret;
        csr.minstreth = s.minstreth;
        csr.hw_mip = s.hw_mip;
        csr.sw_mip = s.sw_mip;

        platform.iss.insn_count = self.insn_count;
        Ok(())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let mut file = File::create(path)?;
        bincode::serialize_into(&mut file, self)?;
        file.flush()?;
        Ok(())
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let file = File::open(path)?;
        Ok(bincode::deserialize_from(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PlatformConfig, RAM_BASE};

    fn small_platform() -> Platform {
        Platform::new(&PlatformConfig {
            ram_size: 0x1_0000,
            reset_pc: RAM_BASE,
            stop_on_ebreak: true,
        })
    }

    #[test]
    fn roundtrip_preserves_state() {
        let mut platform = small_platform();
        // ADDI x5, x0, 42 ; EBREAK
        let image: Vec<u8> = [0x02A0_0293u32, 0x0010_0073]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        platform.load_kernel(&image, RAM_BASE).unwrap();
        platform.run(100);
        platform.iss.cpu.csr.set_mip_mtip(true);

        let snap = Snapshot::capture(&platform);
        let bytes = bincode::serialize(&snap).unwrap();
        let snap2: Snapshot = bincode::deserialize(&bytes).unwrap();

        let mut restored = small_platform();
        snap2.apply(&mut restored).unwrap();

        assert_eq!(restored.iss.cpu.pc, platform.iss.cpu.pc);
        assert_eq!(restored.iss.cpu.read_reg(5), 42);
        assert_eq!(restored.iss.insn_count, platform.iss.insn_count);
        assert_eq!(restored.iss.cpu.csr.get_mip(), platform.iss.cpu.csr.get_mip());
        assert_eq!(
            restored.bus.dram.as_bytes(),
            platform.bus.dram.as_bytes()
        );
    }

    #[test]
    fn corrupted_memory_is_rejected() {
        let platform = small_platform();
        let mut snap = Snapshot::capture(&platform);
        snap.memory[1].data[0] ^= 0xFF;

        let mut target = small_platform();
        assert!(matches!(
            snap.apply(&mut target),
            Err(SnapshotError::HashMismatch(_))
        ));
    }

    #[test]
    fn mismatched_geometry_is_rejected() {
        let platform = small_platform();
        let snap = Snapshot::capture(&platform);

        let mut bigger = Platform::new(&PlatformConfig {
            ram_size: 0x2_0000,
            reset_pc: RAM_BASE,
            stop_on_ebreak: true,
        });
        assert!(matches!(
            snap.apply(&mut bigger),
            Err(SnapshotError::SizeMismatch(_))
        ));
    }
}
