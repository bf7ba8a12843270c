//! Execute stage: the semantic function for every decoded instruction.
//!
//! `execute` mutates register file, memory, CSRs and `next_pc`, and reports
//! architectural exceptions as values. It never takes a trap itself; that is
//! the ISS loop's job.

use crate::bus::MemPort;
use crate::cpu::Cpu;
use crate::csr::Mode;
use crate::decoder::{DecodedInstr, Kind};
use crate::isa::*;
use crate::{ExecResult, Exception};

// RV32M product and quotient helpers. The widening happens in 64 bits; the
// division convention (no exceptions, defined results for zero divisors and
// overflow) is the ISA's.

fn mul(a: u32, b: u32) -> u32 {
    (a as i32).wrapping_mul(b as i32) as u32
}

fn mulh(a: u32, b: u32) -> u32 {
    let p = (a as i32 as i64).wrapping_mul(b as i32 as i64);
    (p >> 32) as u32
}

fn mulhsu(a: u32, b: u32) -> u32 {
    // signed rs1, unsigned rs2
    let p = (a as i32 as i64).wrapping_mul(b as i64);
    (p >> 32) as u32
}

fn mulhu(a: u32, b: u32) -> u32 {
    let p = (a as u64).wrapping_mul(b as u64);
    (p >> 32) as u32
}

fn div(a: u32, b: u32) -> u32 {
    let (a, b) = (a as i32, b as i32);
    if b == 0 {
        0xFFFF_FFFF
    } else if a == i32::MIN && b == -1 {
        a as u32
    } else {
        (a / b) as u32
    }
}

fn divu(a: u32, b: u32) -> u32 {
    if b == 0 {
        0xFFFF_FFFF
    } else {
        a / b
    }
}

fn rem(a: u32, b: u32) -> u32 {
    let (a_s, b_s) = (a as i32, b as i32);
    if b_s == 0 {
        a
    } else if a_s == i32::MIN && b_s == -1 {
        0
    } else {
        (a_s % b_s) as u32
    }
}

fn remu(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        a % b
    }
}

/// Execute one decoded instruction against the hart state.
///
/// `next_pc` is published before dispatch as `pc + instr_len()`; control-flow
/// instructions and xRET overwrite it. On `Err` the architectural state may
/// be partially updated only in ways the ISA permits (a faulting access
/// performs no register writeback).
pub fn execute(cpu: &mut Cpu, mem: &mut dyn MemPort, d: &DecodedInstr) -> ExecResult {
    let rs1 = cpu.read_reg(d.rs1);
    let rs1s = rs1 as i32;
    let rs2 = cpu.read_reg(d.rs2);
    let rs2s = rs2 as i32;
    let imm = d.imm as u32;

    cpu.next_pc = cpu.pc.wrapping_add(d.instr_len());

    match d.kind {
        Kind::Lui => cpu.write_reg(d.rd, imm),
        Kind::Auipc => cpu.write_reg(d.rd, cpu.pc.wrapping_add(imm)),

        Kind::Jal => {
            cpu.write_reg(d.rd, cpu.pc.wrapping_add(d.instr_len()));
            cpu.next_pc = cpu.pc.wrapping_add(imm);
        }
        Kind::Jalr => {
            let target = rs1.wrapping_add(imm) & !1;
            cpu.write_reg(d.rd, cpu.pc.wrapping_add(d.instr_len()));
            cpu.next_pc = target;
        }

        Kind::Beq => {
            if rs1 == rs2 {
                cpu.next_pc = cpu.pc.wrapping_add(imm);
            }
        }
        Kind::Bne => {
            if rs1 != rs2 {
                cpu.next_pc = cpu.pc.wrapping_add(imm);
            }
        }
        Kind::Blt => {
            if rs1s < rs2s {
                cpu.next_pc = cpu.pc.wrapping_add(imm);
            }
        }
        Kind::Bge => {
            if rs1s >= rs2s {
                cpu.next_pc = cpu.pc.wrapping_add(imm);
            }
        }
        Kind::Bltu => {
            if rs1 < rs2 {
                cpu.next_pc = cpu.pc.wrapping_add(imm);
            }
        }
        Kind::Bgeu => {
            if rs1 >= rs2 {
                cpu.next_pc = cpu.pc.wrapping_add(imm);
            }
        }

        Kind::Lb => {
            let addr = rs1.wrapping_add(imm);
            let v = mem.read(addr, 1) as u8 as i8;
            cpu.write_reg(d.rd, v as i32 as u32);
        }
        Kind::Lh => {
            let addr = rs1.wrapping_add(imm);
            if addr & 1 != 0 {
                return Err(Exception::misaligned_load(addr));
            }
            let v = mem.read(addr, 2) as u16 as i16;
            cpu.write_reg(d.rd, v as i32 as u32);
        }
        Kind::Lw => {
            let addr = rs1.wrapping_add(imm);
            if addr & 3 != 0 {
                return Err(Exception::misaligned_load(addr));
            }
            let v = mem.read(addr, 4);
            cpu.write_reg(d.rd, v);
        }
        Kind::Lbu => {
            let addr = rs1.wrapping_add(imm);
            cpu.write_reg(d.rd, mem.read(addr, 1) & 0xFF);
        }
        Kind::Lhu => {
            let addr = rs1.wrapping_add(imm);
            if addr & 1 != 0 {
                return Err(Exception::misaligned_load(addr));
            }
            cpu.write_reg(d.rd, mem.read(addr, 2) & 0xFFFF);
        }

        Kind::Sb => {
            let addr = rs1.wrapping_add(imm);
            mem.write(addr, rs2 & 0xFF, 1);
            cpu.reservation.clear();
        }
        Kind::Sh => {
            let addr = rs1.wrapping_add(imm);
            if addr & 1 != 0 {
                return Err(Exception::misaligned_store(addr));
            }
            mem.write(addr, rs2 & 0xFFFF, 2);
            cpu.reservation.clear();
        }
        Kind::Sw => {
            let addr = rs1.wrapping_add(imm);
            if addr & 3 != 0 {
                return Err(Exception::misaligned_store(addr));
            }
            mem.write(addr, rs2, 4);
            cpu.reservation.clear();
        }

        Kind::Addi => cpu.write_reg(d.rd, rs1.wrapping_add(imm)),
        Kind::Slti => cpu.write_reg(d.rd, (rs1s < d.imm) as u32),
        Kind::Sltiu => cpu.write_reg(d.rd, (rs1 < imm) as u32),
        Kind::Xori => cpu.write_reg(d.rd, rs1 ^ imm),
        Kind::Ori => cpu.write_reg(d.rd, rs1 | imm),
        Kind::Andi => cpu.write_reg(d.rd, rs1 & imm),
        Kind::Slli => cpu.write_reg(d.rd, rs1 << (imm & 0x1F)),
        Kind::Srli => cpu.write_reg(d.rd, rs1 >> (imm & 0x1F)),
        Kind::Srai => cpu.write_reg(d.rd, (rs1s >> (imm & 0x1F)) as u32),

        Kind::Add => cpu.write_reg(d.rd, rs1.wrapping_add(rs2)),
        Kind::Sub => cpu.write_reg(d.rd, rs1.wrapping_sub(rs2)),
        Kind::Sll => cpu.write_reg(d.rd, rs1 << (rs2 & 0x1F)),
        Kind::Slt => cpu.write_reg(d.rd, (rs1s < rs2s) as u32),
        Kind::Sltu => cpu.write_reg(d.rd, (rs1 < rs2) as u32),
        Kind::Xor => cpu.write_reg(d.rd, rs1 ^ rs2),
        Kind::Srl => cpu.write_reg(d.rd, rs1 >> (rs2 & 0x1F)),
        Kind::Sra => cpu.write_reg(d.rd, (rs1s >> (rs2 & 0x1F)) as u32),
        Kind::Or => cpu.write_reg(d.rd, rs1 | rs2),
        Kind::And => cpu.write_reg(d.rd, rs1 & rs2),

        Kind::Mul => cpu.write_reg(d.rd, mul(rs1, rs2)),
        Kind::Mulh => cpu.write_reg(d.rd, mulh(rs1, rs2)),
        Kind::Mulhsu => cpu.write_reg(d.rd, mulhsu(rs1, rs2)),
        Kind::Mulhu => cpu.write_reg(d.rd, mulhu(rs1, rs2)),
        Kind::Div => cpu.write_reg(d.rd, div(rs1, rs2)),
        Kind::Divu => cpu.write_reg(d.rd, divu(rs1, rs2)),
        Kind::Rem => cpu.write_reg(d.rd, rem(rs1, rs2)),
        Kind::Remu => cpu.write_reg(d.rd, remu(rs1, rs2)),

        Kind::LrW => {
            let addr = rs1;
            if addr & 3 != 0 {
                return Err(Exception::misaligned_load(addr));
            }
            cpu.write_reg(d.rd, mem.read(addr, 4));
            cpu.reservation.set(addr);
        }
        Kind::ScW => {
            let addr = rs1;
            if addr & 3 != 0 {
                return Err(Exception::misaligned_store(addr));
            }
            if cpu.reservation.check(addr) {
                mem.write(addr, rs2, 4);
                cpu.write_reg(d.rd, 0);
            } else {
                cpu.write_reg(d.rd, 1);
            }
            cpu.reservation.clear();
        }
        Kind::AmoswapW
        | Kind::AmoaddW
        | Kind::AmoxorW
        | Kind::AmoandW
        | Kind::AmoorW
        | Kind::AmominW
        | Kind::AmomaxW
        | Kind::AmominuW
        | Kind::AmomaxuW => {
            let addr = rs1;
            if addr & 3 != 0 {
                return Err(Exception::misaligned_store(addr));
            }
            let old = mem.read(addr, 4);
            cpu.write_reg(d.rd, old);
            let new = match d.kind {
                Kind::AmoswapW => rs2,
                Kind::AmoaddW => old.wrapping_add(rs2),
                Kind::AmoxorW => old ^ rs2,
                Kind::AmoandW => old & rs2,
                Kind::AmoorW => old | rs2,
                Kind::AmominW => (old as i32).min(rs2s) as u32,
                Kind::AmomaxW => (old as i32).max(rs2s) as u32,
                Kind::AmominuW => old.min(rs2),
                Kind::AmomaxuW => old.max(rs2),
                _ => unreachable!(),
            };
            mem.write(addr, new, 4);
        }

        Kind::Csrrw => {
            // The read (and its side effects) is skipped when rd is x0.
            if d.rd != 0 {
                let old = cpu
                    .csr
                    .read(d.csr, cpu.mode)
                    .map_err(|_| Exception::illegal(d.raw))?;
                cpu.write_reg(d.rd, old);
            }
            cpu.csr
                .write(d.csr, cpu.mode, rs1)
                .map_err(|_| Exception::illegal(d.raw))?;
        }
        Kind::Csrrs => {
            let old = cpu
                .csr
                .read(d.csr, cpu.mode)
                .map_err(|_| Exception::illegal(d.raw))?;
            cpu.write_reg(d.rd, old);
            // rs1 == x0 is the canonical read-only form: no write attempt.
            if d.rs1 != 0 {
                cpu.csr
                    .write(d.csr, cpu.mode, old | rs1)
                    .map_err(|_| Exception::illegal(d.raw))?;
            }
        }
        Kind::Csrrc => {
            let old = cpu
                .csr
                .read(d.csr, cpu.mode)
                .map_err(|_| Exception::illegal(d.raw))?;
            cpu.write_reg(d.rd, old);
            if d.rs1 != 0 {
                cpu.csr
                    .write(d.csr, cpu.mode, old & !rs1)
                    .map_err(|_| Exception::illegal(d.raw))?;
            }
        }
        Kind::Csrrwi => {
            let zimm = d.rs1;
            if d.rd != 0 {
                let old = cpu
                    .csr
                    .read(d.csr, cpu.mode)
                    .map_err(|_| Exception::illegal(d.raw))?;
                cpu.write_reg(d.rd, old);
            }
            cpu.csr
                .write(d.csr, cpu.mode, zimm)
                .map_err(|_| Exception::illegal(d.raw))?;
        }
        Kind::Csrrsi => {
            let zimm = d.rs1;
            let old = cpu
                .csr
                .read(d.csr, cpu.mode)
                .map_err(|_| Exception::illegal(d.raw))?;
            cpu.write_reg(d.rd, old);
            if zimm != 0 {
                cpu.csr
                    .write(d.csr, cpu.mode, old | zimm)
                    .map_err(|_| Exception::illegal(d.raw))?;
            }
        }
        Kind::Csrrci => {
            let zimm = d.rs1;
            let old = cpu
                .csr
                .read(d.csr, cpu.mode)
                .map_err(|_| Exception::illegal(d.raw))?;
            cpu.write_reg(d.rd, old);
            if zimm != 0 {
                cpu.csr
                    .write(d.csr, cpu.mode, old & !zimm)
                    .map_err(|_| Exception::illegal(d.raw))?;
            }
        }

        Kind::Ecall => {
            let cause = match cpu.mode {
                Mode::User => CAUSE_ECALL_U,
                Mode::Supervisor => CAUSE_ECALL_S,
                Mode::Machine => CAUSE_ECALL_M,
            };
            return Err(Exception::new(cause, 0));
        }
        Kind::Ebreak => return Err(Exception::new(CAUSE_BREAKPOINT, cpu.pc)),

        Kind::Mret => {
            if cpu.mode != Mode::Machine {
                return Err(Exception::illegal(d.raw));
            }
            cpu.next_pc = cpu.csr.mepc;
            let mpp = (cpu.csr.mstatus & MSTATUS_MPP_MASK) >> MSTATUS_MPP_SHIFT;
            let mpie = cpu.csr.mstatus & MSTATUS_MPIE != 0;
            cpu.csr.mstatus =
                (cpu.csr.mstatus & !MSTATUS_MIE) | if mpie { MSTATUS_MIE } else { 0 };
            cpu.csr.mstatus |= MSTATUS_MPIE;
            cpu.csr.mstatus &= !MSTATUS_MPP_MASK;
            cpu.mode = Mode::from_bits(mpp);
        }
        Kind::Sret => {
            if cpu.mode == Mode::User {
                return Err(Exception::illegal(d.raw));
            }
            if cpu.csr.mstatus & MSTATUS_TSR != 0 && cpu.mode == Mode::Supervisor {
                return Err(Exception::illegal(d.raw));
            }
            cpu.next_pc = cpu.csr.sepc;
            let spp = cpu.csr.mstatus & MSTATUS_SPP != 0;
            let spie = cpu.csr.mstatus & MSTATUS_SPIE != 0;
            cpu.csr.mstatus =
                (cpu.csr.mstatus & !MSTATUS_SIE) | if spie { MSTATUS_SIE } else { 0 };
            cpu.csr.mstatus |= MSTATUS_SPIE;
            cpu.csr.mstatus &= !MSTATUS_SPP;
            cpu.mode = if spp { Mode::Supervisor } else { Mode::User };
        }

        // Functional model: waiting and fences have nothing to reorder.
        Kind::Wfi => {}
        Kind::SfenceVma => {
            if cpu.mode == Mode::User {
                return Err(Exception::illegal(d.raw));
            }
            if cpu.csr.mstatus & MSTATUS_TVM != 0 && cpu.mode == Mode::Supervisor {
                return Err(Exception::illegal(d.raw));
            }
            // No TLB yet; recognized and dispatched only.
        }
        Kind::Fence | Kind::FenceI => {}

        Kind::Illegal => return Err(Exception::illegal(d.raw)),
    }

    Ok(())
}
