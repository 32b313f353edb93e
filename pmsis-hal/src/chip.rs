// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Identification of the executing core: fabric controller or one of the
//! cluster cores.

use ufmt::derive::uDebug;

#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Chip {
    Gap8,
    Gap9,
}

impl Chip {
    /// Cluster id reported by the fabric controller's hart id.
    pub const fn fc_cluster_id(self) -> u32 {
        match self {
            Chip::Gap8 => 32,
            Chip::Gap9 => 31,
        }
    }

    /// Number of cores in the compute cluster.
    pub const fn cluster_cores(self) -> u32 {
        match self {
            Chip::Gap8 => 8,
            Chip::Gap9 => 9,
        }
    }
}

/// Raw value of the hart id CSR (`0x014`).
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub struct HartId(u32);

impl HartId {
    pub const fn new(raw: u32) -> HartId {
        HartId(raw)
    }

    pub const fn from_parts(cluster_id: u32, core_id: u32) -> HartId {
        HartId(((cluster_id & 0x3f) << 5) | (core_id & 0x1f))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn core_id(self) -> u32 {
        self.0 & 0x1f
    }

    pub const fn cluster_id(self) -> u32 {
        (self.0 >> 5) & 0x3f
    }

    pub const fn is_fc(self, chip: Chip) -> bool {
        self.cluster_id() == chip.fc_cluster_id()
    }

    pub fn context(self, chip: Chip) -> ExecutionContext {
        if self.is_fc(chip) {
            ExecutionContext::FabricController
        } else {
            ExecutionContext::Cluster {
                cluster: self.cluster_id() as u8,
                core: self.core_id() as u8,
            }
        }
    }
}

/// Where a request was issued from.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExecutionContext {
    FabricController,
    Cluster { cluster: u8, core: u8 },
}

/// Read the hart id of the executing core.
#[cfg(target_arch = "riscv32")]
pub fn current_hart() -> HartId {
    let raw: u32;
    // SAFETY: reading the hart id CSR has no side effects.
    unsafe {
        core::arch::asm!("csrr {0}, 0x014", out(reg) raw);
    }
    HartId(raw)
}
