// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Cluster-side services: the remote-call queue towards the fabric
//! controller, the cluster DMA, and a single-core stand-in for the cluster
//! team used on hosts.

use log::trace;
use pmsis_hal::chip::{Chip, HartId};
use pmsis_hal::Task;

pub mod delegate;
pub mod dma;

/// A cluster reduced to one core, running entry points in the calling
/// context.
pub struct EmulatedCluster {
    chip: Chip,
    cluster_id: u32,
}

impl EmulatedCluster {
    pub fn new(chip: Chip) -> Self {
        EmulatedCluster {
            chip,
            cluster_id: 0,
        }
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    pub fn core_id(&self) -> u32 {
        0
    }

    pub fn cluster_id(&self) -> u32 {
        self.cluster_id
    }

    /// Number of cores taking part in a fork.
    pub fn nb_cores(&self) -> u32 {
        1
    }

    pub fn hart(&self) -> HartId {
        HartId::from_parts(self.cluster_id, self.core_id())
    }

    /// Run `entry` on every core of the team. `cores` is clamped to the
    /// cores available, so the entry runs once, on core 0.
    pub fn team_fork<F: FnMut(u32)>(&self, cores: u32, mut entry: F) {
        let cores = cores.clamp(1, self.nb_cores());
        trace!("team fork on {} core(s)", cores);
        for core in 0..cores {
            entry(core);
        }
    }

    /// Synchronize the team. With a single core there is nobody to wait for.
    pub fn team_barrier(&self) {}

    /// Offload `entry` to the cluster. `event`, if given, is issued before
    /// and completed after the entry returns, like the fabric controller's
    /// notification of a finished cluster call.
    pub fn cluster_call<F: FnOnce()>(&self, entry: F, event: Option<&Task>) {
        if let Some(event) = event {
            event.issue();
        }
        entry();
        if let Some(event) = event {
            event.complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_runs_entry_on_core_zero() {
        let cluster = EmulatedCluster::new(Chip::Gap8);
        let mut seen = [false; 8];
        cluster.team_fork(8, |core| seen[core as usize] = true);
        assert_eq!(seen, [true, false, false, false, false, false, false, false]);
        cluster.team_barrier();
    }

    #[test]
    fn cluster_call_completes_event() {
        let cluster = EmulatedCluster::new(Chip::Gap9);
        let event = Task::new();
        let mut ran = false;
        cluster.cluster_call(|| ran = true, Some(&event));
        assert!(ran);
        assert!(event.is_done());
        event.wait();
    }

    #[test]
    fn hart_is_not_the_fabric_controller() {
        let cluster = EmulatedCluster::new(Chip::Gap8);
        assert!(!cluster.hart().is_fc(cluster.chip()));
        assert_eq!(cluster.hart().core_id(), 0);
    }
}
