//! Read-side views maintained incrementally over machine status changes.

use std::collections::HashMap;

use differential_dataflow::lattice::Lattice;
use differential_dataflow::operators::reduce::Reduce;
use differential_dataflow::Collection;
use timely::dataflow::Scope;
use ww_core::{MachineId, MachineRef, MachineStatus, MachineType};

/// One machine's current canonical status.
pub type StatusRow = (MachineId, MachineType, MachineStatus);

/// Number of machines per `(type, status)`, e.g. "3 washers available".
pub fn status_counts<G>(
    current: &Collection<G, StatusRow>,
) -> Collection<G, ((MachineType, MachineStatus), i64)>
where
    G: Scope,
    G::Timestamp: Lattice + Ord,
{
    current
        .map(|(_machine, machine_type, status)| ((machine_type, status), ()))
        .reduce(|_key, inputs, output| {
            let machines: isize = inputs.iter().map(|(_, count)| *count).sum();
            if machines > 0 {
                output.push((machines as i64, 1));
            }
        })
}

/// Turns summary snapshots into retract/insert pairs for the `StatusRow` input.
#[derive(Debug, Default)]
pub struct BoardFeed {
    known: HashMap<MachineId, (MachineType, MachineStatus)>,
}

impl BoardFeed {
    pub fn observe(&mut self, machine: MachineRef, status: MachineStatus) -> Vec<(StatusRow, isize)> {
        let mut changes = Vec::with_capacity(2);
        match self
            .known
            .insert(machine.machine_id, (machine.machine_type, status))
        {
            Some(previous) if previous == (machine.machine_type, status) => return changes,
            Some((machine_type, old)) => changes.push(((machine.machine_id, machine_type, old), -1)),
            None => {}
        }
        changes.push(((machine.machine_id, machine.machine_type, status), 1));
        changes
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
