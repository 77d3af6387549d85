//! Cross-pack slot reconciliation
//!
//! Copies slots between two revisions that may store their deltas in
//! different packs. Items already living in the target's pack are shared;
//! items from a foreign pack are re-created against the target's pack,
//! keeping their identity.
//!
//! Author: Moroya Sakamoto

use std::rc::Rc;

use tracing::debug;

use crate::item::ItemRef;
use crate::revision::{Revision, SlotValue};

/// How a single delta slot was bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Same pack: the slot shares the source item
    Aliased,
    /// Different pack: the slot holds a new item in the target's pack
    Rehomed,
}

impl CopyOutcome {
    pub fn is_aliased(self) -> bool {
        self == CopyOutcome::Aliased
    }
}

/// Counts from a bulk copy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Delta slots sharing the source item
    pub aliased: usize,
    /// Delta slots re-created in the target's pack
    pub rehomed: usize,
    /// Scalar slots copied verbatim
    pub scalars: usize,
}

impl CopyStats {
    fn record(&mut self, outcome: CopyOutcome) {
        match outcome {
            CopyOutcome::Aliased => self.aliased += 1,
            CopyOutcome::Rehomed => self.rehomed += 1,
        }
    }

    /// Total delta slots bound
    pub fn deltas(&self) -> usize {
        self.aliased + self.rehomed
    }
}

/// Bind `slot` of `target` to `item`.
///
/// Pack identity is pointer identity: a content-equal but distinct pack
/// still counts as foreign.
pub fn copy_property(target: &mut Revision, slot: &str, item: &ItemRef) -> CopyOutcome {
    if item.is_homed_in(target.pack()) {
        target.insert_slot(slot, SlotValue::Delta(Rc::clone(item)));
        CopyOutcome::Aliased
    } else {
        let rehomed = item.rehome(Rc::clone(target.pack())).into_ref();
        target.insert_slot(slot, SlotValue::Delta(rehomed));
        CopyOutcome::Rehomed
    }
}

/// Replace every slot of `one` with the slots of `another`.
///
/// `one` keeps its own pack; deltas are reconciled against it, scalars are
/// copied as they are. Children are not touched.
pub fn copy_properties(one: &mut Revision, another: &Revision) -> CopyStats {
    let mut stats = CopyStats::default();
    one.clear_slots();

    for (name, value) in another.properties() {
        match value {
            SlotValue::Delta(item) => stats.record(copy_property(one, name, item)),
            scalar => {
                one.insert_slot(name, scalar.clone());
                stats.scalars += 1;
            }
        }
    }

    debug!(
        target_revision = %one.uuid(),
        aliased = stats.aliased,
        rehomed = stats.rehomed,
        scalars = stats.scalars,
        "properties copied"
    );
    stats
}

/// Replace the delta slots of `one` with those of `another`.
///
/// Scalars of `one` (message, timestamp, version, ...) are left as they
/// are; scalars of `another` are ignored.
pub fn copy_deltas(one: &mut Revision, another: &Revision) -> CopyStats {
    let mut stats = CopyStats::default();
    one.clear_deltas();

    for (name, item) in another.deltas() {
        stats.record(copy_property(one, name, item));
    }

    debug!(
        target_revision = %one.uuid(),
        aliased = stats.aliased,
        rehomed = stats.rehomed,
        "deltas copied"
    );
    stats
}
