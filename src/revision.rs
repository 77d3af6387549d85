//! Revision model
//!
//! A revision is a commit node: a set of named slots (each a delta item or
//! a scalar), the pack new deltas are stored in, and an ordered list of
//! child revisions. Revisions nest into a history tree.
//!
//! Author: Moroya Sakamoto

use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::item::{ItemRef, RevisionItem};
use crate::keys;
use crate::pack::PackRef;
use crate::tree::DataTree;

/// Value bound to a revision slot
#[derive(Debug, Clone)]
pub enum SlotValue {
    /// String scalar
    Text(String),
    /// Integer scalar
    Integer(i64),
    /// Tracked change
    Delta(ItemRef),
}

impl SlotValue {
    pub fn as_delta(&self) -> Option<&ItemRef> {
        match self {
            SlotValue::Delta(item) => Some(item),
            _ => None,
        }
    }

    pub fn is_delta(&self) -> bool {
        matches!(self, SlotValue::Delta(_))
    }

    /// Scalar rendered as text; `None` for deltas
    pub fn to_text(&self) -> Option<String> {
        match self {
            SlotValue::Text(s) => Some(s.clone()),
            SlotValue::Integer(v) => Some(v.to_string()),
            SlotValue::Delta(_) => None,
        }
    }

    /// Integer scalar, parsing decimal text
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            SlotValue::Integer(v) => Some(*v),
            SlotValue::Text(s) => s.trim().parse().ok(),
            SlotValue::Delta(_) => None,
        }
    }
}

impl From<&str> for SlotValue {
    fn from(s: &str) -> Self {
        SlotValue::Text(String::from(s))
    }
}

impl From<String> for SlotValue {
    fn from(s: String) -> Self {
        SlotValue::Text(s)
    }
}

impl From<i64> for SlotValue {
    fn from(v: i64) -> Self {
        SlotValue::Integer(v)
    }
}

/// What a deserialization pass managed to load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// A node tagged `revision` was found
    pub root_found: bool,
    /// Delta items bound into slots (all levels)
    pub deltas_loaded: usize,
    /// Delta nodes that failed to parse (all levels)
    pub deltas_skipped: usize,
    /// Child revisions attached (all levels)
    pub children_loaded: usize,
}

impl LoadReport {
    /// True if the root was found and nothing was skipped
    pub fn is_complete(&self) -> bool {
        self.root_found && self.deltas_skipped == 0
    }
}

/// A commit node in the history tree
#[derive(Debug, Clone)]
pub struct Revision {
    /// Default pack for this revision's deltas; never a slot
    pack: PackRef,
    slots: BTreeMap<String, SlotValue>,
    children: Vec<Revision>,
}

impl Revision {
    /// New revision: fresh id, `message`, current time, version 1
    pub fn create(pack: PackRef, message: &str) -> Self {
        let mut revision = Self::empty(pack);
        let id = Uuid::new_v4();
        revision.set_scalar(keys::COMMIT_ID, id.to_string());
        revision.set_scalar(keys::COMMIT_MESSAGE, message);
        revision.set_scalar(keys::COMMIT_TIME_STAMP, Utc::now().timestamp_millis());
        revision.set_scalar(keys::COMMIT_VERSION, 1i64);
        debug!(revision = %id, pack = %revision.pack.id(), "revision created");
        revision
    }

    /// Revision with no slots and no children
    pub fn empty(pack: PackRef) -> Self {
        Self {
            pack,
            slots: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn pack(&self) -> &PackRef {
        &self.pack
    }

    // ── Accessors ──────────────────────────────────────────────────────

    /// Commit id, empty if unset
    pub fn uuid(&self) -> String {
        self.text_property(keys::COMMIT_ID)
    }

    pub fn message(&self) -> String {
        self.text_property(keys::COMMIT_MESSAGE)
    }

    /// Milliseconds since the Unix epoch, 0 if unset
    pub fn timestamp(&self) -> i64 {
        self.integer_property(keys::COMMIT_TIME_STAMP)
    }

    pub fn version(&self) -> i64 {
        self.integer_property(keys::COMMIT_VERSION)
    }

    /// True when the commit message is empty.
    ///
    /// Deltas are not considered: a revision holding changes but no
    /// message still reports empty.
    pub fn is_empty(&self) -> bool {
        self.message().is_empty()
    }

    fn text_property(&self, name: &str) -> String {
        self.slots
            .get(name)
            .and_then(SlotValue::to_text)
            .unwrap_or_default()
    }

    fn integer_property(&self, name: &str) -> i64 {
        self.slots
            .get(name)
            .and_then(SlotValue::to_integer)
            .unwrap_or(0)
    }

    // ── Slots ──────────────────────────────────────────────────────────

    pub fn property(&self, name: &str) -> Option<&SlotValue> {
        self.slots.get(name)
    }

    /// Iterate all slots in name order
    pub fn properties(&self) -> impl Iterator<Item = (&str, &SlotValue)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bind a slot. The pack key is reserved and ignored; a delta value is
    /// routed through [`Revision::bind_item`].
    pub fn set_scalar(&mut self, name: &str, value: impl Into<SlotValue>) {
        if name == keys::PACK {
            warn!(slot = name, "refusing to bind reserved pack slot");
            return;
        }
        match value.into() {
            SlotValue::Delta(item) => {
                self.bind_item(name, &item);
            }
            scalar => {
                self.slots.insert(String::from(name), scalar);
            }
        }
    }

    /// Bind a delta slot, re-homing `item` into this revision's pack when
    /// it lives elsewhere. Returns `true` if the item was aliased.
    pub fn bind_item(&mut self, name: &str, item: &ItemRef) -> bool {
        crate::merge::copy_property(self, name, item).is_aliased()
    }

    /// Bind a slot without reconciliation; callers uphold the pack invariant
    pub(crate) fn insert_slot(&mut self, name: &str, value: SlotValue) {
        self.slots.insert(String::from(name), value);
    }

    pub fn remove_property(&mut self, name: &str) -> Option<SlotValue> {
        self.slots.remove(name)
    }

    /// Drop every slot; the pack stays bound
    pub(crate) fn clear_slots(&mut self) {
        self.slots.clear();
    }

    /// Drop every delta slot, keeping scalars
    pub(crate) fn clear_deltas(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, v| !v.is_delta());
        before - self.slots.len()
    }

    /// Delta slots in name order
    pub fn deltas(&self) -> impl Iterator<Item = (&str, &ItemRef)> {
        self.slots
            .iter()
            .filter_map(|(k, v)| v.as_delta().map(|item| (k.as_str(), item)))
    }

    pub fn delta_count(&self) -> usize {
        self.deltas().count()
    }

    pub fn scalar_count(&self) -> usize {
        self.slots.len() - self.delta_count()
    }

    // ── Children ───────────────────────────────────────────────────────

    pub fn children(&self) -> &[Revision] {
        &self.children
    }

    pub fn add_child(&mut self, child: Revision) {
        self.children.push(child);
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// This revision plus all descendants
    pub fn revision_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(Revision::revision_count)
            .sum::<usize>()
    }

    /// Depth-first search by commit id
    pub fn find(&self, uuid: &str) -> Option<&Revision> {
        if self.uuid() == uuid {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(uuid))
    }

    // ── Hashing / lifecycle ────────────────────────────────────────────

    /// Order-independent hash of the delta identity set.
    ///
    /// Sorted item UUID strings, concatenated, hashed with FNV-1a 32-bit.
    /// Slot names, scalars, children and the pack do not contribute.
    pub fn calculate_hash(&self) -> u32 {
        let mut ids: Vec<String> = self
            .deltas()
            .map(|(_, item)| item.uuid().to_string())
            .collect();
        ids.sort();
        fnv1a_32(ids.concat().as_bytes())
    }

    /// Move every delta payload from memory into its pack.
    /// Returns the number of payloads moved.
    pub fn flush(&self) -> usize {
        let moved: usize = self.deltas().map(|(_, item)| item.flush_data()).sum();
        debug!(revision = %self.uuid(), moved, "revision flushed");
        moved
    }

    pub fn increment_version(&mut self) {
        let next = self.version().saturating_add(1);
        self.set_scalar(keys::COMMIT_VERSION, next);
    }

    /// Remove every delta slot and every child. Scalars and the pack stay.
    pub fn reset(&mut self) {
        let removed = self.clear_deltas();
        let children = self.children.len();
        self.children.clear();
        debug!(revision = %self.uuid(), removed, children, "revision reset");
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Portable tree form.
    ///
    /// Deltas become child nodes, scalars become string properties, child
    /// revisions follow the deltas. The pack is never written.
    pub fn serialize(&self) -> DataTree {
        let mut tree = DataTree::new(keys::REVISION);
        for (name, value) in &self.slots {
            match value {
                SlotValue::Delta(item) => tree.append_child(item.serialize()),
                SlotValue::Text(s) => tree.set_property(name, s.as_str()),
                SlotValue::Integer(v) => tree.set_property(name, v.to_string()),
            }
        }
        for child in &self.children {
            tree.append_child(child.serialize());
        }
        tree
    }

    /// Build a new revision bound to `pack` from a serialized tree.
    ///
    /// `tree` may be the revision node itself or a node with a direct
    /// `revision` child. Malformed deltas are skipped; a missing root
    /// yields an empty revision. Child revisions start from their parent's
    /// scalars, so a child node lacking a property inherits it.
    pub fn deserialize(pack: PackRef, tree: &DataTree) -> Self {
        Self::deserialize_with_report(pack, tree).0
    }

    /// [`Revision::deserialize`] plus counts of what was loaded
    pub fn deserialize_with_report(pack: PackRef, tree: &DataTree) -> (Self, LoadReport) {
        load_root(Self::empty(pack), tree)
    }

    /// Reload this revision in place from a serialized tree.
    ///
    /// Deltas and children are replaced; scalars present in the tree
    /// overwrite ours, scalars absent from it are kept. Without a
    /// `revision` node the revision is left reset.
    pub fn reload(&mut self, tree: &DataTree) -> LoadReport {
        self.reset();
        let base = Self {
            pack: Rc::clone(&self.pack),
            slots: std::mem::take(&mut self.slots),
            children: Vec::new(),
        };
        let (loaded, report) = load_root(base, tree);
        *self = loaded;
        report
    }

    /// Copy of this revision's scalar slots with no deltas or children
    fn scalar_seed(&self) -> Self {
        Self {
            pack: Rc::clone(&self.pack),
            slots: self
                .slots
                .iter()
                .filter(|(_, v)| !v.is_delta())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            children: Vec::new(),
        }
    }
}

/// Locate the revision node in `tree` and load it on top of `base`
fn load_root(base: Revision, tree: &DataTree) -> (Revision, LoadReport) {
    let mut report = LoadReport::default();
    let root = if tree.has_type(keys::REVISION) {
        Some(tree)
    } else {
        tree.child_with_type(keys::REVISION)
    };

    let revision = match root {
        Some(root) => {
            report.root_found = true;
            load_node(base, root, &mut report)
        }
        None => {
            warn!(tag = tree.tag(), "no revision node found, nothing loaded");
            base
        }
    };

    debug!(
        revision = %revision.uuid(),
        deltas = report.deltas_loaded,
        skipped = report.deltas_skipped,
        children = report.children_loaded,
        "revision loaded"
    );
    (revision, report)
}

fn load_node(mut revision: Revision, root: &DataTree, report: &mut LoadReport) -> Revision {
    for (name, value) in root.properties() {
        if name == keys::PACK {
            warn!("persisted revision carries a pack property, ignoring");
            continue;
        }
        revision.insert_slot(name, SlotValue::Text(String::from(value)));
    }

    for node in root.children() {
        if node.has_type(keys::REVISION) {
            let child = load_node(revision.scalar_seed(), node, report);
            revision.add_child(child);
            report.children_loaded += 1;
            continue;
        }

        match RevisionItem::deserialize(Rc::clone(&revision.pack), node) {
            Ok(item) => {
                let key = item.uuid().to_string();
                revision.insert_slot(&key, SlotValue::Delta(item.into_ref()));
                report.deltas_loaded += 1;
            }
            Err(e) => {
                warn!(tag = node.tag(), error = %e, "skipping malformed delta");
                report.deltas_skipped += 1;
            }
        }
    }

    revision
}

/// FNV-1a 32-bit
fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut h: u32 = 0x811c9dc5;
    for &b in bytes {
        h ^= b as u32;
        h = h.wrapping_mul(0x01000193);
    }
    h
}
