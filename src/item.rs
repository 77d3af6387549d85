//! Revision items
//!
//! A revision item is one tracked change: a stable UUID, a kind tag, and an
//! ordered list of deltas whose payloads are held in memory until flushed
//! into the item's pack.
//!
//! Author: Moroya Sakamoto

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::keys;
use crate::pack::{parse_uuid, DeltaPack, PackKey, PackRef};
use crate::tree::DataTree;

/// Shared handle to an item
pub type ItemRef = Rc<RevisionItem>;

/// What kind of change an item records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Placeholder before the real kind is known
    Undefined,
    /// Tracked object was created
    Added,
    /// Tracked object was deleted
    Removed,
    /// Tracked object was modified
    Changed,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Changed => "changed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "undefined" => Some(Self::Undefined),
            "added" => Some(Self::Added),
            "removed" => Some(Self::Removed),
            "changed" => Some(Self::Changed),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delta inside an item
#[derive(Debug, Clone)]
struct Delta {
    id: Uuid,
    description: String,
    /// `Some` while in memory, `None` once flushed into the pack
    data: Option<Vec<u8>>,
}

/// A tracked change backed by a delta pack
#[derive(Debug)]
pub struct RevisionItem {
    id: Uuid,
    kind: ItemKind,
    description: String,
    pack: PackRef,
    deltas: RefCell<Vec<Delta>>,
}

impl RevisionItem {
    pub fn new(pack: PackRef, kind: ItemKind, description: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            description: String::from(description),
            pack,
            deltas: RefCell::new(Vec::new()),
        }
    }

    /// Builder form of [`RevisionItem::add_delta`]
    pub fn with_delta(mut self, description: &str, payload: Vec<u8>) -> Self {
        self.add_delta(description, payload);
        self
    }

    /// Append an in-memory delta, returns its id
    pub fn add_delta(&mut self, description: &str, payload: Vec<u8>) -> Uuid {
        let id = Uuid::new_v4();
        self.deltas.get_mut().push(Delta {
            id,
            description: String::from(description),
            data: Some(payload),
        });
        id
    }

    /// Wrap in a shared handle
    pub fn into_ref(self) -> ItemRef {
        Rc::new(self)
    }

    /// Copy this item into another pack.
    ///
    /// Keeps the item UUID, kind, description and every delta id. Payloads
    /// are read from memory or the current pack and stay in memory on the
    /// copy until it is flushed into `pack`.
    pub fn rehome(&self, pack: PackRef) -> Self {
        let deltas = self
            .deltas
            .borrow()
            .iter()
            .map(|d| {
                let data = match &d.data {
                    Some(bytes) => Some(bytes.clone()),
                    None => {
                        let payload = self.pack.get(&PackKey::new(self.id, d.id));
                        if payload.is_none() {
                            warn!(
                                item = %self.id,
                                delta = %d.id,
                                pack = %self.pack.id(),
                                "flushed payload missing from source pack"
                            );
                        }
                        payload
                    }
                };
                Delta {
                    id: d.id,
                    description: d.description.clone(),
                    data,
                }
            })
            .collect();

        debug!(item = %self.id, from = %self.pack.id(), to = %pack.id(), "item rehomed");
        Self {
            id: self.id,
            kind: self.kind,
            description: self.description.clone(),
            pack,
            deltas: RefCell::new(deltas),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn pack(&self) -> &PackRef {
        &self.pack
    }

    /// True if this item stores its payloads in `pack`
    pub fn is_homed_in(&self, pack: &PackRef) -> bool {
        DeltaPack::same(&self.pack, pack)
    }

    pub fn delta_count(&self) -> usize {
        self.deltas.borrow().len()
    }

    /// Delta ids in insertion order
    pub fn delta_ids(&self) -> Vec<Uuid> {
        self.deltas.borrow().iter().map(|d| d.id).collect()
    }

    pub fn delta_description(&self, delta: Uuid) -> Option<String> {
        self.deltas
            .borrow()
            .iter()
            .find(|d| d.id == delta)
            .map(|d| d.description.clone())
    }

    /// Payload of a delta, from memory or from the pack
    pub fn delta_payload(&self, delta: Uuid) -> Option<Vec<u8>> {
        let deltas = self.deltas.borrow();
        let d = deltas.iter().find(|d| d.id == delta)?;
        match &d.data {
            Some(bytes) => Some(bytes.clone()),
            None => self.pack.get(&PackKey::new(self.id, d.id)),
        }
    }

    /// True when no payload is held in memory
    pub fn is_flushed(&self) -> bool {
        self.deltas.borrow().iter().all(|d| d.data.is_none())
    }

    /// Move in-memory payloads into the pack. Returns how many moved.
    pub fn flush_data(&self) -> usize {
        let mut moved = 0;
        for d in self.deltas.borrow_mut().iter_mut() {
            if let Some(bytes) = d.data.take() {
                self.pack.append(PackKey::new(self.id, d.id), bytes);
                moved += 1;
            }
        }
        if moved > 0 {
            debug!(item = %self.id, pack = %self.pack.id(), moved, "item flushed");
        }
        moved
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Item descriptor tree. Flushed payloads stay in the pack; in-memory
    /// payloads are written inline.
    pub fn serialize(&self) -> DataTree {
        let mut tree = DataTree::new(keys::REVISION_ITEM)
            .with_property(keys::ITEM_ID, self.id.to_string())
            .with_property(keys::ITEM_TYPE, self.kind.as_str())
            .with_property(keys::ITEM_NAME, self.description.as_str());

        for d in self.deltas.borrow().iter() {
            let mut node = DataTree::new(keys::DELTA)
                .with_property(keys::DELTA_ID, d.id.to_string())
                .with_property(keys::DELTA_NAME, d.description.as_str());
            if let Some(bytes) = &d.data {
                node.set_property(keys::DELTA_DATA, BASE64.encode(bytes));
            }
            tree.append_child(node);
        }
        tree
    }

    /// Rebuild an item bound to `pack` from [`RevisionItem::serialize`] output
    pub fn deserialize(pack: PackRef, tree: &DataTree) -> Result<Self> {
        if !tree.has_type(keys::REVISION_ITEM) {
            return Err(Error::UnexpectedTag {
                expected: keys::REVISION_ITEM,
                found: tree.tag().to_string(),
            });
        }

        let id = parse_uuid(tree, keys::ITEM_ID)?;
        let raw_kind = tree
            .property(keys::ITEM_TYPE)
            .ok_or(Error::MissingProperty(keys::ITEM_TYPE))?;
        let kind =
            ItemKind::parse(raw_kind).ok_or_else(|| Error::UnknownItemKind(raw_kind.to_string()))?;
        let description = tree.property(keys::ITEM_NAME).unwrap_or_default();

        let mut deltas = Vec::with_capacity(tree.child_count());
        for node in tree.children() {
            if !node.has_type(keys::DELTA) {
                return Err(Error::UnexpectedTag {
                    expected: keys::DELTA,
                    found: node.tag().to_string(),
                });
            }
            let data = match node.property(keys::DELTA_DATA) {
                Some(encoded) => Some(BASE64.decode(encoded)?),
                None => None,
            };
            deltas.push(Delta {
                id: parse_uuid(node, keys::DELTA_ID)?,
                description: node.property(keys::DELTA_NAME).unwrap_or_default().to_string(),
                data,
            });
        }

        Ok(Self {
            id,
            kind,
            description: description.to_string(),
            pack,
            deltas: RefCell::new(deltas),
        })
    }
}
