//! Delta pack — shared payload store
//!
//! Append-only storage for the payload bytes of revision item deltas,
//! addressed by `(item uuid, delta uuid)`. A pack is shared by every
//! revision and item that references it; it lives as long as its
//! longest holder.
//!
//! Author: Moroya Sakamoto

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::keys;
use crate::tree::DataTree;

/// Shared handle to a pack
pub type PackRef = Rc<DeltaPack>;

/// Address of one payload inside a pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackKey {
    /// Owning revision item
    pub item: Uuid,
    /// Delta within that item
    pub delta: Uuid,
}

impl PackKey {
    pub fn new(item: Uuid, delta: Uuid) -> Self {
        Self { item, delta }
    }
}

/// Append-only payload store
#[derive(Debug)]
pub struct DeltaPack {
    id: Uuid,
    entries: RefCell<BTreeMap<PackKey, Vec<u8>>>,
}

impl Default for DeltaPack {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaPack {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: RefCell::new(BTreeMap::new()),
        }
    }

    /// New pack wrapped in a shared handle
    pub fn shared() -> PackRef {
        Rc::new(Self::new())
    }

    /// Runtime identity, used for logging only
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pointer identity of two handles
    #[inline]
    pub fn same(a: &PackRef, b: &PackRef) -> bool {
        Rc::ptr_eq(a, b)
    }

    /// Append a payload. Returns `false` and leaves the stored bytes
    /// untouched if the key is already present.
    pub fn append(&self, key: PackKey, payload: Vec<u8>) -> bool {
        let mut entries = self.entries.borrow_mut();
        if let Some(existing) = entries.get(&key) {
            if *existing != payload {
                warn!(
                    pack = %self.id,
                    item = %key.item,
                    delta = %key.delta,
                    "pack entry already present with different bytes, keeping original"
                );
            }
            return false;
        }
        entries.insert(key, payload);
        true
    }

    /// Copy of the payload stored under `key`
    pub fn get(&self, key: &PackKey) -> Option<Vec<u8>> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn contains(&self, key: &PackKey) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Number of stored payloads
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// All keys in ascending order
    pub fn keys(&self) -> Vec<PackKey> {
        self.entries.borrow().keys().copied().collect()
    }

    /// Sum of stored payload sizes
    pub fn payload_bytes(&self) -> usize {
        self.entries.borrow().values().map(Vec::len).sum()
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Snapshot the pack contents as a tree
    pub fn serialize(&self) -> DataTree {
        let mut tree = DataTree::new(keys::PACK);
        for (key, payload) in self.entries.borrow().iter() {
            tree.append_child(
                DataTree::new(keys::PACK_ENTRY)
                    .with_property(keys::ITEM_ID, key.item.to_string())
                    .with_property(keys::DELTA_ID, key.delta.to_string())
                    .with_property(keys::DELTA_DATA, BASE64.encode(payload)),
            );
        }
        tree
    }

    /// Rebuild a pack from [`DeltaPack::serialize`] output.
    ///
    /// The result gets a fresh runtime id; pack identity is never persisted.
    pub fn deserialize(tree: &DataTree) -> Result<PackRef> {
        if !tree.has_type(keys::PACK) {
            return Err(Error::UnexpectedTag {
                expected: keys::PACK,
                found: tree.tag().to_string(),
            });
        }

        let pack = Self::new();
        {
            let mut entries = pack.entries.borrow_mut();
            for entry in tree.children() {
                if !entry.has_type(keys::PACK_ENTRY) {
                    return Err(Error::UnexpectedTag {
                        expected: keys::PACK_ENTRY,
                        found: entry.tag().to_string(),
                    });
                }
                let item = parse_uuid(entry, keys::ITEM_ID)?;
                let delta = parse_uuid(entry, keys::DELTA_ID)?;
                let data = entry
                    .property(keys::DELTA_DATA)
                    .ok_or(Error::MissingProperty(keys::DELTA_DATA))?;
                entries.insert(PackKey::new(item, delta), BASE64.decode(data)?);
            }
        }

        debug!(pack = %pack.id, entries = pack.len(), "pack loaded");
        Ok(Rc::new(pack))
    }
}

/// Read a UUID-valued property
pub(crate) fn parse_uuid(tree: &DataTree, name: &'static str) -> Result<Uuid> {
    let raw = tree.property(name).ok_or(Error::MissingProperty(name))?;
    Uuid::parse_str(raw).map_err(|_| Error::InvalidUuid(raw.to_string()))
}
