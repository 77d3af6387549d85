//! sequencer-vcs — Embedded revision history for sequencer projects
//!
//! Tracks incremental edits to a project as a tree of revisions whose
//! deltas live in shared, append-only packs:
//! - Revisions with named slots (delta items or scalars) and child revisions
//! - Reference-counted delta packs shared by any number of revisions
//! - Order-independent hashing of a revision's delta identities
//! - Cross-pack slot copying that re-homes foreign deltas transparently
//! - Portable tree serialization plus a compact varint binary form
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`codec`] | Binary encoding/decoding of data trees (LEB128 varints) |
//! | [`error`] | Error type for persisted-data parsing |
//! | [`item`] | Revision items: one tracked change and its deltas |
//! | [`keys`] | Tags and property names of the persisted format |
//! | [`merge`] | Slot copying with cross-pack reconciliation |
//! | [`pack`] | Append-only, shared delta payload store |
//! | [`revision`] | Revision nodes: create, hash, flush, reset, (de)serialize |
//! | [`tree`] | Generic tagged tree used as the serialization substrate |
//!
//! # Feature flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `json` | `DataTree::to_json` / `DataTree::from_json` via `serde_json` |
//!
//! # Threading
//!
//! Packs and items are shared through `Rc`, so every type here is
//! single-threaded. One history owner performs all mutation.
//!
//! # Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use sequencer_vcs::{DeltaPack, ItemKind, Revision, RevisionItem};
//!
//! let pack = DeltaPack::shared();
//! let mut rev = Revision::create(Rc::clone(&pack), "add bassline");
//!
//! let item = RevisionItem::new(Rc::clone(&pack), ItemKind::Added, "Bass")
//!     .with_delta("notes", b"E1 E1 G1 A1".to_vec())
//!     .into_ref();
//! rev.bind_item("bass", &item);
//! rev.flush();
//!
//! // Persist and reload against the same pack
//! let bytes = sequencer_vcs::encode_tree(&rev.serialize()).unwrap();
//! let tree = sequencer_vcs::decode_tree(&bytes).unwrap();
//! let loaded = Revision::deserialize(Rc::clone(&pack), &tree);
//! assert_eq!(loaded.calculate_hash(), rev.calculate_hash());
//! ```
//!
//! Author: Moroya Sakamoto

pub mod codec;
pub mod error;
pub mod item;
pub mod keys;
pub mod merge;
pub mod pack;
pub mod revision;
pub mod tree;

pub use codec::{decode_tree, encode_tree, encoded_tree_size};
pub use error::{Error, Result};
pub use item::{ItemKind, ItemRef, RevisionItem};
pub use merge::{copy_deltas, copy_properties, copy_property, CopyOutcome, CopyStats};
pub use pack::{DeltaPack, PackKey, PackRef};
pub use revision::{LoadReport, Revision, SlotValue};
pub use tree::DataTree;
