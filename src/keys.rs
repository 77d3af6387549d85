//! Persisted-format identifiers
//!
//! Node tags and property names shared by the revision, item and pack
//! serializers.
//!
//! Author: Moroya Sakamoto

// ── Node tags ──────────────────────────────────────────────────────────

pub const REVISION: &str = "revision";
pub const REVISION_ITEM: &str = "revisionItem";
pub const DELTA: &str = "delta";
pub const PACK: &str = "pack";
pub const PACK_ENTRY: &str = "packEntry";

// ── Revision properties ────────────────────────────────────────────────

pub const COMMIT_ID: &str = "commitId";
pub const COMMIT_MESSAGE: &str = "commitMessage";
pub const COMMIT_TIME_STAMP: &str = "commitTimeStamp";
pub const COMMIT_VERSION: &str = "commitVersion";

// ── Item / delta properties ────────────────────────────────────────────

pub const ITEM_ID: &str = "itemId";
pub const ITEM_TYPE: &str = "itemType";
pub const ITEM_NAME: &str = "itemName";
pub const DELTA_ID: &str = "deltaId";
pub const DELTA_NAME: &str = "deltaName";
pub const DELTA_DATA: &str = "deltaData";
