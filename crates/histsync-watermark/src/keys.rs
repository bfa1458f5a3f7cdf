//! Watermark key layout.
//!
//! Every originator owns exactly one key, derived deterministically from its
//! identifier:
//!
//! ```text
//! lastHistoryTransactionTimeStamp-{originator}
//! ```
//!
//! Because [`OriginatorId`] forbids path separators and whitespace, the key
//! is also a safe file name for [`crate::FileWatermarkStore`].

use histsync_types::OriginatorId;

use crate::error::{Result, WatermarkError};

/// Prefix shared by every watermark key.
pub const WATERMARK_KEY_PREFIX: &str = "lastHistoryTransactionTimeStamp-";

/// Derive the storage key for an originator's watermark.
///
/// # Examples
///
/// ```
/// use histsync_types::OriginatorId;
/// use histsync_watermark::keys::watermark_key;
///
/// let id = OriginatorId::new("ios").unwrap();
/// assert_eq!(watermark_key(&id), "lastHistoryTransactionTimeStamp-ios");
/// ```
pub fn watermark_key(originator: &OriginatorId) -> String {
    format!("{WATERMARK_KEY_PREFIX}{originator}")
}

/// Recover the originator identifier from a watermark key.
pub fn originator_from_key(key: &str) -> Result<OriginatorId> {
    let invalid = || WatermarkError::InvalidKey {
        key: key.to_string(),
    };
    let id = key.strip_prefix(WATERMARK_KEY_PREFIX).ok_or_else(invalid)?;
    OriginatorId::new(id).map_err(|_| invalid())
}
