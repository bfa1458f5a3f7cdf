use std::collections::HashSet;

use histsync_types::Originator;

use crate::error::{Result, SyncError};

/// Check that a roster can drive synchronization.
///
/// Every identifier must be unique, and the current originator must be
/// listed. Runs once, when a processor is constructed.
pub fn validate_roster(current: &Originator) -> Result<()> {
    let roster = current.roster();
    let unique: HashSet<_> = roster.iter().collect();

    if unique.len() < roster.len() {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for id in roster {
            if !seen.insert(id) && !duplicates.contains(id) {
                duplicates.push(id.clone());
            }
        }
        return Err(SyncError::DuplicateOriginatorIdentifier { duplicates });
    }

    if !current.roster_includes_self() {
        return Err(SyncError::OriginatorNotInRoster {
            originator: current.id().clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use histsync_types::OriginatorId;

    fn id(s: &str) -> OriginatorId {
        OriginatorId::new(s).unwrap()
    }

    #[test]
    fn distinct_roster_is_valid() {
        let current = Originator::new(id("a"), vec![id("a"), id("b")]);
        assert!(validate_roster(&current).is_ok());
    }

    #[test]
    fn single_writer_roster_is_valid() {
        let current = Originator::new(id("a"), vec![id("a")]);
        assert!(validate_roster(&current).is_ok());
    }

    #[test]
    fn duplicates_are_named_once() {
        let current = Originator::new(id("a"), vec![id("a"), id("b"), id("a"), id("a")]);
        match validate_roster(&current) {
            Err(SyncError::DuplicateOriginatorIdentifier { duplicates }) => {
                assert_eq!(duplicates, vec![id("a")]);
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn missing_self_is_rejected() {
        let current = Originator::new(id("c"), vec![id("a"), id("b")]);
        assert!(matches!(
            validate_roster(&current),
            Err(SyncError::OriginatorNotInRoster { .. })
        ));
    }
}
