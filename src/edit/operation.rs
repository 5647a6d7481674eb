//! Archive modification operations.

use crate::content::ContentValue;
use crate::entry::EntryMetadata;

/// What a rebuild does after replaying the kept entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Append the replacement and new entries.
    Update,
    /// Append nothing.
    Delete,
}

/// A pending modification of an archive.
#[derive(Debug)]
pub enum Operation<'a> {
    /// Drop every entry with this name.
    Delete {
        /// Entry name; a trailing slash is ignored.
        name: String,
    },
    /// Replace every entry at `meta.path` (or add one if there is none).
    ///
    /// The new entry is appended after all kept entries.
    Put {
        /// Metadata of the new entry.
        meta: EntryMetadata,
        /// Its content.
        content: ContentValue<'a>,
    },
}

impl Operation<'_> {
    /// Returns the entry name this operation targets.
    pub fn target(&self) -> &str {
        match self {
            Operation::Delete { name } => name,
            Operation::Put { meta, .. } => meta.path(),
        }
    }

    /// Returns the operation type as a string.
    pub fn operation_type(&self) -> &'static str {
        match self {
            Operation::Delete { .. } => "delete",
            Operation::Put { .. } => "put",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_target() {
        let op = Operation::Delete {
            name: "old.txt".into(),
        };
        assert_eq!(op.target(), "old.txt");
        assert_eq!(op.operation_type(), "delete");

        let op = Operation::Put {
            meta: EntryMetadata::file("dir/new.txt").unwrap(),
            content: ContentValue::text("x"),
        };
        assert_eq!(op.target(), "dir/new.txt");
        assert_eq!(op.operation_type(), "put");
    }
}
