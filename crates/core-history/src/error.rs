//! Error taxonomy for the history store.
//!
//! Two families share one enum. Programming errors (broken in-band encoding,
//! out-of-range parameters, a cursor used after an intervening write) are
//! fatal: the embedder is expected to terminate after reporting them.
//! Capacity errors are ordinary status results the caller may recover from.
//! `is_fatal` tells the two apart.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("colour pair ({foreground}, {background}) outside -2..=15")]
    InvalidColour { foreground: i16, background: i16 },

    #[error("metadata parameter {value} below the representable minimum of -2")]
    InvalidParameter { value: i16 },

    #[error("corrupt metadata record at offset {offset}: unknown kind {kind}")]
    CorruptMetadata { offset: usize, kind: u32 },

    #[error(
        "cursor invalidated by a write (captured front {captured_front} at lap \
         {captured_wraps}, store front {front} at lap {wraps})"
    )]
    CursorInvalidated {
        captured_front: usize,
        captured_wraps: u64,
        front: usize,
        wraps: u64,
    },

    #[error("cannot rewind {requested} characters, only {available} available")]
    CannotRewind { requested: usize, available: usize },

    #[error("no paragraph attribute record has passed this cursor")]
    NoParagraphAttributes,

    #[error("restore without a preceding remember")]
    NothingRemembered,
}

impl HistoryError {
    /// True for invariant violations that the embedder should treat as
    /// unrecoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HistoryError::InvalidColour { .. }
                | HistoryError::InvalidParameter { .. }
                | HistoryError::CorruptMetadata { .. }
                | HistoryError::CursorInvalidated { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_split() {
        assert!(
            HistoryError::InvalidColour {
                foreground: 99,
                background: 0
            }
            .is_fatal()
        );
        assert!(
            !HistoryError::CannotRewind {
                requested: 10,
                available: 3
            }
            .is_fatal()
        );
        assert!(!HistoryError::NoParagraphAttributes.is_fatal());
    }
}
