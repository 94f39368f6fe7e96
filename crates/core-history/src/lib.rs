//! Per-window output history: a bounded, wrap-around buffer of rendered
//! character output interleaved with in-band presentation metadata, plus a
//! cursor that walks it backwards a paragraph at a time and replays forward
//! segments into a pluggable render target.
//!
//! The embedder owns one [`HistoryStore`] per window and keeps its own
//! window-number mapping. Writes go through [`HistoryStore::store_text`] and
//! [`HistoryStore::store_metadata`]; reads go through [`HistoryCursor`],
//! which borrows the store per call and is invalidated by any intervening
//! write.
//!
//! Everything here is single-threaded and runs to completion; there are no
//! locks and no suspension points.

pub mod attr;
pub mod codec;
mod cursor;
mod drain;
pub mod error;
mod store;
pub mod target;

pub use attr::{COLOUR_DEFAULT, COLOUR_MAX, COLOUR_UNDEFINED, StyleFlags, TextAttributes};
pub use codec::{CodeUnit, Metadata};
pub use cursor::{HistoryCursor, Rewind, Validation};
pub use error::HistoryError;
pub use store::{HistoryStore, ParagraphRemovalHook};
pub use target::{NullTarget, RenderTarget};
