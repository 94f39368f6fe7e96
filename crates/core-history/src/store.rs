//! Ring-buffer store: one bounded, wrap-around history per window.
//!
//! The backing array holds wide code units; presentation metadata travels
//! in-band (see `codec`). Offsets are plain indices modulo the current size;
//! `wraps` counts laps of the front and `back_laps` laps of the back, so the
//! live region is linear exactly when the two are equal. One guard unit past
//! the end of the array always holds 0.
//!
//! Design invariants:
//! * The buffer is never smaller than the largest metadata record, so a
//!   drain that has to swallow a whole straddling record can always do so.
//! * `back_state` summarises every record that has been drained;
//!   `front_state` is the state the next written unit will display under.
//! * The cached `next_newline_after_back` offset, when present, is the
//!   earliest newline at or after `back`, and every PARA_ATTR between `back`
//!   and it has already been reported to the removal hook.

use crate::attr::TextAttributes;
use crate::codec::{CodeUnit, ESCAPE, MAX_RECORD_UNITS, Metadata, check_param, encode_param};
use crate::error::HistoryError;
use tracing::{debug, trace};

/// Interval, in buffer offsets, at which explicit font/style/colour anchors
/// are forced into the stream so that backward state reconstruction stays
/// bounded.
pub(crate) const STATE_ANCHOR_INTERVAL: usize = 256;

/// Hook invoked when a PARA_ATTR-bearing paragraph leaves the live region.
/// Implementations must not call back into the store.
pub trait ParagraphRemovalHook {
    fn paragraph_removed(&mut self, a1: i16, a2: i16);
}

impl<F: FnMut(i16, i16)> ParagraphRemovalHook for F {
    fn paragraph_removed(&mut self, a1: i16, a2: i16) {
        self(a1, a2)
    }
}

pub struct HistoryStore {
    pub(crate) window: u8,
    pub(crate) buffer: Vec<CodeUnit>,
    /// Usable units; the allocation is one unit larger (guard cell).
    pub(crate) size: usize,
    pub(crate) max_size: usize,
    pub(crate) increment: usize,
    pub(crate) front: usize,
    pub(crate) back: usize,
    pub(crate) wraps: u64,
    pub(crate) back_laps: u64,
    pub(crate) front_state: TextAttributes,
    pub(crate) back_state: TextAttributes,
    last_block_index: usize,
    pub(crate) next_newline_after_back: Option<usize>,
    pub(crate) removal_hook: Option<Box<dyn ParagraphRemovalHook>>,
}

impl HistoryStore {
    /// Create an empty store for `window`. Nothing is allocated until the
    /// first write. Both running states start as `attrs`. The size limit is
    /// clamped so a full metadata record always fits; the growth increment
    /// is clamped into `1..=max_size`.
    pub fn new(window: u8, max_size: usize, increment: usize, attrs: TextAttributes) -> Self {
        let max_size = max_size.max(MAX_RECORD_UNITS);
        let increment = increment.clamp(1, max_size);
        Self {
            window,
            buffer: Vec::new(),
            size: 0,
            max_size,
            increment,
            front: 0,
            back: 0,
            wraps: 0,
            back_laps: 0,
            front_state: attrs,
            back_state: attrs,
            last_block_index: 0,
            next_newline_after_back: None,
            removal_hook: None,
        }
    }

    /// Register the per-store paragraph-removal hook. Replaces any previous
    /// hook.
    pub fn set_removal_hook(&mut self, hook: Box<dyn ParagraphRemovalHook>) {
        self.removal_hook = Some(hook);
    }

    pub fn window(&self) -> u8 {
        self.window
    }

    /// Currently allocated usable size in units.
    pub fn allocated_size(&self) -> usize {
        self.size
    }

    pub fn front_state(&self) -> TextAttributes {
        self.front_state
    }

    pub fn back_state(&self) -> TextAttributes {
        self.back_state
    }

    pub(crate) fn is_linear(&self) -> bool {
        self.wraps == self.back_laps
    }

    pub fn space_used(&self) -> usize {
        if self.is_linear() {
            self.front - self.back
        } else {
            self.size - (self.back - self.front)
        }
    }

    pub fn space_available(&self) -> usize {
        self.size - self.space_used()
    }

    pub(crate) fn unit_at(&self, pos: usize) -> CodeUnit {
        self.buffer[pos]
    }

    pub(crate) fn advance_offset(&self, pos: usize, n: usize) -> usize {
        (pos + n) % self.size
    }

    /// Offset of `pos` from `back` in live-region order.
    pub(crate) fn live_offset(&self, pos: usize) -> usize {
        (pos + self.size - self.back) % self.size
    }

    /// Units between `pos` (inclusive) and the front. Callers disambiguate
    /// the full-buffer `pos == front` case themselves.
    pub(crate) fn units_ahead_of(&self, pos: usize) -> usize {
        self.space_used() - self.live_offset(pos)
    }

    /// Backward wrap allowance for a walker standing at `pos`: 1 while the
    /// position is on the front's lap of a wrapped region, 0 otherwise.
    pub(crate) fn wrap_allowance_at(&self, pos: usize) -> u32 {
        u32::from(!self.is_linear() && pos < self.back)
    }

    /// Step a backward walker one unit, consuming the wrap allowance at the
    /// origin and refusing to cross the back. `None` means the live-region
    /// end was reached and the walker stays put.
    pub(crate) fn decrement_offset(&self, pos: usize, wrap_allowance: &mut u32) -> Option<usize> {
        let next = if pos == 0 {
            if *wrap_allowance == 0 {
                return None;
            }
            *wrap_allowance -= 1;
            self.size - 1
        } else {
            pos - 1
        };
        if *wrap_allowance == 0 && next < self.back {
            return None;
        }
        Some(next)
    }

    fn advance_front(&mut self, n: usize) {
        self.front += n;
        if self.front >= self.size {
            self.front -= self.size;
            self.wraps += 1;
            trace!(target: "history.store", window = self.window, wraps = self.wraps, "front_wrapped");
        }
    }

    pub(crate) fn advance_back(&mut self, n: usize) {
        self.back += n;
        if self.back >= self.size {
            self.back -= self.size;
            self.back_laps += 1;
        }
    }

    /// Decode the record whose escape unit sits at `escape_pos`. Reads are
    /// modular; records may straddle the physical end of the array. The
    /// fourth unit read is ignored for three-unit records.
    pub(crate) fn decode_record_at(
        &self,
        escape_pos: usize,
    ) -> Result<(Metadata, usize), HistoryError> {
        let units = [
            self.unit_at(escape_pos),
            self.unit_at(self.advance_offset(escape_pos, 1)),
            self.unit_at(self.advance_offset(escape_pos, 2)),
            self.unit_at(self.advance_offset(escape_pos, 3)),
        ];
        Metadata::decode(&units, escape_pos)
    }

    /// Attempt to reallocate to `min(target, max_size)` usable units plus
    /// the guard cell. When the live region wraps, the tail segment is
    /// rebased to the new end so no data is lost. Returns whether the size
    /// changed.
    pub(crate) fn try_grow(&mut self, target: usize) -> bool {
        // Never allocate less than one full metadata record.
        let new_size = target.min(self.max_size).max(MAX_RECORD_UNITS);
        if new_size <= self.size {
            return false;
        }
        let old_size = self.size;
        self.buffer.resize(new_size + 1, 0);
        if !self.is_linear() {
            let delta = new_size - old_size;
            self.buffer.copy_within(self.back..old_size, self.back + delta);
            if let Some(p) = self.next_newline_after_back {
                if p >= self.back {
                    self.next_newline_after_back = Some(p + delta);
                }
            }
            self.back += delta;
        }
        self.size = new_size;
        trace!(
            target: "history.store",
            window = self.window,
            old = old_size,
            new = new_size,
            "grow"
        );
        true
    }

    /// Store a string's code units with the state-block tick enabled. Units
    /// with the reserved escape value are dropped; text never contains them.
    pub fn store_text(&mut self, text: &str) -> Result<(), HistoryError> {
        let units: Vec<CodeUnit> = text
            .chars()
            .map(|c| c as CodeUnit)
            .filter(|&u| u != ESCAPE)
            .collect();
        self.store_chars(&units, true)
    }

    /// Emit a presentation record into the stream and track it in
    /// `front_state`. Parameters are validated before anything is written.
    pub fn store_metadata(&mut self, metadata: Metadata) -> Result<(), HistoryError> {
        let mut units = [0; MAX_RECORD_UNITS];
        let width = metadata.encode(&mut units)?;
        // The state-block tick stays off: metadata writes must not trigger
        // further metadata writes.
        self.store_chars(&units[..width], false)?;
        metadata.apply_to(&mut self.front_state);
        Ok(())
    }

    /// Sole ingestion path. Grows the buffer in increments when the data
    /// does not fit, drains the back where old units get overwritten, and
    /// runs the state-block policy at every anchor boundary the write
    /// crosses.
    pub(crate) fn store_chars(
        &mut self,
        data: &[CodeUnit],
        evaluate_state_block: bool,
    ) -> Result<(), HistoryError> {
        if data.is_empty() {
            return Ok(());
        }
        if data.len() >= self.max_size {
            return self.store_oversized(data);
        }
        let mut data = data;
        if self.space_available() < data.len() {
            let needed = data.len() - self.space_available();
            let steps = needed.div_ceil(self.increment);
            self.try_grow(self.size + steps * self.increment);
        }
        if data.len() > self.size {
            // Allocation shortfall; the head of the input is silently
            // dropped.
            data = &data[data.len() - self.size..];
        }
        let mut rest = data;
        while !rest.is_empty() {
            let mut stretch = (self.size - self.front).min(rest.len());
            if evaluate_state_block {
                // Stop at the next anchor boundary so a large write stamps
                // every block it crosses, not just the last one.
                let to_boundary = STATE_ANCHOR_INTERVAL - self.front % STATE_ANCHOR_INTERVAL;
                stretch = stretch.min(to_boundary);
            }
            let available = self.space_available();
            if stretch > available {
                self.drain_back(stretch - available)?;
            }
            let (chunk, tail) = rest.split_at(stretch);
            self.buffer[self.front..self.front + stretch].copy_from_slice(chunk);
            self.advance_front(stretch);
            rest = tail;
            if evaluate_state_block {
                self.evaluate_state_block()?;
            }
        }
        Ok(())
    }

    /// The incoming data is at least as large as the whole buffer: drop
    /// everything currently stored, grow to the limit, and keep only the
    /// tail of the input.
    fn store_oversized(&mut self, data: &[CodeUnit]) -> Result<(), HistoryError> {
        self.drain_back(self.space_used())?;
        if self.size < self.max_size {
            self.try_grow(self.max_size);
        }
        let tail = &data[data.len() - self.size..];
        self.buffer[..self.size].copy_from_slice(tail);
        self.back = 0;
        self.front = 0;
        self.wraps += 1;
        self.last_block_index = 0;
        self.next_newline_after_back = None;
        self.rescan_newline_cache(true)?;
        debug!(
            target: "history.store",
            window = self.window,
            dropped = data.len() - self.size,
            "oversized_write"
        );
        Ok(())
    }

    /// State-block policy: once the front has crossed into a new
    /// `STATE_ANCHOR_INTERVAL` block, force explicit font, style and colour
    /// records carrying the current `back_state`, so that any backward scan
    /// finds an anchor for each attribute within one block.
    fn evaluate_state_block(&mut self) -> Result<(), HistoryError> {
        let block = self.front / STATE_ANCHOR_INTERVAL;
        if block == self.last_block_index {
            return Ok(());
        }
        self.last_block_index = block;
        let state = self.back_state;
        let records = [
            Metadata::Font(state.font),
            Metadata::Style(state.style),
            Metadata::Colour {
                foreground: state.foreground,
                background: state.background,
            },
        ];
        let mut units = [0; MAX_RECORD_UNITS];
        for record in records {
            let width = record.encode(&mut units)?;
            self.store_chars(&units[..width], false)?;
        }
        trace!(target: "history.store", window = self.window, block, "state_anchors");
        Ok(())
    }

    /// Truncate the newest `count` logical characters. Metadata records
    /// crossed by the truncation do not count as characters; records older
    /// than the cut survive untouched. Fails without side effects when
    /// fewer than `count` characters are stored.
    pub fn remove_chars(&mut self, count: usize) -> Result<(), HistoryError> {
        if count == 0 {
            return Ok(());
        }
        // The stream is only self-synchronising in the forward direction,
        // and removal (expunging preloaded input) is rare, so two forward
        // passes beat a heuristic backward walk.
        let used = self.space_used();
        let mut logical = 0usize;
        let mut pos = self.back;
        let mut scanned = 0usize;
        while scanned < used {
            if self.unit_at(pos) == ESCAPE {
                let (_, width) = self.decode_record_at(pos)?;
                pos = self.advance_offset(pos, width);
                scanned += width;
            } else {
                pos = self.advance_offset(pos, 1);
                scanned += 1;
                logical += 1;
            }
        }
        if logical < count {
            return Err(HistoryError::CannotRewind {
                requested: count,
                available: logical,
            });
        }
        let keep = logical - count;
        let mut pos = self.back;
        let mut lap = self.back_laps;
        let mut scanned = 0usize;
        let mut seen = 0usize;
        while scanned < used {
            if self.unit_at(pos) == ESCAPE {
                let (_, width) = self.decode_record_at(pos)?;
                scanned += width;
                let next = pos + width;
                if next >= self.size {
                    lap += 1;
                }
                pos = next % self.size;
            } else {
                if seen == keep {
                    break;
                }
                seen += 1;
                scanned += 1;
                let next = pos + 1;
                if next >= self.size {
                    lap += 1;
                }
                pos = next % self.size;
            }
        }
        self.front = pos;
        self.wraps = lap;
        if let Some(p) = self.next_newline_after_back {
            if self.live_offset(p) >= self.space_used() {
                self.next_newline_after_back = None;
            }
        }
        trace!(
            target: "history.store",
            window = self.window,
            removed = count,
            front = self.front,
            "remove_chars"
        );
        Ok(())
    }

    /// Copy of the live region in order, oldest first. Diagnostic accessor;
    /// the in-band records come out verbatim.
    pub fn live_units(&self) -> Vec<CodeUnit> {
        let used = self.space_used();
        let mut units = Vec::with_capacity(used);
        let mut pos = self.back;
        for _ in 0..used {
            units.push(self.unit_at(pos));
            pos = self.advance_offset(pos, 1);
        }
        units
    }

    /// Overwrite the two parameter units of a PARA_ATTR record in place.
    pub(crate) fn patch_paragraph_attributes(
        &mut self,
        first_param_offset: usize,
        a1: i16,
        a2: i16,
    ) -> Result<(), HistoryError> {
        check_param(a1)?;
        check_param(a2)?;
        let second = self.advance_offset(first_param_offset, 1);
        self.buffer[first_param_offset] = encode_param(a1);
        self.buffer[second] = encode_param(a2);
        Ok(())
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("window", &self.window)
            .field("size", &self.size)
            .field("max_size", &self.max_size)
            .field("front", &self.front)
            .field("back", &self.back)
            .field("wraps", &self.wraps)
            .field("back_laps", &self.back_laps)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{StyleFlags, TextAttributes};

    fn store(max: usize, inc: usize) -> HistoryStore {
        HistoryStore::new(0, max, inc, TextAttributes::default())
    }

    #[test]
    fn starts_unallocated() {
        let s = store(64, 16);
        assert_eq!(s.allocated_size(), 0);
        assert_eq!(s.space_used(), 0);
        assert_eq!(s.space_available(), 0);
    }

    #[test]
    fn grows_in_increments() {
        let mut s = store(64, 16);
        s.store_text("abc").unwrap();
        assert_eq!(s.allocated_size(), 16);
        assert_eq!(s.space_used(), 3);
        s.store_text(&"x".repeat(20)).unwrap();
        assert_eq!(s.allocated_size(), 32);
        assert_eq!(s.space_used(), 23);
    }

    #[test]
    fn growth_clamps_at_limit() {
        let mut s = store(20, 16);
        s.store_text(&"y".repeat(18)).unwrap();
        assert_eq!(s.allocated_size(), 20);
        assert_eq!(s.space_used(), 18);
    }

    #[test]
    fn wraps_and_overwrites_oldest() {
        let mut s = store(8, 8);
        s.store_text("abcdefgh").unwrap();
        assert_eq!(s.space_used(), 8);
        assert_eq!(s.space_available(), 0);
        s.store_text("ij").unwrap();
        assert_eq!(s.space_used(), 8);
        // oldest two units gone, newest two present
        assert_eq!(live_text(&s), "cdefghij");
    }

    fn live_text(s: &HistoryStore) -> String {
        s.live_units()
            .into_iter()
            .map(|u| char::from_u32(u).unwrap())
            .collect()
    }

    #[test]
    fn oversized_write_keeps_tail() {
        let mut s = store(8, 8);
        s.store_text("0123456789abcdef").unwrap();
        assert_eq!(s.space_used(), 8);
        assert!(!s.is_linear());
        assert_eq!(live_text(&s), "89abcdef");
    }

    #[test]
    fn metadata_tracks_front_state() {
        let mut s = store(64, 16);
        s.store_metadata(Metadata::Colour {
            foreground: 4,
            background: 2,
        })
        .unwrap();
        s.store_metadata(Metadata::Style(StyleFlags::BOLD)).unwrap();
        assert_eq!(s.front_state().foreground, 4);
        assert_eq!(s.front_state().background, 2);
        assert_eq!(s.front_state().style, StyleFlags::BOLD);
        // undefined colour inherits
        s.store_metadata(Metadata::Colour {
            foreground: -2,
            background: 7,
        })
        .unwrap();
        assert_eq!(s.front_state().foreground, 4);
        assert_eq!(s.front_state().background, 7);
    }

    #[test]
    fn remove_chars_exact() {
        let mut s = store(64, 16);
        s.store_text("hello world").unwrap();
        let front_before = s.front;
        s.remove_chars(5).unwrap();
        assert_eq!(s.space_used(), 6);
        s.store_text("earth").unwrap();
        assert_eq!(s.front, front_before);
    }

    #[test]
    fn remove_chars_skips_metadata() {
        let mut s = store(64, 16);
        s.store_text("ab").unwrap();
        s.store_metadata(Metadata::Font(2)).unwrap();
        s.store_text("cd").unwrap();
        // removing three characters crosses the font record without
        // counting it
        s.remove_chars(3).unwrap();
        assert_eq!(s.space_used(), 1);
        let err = s.remove_chars(2).unwrap_err();
        assert_eq!(
            err,
            HistoryError::CannotRewind {
                requested: 2,
                available: 1
            }
        );
    }

    #[test]
    fn grow_preserves_wrapped_region() {
        let mut s = store(32, 8);
        s.store_text("abcdefgh").unwrap(); // fills the initial 8, front wraps
        s.store_text("ij").unwrap(); // growth rebases the wrapped tail
        assert!(!s.is_linear());
        s.store_text("klmnop").unwrap(); // fills the grown buffer
        assert!(live_text(&s).ends_with("cdefghijklmnop"));
    }
}
