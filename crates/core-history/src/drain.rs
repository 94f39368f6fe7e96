//! Back-drain processor.
//!
//! Before old units are overwritten, the span about to disappear is scanned
//! so that nothing is lost silently: font/style/colour records fold into
//! `back_state`, and every PARA_ATTR that leaves the live region is reported
//! to the removal hook exactly once.
//!
//! The exactly-once bookkeeping rests on the newline cache: whenever the
//! cache is (re)established, every PARA_ATTR between `back` and the cached
//! newline — the remainder of a paragraph whose head is already gone — is
//! reported immediately. A later drain therefore stays silent for PARA_ATTR
//! records it drops before crossing the cached newline, and reports freely
//! once it has crossed it (or when no newline is cached, in which case
//! nothing was pre-reported).

use crate::codec::{ESCAPE, Metadata, NEWLINE};
use crate::error::HistoryError;
use crate::store::HistoryStore;
use tracing::trace;

impl HistoryStore {
    /// Drain at least `count` units from the back. May consume a few more
    /// when a metadata record straddles the boundary; the minimum buffer
    /// size guarantees the overshoot fits.
    pub(crate) fn drain_back(&mut self, count: usize) -> Result<(), HistoryError> {
        let limit = count.min(self.space_used());
        if limit == 0 {
            return Ok(());
        }
        let mut consumed = 0usize;
        let mut crossed_newline = self.next_newline_after_back.is_none();
        while consumed < limit {
            let unit = self.unit_at(self.back);
            if unit == ESCAPE {
                let (metadata, width) = self.decode_record_at(self.back)?;
                if let Metadata::ParagraphAttributes { a1, a2 } = metadata {
                    if crossed_newline {
                        self.fire_removal(a1, a2);
                    }
                } else {
                    metadata.apply_to(&mut self.back_state);
                }
                self.advance_back(width);
                consumed += width;
            } else {
                if unit == NEWLINE {
                    crossed_newline = true;
                }
                self.advance_back(1);
                consumed += 1;
            }
        }
        trace!(
            target: "history.store",
            window = self.window,
            drained = consumed,
            back = self.back,
            "drain_back"
        );
        if crossed_newline {
            self.next_newline_after_back = None;
            self.rescan_newline_cache(true)?;
        }
        Ok(())
    }

    /// Locate the earliest newline at or after `back` and cache it. When
    /// `report_pending` is set, PARA_ATTR records passed on the way to that
    /// newline — the tail of a partially dropped paragraph — are reported;
    /// if no newline exists the records stay live and nothing is reported.
    pub(crate) fn rescan_newline_cache(
        &mut self,
        report_pending: bool,
    ) -> Result<(), HistoryError> {
        self.next_newline_after_back = None;
        let used = self.space_used();
        let mut pos = self.back;
        let mut scanned = 0usize;
        let mut pending: Vec<(i16, i16)> = Vec::new();
        while scanned < used {
            let unit = self.unit_at(pos);
            if unit == ESCAPE {
                let (metadata, width) = self.decode_record_at(pos)?;
                if let Metadata::ParagraphAttributes { a1, a2 } = metadata {
                    pending.push((a1, a2));
                }
                pos = self.advance_offset(pos, width);
                scanned += width;
            } else if unit == NEWLINE {
                self.next_newline_after_back = Some(pos);
                if report_pending {
                    for (a1, a2) in pending {
                        self.fire_removal(a1, a2);
                    }
                }
                return Ok(());
            } else {
                pos = self.advance_offset(pos, 1);
                scanned += 1;
            }
        }
        Ok(())
    }

    pub(crate) fn fire_removal(&mut self, a1: i16, a2: i16) {
        if let Some(hook) = self.removal_hook.as_mut() {
            hook.paragraph_removed(a1, a2);
        }
    }
}
