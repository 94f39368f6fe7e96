//! Read-side cursor: paragraph-granular backward walks and forward replay.
//!
//! A cursor snapshots the store's `(wraps, front)` at creation. Any write
//! that moves either one invalidates the cursor; the next operation fails
//! with a fatal error unless validation was disabled at construction (the
//! mode used for the one cursor that is deliberately driven between
//! writes). Cursor operations borrow the store per call, so a cursor can
//! never dangle.

use crate::attr::{COLOUR_UNDEFINED, TextAttributes};
use crate::codec::{ESCAPE, Metadata, NEWLINE};
use crate::error::HistoryError;
use crate::store::HistoryStore;
use crate::target::RenderTarget;
use tracing::trace;

/// Replay staging size in code units; text is flushed to the target in runs
/// no longer than this.
const STAGING_UNITS: usize = 1280;

/// Whether a cursor checks the store's `(wraps, front)` against its
/// snapshot on every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Enforced,
    Disabled,
}

/// Outcome of a backward paragraph walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewind {
    /// A paragraph was delivered; `char_count` counts text units only, and
    /// `attributes` carries the parameters of a PARA_ATTR record crossed
    /// inside the paragraph, if any.
    Paragraph {
        char_count: usize,
        attributes: Option<(i16, i16)>,
    },
    /// The live-region end had already been reached by an earlier call.
    Start,
}

/// Everything `remember`/`restore` snapshots.
#[derive(Debug, Clone, Copy)]
struct CursorState {
    /// Position of the backward walk; after a delivered paragraph this is
    /// the newline terminating the paragraph before it.
    pos: usize,
    /// Start of the paragraph the cursor currently points at.
    paragraph_index: usize,
    wrap_allowance: u32,
    found_end_of_buffer: bool,
    first_iteration_done: bool,
    /// The walk sits on a boundary newline that must be stepped over before
    /// the next backward count begins.
    boundary_newline_pending: bool,
    newline_terminated: bool,
    state_evaluated: bool,
    at_front: bool,
    attrs: TextAttributes,
    /// Last full state evaluation, keyed by the exact paragraph index.
    eval_cache: Option<(usize, TextAttributes)>,
    /// Offset of the first parameter unit of the last PARA_ATTR crossed.
    last_paragraph_attribute_index: Option<usize>,
}

pub struct HistoryCursor {
    captured_wraps: u64,
    captured_front: usize,
    validate: bool,
    state: CursorState,
    saved: Option<CursorState>,
}

impl HistoryCursor {
    /// Cursor positioned just before the front, seeded from `front_state`.
    /// The usual starting point for walking backwards through recent
    /// output.
    pub fn from_front(store: &HistoryStore, validation: Validation) -> Self {
        let used = store.space_used();
        let (pos, found_end) = if used == 0 {
            (store.front, true)
        } else {
            let pos = (store.front + store.size - 1) % store.size;
            (pos, false)
        };
        let wrap_allowance = if used == 0 {
            0
        } else {
            store.wrap_allowance_at(pos)
        };
        Self {
            captured_wraps: store.wraps,
            captured_front: store.front,
            validate: matches!(validation, Validation::Enforced),
            state: CursorState {
                pos,
                paragraph_index: store.front,
                wrap_allowance,
                found_end_of_buffer: found_end,
                first_iteration_done: false,
                boundary_newline_pending: false,
                newline_terminated: false,
                state_evaluated: true,
                at_front: true,
                attrs: store.front_state,
                eval_cache: None,
                last_paragraph_attribute_index: None,
            },
            saved: None,
        }
    }

    /// Cursor positioned at the oldest stored unit, seeded from
    /// `back_state`; used to replay the whole live region forward.
    pub fn from_back(store: &HistoryStore, validation: Validation) -> Self {
        Self {
            captured_wraps: store.wraps,
            captured_front: store.front,
            validate: matches!(validation, Validation::Enforced),
            state: CursorState {
                pos: store.back,
                paragraph_index: store.back,
                wrap_allowance: 0,
                found_end_of_buffer: true,
                first_iteration_done: true,
                boundary_newline_pending: false,
                newline_terminated: false,
                state_evaluated: true,
                at_front: store.space_used() == 0,
                attrs: store.back_state,
                eval_cache: None,
                last_paragraph_attribute_index: None,
            },
            saved: None,
        }
    }

    fn check(&self, store: &HistoryStore) -> Result<(), HistoryError> {
        if self.validate
            && (store.wraps != self.captured_wraps || store.front != self.captured_front)
        {
            return Err(HistoryError::CursorInvalidated {
                captured_front: self.captured_front,
                captured_wraps: self.captured_wraps,
                front: store.front,
                wraps: store.wraps,
            });
        }
        Ok(())
    }

    /// Presentation state at the cursor's current paragraph.
    pub fn attributes(&self) -> TextAttributes {
        self.state.attrs
    }

    /// Whether the final paragraph of the buffer carried its newline when
    /// the first backward walk looked at it.
    pub fn last_paragraph_newline_terminated(&self) -> bool {
        self.state.newline_terminated
    }

    /// Start offset of the paragraph the cursor points at.
    pub fn paragraph_index(&self) -> usize {
        self.state.paragraph_index
    }

    /// True when the cursor points at the write position — nothing ahead to
    /// replay.
    pub fn at_front(&self, store: &HistoryStore) -> Result<bool, HistoryError> {
        self.check(store)?;
        Ok(self.state.at_front)
    }

    pub fn remember(&mut self, store: &HistoryStore) -> Result<(), HistoryError> {
        self.check(store)?;
        self.saved = Some(self.state);
        Ok(())
    }

    pub fn restore(&mut self, store: &HistoryStore) -> Result<(), HistoryError> {
        self.check(store)?;
        self.state = self.saved.ok_or(HistoryError::NothingRemembered)?;
        Ok(())
    }

    /// Walk backward to the start of the previous paragraph. Returns the
    /// paragraph's logical character count and any PARA_ATTR parameters
    /// crossed on the way; `Rewind::Start` once the live-region end has
    /// been delivered.
    pub fn rewind_paragraph(&mut self, store: &HistoryStore) -> Result<Rewind, HistoryError> {
        self.check(store)?;
        if self.state.found_end_of_buffer {
            return Ok(Rewind::Start);
        }
        let mut char_count = 0usize;
        let mut attributes: Option<(i16, i16)> = None;

        if !self.state.first_iteration_done {
            self.state.first_iteration_done = true;
            if store.unit_at(self.state.pos) == NEWLINE {
                self.state.newline_terminated = true;
                if !self.step_back(store) {
                    // The buffer holds a single newline: one empty,
                    // terminated paragraph.
                    self.state.paragraph_index = self.state.pos;
                    return self.deliver(store, 0, None);
                }
            } else {
                self.state.newline_terminated = false;
            }
        } else if self.state.boundary_newline_pending {
            self.state.boundary_newline_pending = false;
            if !self.step_back(store) {
                // Empty paragraph at the very start of the buffer.
                self.state.paragraph_index = self.state.pos;
                return self.deliver(store, 0, None);
            }
        }

        loop {
            let unit = store.unit_at(self.state.pos);
            if unit == NEWLINE {
                self.state.paragraph_index = store.advance_offset(self.state.pos, 1);
                self.state.boundary_newline_pending = true;
                break;
            }
            if unit == ESCAPE {
                // The walk counted this record's kind and parameter units
                // as characters on the way down; take them back.
                let (metadata, width) = store.decode_record_at(self.state.pos)?;
                debug_assert!(char_count >= width - 1);
                char_count -= width - 1;
                if let Metadata::ParagraphAttributes { a1, a2 } = metadata {
                    attributes = Some((a1, a2));
                    self.state.last_paragraph_attribute_index =
                        Some(store.advance_offset(self.state.pos, 2));
                }
            } else {
                char_count += 1;
            }
            if !self.step_back(store) {
                self.state.found_end_of_buffer = true;
                self.state.paragraph_index = self.state.pos;
                self.state.boundary_newline_pending = false;
                break;
            }
        }
        self.deliver(store, char_count, attributes)
    }

    fn deliver(
        &mut self,
        store: &HistoryStore,
        char_count: usize,
        attributes: Option<(i16, i16)>,
    ) -> Result<Rewind, HistoryError> {
        self.state.at_front = false;
        self.state.state_evaluated = false;
        self.evaluate_state(store)?;
        trace!(
            target: "history.cursor",
            window = store.window,
            paragraph_index = self.state.paragraph_index,
            char_count,
            "rewind_paragraph"
        );
        Ok(Rewind::Paragraph {
            char_count,
            attributes,
        })
    }

    fn step_back(&mut self, store: &HistoryStore) -> bool {
        match store.decrement_offset(self.state.pos, &mut self.state.wrap_allowance) {
            Some(p) => {
                self.state.pos = p;
                true
            }
            None => {
                self.state.found_end_of_buffer = true;
                false
            }
        }
    }

    /// Reconstruct the presentation state in effect at the current
    /// paragraph's start. The state-block policy bounds the backward walk;
    /// anything still unresolved at the live-region end falls back to
    /// `back_state`, except that an undefined background falls through to
    /// `front_state`'s background.
    fn evaluate_state(&mut self, store: &HistoryStore) -> Result<(), HistoryError> {
        if self.state.state_evaluated {
            return Ok(());
        }
        let index = self.state.paragraph_index;
        if let Some((key, attrs)) = self.state.eval_cache {
            if key == index {
                self.state.attrs = attrs;
                self.state.state_evaluated = true;
                return Ok(());
            }
        }
        let mut font: Option<i16> = None;
        let mut style = None;
        let mut foreground: Option<i16> = None;
        let mut background: Option<i16> = None;
        if store.space_used() > 0 {
            let mut pos = index;
            let mut allowance = store.wrap_allowance_at(pos);
            loop {
                if store.unit_at(pos) == ESCAPE {
                    match store.decode_record_at(pos)?.0 {
                        Metadata::Font(f) => font = font.or(Some(f)),
                        Metadata::Style(s) => style = style.or(Some(s)),
                        Metadata::Colour {
                            foreground: fg,
                            background: bg,
                        } => {
                            if fg != COLOUR_UNDEFINED {
                                foreground = foreground.or(Some(fg));
                            }
                            if bg != COLOUR_UNDEFINED {
                                background = background.or(Some(bg));
                            }
                        }
                        Metadata::ParagraphAttributes { .. } => {}
                    }
                    if font.is_some()
                        && style.is_some()
                        && foreground.is_some()
                        && background.is_some()
                    {
                        break;
                    }
                }
                match store.decrement_offset(pos, &mut allowance) {
                    Some(p) => pos = p,
                    None => break,
                }
            }
        }
        let fallback_bg = if store.back_state.background == COLOUR_UNDEFINED {
            store.front_state.background
        } else {
            store.back_state.background
        };
        let attrs = TextAttributes {
            font: font.unwrap_or(store.back_state.font),
            style: style.unwrap_or(store.back_state.style),
            foreground: foreground.unwrap_or(store.back_state.foreground),
            background: background.unwrap_or(fallback_bg),
        };
        self.state.attrs = attrs;
        self.state.eval_cache = Some((index, attrs));
        self.state.state_evaluated = true;
        Ok(())
    }

    /// Replay up to `paragraphs` paragraphs forward from the current
    /// paragraph start into `target`, beginning with an unconditional state
    /// synchronisation. Returns the number of paragraphs that were not
    /// delivered. With `advance`, the cursor moves to the position after
    /// the consumed paragraphs.
    pub fn repeat_paragraphs(
        &mut self,
        store: &HistoryStore,
        target: &mut dyn RenderTarget,
        paragraphs: usize,
        include_metadata: bool,
        advance: bool,
    ) -> Result<usize, HistoryError> {
        self.check(store)?;
        self.evaluate_state(store)?;
        let mut attrs = self.state.attrs;
        target.set_font(attrs.font);
        target.set_text_style(attrs.style);
        target.set_colour(attrs.foreground, attrs.background, -1);

        let mut remaining = paragraphs;
        let mut pos = self.state.paragraph_index;
        let mut last_attribute = self.state.last_paragraph_attribute_index;
        let start_ahead = if self.state.at_front {
            0
        } else {
            store.units_ahead_of(pos)
        };
        let mut ahead = start_ahead;
        let mut staging = String::new();
        let mut staged = 0usize;

        while remaining > 0 && ahead > 0 {
            let unit = store.unit_at(pos);
            if unit == ESCAPE {
                flush(target, &mut staging, &mut staged);
                let (metadata, width) = store.decode_record_at(pos)?;
                if let Metadata::ParagraphAttributes { .. } = metadata {
                    last_attribute = Some(store.advance_offset(pos, 2));
                } else {
                    metadata.apply_to(&mut attrs);
                    if include_metadata {
                        match metadata {
                            Metadata::Font(f) => target.set_font(f),
                            Metadata::Style(s) => target.set_text_style(s),
                            Metadata::Colour {
                                foreground,
                                background,
                            } => target.set_colour(foreground, background, -1),
                            Metadata::ParagraphAttributes { .. } => {}
                        }
                    }
                }
                pos = store.advance_offset(pos, width);
                ahead -= width;
            } else if unit == NEWLINE {
                staging.push('\n');
                staged += 1;
                flush(target, &mut staging, &mut staged);
                remaining -= 1;
                pos = store.advance_offset(pos, 1);
                ahead -= 1;
            } else {
                staging.push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER));
                staged += 1;
                if staged >= STAGING_UNITS {
                    flush(target, &mut staging, &mut staged);
                }
                pos = store.advance_offset(pos, 1);
                ahead -= 1;
            }
        }
        flush(target, &mut staging, &mut staged);

        // The running state always tracks what was replayed.
        self.state.attrs = attrs;
        self.state.last_paragraph_attribute_index = last_attribute;

        if advance && ahead != start_ahead {
            self.state.paragraph_index = pos;
            self.state.state_evaluated = true;
            self.state.found_end_of_buffer = false;
            if ahead == 0 {
                // Landed on the front: the cursor behaves like a fresh
                // front cursor again.
                self.state.at_front = true;
                self.state.first_iteration_done = false;
                self.state.boundary_newline_pending = false;
                self.state.pos = pos;
                let last = (store.front + store.size - 1) % store.size;
                self.state.newline_terminated = store.unit_at(last) == NEWLINE;
                self.state.found_end_of_buffer = store.space_used() == 0;
            } else {
                self.state.at_front = false;
                let boundary = (pos + store.size - 1) % store.size;
                self.state.pos = boundary;
                self.state.wrap_allowance = store.wrap_allowance_at(boundary);
                self.state.boundary_newline_pending = store.unit_at(boundary) == NEWLINE;
                self.state.first_iteration_done = true;
            }
        }
        trace!(
            target: "history.cursor",
            window = store.window,
            requested = paragraphs,
            undelivered = remaining,
            advance,
            "repeat_paragraphs"
        );
        Ok(remaining)
    }

    /// Overwrite, in place, the parameters of the last PARA_ATTR record
    /// this cursor crossed (during rewind or replay).
    pub fn alter_last_paragraph_attributes(
        &mut self,
        store: &mut HistoryStore,
        a1: i16,
        a2: i16,
    ) -> Result<(), HistoryError> {
        self.check(store)?;
        let offset = self
            .state
            .last_paragraph_attribute_index
            .ok_or(HistoryError::NoParagraphAttributes)?;
        store.patch_paragraph_attributes(offset, a1, a2)
    }
}

fn flush(target: &mut dyn RenderTarget, staging: &mut String, staged: &mut usize) {
    if !staging.is_empty() {
        target.emit_text(staging);
        staging.clear();
        *staged = 0;
    }
}

impl std::fmt::Debug for HistoryCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryCursor")
            .field("captured_front", &self.captured_front)
            .field("captured_wraps", &self.captured_wraps)
            .field("paragraph_index", &self.state.paragraph_index)
            .field("at_front", &self.state.at_front)
            .finish_non_exhaustive()
    }
}
