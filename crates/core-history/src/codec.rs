//! In-band metadata encoding.
//!
//! Presentation changes travel inside the character stream itself. A record
//! is a reserved escape unit (value 0), a kind unit, and one or two
//! parameter units. Parameters are stored as `value + PARAM_OFFSET` so that
//! no parameter unit can collide with the escape or with a newline; this is
//! what lets backward walks identify a record boundary by scanning for a
//! bare 0. The smallest accepted parameter is therefore -2 (the undefined
//! colour code), which encodes as 11.

use crate::attr::{COLOUR_UNDEFINED, StyleFlags, TextAttributes, colour_in_range};
use crate::error::HistoryError;

/// Element type of the backing buffer: one wide code unit.
pub type CodeUnit = u32;

/// Reserved unit introducing a metadata record. Never valid as text.
pub const ESCAPE: CodeUnit = 0;
/// Paragraph terminator.
pub const NEWLINE: CodeUnit = '\n' as CodeUnit;

/// Added to every parameter before it is placed in the buffer.
pub const PARAM_OFFSET: i32 = 13;

/// Length in units of the largest record; the buffer is never smaller.
pub const MAX_RECORD_UNITS: usize = 4;

pub(crate) const KIND_FONT: CodeUnit = 1;
pub(crate) const KIND_STYLE: CodeUnit = 2;
pub(crate) const KIND_COLOUR: CodeUnit = 3;
pub(crate) const KIND_PARAGRAPH: CodeUnit = 4;

/// A presentation change as the writer API accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metadata {
    Font(i16),
    Style(StyleFlags),
    Colour { foreground: i16, background: i16 },
    ParagraphAttributes { a1: i16, a2: i16 },
}

impl Metadata {
    /// Encoded length in units, including the escape.
    pub fn width(&self) -> usize {
        match self {
            Metadata::Font(_) | Metadata::Style(_) => 3,
            Metadata::Colour { .. } | Metadata::ParagraphAttributes { .. } => 4,
        }
    }

    /// Validate parameters and encode into `out`, returning the number of
    /// units written. Colour pairs outside `-2..=15` and any parameter below
    /// -2 are programming errors.
    pub fn encode(&self, out: &mut [CodeUnit; MAX_RECORD_UNITS]) -> Result<usize, HistoryError> {
        match *self {
            Metadata::Font(font) => {
                check_param(font)?;
                out[0] = ESCAPE;
                out[1] = KIND_FONT;
                out[2] = encode_param(font);
                Ok(3)
            }
            Metadata::Style(style) => {
                out[0] = ESCAPE;
                out[1] = KIND_STYLE;
                out[2] = encode_param(style.bits() as i16);
                Ok(3)
            }
            Metadata::Colour {
                foreground,
                background,
            } => {
                if !colour_in_range(foreground) || !colour_in_range(background) {
                    return Err(HistoryError::InvalidColour {
                        foreground,
                        background,
                    });
                }
                out[0] = ESCAPE;
                out[1] = KIND_COLOUR;
                out[2] = encode_param(foreground);
                out[3] = encode_param(background);
                Ok(4)
            }
            Metadata::ParagraphAttributes { a1, a2 } => {
                check_param(a1)?;
                check_param(a2)?;
                out[0] = ESCAPE;
                out[1] = KIND_PARAGRAPH;
                out[2] = encode_param(a1);
                out[3] = encode_param(a2);
                Ok(4)
            }
        }
    }
}

impl Metadata {
    /// Decode the record whose escape unit sits at `units[0]`, returning it
    /// together with its width. `units` must hold at least four values (pad
    /// with zeros near a boundary; the fourth is ignored for three-unit
    /// records). `offset` is carried into the error for diagnostics only.
    pub fn decode(units: &[CodeUnit], offset: usize) -> Result<(Metadata, usize), HistoryError> {
        let kind = units[1];
        let width = width_of_kind(kind, offset)?;
        let p1 = decode_param(units[2]);
        let metadata = match kind {
            KIND_FONT => Metadata::Font(p1),
            KIND_STYLE => Metadata::Style(StyleFlags::from_bits_truncate(p1 as u8)),
            KIND_COLOUR => Metadata::Colour {
                foreground: p1,
                background: decode_param(units[3]),
            },
            _ => Metadata::ParagraphAttributes {
                a1: p1,
                a2: decode_param(units[3]),
            },
        };
        Ok((metadata, width))
    }

    /// Fold this record into a running presentation state. Undefined colour
    /// codes inherit; paragraph attributes carry no presentation state.
    pub(crate) fn apply_to(&self, state: &mut TextAttributes) {
        match *self {
            Metadata::Font(font) => state.font = font,
            Metadata::Style(style) => state.style = style,
            Metadata::Colour {
                foreground,
                background,
            } => {
                if foreground != COLOUR_UNDEFINED {
                    state.foreground = foreground;
                }
                if background != COLOUR_UNDEFINED {
                    state.background = background;
                }
            }
            Metadata::ParagraphAttributes { .. } => {}
        }
    }
}

/// Record length implied by a kind unit, or a corruption error carrying the
/// buffer offset for diagnostics.
pub(crate) fn width_of_kind(kind: CodeUnit, offset: usize) -> Result<usize, HistoryError> {
    match kind {
        KIND_FONT | KIND_STYLE => Ok(3),
        KIND_COLOUR | KIND_PARAGRAPH => Ok(4),
        other => Err(HistoryError::CorruptMetadata {
            offset,
            kind: other,
        }),
    }
}

pub(crate) fn encode_param(value: i16) -> CodeUnit {
    (value as i32 + PARAM_OFFSET) as CodeUnit
}

pub(crate) fn decode_param(unit: CodeUnit) -> i16 {
    (unit as i32 - PARAM_OFFSET) as i16
}

pub(crate) fn check_param(value: i16) -> Result<(), HistoryError> {
    // -2 encodes as 11; anything smaller would land on or below a newline.
    if value < -2 {
        return Err(HistoryError::InvalidParameter { value });
    }
    Ok(())
}
