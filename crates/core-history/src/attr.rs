//! Presentation attributes carried through the history stream.
//!
//! A colour is a small signed code rather than an enum: `-2` means
//! "undefined / inherit", `-1` the terminal default, `0..=15` a palette
//! index. Keeping the raw code makes the in-band encoding trivial and lets
//! callers pass codes straight through from their own screen model.

use bitflags::bitflags;

/// Colour code meaning "undefined"; inherits whatever is already in effect.
pub const COLOUR_UNDEFINED: i16 = -2;
/// Colour code selecting the target's default colour.
pub const COLOUR_DEFAULT: i16 = -1;
/// Largest valid palette index.
pub const COLOUR_MAX: i16 = 15;

/// Returns true if `code` is a representable colour (`-2..=15`).
pub fn colour_in_range(code: i16) -> bool {
    (COLOUR_UNDEFINED..=COLOUR_MAX).contains(&code)
}

bitflags! {
    /// Text style mask. The four bits compose freely; `ROMAN` (empty) is
    /// plain text.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StyleFlags: u8 {
        const REVERSE  = 0b0000_0001;
        const BOLD     = 0b0000_0010;
        const EMPHASIS = 0b0000_0100;
        const FIXED    = 0b0000_1000;
    }
}

impl StyleFlags {
    /// Plain text; alias for the empty mask.
    pub const ROMAN: StyleFlags = StyleFlags::empty();
}

/// The complete presentation state at one point of the output stream.
///
/// The store keeps two of these (`front_state`, `back_state`); each cursor
/// carries one for the paragraph it currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextAttributes {
    pub font: i16,
    pub style: StyleFlags,
    pub foreground: i16,
    pub background: i16,
}

impl TextAttributes {
    pub fn new(font: i16, style: StyleFlags, foreground: i16, background: i16) -> Self {
        Self {
            font,
            style,
            foreground,
            background,
        }
    }
}

impl Default for TextAttributes {
    fn default() -> Self {
        Self {
            font: 1,
            style: StyleFlags::ROMAN,
            foreground: COLOUR_DEFAULT,
            background: COLOUR_DEFAULT,
        }
    }
}
