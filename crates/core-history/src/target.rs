//! Render-target capability set.
//!
//! Replay never talks to a screen directly; it drives whatever implements
//! this trait. Implementations must not call back into the store they are
//! being replayed from (for safe code the borrow checker already rules it
//! out).

use crate::attr::StyleFlags;

pub trait RenderTarget {
    /// A run of ordinary text. Newlines arrive inside the run.
    fn emit_text(&mut self, text: &str);

    fn set_font(&mut self, font: i16);

    fn set_text_style(&mut self, style: StyleFlags);

    /// `reserved` is passed through untouched for targets that multiplex
    /// several windows; replay always sends -1.
    fn set_colour(&mut self, foreground: i16, background: i16, reserved: i16);
}

/// Target that discards everything; useful when only the cursor's position
/// side effects are wanted.
#[derive(Debug, Default)]
pub struct NullTarget;

impl RenderTarget for NullTarget {
    fn emit_text(&mut self, _text: &str) {}
    fn set_font(&mut self, _font: i16) {}
    fn set_text_style(&mut self, _style: StyleFlags) {}
    fn set_colour(&mut self, _foreground: i16, _background: i16, _reserved: i16) {}
}
