//! Crossterm-backed render target.
//!
//! Replay pushes text and presentation changes here; the target queues the
//! corresponding terminal commands and writes them out on `flush`. The
//! writer is generic so tests can capture the emitted ANSI bytes instead of
//! touching a real terminal.
//!
//! Colour codes map onto the 16-colour ANSI palette: `0..=15` select a
//! palette entry, `-1` resets the channel to the terminal default, and `-2`
//! (undefined) leaves the channel untouched. Font changes have no terminal
//! counterpart and are only traced; the `FIXED` style bit is likewise
//! meaningless on a fixed-pitch terminal.

use anyhow::Result;
use core_history::{COLOUR_DEFAULT, RenderTarget, StyleFlags};
use crossterm::{
    queue,
    style::{Attribute, Color, Print, SetAttribute, SetBackgroundColor, SetForegroundColor},
};
use std::io::{Stdout, Write, stdout};
use tracing::trace;

pub struct TerminalTarget<W: Write> {
    out: W,
}

impl TerminalTarget<Stdout> {
    pub fn to_stdout() -> Self {
        Self::new(stdout())
    }
}

impl<W: Write> TerminalTarget<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Push everything queued so far to the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn set_channel(&mut self, code: i16, background: bool) {
        let colour = match code {
            c if c < COLOUR_DEFAULT => return, // undefined: leave as is
            COLOUR_DEFAULT => Color::Reset,
            c => Color::AnsiValue(c as u8),
        };
        if background {
            queue!(self.out, SetBackgroundColor(colour)).ok();
        } else {
            queue!(self.out, SetForegroundColor(colour)).ok();
        }
    }
}

impl<W: Write> RenderTarget for TerminalTarget<W> {
    fn emit_text(&mut self, text: &str) {
        queue!(self.out, Print(text)).ok();
    }

    fn set_font(&mut self, font: i16) {
        // One font per terminal; remembered only in the trace log.
        trace!(target: "target.terminal", font, "set_font");
    }

    fn set_text_style(&mut self, style: StyleFlags) {
        let pairs = [
            (StyleFlags::BOLD, Attribute::Bold, Attribute::NormalIntensity),
            (StyleFlags::EMPHASIS, Attribute::Italic, Attribute::NoItalic),
            (StyleFlags::REVERSE, Attribute::Reverse, Attribute::NoReverse),
        ];
        for (flag, on, off) in pairs {
            let attribute = if style.contains(flag) { on } else { off };
            queue!(self.out, SetAttribute(attribute)).ok();
        }
    }

    fn set_colour(&mut self, foreground: i16, background: i16, _reserved: i16) {
        self.set_channel(foreground, false);
        self.set_channel(background, true);
    }
}
