#![allow(dead_code)] // Shared across the integration test binaries; each uses a subset.

use core_history::{HistoryStore, RenderTarget, StyleFlags, TextAttributes};
use std::cell::RefCell;
use std::rc::Rc;

/// Everything a replay pushed into the target, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEvent {
    Text(String),
    Font(i16),
    Style(StyleFlags),
    Colour(i16, i16),
}

#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub events: Vec<TargetEvent>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenation of all text events.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                TargetEvent::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl RenderTarget for RecordingTarget {
    fn emit_text(&mut self, text: &str) {
        self.events.push(TargetEvent::Text(text.to_owned()));
    }
    fn set_font(&mut self, font: i16) {
        self.events.push(TargetEvent::Font(font));
    }
    fn set_text_style(&mut self, style: StyleFlags) {
        self.events.push(TargetEvent::Style(style));
    }
    fn set_colour(&mut self, foreground: i16, background: i16, _reserved: i16) {
        self.events.push(TargetEvent::Colour(foreground, background));
    }
}

pub const WHITE: i16 = 15;
pub const BLACK: i16 = 0;

/// Store seeded with white-on-black defaults and a hook that records every
/// paragraph removal.
pub fn store_with_hook(
    max_size: usize,
    increment: usize,
) -> (HistoryStore, Rc<RefCell<Vec<(i16, i16)>>>) {
    let mut store = HistoryStore::new(
        0,
        max_size,
        increment,
        TextAttributes::new(1, StyleFlags::ROMAN, WHITE, BLACK),
    );
    let removed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&removed);
    store.set_removal_hook(Box::new(move |a1: i16, a2: i16| {
        sink.borrow_mut().push((a1, a2));
    }));
    (store, removed)
}
