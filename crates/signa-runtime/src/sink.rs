//! Confirmed-letter sinks

use std::sync::Arc;

use parking_lot::Mutex;
use signa_core::{ConfirmedEvent, UNKNOWN_LABEL};
use tokio::sync::mpsc;
use tracing::warn;

/// Receiver of confirmed letters
pub trait ConfirmedSink: Send {
    fn on_confirmed(&mut self, event: &ConfirmedEvent);
}

/// Accumulates confirmed letters into lower-case text
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextAccumulator {
    text: String,
}

impl TextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a letter; empty and "UNKNOWN" letters are ignored
    pub fn push_letter(&mut self, letter: &str) -> &str {
        if !letter.is_empty() && letter != UNKNOWN_LABEL {
            self.text.push_str(&letter.to_lowercase());
        }
        &self.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text, e.g. after the user edited it elsewhere
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl ConfirmedSink for TextAccumulator {
    fn on_confirmed(&mut self, event: &ConfirmedEvent) {
        self.push_letter(&event.letter);
    }
}

/// Shared sink, readable while the interpreter owns a clone
impl<T: ConfirmedSink> ConfirmedSink for Arc<Mutex<T>> {
    fn on_confirmed(&mut self, event: &ConfirmedEvent) {
        self.lock().on_confirmed(event);
    }
}

/// Forwards events to an async consumer
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ConfirmedEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConfirmedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

impl ConfirmedSink for ChannelSink {
    fn on_confirmed(&mut self, event: &ConfirmedEvent) {
        if self.tx.send(event.clone()).is_err() {
            warn!(letter = %event.letter, "confirmed letter dropped, receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_lowercase() {
        let mut text = TextAccumulator::new();
        text.push_letter("A");
        text.push_letter("Ż");
        assert_eq!(text.text(), "aż");
    }

    #[test]
    fn test_ignores_empty_and_unknown() {
        let mut text = TextAccumulator::new();
        text.push_letter("");
        text.push_letter("UNKNOWN");
        assert_eq!(text.push_letter("B"), "b");
    }

    #[test]
    fn test_set_text_and_clear() {
        let mut text = TextAccumulator::new();
        text.set_text("ala");
        text.on_confirmed(&ConfirmedEvent::new("M", 1));
        assert_eq!(text.text(), "alam");
        text.clear();
        assert_eq!(text.text(), "");
    }

    #[test]
    fn test_shared_sink() {
        let shared = Arc::new(Mutex::new(TextAccumulator::new()));
        let mut sink = shared.clone();
        sink.on_confirmed(&ConfirmedEvent::new("C", 1));
        assert_eq!(shared.lock().text(), "c");
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (mut sink, mut rx) = ChannelSink::new();
        sink.on_confirmed(&ConfirmedEvent::new("D", 3));
        assert_eq!(rx.try_recv().unwrap(), ConfirmedEvent::new("D", 3));
    }
}
