//! Diagnostic trace output.
//!
//! The executor reports `NOP`, `HALT`, `PRINT_I` and invalid-opcode events as
//! plain text through a [`TraceSink`]. Where that text ends up is the
//! caller's choice.

use std::io::Write;

/// Receiver for trace events. Emission is infallible from the VM's side.
pub trait TraceSink {
    fn emit(&mut self, text: &str);
}

impl<S: TraceSink + ?Sized> TraceSink for &mut S {
    fn emit(&mut self, text: &str) {
        (**self).emit(text);
    }
}

impl<S: TraceSink + ?Sized> TraceSink for Box<S> {
    fn emit(&mut self, text: &str) {
        (**self).emit(text);
    }
}

/// Collects events in order.
#[derive(Clone, Debug, Default)]
pub struct BufferSink {
    events: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn into_events(self) -> Vec<String> {
        self.events
    }
}

impl TraceSink for BufferSink {
    fn emit(&mut self, text: &str) {
        self.events.push(text.to_string());
    }
}

/// Writes one line per event to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl TraceSink for StdoutSink {
    fn emit(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout must not abort execution.
        let _ = writeln!(out, "{text}");
    }
}

/// Routes events through the crate logger at info level.
#[derive(Debug, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn emit(&mut self, text: &str) {
        crate::info!("vm: {text}");
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn emit(&mut self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_all<S: TraceSink>(mut sink: S, lines: &[&str]) {
        for line in lines {
            sink.emit(line);
        }
    }

    #[test]
    fn buffer_keeps_order() {
        let mut sink = BufferSink::new();
        emit_all(&mut sink, &["NOP", "500", "HALT"]);
        assert_eq!(sink.events(), &["NOP", "500", "HALT"]);
        assert_eq!(sink.into_events().len(), 3);
    }

    #[test]
    fn boxed_sink_forwards() {
        let mut boxed: Box<dyn TraceSink> = Box::new(BufferSink::new());
        boxed.emit("x");
        emit_all(boxed, &["y"]);
    }

    #[test]
    fn null_and_log_sinks_accept_events() {
        emit_all(NullSink, &["ignored"]);
        emit_all(LogSink, &["ignored in tests"]);
    }
}
