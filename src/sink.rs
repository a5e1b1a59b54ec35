//! Event sink trait and the built-in sinks
//!
//! The poller and the live subscription hand every new, deduplicated event
//! to a sink in emission order. Sinks decide how events leave the process.

use crate::events::DecodedEvent;
use crate::report::{event_record, render_event};
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Downstream consumer of decoded events.
pub trait EventSink: Send {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Consume one event. An error is logged by the caller and does not
    /// stop the stream.
    fn emit(&mut self, event: &DecodedEvent) -> Result<()>;
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn emit(&mut self, event: &DecodedEvent) -> Result<()> {
        (**self).emit(event)
    }
}

/// Console blocks, one per event.
pub struct ConsoleSink<W> {
    out: W,
    explorer_base: String,
    total: Option<usize>,
    emitted: usize,
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W, explorer_base: impl Into<String>) -> Self {
        Self {
            out,
            explorer_base: explorer_base.into(),
            total: None,
            emitted: 0,
        }
    }

    /// Number headings `n/total` when the event count is known up front.
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }
}

impl<W: Write + Send> EventSink for ConsoleSink<W> {
    fn name(&self) -> &'static str {
        "console"
    }

    fn emit(&mut self, event: &DecodedEvent) -> Result<()> {
        self.emitted += 1;
        let position = self.total.map(|total| (self.emitted, total));
        let block = render_event(event, position, &self.explorer_base);
        writeln!(self.out, "{}", block).context("Failed to write event")?;
        self.out.flush().context("Failed to flush output")?;
        Ok(())
    }
}

/// One JSON object per line.
pub struct JsonLinesSink<W> {
    out: W,
    explorer_base: String,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W, explorer_base: impl Into<String>) -> Self {
        Self {
            out,
            explorer_base: explorer_base.into(),
        }
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn name(&self) -> &'static str {
        "json"
    }

    fn emit(&mut self, event: &DecodedEvent) -> Result<()> {
        let record = event_record(event, &self.explorer_base);
        serde_json::to_writer(&mut self.out, &record).context("Failed to serialize event")?;
        writeln!(self.out).context("Failed to write event")?;
        self.out.flush().context("Failed to flush output")?;
        Ok(())
    }
}

/// Keeps every event in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<DecodedEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<DecodedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn name(&self) -> &'static str {
        "collect"
    }

    fn emit(&mut self, event: &DecodedEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("event buffer poisoned"))?
            .push(event.clone());
        Ok(())
    }
}
