//! Outbound world-intent channel adapters.

use tokio::sync::mpsc;

use loreguard_domain::OutboundIntent;

use crate::infrastructure::ports::{IntentError, IntentSink};

/// Production sink - enqueues intents onto an unbounded mpsc channel.
/// The host owns the receiver and drives delivery.
pub struct ChannelIntentSink {
    tx: mpsc::UnboundedSender<OutboundIntent>,
}

impl ChannelIntentSink {
    /// Create the sink plus the receiver the host consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundIntent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl IntentSink for ChannelIntentSink {
    fn emit(&self, intent: OutboundIntent) -> Result<(), IntentError> {
        self.tx.send(intent).map_err(|_| IntentError::ChannelClosed)
    }
}

/// Sink that drops everything. For hosts that have no intent consumer.
#[derive(Debug, Default)]
pub struct NullIntentSink;

impl IntentSink for NullIntentSink {
    fn emit(&self, _intent: OutboundIntent) -> Result<(), IntentError> {
        Ok(())
    }
}

/// Collecting sink for tests - keeps every emitted intent.
#[cfg(test)]
pub struct CollectingIntentSink {
    intents: std::sync::Mutex<Vec<OutboundIntent>>,
}

#[cfg(test)]
impl CollectingIntentSink {
    pub fn new() -> Self {
        Self {
            intents: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn emitted(&self) -> Vec<OutboundIntent> {
        self.intents.lock().expect("intent lock poisoned").clone()
    }
}

#[cfg(test)]
impl IntentSink for CollectingIntentSink {
    fn emit(&self, intent: OutboundIntent) -> Result<(), IntentError> {
        self.intents
            .lock()
            .expect("intent lock poisoned")
            .push(intent);
        Ok(())
    }
}
