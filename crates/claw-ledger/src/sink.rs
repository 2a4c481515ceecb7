//! Observability sinks for voucher events
//!
//! Correctness never depends on a sink consuming its records.

use std::sync::Arc;

use claw_types::VoucherEvent;
use parking_lot::Mutex;
use tracing::info;

/// Receives one record per committed operation
pub trait EventSink: Send + Sync {
    fn record(&self, event: &VoucherEvent);
}

/// Emits every event as a structured `tracing` record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &VoucherEvent) {
        match event {
            VoucherEvent::Created {
                id,
                recipient,
                max_spend,
                expiry,
            } => info!(
                target: "claw::events",
                id = id.value(),
                recipient = %recipient,
                max_spend = max_spend.value(),
                expiry = ?expiry,
                "voucher created"
            ),
            VoucherEvent::Spent {
                id,
                to,
                amount,
                new_spent,
                new_remaining,
            } => info!(
                target: "claw::events",
                id = id.value(),
                to = %to,
                amount = amount.value(),
                new_spent = new_spent.value(),
                new_remaining = new_remaining.value(),
                "voucher spent"
            ),
            VoucherEvent::Burned {
                id,
                return_to,
                remaining,
            } => info!(
                target: "claw::events",
                id = id.value(),
                return_to = %return_to,
                remaining = remaining.value(),
                "voucher burned"
            ),
            VoucherEvent::HolderTransferred { id, from, to } => info!(
                target: "claw::events",
                id = id.value(),
                from = %from,
                to = %to,
                "voucher holder transferred"
            ),
        }
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<VoucherEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<VoucherEvent> {
        self.events.lock().clone()
    }

    pub fn last(&self) -> Option<VoucherEvent> {
        self.events.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &VoucherEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Forwards each event to several sinks
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn record(&self, event: &VoucherEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
