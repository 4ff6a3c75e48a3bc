//! Engine event bus
//!
//! Typed lifecycle/trade events broadcast to whatever transport sits above
//! the engine (WebSocket fan-out, notification service, test harness).
//! Fire-and-forget: the engine never waits on, or fails because of,
//! subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::engine::supervisor::BotStatus;
use crate::persistence::TradeRecord;

/// Events emitted by the decision engine
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An admitted signal was sized, submitted, and persisted
    TradeExecuted {
        account_id: String,
        trade: TradeRecord,
    },
    /// Supervisor transitioned between stopped/running/error
    StatusChanged {
        account_id: String,
        status: BotStatus,
    },
    /// A signal was suppressed by the news-avoidance gate
    NewsPause {
        account_id: String,
        symbol: String,
        reason: String,
    },
    /// A recoverable per-symbol failure during a tick
    Error {
        account_id: String,
        symbol: Option<String>,
        message: String,
    },
}

/// Timestamped envelope as delivered to subscribers
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: EngineEvent,
}

/// Broadcast bus for engine events
///
/// Cloneable handle; subscribers that fall behind lose oldest events
/// (lagging receivers are a subscriber problem, not an engine problem).
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event; silently drops when nobody is subscribed
    pub fn emit(&self, event: EngineEvent) {
        let envelope = EventEnvelope {
            at: Utc::now(),
            event,
        };
        let _ = self.tx.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
