//! Decision engine core
//!
//! Pipeline per symbol per tick:
//! price fetch → history → signal generator → admission → sizer → executor.

pub mod admission;
pub mod executor;
pub mod history;
pub mod indicators;
pub mod signal;
pub mod sizer;
pub mod supervisor;

pub use admission::{AdmissionController, AdmissionDecision};
pub use executor::ExecutionOrchestrator;
pub use history::PriceHistory;
pub use signal::{SignalAction, SignalGenerator, StrategyKind, TradingSignal};
pub use sizer::RiskSizer;
pub use supervisor::{BotStatus, BotSupervisor};
