//! 🤖 Auto-Trader - Per-Account Automated Trading Decision Engine
//!
//! One autonomous decision loop per brokerage account: watches live prices,
//! computes indicators, gates signals through admission control (confidence,
//! cooldown, news avoidance), sizes positions against a risk budget, and
//! forwards orders to the execution gateway.
//!
//! ## Architecture
//! - Engine: indicators → signal generator → admission → sizer → executor
//! - Supervisor: per-account start/tick/stop state machine
//! - Registry: owns one supervisor per account, exposes the public API
//! - Collaborators: execution gateway, news calendar, trade store, event bus

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod paper;
pub mod persistence;
pub mod registry;

pub use config::{BotSettings, BotSettingsPatch, Config};
pub use error::EngineError;
pub use events::{EngineEvent, EventBus};
pub use registry::BotRegistry;
