//! Trigger evaluation: target bands and the per-epoch single-fire gate.

pub mod engine;
pub mod matcher;

pub use engine::{EpochTradeState, FireDecision, TradeStatus, TriggerConfig, TriggerEngine};
pub use matcher::{match_target, TOLERANCE};
