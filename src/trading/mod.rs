//! Trading module for order sizing, submission and redemption.
//!
//! This module handles:
//! - Order types and share sizing
//! - Gas parameters for on-chain calls
//! - The execution service seam and the order executor
//! - The claim (redeem) job

pub mod execution;
pub mod fees;
pub mod order;
pub mod redeem;

pub use execution::{ExecutionService, LiveExecutionService, OrderExecutor, RedeemRequest};
pub use fees::GasParams;
pub use order::{share_size, BuyOrder, OrderResult, OrderStatus, Side};
pub use redeem::{claim_all, ClaimSummary};
