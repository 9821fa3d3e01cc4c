//! Claim job: redeem every settled position held by the wallet.

use tracing::{error, info, instrument};

use super::execution::{ExecutionService, OrderExecutor, RedeemRequest};
use crate::error::BotError;
use crate::market::positions::{PositionsClient, RedeemablePosition};
use crate::metrics;

/// Totals for one claim run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSummary {
    /// Distinct redeemable conditions found.
    pub found: usize,
    /// Redemptions mined.
    pub redeemed: usize,
    /// Redemptions that failed.
    pub failed: usize,
    /// Transaction hashes of mined redemptions.
    pub tx_hashes: Vec<String>,
}

/// Fetch redeemable positions for `holder` and redeem each one.
#[instrument(skip(positions, executor))]
pub async fn claim_all<S: ExecutionService>(
    positions: &PositionsClient,
    executor: &OrderExecutor<S>,
    holder: &str,
) -> Result<ClaimSummary, BotError> {
    let redeemable = positions.fetch_redeemable(holder).await?;

    if redeemable.is_empty() {
        info!("No redeemable positions found");
        return Ok(ClaimSummary::default());
    }

    info!(count = redeemable.len(), "Found redeemable conditions");
    for position in &redeemable {
        info!(
            condition_id = %position.condition_id,
            title = position.title.as_deref().unwrap_or(""),
            size = ?position.size,
            "Redeemable"
        );
    }

    Ok(redeem_batch(executor, &redeemable).await)
}

/// Redeem each position in turn. A failure is logged and does not stop the batch.
pub async fn redeem_batch<S: ExecutionService>(
    executor: &OrderExecutor<S>,
    positions: &[RedeemablePosition],
) -> ClaimSummary {
    let mut summary = ClaimSummary {
        found: positions.len(),
        ..ClaimSummary::default()
    };

    if executor.is_dry_run() {
        for position in positions {
            info!(
                condition_id = %position.condition_id,
                title = position.title.as_deref().unwrap_or(""),
                "[DRY RUN] Would redeem"
            );
        }
        return summary;
    }

    let gas = executor.gas_params().await;
    info!(
        tip_gwei = %gas.tip_gwei(),
        max_fee_gwei = %gas.max_fee_gwei(),
        "Gas parameters (GAS_TIP_GWEI / GAS_MAX_FEE_GWEI to override)"
    );

    for position in positions {
        let outcome = match RedeemRequest::binary(&position.condition_id) {
            Ok(request) => executor.service().redeem_positions(&request, gas).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(tx_hash) => {
                info!(condition_id = %position.condition_id, tx = %tx_hash, "Redemption confirmed");
                metrics::record_redemption(true);
                summary.redeemed += 1;
                summary.tx_hashes.push(tx_hash);
            }
            Err(e) => {
                error!(condition_id = %position.condition_id, error = %e, "Redemption failed");
                metrics::record_redemption(false);
                summary.failed += 1;
            }
        }
    }

    summary
}
