//! Order execution: the exchange/chain service seam and the executor in front of it.
//!
//! [`ExecutionService`] is everything that touches credentials: CLOB
//! authentication, order signing and posting, and on-chain redemption.
//! [`OrderExecutor`] sizes orders, honours dry-run and always hands back an
//! [`OrderResult`], whatever the service does.

use std::future::Future;
use std::str::FromStr;
use std::time::Instant;

use alloy::primitives::{address, Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::BlockNumberOrTag;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use polymarket_client_sdk::auth::state::Authenticated;
use polymarket_client_sdk::auth::Normal;
use polymarket_client_sdk::clob::types::{OrderType, Side as ClobSide, SignatureType};
use polymarket_client_sdk::clob::{Client as ClobClient, Config as ClobConfig};
use rust_decimal::Decimal;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::fees::GasParams;
use super::order::{dry_run_order_id, BuyOrder, OrderResult, OrderStatus};
use crate::config::Config;
use crate::error::ExecutionError;
use crate::market::Outcome;
use crate::metrics;
use crate::signing;
use crate::trigger::FireDecision;

/// Conditional Tokens Framework contract on Polygon.
pub const CTF_ADDRESS: Address = address!("4d97dcd97ec945f40cf65f87097ace5ea0476045");

/// USDC.e collateral on Polygon.
pub const USDC_E_ADDRESS: Address = address!("2791bca1f2de4661ed88a30c99a7a9449aa84174");

sol! {
    #[sol(rpc)]
    interface IConditionalTokens {
        function redeemPositions(address collateralToken, bytes32 parentCollectionId, bytes32 conditionId, uint256[] indexSets) external;
    }
}

/// Arguments of one `redeemPositions` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemRequest {
    /// Collateral token.
    pub collateral_token: Address,
    /// Parent collection (zero for top-level positions).
    pub parent_collection_id: B256,
    /// Condition to redeem.
    pub condition_id: B256,
    /// Outcome index sets.
    pub index_sets: Vec<U256>,
}

impl RedeemRequest {
    /// Redeem both outcomes of a binary USDC.e market.
    pub fn binary(condition_id: &str) -> Result<Self, ExecutionError> {
        Ok(Self {
            collateral_token: USDC_E_ADDRESS,
            parent_collection_id: B256::ZERO,
            condition_id: parse_condition_id(condition_id)?,
            index_sets: [Outcome::Up, Outcome::Down]
                .map(|o| U256::from(o.index_set()))
                .to_vec(),
        })
    }
}

/// Parse a hex condition id, left-padding to 32 bytes.
pub fn parse_condition_id(raw: &str) -> Result<B256, ExecutionError> {
    let hex_part = raw.trim().strip_prefix("0x").unwrap_or(raw.trim());
    let bytes = hex::decode(if hex_part.len() % 2 == 1 {
        format!("0{}", hex_part)
    } else {
        hex_part.to_string()
    })
    .map_err(|e| ExecutionError::InvalidParams(format!("Invalid condition id {:?}: {}", raw, e)))?;

    if bytes.is_empty() || bytes.len() > 32 {
        return Err(ExecutionError::InvalidParams(format!(
            "Condition id must be 1..=32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut padded = [0u8; 32];
    padded[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(B256::from(padded))
}

/// Signing, submission and redemption capabilities.
pub trait ExecutionService: Send + Sync {
    /// Sign and post a buy order. Returns the exchange order ID.
    fn place_buy_order(
        &self,
        order: &BuyOrder,
    ) -> impl Future<Output = Result<String, ExecutionError>> + Send;

    /// Submit a redemption transaction and wait for it to be mined.
    /// Returns the transaction hash.
    fn redeem_positions(
        &self,
        request: &RedeemRequest,
        gas: GasParams,
    ) -> impl Future<Output = Result<String, ExecutionError>> + Send;

    /// Latest block base fee in wei, if the chain reports one.
    fn base_fee_per_gas(&self) -> impl Future<Output = Result<Option<u128>, ExecutionError>> + Send;
}

/// Live service backed by the CLOB SDK and a Polygon RPC endpoint.
pub struct LiveExecutionService {
    signer: PrivateKeySigner,
    signature_type: SignatureType,
    funder: Option<Address>,
    clob_url: String,
    rpc_url: String,
    clob: OnceCell<ClobClient<Authenticated<Normal>>>,
}

impl LiveExecutionService {
    /// Create from config. Authentication is deferred to first use.
    pub fn from_config(config: &Config) -> Result<Self, ExecutionError> {
        Ok(Self {
            signer: signing::create_signer(&config.polymarket_private_key)?,
            signature_type: signing::signature_type_from_u8(config.polymarket_signature_type),
            funder: signing::funder_address(config)?,
            clob_url: config.polymarket_clob_url.clone(),
            rpc_url: config.polygon_rpc_url.clone(),
            clob: OnceCell::new(),
        })
    }

    /// Signer used for orders and transactions.
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Derive (or create) API credentials once and cache the authenticated client.
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> Result<&ClobClient<Authenticated<Normal>>, ExecutionError> {
        self.clob
            .get_or_try_init(|| async {
                let builder = ClobClient::new(self.clob_url.as_str(), ClobConfig::default())
                    .map_err(|e| ExecutionError::AuthenticationFailed(e.to_string()))?
                    .authentication_builder(&self.signer);

                let client = match self.funder {
                    Some(funder) => {
                        builder
                            .funder(funder)
                            .signature_type(self.signature_type)
                            .authenticate()
                            .await
                    }
                    None => {
                        builder
                            .signature_type(self.signature_type)
                            .authenticate()
                            .await
                    }
                }
                .map_err(|e| ExecutionError::AuthenticationFailed(e.to_string()))?;

                info!("CLOB client authenticated");
                Ok(client)
            })
            .await
    }
}

impl ExecutionService for LiveExecutionService {
    #[instrument(skip(self, order), fields(token = %order.token_id, price = %order.price, size = %order.size))]
    async fn place_buy_order(&self, order: &BuyOrder) -> Result<String, ExecutionError> {
        order.validate().map_err(ExecutionError::InvalidParams)?;

        let client = self.authenticate().await?;
        let token_id = U256::from_str(&order.token_id).map_err(|e| {
            ExecutionError::InvalidParams(format!("Invalid token id {:?}: {}", order.token_id, e))
        })?;

        debug!(fee_rate_bps = order.fee_rate_bps, "Building limit order");

        let signable = client
            .limit_order()
            .token_id(token_id)
            .size(order.size)
            .price(order.price)
            .side(ClobSide::Buy)
            .order_type(OrderType::GTC)
            .build()
            .await
            .map_err(|e| ExecutionError::InvalidParams(e.to_string()))?;

        let signed = client
            .sign(&self.signer, signable)
            .await
            .map_err(|e| ExecutionError::SigningError(e.to_string()))?;

        let response = client
            .post_order(signed)
            .await
            .map_err(|e| ExecutionError::SubmissionFailed(e.to_string()))?;

        if !response.success {
            return Err(ExecutionError::OrderRejected {
                reason: response
                    .error_msg
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "rejected without message".to_string()),
            });
        }

        Ok(response.order_id)
    }

    #[instrument(skip(self, request, gas), fields(condition_id = %request.condition_id))]
    async fn redeem_positions(
        &self,
        request: &RedeemRequest,
        gas: GasParams,
    ) -> Result<String, ExecutionError> {
        let provider = ProviderBuilder::new()
            .wallet(self.signer.clone())
            .connect(self.rpc_url.as_str())
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))?;

        let ctf = IConditionalTokens::new(CTF_ADDRESS, provider);

        let tx_hash = ctf
            .redeemPositions(
                request.collateral_token,
                request.parent_collection_id,
                request.condition_id,
                request.index_sets.clone(),
            )
            .max_fee_per_gas(gas.max_fee_per_gas)
            .max_priority_fee_per_gas(gas.max_priority_fee_per_gas)
            .send()
            .await
            .map_err(|e| ExecutionError::RedemptionFailed(e.to_string()))?
            .watch()
            .await
            .map_err(|e| ExecutionError::RedemptionFailed(e.to_string()))?;

        Ok(format!("{:#x}", tx_hash))
    }

    async fn base_fee_per_gas(&self) -> Result<Option<u128>, ExecutionError> {
        let provider = ProviderBuilder::new()
            .connect(self.rpc_url.as_str())
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))?;

        let block = provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))?;

        Ok(block.and_then(|b| b.header.base_fee_per_gas).map(u128::from))
    }
}

/// Sizes fired decisions into orders and submits them, or simulates them in dry-run.
pub struct OrderExecutor<S> {
    service: S,
    trade_size_usd: Decimal,
    fee_rate_bps: u32,
    dry_run: bool,
    gas_tip_gwei: u64,
    gas_max_fee_override: Option<u64>,
}

impl<S: ExecutionService> OrderExecutor<S> {
    /// Create from config values.
    pub fn new(service: S, config: &Config) -> Self {
        Self {
            service,
            trade_size_usd: config.trade_size_usd,
            fee_rate_bps: config.fee_rate_bps,
            dry_run: config.dry_run,
            gas_tip_gwei: config.gas_tip_gwei,
            gas_max_fee_override: config.gas_max_fee_override(),
        }
    }

    /// Whether orders are simulated.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Underlying service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Submit (or simulate) the order for `decision`. Never fails; failures
    /// are reported in the returned [`OrderResult`].
    #[instrument(skip(self, decision), fields(epoch = %decision.epoch, side = %decision.outcome, price = %decision.price))]
    pub async fn execute(&self, decision: &FireDecision) -> OrderResult {
        let order = match BuyOrder::sized(
            decision.token_id.clone(),
            decision.price,
            self.trade_size_usd,
            self.fee_rate_bps,
        ) {
            Ok(order) => order,
            Err(reason) => {
                metrics::inc_orders_failed();
                return OrderResult {
                    epoch: decision.epoch,
                    side: decision.outcome,
                    price: decision.price,
                    size: None,
                    status: OrderStatus::Failed {
                        error: ExecutionError::InvalidParams(reason).to_string(),
                    },
                };
            }
        };

        if self.dry_run {
            info!(
                size = %order.size,
                notional = %order.notional(),
                "[DRY RUN] Would buy {} @ {}",
                decision.outcome,
                decision.price
            );
            metrics::inc_orders_placed();
            return OrderResult {
                epoch: decision.epoch,
                side: decision.outcome,
                price: decision.price,
                size: Some(order.size),
                status: OrderStatus::Placed {
                    order_id: dry_run_order_id(decision.epoch, decision.outcome, decision.price),
                },
            };
        }

        let start = Instant::now();
        let status = match self.service.place_buy_order(&order).await {
            Ok(order_id) => {
                metrics::inc_orders_placed();
                OrderStatus::Placed { order_id }
            }
            Err(e) => {
                warn!(error = %e, "Order submission failed");
                metrics::inc_orders_failed();
                OrderStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        metrics::record_order_latency(start);

        OrderResult {
            epoch: decision.epoch,
            side: decision.outcome,
            price: decision.price,
            size: Some(order.size),
            status,
        }
    }

    /// Gas bid for the next transaction. A failed base-fee lookup falls back
    /// to the assumed base fee.
    pub async fn gas_params(&self) -> GasParams {
        let base_fee = if self.gas_max_fee_override.is_some() {
            None
        } else {
            match self.service.base_fee_per_gas().await {
                Ok(base_fee) => base_fee,
                Err(e) => {
                    warn!(error = %e, "Base fee lookup failed, assuming default");
                    None
                }
            }
        };
        GasParams::compute(base_fee, self.gas_tip_gwei, self.gas_max_fee_override)
    }
}
