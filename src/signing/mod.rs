//! Signing identity for Polymarket.
//!
//! This module provides utilities for:
//! - Creating a Polygon-bound signer from the configured private key
//! - Converting config signature types to SDK types
//! - Resolving the wallet that holds positions (funder or EOA)

use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use polymarket_client_sdk::clob::types::SignatureType;
use polymarket_client_sdk::POLYGON;

use crate::config::Config;
use crate::error::ExecutionError;

/// Convert a u8 signature type from config to SDK SignatureType.
///
/// Signature types:
/// - 0: EOA (Externally Owned Account) - standard wallet
/// - 1: Magic.link - proxy wallet
/// - 2: Gnosis Safe - multi-sig
pub fn signature_type_from_u8(sig_type: u8) -> SignatureType {
    match sig_type {
        1 => SignatureType::Proxy,
        2 => SignatureType::GnosisSafe,
        _ => SignatureType::Eoa,
    }
}

/// Create a Polygon signer from a hex-encoded private key.
///
/// The private key can be with or without the "0x" prefix.
pub fn create_signer(private_key: &str) -> Result<PrivateKeySigner, ExecutionError> {
    let key = private_key.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    let bytes = hex::decode(key)
        .map_err(|e| ExecutionError::SigningError(format!("Invalid private key hex: {}", e)))?;

    if bytes.len() != 32 {
        return Err(ExecutionError::SigningError(format!(
            "Private key must be 32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&bytes);

    let signer = PrivateKeySigner::from_bytes(&key_bytes.into())
        .map_err(|e| ExecutionError::SigningError(format!("Failed to create signer: {}", e)))?;

    Ok(signer.with_chain_id(Some(POLYGON)))
}

/// Parse a 0x-prefixed wallet address.
pub fn parse_address(raw: &str) -> Result<Address, ExecutionError> {
    Address::from_str(raw.trim())
        .map_err(|e| ExecutionError::InvalidParams(format!("Invalid address {:?}: {}", raw, e)))
}

/// Funder address for non-EOA signature types.
pub fn funder_address(config: &Config) -> Result<Option<Address>, ExecutionError> {
    config
        .polymarket_funder
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .map(parse_address)
        .transpose()
}

/// Address that holds positions: the funder when set, else the signer.
pub fn position_holder(config: &Config, signer: &PrivateKeySigner) -> Result<Address, ExecutionError> {
    Ok(funder_address(config)?.unwrap_or_else(|| signer.address()))
}

/// Get the wallet address from a private key.
pub fn address_from_private_key(private_key: &str) -> Result<String, ExecutionError> {
    let signer = create_signer(private_key)?;
    Ok(format!("{:?}", signer.address()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{test_config, TEST_KEY};

    #[test]
    fn signature_type_conversion() {
        assert!(matches!(signature_type_from_u8(0), SignatureType::Eoa));
        assert!(matches!(signature_type_from_u8(1), SignatureType::Proxy));
        assert!(matches!(signature_type_from_u8(2), SignatureType::GnosisSafe));
        assert!(matches!(signature_type_from_u8(99), SignatureType::Eoa));
    }

    #[test]
    fn create_signer_with_and_without_prefix() {
        assert!(create_signer(TEST_KEY).is_ok());
        assert!(create_signer(TEST_KEY.trim_start_matches("0x")).is_ok());
    }

    #[test]
    fn signer_is_bound_to_polygon() {
        let signer = create_signer(TEST_KEY).unwrap();
        assert_eq!(signer.chain_id(), Some(POLYGON));
    }

    #[test]
    fn create_signer_rejects_bad_keys() {
        assert!(create_signer("0xnot_valid_hex").is_err());
        assert!(create_signer("0x0123456789abcdef").is_err());
    }

    #[test]
    fn address_from_key() {
        let address = address_from_private_key(TEST_KEY).unwrap();
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42);
    }

    #[test]
    fn position_holder_prefers_funder() {
        let signer = create_signer(TEST_KEY).unwrap();
        let config = test_config();
        assert_eq!(position_holder(&config, &signer).unwrap(), signer.address());

        let config = Config {
            polymarket_funder: Some("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174".to_string()),
            ..test_config()
        };
        assert_eq!(
            format!("{:?}", position_holder(&config, &signer).unwrap()).to_lowercase(),
            "0x2791bca1f2de4661ed88a30c99a7a9449aa84174"
        );
    }
}
