//! DEX-agnostic trade actions.
//!
//! The control plane replays a monachad's trade for supporters by relaying an
//! opaque `(target, value, data)` call. Only this module knows the ABI of
//! each configured DEX.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};
use arena_sdk::Quantity;
use arena_sdk::objects::{SourceEventRef, TradeMetadata, TradePayload};
use thiserror::Error;

use crate::config::{DexKind, DexRegistry};
use crate::entities::VaultContext;
use crate::events::{PositionClosed, PositionOpened};

sol! {
    interface IPerpetualDex {
        function openPosition(address market, bool isLong, uint256 collateral, uint256 leverage) external payable returns (uint256 positionId);
        function closePosition(uint256 positionId) external;
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("no DEX configured at {0}")]
    UnknownDex(Address),
}

/// A contract call ready to be relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall {
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
}

/// Re-encode an open as a call on the DEX that emitted it.
pub fn encode_open(
    dexes: &DexRegistry,
    dex: &Address,
    params: &PositionOpened,
) -> Result<EncodedCall, EncodeError> {
    let config = dexes.get(dex).ok_or(EncodeError::UnknownDex(*dex))?;
    match config.kind {
        DexKind::PerpetualV1 => {
            let collateral = params.collateral.into_inner();
            let data = IPerpetualDex::openPositionCall {
                market: params.market,
                isLong: params.is_long,
                collateral,
                leverage: params.leverage.into_inner(),
            }
            .abi_encode();
            Ok(EncodedCall {
                target: config.address,
                value: if config.native_collateral {
                    collateral
                } else {
                    U256::ZERO
                },
                data: Bytes::from(data),
            })
        }
    }
}

pub fn encode_close(
    dexes: &DexRegistry,
    dex: &Address,
    params: &PositionClosed,
) -> Result<EncodedCall, EncodeError> {
    let config = dexes.get(dex).ok_or(EncodeError::UnknownDex(*dex))?;
    match config.kind {
        DexKind::PerpetualV1 => {
            let data = IPerpetualDex::closePositionCall {
                positionId: params.position_id.into_inner(),
            }
            .abi_encode();
            Ok(EncodedCall {
                target: config.address,
                value: U256::ZERO,
                data: Bytes::from(data),
            })
        }
    }
}

/// A resolved, sized and encoded trade of a monachad's vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedTradeAction {
    pub monachad_address: Address,
    pub match_id: String,
    pub call: EncodedCall,
    pub size_to_portfolio_bps: Option<u16>,
    pub source: SourceEventRef,
    pub metadata: TradeMetadata,
}

impl EnrichedTradeAction {
    pub fn opened(
        vault: VaultContext,
        call: EncodedCall,
        size_to_portfolio_bps: Option<u16>,
        source: SourceEventRef,
        params: &PositionOpened,
    ) -> Self {
        let metadata = TradeMetadata {
            position_id: params.position_id,
            vault_address: vault.vault_address,
            size_to_portfolio_bps: size_to_portfolio_bps.map(Quantity::from),
            market: Some(params.market),
            is_long: Some(params.is_long),
            collateral: Some(params.collateral),
            leverage: Some(params.leverage),
            payout: None,
        };
        Self {
            monachad_address: vault.monachad_address,
            match_id: vault.match_id,
            call,
            size_to_portfolio_bps,
            source,
            metadata,
        }
    }

    pub fn closed(
        vault: VaultContext,
        call: EncodedCall,
        size_to_portfolio_bps: Option<u16>,
        source: SourceEventRef,
        params: &PositionClosed,
    ) -> Self {
        let metadata = TradeMetadata {
            position_id: params.position_id,
            vault_address: vault.vault_address,
            size_to_portfolio_bps: size_to_portfolio_bps.map(Quantity::from),
            market: None,
            is_long: None,
            collateral: None,
            leverage: None,
            payout: Some(params.payout),
        };
        Self {
            monachad_address: vault.monachad_address,
            match_id: vault.match_id,
            call,
            size_to_portfolio_bps,
            source,
            metadata,
        }
    }

    pub fn into_payload(self) -> TradePayload {
        TradePayload {
            source: self.source,
            monachad_address: self.monachad_address,
            match_id: self.match_id,
            target: self.call.target,
            value: Quantity::new(self.call.value),
            data: self.call.data,
            metadata: self.metadata,
        }
    }
}
