//! Trade size as a fraction of the vault's portfolio, in basis points.

use alloy_primitives::{Address, U256, Uint};
use tracing::error;

use crate::entities::{VaultBalanceSnapshot, normalize_address};
use crate::store::SharedStore;

/// 100%.
pub const MAX_BPS: u16 = 10_000;

type U512 = Uint<512, 8>;

#[derive(Clone)]
pub struct PositionSizer {
    store: SharedStore,
}

impl PositionSizer {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// `trade_value` relative to the latest balance known at `as_of_block`.
    ///
    /// `None` on cold start (no snapshot yet), on an empty vault, and when the
    /// snapshots cannot be read.
    pub async fn size_to_portfolio_bps(
        &self,
        vault: &Address,
        as_of_block: u64,
        trade_value: U256,
    ) -> Option<u16> {
        let snapshots = match self.store.balance_snapshots_by_vault(vault).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!(
                    vault = %normalize_address(vault),
                    error = %e,
                    "Failed to load balance snapshots"
                );
                return None;
            }
        };

        let snapshot = latest_snapshot_at(&snapshots, as_of_block)?;
        ratio_bps(trade_value, snapshot.post_balance)
    }
}

/// The snapshot with the greatest `(block_number, block_timestamp)` not after
/// `as_of_block`.
pub fn latest_snapshot_at(
    snapshots: &[VaultBalanceSnapshot],
    as_of_block: u64,
) -> Option<&VaultBalanceSnapshot> {
    snapshots
        .iter()
        .filter(|s| s.block_number <= as_of_block)
        .max_by_key(|s| s.recency())
}

/// `floor(trade_value * 10000 / post_balance)` clamped to [`MAX_BPS`].
///
/// The product is taken in 512 bits so it cannot overflow.
pub fn ratio_bps(trade_value: U256, post_balance: U256) -> Option<u16> {
    if post_balance.is_zero() {
        return None;
    }
    let scaled: U512 = trade_value.widening_mul(U256::from(MAX_BPS));
    let ratio = scaled / U512::from(post_balance);
    let clamped = ratio.min(U512::from(MAX_BPS));
    Some(u16::try_from(clamped).unwrap_or(MAX_BPS))
}
