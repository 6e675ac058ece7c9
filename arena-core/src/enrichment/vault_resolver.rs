use alloy_primitives::Address;
use tracing::{error, warn};

use crate::entities::{VaultContext, normalize_address};
use crate::store::SharedStore;

/// Tells whether a trader address is a copy-trading vault, and whose.
#[derive(Clone)]
pub struct VaultResolver {
    store: SharedStore,
}

impl VaultResolver {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// `None` for ordinary traders.
    ///
    /// Several bindings for one vault is a data anomaly: the first recorded
    /// one wins. A store failure also yields `None` so that indexing carries
    /// on.
    pub async fn resolve(&self, trader: &Address) -> Option<VaultContext> {
        let bindings = match self.store.vault_bindings_by_address(trader).await {
            Ok(bindings) => bindings,
            Err(e) => {
                error!(
                    trader = %normalize_address(trader),
                    error = %e,
                    "Failed to look up vault bindings"
                );
                return None;
            }
        };

        if bindings.len() > 1 {
            warn!(
                trader = %normalize_address(trader),
                bindings = bindings.len(),
                "Multiple vault bindings for one address, using the first"
            );
        }

        bindings.into_iter().next().map(VaultContext::from)
    }
}
