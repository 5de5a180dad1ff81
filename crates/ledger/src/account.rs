//! Account persistence behind the keeper tiers.

use crate::codec::LedgerCodec;
use crate::errors::LedgerError;
use serde::{Deserialize, Serialize};
use statechain_store::{KVStore, TxContext};
use statechain_types::{Address, Coins};
use std::sync::Arc;

/// Key prefix for serialized accounts within the bound sub-store.
pub const ACCOUNT_KEY_PREFIX: u8 = 0x00;

/// A single account: address plus multi-denomination balance.
///
/// Accounts are created lazily on first credit and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub coins: Coins,
}

/// Sole path to persisted balances. The keeper tiers never touch the
/// multistore directly.
pub trait AccountKeeper {
    fn account(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
    ) -> Result<Option<Account>, LedgerError>;

    fn new_account_with_address(&self, addr: &Address) -> Account;

    fn set_account(&self, ctx: &mut TxContext<'_>, account: &Account) -> Result<(), LedgerError>;
}

/// Account keeper backed by a named sub-store, with an injected codec.
/// The store binding is fixed at construction.
pub struct StoreAccountKeeper {
    store: String,
    codec: Arc<dyn LedgerCodec>,
}

impl StoreAccountKeeper {
    pub fn new(store: impl Into<String>, codec: Arc<dyn LedgerCodec>) -> Self {
        Self {
            store: store.into(),
            codec,
        }
    }

    fn key(addr: &Address) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + addr.as_bytes().len());
        key.push(ACCOUNT_KEY_PREFIX);
        key.extend_from_slice(addr.as_bytes());
        key
    }
}

impl AccountKeeper for StoreAccountKeeper {
    fn account(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
    ) -> Result<Option<Account>, LedgerError> {
        let store = ctx.kv_store(&self.store)?;
        match store.get(&Self::key(addr))? {
            Some(raw) => Ok(Some(self.codec.decode_account(&raw)?)),
            None => Ok(None),
        }
    }

    fn new_account_with_address(&self, addr: &Address) -> Account {
        Account {
            address: *addr,
            coins: Coins::empty(),
        }
    }

    fn set_account(&self, ctx: &mut TxContext<'_>, account: &Account) -> Result<(), LedgerError> {
        let raw = self.codec.encode_account(account)?;
        let store = ctx.kv_store(&self.store)?;
        store.set(&Self::key(&account.address), &raw);
        Ok(())
    }
}
