//! Statechain core types
//!
//! Shared primitives for the storage and ledger layers:
//! - account addresses and their human readable encoding
//! - multi-denomination balances (`Coins`) with non-negativity invariants
//! - event tags emitted by state mutations
//! - transaction content hashing

pub mod address;
pub mod coins;
pub mod tags;
pub mod tx;

pub use address::{decode_address, encode_address, is_valid_address, Address, AddressError};
pub use coins::{Coin, Coins, CoinsError};
pub use tags::{Tag, Tags, TAG_RECIPIENT, TAG_SENDER};
pub use tx::tx_hash;

/// Module version for API introspection
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
