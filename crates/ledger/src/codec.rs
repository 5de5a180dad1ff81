//! Serialization strategy for persisted ledger state.
//!
//! The codec is an explicit capability handed to keeper construction; there
//! is no global registry. Any decode failure means the persisted state is
//! corrupt and surfaces as the fatal [`LedgerError::Serialization`].

use crate::account::Account;
use crate::errors::LedgerError;

/// Encoding/decoding of account and history blobs.
pub trait LedgerCodec: Send + Sync {
    fn encode_account(&self, account: &Account) -> Result<Vec<u8>, LedgerError>;
    fn decode_account(&self, bytes: &[u8]) -> Result<Account, LedgerError>;
    fn encode_history(&self, entries: &[String]) -> Result<Vec<u8>, LedgerError>;
    fn decode_history(&self, bytes: &[u8]) -> Result<Vec<String>, LedgerError>;
}

/// JSON codec used by the default deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl LedgerCodec for JsonCodec {
    fn encode_account(&self, account: &Account) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec(account).map_err(|err| LedgerError::Serialization(err.to_string()))
    }

    fn decode_account(&self, bytes: &[u8]) -> Result<Account, LedgerError> {
        serde_json::from_slice(bytes).map_err(|err| LedgerError::Serialization(err.to_string()))
    }

    fn encode_history(&self, entries: &[String]) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec(entries).map_err(|err| LedgerError::Serialization(err.to_string()))
    }

    fn decode_history(&self, bytes: &[u8]) -> Result<Vec<String>, LedgerError> {
        serde_json::from_slice(bytes).map_err(|err| LedgerError::Serialization(err.to_string()))
    }
}
