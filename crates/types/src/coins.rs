//! Multi-denomination account balances.
//!
//! A [`Coins`] value is an ordered-by-denomination, denomination-unique set of
//! non-negative arbitrary-precision amounts. Zero entries are normalized away
//! at construction, so a persisted balance never carries dead denominations.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised while constructing or combining balances.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoinsError {
    #[error("denomination must not be empty")]
    EmptyDenom,
    #[error("duplicate denomination '{0}'")]
    DuplicateDenom(String),
    #[error("negative amount for denomination '{0}'")]
    NegativeAmount(String),
    #[error("subtraction would drive denomination '{denom}' negative")]
    WouldGoNegative { denom: String },
}

/// A single (denomination, amount) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: BigInt,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: impl Into<BigInt>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Normalized multi-denomination balance.
///
/// Invariants: entries are sorted by denomination, denominations are unique,
/// and every stored amount is strictly positive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coin>", into = "Vec<Coin>")]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Empty balance.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a normalized balance from arbitrary coin entries.
    ///
    /// Rejects empty denominations, duplicates and negative amounts; strips
    /// zero-amount entries.
    pub fn new(entries: Vec<Coin>) -> Result<Self, CoinsError> {
        let mut coins = entries;
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));

        for pair in coins.windows(2) {
            if pair[0].denom == pair[1].denom {
                return Err(CoinsError::DuplicateDenom(pair[1].denom.clone()));
            }
        }
        for coin in &coins {
            if coin.denom.is_empty() {
                return Err(CoinsError::EmptyDenom);
            }
            if coin.amount.is_negative() {
                return Err(CoinsError::NegativeAmount(coin.denom.clone()));
            }
        }

        coins.retain(|c| !c.amount.is_zero());
        Ok(Self(coins))
    }

    /// Convenience constructor for a single-denomination balance.
    pub fn single(denom: impl Into<String>, amount: impl Into<BigInt>) -> Result<Self, CoinsError> {
        Self::new(vec![Coin::new(denom, amount)])
    }

    /// Amount held for `denom`, zero if the denomination is absent.
    pub fn amount_of(&self, denom: &str) -> BigInt {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount.clone())
            .unwrap_or_else(BigInt::zero)
    }

    /// Component-wise sum. Never fails for two valid balances.
    pub fn plus(&self, other: &Coins) -> Coins {
        let mut merged = self.0.clone();
        for coin in &other.0 {
            match merged.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
                Ok(idx) => merged[idx].amount += &coin.amount,
                Err(idx) => merged.insert(idx, coin.clone()),
            }
        }
        merged.retain(|c| !c.amount.is_zero());
        Coins(merged)
    }

    /// Component-wise subtraction that refuses to go negative.
    ///
    /// Returns the first denomination that would be overdrawn; on failure no
    /// partial result is produced.
    pub fn safe_sub(&self, other: &Coins) -> Result<Coins, CoinsError> {
        let mut result = self.0.clone();
        for coin in &other.0 {
            match result.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
                Ok(idx) => {
                    result[idx].amount -= &coin.amount;
                    if result[idx].amount.is_negative() {
                        return Err(CoinsError::WouldGoNegative {
                            denom: coin.denom.clone(),
                        });
                    }
                }
                Err(_) => {
                    if !coin.amount.is_zero() {
                        return Err(CoinsError::WouldGoNegative {
                            denom: coin.denom.clone(),
                        });
                    }
                }
            }
        }
        result.retain(|c| !c.amount.is_zero());
        Ok(Coins(result))
    }

    /// Whether every denomination in `other` is covered by this balance.
    /// A denomination missing here counts as zero.
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other
            .0
            .iter()
            .all(|coin| self.amount_of(&coin.denom) >= coin.amount)
    }

    /// Defensive check used after arithmetic on untrusted inputs.
    pub fn is_not_negative(&self) -> bool {
        self.0.iter().all(|c| !c.amount.is_negative())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }
}

impl TryFrom<Vec<Coin>> for Coins {
    type Error = CoinsError;

    fn try_from(value: Vec<Coin>) -> Result<Self, Self::Error> {
        Coins::new(value)
    }
}

impl From<Coins> for Vec<Coin> {
    fn from(value: Coins) -> Self {
        value.0
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("");
        }
        let rendered: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&rendered.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(entries: &[(&str, i64)]) -> Coins {
        Coins::new(
            entries
                .iter()
                .map(|(d, a)| Coin::new(*d, *a))
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn construction_sorts_and_strips_zeros() {
        let c = coins(&[("token", 5), ("stake", 100), ("dust", 0)]);
        assert_eq!(c.len(), 2);
        assert_eq!(c.to_string(), "100stake,5token");
    }

    #[test]
    fn construction_rejects_invalid_entries() {
        assert!(matches!(
            Coins::new(vec![Coin::new("stake", 1), Coin::new("stake", 2)]),
            Err(CoinsError::DuplicateDenom(_))
        ));
        assert!(matches!(
            Coins::new(vec![Coin::new("stake", -1)]),
            Err(CoinsError::NegativeAmount(_))
        ));
        assert!(matches!(
            Coins::new(vec![Coin::new("", 1)]),
            Err(CoinsError::EmptyDenom)
        ));
    }

    #[test]
    fn plus_merges_by_denom() {
        let sum = coins(&[("stake", 60)]).plus(&coins(&[("stake", 40), ("token", 1)]));
        assert_eq!(sum, coins(&[("stake", 100), ("token", 1)]));
    }

    #[test]
    fn safe_sub_detects_overdraw() {
        let balance = coins(&[("stake", 100)]);
        let err = balance.safe_sub(&coins(&[("stake", 150)])).unwrap_err();
        assert_eq!(
            err,
            CoinsError::WouldGoNegative {
                denom: "stake".into()
            }
        );
        // missing denomination counts as zero
        assert!(balance.safe_sub(&coins(&[("token", 1)])).is_err());
        // exact spend empties the entry entirely
        let rest = balance.safe_sub(&coins(&[("stake", 100)])).unwrap();
        assert!(rest.is_zero());
    }

    #[test]
    fn is_all_gte_treats_missing_as_zero() {
        let balance = coins(&[("stake", 100), ("token", 5)]);
        assert!(balance.is_all_gte(&coins(&[("stake", 100)])));
        assert!(!balance.is_all_gte(&coins(&[("stake", 101)])));
        assert!(!balance.is_all_gte(&coins(&[("atom", 1)])));
        assert!(balance.is_all_gte(&Coins::empty()));
    }
}
