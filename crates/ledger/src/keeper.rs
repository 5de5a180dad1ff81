//! View / Send / Base keeper tiers.
//!
//! Each tier is an explicit capability struct holding only the dependencies
//! it needs, composed by construction: the view tier reads balances, the send
//! tier adds two-party transfers, the base tier adds unconditional writes and
//! multi-party settlement.
//!
//! Atomicity contract: on any error the caller discards the enclosing
//! [`TxContext`]; the keepers perform no local rollback.

use crate::account::AccountKeeper;
use crate::errors::LedgerError;
use crate::history::HistoryKeeper;
use statechain_store::TxContext;
use statechain_types::{Address, Coins, Tags, TAG_RECIPIENT, TAG_SENDER};

/// One settlement input: coins to subtract from an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub address: Address,
    pub coins: Coins,
}

/// One settlement output: coins to add to an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub address: Address,
    pub coins: Coins,
}

/// Read-only access to account balances.
pub struct ViewKeeper<AK> {
    accounts: AK,
}

impl<AK: AccountKeeper> ViewKeeper<AK> {
    pub fn new(accounts: AK) -> Self {
        Self { accounts }
    }

    /// Balance at `addr`; empty (never an error) if the account is absent.
    pub fn coins(&self, ctx: &mut TxContext<'_>, addr: &Address) -> Result<Coins, LedgerError> {
        get_coins(ctx, &self.accounts, addr)
    }

    /// Whether `addr` holds at least `amt` in every denomination. A missing
    /// denomination counts as zero.
    pub fn has_coins(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
        amt: &Coins,
    ) -> Result<bool, LedgerError> {
        Ok(self.coins(ctx, addr)?.is_all_gte(amt))
    }
}

/// Transfers between accounts, without the ability to create coins.
pub struct SendKeeper<AK> {
    view: ViewKeeper<AK>,
    history: HistoryKeeper,
}

impl<AK: AccountKeeper> SendKeeper<AK> {
    pub fn new(accounts: AK, history: HistoryKeeper) -> Self {
        Self {
            view: ViewKeeper::new(accounts),
            history,
        }
    }

    pub fn view(&self) -> &ViewKeeper<AK> {
        &self.view
    }

    pub fn coins(&self, ctx: &mut TxContext<'_>, addr: &Address) -> Result<Coins, LedgerError> {
        self.view.coins(ctx, addr)
    }

    pub fn has_coins(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
        amt: &Coins,
    ) -> Result<bool, LedgerError> {
        self.view.has_coins(ctx, addr, amt)
    }

    /// Atomically move `amt` from `from` to `to`.
    ///
    /// If the subtraction would overdraw any denomination the whole call
    /// fails before the credit runs and no balance is mutated.
    pub fn send_coins(
        &self,
        ctx: &mut TxContext<'_>,
        from: &Address,
        to: &Address,
        amt: &Coins,
    ) -> Result<Tags, LedgerError> {
        let (_, mut tags) = subtract_coins(ctx, &self.view.accounts, &self.history, from, amt)?;
        let (_, add_tags) = add_coins(ctx, &self.view.accounts, &self.history, to, amt)?;
        tags.append_tags(add_tags);
        tracing::debug!(%from, %to, amount = %amt, "coins sent");
        Ok(tags)
    }

    /// Transaction hashes recorded for `addr`, most recent first.
    pub fn history(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
    ) -> Result<Vec<String>, LedgerError> {
        self.history.history(ctx, addr)
    }
}

/// Full ledger capability: everything in the send tier plus unconditional
/// writes and multi-party settlement.
pub struct BaseKeeper<AK> {
    send: SendKeeper<AK>,
}

impl<AK: AccountKeeper> BaseKeeper<AK> {
    pub fn new(accounts: AK, history: HistoryKeeper) -> Self {
        Self {
            send: SendKeeper::new(accounts, history),
        }
    }

    pub fn send(&self) -> &SendKeeper<AK> {
        &self.send
    }

    pub fn coins(&self, ctx: &mut TxContext<'_>, addr: &Address) -> Result<Coins, LedgerError> {
        self.send.coins(ctx, addr)
    }

    pub fn has_coins(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
        amt: &Coins,
    ) -> Result<bool, LedgerError> {
        self.send.has_coins(ctx, addr, amt)
    }

    pub fn send_coins(
        &self,
        ctx: &mut TxContext<'_>,
        from: &Address,
        to: &Address,
        amt: &Coins,
    ) -> Result<Tags, LedgerError> {
        self.send.send_coins(ctx, from, to, amt)
    }

    pub fn history(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
    ) -> Result<Vec<String>, LedgerError> {
        self.send.history(ctx, addr)
    }

    /// Overwrite the balance at `addr`, creating the account if absent.
    pub fn set_coins(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
        amt: Coins,
    ) -> Result<(), LedgerError> {
        set_coins(ctx, &self.send.view.accounts, addr, amt)
    }

    /// Subtract `amt` from `addr`, returning the new balance and a `sender`
    /// tag, and recording a history entry for the address.
    pub fn subtract_coins(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
        amt: &Coins,
    ) -> Result<(Coins, Tags), LedgerError> {
        subtract_coins(ctx, &self.send.view.accounts, &self.send.history, addr, amt)
    }

    /// Add `amt` to `addr`, returning the new balance and a `recipient` tag,
    /// and recording a history entry for the address.
    pub fn add_coins(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
        amt: &Coins,
    ) -> Result<(Coins, Tags), LedgerError> {
        add_coins(ctx, &self.send.view.accounts, &self.send.history, addr, amt)
    }

    /// Generalized multi-party settlement: subtract every input, then add
    /// every output, in the given order.
    ///
    /// The first failing step aborts the whole call with its error. Partial
    /// effects stay confined to the enclosing buffered context, which the
    /// caller discards on error.
    pub fn input_output_coins(
        &self,
        ctx: &mut TxContext<'_>,
        inputs: &[Input],
        outputs: &[Output],
    ) -> Result<Tags, LedgerError> {
        let mut all_tags = Tags::empty();

        for input in inputs {
            let (_, tags) = subtract_coins(
                ctx,
                &self.send.view.accounts,
                &self.send.history,
                &input.address,
                &input.coins,
            )?;
            all_tags.append_tags(tags);
        }

        for output in outputs {
            let (_, tags) = add_coins(
                ctx,
                &self.send.view.accounts,
                &self.send.history,
                &output.address,
                &output.coins,
            )?;
            all_tags.append_tags(tags);
        }

        Ok(all_tags)
    }
}

fn get_coins<AK: AccountKeeper>(
    ctx: &mut TxContext<'_>,
    accounts: &AK,
    addr: &Address,
) -> Result<Coins, LedgerError> {
    Ok(accounts
        .account(ctx, addr)?
        .map(|account| account.coins)
        .unwrap_or_else(Coins::empty))
}

fn set_coins<AK: AccountKeeper>(
    ctx: &mut TxContext<'_>,
    accounts: &AK,
    addr: &Address,
    amt: Coins,
) -> Result<(), LedgerError> {
    let mut account = match accounts.account(ctx, addr)? {
        Some(account) => account,
        None => accounts.new_account_with_address(addr),
    };
    account.coins = amt;
    accounts.set_account(ctx, &account)
}

fn subtract_coins<AK: AccountKeeper>(
    ctx: &mut TxContext<'_>,
    accounts: &AK,
    history: &HistoryKeeper,
    addr: &Address,
    amt: &Coins,
) -> Result<(Coins, Tags), LedgerError> {
    let old_coins = get_coins(ctx, accounts, addr)?;
    let new_coins = match old_coins.safe_sub(amt) {
        Ok(new_coins) => new_coins,
        Err(_) => {
            return Err(LedgerError::InsufficientFunds {
                available: old_coins,
                attempted: amt.clone(),
            })
        }
    };

    set_coins(ctx, accounts, addr, new_coins.clone())?;
    history.record(ctx, addr)?;
    Ok((new_coins, Tags::single(TAG_SENDER, addr.to_string())))
}

fn add_coins<AK: AccountKeeper>(
    ctx: &mut TxContext<'_>,
    accounts: &AK,
    history: &HistoryKeeper,
    addr: &Address,
    amt: &Coins,
) -> Result<(Coins, Tags), LedgerError> {
    let old_coins = get_coins(ctx, accounts, addr)?;
    let new_coins = old_coins.plus(amt);
    // guard against malformed inputs that slipped past Coins validation
    if !new_coins.is_not_negative() {
        return Err(LedgerError::InsufficientFunds {
            available: old_coins,
            attempted: amt.clone(),
        });
    }

    set_coins(ctx, accounts, addr, new_coins.clone())?;
    history.record(ctx, addr)?;
    Ok((new_coins, Tags::single(TAG_RECIPIENT, addr.to_string())))
}
