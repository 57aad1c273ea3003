//! # Wallet Reducer
//!
//! An append-only ledger of `(address, credit, debit)` movements; balances
//! are derived. Two event types:
//!
//! - `wallet.mint` - privileged issuers credit an address, no fee.
//! - `wallet.transfer` - debits `from` by `amount + fee`, credits `to` by
//!   `amount`, credits the protocol fee pool by `fee`.
//!
//! Conservation: every non-mint movement's credits equal its debits, so the
//! ledger sums to zero outside minting. Escrow holdings move through
//! synthetic `escrow:<id>` addresses, keeping escrowed funds inside the
//! same conservation check.

use souk_types::{EventEnvelope, TokenAmount};

use crate::dispatch::{parse_payload, ApplyContext};
use crate::errors::ReducerError;
use crate::payloads::{WalletMint, WalletTransfer};
use crate::state::{LedgerEntry, LedgerState, FEE_POOL_ADDRESS};

/// `wallet.mint`
pub fn mint(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
    ctx: &ApplyContext<'_>,
) -> Result<(), ReducerError> {
    let payload: WalletMint = parse_payload(envelope)?;

    if !ctx.config.mint_authorities.contains(&envelope.issuer) {
        return Err(ReducerError::UnauthorizedIssuer {
            issuer: envelope.issuer.clone(),
            operation: envelope.event_type.clone(),
        });
    }

    credit(state, &envelope.hash, &payload.to, &payload.amount);
    state.wallet.total_minted = state.wallet.total_minted.checked_add(&payload.amount);
    Ok(())
}

/// `wallet.transfer`
pub fn transfer(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
    ctx: &ApplyContext<'_>,
) -> Result<(), ReducerError> {
    let payload: WalletTransfer = parse_payload(envelope)?;

    // Only the key behind `from` can spend from it
    if payload.from != ctx.issuer_address {
        return Err(ReducerError::UnauthorizedIssuer {
            issuer: envelope.issuer.clone(),
            operation: envelope.event_type.clone(),
        });
    }

    let needed = payload.amount.checked_add(&payload.fee);
    debit_checked(state, &envelope.hash, &payload.from, &needed)?;
    credit(state, &envelope.hash, &payload.to, &payload.amount);
    if !payload.fee.is_zero() {
        credit(state, &envelope.hash, FEE_POOL_ADDRESS, &payload.fee);
    }
    Ok(())
}

/// Credit an address and record the ledger entry.
pub(crate) fn credit(state: &mut LedgerState, event: &str, address: &str, amount: &TokenAmount) {
    let balance = state.wallet.balance(address).checked_add(amount);
    state.wallet.balances.insert(address.to_string(), balance);
    state.wallet.ledger.push(LedgerEntry {
        event: event.to_string(),
        address: address.to_string(),
        credit: amount.clone(),
        debit: TokenAmount::zero(),
    });
}

/// Debit an address after an availability check, recording the entry.
pub(crate) fn debit_checked(
    state: &mut LedgerState,
    event: &str,
    address: &str,
    amount: &TokenAmount,
) -> Result<(), ReducerError> {
    let available = state.wallet.balance(address);
    let Some(balance) = available.checked_sub(amount) else {
        return Err(ReducerError::InsufficientBalance {
            address: address.to_string(),
            needed: amount.to_decimal_string(),
            available: available.to_decimal_string(),
        });
    };
    state.wallet.balances.insert(address.to_string(), balance);
    state.wallet.ledger.push(LedgerEntry {
        event: event.to_string(),
        address: address.to_string(),
        credit: TokenAmount::zero(),
        debit: amount.clone(),
    });
    Ok(())
}
