//! # Escrow Reducer
//!
//! Lifecycle: `pending -> funded -> (releasing* | refunded | released |
//! disputed)`. Funds move through a synthetic `escrow:<id>` ledger address
//! so the wallet's conservation invariant covers held balances.
//!
//! Rules of note:
//!
//! - A release must cite a `ruleId` recorded at creation; a rule with a
//!   `max_amount` caps each release under it.
//! - Partial releases leave the escrow `releasing` until the remaining
//!   balance reaches zero (`released`).
//! - Refunds require a reason. Depositor-driven refunds are expiry-only
//!   (`ts >= expiresAt`); the beneficiary may hand funds back at any time.

use souk_types::{EventEnvelope, ResourceKind};

use crate::dispatch::parse_payload;
use crate::errors::ReducerError;
use crate::payloads::{EscrowCreate, EscrowFund, EscrowRef, EscrowRefund, EscrowRelease};
use crate::state::{EscrowRecord, EscrowStatus, LedgerState, ReleaseRule};
use crate::wallet;

/// Ledger address holding an escrow's funds.
#[must_use]
pub fn escrow_address(id: &str) -> String {
    format!("escrow:{id}")
}

/// `escrow.create`
pub fn create(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: EscrowCreate = parse_payload(envelope)?;

    // The beneficiary must resolve to a wallet address before any funds move
    souk_crypto::address_from_did(&payload.beneficiary).map_err(|e| {
        ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: format!("beneficiary: {e}"),
        }
    })?;

    state.escrows.insert(
        payload.id.clone(),
        EscrowRecord {
            id: payload.id.clone(),
            depositor: envelope.issuer.clone(),
            beneficiary: payload.beneficiary,
            amount: payload.amount,
            funded: Default::default(),
            released: Default::default(),
            refunded: Default::default(),
            release_rules: payload
                .release_rules
                .into_iter()
                .map(|r| ReleaseRule {
                    id: r.id,
                    max_amount: r.max_amount,
                })
                .collect(),
            expires_at: payload.expires_at,
            status: EscrowStatus::Pending,
        },
    );
    Ok(())
}

/// `escrow.fund` - depositor moves wallet funds into the escrow.
pub fn fund(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
    ctx: &crate::dispatch::ApplyContext<'_>,
) -> Result<(), ReducerError> {
    let payload: EscrowFund = parse_payload(envelope)?;
    let escrow = existing(state, &payload.id)?;

    if escrow.depositor != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if !matches!(escrow.status, EscrowStatus::Pending | EscrowStatus::Funded) {
        return Err(bad_transition(escrow, "funded"));
    }

    let target = escrow.amount.clone();
    let funded_after = escrow.funded.checked_add(&payload.amount);
    if funded_after > target {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: format!(
                "overfunding: {funded_after} exceeds escrow amount {target}"
            ),
        });
    }

    let escrow_addr = escrow_address(&payload.id);
    wallet::debit_checked(state, &envelope.hash, &ctx.issuer_address, &payload.amount)?;
    wallet::credit(state, &envelope.hash, &escrow_addr, &payload.amount);

    let escrow = existing(state, &payload.id)?;
    escrow.funded = funded_after.clone();
    if funded_after == target {
        escrow.status = EscrowStatus::Funded;
    }
    Ok(())
}

/// `escrow.release` - depositor releases funds to the beneficiary under a
/// recorded rule.
pub fn release(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: EscrowRelease = parse_payload(envelope)?;
    let escrow = existing(state, &payload.id)?;

    if escrow.depositor != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if !matches!(escrow.status, EscrowStatus::Funded | EscrowStatus::Releasing) {
        return Err(bad_transition(escrow, "releasing"));
    }

    let remaining = escrow.remaining();
    if remaining.is_zero() {
        return Err(ReducerError::EscrowSettled {
            id: payload.id.clone(),
        });
    }

    let rule = escrow
        .release_rules
        .iter()
        .find(|r| r.id == payload.rule_id)
        .ok_or_else(|| ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: format!("unknown release rule {}", payload.rule_id),
        })?;
    if let Some(max) = &rule.max_amount {
        if payload.amount > *max {
            return Err(ReducerError::InvalidPayload {
                event_type: envelope.event_type.clone(),
                reason: format!("release {} exceeds rule cap {max}", payload.amount),
            });
        }
    }
    if payload.amount > remaining {
        return Err(ReducerError::InsufficientBalance {
            address: escrow_address(&payload.id),
            needed: payload.amount.to_decimal_string(),
            available: remaining.to_decimal_string(),
        });
    }

    let beneficiary_addr = souk_crypto::address_from_did(&escrow.beneficiary)
        .map_err(|e| ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: format!("beneficiary: {e}"),
        })?
        .as_str()
        .to_string();

    let escrow_addr = escrow_address(&payload.id);
    wallet::debit_checked(state, &envelope.hash, &escrow_addr, &payload.amount)?;
    wallet::credit(state, &envelope.hash, &beneficiary_addr, &payload.amount);

    let escrow = existing(state, &payload.id)?;
    escrow.released = escrow.released.checked_add(&payload.amount);
    escrow.status = if escrow.remaining().is_zero() {
        EscrowStatus::Released
    } else {
        EscrowStatus::Releasing
    };
    Ok(())
}

/// `escrow.dispute` - either party freezes releases pending resolution.
/// Refunds stay possible (they settle disputes in practice).
pub fn dispute(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: EscrowRef = parse_payload(envelope)?;
    let escrow = existing(state, &payload.id)?;

    if escrow.depositor != envelope.issuer && escrow.beneficiary != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if !matches!(escrow.status, EscrowStatus::Funded | EscrowStatus::Releasing) {
        return Err(bad_transition(escrow, "disputed"));
    }

    escrow.status = EscrowStatus::Disputed;
    Ok(())
}

/// `escrow.refund` - returns held funds to the depositor.
pub fn refund(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: EscrowRefund = parse_payload(envelope)?;
    if payload.reason.trim().is_empty() {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: "refund requires a reason".to_string(),
        });
    }

    let escrow = existing(state, &payload.id)?;
    let is_depositor = escrow.depositor == envelope.issuer;
    let is_beneficiary = escrow.beneficiary == envelope.issuer;
    if !is_depositor && !is_beneficiary {
        return Err(unauthorized(envelope));
    }
    if !matches!(
        escrow.status,
        EscrowStatus::Funded | EscrowStatus::Releasing | EscrowStatus::Disputed
    ) {
        return Err(bad_transition(escrow, "refunded"));
    }

    let remaining = escrow.remaining();
    if remaining.is_zero() {
        return Err(ReducerError::EscrowSettled {
            id: payload.id.clone(),
        });
    }

    // Depositors can only pull funds back once the escrow has expired; the
    // beneficiary may hand them back at any time.
    if is_depositor && envelope.ts < escrow.expires_at {
        return Err(ReducerError::EscrowNotExpired {
            id: payload.id.clone(),
            now: envelope.ts,
            expires_at: escrow.expires_at,
        });
    }

    if payload.amount > remaining {
        return Err(ReducerError::InsufficientBalance {
            address: escrow_address(&payload.id),
            needed: payload.amount.to_decimal_string(),
            available: remaining.to_decimal_string(),
        });
    }

    let depositor_addr = souk_crypto::address_from_did(&escrow.depositor)
        .map_err(|e| ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: format!("depositor: {e}"),
        })?
        .as_str()
        .to_string();

    let escrow_addr = escrow_address(&payload.id);
    wallet::debit_checked(state, &envelope.hash, &escrow_addr, &payload.amount)?;
    wallet::credit(state, &envelope.hash, &depositor_addr, &payload.amount);

    let escrow = existing(state, &payload.id)?;
    escrow.refunded = escrow.refunded.checked_add(&payload.amount);
    if escrow.remaining().is_zero() {
        escrow.status = EscrowStatus::Refunded;
    }
    Ok(())
}

fn existing<'a>(
    state: &'a mut LedgerState,
    id: &str,
) -> Result<&'a mut EscrowRecord, ReducerError> {
    state
        .escrows
        .get_mut(id)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: ResourceKind::Escrow,
            id: id.to_string(),
        })
}

fn unauthorized(envelope: &EventEnvelope) -> ReducerError {
    ReducerError::UnauthorizedIssuer {
        issuer: envelope.issuer.clone(),
        operation: envelope.event_type.clone(),
    }
}

fn bad_transition(escrow: &EscrowRecord, to: &str) -> ReducerError {
    ReducerError::InvalidStatusTransition {
        kind: ResourceKind::Escrow,
        id: escrow.id.clone(),
        from: escrow.status.as_str().to_string(),
        to: to.to_string(),
    }
}
