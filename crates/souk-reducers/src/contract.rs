//! # Contract Reducer
//!
//! Lifecycle: `draft -> negotiating -> pending_signature -> pending_funding
//! -> active -> completed`, with a dispute side branch (`disputed ->
//! resolved`) and milestones (`pending -> submitted -> approved|rejected`).
//!
//! The chain is owned by the client (the creating issuer); the provider is
//! authorized for exactly the counterpart operations: signing, milestone
//! submission, and opening a dispute.
//!
//! Milestone approval is where contract flow meets payments: approving a
//! milestone with a scheduled amount surfaces a [`MilestonePayout`] so the
//! publisher can chain the client's next `escrow.release`. The reducer
//! itself never emits events.

use souk_types::{EventEnvelope, ResourceKind};

use crate::dispatch::{parse_payload, MilestonePayout};
use crate::errors::ReducerError;
use crate::payloads::{ContractCreate, ContractFund, ContractRef, ContractTerms, MilestoneRef};
use crate::state::{ContractRecord, ContractStatus, LedgerState, Milestone, MilestoneStatus};

/// `contract.create` - the issuer becomes the client.
pub fn create(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ContractCreate = parse_payload(envelope)?;

    if payload.provider == envelope.issuer {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: "client and provider must differ".to_string(),
        });
    }

    let milestones = payload
        .milestones
        .into_iter()
        .map(|m| {
            (
                m.id.clone(),
                Milestone {
                    id: m.id,
                    title: m.title,
                    amount: m.amount,
                    status: MilestoneStatus::Pending,
                },
            )
        })
        .collect();

    state.contracts.insert(
        payload.id.clone(),
        ContractRecord {
            id: payload.id.clone(),
            client: envelope.issuer.clone(),
            provider: payload.provider,
            terms: payload.terms,
            milestones,
            escrow_id: None,
            signatures: Default::default(),
            pre_dispute_status: None,
            status: ContractStatus::Draft,
        },
    );
    Ok(())
}

/// `contract.negotiate` - either party updates terms, moving to
/// `negotiating`.
pub fn negotiate(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ContractTerms = parse_payload(envelope)?;
    let contract = existing(state, &payload.id)?;

    require_party(contract, envelope)?;
    if !matches!(
        contract.status,
        ContractStatus::Draft | ContractStatus::Negotiating
    ) {
        return Err(bad_transition(contract, "negotiating"));
    }

    contract.terms = payload.terms;
    contract.status = ContractStatus::Negotiating;
    // Terms changed: previous signatures no longer bind
    contract.signatures.clear();
    Ok(())
}

/// `contract.finalize_terms` - the client freezes terms for signature.
pub fn finalize_terms(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
) -> Result<(), ReducerError> {
    let payload: ContractTerms = parse_payload(envelope)?;
    let contract = existing(state, &payload.id)?;

    require_client(contract, envelope)?;
    if !matches!(
        contract.status,
        ContractStatus::Draft | ContractStatus::Negotiating
    ) {
        return Err(bad_transition(contract, "pending_signature"));
    }

    contract.terms = payload.terms;
    contract.status = ContractStatus::PendingSignature;
    Ok(())
}

/// `contract.sign` - both parties sign; the second signature moves the
/// contract to `pending_funding`.
pub fn sign(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ContractRef = parse_payload(envelope)?;
    let contract = existing(state, &payload.id)?;

    require_party(contract, envelope)?;
    if contract.status != ContractStatus::PendingSignature {
        return Err(bad_transition(contract, "pending_funding"));
    }

    contract.signatures.insert(envelope.issuer.clone());
    if contract.signatures.contains(&contract.client)
        && contract.signatures.contains(&contract.provider)
    {
        contract.status = ContractStatus::PendingFunding;
    }
    Ok(())
}

/// `contract.fund` - the client links the funding escrow, activating the
/// contract.
pub fn fund(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ContractFund = parse_payload(envelope)?;

    if !state.escrows.contains_key(&payload.escrow_id) {
        return Err(ReducerError::ResourceNotFound {
            kind: ResourceKind::Escrow,
            id: payload.escrow_id.clone(),
        });
    }

    let contract = existing(state, &payload.id)?;
    require_client(contract, envelope)?;
    if contract.status != ContractStatus::PendingFunding {
        return Err(bad_transition(contract, "active"));
    }

    contract.escrow_id = Some(payload.escrow_id);
    contract.status = ContractStatus::Active;
    Ok(())
}

/// `contract.complete` - client-only terminal transition.
pub fn complete(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ContractRef = parse_payload(envelope)?;
    let contract = existing(state, &payload.id)?;

    require_client(contract, envelope)?;
    if contract.status != ContractStatus::Active {
        return Err(bad_transition(contract, "completed"));
    }

    contract.status = ContractStatus::Completed;
    Ok(())
}

/// `contract.dispute` - either party, from any non-terminal phase.
pub fn dispute(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ContractRef = parse_payload(envelope)?;
    let contract = existing(state, &payload.id)?;

    require_party(contract, envelope)?;
    if matches!(
        contract.status,
        ContractStatus::Completed | ContractStatus::Disputed | ContractStatus::Resolved
    ) {
        return Err(bad_transition(contract, "disputed"));
    }

    contract.pre_dispute_status = Some(contract.status);
    contract.status = ContractStatus::Disputed;
    Ok(())
}

/// `contract.resolve` - the client records the resolution.
pub fn resolve(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ContractRef = parse_payload(envelope)?;
    let contract = existing(state, &payload.id)?;

    require_client(contract, envelope)?;
    if contract.status != ContractStatus::Disputed {
        return Err(bad_transition(contract, "resolved"));
    }

    contract.status = ContractStatus::Resolved;
    Ok(())
}

/// `contract.milestone.submit` - provider marks work delivered.
pub fn milestone_submit(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
) -> Result<(), ReducerError> {
    let payload: MilestoneRef = parse_payload(envelope)?;
    let contract = existing(state, &payload.id)?;

    if contract.provider != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if contract.status != ContractStatus::Active {
        return Err(ReducerError::ContractNotActive {
            id: payload.id.clone(),
        });
    }

    let milestone = milestone_mut(contract, &payload)?;
    if !matches!(
        milestone.status,
        MilestoneStatus::Pending | MilestoneStatus::Rejected
    ) {
        return Err(ReducerError::MilestoneInvalidState {
            contract_id: payload.id.clone(),
            milestone_id: payload.milestone_id.clone(),
            status: milestone.status.as_str().to_string(),
        });
    }

    milestone.status = MilestoneStatus::Submitted;
    Ok(())
}

/// `contract.milestone.approve` - client approval; exposes the scheduled
/// payout for the publisher to chain.
pub fn milestone_approve(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
) -> Result<Option<MilestonePayout>, ReducerError> {
    let payload: MilestoneRef = parse_payload(envelope)?;
    let contract = existing(state, &payload.id)?;

    require_client(contract, envelope)?;
    if contract.status != ContractStatus::Active {
        return Err(ReducerError::ContractNotActive {
            id: payload.id.clone(),
        });
    }

    let provider = contract.provider.clone();
    let escrow_id = contract.escrow_id.clone();
    let milestone = milestone_mut(contract, &payload)?;
    if milestone.status != MilestoneStatus::Submitted {
        return Err(ReducerError::MilestoneInvalidState {
            contract_id: payload.id.clone(),
            milestone_id: payload.milestone_id.clone(),
            status: milestone.status.as_str().to_string(),
        });
    }

    milestone.status = MilestoneStatus::Approved;

    let payout = milestone.amount.clone().map(|amount| MilestonePayout {
        contract_id: payload.id,
        milestone_id: payload.milestone_id,
        escrow_id,
        beneficiary: provider,
        amount,
    });
    Ok(payout)
}

/// `contract.milestone.reject` - client sends work back.
pub fn milestone_reject(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
) -> Result<(), ReducerError> {
    let payload: MilestoneRef = parse_payload(envelope)?;
    let contract = existing(state, &payload.id)?;

    require_client(contract, envelope)?;
    if contract.status != ContractStatus::Active {
        return Err(ReducerError::ContractNotActive {
            id: payload.id.clone(),
        });
    }

    let milestone = milestone_mut(contract, &payload)?;
    if milestone.status != MilestoneStatus::Submitted {
        return Err(ReducerError::MilestoneInvalidState {
            contract_id: payload.id.clone(),
            milestone_id: payload.milestone_id.clone(),
            status: milestone.status.as_str().to_string(),
        });
    }

    milestone.status = MilestoneStatus::Rejected;
    Ok(())
}

fn existing<'a>(
    state: &'a mut LedgerState,
    id: &str,
) -> Result<&'a mut ContractRecord, ReducerError> {
    state
        .contracts
        .get_mut(id)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: ResourceKind::Contract,
            id: id.to_string(),
        })
}

fn milestone_mut<'a>(
    contract: &'a mut ContractRecord,
    payload: &MilestoneRef,
) -> Result<&'a mut Milestone, ReducerError> {
    let contract_id = contract.id.clone();
    contract
        .milestones
        .get_mut(&payload.milestone_id)
        .ok_or_else(|| ReducerError::MilestoneInvalidState {
            contract_id,
            milestone_id: payload.milestone_id.clone(),
            status: "missing".to_string(),
        })
}

fn require_client(contract: &ContractRecord, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    if contract.client != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    Ok(())
}

fn require_party(contract: &ContractRecord, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    if contract.client != envelope.issuer && contract.provider != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    Ok(())
}

fn unauthorized(envelope: &EventEnvelope) -> ReducerError {
    ReducerError::UnauthorizedIssuer {
        issuer: envelope.issuer.clone(),
        operation: envelope.event_type.clone(),
    }
}

fn bad_transition(contract: &ContractRecord, to: &str) -> ReducerError {
    ReducerError::InvalidStatusTransition {
        kind: ResourceKind::Contract,
        id: contract.id.clone(),
        from: contract.status.as_str().to_string(),
        to: to.to_string(),
    }
}
