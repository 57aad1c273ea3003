//! # Identity Reducer
//!
//! `created -> updated*`; capability registrations append without changing
//! lifecycle state. The identity chain is keyed by the issuer's DID, so
//! only the identity's owner can ever mutate it.

use souk_types::EventEnvelope;

use crate::dispatch::{parse_payload, ApplyContext};
use crate::errors::ReducerError;
use crate::payloads::{CapabilityRegister, DelegateSet, IdentityCreate, IdentityUpdate};
use crate::state::{CapabilityRegistration, IdentityRecord, LedgerState};

/// `identity.create`
pub fn create(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
    ctx: &ApplyContext<'_>,
) -> Result<(), ReducerError> {
    let payload: IdentityCreate = parse_payload(envelope)?;

    state.identities.insert(
        envelope.issuer.clone(),
        IdentityRecord {
            did: envelope.issuer.clone(),
            address: ctx.issuer_address.clone(),
            profile: payload.profile,
            capabilities: Vec::new(),
            delegate: None,
            created_ts: envelope.ts,
            updated_ts: envelope.ts,
        },
    );
    Ok(())
}

/// `identity.update` - merges profile fields.
pub fn update(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: IdentityUpdate = parse_payload(envelope)?;
    let identity = existing(state, envelope)?;

    identity.profile.extend(payload.profile);
    identity.updated_ts = envelope.ts;
    Ok(())
}

/// `identity.capability.register` - appends a capability after the host's
/// credential verifier accepts it.
pub fn register_capability(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
    ctx: &ApplyContext<'_>,
) -> Result<(), ReducerError> {
    let payload: CapabilityRegister = parse_payload(envelope)?;

    if let Some(credential) = &payload.credential {
        if !(ctx.config.verify_capability_credential)(credential) {
            return Err(ReducerError::UnauthorizedIssuer {
                issuer: envelope.issuer.clone(),
                operation: envelope.event_type.clone(),
            });
        }
    }

    let ts = envelope.ts;
    let identity = existing(state, envelope)?;
    identity.capabilities.push(CapabilityRegistration {
        id: payload.id,
        kind: payload.kind,
        registered_ts: ts,
    });
    identity.updated_ts = ts;
    Ok(())
}

/// `dao.delegate.set` - records or clears the issuer's vote delegate.
pub fn set_delegate(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: DelegateSet = parse_payload(envelope)?;
    let ts = envelope.ts;
    let identity = existing(state, envelope)?;

    identity.delegate = payload.to;
    identity.updated_ts = ts;
    Ok(())
}

fn existing<'a>(
    state: &'a mut LedgerState,
    envelope: &EventEnvelope,
) -> Result<&'a mut IdentityRecord, ReducerError> {
    state
        .identities
        .get_mut(&envelope.issuer)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: souk_types::ResourceKind::Identity,
            id: envelope.issuer.clone(),
        })
}
