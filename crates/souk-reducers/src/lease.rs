//! # Capability Lease Reducer
//!
//! `active <-> paused; active -> (exhausted | expired | cancelled |
//! terminated)`. The lessee creates and owns the chain; the lessor (the
//! capability listing's seller) is authorized only for `terminate`.
//!
//! `lease.invoke` records usage: rejected while paused or past expiry;
//! cost defaults to the listing's unit price times units consumed;
//! consuming the final unit flips the lease to `exhausted`.

use souk_types::{EventEnvelope, ResourceKind};

use crate::dispatch::parse_payload;
use crate::errors::ReducerError;
use crate::market::unauthorized;
use crate::payloads::{LeaseCreate, LeaseInvoke, LeaseRef};
use crate::state::{LeaseRecord, LeaseStatus, LedgerState, ListingKind, ListingStatus};

/// `lease.create` - the issuer becomes the lessee.
pub fn create(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: LeaseCreate = parse_payload(envelope)?;

    let listing = state.listings.get(&payload.listing_id).ok_or_else(|| {
        ReducerError::ResourceNotFound {
            kind: ResourceKind::Listing,
            id: payload.listing_id.clone(),
        }
    })?;
    if listing.status != ListingStatus::Active {
        return Err(ReducerError::ListingNotActive {
            id: payload.listing_id.clone(),
        });
    }
    if listing.kind != ListingKind::Capability {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: "leases target capability listings".to_string(),
        });
    }
    if payload.units_total == 0 {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: "unitsTotal must be positive".to_string(),
        });
    }

    state.leases.insert(
        payload.id.clone(),
        LeaseRecord {
            id: payload.id.clone(),
            listing_id: payload.listing_id,
            lessee: envelope.issuer.clone(),
            lessor: listing.seller.clone(),
            units_total: payload.units_total,
            units_used: 0,
            cost_accrued: Default::default(),
            expires_at: payload.expires_at,
            status: LeaseStatus::Active,
        },
    );
    Ok(())
}

/// `lease.pause` - lessee-only.
pub fn pause(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    lessee_transition(state, envelope, &[LeaseStatus::Active], LeaseStatus::Paused)
}

/// `lease.resume` - lessee-only.
pub fn resume(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    lessee_transition(state, envelope, &[LeaseStatus::Paused], LeaseStatus::Active)
}

/// `lease.cancel` - lessee-only.
pub fn cancel(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    lessee_transition(
        state,
        envelope,
        &[LeaseStatus::Active, LeaseStatus::Paused],
        LeaseStatus::Cancelled,
    )
}

/// `lease.expire` - either side records the passed expiry.
pub fn expire(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: LeaseRef = parse_payload(envelope)?;
    let lease = existing(state, &payload.id)?;

    if lease.lessee != envelope.issuer && lease.lessor != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if !matches!(lease.status, LeaseStatus::Active | LeaseStatus::Paused) {
        return Err(bad_transition(lease, "expired"));
    }
    if envelope.ts < lease.expires_at {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: format!("lease expires at {}, ts {}", lease.expires_at, envelope.ts),
        });
    }

    lease.status = LeaseStatus::Expired;
    Ok(())
}

/// `lease.terminate` - lessor pulls the capability.
pub fn terminate(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: LeaseRef = parse_payload(envelope)?;
    let lease = existing(state, &payload.id)?;

    if lease.lessor != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if !matches!(lease.status, LeaseStatus::Active | LeaseStatus::Paused) {
        return Err(bad_transition(lease, "terminated"));
    }

    lease.status = LeaseStatus::Terminated;
    Ok(())
}

/// `lease.invoke` - lessee records usage against an active lease.
pub fn invoke(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: LeaseInvoke = parse_payload(envelope)?;

    let (listing_id, status, expires_at, units_used, units_total) = {
        let lease = existing(state, &payload.id)?;
        if lease.lessee != envelope.issuer {
            return Err(unauthorized(envelope));
        }
        (
            lease.listing_id.clone(),
            lease.status,
            lease.expires_at,
            lease.units_used,
            lease.units_total,
        )
    };

    match status {
        LeaseStatus::Paused => {
            return Err(ReducerError::LeasePaused {
                id: payload.id.clone(),
            })
        }
        LeaseStatus::Active => {}
        _ => {
            let lease = existing(state, &payload.id)?;
            return Err(bad_transition(lease, "invoke"));
        }
    }
    if envelope.ts >= expires_at {
        return Err(ReducerError::LeaseExpired {
            id: payload.id.clone(),
            expires_at,
        });
    }
    if payload.units == 0 {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: "units must be positive".to_string(),
        });
    }
    let Some(remaining) = units_total.checked_sub(units_used) else {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: "lease accounting underflow".to_string(),
        });
    };
    if payload.units > remaining {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: format!("units {} exceed remaining {remaining}", payload.units),
        });
    }

    // Cost: explicit, or the listing's pricing model times units
    let cost = match payload.cost {
        Some(cost) => cost,
        None => {
            let price = state
                .listings
                .get(&listing_id)
                .map(|l| l.price.clone())
                .unwrap_or_default();
            price.checked_mul_units(payload.units)
        }
    };

    let lease = existing(state, &payload.id)?;
    lease.units_used += payload.units;
    lease.cost_accrued = lease.cost_accrued.checked_add(&cost);
    if lease.units_used == lease.units_total {
        lease.status = LeaseStatus::Exhausted;
    }
    Ok(())
}

fn lessee_transition(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
    allowed_from: &[LeaseStatus],
    to: LeaseStatus,
) -> Result<(), ReducerError> {
    let payload: LeaseRef = parse_payload(envelope)?;
    let lease = existing(state, &payload.id)?;

    if lease.lessee != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if !allowed_from.contains(&lease.status) {
        return Err(bad_transition(lease, to.as_str()));
    }

    lease.status = to;
    Ok(())
}

fn existing<'a>(state: &'a mut LedgerState, id: &str) -> Result<&'a mut LeaseRecord, ReducerError> {
    state
        .leases
        .get_mut(id)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: ResourceKind::Lease,
            id: id.to_string(),
        })
}

fn bad_transition(lease: &LeaseRecord, to: &str) -> ReducerError {
    ReducerError::InvalidStatusTransition {
        kind: ResourceKind::Lease,
        id: lease.id.clone(),
        from: lease.status.as_str().to_string(),
        to: to.to_string(),
    }
}
