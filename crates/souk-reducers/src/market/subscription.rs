//! # Subscription Reducer
//!
//! `active -> cancelled | expired`. Created by the subscriber against an
//! active listing; cancellation is subscriber-only, expiry may be recorded
//! by either side.

use souk_types::{EventEnvelope, ResourceKind};

use crate::dispatch::parse_payload;
use crate::errors::ReducerError;
use crate::market::unauthorized;
use crate::payloads::{SubscriptionCreate, SubscriptionRef};
use crate::state::{LedgerState, ListingStatus, SubscriptionRecord, SubscriptionStatus};

/// `market.subscription.create`
pub fn create(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: SubscriptionCreate = parse_payload(envelope)?;

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

    state.subscriptions.insert(
        payload.id.clone(),
        SubscriptionRecord {
            id: payload.id.clone(),
            listing_id: payload.listing_id,
            subscriber: envelope.issuer.clone(),
            started_ts: envelope.ts,
            status: SubscriptionStatus::Active,
        },
    );
    Ok(())
}

/// `market.subscription.cancel` - subscriber-only.
pub fn cancel(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: SubscriptionRef = parse_payload(envelope)?;
    let subscription = existing(state, &payload.id)?;

    if subscription.subscriber != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if subscription.status != SubscriptionStatus::Active {
        return Err(bad_transition(subscription, "cancelled"));
    }

    subscription.status = SubscriptionStatus::Cancelled;
    Ok(())
}

/// `market.subscription.expire` - subscriber or listing seller.
pub fn expire(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: SubscriptionRef = parse_payload(envelope)?;

    let (subscriber, listing_id, status) = {
        let subscription = existing(state, &payload.id)?;
        (
            subscription.subscriber.clone(),
            subscription.listing_id.clone(),
            subscription.status,
        )
    };

    let seller = state.listings.get(&listing_id).map(|l| l.seller.as_str());
    if subscriber != envelope.issuer && seller != Some(envelope.issuer.as_str()) {
        return Err(unauthorized(envelope));
    }
    if status != SubscriptionStatus::Active {
        let subscription = existing(state, &payload.id)?;
        return Err(bad_transition(subscription, "expired"));
    }

    let subscription = existing(state, &payload.id)?;
    subscription.status = SubscriptionStatus::Expired;
    Ok(())
}

fn existing<'a>(
    state: &'a mut LedgerState,
    id: &str,
) -> Result<&'a mut SubscriptionRecord, ReducerError> {
    state
        .subscriptions
        .get_mut(id)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: ResourceKind::Subscription,
            id: id.to_string(),
        })
}

fn bad_transition(subscription: &SubscriptionRecord, to: &str) -> ReducerError {
    ReducerError::InvalidStatusTransition {
        kind: ResourceKind::Subscription,
        id: subscription.id.clone(),
        from: subscription.status.as_str().to_string(),
        to: to.to_string(),
    }
}
