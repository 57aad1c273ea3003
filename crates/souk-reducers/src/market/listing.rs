//! # Listing Reducer
//!
//! Lifecycle: `draft -> active -> (paused | sold_out | expired | removed)`.
//! Forward-only; a paused listing does not return to active. Inventory is
//! decremented by order acceptance (see `order`); hitting zero flips the
//! listing to `sold_out` without an explicit event.

use souk_types::{EventEnvelope, ResourceKind};

use crate::dispatch::parse_payload;
use crate::errors::ReducerError;
use crate::market::unauthorized;
use crate::payloads::{ListingCreate, ListingRef, ListingUpdate};
use crate::state::{LedgerState, ListingRecord, ListingStatus};

/// `market.listing.create`
pub fn create(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ListingCreate = parse_payload(envelope)?;

    state.listings.insert(
        payload.id.clone(),
        ListingRecord {
            id: payload.id.clone(),
            seller: envelope.issuer.clone(),
            title: payload.title,
            kind: payload.kind,
            price: payload.price,
            inventory: payload.inventory,
            status: ListingStatus::Draft,
        },
    );
    Ok(())
}

/// `market.listing.update` - seller edits a draft or active listing.
pub fn update(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ListingUpdate = parse_payload(envelope)?;
    let listing = owned(state, envelope, &payload.id)?;

    if !matches!(
        listing.status,
        ListingStatus::Draft | ListingStatus::Active | ListingStatus::Paused
    ) {
        return Err(bad_transition(listing, listing.status.as_str()));
    }

    if let Some(title) = payload.title {
        listing.title = title;
    }
    if let Some(price) = payload.price {
        listing.price = price;
    }
    if let Some(inventory) = payload.inventory {
        listing.inventory = Some(inventory);
    }
    Ok(())
}

/// `market.listing.publish`
pub fn publish(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    transition(state, envelope, ListingStatus::Active, &[ListingStatus::Draft])
}

/// `market.listing.pause`
pub fn pause(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    transition(state, envelope, ListingStatus::Paused, &[ListingStatus::Active])
}

/// `market.listing.sold_out`
pub fn sold_out(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    transition(
        state,
        envelope,
        ListingStatus::SoldOut,
        &[ListingStatus::Active],
    )
}

/// `market.listing.expire`
pub fn expire(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    transition(
        state,
        envelope,
        ListingStatus::Expired,
        &[ListingStatus::Active, ListingStatus::Paused],
    )
}

/// `market.listing.remove`
pub fn remove(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    transition(
        state,
        envelope,
        ListingStatus::Removed,
        &[
            ListingStatus::Draft,
            ListingStatus::Active,
            ListingStatus::Paused,
        ],
    )
}

fn transition(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
    to: ListingStatus,
    allowed_from: &[ListingStatus],
) -> Result<(), ReducerError> {
    let payload: ListingRef = parse_payload(envelope)?;
    let listing = owned(state, envelope, &payload.id)?;

    if !allowed_from.contains(&listing.status) {
        return Err(bad_transition(listing, to.as_str()));
    }
    listing.status = to;
    Ok(())
}

fn owned<'a>(
    state: &'a mut LedgerState,
    envelope: &EventEnvelope,
    id: &str,
) -> Result<&'a mut ListingRecord, ReducerError> {
    let listing = state
        .listings
        .get_mut(id)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: ResourceKind::Listing,
            id: id.to_string(),
        })?;
    if listing.seller != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    Ok(listing)
}

fn bad_transition(listing: &ListingRecord, to: &str) -> ReducerError {
    ReducerError::InvalidStatusTransition {
        kind: ResourceKind::Listing,
        id: listing.id.clone(),
        from: listing.status.as_str().to_string(),
        to: to.to_string(),
    }
}
