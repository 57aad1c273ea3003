//! # Bid Reducer
//!
//! `submitted -> (shortlisted ->)? accepted | rejected | withdrawn`.
//! Accepting is seller-only and exclusive: at most one bid per task listing
//! ever reaches `accepted`.

use souk_types::{EventEnvelope, ResourceKind};

use crate::dispatch::parse_payload;
use crate::errors::ReducerError;
use crate::market::unauthorized;
use crate::payloads::{BidRef, BidSubmit};
use crate::state::{BidRecord, BidStatus, LedgerState, ListingKind, ListingStatus};

/// `market.bid.submit`
pub fn submit(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: BidSubmit = parse_payload(envelope)?;

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
    if listing.kind != ListingKind::Task {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: "bids target task listings".to_string(),
        });
    }
    if listing.seller == envelope.issuer {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: "seller cannot bid on own task".to_string(),
        });
    }

    state.bids.insert(
        payload.id.clone(),
        BidRecord {
            id: payload.id.clone(),
            listing_id: payload.listing_id,
            bidder: envelope.issuer.clone(),
            amount: payload.amount,
            status: BidStatus::Submitted,
        },
    );
    Ok(())
}

/// `market.bid.shortlist` - seller-only.
pub fn shortlist(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    seller_transition(state, envelope, &[BidStatus::Submitted], BidStatus::Shortlisted, false)
}

/// `market.bid.accept` - seller-only; first accepted bid wins the task.
pub fn accept(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    seller_transition(
        state,
        envelope,
        &[BidStatus::Submitted, BidStatus::Shortlisted],
        BidStatus::Accepted,
        true,
    )
}

/// `market.bid.reject` - seller-only.
pub fn reject(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    seller_transition(
        state,
        envelope,
        &[BidStatus::Submitted, BidStatus::Shortlisted],
        BidStatus::Rejected,
        false,
    )
}

/// `market.bid.withdraw` - bidder pulls a live bid.
pub fn withdraw(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: BidRef = parse_payload(envelope)?;

    let bid = existing(state, &payload.id)?;
    if bid.bidder != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if !matches!(bid.status, BidStatus::Submitted | BidStatus::Shortlisted) {
        return Err(invalid_state(bid, envelope));
    }

    bid.status = BidStatus::Withdrawn;
    Ok(())
}

/// Shared seller-driven transition; `exclusive` enforces the single
/// accepted bid per listing.
fn seller_transition(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
    allowed_from: &[BidStatus],
    to: BidStatus,
    exclusive: bool,
) -> Result<(), ReducerError> {
    let payload: BidRef = parse_payload(envelope)?;

    let listing_id = {
        let bid = existing(state, &payload.id)?;
        if !allowed_from.contains(&bid.status) {
            return Err(invalid_state(bid, envelope));
        }
        bid.listing_id.clone()
    };

    let seller = state
        .listings
        .get(&listing_id)
        .map(|l| l.seller.as_str());
    if seller != Some(envelope.issuer.as_str()) {
        return Err(unauthorized(envelope));
    }

    if exclusive && state.accepted_bids.contains_key(&listing_id) {
        let bid = existing(state, &payload.id)?;
        return Err(invalid_state(bid, envelope));
    }

    let bid = existing(state, &payload.id)?;
    bid.status = to;
    if exclusive {
        state.accepted_bids.insert(listing_id, payload.id);
    }
    Ok(())
}

fn existing<'a>(state: &'a mut LedgerState, id: &str) -> Result<&'a mut BidRecord, ReducerError> {
    state
        .bids
        .get_mut(id)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: ResourceKind::Bid,
            id: id.to_string(),
        })
}

fn invalid_state(bid: &BidRecord, envelope: &EventEnvelope) -> ReducerError {
    ReducerError::BidInvalidState {
        id: bid.id.clone(),
        status: bid.status.as_str().to_string(),
        operation: envelope.event_type.clone(),
    }
}
