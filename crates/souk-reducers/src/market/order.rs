//! # Order Reducer
//!
//! Permitted transitions form a DAG; any edge not listed below is rejected
//! with `INVALID_STATUS_TRANSITION`. Terminal statuses (`completed`,
//! `cancelled`, `refunded`) are absorbing.
//!
//! ```text
//! draft -> pending -> accepted -> payment_pending -> paid
//!       -> in_progress -> delivered -> completed
//! any non-terminal -------------------> cancelled
//! disputed ---------------------------> refunded
//! ```
//!
//! A dispute (see `dispute`) forces the order to `disputed` and blocks
//! every non-dispute order transition until resolution.
//!
//! Buyer-driven edges: submit, pay, complete. Seller-driven: accept,
//! invoice, start, deliver, refund. Cancel is open to both parties.

use souk_types::{EventEnvelope, ResourceKind};

use crate::dispatch::parse_payload;
use crate::errors::ReducerError;
use crate::market::unauthorized;
use crate::payloads::{OrderCreate, OrderRef};
use crate::state::{LedgerState, ListingStatus, OrderRecord, OrderStatus};

/// Which side of the order may drive a transition.
enum Actor {
    Buyer,
    Seller,
    Either,
}

/// `market.order.create` - buyer opens a draft against an active listing.
pub fn create(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: OrderCreate = parse_payload(envelope)?;

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
    if payload.quantity == 0 {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: "quantity must be positive".to_string(),
        });
    }

    let total = listing.price.checked_mul_units(payload.quantity);
    state.orders.insert(
        payload.id.clone(),
        OrderRecord {
            id: payload.id.clone(),
            listing_id: payload.listing_id,
            buyer: envelope.issuer.clone(),
            seller: listing.seller.clone(),
            quantity: payload.quantity,
            total,
            dispute_id: None,
            pre_dispute_status: None,
            status: OrderStatus::Draft,
        },
    );
    Ok(())
}

/// `market.order.submit`
pub fn submit(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    step(state, envelope, OrderStatus::Draft, OrderStatus::Pending, Actor::Buyer)
}

/// `market.order.accept` - also decrements listing inventory; hitting zero
/// flips the listing to `sold_out`.
pub fn accept(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: OrderRef = parse_payload(envelope)?;
    let order = existing(state, &payload.id)?;

    if order.seller != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    guard_edge(order, OrderStatus::Pending, OrderStatus::Accepted)?;

    let listing_id = order.listing_id.clone();
    let quantity = order.quantity;

    if let Some(listing) = state.listings.get_mut(&listing_id) {
        if let Some(inventory) = listing.inventory {
            let Some(rest) = inventory.checked_sub(quantity) else {
                return Err(ReducerError::InvalidPayload {
                    event_type: envelope.event_type.clone(),
                    reason: format!("quantity {quantity} exceeds inventory {inventory}"),
                });
            };
            listing.inventory = Some(rest);
            if rest == 0 && listing.status == ListingStatus::Active {
                listing.status = ListingStatus::SoldOut;
            }
        }
    }

    let order = existing(state, &payload.id)?;
    order.status = OrderStatus::Accepted;
    Ok(())
}

/// `market.order.invoice`
pub fn invoice(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    step(
        state,
        envelope,
        OrderStatus::Accepted,
        OrderStatus::PaymentPending,
        Actor::Seller,
    )
}

/// `market.order.pay`
pub fn pay(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    step(
        state,
        envelope,
        OrderStatus::PaymentPending,
        OrderStatus::Paid,
        Actor::Buyer,
    )
}

/// `market.order.start`
pub fn start(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    step(
        state,
        envelope,
        OrderStatus::Paid,
        OrderStatus::InProgress,
        Actor::Seller,
    )
}

/// `market.order.deliver`
pub fn deliver(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    step(
        state,
        envelope,
        OrderStatus::InProgress,
        OrderStatus::Delivered,
        Actor::Seller,
    )
}

/// `market.order.complete`
pub fn complete(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    step(
        state,
        envelope,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        Actor::Buyer,
    )
}

/// `market.order.cancel` - either party, any non-terminal non-disputed
/// status.
pub fn cancel(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: OrderRef = parse_payload(envelope)?;
    let order = existing(state, &payload.id)?;

    require_actor(order, envelope, &Actor::Either)?;
    if order.status.is_terminal() || order.status == OrderStatus::Disputed {
        return Err(bad_transition(order, "cancelled"));
    }

    order.status = OrderStatus::Cancelled;
    Ok(())
}

/// `market.order.refund` - seller refunds a disputed order.
pub fn refund(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: OrderRef = parse_payload(envelope)?;
    let order = existing(state, &payload.id)?;

    if order.seller != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if order.status != OrderStatus::Disputed {
        return Err(bad_transition(order, "refunded"));
    }

    order.status = OrderStatus::Refunded;
    Ok(())
}

/// A single DAG edge with its authorized actor.
fn step(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
    from: OrderStatus,
    to: OrderStatus,
    actor: Actor,
) -> Result<(), ReducerError> {
    let payload: OrderRef = parse_payload(envelope)?;
    let order = existing(state, &payload.id)?;

    require_actor(order, envelope, &actor)?;
    guard_edge(order, from, to)?;

    order.status = to;
    Ok(())
}

fn guard_edge(order: &OrderRecord, from: OrderStatus, to: OrderStatus) -> Result<(), ReducerError> {
    if order.status != from {
        return Err(bad_transition(order, to.as_str()));
    }
    Ok(())
}

fn require_actor(
    order: &OrderRecord,
    envelope: &EventEnvelope,
    actor: &Actor,
) -> Result<(), ReducerError> {
    let authorized = match actor {
        Actor::Buyer => order.buyer == envelope.issuer,
        Actor::Seller => order.seller == envelope.issuer,
        Actor::Either => order.buyer == envelope.issuer || order.seller == envelope.issuer,
    };
    if !authorized {
        return Err(unauthorized(envelope));
    }
    Ok(())
}

pub(crate) fn existing<'a>(
    state: &'a mut LedgerState,
    id: &str,
) -> Result<&'a mut OrderRecord, ReducerError> {
    state
        .orders
        .get_mut(id)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: ResourceKind::Order,
            id: id.to_string(),
        })
}

fn bad_transition(order: &OrderRecord, to: &str) -> ReducerError {
    ReducerError::InvalidStatusTransition {
        kind: ResourceKind::Order,
        id: order.id.clone(),
        from: order.status.as_str().to_string(),
        to: to.to_string(),
    }
}
