//! # Reputation Reducer
//!
//! Reviews are single-event resources: one `reputation.review` per review
//! id, tied to a completed order, rating the counterpart. Aggregated
//! per-DID scores are derived as reviews arrive. (Peer scoring for sync
//! misbehavior is a local, non-replicated concern and lives in the sync
//! engine.)

use souk_types::{EventEnvelope, ResourceKind};

use crate::dispatch::parse_payload;
use crate::errors::ReducerError;
use crate::market::unauthorized;
use crate::payloads::ReviewSubmit;
use crate::state::{LedgerState, OrderStatus, ReviewRecord};

/// `reputation.review`
pub fn review(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ReviewSubmit = parse_payload(envelope)?;

    if !(1..=5).contains(&payload.rating) {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: format!("rating {} outside 1..=5", payload.rating),
        });
    }

    let order = state.orders.get(&payload.order_id).ok_or_else(|| {
        ReducerError::ResourceNotFound {
            kind: ResourceKind::Order,
            id: payload.order_id.clone(),
        }
    })?;
    if order.status != OrderStatus::Completed {
        return Err(ReducerError::InvalidStatusTransition {
            kind: ResourceKind::Order,
            id: payload.order_id.clone(),
            from: order.status.as_str().to_string(),
            to: "reviewed".to_string(),
        });
    }

    // Reviewer must be one order party; the subject is the other
    let subject = if order.buyer == envelope.issuer {
        order.seller.clone()
    } else if order.seller == envelope.issuer {
        order.buyer.clone()
    } else {
        return Err(unauthorized(envelope));
    };

    state.reviews.insert(
        payload.id.clone(),
        ReviewRecord {
            id: payload.id,
            order_id: payload.order_id,
            reviewer: envelope.issuer.clone(),
            subject: subject.clone(),
            rating: payload.rating,
            comment: payload.comment,
        },
    );

    let score = state.reputation.entry(subject).or_default();
    score.rating_total += u64::from(payload.rating);
    score.rating_count += 1;
    Ok(())
}
