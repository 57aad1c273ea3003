//! # Dispute Reducer
//!
//! `open -> responded -> resolved`. Opening a dispute forces its order to
//! `disputed` and blocks every non-dispute order transition until
//! resolution; resolving either refunds the order or dismisses the dispute
//! and restores the order's prior status.

use souk_types::{EventEnvelope, ResourceKind};

use crate::dispatch::parse_payload;
use crate::errors::ReducerError;
use crate::market::{order, unauthorized};
use crate::payloads::{DisputeOpen, DisputeResolve, DisputeRespond};
use crate::state::{
    DisputeOutcome, DisputeRecord, DisputeStatus, LedgerState, OrderStatus,
};

/// `market.dispute.open` - either order party, while the order is live.
pub fn open(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: DisputeOpen = parse_payload(envelope)?;

    let (respondent, prior_status) = {
        let order = state.orders.get(&payload.order_id).ok_or_else(|| {
            ReducerError::ResourceNotFound {
                kind: ResourceKind::Order,
                id: payload.order_id.clone(),
            }
        })?;
        if order.status.is_terminal() || order.status == OrderStatus::Disputed {
            return Err(ReducerError::InvalidStatusTransition {
                kind: ResourceKind::Order,
                id: payload.order_id.clone(),
                from: order.status.as_str().to_string(),
                to: "disputed".to_string(),
            });
        }
        let respondent = if order.buyer == envelope.issuer {
            order.seller.clone()
        } else if order.seller == envelope.issuer {
            order.buyer.clone()
        } else {
            return Err(unauthorized(envelope));
        };
        (respondent, order.status)
    };

    state.disputes.insert(
        payload.id.clone(),
        DisputeRecord {
            id: payload.id.clone(),
            order_id: payload.order_id.clone(),
            opener: envelope.issuer.clone(),
            respondent,
            reason: payload.reason,
            response: None,
            outcome: None,
            status: DisputeStatus::Open,
        },
    );

    let order = order::existing(state, &payload.order_id)?;
    order.pre_dispute_status = Some(prior_status);
    order.dispute_id = Some(payload.id);
    order.status = OrderStatus::Disputed;
    Ok(())
}

/// `market.dispute.respond` - respondent-only.
pub fn respond(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: DisputeRespond = parse_payload(envelope)?;
    let dispute = existing(state, &payload.id)?;

    if dispute.respondent != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if dispute.status != DisputeStatus::Open {
        return Err(bad_transition(dispute, "responded"));
    }

    dispute.response = Some(payload.response);
    dispute.status = DisputeStatus::Responded;
    Ok(())
}

/// `market.dispute.resolve` - either party records the settlement.
pub fn resolve(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: DisputeResolve = parse_payload(envelope)?;

    let order_id = {
        let dispute = existing(state, &payload.id)?;
        if dispute.opener != envelope.issuer && dispute.respondent != envelope.issuer {
            return Err(unauthorized(envelope));
        }
        if !matches!(
            dispute.status,
            DisputeStatus::Open | DisputeStatus::Responded
        ) {
            return Err(bad_transition(dispute, "resolved"));
        }
        dispute.order_id.clone()
    };

    // Settle the order first so a missing order cannot leave a half-resolved
    // dispute behind
    let order = order::existing(state, &order_id)?;
    match payload.outcome {
        DisputeOutcome::Refund => {
            order.status = OrderStatus::Refunded;
        }
        DisputeOutcome::Dismiss => {
            order.status = order.pre_dispute_status.take().unwrap_or(OrderStatus::Pending);
        }
    }
    order.dispute_id = None;

    let dispute = existing(state, &payload.id)?;
    dispute.outcome = Some(payload.outcome);
    dispute.status = DisputeStatus::Resolved;
    Ok(())
}

fn existing<'a>(
    state: &'a mut LedgerState,
    id: &str,
) -> Result<&'a mut DisputeRecord, ReducerError> {
    state
        .disputes
        .get_mut(id)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: ResourceKind::Dispute,
            id: id.to_string(),
        })
}

fn bad_transition(dispute: &DisputeRecord, to: &str) -> ReducerError {
    ReducerError::InvalidStatusTransition {
        kind: ResourceKind::Dispute,
        id: dispute.id.clone(),
        from: dispute.status.as_str().to_string(),
        to: to.to_string(),
    }
}
