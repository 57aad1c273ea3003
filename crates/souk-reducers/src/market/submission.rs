//! # Submission Reducer
//!
//! `pending_review -> approved | rejected | revision`. The seller of the
//! delivering order submits; the buyer reviews. A `revision` verdict closes
//! this submission; the seller opens a fresh one for the next attempt.

use souk_types::{EventEnvelope, ResourceKind};

use crate::dispatch::parse_payload;
use crate::errors::ReducerError;
use crate::market::unauthorized;
use crate::payloads::{SubmissionRef, SubmissionSubmit};
use crate::state::{LedgerState, OrderStatus, SubmissionRecord, SubmissionStatus};

/// `market.submission.submit`
pub fn submit(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: SubmissionSubmit = parse_payload(envelope)?;

    let order = state.orders.get(&payload.order_id).ok_or_else(|| {
        ReducerError::ResourceNotFound {
            kind: ResourceKind::Order,
            id: payload.order_id.clone(),
        }
    })?;
    if order.seller != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    if !matches!(
        order.status,
        OrderStatus::InProgress | OrderStatus::Delivered
    ) {
        return Err(ReducerError::InvalidStatusTransition {
            kind: ResourceKind::Order,
            id: payload.order_id.clone(),
            from: order.status.as_str().to_string(),
            to: "submission".to_string(),
        });
    }

    state.submissions.insert(
        payload.id.clone(),
        SubmissionRecord {
            id: payload.id.clone(),
            order_id: payload.order_id,
            submitter: envelope.issuer.clone(),
            content: payload.content,
            status: SubmissionStatus::PendingReview,
        },
    );
    Ok(())
}

/// `market.submission.approve`
pub fn approve(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    review(state, envelope, SubmissionStatus::Approved)
}

/// `market.submission.reject`
pub fn reject(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    review(state, envelope, SubmissionStatus::Rejected)
}

/// `market.submission.revise`
pub fn revise(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    review(state, envelope, SubmissionStatus::Revision)
}

/// Buyer verdict on a pending submission.
fn review(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
    verdict: SubmissionStatus,
) -> Result<(), ReducerError> {
    let payload: SubmissionRef = parse_payload(envelope)?;

    let order_id = {
        let submission = existing(state, &payload.id)?;
        if submission.status != SubmissionStatus::PendingReview {
            return Err(ReducerError::InvalidStatusTransition {
                kind: ResourceKind::Submission,
                id: payload.id.clone(),
                from: submission.status.as_str().to_string(),
                to: verdict.as_str().to_string(),
            });
        }
        submission.order_id.clone()
    };

    let buyer = state.orders.get(&order_id).map(|o| o.buyer.as_str());
    if buyer != Some(envelope.issuer.as_str()) {
        return Err(unauthorized(envelope));
    }

    let submission = existing(state, &payload.id)?;
    submission.status = verdict;
    Ok(())
}

fn existing<'a>(
    state: &'a mut LedgerState,
    id: &str,
) -> Result<&'a mut SubmissionRecord, ReducerError> {
    state
        .submissions
        .get_mut(id)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: ResourceKind::Submission,
            id: id.to_string(),
        })
}
