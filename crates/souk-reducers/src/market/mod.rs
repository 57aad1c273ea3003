//! # Marketplace Reducers
//!
//! Listings, orders, bids, submissions, subscriptions, and disputes. Each
//! sub-module owns one resource family; cross-resource effects (inventory
//! driving `sold_out`, disputes freezing orders) stay inside this module
//! tree.

pub mod bid;
pub mod dispute;
pub mod listing;
pub mod order;
pub mod submission;
pub mod subscription;

use souk_types::EventEnvelope;

use crate::errors::ReducerError;

pub(crate) fn unauthorized(envelope: &EventEnvelope) -> ReducerError {
    ReducerError::UnauthorizedIssuer {
        issuer: envelope.issuer.clone(),
        operation: envelope.event_type.clone(),
    }
}
