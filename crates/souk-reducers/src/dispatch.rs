//! # Reducer Dispatch
//!
//! The top-level `apply`: universal preconditions, then dispatch by event
//! type to the domain handler, then the bookkeeping every applied event
//! shares (resource head, issuer head, nonce).
//!
//! ## Universal preconditions, in order
//!
//! 1. The envelope verifies cryptographically.
//! 2. The nonce passes the issuer's window (checked, not yet consumed).
//! 3. The recorded head for the target resource equals `resourcePrev`;
//!    a missing head admits only chain-opening events.
//! 4. Issuer authorization and amount checks happen inside the handlers.
//!
//! Handlers follow a validate-then-mutate discipline: state is only touched
//! after every check has passed, so a returned error always leaves state
//! exactly as it was. Nonces are consumed last for the same reason.
//!
//! Unknown event types are recorded no-ops: the log is the source of truth
//! and newer event types must flow through old reducers without corrupting
//! state.

use serde::de::DeserializeOwned;
use souk_types::{EventEnvelope, EventHash, ResourceKind, ResourceRef, TokenAmount};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::errors::ReducerError;
use crate::state::LedgerState;
use crate::{contract, dao, escrow, identity, lease, market, reputation, wallet};

/// A resource-head advance the store applies atomically with the append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadAdvance {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource id.
    pub id: String,
    /// The new head: the applied event's hash.
    pub new_head: EventHash,
    /// The head this event chained from (`resourcePrev`).
    pub expected_prev: Option<EventHash>,
}

/// A payout authorized by a milestone approval. The reducer does not emit
/// the release event itself; it exposes the derived payout so the publisher
/// can chain the client's next `escrow.release`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestonePayout {
    /// Contract whose milestone was approved.
    pub contract_id: String,
    /// Approved milestone.
    pub milestone_id: String,
    /// Escrow funding the contract, when recorded.
    pub escrow_id: Option<String>,
    /// Provider owed the payout.
    pub beneficiary: String,
    /// Authorized amount.
    pub amount: TokenAmount,
}

/// Outcome of a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Head advances for the store's atomic append.
    pub head_updates: Vec<HeadAdvance>,
    /// Payout derived from a milestone approval, if any.
    pub payout: Option<MilestonePayout>,
    /// True when the event type was unknown and skipped.
    pub skipped: bool,
}

/// Opaque capability-credential verifier supplied by the host.
pub type CapabilityVerifier = Arc<dyn Fn(&serde_json::Value) -> bool + Send + Sync>;

/// Reducer configuration.
#[derive(Clone)]
pub struct ReducerConfig {
    /// DIDs privileged to mint. Empty means minting is disabled.
    pub mint_authorities: BTreeSet<String>,
    /// Capability credential verifier; defaults to accepting any
    /// syntactically present credential.
    pub verify_capability_credential: CapabilityVerifier,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            mint_authorities: BTreeSet::new(),
            verify_capability_credential: Arc::new(|_| true),
        }
    }
}

impl std::fmt::Debug for ReducerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReducerConfig")
            .field("mint_authorities", &self.mint_authorities)
            .finish_non_exhaustive()
    }
}

/// Per-event context handed to domain handlers.
pub struct ApplyContext<'a> {
    /// The issuer's derived wallet address.
    pub issuer_address: String,
    /// Reducer configuration.
    pub config: &'a ReducerConfig,
}

/// The deterministic reducer over [`LedgerState`].
#[derive(Debug, Clone, Default)]
pub struct Reducer {
    config: ReducerConfig,
}

impl Reducer {
    /// Build a reducer with the given configuration.
    #[must_use]
    pub fn new(config: ReducerConfig) -> Self {
        Self { config }
    }

    /// Apply one event. On success the state reflects the event and the
    /// returned [`Applied`] carries the head advances for the store; on
    /// error the state is untouched.
    ///
    /// # Errors
    ///
    /// Any [`ReducerError`]; see the error type for the taxonomy.
    pub fn apply(
        &self,
        state: &mut LedgerState,
        envelope: &EventEnvelope,
    ) -> Result<Applied, ReducerError> {
        envelope.verify()?;
        state.nonces.check(&envelope.issuer, envelope.nonce)?;

        let issuer_address = souk_crypto::address_from_did(&envelope.issuer)
            .map_err(|e| {
                ReducerError::Envelope(souk_types::EnvelopeError::Malformed {
                    reason: e.to_string(),
                })
            })?
            .as_str()
            .to_string();

        let resource =
            ResourceRef::from_event(&envelope.event_type, &envelope.issuer, &issuer_address, &envelope.payload);

        if let Some(resource) = &resource {
            let recorded = state.head(resource.kind, &resource.id).cloned();
            if recorded != envelope.resource_prev {
                return Err(ReducerError::ResourcePrevConflict {
                    kind: resource.kind,
                    id: resource.id.clone(),
                    expected: envelope.resource_prev.clone(),
                    recorded,
                });
            }
            if recorded.is_none() && !ResourceRef::is_create_event(&envelope.event_type) {
                return Err(ReducerError::ResourceNotFound {
                    kind: resource.kind,
                    id: resource.id.clone(),
                });
            }
            // A create must open the chain; citing the head to re-create an
            // existing resource is a conflict. Wallet chains are exempt -
            // they are append-created and keep chaining.
            if recorded.is_some()
                && resource.kind != ResourceKind::Wallet
                && ResourceRef::is_create_event(&envelope.event_type)
            {
                return Err(ReducerError::ResourcePrevConflict {
                    kind: resource.kind,
                    id: resource.id.clone(),
                    expected: None,
                    recorded,
                });
            }
        }

        let ctx = ApplyContext {
            issuer_address,
            config: &self.config,
        };

        let (payout, skipped) = self.dispatch(state, envelope, &ctx)?;

        // Shared bookkeeping, only reached on success
        let mut head_updates = Vec::new();
        if let Some(resource) = resource {
            if !skipped {
                state.heads.insert(
                    LedgerState::head_key(resource.kind, &resource.id),
                    envelope.hash.clone(),
                );
                head_updates.push(HeadAdvance {
                    kind: resource.kind,
                    id: resource.id,
                    new_head: envelope.hash.clone(),
                    expected_prev: envelope.resource_prev.clone(),
                });
            }
        }
        state
            .issuer_heads
            .insert(envelope.issuer.clone(), envelope.hash.clone());
        state
            .nonces
            .accept(&envelope.issuer, envelope.nonce)
            .expect("nonce was checked before dispatch");

        Ok(Applied {
            head_updates,
            payout,
            skipped,
        })
    }

    /// Route an event to its domain handler.
    fn dispatch(
        &self,
        state: &mut LedgerState,
        envelope: &EventEnvelope,
        ctx: &ApplyContext<'_>,
    ) -> Result<(Option<MilestonePayout>, bool), ReducerError> {
        let event_type = envelope.event_type.as_str();

        let payout = match event_type {
            // Identity
            "identity.create" => none(identity::create(state, envelope, ctx))?,
            "identity.update" => none(identity::update(state, envelope))?,
            "identity.capability.register" => {
                none(identity::register_capability(state, envelope, ctx))?
            }
            "dao.delegate.set" => none(identity::set_delegate(state, envelope))?,

            // Wallet
            "wallet.mint" => none(wallet::mint(state, envelope, ctx))?,
            "wallet.transfer" => none(wallet::transfer(state, envelope, ctx))?,

            // Escrow
            "escrow.create" => none(escrow::create(state, envelope))?,
            "escrow.fund" => none(escrow::fund(state, envelope, ctx))?,
            "escrow.release" => none(escrow::release(state, envelope))?,
            "escrow.refund" => none(escrow::refund(state, envelope))?,
            "escrow.dispute" => none(escrow::dispute(state, envelope))?,

            // Contract
            "contract.create" => none(contract::create(state, envelope))?,
            "contract.negotiate" => none(contract::negotiate(state, envelope))?,
            "contract.finalize_terms" => none(contract::finalize_terms(state, envelope))?,
            "contract.sign" => none(contract::sign(state, envelope))?,
            "contract.fund" => none(contract::fund(state, envelope))?,
            "contract.complete" => none(contract::complete(state, envelope))?,
            "contract.dispute" => none(contract::dispute(state, envelope))?,
            "contract.resolve" => none(contract::resolve(state, envelope))?,
            "contract.milestone.submit" => none(contract::milestone_submit(state, envelope))?,
            "contract.milestone.approve" => contract::milestone_approve(state, envelope)?,
            "contract.milestone.reject" => none(contract::milestone_reject(state, envelope))?,

            // Market: listings
            "market.listing.create" => none(market::listing::create(state, envelope))?,
            "market.listing.update" => none(market::listing::update(state, envelope))?,
            "market.listing.publish" => none(market::listing::publish(state, envelope))?,
            "market.listing.pause" => none(market::listing::pause(state, envelope))?,
            "market.listing.expire" => none(market::listing::expire(state, envelope))?,
            "market.listing.remove" => none(market::listing::remove(state, envelope))?,
            "market.listing.sold_out" => none(market::listing::sold_out(state, envelope))?,

            // Market: orders
            "market.order.create" => none(market::order::create(state, envelope))?,
            "market.order.submit" => none(market::order::submit(state, envelope))?,
            "market.order.accept" => none(market::order::accept(state, envelope))?,
            "market.order.invoice" => none(market::order::invoice(state, envelope))?,
            "market.order.pay" => none(market::order::pay(state, envelope))?,
            "market.order.start" => none(market::order::start(state, envelope))?,
            "market.order.deliver" => none(market::order::deliver(state, envelope))?,
            "market.order.complete" => none(market::order::complete(state, envelope))?,
            "market.order.cancel" => none(market::order::cancel(state, envelope))?,
            "market.order.refund" => none(market::order::refund(state, envelope))?,

            // Market: bids
            "market.bid.submit" => none(market::bid::submit(state, envelope))?,
            "market.bid.shortlist" => none(market::bid::shortlist(state, envelope))?,
            "market.bid.accept" => none(market::bid::accept(state, envelope))?,
            "market.bid.reject" => none(market::bid::reject(state, envelope))?,
            "market.bid.withdraw" => none(market::bid::withdraw(state, envelope))?,

            // Market: submissions
            "market.submission.submit" => none(market::submission::submit(state, envelope))?,
            "market.submission.approve" => none(market::submission::approve(state, envelope))?,
            "market.submission.reject" => none(market::submission::reject(state, envelope))?,
            "market.submission.revise" => none(market::submission::revise(state, envelope))?,

            // Market: subscriptions
            "market.subscription.create" => none(market::subscription::create(state, envelope))?,
            "market.subscription.cancel" => none(market::subscription::cancel(state, envelope))?,
            "market.subscription.expire" => none(market::subscription::expire(state, envelope))?,

            // Market: disputes
            "market.dispute.open" => none(market::dispute::open(state, envelope))?,
            "market.dispute.respond" => none(market::dispute::respond(state, envelope))?,
            "market.dispute.resolve" => none(market::dispute::resolve(state, envelope))?,

            // Capability leases
            "lease.create" => none(lease::create(state, envelope))?,
            "lease.pause" => none(lease::pause(state, envelope))?,
            "lease.resume" => none(lease::resume(state, envelope))?,
            "lease.invoke" => none(lease::invoke(state, envelope))?,
            "lease.expire" => none(lease::expire(state, envelope))?,
            "lease.cancel" => none(lease::cancel(state, envelope))?,
            "lease.terminate" => none(lease::terminate(state, envelope))?,

            // Reputation
            "reputation.review" => none(reputation::review(state, envelope))?,

            // DAO
            "dao.proposal.create" => none(dao::proposal_create(state, envelope))?,
            "dao.proposal.start_voting" => none(dao::start_voting(state, envelope))?,
            "dao.proposal.finalize" => none(dao::finalize(state, envelope))?,
            "dao.proposal.queue" => none(dao::queue(state, envelope))?,
            "dao.proposal.execute" => none(dao::execute(state, envelope))?,
            "dao.proposal.cancel" => none(dao::cancel(state, envelope))?,
            "dao.vote.cast" => none(dao::vote(state, envelope))?,

            // Forward compatibility: unknown types are recorded no-ops
            unknown => {
                debug!(event_type = unknown, "unknown event type skipped");
                *state
                    .skipped_event_types
                    .entry(unknown.to_string())
                    .or_insert(0) += 1;
                return Ok((None, true));
            }
        };

        Ok((payout, false))
    }
}

/// Lift a unit-returning handler into the payout-bearing dispatch shape.
fn none(result: Result<(), ReducerError>) -> Result<Option<MilestonePayout>, ReducerError> {
    result.map(|()| None)
}

/// Parse an envelope payload into its typed record.
pub(crate) fn parse_payload<T: DeserializeOwned>(
    envelope: &EventEnvelope,
) -> Result<T, ReducerError> {
    serde_json::from_value(envelope.payload.clone()).map_err(|e| ReducerError::InvalidPayload {
        event_type: envelope.event_type.clone(),
        reason: e.to_string(),
    })
}
