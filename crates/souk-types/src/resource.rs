//! # Resource References
//!
//! Every event that mutates marketplace state targets exactly one resource,
//! and each resource carries its own prev-hash chain (`resourcePrev`). This
//! module maps an event's `type` + payload to the `(kind, id)` pair the
//! store keys its head table by.
//!
//! Ownership convention: a resource chain belongs to the issuer that
//! created it. Counterpart operations (a client approving a milestone, a
//! voter casting on someone else's proposal) are authorized per event type
//! inside the reducers, not here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kinds of resources with per-resource chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Participant identity record.
    Identity,
    /// Per-issuer wallet ledger chain.
    Wallet,
    /// Escrow account.
    Escrow,
    /// Service contract.
    Contract,
    /// Marketplace listing.
    Listing,
    /// Marketplace order.
    Order,
    /// Bid on a task listing.
    Bid,
    /// Work submission under review.
    Submission,
    /// Recurring subscription.
    Subscription,
    /// Dispute record.
    Dispute,
    /// Capability lease.
    Lease,
    /// DAO governance proposal.
    Proposal,
    /// Reputation review (single-event resource).
    Review,
}

impl ResourceKind {
    /// Stable key segment used in the store's head table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Identity => "identity",
            ResourceKind::Wallet => "wallet",
            ResourceKind::Escrow => "escrow",
            ResourceKind::Contract => "contract",
            ResourceKind::Listing => "listing",
            ResourceKind::Order => "order",
            ResourceKind::Bid => "bid",
            ResourceKind::Submission => "submission",
            ResourceKind::Subscription => "subscription",
            ResourceKind::Dispute => "dispute",
            ResourceKind::Lease => "lease",
            ResourceKind::Proposal => "proposal",
            ResourceKind::Review => "review",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(kind, id)` pair a mutating event targets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource identifier within the kind.
    pub id: String,
}

impl ResourceRef {
    /// Build a reference.
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Resolve which resource an event targets, if any.
    ///
    /// - `identity.*` chains on the issuer's DID.
    /// - `wallet.*` chains on the issuer's wallet (the caller passes the
    ///   issuer's derived address as `issuer_wallet_id`).
    /// - `dao.vote.*` and `dao.delegate.*` chain on the proposal / the
    ///   issuer identity respectively.
    /// - Everything else chains on `payload.id`.
    /// - Unknown type prefixes return `None`; such events are stored but
    ///   reduced as no-ops.
    #[must_use]
    pub fn from_event(
        event_type: &str,
        issuer: &str,
        issuer_wallet_id: &str,
        payload: &Value,
    ) -> Option<Self> {
        let payload_id = || {
            payload
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        if event_type.starts_with("identity.") {
            return Some(Self::new(ResourceKind::Identity, issuer));
        }
        if event_type.starts_with("wallet.") {
            return Some(Self::new(ResourceKind::Wallet, issuer_wallet_id));
        }
        if event_type.starts_with("escrow.") {
            return payload_id().map(|id| Self::new(ResourceKind::Escrow, id));
        }
        if event_type.starts_with("contract.") {
            return payload_id().map(|id| Self::new(ResourceKind::Contract, id));
        }
        if event_type.starts_with("market.listing.") {
            return payload_id().map(|id| Self::new(ResourceKind::Listing, id));
        }
        if event_type.starts_with("market.order.") {
            return payload_id().map(|id| Self::new(ResourceKind::Order, id));
        }
        if event_type.starts_with("market.bid.") {
            return payload_id().map(|id| Self::new(ResourceKind::Bid, id));
        }
        if event_type.starts_with("market.submission.") {
            return payload_id().map(|id| Self::new(ResourceKind::Submission, id));
        }
        if event_type.starts_with("market.subscription.") {
            return payload_id().map(|id| Self::new(ResourceKind::Subscription, id));
        }
        if event_type.starts_with("market.dispute.") {
            return payload_id().map(|id| Self::new(ResourceKind::Dispute, id));
        }
        if event_type.starts_with("lease.") {
            return payload_id().map(|id| Self::new(ResourceKind::Lease, id));
        }
        if event_type.starts_with("dao.vote.") {
            return payload_id().map(|id| Self::new(ResourceKind::Proposal, id));
        }
        if event_type.starts_with("dao.delegate.") {
            return Some(Self::new(ResourceKind::Identity, issuer));
        }
        if event_type.starts_with("dao.proposal.") {
            return payload_id().map(|id| Self::new(ResourceKind::Proposal, id));
        }
        if event_type.starts_with("reputation.") {
            return payload_id().map(|id| Self::new(ResourceKind::Review, id));
        }
        None
    }

    /// True for event types that open a fresh chain (no `resourcePrev`).
    ///
    /// Wallet chains and review resources are append-created: their first
    /// event needs no `*.create`.
    #[must_use]
    pub fn is_create_event(event_type: &str) -> bool {
        matches!(
            event_type,
            "identity.create"
                | "escrow.create"
                | "contract.create"
                | "market.listing.create"
                | "market.order.create"
                | "market.bid.submit"
                | "market.submission.submit"
                | "market.subscription.create"
                | "market.dispute.open"
                | "lease.create"
                | "dao.proposal.create"
                | "reputation.review"
        ) || event_type.starts_with("wallet.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_targets_payload_id() {
        let r = ResourceRef::from_event(
            "market.listing.publish",
            "did:souk:zIssuer",
            "aabbcc",
            &json!({"id": "lst-1"}),
        )
        .unwrap();
        assert_eq!(r, ResourceRef::new(ResourceKind::Listing, "lst-1"));
    }

    #[test]
    fn test_identity_targets_issuer() {
        let r = ResourceRef::from_event("identity.update", "did:souk:zAbc", "aabbcc", &json!({}))
            .unwrap();
        assert_eq!(r, ResourceRef::new(ResourceKind::Identity, "did:souk:zAbc"));
    }

    #[test]
    fn test_wallet_targets_issuer_wallet() {
        let r = ResourceRef::from_event("wallet.transfer", "did:souk:zAbc", "aabbcc", &json!({}))
            .unwrap();
        assert_eq!(r, ResourceRef::new(ResourceKind::Wallet, "aabbcc"));
    }

    #[test]
    fn test_vote_targets_proposal() {
        let r = ResourceRef::from_event(
            "dao.vote.cast",
            "did:souk:zVoter",
            "aabbcc",
            &json!({"id": "prop-9", "support": true}),
        )
        .unwrap();
        assert_eq!(r, ResourceRef::new(ResourceKind::Proposal, "prop-9"));
    }

    #[test]
    fn test_unknown_type_has_no_resource() {
        let r = ResourceRef::from_event("future.thing", "did:souk:zX", "aabbcc", &json!({}));
        assert!(r.is_none());
    }

    #[test]
    fn test_missing_payload_id_has_no_resource() {
        let r = ResourceRef::from_event("escrow.fund", "did:souk:zX", "aabbcc", &json!({}));
        assert!(r.is_none());
    }

    #[test]
    fn test_create_classification() {
        assert!(ResourceRef::is_create_event("escrow.create"));
        assert!(ResourceRef::is_create_event("wallet.mint"));
        assert!(ResourceRef::is_create_event("wallet.transfer"));
        assert!(!ResourceRef::is_create_event("escrow.fund"));
        assert!(!ResourceRef::is_create_event("contract.sign"));
    }
}
