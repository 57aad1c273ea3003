//! # State Views
//!
//! Read-only accessors over the current projections, the surface the HTTP
//! layer queries. Each call takes a consistent read snapshot; nothing here
//! can mutate state.

use souk_reducers::state::{
    BidRecord, ContractRecord, DisputeRecord, EscrowRecord, IdentityRecord, LeaseRecord,
    ListingRecord, OrderRecord, ProposalRecord, ReputationScore, ReviewRecord, SubmissionRecord,
    SubscriptionRecord,
};
use souk_store::KeyValueStore;
use souk_types::{EventHash, ResourceKind, TokenAmount};

use crate::service::NodeService;

impl<K: KeyValueStore> NodeService<K> {
    /// Wallet balance of an address (zero when unknown).
    pub fn balance(&self, address: &str) -> TokenAmount {
        self.with_state(|s| s.wallet.balance(address))
    }

    /// An identity by DID.
    pub fn identity(&self, did: &str) -> Option<IdentityRecord> {
        self.with_state(|s| s.identities.get(did).cloned())
    }

    /// An escrow by id.
    pub fn escrow(&self, id: &str) -> Option<EscrowRecord> {
        self.with_state(|s| s.escrows.get(id).cloned())
    }

    /// A contract by id.
    pub fn contract(&self, id: &str) -> Option<ContractRecord> {
        self.with_state(|s| s.contracts.get(id).cloned())
    }

    /// A listing by id.
    pub fn listing(&self, id: &str) -> Option<ListingRecord> {
        self.with_state(|s| s.listings.get(id).cloned())
    }

    /// An order by id.
    pub fn order(&self, id: &str) -> Option<OrderRecord> {
        self.with_state(|s| s.orders.get(id).cloned())
    }

    /// A bid by id.
    pub fn bid(&self, id: &str) -> Option<BidRecord> {
        self.with_state(|s| s.bids.get(id).cloned())
    }

    /// A submission by id.
    pub fn submission(&self, id: &str) -> Option<SubmissionRecord> {
        self.with_state(|s| s.submissions.get(id).cloned())
    }

    /// A subscription by id.
    pub fn subscription(&self, id: &str) -> Option<SubscriptionRecord> {
        self.with_state(|s| s.subscriptions.get(id).cloned())
    }

    /// A dispute by id.
    pub fn dispute(&self, id: &str) -> Option<DisputeRecord> {
        self.with_state(|s| s.disputes.get(id).cloned())
    }

    /// A lease by id.
    pub fn lease(&self, id: &str) -> Option<LeaseRecord> {
        self.with_state(|s| s.leases.get(id).cloned())
    }

    /// A review by id.
    pub fn review(&self, id: &str) -> Option<ReviewRecord> {
        self.with_state(|s| s.reviews.get(id).cloned())
    }

    /// Aggregated reputation of a DID.
    pub fn reputation_of(&self, did: &str) -> ReputationScore {
        self.with_state(|s| s.reputation.get(did).cloned().unwrap_or_default())
    }

    /// A governance proposal by id.
    pub fn proposal(&self, id: &str) -> Option<ProposalRecord> {
        self.with_state(|s| s.proposals.get(id).cloned())
    }

    /// All listings offered by a seller.
    pub fn listings_by_seller(&self, seller: &str) -> Vec<ListingRecord> {
        self.with_state(|s| {
            s.listings
                .values()
                .filter(|l| l.seller == seller)
                .cloned()
                .collect()
        })
    }

    /// All orders a DID participates in, as buyer or seller.
    pub fn orders_for(&self, did: &str) -> Vec<OrderRecord> {
        self.with_state(|s| {
            s.orders
                .values()
                .filter(|o| o.buyer == did || o.seller == did)
                .cloned()
                .collect()
        })
    }

    /// All escrows a DID participates in, as depositor or beneficiary.
    pub fn escrows_for(&self, did: &str) -> Vec<EscrowRecord> {
        self.with_state(|s| {
            s.escrows
                .values()
                .filter(|e| e.depositor == did || e.beneficiary == did)
                .cloned()
                .collect()
        })
    }

    /// All contracts a DID participates in, as client or provider.
    pub fn contracts_for(&self, did: &str) -> Vec<ContractRecord> {
        self.with_state(|s| {
            s.contracts
                .values()
                .filter(|c| c.client == did || c.provider == did)
                .cloned()
                .collect()
        })
    }

    /// Every resource head of a kind, as `(id, head_hash)` pairs.
    pub fn heads_by_kind(&self, kind: ResourceKind) -> Vec<(String, EventHash)> {
        let prefix = format!("{}/", kind.as_str());
        self.with_state(|s| {
            s.heads
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k[prefix.len()..].to_string(), v.clone()))
                .collect()
        })
    }
}
