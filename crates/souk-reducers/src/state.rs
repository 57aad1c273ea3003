//! # Ledger State
//!
//! The deterministic projection of the event log: every domain's current
//! state, the per-resource head table, and the per-issuer nonce windows.
//! All containers are `BTreeMap`/`BTreeSet` so iteration order, and with it
//! snapshot bytes, are identical across replicas.
//!
//! The whole struct serializes to JSON for snapshots; replaying the log
//! from genesis and restoring a snapshot plus its tail must produce equal
//! values.

use serde::{Deserialize, Serialize};
use souk_types::{EventHash, NonceWindow, ResourceKind, TokenAmount};
use std::collections::{BTreeMap, BTreeSet};

/// Account address reserved for the protocol fee pool.
pub const FEE_POOL_ADDRESS: &str = "fees";

// =============================================================================
// IDENTITY
// =============================================================================

/// A capability registered on an identity. Registrations append; they never
/// change identity state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRegistration {
    /// Capability id.
    pub id: String,
    /// Capability kind (free-form, host-defined).
    pub kind: String,
    /// Registration timestamp (envelope `ts`).
    pub registered_ts: u64,
}

/// A participant identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// The identity's DID (resource id).
    pub did: String,
    /// Derived wallet address.
    pub address: String,
    /// Free-form profile fields.
    pub profile: BTreeMap<String, String>,
    /// Registered capabilities, in registration order.
    pub capabilities: Vec<CapabilityRegistration>,
    /// DAO vote delegate, when set.
    pub delegate: Option<String>,
    /// Creation timestamp.
    pub created_ts: u64,
    /// Last update timestamp.
    pub updated_ts: u64,
}

// =============================================================================
// WALLET
// =============================================================================

/// One side of a wallet ledger movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Event that produced the movement.
    pub event: EventHash,
    /// Affected address.
    pub address: String,
    /// Amount credited to the address.
    pub credit: TokenAmount,
    /// Amount debited from the address.
    pub debit: TokenAmount,
}

/// Wallet projection: derived balances plus the append-only ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    /// Current balance per address (includes [`FEE_POOL_ADDRESS`]).
    pub balances: BTreeMap<String, TokenAmount>,
    /// Append-only movement ledger.
    pub ledger: Vec<LedgerEntry>,
    /// Total ever minted (credits with no matching debit).
    pub total_minted: TokenAmount,
}

impl WalletState {
    /// Balance of an address (zero when unknown).
    #[must_use]
    pub fn balance(&self, address: &str) -> TokenAmount {
        self.balances.get(address).cloned().unwrap_or_default()
    }
}

// =============================================================================
// ESCROW
// =============================================================================

/// Escrow lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum EscrowStatus {
    Pending,
    Funded,
    Releasing,
    Released,
    Refunded,
    Disputed,
}

impl EscrowStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::Pending => "pending",
            EscrowStatus::Funded => "funded",
            EscrowStatus::Releasing => "releasing",
            EscrowStatus::Released => "released",
            EscrowStatus::Refunded => "refunded",
            EscrowStatus::Disputed => "disputed",
        }
    }
}

/// A release rule the escrow creator registered; releases must cite one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRule {
    /// Rule id cited by release events.
    pub id: String,
    /// Optional cap on the total released under this rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<TokenAmount>,
}

/// An escrow account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Escrow id.
    pub id: String,
    /// Depositor DID (chain owner).
    pub depositor: String,
    /// Beneficiary DID.
    pub beneficiary: String,
    /// Created amount.
    pub amount: TokenAmount,
    /// Total funded so far.
    pub funded: TokenAmount,
    /// Total released to the beneficiary.
    pub released: TokenAmount,
    /// Total refunded to the depositor.
    pub refunded: TokenAmount,
    /// Registered release rules.
    pub release_rules: Vec<ReleaseRule>,
    /// Expiry timestamp; expiry refunds valid from here on.
    pub expires_at: u64,
    /// Current status.
    pub status: EscrowStatus,
}

impl EscrowRecord {
    /// Funds still held: `funded - released - refunded`.
    #[must_use]
    pub fn remaining(&self) -> TokenAmount {
        self.funded
            .checked_sub(&self.released)
            .and_then(|r| r.checked_sub(&self.refunded))
            .unwrap_or_default()
    }
}

// =============================================================================
// CONTRACT
// =============================================================================

/// Contract lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ContractStatus {
    Draft,
    Negotiating,
    PendingSignature,
    PendingFunding,
    Active,
    Completed,
    Disputed,
    Resolved,
}

impl ContractStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Negotiating => "negotiating",
            ContractStatus::PendingSignature => "pending_signature",
            ContractStatus::PendingFunding => "pending_funding",
            ContractStatus::Active => "active",
            ContractStatus::Completed => "completed",
            ContractStatus::Disputed => "disputed",
            ContractStatus::Resolved => "resolved",
        }
    }
}

/// Milestone lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum MilestoneStatus {
    Pending,
    Submitted,
    Approved,
    Rejected,
}

impl MilestoneStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::Submitted => "submitted",
            MilestoneStatus::Approved => "approved",
            MilestoneStatus::Rejected => "rejected",
        }
    }
}

/// A contract milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Milestone id.
    pub id: String,
    /// Short description.
    pub title: String,
    /// Payout associated by the payment schedule, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<TokenAmount>,
    /// Current status.
    pub status: MilestoneStatus,
}

/// A service contract between a client and a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Contract id.
    pub id: String,
    /// Client DID (chain owner; pays).
    pub client: String,
    /// Provider DID (delivers).
    pub provider: String,
    /// Hash or URI of the agreed terms document.
    pub terms: String,
    /// Milestones keyed by id.
    pub milestones: BTreeMap<String, Milestone>,
    /// Escrow funding this contract, once funded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escrow_id: Option<String>,
    /// Parties that have signed.
    pub signatures: BTreeSet<String>,
    /// Status before a dispute, restored on resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_dispute_status: Option<ContractStatus>,
    /// Current status.
    pub status: ContractStatus,
}

// =============================================================================
// MARKET
// =============================================================================

/// Listing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ListingStatus {
    Draft,
    Active,
    Paused,
    SoldOut,
    Expired,
    Removed,
}

impl ListingStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::Active => "active",
            ListingStatus::Paused => "paused",
            ListingStatus::SoldOut => "sold_out",
            ListingStatus::Expired => "expired",
            ListingStatus::Removed => "removed",
        }
    }
}

/// What a listing offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ListingKind {
    Goods,
    Service,
    Task,
    Capability,
}

/// A marketplace listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Listing id.
    pub id: String,
    /// Seller DID (chain owner).
    pub seller: String,
    /// Title.
    pub title: String,
    /// Listing kind.
    pub kind: ListingKind,
    /// Unit price.
    pub price: TokenAmount,
    /// Remaining inventory; `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<u64>,
    /// Current status.
    pub status: ListingStatus,
}

/// Order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum OrderStatus {
    Draft,
    Pending,
    Accepted,
    PaymentPending,
    Paid,
    InProgress,
    Delivered,
    Completed,
    Cancelled,
    Disputed,
    Refunded,
}

impl OrderStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::PaymentPending => "payment_pending",
            OrderStatus::Paid => "paid",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Disputed => "disputed",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Terminal statuses absorb: no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }
}

/// A marketplace order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Order id.
    pub id: String,
    /// Listing being ordered.
    pub listing_id: String,
    /// Buyer DID (chain owner).
    pub buyer: String,
    /// Seller DID (from the listing).
    pub seller: String,
    /// Ordered quantity.
    pub quantity: u64,
    /// Total price.
    pub total: TokenAmount,
    /// Open dispute, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispute_id: Option<String>,
    /// Status before a dispute, restored when the dispute is dismissed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_dispute_status: Option<OrderStatus>,
    /// Current status.
    pub status: OrderStatus,
}

/// Bid lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BidStatus {
    Submitted,
    Shortlisted,
    Accepted,
    Rejected,
    Withdrawn,
}

impl BidStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Submitted => "submitted",
            BidStatus::Shortlisted => "shortlisted",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
            BidStatus::Withdrawn => "withdrawn",
        }
    }
}

/// A bid on a task listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidRecord {
    /// Bid id.
    pub id: String,
    /// Task listing the bid targets.
    pub listing_id: String,
    /// Bidder DID (chain owner).
    pub bidder: String,
    /// Offered amount.
    pub amount: TokenAmount,
    /// Current status.
    pub status: BidStatus,
}

/// Submission lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum SubmissionStatus {
    PendingReview,
    Approved,
    Rejected,
    Revision,
}

impl SubmissionStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::PendingReview => "pending_review",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::Revision => "revision",
        }
    }
}

/// A work submission under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Submission id.
    pub id: String,
    /// Order the submission delivers on.
    pub order_id: String,
    /// Submitter DID (chain owner).
    pub submitter: String,
    /// Content reference (URI or hash).
    pub content: String,
    /// Current status.
    pub status: SubmissionStatus,
}

/// Subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

/// A recurring subscription to a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Subscription id.
    pub id: String,
    /// Listing subscribed to.
    pub listing_id: String,
    /// Subscriber DID (chain owner).
    pub subscriber: String,
    /// Start timestamp.
    pub started_ts: u64,
    /// Current status.
    pub status: SubscriptionStatus,
}

/// Dispute lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum DisputeStatus {
    Open,
    Responded,
    Resolved,
}

impl DisputeStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::Responded => "responded",
            DisputeStatus::Resolved => "resolved",
        }
    }
}

/// How a dispute was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum DisputeOutcome {
    /// Order refunded to the buyer.
    Refund,
    /// Dispute dismissed; order resumes its prior status.
    Dismiss,
}

/// A dispute over an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeRecord {
    /// Dispute id.
    pub id: String,
    /// Disputed order.
    pub order_id: String,
    /// Opener DID (chain owner).
    pub opener: String,
    /// Counterpart DID.
    pub respondent: String,
    /// Opener's stated reason.
    pub reason: String,
    /// Respondent's answer, once given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Recorded outcome, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DisputeOutcome>,
    /// Current status.
    pub status: DisputeStatus,
}

/// Capability lease lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum LeaseStatus {
    Active,
    Paused,
    Exhausted,
    Expired,
    Cancelled,
    Terminated,
}

impl LeaseStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseStatus::Active => "active",
            LeaseStatus::Paused => "paused",
            LeaseStatus::Exhausted => "exhausted",
            LeaseStatus::Expired => "expired",
            LeaseStatus::Cancelled => "cancelled",
            LeaseStatus::Terminated => "terminated",
        }
    }
}

/// A lease on a capability listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Lease id.
    pub id: String,
    /// Capability listing leased.
    pub listing_id: String,
    /// Lessee DID (chain owner).
    pub lessee: String,
    /// Lessor DID (the listing's seller).
    pub lessor: String,
    /// Total units granted.
    pub units_total: u64,
    /// Units consumed so far.
    pub units_used: u64,
    /// Cost accrued from invocations.
    pub cost_accrued: TokenAmount,
    /// Expiry timestamp.
    pub expires_at: u64,
    /// Current status.
    pub status: LeaseStatus,
}

// =============================================================================
// REPUTATION
// =============================================================================

/// A submitted review (a single-event resource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Review id.
    pub id: String,
    /// Completed order being reviewed.
    pub order_id: String,
    /// Reviewer DID.
    pub reviewer: String,
    /// Reviewed party DID.
    pub subject: String,
    /// Rating, 1..=5.
    pub rating: u8,
    /// Free-form comment.
    pub comment: String,
}

/// Aggregated reputation per DID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationScore {
    /// Sum of ratings received.
    pub rating_total: u64,
    /// Number of ratings received.
    pub rating_count: u64,
}

// =============================================================================
// DAO
// =============================================================================

/// Proposal lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ProposalStatus {
    Discussion,
    Voting,
    Passed,
    Rejected,
    Queued,
    Executed,
    Cancelled,
}

impl ProposalStatus {
    /// Display form for errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Discussion => "discussion",
            ProposalStatus::Voting => "voting",
            ProposalStatus::Passed => "passed",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Queued => "queued",
            ProposalStatus::Executed => "executed",
            ProposalStatus::Cancelled => "cancelled",
        }
    }
}

/// One cast vote with its effective power.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Support or oppose.
    pub support: bool,
    /// Effective power at vote time (own balance plus delegations).
    pub power: TokenAmount,
}

/// A governance proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    /// Proposal id.
    pub id: String,
    /// Proposer DID (chain owner).
    pub proposer: String,
    /// Title.
    pub title: String,
    /// Voting window start.
    pub voting_start: u64,
    /// Voting window end.
    pub voting_end: u64,
    /// Timelock delay in milliseconds between queue and execute.
    pub timelock_delay: u64,
    /// Timestamp the proposal was queued, once queued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_ts: Option<u64>,
    /// Votes keyed by voter DID.
    pub votes: BTreeMap<String, VoteRecord>,
    /// Current status.
    pub status: ProposalStatus,
}

// =============================================================================
// TOP-LEVEL STATE
// =============================================================================

/// The full deterministic projection of the event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Per-resource chain heads, keyed `kind/id`.
    pub heads: BTreeMap<String, EventHash>,
    /// Per-issuer chain heads (the `prev` chain).
    pub issuer_heads: BTreeMap<String, EventHash>,
    /// Per-issuer nonce windows.
    pub nonces: NonceWindow,

    /// Identities keyed by DID.
    pub identities: BTreeMap<String, IdentityRecord>,
    /// Wallet projection.
    pub wallet: WalletState,
    /// Escrows keyed by id.
    pub escrows: BTreeMap<String, EscrowRecord>,
    /// Contracts keyed by id.
    pub contracts: BTreeMap<String, ContractRecord>,
    /// Listings keyed by id.
    pub listings: BTreeMap<String, ListingRecord>,
    /// Orders keyed by id.
    pub orders: BTreeMap<String, OrderRecord>,
    /// Bids keyed by id.
    pub bids: BTreeMap<String, BidRecord>,
    /// Accepted bid per listing; at most one bid per task wins.
    pub accepted_bids: BTreeMap<String, String>,
    /// Submissions keyed by id.
    pub submissions: BTreeMap<String, SubmissionRecord>,
    /// Subscriptions keyed by id.
    pub subscriptions: BTreeMap<String, SubscriptionRecord>,
    /// Disputes keyed by id.
    pub disputes: BTreeMap<String, DisputeRecord>,
    /// Capability leases keyed by id.
    pub leases: BTreeMap<String, LeaseRecord>,
    /// Reviews keyed by id.
    pub reviews: BTreeMap<String, ReviewRecord>,
    /// Aggregated reputation keyed by DID.
    pub reputation: BTreeMap<String, ReputationScore>,
    /// Governance proposals keyed by id.
    pub proposals: BTreeMap<String, ProposalRecord>,
    /// Event types seen but not understood (forward compatibility).
    pub skipped_event_types: BTreeMap<String, u64>,
}

impl LedgerState {
    /// Fresh empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Head table key for a resource.
    #[must_use]
    pub fn head_key(kind: ResourceKind, id: &str) -> String {
        format!("{}/{}", kind.as_str(), id)
    }

    /// Recorded head for a resource.
    #[must_use]
    pub fn head(&self, kind: ResourceKind, id: &str) -> Option<&EventHash> {
        self.heads.get(&Self::head_key(kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_remaining() {
        let escrow = EscrowRecord {
            id: "e-1".to_string(),
            depositor: "did:souk:zA".to_string(),
            beneficiary: "did:souk:zB".to_string(),
            amount: TokenAmount::from_u64(300),
            funded: TokenAmount::from_u64(300),
            released: TokenAmount::from_u64(100),
            refunded: TokenAmount::from_u64(0),
            release_rules: vec![],
            expires_at: 0,
            status: EscrowStatus::Releasing,
        };
        assert_eq!(escrow.remaining(), TokenAmount::from_u64(200));
    }

    #[test]
    fn test_state_snapshot_roundtrip() {
        let mut state = LedgerState::new();
        state
            .wallet
            .balances
            .insert("aa".to_string(), TokenAmount::from_u64(599));
        state
            .heads
            .insert("order/o-1".to_string(), "h9".to_string());

        let bytes = serde_json::to_vec(&state).unwrap();
        let restored: LedgerState = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(state, restored);
    }

    #[test]
    fn test_snapshot_bytes_deterministic() {
        let mut a = LedgerState::new();
        let mut b = LedgerState::new();
        for (addr, amount) in [("x", 1u64), ("y", 2), ("z", 3)] {
            a.wallet
                .balances
                .insert(addr.to_string(), TokenAmount::from_u64(amount));
        }
        // Insert in a different order
        for (addr, amount) in [("z", 3u64), ("x", 1), ("y", 2)] {
            b.wallet
                .balances
                .insert(addr.to_string(), TokenAmount::from_u64(amount));
        }
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }
}
