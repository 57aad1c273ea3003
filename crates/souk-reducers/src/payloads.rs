//! # Typed Event Payloads
//!
//! The envelope carries its payload as raw JSON with the `type` field as
//! discriminator; each handler parses the variant it owns into one of these
//! records before touching state. Create-vs-update invariants are encoded
//! in the types: create payloads carry the full record, update payloads
//! only the id plus the mutation.
//!
//! Unknown event types never reach these parsers; they are recorded as
//! skipped and the payload is preserved verbatim in the log.

use serde::Deserialize;
use souk_types::TokenAmount;
use std::collections::BTreeMap;

use crate::state::{DisputeOutcome, ListingKind};

// =============================================================================
// IDENTITY
// =============================================================================

/// `identity.create`
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityCreate {
    /// Initial profile fields.
    #[serde(default)]
    pub profile: BTreeMap<String, String>,
}

/// `identity.update`
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityUpdate {
    /// Profile fields to merge.
    #[serde(default)]
    pub profile: BTreeMap<String, String>,
}

/// `identity.capability.register`
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityRegister {
    /// Capability id.
    pub id: String,
    /// Capability kind.
    pub kind: String,
    /// Opaque credential checked by the host's verifier.
    #[serde(default)]
    pub credential: Option<serde_json::Value>,
}

// =============================================================================
// WALLET
// =============================================================================

/// `wallet.mint`
#[derive(Debug, Clone, Deserialize)]
pub struct WalletMint {
    /// Credited address.
    pub to: String,
    /// Minted amount.
    pub amount: TokenAmount,
}

/// `wallet.transfer`
#[derive(Debug, Clone, Deserialize)]
pub struct WalletTransfer {
    /// Debited address (must be the issuer's).
    pub from: String,
    /// Credited address.
    pub to: String,
    /// Transferred amount.
    pub amount: TokenAmount,
    /// Protocol fee, credited to the fee pool.
    #[serde(default)]
    pub fee: TokenAmount,
}

// =============================================================================
// ESCROW
// =============================================================================

/// A release rule in `escrow.create`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseRulePayload {
    /// Rule id cited by later releases.
    pub id: String,
    /// Optional cap on the total released under this rule.
    #[serde(default)]
    pub max_amount: Option<TokenAmount>,
}

/// `escrow.create`
#[derive(Debug, Clone, Deserialize)]
pub struct EscrowCreate {
    /// Escrow id.
    pub id: String,
    /// Beneficiary DID.
    pub beneficiary: String,
    /// Escrowed amount.
    pub amount: TokenAmount,
    /// Release rules; releases must cite one.
    #[serde(default, rename = "releaseRules")]
    pub release_rules: Vec<ReleaseRulePayload>,
    /// Expiry timestamp.
    #[serde(rename = "expiresAt")]
    pub expires_at: u64,
}

/// `escrow.fund`
#[derive(Debug, Clone, Deserialize)]
pub struct EscrowFund {
    /// Escrow id.
    pub id: String,
    /// Funded amount.
    pub amount: TokenAmount,
}

/// `escrow.release`
#[derive(Debug, Clone, Deserialize)]
pub struct EscrowRelease {
    /// Escrow id.
    pub id: String,
    /// Released amount.
    pub amount: TokenAmount,
    /// Cited release rule.
    #[serde(rename = "ruleId")]
    pub rule_id: String,
}

/// `escrow.dispute`
#[derive(Debug, Clone, Deserialize)]
pub struct EscrowRef {
    /// Escrow id.
    pub id: String,
}

/// `escrow.refund`
#[derive(Debug, Clone, Deserialize)]
pub struct EscrowRefund {
    /// Escrow id.
    pub id: String,
    /// Refunded amount.
    pub amount: TokenAmount,
    /// Required reason string.
    pub reason: String,
}

// =============================================================================
// CONTRACT
// =============================================================================

/// A milestone in `contract.create`.
#[derive(Debug, Clone, Deserialize)]
pub struct MilestonePayload {
    /// Milestone id.
    pub id: String,
    /// Short description.
    pub title: String,
    /// Payout from the payment schedule, if any.
    #[serde(default)]
    pub amount: Option<TokenAmount>,
}

/// `contract.create`
#[derive(Debug, Clone, Deserialize)]
pub struct ContractCreate {
    /// Contract id.
    pub id: String,
    /// Provider DID (the issuer is the client).
    pub provider: String,
    /// Hash or URI of the terms document.
    pub terms: String,
    /// Milestones in schedule order.
    #[serde(default)]
    pub milestones: Vec<MilestonePayload>,
}

/// `contract.negotiate` / `contract.finalize_terms`
#[derive(Debug, Clone, Deserialize)]
pub struct ContractTerms {
    /// Contract id.
    pub id: String,
    /// Updated terms reference.
    pub terms: String,
}

/// `contract.sign` / `contract.complete` / `contract.dispute` /
/// `contract.resolve`
#[derive(Debug, Clone, Deserialize)]
pub struct ContractRef {
    /// Contract id.
    pub id: String,
}

/// `contract.fund`
#[derive(Debug, Clone, Deserialize)]
pub struct ContractFund {
    /// Contract id.
    pub id: String,
    /// Escrow holding the contract funds.
    #[serde(rename = "escrowId")]
    pub escrow_id: String,
}

/// `contract.milestone.submit` / `contract.milestone.approve` /
/// `contract.milestone.reject`
#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneRef {
    /// Contract id.
    pub id: String,
    /// Milestone id.
    #[serde(rename = "milestoneId")]
    pub milestone_id: String,
}

// =============================================================================
// MARKET: LISTING
// =============================================================================

/// `market.listing.create`
#[derive(Debug, Clone, Deserialize)]
pub struct ListingCreate {
    /// Listing id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Listing kind.
    pub kind: ListingKind,
    /// Unit price.
    pub price: TokenAmount,
    /// Inventory; `None` means unbounded.
    #[serde(default)]
    pub inventory: Option<u64>,
}

/// `market.listing.update`
#[derive(Debug, Clone, Deserialize)]
pub struct ListingUpdate {
    /// Listing id.
    pub id: String,
    /// New title, if changing.
    #[serde(default)]
    pub title: Option<String>,
    /// New price, if changing.
    #[serde(default)]
    pub price: Option<TokenAmount>,
    /// New inventory, if changing.
    #[serde(default)]
    pub inventory: Option<u64>,
}

/// `market.listing.publish` / `.pause` / `.expire` / `.remove` /
/// `.sold_out`
#[derive(Debug, Clone, Deserialize)]
pub struct ListingRef {
    /// Listing id.
    pub id: String,
}

// =============================================================================
// MARKET: ORDER
// =============================================================================

/// `market.order.create`
#[derive(Debug, Clone, Deserialize)]
pub struct OrderCreate {
    /// Order id.
    pub id: String,
    /// Listing being ordered.
    #[serde(rename = "listingId")]
    pub listing_id: String,
    /// Quantity.
    pub quantity: u64,
}

/// All single-step order transitions carry just the order id.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRef {
    /// Order id.
    pub id: String,
}

// =============================================================================
// MARKET: BID / SUBMISSION / SUBSCRIPTION / DISPUTE
// =============================================================================

/// `market.bid.submit`
#[derive(Debug, Clone, Deserialize)]
pub struct BidSubmit {
    /// Bid id.
    pub id: String,
    /// Task listing the bid targets.
    #[serde(rename = "listingId")]
    pub listing_id: String,
    /// Offered amount.
    pub amount: TokenAmount,
}

/// `market.bid.shortlist` / `.accept` / `.reject` / `.withdraw`
#[derive(Debug, Clone, Deserialize)]
pub struct BidRef {
    /// Bid id.
    pub id: String,
}

/// `market.submission.submit`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionSubmit {
    /// Submission id.
    pub id: String,
    /// Order delivered on.
    #[serde(rename = "orderId")]
    pub order_id: String,
    /// Content reference.
    pub content: String,
}

/// `market.submission.approve` / `.reject` / `.revise`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionRef {
    /// Submission id.
    pub id: String,
}

/// `market.subscription.create`
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionCreate {
    /// Subscription id.
    pub id: String,
    /// Listing subscribed to.
    #[serde(rename = "listingId")]
    pub listing_id: String,
}

/// `market.subscription.cancel` / `.expire`
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRef {
    /// Subscription id.
    pub id: String,
}

/// `market.dispute.open`
#[derive(Debug, Clone, Deserialize)]
pub struct DisputeOpen {
    /// Dispute id.
    pub id: String,
    /// Disputed order.
    #[serde(rename = "orderId")]
    pub order_id: String,
    /// Stated reason.
    pub reason: String,
}

/// `market.dispute.respond`
#[derive(Debug, Clone, Deserialize)]
pub struct DisputeRespond {
    /// Dispute id.
    pub id: String,
    /// Respondent's answer.
    pub response: String,
}

/// `market.dispute.resolve`
#[derive(Debug, Clone, Deserialize)]
pub struct DisputeResolve {
    /// Dispute id.
    pub id: String,
    /// Resolution outcome.
    pub outcome: DisputeOutcome,
}

// =============================================================================
// LEASE
// =============================================================================

/// `lease.create`
#[derive(Debug, Clone, Deserialize)]
pub struct LeaseCreate {
    /// Lease id.
    pub id: String,
    /// Capability listing leased.
    #[serde(rename = "listingId")]
    pub listing_id: String,
    /// Units granted.
    #[serde(rename = "unitsTotal")]
    pub units_total: u64,
    /// Expiry timestamp.
    #[serde(rename = "expiresAt")]
    pub expires_at: u64,
}

/// `lease.pause` / `.resume` / `.expire` / `.cancel` / `.terminate`
#[derive(Debug, Clone, Deserialize)]
pub struct LeaseRef {
    /// Lease id.
    pub id: String,
}

/// `lease.invoke`
#[derive(Debug, Clone, Deserialize)]
pub struct LeaseInvoke {
    /// Lease id.
    pub id: String,
    /// Units consumed by this invocation.
    pub units: u64,
    /// Explicit cost; derived from the listing's pricing when absent.
    #[serde(default)]
    pub cost: Option<TokenAmount>,
}

// =============================================================================
// REPUTATION
// =============================================================================

/// `reputation.review`
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSubmit {
    /// Review id.
    pub id: String,
    /// Completed order reviewed.
    #[serde(rename = "orderId")]
    pub order_id: String,
    /// Rating, 1..=5.
    pub rating: u8,
    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
}

// =============================================================================
// DAO
// =============================================================================

/// `dao.proposal.create`
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalCreate {
    /// Proposal id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Voting window start.
    #[serde(rename = "votingStart")]
    pub voting_start: u64,
    /// Voting window end.
    #[serde(rename = "votingEnd")]
    pub voting_end: u64,
    /// Timelock delay (ms) between queue and execute.
    #[serde(rename = "timelockDelay")]
    pub timelock_delay: u64,
}

/// `dao.proposal.start_voting` / `.finalize` / `.queue` / `.execute` /
/// `.cancel`
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalRef {
    /// Proposal id.
    pub id: String,
}

/// `dao.vote.cast`
#[derive(Debug, Clone, Deserialize)]
pub struct VoteCast {
    /// Proposal id.
    pub id: String,
    /// Support or oppose.
    pub support: bool,
}

/// `dao.delegate.set`
#[derive(Debug, Clone, Deserialize)]
pub struct DelegateSet {
    /// Delegate DID; `None` clears the delegation.
    #[serde(default)]
    pub to: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escrow_create_parses_wire_field_names() {
        let payload: EscrowCreate = serde_json::from_value(json!({
            "id": "E",
            "beneficiary": "did:souk:zB",
            "amount": 300,
            "releaseRules": [{"id": "r1"}],
            "expiresAt": 1700000000000u64
        }))
        .unwrap();

        assert_eq!(payload.release_rules.len(), 1);
        assert_eq!(payload.release_rules[0].id, "r1");
        assert_eq!(payload.amount, TokenAmount::from_u64(300));
    }

    #[test]
    fn test_transfer_fee_defaults_to_zero() {
        let payload: WalletTransfer = serde_json::from_value(json!({
            "from": "aa", "to": "bb", "amount": 400
        }))
        .unwrap();
        assert!(payload.fee.is_zero());
    }

    #[test]
    fn test_big_amount_survives_parse() {
        let raw = r#"{"to": "aa", "amount": 1208925819614629174706176}"#;
        let payload: WalletMint = serde_json::from_str(raw).unwrap();
        assert_eq!(
            payload.amount.to_decimal_string(),
            "1208925819614629174706176"
        );
    }
}
