//! # DAO Governance Reducer
//!
//! Proposal lifecycle: `discussion -> voting -> (passed -> queued ->
//! executed) | rejected | cancelled`.
//!
//! Votes are valid only inside the proposal's voting window; a voter's
//! effective power is resolved at vote time from wallet balances plus
//! delegations (an identity that delegated away votes with zero own
//! balance; its balance flows to its delegate). Execution is gated by the
//! timelock delay recorded on the proposal, and a cancel anywhere before
//! execution is final.

use souk_types::{EventEnvelope, ResourceKind, TokenAmount};

use crate::dispatch::parse_payload;
use crate::errors::ReducerError;
use crate::market::unauthorized;
use crate::payloads::{ProposalCreate, ProposalRef, VoteCast};
use crate::state::{LedgerState, ProposalRecord, ProposalStatus, VoteRecord};

/// `dao.proposal.create`
pub fn proposal_create(
    state: &mut LedgerState,
    envelope: &EventEnvelope,
) -> Result<(), ReducerError> {
    let payload: ProposalCreate = parse_payload(envelope)?;

    if payload.voting_end <= payload.voting_start {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: "votingEnd must follow votingStart".to_string(),
        });
    }

    state.proposals.insert(
        payload.id.clone(),
        ProposalRecord {
            id: payload.id.clone(),
            proposer: envelope.issuer.clone(),
            title: payload.title,
            voting_start: payload.voting_start,
            voting_end: payload.voting_end,
            timelock_delay: payload.timelock_delay,
            queued_ts: None,
            votes: Default::default(),
            status: ProposalStatus::Discussion,
        },
    );
    Ok(())
}

/// `dao.proposal.start_voting` - proposer opens the ballot.
pub fn start_voting(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ProposalRef = parse_payload(envelope)?;
    let proposal = owned(state, envelope, &payload.id)?;

    if proposal.status != ProposalStatus::Discussion {
        return Err(bad_transition(proposal, "voting"));
    }
    proposal.status = ProposalStatus::Voting;
    Ok(())
}

/// `dao.vote.cast` - any identity, inside the window, once.
pub fn vote(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: VoteCast = parse_payload(envelope)?;

    {
        let proposal = existing(state, &payload.id)?;
        if proposal.status != ProposalStatus::Voting {
            return Err(bad_transition(proposal, "vote"));
        }
        if envelope.ts < proposal.voting_start || envelope.ts > proposal.voting_end {
            return Err(ReducerError::DaoVoteOutsideWindow {
                id: payload.id.clone(),
                start: proposal.voting_start,
                end: proposal.voting_end,
                ts: envelope.ts,
            });
        }
        if proposal.votes.contains_key(&envelope.issuer) {
            return Err(ReducerError::InvalidPayload {
                event_type: envelope.event_type.clone(),
                reason: format!("{} already voted on {}", envelope.issuer, payload.id),
            });
        }
    }

    let power = voting_power(state, &envelope.issuer);

    let proposal = existing(state, &payload.id)?;
    proposal.votes.insert(
        envelope.issuer.clone(),
        VoteRecord {
            support: payload.support,
            power,
        },
    );
    Ok(())
}

/// `dao.proposal.finalize` - proposer tallies after the window closes.
pub fn finalize(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ProposalRef = parse_payload(envelope)?;
    let proposal = owned(state, envelope, &payload.id)?;

    if proposal.status != ProposalStatus::Voting {
        return Err(bad_transition(proposal, "finalize"));
    }
    if envelope.ts <= proposal.voting_end {
        return Err(ReducerError::InvalidPayload {
            event_type: envelope.event_type.clone(),
            reason: format!("voting open until {}", proposal.voting_end),
        });
    }

    let mut for_power = TokenAmount::zero();
    let mut against_power = TokenAmount::zero();
    for vote in proposal.votes.values() {
        if vote.support {
            for_power = for_power.checked_add(&vote.power);
        } else {
            against_power = against_power.checked_add(&vote.power);
        }
    }

    proposal.status = if !proposal.votes.is_empty() && for_power > against_power {
        ProposalStatus::Passed
    } else {
        ProposalStatus::Rejected
    };
    Ok(())
}

/// `dao.proposal.queue` - proposer queues a passed proposal, starting the
/// timelock.
pub fn queue(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ProposalRef = parse_payload(envelope)?;
    let proposal = owned(state, envelope, &payload.id)?;

    if proposal.status != ProposalStatus::Passed {
        return Err(bad_transition(proposal, "queued"));
    }
    proposal.queued_ts = Some(envelope.ts);
    proposal.status = ProposalStatus::Queued;
    Ok(())
}

/// `dao.proposal.execute` - proposer executes after the timelock delay, as
/// long as no cancel intervened.
pub fn execute(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ProposalRef = parse_payload(envelope)?;
    let proposal = owned(state, envelope, &payload.id)?;

    if proposal.status != ProposalStatus::Queued {
        return Err(ReducerError::DaoProposalNotQueued {
            id: payload.id.clone(),
            status: proposal.status.as_str().to_string(),
        });
    }

    let queued_ts = proposal.queued_ts.unwrap_or(proposal.voting_end);
    let eta = queued_ts.saturating_add(proposal.timelock_delay);
    if envelope.ts < eta {
        return Err(ReducerError::DaoTimelockNotElapsed {
            id: payload.id.clone(),
            eta,
            ts: envelope.ts,
        });
    }

    proposal.status = ProposalStatus::Executed;
    Ok(())
}

/// `dao.proposal.cancel` - proposer cancels anywhere before execution.
pub fn cancel(state: &mut LedgerState, envelope: &EventEnvelope) -> Result<(), ReducerError> {
    let payload: ProposalRef = parse_payload(envelope)?;
    let proposal = owned(state, envelope, &payload.id)?;

    if matches!(
        proposal.status,
        ProposalStatus::Executed | ProposalStatus::Cancelled | ProposalStatus::Rejected
    ) {
        return Err(bad_transition(proposal, "cancelled"));
    }
    proposal.status = ProposalStatus::Cancelled;
    Ok(())
}

/// Effective voting power at vote time: own balance (zero if delegated
/// away) plus the balances of every identity delegating to the voter.
fn voting_power(state: &LedgerState, voter: &str) -> TokenAmount {
    let own = state.identities.get(voter);
    let delegated_away = own
        .and_then(|i| i.delegate.as_deref())
        .is_some_and(|d| d != voter);

    let mut power = if delegated_away {
        TokenAmount::zero()
    } else {
        let address = own.map(|i| i.address.clone()).or_else(|| {
            souk_crypto::address_from_did(voter)
                .ok()
                .map(|a| a.as_str().to_string())
        });
        address
            .map(|a| state.wallet.balance(&a))
            .unwrap_or_default()
    };

    for identity in state.identities.values() {
        if identity.did != voter && identity.delegate.as_deref() == Some(voter) {
            power = power.checked_add(&state.wallet.balance(&identity.address));
        }
    }
    power
}

fn existing<'a>(
    state: &'a mut LedgerState,
    id: &str,
) -> Result<&'a mut ProposalRecord, ReducerError> {
    state
        .proposals
        .get_mut(id)
        .ok_or_else(|| ReducerError::ResourceNotFound {
            kind: ResourceKind::Proposal,
            id: id.to_string(),
        })
}

fn bad_transition(proposal: &ProposalRecord, to: &str) -> ReducerError {
    ReducerError::InvalidStatusTransition {
        kind: ResourceKind::Proposal,
        id: proposal.id.clone(),
        from: proposal.status.as_str().to_string(),
        to: to.to_string(),
    }
}

fn owned<'a>(
    state: &'a mut LedgerState,
    envelope: &EventEnvelope,
    id: &str,
) -> Result<&'a mut ProposalRecord, ReducerError> {
    let proposal = existing(state, id)?;
    if proposal.proposer != envelope.issuer {
        return Err(unauthorized(envelope));
    }
    Ok(proposal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::IdentityRecord;

    fn identity(did: &str, address: &str, delegate: Option<&str>) -> IdentityRecord {
        IdentityRecord {
            did: did.to_string(),
            address: address.to_string(),
            profile: Default::default(),
            capabilities: Vec::new(),
            delegate: delegate.map(str::to_string),
            created_ts: 0,
            updated_ts: 0,
        }
    }

    #[test]
    fn test_voting_power_includes_delegations() {
        let mut state = LedgerState::new();
        state
            .identities
            .insert("did:souk:zA".to_string(), identity("did:souk:zA", "aa", None));
        state.identities.insert(
            "did:souk:zB".to_string(),
            identity("did:souk:zB", "bb", Some("did:souk:zA")),
        );
        state
            .wallet
            .balances
            .insert("aa".to_string(), TokenAmount::from_u64(100));
        state
            .wallet
            .balances
            .insert("bb".to_string(), TokenAmount::from_u64(40));

        assert_eq!(
            voting_power(&state, "did:souk:zA"),
            TokenAmount::from_u64(140)
        );
        // Delegated away: own balance no longer counts
        assert_eq!(voting_power(&state, "did:souk:zB"), TokenAmount::zero());
    }
}
