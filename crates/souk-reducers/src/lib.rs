//! # Souk Reducers
//!
//! Pure deterministic state transitions over the event ledger:
//! `apply(state, envelope) -> state'` for identity, wallet, escrow,
//! contract, marketplace, reputation, and DAO governance.
//!
//! ## Reducer Contract
//!
//! | Property | Meaning |
//! |----------|---------|
//! | Deterministic | No wall clock, no randomness, ordered containers only |
//! | Total | Well-formed envelopes either apply or fail with a typed error |
//! | Idempotent on replay | The same ordered log folds to equal state, every time |
//! | Error-atomic | A returned error leaves state untouched |
//!
//! Time only ever comes from the envelope's `ts`; expiry checks, voting
//! windows, and timelocks all read it. Unknown event types are recorded
//! no-ops so newer nodes' events flow through older reducers harmlessly.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod dao;
pub mod dispatch;
pub mod errors;
pub mod escrow;
pub mod identity;
pub mod lease;
pub mod market;
pub mod payloads;
pub mod reputation;
pub mod state;
pub mod wallet;

// Re-export main types
pub use dispatch::{
    Applied, ApplyContext, CapabilityVerifier, HeadAdvance, MilestonePayout, Reducer,
    ReducerConfig,
};
pub use errors::ReducerError;
pub use state::LedgerState;
