//! # Souk Test Suite
//!
//! Unified test crate containing the cross-crate scenarios and invariants:
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Shared fixtures (actors, node wiring, waiting)
//! └── integration/
//!     ├── scenarios.rs  # End-to-end flows: transfers, escrows, contract
//!     │                 # chains, gossip catch-up, tampering, snapshots
//!     └── invariants.rs # Ledger conservation, chain linearity, replay
//!                       # determinism, boundary behaviors
//! ```
//!
//! Run with `cargo test -p souk-tests`.

#![allow(dead_code)]

pub mod integration;
pub mod support;
