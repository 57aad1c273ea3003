//! # Per-Issuer Nonce Windows
//!
//! Replay detection with reorder tolerance. Each issuer's nonces are
//! strictly increasing; a bounded window of recently-seen nonces is kept so
//! events arriving out of order inside the window still apply, while
//! anything at or below the window floor is rejected as a replay.
//!
//! The window size is a named, documented constant rather than an inferred
//! value: [`NONCE_WINDOW`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::errors::ErrorCode;

/// Number of nonces retained per issuer. An event whose nonce falls below
/// `highest - NONCE_WINDOW` is rejected as replayed.
pub const NONCE_WINDOW: u64 = 256;

/// Errors from nonce validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NonceError {
    /// The nonce has already been accepted for this issuer.
    #[error("Nonce {nonce} already used by {issuer}")]
    Reused {
        /// Issuer DID.
        issuer: String,
        /// The replayed nonce.
        nonce: u64,
    },

    /// The nonce is below the issuer's window floor.
    #[error("Nonce {nonce} below window floor {floor} for {issuer}")]
    WindowExceeded {
        /// Issuer DID.
        issuer: String,
        /// The rejected nonce.
        nonce: u64,
        /// Current window floor.
        floor: u64,
    },

    /// Nonces are positive integers; zero is never valid.
    #[error("Nonce must be a positive integer")]
    NotPositive,
}

impl NonceError {
    /// Stable error code for the collaborator boundary.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            NonceError::Reused { .. } | NonceError::NotPositive => ErrorCode::EventNonceReused,
            NonceError::WindowExceeded { .. } => ErrorCode::EventNonceWindowExceeded,
        }
    }
}

/// Per-issuer window state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct IssuerWindow {
    /// Highest nonce accepted so far.
    highest: u64,
    /// Nonces accepted within the current window.
    seen: BTreeSet<u64>,
}

/// Sliding nonce windows for all issuers.
///
/// Deterministic: the same sequence of `accept` calls produces the same
/// state on every replica, so the window participates in reducer state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceWindow {
    issuers: BTreeMap<String, IssuerWindow>,
}

impl NonceWindow {
    /// Create an empty window table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current floor for an issuer: nonces below it are replays.
    /// Unknown issuers have floor 1 (any positive nonce accepted).
    #[must_use]
    pub fn floor(&self, issuer: &str) -> u64 {
        self.issuers
            .get(issuer)
            .map(|w| w.highest.saturating_sub(NONCE_WINDOW).max(1))
            .unwrap_or(1)
    }

    /// Validate a nonce without recording it. Used by reducers to gate an
    /// event before domain logic runs; `accept` is called only once the
    /// whole apply succeeds, so a rejected event does not consume its nonce.
    ///
    /// # Errors
    ///
    /// Same as [`NonceWindow::accept`].
    pub fn check(&self, issuer: &str, nonce: u64) -> Result<(), NonceError> {
        if nonce == 0 {
            return Err(NonceError::NotPositive);
        }
        let Some(window) = self.issuers.get(issuer) else {
            return Ok(());
        };
        let floor = window.highest.saturating_sub(NONCE_WINDOW).max(1);
        if nonce < floor {
            return Err(NonceError::WindowExceeded {
                issuer: issuer.to_string(),
                nonce,
                floor,
            });
        }
        if window.seen.contains(&nonce) {
            return Err(NonceError::Reused {
                issuer: issuer.to_string(),
                nonce,
            });
        }
        Ok(())
    }

    /// Validate and record a nonce.
    ///
    /// # Errors
    ///
    /// - [`NonceError::NotPositive`] for nonce 0
    /// - [`NonceError::WindowExceeded`] below the window floor
    /// - [`NonceError::Reused`] for a nonce already accepted
    pub fn accept(&mut self, issuer: &str, nonce: u64) -> Result<(), NonceError> {
        self.check(issuer, nonce)?;

        let window = self.issuers.entry(issuer.to_string()).or_default();
        window.seen.insert(nonce);
        if nonce > window.highest {
            window.highest = nonce;
            let new_floor = window.highest.saturating_sub(NONCE_WINDOW).max(1);
            // Drop everything that slid out of the window
            window.seen = window.seen.split_off(&new_floor);
        }

        Ok(())
    }

    /// Highest accepted nonce for an issuer, if any.
    #[must_use]
    pub fn highest(&self, issuer: &str) -> Option<u64> {
        self.issuers.get(issuer).map(|w| w.highest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "did:souk:zTest";

    #[test]
    fn test_increasing_nonces_accepted() {
        let mut window = NonceWindow::new();
        for nonce in 1..=10 {
            assert!(window.accept(ISSUER, nonce).is_ok());
        }
        assert_eq!(window.highest(ISSUER), Some(10));
    }

    #[test]
    fn test_reuse_rejected() {
        let mut window = NonceWindow::new();
        window.accept(ISSUER, 5).unwrap();
        assert!(matches!(
            window.accept(ISSUER, 5),
            Err(NonceError::Reused { .. })
        ));
    }

    #[test]
    fn test_out_of_order_within_window_accepted() {
        let mut window = NonceWindow::new();
        window.accept(ISSUER, 10).unwrap();
        // 7 arrives late but inside the window
        assert!(window.accept(ISSUER, 7).is_ok());
        assert!(matches!(
            window.accept(ISSUER, 7),
            Err(NonceError::Reused { .. })
        ));
    }

    #[test]
    fn test_window_floor_boundary() {
        let mut window = NonceWindow::new();
        let high = NONCE_WINDOW + 100;
        window.accept(ISSUER, high).unwrap();

        let floor = window.floor(ISSUER);
        assert_eq!(floor, high - NONCE_WINDOW);

        // At the floor: accepted. Below the floor: replay.
        assert!(window.accept(ISSUER, floor).is_ok());
        assert!(matches!(
            window.accept(ISSUER, floor - 1),
            Err(NonceError::WindowExceeded { .. })
        ));
    }

    #[test]
    fn test_zero_nonce_rejected() {
        let mut window = NonceWindow::new();
        assert!(matches!(
            window.accept(ISSUER, 0),
            Err(NonceError::NotPositive)
        ));
    }

    #[test]
    fn test_issuers_are_independent() {
        let mut window = NonceWindow::new();
        window.accept("did:souk:zA", 3).unwrap();
        assert!(window.accept("did:souk:zB", 3).is_ok());
    }

    #[test]
    fn test_deterministic_replay() {
        let mut a = NonceWindow::new();
        let mut b = NonceWindow::new();
        for nonce in [3u64, 1, 2, 10, 7, 300, 299] {
            let ra = a.accept(ISSUER, nonce);
            let rb = b.accept(ISSUER, nonce);
            assert_eq!(ra, rb);
        }
        assert_eq!(a, b);
    }
}
