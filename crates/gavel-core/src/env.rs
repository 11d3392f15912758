//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples protocol logic from system entropy.
//! Production code plugs in OS entropy; tests supply seeded implementations
//! for perfect reproducibility.
//!
//! # Invariants
//!
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

/// Abstract environment providing randomness.
///
/// # Safety
///
/// Implementations MUST use cryptographically secure entropy in
/// production: session keys and connection identifiers are derived from
/// it.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Security
    ///
    /// Production implementations MUST use OS-level entropy
    /// (`getrandom`), not a userspace PRNG. Session keys and connection
    /// identifiers are derived from this.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for connection identifiers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
