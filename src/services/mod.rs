//! Business logic services.
//!
//! Services contain core logic separated from HTTP handlers: key
//! generation, issuance orchestration, and expired-record cleanup.

/// Random key generation
pub mod generator;
/// Key issuance orchestration
pub mod issuer;
/// Expired key cleanup
pub mod reaper;
