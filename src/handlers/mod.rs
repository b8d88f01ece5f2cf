//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, state)
//! 2. Calls into the services
//! 3. Returns HTTP response (JSON, status code)

/// Service health endpoint
pub mod health;
/// Upload key issuance endpoint
pub mod keys;
/// Expiry sweep trigger endpoint
pub mod sweep;
