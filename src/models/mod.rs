//! Data models representing stored records and API payloads.

/// Upload key record and issue endpoint payloads
pub mod upload_key;
