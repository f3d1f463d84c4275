//! Core hashing primitives.
//!
//! Pure functions over bytes. Nothing here touches the network or any
//! shared state.

pub mod document;
pub mod hash;

// Re-export core types
pub use document::{DocumentHasher, EmptyDocumentPolicy, DEFAULT_READ_BUFFER};
pub use hash::{double_sha256, hex_eq, sha256, Hash, HASH_HEX_LEN, HASH_LEN};
