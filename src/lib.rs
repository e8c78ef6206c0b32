//! Fieldvault - transparent field-level encryption for persisted records.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── init          # Initialize a project
//! │   ├── keys          # Key generation
//! │   ├── encrypt       # Batch re-encryption sweep
//! │   ├── show          # Print decrypted rows
//! │   └── status        # Configuration overview
//! └── core/             # Core library components
//!     ├── entity        # Entity trait and field declarations
//!     ├── metadata      # Per-type field metadata cache
//!     ├── tracker       # Plaintext/ciphertext state per instance
//!     ├── orchestrator  # Lifecycle listener: decrypt on load, seal on write
//!     ├── cipher/       # Encryptor trait and backends
//!     │   ├── age       # age x25519 backend
//!     │   └── hex       # Test stub
//!     ├── keys          # Key ring and key generation
//!     ├── lifecycle     # Host hook surface
//!     ├── document      # Schema-driven records
//!     ├── storage/      # Row stores (memory, JSON file)
//!     ├── session       # Reference unit of work
//!     ├── sweep         # Batch re-encryption
//!     └── config        # .fieldvault.toml management
//! ```
//!
//! # Features
//!
//! - Values of declared fields are ciphertext in storage and plaintext in memory
//! - Unchanged values keep their ciphertext across writes
//! - Keys are picked per field and resolved at use
//! - Embedded sub-records with their own encrypted fields
//! - Batch sweep that seals legacy plaintext rows

pub mod cli;
pub mod core;
pub mod error;
