//! Cryptographic operations for SSH key generation.
//!
//! This module provides:
//! - Secure random Ed25519 key generation
//! - `authorized_keys` text and SHA-256 fingerprint derivation
//! - OpenSSH private key export

mod keypair;
pub mod openssh;

pub use keypair::{Ed25519Generator, KeyGenerator, KeyMaterial};
