//! Ed25519 key pair generation.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;

use super::openssh;
use crate::error::KeyGenError;

/// One generated candidate key pair with all of its derived text forms.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyMaterial {
    /// Raw private key (64 bytes: seed followed by the public key)
    pub private_key: Vec<u8>,
    /// Raw public key (32 bytes)
    pub public_key: Vec<u8>,
    /// PEM armoured OpenSSH private key
    pub encoded_key: Vec<u8>,
    /// `authorized_keys` line for the public key
    pub authorized_key: String,
    /// SHA-256 fingerprint of the public key blob
    pub fingerprint: String,
}

impl KeyMaterial {
    /// Returns the encoded private key as text.
    pub fn private_string(&self) -> String {
        String::from_utf8_lossy(&self.encoded_key).into_owned()
    }
}

/// Source of candidate key pairs.
///
/// Implementations must be callable from several seeker threads at once.
pub trait KeyGenerator: Send + Sync {
    /// Produces one fresh candidate.
    fn generate(&self) -> Result<KeyMaterial, KeyGenError>;
}

/// Generates Ed25519 keys from the operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Generator;

impl Ed25519Generator {
    /// Creates a new generator.
    pub fn new() -> Self {
        Self
    }

    /// Derives the key material for a fixed 32 byte seed.
    pub fn from_seed(seed: [u8; 32]) -> KeyMaterial {
        let signing_key = SigningKey::from_bytes(&seed);
        let public = signing_key.verifying_key().to_bytes();
        let check = u32::from_be_bytes([public[0], public[1], public[2], public[3]]);
        Self::derive(&signing_key, check)
    }

    fn derive(signing_key: &SigningKey, check: u32) -> KeyMaterial {
        let public = signing_key.verifying_key().to_bytes();
        let keypair = signing_key.to_keypair_bytes();
        let container = openssh::private_key_container(&keypair, &public, check);

        KeyMaterial {
            private_key: keypair.to_vec(),
            public_key: public.to_vec(),
            encoded_key: openssh::pem_encode(&container),
            authorized_key: openssh::authorized_key(&public),
            fingerprint: openssh::fingerprint(&public),
        }
    }
}

impl KeyGenerator for Ed25519Generator {
    fn generate(&self) -> Result<KeyMaterial, KeyGenError> {
        let mut rng = OsRng;
        let mut seed = [0u8; 32];
        rng.try_fill_bytes(&mut seed)
            .map_err(|e| KeyGenError::Entropy(e.to_string()))?;
        let signing_key = SigningKey::from_bytes(&seed);
        Ok(Self::derive(&signing_key, rng.next_u32()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let key = Ed25519Generator::new().generate().unwrap();
        assert_eq!(key.private_key.len(), 64);
        assert_eq!(key.public_key.len(), 32);
        assert_eq!(&key.private_key[32..], key.public_key.as_slice());
        assert!(key.authorized_key.starts_with("ssh-ed25519 "));
        assert!(key.private_string().contains("OPENSSH PRIVATE KEY"));
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = Ed25519Generator::from_seed([9u8; 32]);
        let b = Ed25519Generator::from_seed([9u8; 32]);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.authorized_key, b.authorized_key);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_has_constant_length() {
        for i in 0..32u8 {
            let key = Ed25519Generator::from_seed([i; 32]);
            assert_eq!(key.fingerprint.len(), 44);
        }
    }

    #[test]
    fn test_distinct_seeds_distinct_keys() {
        let a = Ed25519Generator::from_seed([1u8; 32]);
        let b = Ed25519Generator::from_seed([2u8; 32]);
        assert_ne!(a.fingerprint, b.fingerprint);
    }
}
