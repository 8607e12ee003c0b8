//! Wire format for match reports.
//!
//! The same JSON document travels from the client to the coordinator and is
//! stored verbatim in the match log. Byte fields are base64 encoded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::KeyMaterial;
use crate::matcher::MatchResult;

/// Serialized form of a matched key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    #[serde(with = "base64_bytes")]
    pub private_key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub encoded_key: Vec<u8>,
    pub private_string: String,
    pub authorized_string: String,
    pub fingerprint: String,
}

impl From<KeyMaterial> for KeyRecord {
    fn from(key: KeyMaterial) -> Self {
        let private_string = key.private_string();
        Self {
            private_key: key.private_key,
            public_key: key.public_key,
            encoded_key: key.encoded_key,
            private_string,
            authorized_string: key.authorized_key,
            fingerprint: key.fingerprint,
        }
    }
}

/// A confirmed vanity match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    #[serde(rename = "seekerID")]
    pub seeker_id: usize,
    pub match_string: String,
    pub matched_authorized_key: bool,
    pub matched_fingerprint: bool,
    pub key: KeyRecord,
}

impl Match {
    /// Builds the report for a hit found by seeker `seeker_id`.
    pub fn new(
        timestamp: DateTime<Utc>,
        hostname: impl Into<String>,
        seeker_id: usize,
        result: MatchResult,
        key: KeyMaterial,
    ) -> Self {
        Self {
            timestamp,
            hostname: hostname.into(),
            seeker_id,
            match_string: result.match_string,
            matched_authorized_key: result.matched_authorized_key,
            matched_fingerprint: result.matched_fingerprint,
            key: key.into(),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        match text {
            Some(text) => STANDARD.decode(text).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Generator;

    fn sample() -> Match {
        let key = Ed25519Generator::from_seed([3u8; 32]);
        let result = MatchResult {
            matched_authorized_key: true,
            matched_fingerprint: false,
            match_string: "abc".into(),
        };
        Match::new(Utc::now(), "host-a", 2, result, key)
    }

    #[test]
    fn test_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        for field in [
            "timestamp",
            "hostname",
            "seekerID",
            "matchString",
            "matchedAuthorizedKey",
            "matchedFingerprint",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        let key = &value["key"];
        for field in [
            "privateKey",
            "publicKey",
            "encodedKey",
            "privateString",
            "authorizedString",
            "fingerprint",
        ] {
            assert!(key.get(field).is_some(), "missing key.{field}");
        }
        assert_eq!(value["seekerID"], 2);
    }

    #[test]
    fn test_bytes_are_base64() {
        let m = sample();
        let value = serde_json::to_value(&m).unwrap();
        let encoded = value["key"]["publicKey"].as_str().unwrap();
        assert_eq!(encoded.len(), 44);
        let back: Match = serde_json::from_value(value).unwrap();
        assert_eq!(back.key.public_key, m.key.public_key);
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let body = r#"{"timestamp":"2024-01-01T00:00:00Z","hostname":"h","seekerID":1,
            "matchString":"x","matchedAuthorizedKey":true,"matchedFingerprint":false}"#;
        assert!(serde_json::from_str::<Match>(body).is_err());
    }

    #[test]
    fn test_null_bytes_decode_empty() {
        let body = r#"{"privateKey":null,"publicKey":null,"encodedKey":null,
            "privateString":"","authorizedString":"a","fingerprint":"f"}"#;
        let key: KeyRecord = serde_json::from_str(body).unwrap();
        assert!(key.private_key.is_empty());
    }
}
