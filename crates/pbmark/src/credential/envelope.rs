//! Credential envelope `{"data": {"id", "fp"}, "sig"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CredentialError, PbmError};
use crate::fingerprint::IdentityRecord;

use super::canonical::canonical_json;
use super::keys::{CredentialSigner, CredentialVerifier};

const ID_LEN: usize = 16;

/// First 16 lowercase hex characters of SHA-256 over `canonical_json(fp)`.
pub fn fingerprint_id(fp: &Value) -> String {
    let digest = Sha256::digest(canonical_json(fp).as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(ID_LEN);
    id
}

/// Signed part of a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialData {
    pub id: String,
    pub fp: IdentityRecord,
}

/// Immutable signed credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub data: CredentialData,
    /// Hex-encoded signature over `canonical_json(data)`.
    pub sig: String,
}

impl Credential {
    /// Hash and sign an identity record.
    pub fn issue(record: &IdentityRecord, signer: &dyn CredentialSigner) -> Result<Self, PbmError> {
        let fp = serde_json::to_value(record).map_err(CredentialError::from)?;
        let id = fingerprint_id(&fp);
        let data = serde_json::json!({ "id": id, "fp": fp });
        let sig = signer.sign(canonical_json(&data).as_bytes())?;
        tracing::info!("issued credential {}", id);
        Ok(Self {
            data: CredentialData { id, fp: *record },
            sig: hex::encode(sig),
        })
    }

    /// Wire text carried by the QR code (canonical JSON).
    pub fn to_json(&self) -> String {
        let data = serde_json::json!({
            "id": self.data.id,
            "fp": self.data.fp,
        });
        canonical_json(&serde_json::json!({ "data": data, "sig": self.sig }))
    }
}

/// A credential whose signature and hash both checked out.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaim {
    pub id: String,
    pub record: IdentityRecord,
}

/// Parse and check presented credential text.
///
/// Checks, in order: JSON syntax, unsigned legacy payload, required fields,
/// id format, signature encoding, signature over `canonical_json(data)`,
/// id against the recomputed fingerprint hash, and finally the record shape.
pub fn verify_credential_text(
    text: &str,
    verifier: &dyn CredentialVerifier,
) -> Result<VerifiedClaim, CredentialError> {
    let payload: Value = serde_json::from_str(text)?;

    let (Some(data), Some(sig)) = (payload.get("data"), payload.get("sig")) else {
        if payload.get("fp").is_some() {
            return Err(CredentialError::Unsigned);
        }
        return Err(CredentialError::MissingField(if payload.get("data").is_none() {
            "data"
        } else {
            "sig"
        }));
    };
    let claimed_id = data
        .get("id")
        .and_then(Value::as_str)
        .ok_or(CredentialError::MissingField("data.id"))?;
    let fp = data.get("fp").ok_or(CredentialError::MissingField("data.fp"))?;
    let sig = sig.as_str().ok_or(CredentialError::BadSignatureEncoding)?;

    let well_formed_id = claimed_id.len() == ID_LEN
        && claimed_id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !well_formed_id {
        return Err(CredentialError::BadId(claimed_id.to_string()));
    }

    let signature = hex::decode(sig).map_err(|_| CredentialError::BadSignatureEncoding)?;
    if !verifier.verify(canonical_json(data).as_bytes(), &signature) {
        return Err(CredentialError::SignatureInvalid);
    }

    let recomputed = fingerprint_id(fp);
    if recomputed != claimed_id {
        return Err(CredentialError::HashMismatch {
            claimed: claimed_id.to_string(),
            recomputed,
        });
    }

    let record: IdentityRecord = serde_json::from_value(fp.clone())?;
    Ok(VerifiedClaim {
        id: recomputed,
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::keys::{Ed25519Signer, Ed25519Verifier};
    use serde_json::json;

    fn record() -> IdentityRecord {
        IdentityRecord {
            f1: 0.1,
            a1: 30.0,
            f2: 0.2,
            a2: 120.0,
            rel_angle: 90.0,
            pbm_scale: Some(0.05),
        }
    }

    fn keys() -> (Ed25519Signer, Ed25519Verifier) {
        let signer = Ed25519Signer::from_bytes(&[3u8; 32]);
        let verifier = signer.verifier();
        (signer, verifier)
    }

    /// Re-sign an arbitrary `data` object with the test key.
    fn forge(data: Value, signer: &Ed25519Signer) -> String {
        let sig = signer.sign(canonical_json(&data).as_bytes()).unwrap();
        canonical_json(&json!({ "data": data, "sig": hex::encode(sig) }))
    }

    #[test]
    fn id_is_sixteen_hex_chars_and_deterministic() {
        let fp = serde_json::to_value(record()).unwrap();
        let id = fingerprint_id(&fp);
        assert_eq!(id.len(), 16);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert_eq!(id, fingerprint_id(&fp));
    }

    #[test]
    fn issued_credential_verifies() {
        let (signer, verifier) = keys();
        let cred = Credential::issue(&record(), &signer).unwrap();
        let claim = verify_credential_text(&cred.to_json(), &verifier).unwrap();
        assert_eq!(claim.record, record());
        assert_eq!(claim.id, cred.data.id);
    }

    #[test]
    fn wire_text_is_canonical() {
        let (signer, _) = keys();
        let text = Credential::issue(&record(), &signer).unwrap().to_json();
        assert!(text.starts_with(r#"{"data":{"fp":{"a1":30.0,"a2":120.0,"f1":0.1,"#));
        assert!(!text.contains(' '));
    }

    #[test]
    fn tampered_field_breaks_signature() {
        let (signer, verifier) = keys();
        let text = Credential::issue(&record(), &signer).unwrap().to_json();
        let mut payload: Value = serde_json::from_str(&text).unwrap();
        payload["data"]["fp"]["a2"] = json!(121.0);
        let err = verify_credential_text(&payload.to_string(), &verifier).unwrap_err();
        assert!(matches!(err, CredentialError::SignatureInvalid));

        let other = Ed25519Signer::from_bytes(&[9u8; 32]);
        let foreign = Credential::issue(&record(), &other).unwrap().to_json();
        assert!(matches!(
            verify_credential_text(&foreign, &verifier),
            Err(CredentialError::SignatureInvalid)
        ));
    }

    #[test]
    fn validly_signed_but_wrong_id_is_a_hash_mismatch() {
        let (signer, verifier) = keys();
        let fp = serde_json::to_value(record()).unwrap();
        let text = forge(json!({ "id": "0123456789abcdef", "fp": fp }), &signer);
        assert!(matches!(
            verify_credential_text(&text, &verifier),
            Err(CredentialError::HashMismatch { .. })
        ));
    }

    #[test]
    fn fp_altered_beyond_rounding_changes_the_id() {
        let original = serde_json::to_value(record()).unwrap();
        let mut altered = record();
        altered.f1 += 0.0001;
        assert_ne!(
            fingerprint_id(&original),
            fingerprint_id(&serde_json::to_value(altered).unwrap())
        );
    }

    #[test]
    fn structural_failures() {
        let (_, verifier) = keys();
        let check = |text: &str| verify_credential_text(text, &verifier).unwrap_err();

        assert!(matches!(check("{not json"), CredentialError::Malformed(_)));
        assert!(matches!(check(r#"{"fp":{"f1":0.1}}"#), CredentialError::Unsigned));
        assert!(matches!(check(r#"{"sig":"00"}"#), CredentialError::MissingField("data")));
        assert!(matches!(
            check(r#"{"data":{"fp":{}},"sig":"00"}"#),
            CredentialError::MissingField("data.id")
        ));
        assert!(matches!(
            check(r#"{"data":{"id":"0123456789abcdef"},"sig":"00"}"#),
            CredentialError::MissingField("data.fp")
        ));
        assert!(matches!(
            check(r#"{"data":{"id":"XYZ","fp":{}},"sig":"00"}"#),
            CredentialError::BadId(_)
        ));
        assert!(matches!(
            check(r#"{"data":{"id":"0123456789abcdef","fp":{}},"sig":"zz"}"#),
            CredentialError::BadSignatureEncoding
        ));
    }

    #[test]
    fn signed_payload_with_wrong_shape_is_malformed() {
        let (signer, verifier) = keys();
        let fp = json!({ "f1": "high" });
        let id = fingerprint_id(&fp);
        let text = forge(json!({ "id": id, "fp": fp }), &signer);
        assert!(matches!(
            verify_credential_text(&text, &verifier),
            Err(CredentialError::Malformed(_))
        ));
    }
}
