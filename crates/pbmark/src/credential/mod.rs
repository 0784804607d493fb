//! Signed credential protocol: canonical serialization, fingerprint ids,
//! Ed25519 signing/verification and tolerance matching of identity records.

mod canonical;
mod envelope;
mod keys;
mod matching;

pub use canonical::canonical_json;
pub use envelope::{fingerprint_id, verify_credential_text, Credential, CredentialData, VerifiedClaim};
pub use keys::{CredentialSigner, CredentialVerifier, Ed25519Signer, Ed25519Verifier};
pub use matching::{compare_records, FieldComparison, MatchOutcome, MatchReport, MatchTolerance};
