//! Golden test vectors for deterministic verification.
//!
//! Any client that wants to read a space must derive exactly these keys
//! from exactly these inputs.

use cloakroom_core::{derive_key, derive_session_key, Result, SessionId, SpaceId};
use serde::Serialize;

/// A deterministic-key vector.
#[derive(Debug, Clone, Serialize)]
pub struct KdfVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Space id.
    pub space_id: &'static str,
    /// Passphrase.
    pub passphrase: &'static str,
    /// Expected key (hex), at the default iteration count.
    pub expected_key: &'static str,
}

/// A session-key vector.
#[derive(Debug, Clone, Serialize)]
pub struct SessionKeyVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Space id.
    pub space_id: &'static str,
    /// Roster, in the order given to the deriver.
    pub roster: &'static [&'static str],
    /// Expected key (hex).
    pub expected_key: &'static str,
}

/// Outcome of checking one vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VectorResult {
    /// Vector name.
    pub name: String,
    /// Whether the computed key matched.
    pub matches: bool,
    /// The computed key (hex).
    pub actual: String,
}

/// Get all deterministic-key vectors.
pub fn kdf_vectors() -> Vec<KdfVector> {
    vec![
        KdfVector {
            name: "reference space",
            space_id: "abc",
            passphrase: "friends-42",
            expected_key: "1bd45608756993743299df5bcd29671a84fac2dd977602f507b5acb0107d89b1",
        },
        KdfVector {
            name: "one character passphrase change",
            space_id: "abc",
            passphrase: "friends-43",
            expected_key: "5a99e5c17ad6baa7f450c38b1fe7f41658f722b8542983d79d78fadf2a6d86c0",
        },
        KdfVector {
            name: "passphrase with spaces",
            space_id: "lobby",
            passphrase: "correct horse battery staple",
            expected_key: "3fd7a80b8c5e705dd052f9a4137dcefd21893789dc24131d793537e07a7a4924",
        },
        KdfVector {
            name: "non-ascii inputs",
            space_id: "space-é",
            passphrase: "päss",
            expected_key: "af3b27c59b7ea63af8ce3411ca5cfc305aad7de570ac2fee88cfa4fb4b857e9f",
        },
    ]
}

/// Get all session-key vectors.
pub fn session_key_vectors() -> Vec<SessionKeyVector> {
    vec![
        SessionKeyVector {
            name: "two sessions",
            space_id: "abc",
            roster: &["s1", "s2"],
            expected_key: "bde33412a38644764454ee4f5fadbc1077f78dde7bab45c68855e3ac852c9b73",
        },
        SessionKeyVector {
            name: "two sessions, reversed",
            space_id: "abc",
            roster: &["s2", "s1"],
            expected_key: "bde33412a38644764454ee4f5fadbc1077f78dde7bab45c68855e3ac852c9b73",
        },
        SessionKeyVector {
            name: "three sessions, shuffled",
            space_id: "abc",
            roster: &["s3", "s1", "s2"],
            expected_key: "0ec33145e9333037fbba9358061cf9668120d8c5b86964d7c8b0089f33eb31eb",
        },
    ]
}

/// Compute the key a KDF vector describes.
pub fn compute_kdf_vector(vector: &KdfVector) -> Result<String> {
    let space_id = SpaceId::new(vector.space_id)?;
    let key = derive_key(&space_id, vector.passphrase)?;
    Ok(hex::encode(key.as_bytes()))
}

/// Compute the key a session-key vector describes.
pub fn compute_session_key_vector(vector: &SessionKeyVector) -> Result<String> {
    let space_id = SpaceId::new(vector.space_id)?;
    let roster = vector
        .roster
        .iter()
        .map(|id| SessionId::new(*id))
        .collect::<Result<Vec<_>>>()?;
    Ok(hex::encode(derive_session_key(&space_id, &roster).as_bytes()))
}

/// Verify every vector.
///
/// Call this to verify your implementation matches the reference.
pub fn verify_all_vectors() -> Result<Vec<VectorResult>> {
    let mut results = Vec::new();

    for vector in kdf_vectors() {
        let actual = compute_kdf_vector(&vector)?;
        results.push(VectorResult {
            name: vector.name.to_string(),
            matches: actual == vector.expected_key,
            actual,
        });
    }

    for vector in session_key_vectors() {
        let actual = compute_session_key_vector(&vector)?;
        results.push(VectorResult {
            name: vector.name.to_string(),
            matches: actual == vector.expected_key,
            actual,
        });
    }

    Ok(results)
}

/// All vectors as pretty JSON, for other implementations to consume.
pub fn export_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&serde_json::json!({
        "kdf": kdf_vectors(),
        "session_key": session_key_vectors(),
    }))
}
