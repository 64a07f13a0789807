//! # Cloakroom Testkit
//!
//! Testing utilities for Cloakroom.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: fixed key derivation outputs every implementation must reproduce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: a reference space plus groups of clients on the in-memory relay
//! - **Faults**: a relay transport that fails on command
//!
//! ## Golden Vectors
//!
//! ```rust
//! use cloakroom_testkit::vectors::verify_all_vectors;
//!
//! for result in verify_all_vectors().unwrap() {
//!     assert!(result.matches, "{}: {}", result.name, result.actual);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use cloakroom_testkit::generators::{envelope_from_params, EnvelopeParams};
//!
//! proptest! {
//!     #[test]
//!     fn sealed_envelopes_validate(params: EnvelopeParams) {
//!         let envelope = envelope_from_params(&params).unwrap();
//!         prop_assert!(envelope.validate().is_ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use cloakroom_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let envelope = fixture.seal(b"hi", 2).unwrap();
//! assert_eq!(fixture.open(&envelope, 2).unwrap().plaintext, b"hi");
//! ```

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use faults::{faulty_client, FaultyTransport, Faults};
pub use fixtures::{
    client, clients_in_space, drain, init_tracing, messages, passphrase, settle, space,
    TestClient, TestFixture, TEST_PASSPHRASE, TEST_SPACE,
};
pub use generators::{envelope_from_params, EnvelopeParams};
pub use vectors::{
    export_json, kdf_vectors, session_key_vectors, verify_all_vectors, KdfVector,
    SessionKeyVector, VectorResult,
};
