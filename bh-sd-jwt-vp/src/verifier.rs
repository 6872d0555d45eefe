// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! This module provides the [`Verifier`] type for verifying SD-JWT+KB
//! presentations within a presentation exchange session.

use bh_jws_utils::{base64_url_encode, SignatureVerifier};
use bherror::traits::PropagateError as _;
use rand_core::CryptoRngCore;

use crate::{
    IssuerSignedJwtVerificationOpts, KeyBindingChallenge, KeyBindingJwtVerificationOpts, SdJwtVP,
    SecondsSinceEpoch, VerificationError, VerifiedSdJwt,
};

/// Verifier of SD-JWT+KB verifiable presentations.
///
/// This verifier requires Key Binding. Note that the decision whether to
/// require Key Binding for a particular use case **MUST NOT** be based on
/// whether a Key Binding JWT is provided by the Holder or not, according
/// to [official documentation]. Use [`SdJwtVP::verify`] directly when Key
/// Binding is optional.
///
/// # Lifecycle
///
/// A fresh instance must be constructed for every presentation exchange
/// session.  The instance should live for the entire session, as it contains
/// the nonce value used for ensuring freshness of the presentation that needs
/// to be both communicated to the [Holder](crate::holder::Holder) and used in
/// verification of the [`SdJwtVP`].
///
/// NB: Does **NOT** implement [Clone] to prevent nonce reuse!
///
/// [official documentation]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.3-4.1
pub struct Verifier {
    challenge: KeyBindingChallenge,
}

/// Error type for errors related to the SD-JWT verifier.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum VerifierError {
    /// Error indicating that the nonce generation failed.
    #[strum(to_string = "Nonce generation failed")]
    NonceGenerationFailed,

    /// Error indicating that the presentation did not verify.
    #[strum(to_string = "{0}")]
    Verification(VerificationError),
}

impl bherror::BhError for VerifierError {}

/// Result type used by the [`verifier`][crate::verifier] module.
pub type Result<T> = bherror::Result<T, VerifierError>;

impl Verifier {
    /// Construct a verifier for a new presentation exchange session.
    ///
    /// The challenge parameters include the `aud` parameter which represents
    /// the identifier of the verifier entity for the purpose of proving key
    /// binding, and the nonce to be used for replay prevention that will be
    /// sampled from the provided `nonce_rng`.
    ///
    /// # Errors
    ///
    /// This constructor will only fail if sampling of the nonce fails.
    pub fn new<R: CryptoRngCore + ?Sized>(aud: String, nonce_rng: &mut R) -> Result<Self> {
        let nonce = generate_nonce(nonce_rng)?;

        Ok(Self::from_challenge(KeyBindingChallenge { aud, nonce }))
    }

    /// Constructs a [`Verifier`] for an existing presentation exchange session.
    ///
    /// # Note
    /// The caller of this function needs to ensure that the `nonce` value
    /// provided within the [`KeyBindingChallenge`] **WILL NOT** be reused.
    pub fn from_challenge(challenge: KeyBindingChallenge) -> Self {
        Self { challenge }
    }

    /// Return the challenge to be sent to the holder. The purpose of the
    /// challenge is to ensure the freshness of the key binding signature, as
    /// well as the proper audience, in order to prevent credential replay attacks.
    pub fn key_binding_challenge(&self) -> &KeyBindingChallenge {
        &self.challenge
    }

    /// Verify the provided SD-JWT+KB presentation, returning the reconstructed
    /// claims.
    ///
    /// The Key Binding JWT is required; its `nonce` and `aud` claims must match
    /// the challenge of this session and its signature is verified with
    /// `key_binding_verifier` against the key in the `cnf` claim. All time
    /// claims of the Key Binding JWT are checked.
    ///
    /// This method takes ownership of the [`Verifier`] to destroy the nonce
    /// value used in this presentation exchange session, in order to prevent
    /// accidental reuse.
    pub fn verify(
        self,
        presentation: &SdJwtVP,
        issuer_opts: &IssuerSignedJwtVerificationOpts,
        key_binding_verifier: &dyn SignatureVerifier,
        current_time: SecondsSinceEpoch,
    ) -> Result<VerifiedSdJwt> {
        let KeyBindingChallenge { aud, nonce } = self.challenge;

        let kb_opts = KeyBindingJwtVerificationOpts {
            key_binding_required: true,
            nonce: Some(nonce),
            aud: Some(aud),
            verifier: Some(key_binding_verifier),
            validate_expiration_claim: true,
            validate_not_before_claim: true,
        };

        presentation
            .verify(issuer_opts, &kb_opts, current_time)
            .match_err(|error| VerifierError::Verification(error.clone()))
    }
}

/// Generates a `nonce` value.
///
/// The `nonce` is generated as a random, `base64-url` encoded `String` with 256
/// bits of entropy.
///
/// # Error
/// If the `nonce` generation fails, [`VerifierError::NonceGenerationFailed`] is
/// returned.
pub fn generate_nonce<R: CryptoRngCore + ?Sized>(nonce_rng: &mut R) -> Result<String> {
    let mut nonce_bytes = [0u8; 32];
    nonce_rng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|err| bherror::Error::root(VerifierError::NonceGenerationFailed).ctx(err))?;
    Ok(base64_url_encode(nonce_bytes))
}
