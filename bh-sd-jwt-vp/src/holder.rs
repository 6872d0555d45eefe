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

//! The module provides the [`Holder`] type for managing and presenting SD-JWTs.
//!
//! It verifies an issued SD-JWT, allows access to the underlying claims, and builds a presentation
//! (optionally with key binding) that discloses only selected claims.

use std::collections::BTreeSet;

use bh_jws_utils::JwtSigner;
use bherror::{traits::PropagateError as _, Error};

use crate::{
    decoder::DecodedClaims,
    key_binding::{create_key_binding_jwt, KeyBindingChallenge},
    paths_exist,
    presentation::{verify_issuer_signed_jwt, VerifiedIssuerSignedJwt},
    sd_jwt::{SdJwt, SdJwtVP},
    DisplayWrapper, IssuerSignedJwtVerificationOpts, JsonNodePath, JsonObject, SecondsSinceEpoch,
    VerificationError,
};

/// Holder of an SD-JWT. Capable of creating [`SdJwtVP`]s with selectively
/// disclosed claims.
///
/// A single instance of a `Holder` is to be used per SD-JWT, and it need not be
/// persisted from issuing to presentation, as it can be constructed on-demand
/// when presentation is required.
pub struct Holder {
    sd_jwt: SdJwt,
    decoded: DecodedClaims,
}

/// Error type representing various errors that can occur during Holder
/// operations.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum HolderError {
    /// Error indicated that the SD-JWT is not in a valid format.
    #[strum(to_string = "Invalid SDJwt serialization")]
    InvalidSdJwtSerialization,

    /// Error indicating that the Key Binding JWT was found in the issued
    /// SD-JWT.
    #[strum(to_string = "KBJwt found in issued SDJwt")]
    KBJwtInIssuedSdJwt,

    /// Error indicating that the Key Binding JWT signing failed.
    #[strum(to_string = "KBJwt signing failed")]
    KBJwtSigningFailed,

    /// Error indicating that some of the requested claims do not exist; lists
    /// their paths.
    #[strum(to_string = "Nonexistent claims found: {0}")]
    NonexistentClaims(String),

    /// Error while verifying the issued SD-JWT.
    #[strum(to_string = "{0}")]
    Verification(VerificationError),
}

impl bherror::BhError for HolderError {}

/// Result type used by the [`holder`][crate::holder] module.
pub type Result<T> = bherror::Result<T, HolderError>;

impl Holder {
    /// Import an issued SD-JWT, verifying its validity.
    ///
    /// An issued `SD-JWT` is valid if it does not contain the Key Binding
    /// `JWT`, the signature of the `JWT` is valid against the issuer's public
    /// key, its time claims are valid at `current_time` and the received
    /// payload can be successfully re-constructed using the received
    /// disclosures. The checks are configured by `issuer_opts`, in the same
    /// way as for [`SdJwtVP::verify`].
    pub fn new(
        issued_sd_jwt: &str,
        issuer_opts: &IssuerSignedJwtVerificationOpts,
        current_time: SecondsSinceEpoch,
    ) -> Result<Self> {
        let SdJwtVP {
            sd_jwt,
            key_binding_jwt,
        } = issued_sd_jwt
            .parse::<SdJwtVP>()
            .with_err(|| HolderError::InvalidSdJwtSerialization)?;

        if key_binding_jwt.is_some() {
            return Err(Error::root(HolderError::KBJwtInIssuedSdJwt));
        }

        let VerifiedIssuerSignedJwt { decoded, .. } =
            verify_issuer_signed_jwt(&sd_jwt, issuer_opts, current_time)
                .match_err(|error| HolderError::Verification(error.clone()))?;

        Ok(Self { sd_jwt, decoded })
    }

    /// Return the fully reconstructed claim set in the held SD-JWT, with all
    /// SD-JWT format-specific metadata removed. To be used only for the purpose
    /// of displaying the contents to the End-User.
    pub fn claims(&self) -> &JsonObject {
        &self.decoded.claims
    }

    /// Consumes the [`Holder`] and returns the fully reconstructed claim set in
    /// the held SD-JWT.
    pub fn into_claims(self) -> JsonObject {
        self.decoded.claims
    }

    /// Create an [`SdJwtVP`] of the held SD-JWT disclosing the provided claim
    /// set, without a Key Binding JWT.
    ///
    /// # Claim set
    ///
    /// The disclosures included in the presentation are exactly those which
    /// reveal a node on, or under, one of the `claims_to_disclose` paths.
    /// Requesting a nested claim thus pulls in the disclosures of all its
    /// selectively disclosable ancestors, and requesting an object or array
    /// pulls in every disclosure inside it. It is valid for the paths to
    /// include non-selectively-disclosable claims.
    ///
    /// The disclosures keep the order in which they were issued.
    ///
    /// # Errors
    ///
    /// If any requested path doesn't exist within the fully reconstructed
    /// payload, this function will error with
    /// [`HolderError::NonexistentClaims`].
    pub fn present(&self, claims_to_disclose: &[&JsonNodePath]) -> Result<SdJwtVP> {
        let sd_jwt = self.select_disclosures(claims_to_disclose)?;

        Ok(SdJwtVP::new(sd_jwt, None))
    }

    /// Create an [`SdJwtVP`] of the held SD-JWT disclosing the provided claim
    /// set, proving key binding with a Key Binding JWT signed by the
    /// `key_binding_signer`.
    ///
    /// The claim set is selected in the same way as for [`Holder::present`].
    ///
    /// The [`KeyBindingChallenge`] should be set to the values received from
    /// the verifier, which it expects to find in the signed Key Binding JWT.
    /// The `current_time` is used to set the `iat` claim, and the `exp` claim
    /// five minutes later.
    pub fn present_with_key_binding<S: JwtSigner + ?Sized>(
        &self,
        claims_to_disclose: &[&JsonNodePath],
        key_binding_challenge: KeyBindingChallenge,
        current_time: SecondsSinceEpoch,
        key_binding_signer: &S,
    ) -> Result<SdJwtVP> {
        let sd_jwt = self.select_disclosures(claims_to_disclose)?;

        let key_binding_jwt = create_key_binding_jwt(
            &sd_jwt,
            &self.decoded.hasher,
            key_binding_challenge,
            current_time,
            key_binding_signer,
        )?;

        Ok(SdJwtVP::new(sd_jwt, Some(key_binding_jwt)))
    }

    fn select_disclosures(&self, claims_to_disclose: &[&JsonNodePath]) -> Result<SdJwt> {
        // Check all paths, including non-selectively disclosable ones.
        if let Err(nonexistent_claims) = paths_exist(self.claims(), claims_to_disclose) {
            let paths: Vec<_> = nonexistent_claims
                .into_iter()
                .map(|path| DisplayWrapper(path).to_string())
                .collect();
            return Err(Error::root(HolderError::NonexistentClaims(
                paths.join(", "),
            )));
        }

        let mut selected = BTreeSet::new();
        for path in claims_to_disclose {
            // Leaving the map only means that no disclosure lies further down
            // the path; the ones visited on the way are still selected.
            self.decoded
                .disclosures_by_path
                .traverse_path(path, |&index| {
                    selected.insert(index);
                })
                .ok();
        }

        let disclosures = selected
            .into_iter()
            .map(|index| self.sd_jwt.disclosures[index].clone())
            .collect();

        Ok(SdJwt::new(self.sd_jwt.jwt.clone(), disclosures))
    }
}

#[cfg(test)]
mod tests {
    use bh_jws_utils::{Es256Signer, Es256Verifier};
    use serde_json::json;

    use super::*;
    use crate::{
        issuer::Issuer, path, test_utils::*, Disclosure, KeyBindingJwtVerificationOpts, Sha256,
    };

    struct Fixture {
        issuer: Es256Signer,
        holder: Es256Signer,
        verifier: Es256Verifier,
        issued: SdJwt,
    }

    impl Fixture {
        fn new() -> Self {
            let issuer = issuer_signer();
            let holder = holder_signer();
            let disclosed_paths: &[&JsonNodePath] = &[
                path!["given_name"],
                path!["family_name"],
                path!["address"],
                path!["address", "street_address"],
                path!["nationalities", 1],
            ];
            let issued = Issuer::new(Sha256)
                .issue(
                    &dummy_claims(),
                    disclosed_paths,
                    Some(holder.public_jwk().unwrap()),
                    &issuer,
                    &mut rand::thread_rng(),
                )
                .unwrap();

            Self {
                issuer,
                holder,
                verifier: Es256Verifier,
                issued,
            }
        }

        fn issuer_opts(&self) -> IssuerSignedJwtVerificationOpts<'_> {
            IssuerSignedJwtVerificationOpts::builder()
                .verifier(&self.verifier)
                .public_key(self.issuer.public_jwk().unwrap())
                .build()
                .unwrap()
        }

        fn holder(&self) -> Holder {
            Holder::new(&self.issued.to_string(), &self.issuer_opts(), NOW).unwrap()
        }

        fn claim_names(&self, presentation: &SdJwtVP) -> Vec<Option<String>> {
            presentation
                .sd_jwt()
                .disclosures()
                .iter()
                .map(|disclosure| {
                    Disclosure::try_from(disclosure.clone())
                        .unwrap()
                        .claim_name()
                        .map(str::to_owned)
                })
                .collect()
        }
    }

    fn challenge() -> KeyBindingChallenge {
        KeyBindingChallenge {
            aud: dummy_key_binding_audience(),
            nonce: DUMMY_NONCE.to_owned(),
        }
    }

    #[test]
    fn test_new_reconstructs_claims() {
        let fixture = Fixture::new();
        let holder = fixture.holder();

        let mut expected = dummy_claims();
        expected.insert(
            "cnf".to_owned(),
            json!({ "jwk": fixture.holder.public_jwk().unwrap() }),
        );
        assert_eq!(holder.claims(), &expected);
        assert_eq!(holder.into_claims(), expected);
    }

    #[test]
    fn test_new_rejects_invalid_input() {
        let fixture = Fixture::new();

        let error = Holder::new("", &fixture.issuer_opts(), NOW).err().unwrap();
        assert_eq!(error.error, HolderError::InvalidSdJwtSerialization);

        let with_kb = format!("{}kb.jwt.sig", fixture.issued);
        let error = Holder::new(&with_kb, &fixture.issuer_opts(), NOW)
            .err()
            .unwrap();
        assert_eq!(error.error, HolderError::KBJwtInIssuedSdJwt);

        let wrong_key_opts = IssuerSignedJwtVerificationOpts::builder()
            .verifier(&fixture.verifier)
            .public_key(fixture.holder.public_jwk().unwrap())
            .build()
            .unwrap();
        let issued = fixture.issued.to_string();
        let error = Holder::new(&issued, &wrong_key_opts, NOW).err().unwrap();
        assert_eq!(
            error.error,
            HolderError::Verification(VerificationError::InvalidIssuerSignedJwtSignature)
        );
        assert_eq!(error.to_string(), "Invalid Issuer-signed JWT signature");

        let error = Holder::new(&issued, &fixture.issuer_opts(), ISSUED_AT - 1)
            .err()
            .unwrap();
        assert_eq!(
            error.error,
            HolderError::Verification(VerificationError::IssuerSignedJwtInvalidIat)
        );
    }

    #[test]
    fn test_present_selects_disclosures() {
        let fixture = Fixture::new();
        let holder = fixture.holder();

        let cases: [(&[&JsonNodePath], Vec<Option<&str>>); 7] = [
            (&[], vec![]),
            (&[path!["given_name"]], vec![Some("given_name")]),
            (
                &[path!["iss"], path!["address", "country"]],
                vec![Some("address")],
            ),
            (
                &[path!["address", "street_address"]],
                vec![Some("street_address"), Some("address")],
            ),
            (
                &[path!["address"], path!["given_name"]],
                vec![Some("street_address"), Some("address"), Some("given_name")],
            ),
            (&[path!["nationalities"]], vec![None]),
            (&[path!["nationalities", 0]], vec![]),
        ];

        for (paths, expected) in cases {
            let presentation = holder.present(paths).unwrap();
            assert_eq!(presentation.key_binding_jwt(), None);
            assert_eq!(
                presentation.sd_jwt().issuer_signed_jwt(),
                fixture.issued.issuer_signed_jwt()
            );

            let mut claim_names = fixture.claim_names(&presentation);
            let mut expected: Vec<_> = expected
                .into_iter()
                .map(|name| name.map(str::to_owned))
                .collect();
            claim_names.sort();
            expected.sort();
            assert_eq!(claim_names, expected, "paths: {paths:?}");
        }

        let everything = holder.present(&[path![]]).unwrap();
        assert_eq!(everything.sd_jwt(), &fixture.issued);
    }

    #[test]
    fn test_present_keeps_issued_order() {
        let fixture = Fixture::new();
        let holder = fixture.holder();

        let presentation = holder
            .present(&[
                path!["nationalities", 1],
                path!["family_name"],
                path!["address"],
            ])
            .unwrap();

        let issued = fixture.issued.disclosures();
        let positions: Vec<usize> = presentation
            .sd_jwt()
            .disclosures()
            .iter()
            .map(|disclosure| issued.iter().position(|d| d == disclosure).unwrap())
            .collect();
        assert_eq!(positions.len(), 4);
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_present_rejects_nonexistent_claims() {
        let fixture = Fixture::new();
        let holder = fixture.holder();

        let error = holder
            .present(&[
                path!["given_name"],
                path!["middle_name"],
                path!["nationalities", 2],
            ])
            .unwrap_err();
        assert_eq!(
            error.error,
            HolderError::NonexistentClaims("$.middle_name, $.nationalities[2]".to_owned())
        );
        assert_eq!(
            error.to_string(),
            "Nonexistent claims found: $.middle_name, $.nationalities[2]"
        );
    }

    #[test]
    fn test_presentation_verifies() {
        let fixture = Fixture::new();
        let holder = fixture.holder();

        let presentation = holder
            .present_with_key_binding(
                &[path!["given_name"], path!["address", "street_address"]],
                challenge(),
                NOW,
                &fixture.holder,
            )
            .unwrap();

        // Travel through the compact serialization, as towards a verifier.
        let presentation: SdJwtVP = presentation.to_string().parse().unwrap();

        let kb_opts = KeyBindingJwtVerificationOpts::builder()
            .nonce(DUMMY_NONCE)
            .aud(dummy_key_binding_audience())
            .verifier(&fixture.verifier)
            .build()
            .unwrap();
        let verified = presentation
            .verify(&fixture.issuer_opts(), &kb_opts, NOW)
            .unwrap();

        let claims = verified.claims();
        assert_eq!(claims["given_name"], "John");
        assert!(!claims.contains_key("family_name"));
        assert_eq!(
            claims["address"],
            json!({
                "street_address": "123 Main St",
                "locality": "Anytown",
                "country": "US",
            })
        );
        assert_eq!(claims["nationalities"], json!(["US"]));

        let kb_claims = verified.key_binding_claims().unwrap();
        assert_eq!(kb_claims["nonce"], DUMMY_NONCE);
        assert_eq!(kb_claims["iat"], NOW);
        assert_eq!(kb_claims["exp"], NOW + 300);

        // The Key Binding JWT expires five minutes after it was issued.
        let error = presentation
            .verify(&fixture.issuer_opts(), &kb_opts, NOW + 300)
            .unwrap_err();
        assert_eq!(error.error, VerificationError::KeyBindingJwtInvalidExp);
    }

    #[test]
    fn test_presentation_without_key_binding_verifies() {
        let fixture = Fixture::new();
        let holder = fixture.holder();

        let presentation = holder.present(&[path!["family_name"]]).unwrap();
        assert!(presentation.to_string().ends_with('~'));

        let kb_opts = KeyBindingJwtVerificationOpts::builder()
            .key_binding_required(false)
            .build()
            .unwrap();
        let verified = presentation
            .verify(&fixture.issuer_opts(), &kb_opts, NOW)
            .unwrap();

        assert_eq!(verified.claims()["family_name"], "Doe");
        assert!(!verified.claims().contains_key("given_name"));
        assert_eq!(
            verified.claims()["cnf"],
            json!({ "jwk": fixture.holder.public_jwk().unwrap() })
        );
        assert_eq!(verified.key_binding_claims(), None);
    }
}
