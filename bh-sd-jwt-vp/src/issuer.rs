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

//! Provides the [`Issuer`] type for issuing SD-JWTs.

use bh_jws_utils::{jwt, JwkPublic, JwtSigner, SigningAlgorithm};
use bherror::{
    traits::{ErrorContext as _, ForeignBoxed as _},
    Error,
};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    encoder,
    utils::{self, SD_ALG_FIELD_NAME},
    Hasher, JsonNodePath, JsonNodePathSegment, JsonObject, SdJwt,
};

/// Issuer of SD-JWTs, hiding the selected claims behind digests computed
/// with the configured [`Hasher`].
pub struct Issuer<H: Hasher> {
    hasher: H,
    typ: Option<String>,
    kid: Option<String>,
}

/// Error type related to the Issuer operations.
#[derive(strum_macros::Display, Debug, PartialEq, Eq)]
pub enum IssuerError {
    /// Error indicating that a claim name is reserved or registered and should
    /// not be used in the selectively disclosable claims.
    #[strum(to_string = "Use of reserved or registered claim name {0}")]
    ReservedOrRegisteredClaimName(&'static str),

    /// Error indicating that the provided disclosure path is invalid.
    #[strum(to_string = "Invalid path {0}")]
    InvalidPath(String),

    /// Error indicating that the provided disclosure path does not exist.
    #[strum(to_string = "Non existent path {0}")]
    NonExistentPath(String),

    /// Error indicating that the signing of the JWT failed.
    #[strum(to_string = "Signing failed")]
    SigningFailed,

    /// Error indicating that the provided disclosure paths contain a path that
    /// is a duplicate of another path.
    #[strum(to_string = "Duplicate path {0}")]
    DuplicatePath(String),
}

impl bherror::BhError for IssuerError {}

/// Result type used by the [`issuer`][crate::issuer] module.
pub type Result<T> = bherror::Result<T, IssuerError>;

/// Registered claims with defined semantics for the verification of the
/// SD-JWT. These are **NOT** selectively disclosable.
pub(crate) const NON_DISCLOSABLE_CLAIM_NAMES: &[&str] = &["iss", "iat", "nbf", "exp", "cnf"];

const CNF: &str = "cnf";

impl<H: Hasher> Issuer<H> {
    /// Construct a new [`Issuer`] with the given [`Hasher`].
    pub fn new(hasher: H) -> Self {
        Self {
            hasher,
            typ: None,
            kid: None,
        }
    }

    /// Sets the `typ` header parameter of the issued JWTs, e.g. `example+sd-jwt`.
    pub fn with_typ(mut self, typ: impl Into<String>) -> Self {
        self.typ = Some(typ.into());
        self
    }

    /// Sets the `kid` header parameter of the issued JWTs.
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Create a new SD-JWT with disclosures for the JSON nodes at the provided
    /// paths, if they all exist.
    ///
    /// Paths which are extensions of other paths will cause creation of recursive disclosures,
    /// i.e. disclosures which themselves contain hash pointers to other disclosures, as described
    /// in more detail in the [draft].
    ///
    /// If `holder_public_jwk` is given, it is embedded into the `cnf` claim so
    /// that the holder can later prove possession of the corresponding private
    /// key. The `claims` must not contain a `cnf` claim in that case.
    ///
    /// The registered claims `iss`, `iat`, `nbf`, `exp` and `cnf` cannot be
    /// made selectively disclosable.
    ///
    /// [draft]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#name-example-sd-jwt-with-recursi
    pub fn issue<S: JwtSigner + ?Sized>(
        &self,
        claims: &JsonObject,
        disclosure_paths: &[&JsonNodePath],
        holder_public_jwk: Option<JwkPublic>,
        signer: &S,
        rng: &mut impl CryptoRngCore,
    ) -> Result<SdJwt> {
        check_registered_path_in_paths(disclosure_paths)?;

        let (mut payload, disclosures) =
            encoder::encode_claims(claims, disclosure_paths, &self.hasher, rng)?;

        payload.insert(
            SD_ALG_FIELD_NAME.to_owned(),
            self.hasher.algorithm().as_str().into(),
        );

        if let Some(jwk) = holder_public_jwk {
            if payload.contains_key(CNF) {
                return Err(Error::root(IssuerError::ReservedOrRegisteredClaimName(CNF)))
                    .ctx(|| "holder key given for claims already carrying one");
            }
            let cnf = JsonObject::from_iter([("jwk".to_owned(), Value::Object(jwk))]);
            payload.insert(CNF.to_owned(), Value::Object(cnf));
        }

        let header = IssuerJwtHeader {
            alg: signer.algorithm(),
            typ: self.typ.clone(),
            kid: self.kid.clone(),
        };
        let jwt = utils::sign_jwt(header, payload, signer)
            .foreign_boxed_err(|| IssuerError::SigningFailed)?;

        tracing::debug!(disclosures = disclosures.len(), "SD-JWT issued");

        Ok(SdJwt::new(
            jwt,
            disclosures
                .into_iter()
                .map(crate::Disclosure::into_string)
                .collect(),
        ))
    }
}

/// Check if some `path` in provided array of `paths` is leading to, or
/// through, a registered claim which should not be disclosable.
fn check_registered_path_in_paths(paths: &[&JsonNodePath]) -> Result<()> {
    for path in paths {
        if let Some(JsonNodePathSegment::Key(key)) = path.first() {
            if let Some(&name) = NON_DISCLOSABLE_CLAIM_NAMES.iter().find(|&&n| n == *key) {
                return Err(Error::root(IssuerError::ReservedOrRegisteredClaimName(
                    name,
                )));
            }
        }
    }
    Ok(())
}

/// JWT Header of the Issuer-signed JWT.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuerJwtHeader {
    /// Algorithm used to sign the payload.
    pub alg: SigningAlgorithm,

    /// Optional type of the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Optional identifier of the key used for signing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl jwt::JoseHeader for IssuerJwtHeader {
    fn algorithm_type(&self) -> jwt::AlgorithmType {
        self.alg.into()
    }
}
