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

//! Verification of `SD-JWT` presentations.

use bh_jws_utils::{jwt, JwkPublic, JwtVerifier as _};
use bherror::{
    traits::{ForeignBoxed as _, ForeignError as _, PropagateError as _},
    Error,
};
use serde_json::Value;
use tracing::debug;

use crate::{
    decoder::{decode_disclosed_claims, DecodedClaims},
    error::{FormatError, SignatureError, VerificationError},
    issuer::IssuerJwtHeader,
    key_binding::verify_key_binding_jwt,
    options::{IssuerSignedJwtVerificationOpts, KeyBindingJwtVerificationOpts},
    sd_jwt::{SdJwt, SdJwtVP},
    utils, CnfClaim, JsonObject, Result, SecondsSinceEpoch,
};

type IssuerJwtUnverified<'a> = jwt::Token<IssuerJwtHeader, JsonObject, jwt::Unverified<'a>>;
type IssuerJwtVerified = jwt::Token<IssuerJwtHeader, JsonObject, jwt::Verified>;

/// The claims of a successfully verified `SD-JWT` presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedSdJwt {
    claims: JsonObject,
    key_binding_claims: Option<JsonObject>,
}

impl VerifiedSdJwt {
    /// The claims of the Issuer-signed JWT with every presented disclosure
    /// substituted in, and every withheld one left out.
    ///
    /// The selective disclosure machinery (`_sd`, `_sd_alg` and `...`) is
    /// not part of the result.
    pub fn claims(&self) -> &JsonObject {
        &self.claims
    }

    /// The claims of the Key Binding JWT, if one has been presented.
    pub fn key_binding_claims(&self) -> Option<&JsonObject> {
        self.key_binding_claims.as_ref()
    }

    /// Consumes `self`, returning the reconstructed claims.
    pub fn into_claims(self) -> JsonObject {
        self.claims
    }
}

/// An Issuer-signed JWT whose signature and time claims have been checked,
/// together with the claims reconstructed from its disclosures.
pub(crate) struct VerifiedIssuerSignedJwt {
    pub(crate) decoded: DecodedClaims,
    /// The `iat` claim of the Issuer-signed JWT, if it is a valid number.
    pub(crate) issued_at: Option<SecondsSinceEpoch>,
    /// The `cnf` claim as signed by the Issuer, outside of any disclosure.
    pub(crate) confirmation: Option<Value>,
}

/// Verifies the Issuer-signed JWT of `sd_jwt` and reconstructs the disclosed
/// claims.
///
/// Checks the signature first, then the `iat`, `nbf` and `exp` claims, and
/// finally the disclosures.
pub(crate) fn verify_issuer_signed_jwt(
    sd_jwt: &SdJwt,
    opts: &IssuerSignedJwtVerificationOpts,
    current_time: SecondsSinceEpoch,
) -> Result<VerifiedIssuerSignedJwt, VerificationError> {
    let token: IssuerJwtUnverified = jwt::Token::parse_unverified(sd_jwt.issuer_signed_jwt())
        .foreign_err(|| FormatError::NonParseableJwt)
        .match_err(|format_error| VerificationError::Format(format_error.clone()))?;

    let token: IssuerJwtVerified = opts
        .verifier
        .verify_jwt_signature(token, &opts.public_key)
        .foreign_boxed_err(|| SignatureError::InvalidJwsSignature)
        .with_err(|| VerificationError::InvalidIssuerSignedJwtSignature)?;

    debug!(alg = ?token.header().alg, "Issuer-signed JWT signature verified");

    let payload = token.claims();

    if opts.validate_issued_at_claim {
        utils::validate_iat(payload, current_time)
            .with_err(|| VerificationError::IssuerSignedJwtInvalidIat)?;
    }
    if opts.validate_not_before_claim {
        utils::validate_nbf(payload, current_time)
            .with_err(|| VerificationError::IssuerSignedJwtInvalidNbf)?;
    }
    utils::validate_exp(payload, current_time, false)
        .with_err(|| VerificationError::IssuerSignedJwtInvalidExp)?;

    let decoded = decode_disclosed_claims(payload, sd_jwt.disclosures(), opts.hasher_factory)
        .match_err(|decoding_error| VerificationError::Decoding(decoding_error.clone()))?;

    debug!(
        disclosures = sd_jwt.disclosures().len(),
        resolved_digests = decoded.resolved_digests,
        "disclosed claims reconstructed"
    );

    Ok(VerifiedIssuerSignedJwt {
        decoded,
        issued_at: utils::numeric_date_claim(payload, "iat").ok().flatten(),
        confirmation: payload.get("cnf").cloned(),
    })
}

/// Extracts the holder's public key from the `cnf` claim of the Issuer-signed
/// JWT payload.
fn holder_public_key(cnf: Option<Value>) -> Result<JwkPublic, VerificationError> {
    let Some(cnf) = cnf else {
        return Err(Error::root(VerificationError::NoConfirmationClaim));
    };

    let CnfClaim { jwk } = serde_json::from_value(cnf)
        .foreign_err(|| VerificationError::NoConfirmationClaim)?;

    Ok(jwk)
}

impl SdJwtVP {
    /// Verifies the presentation and returns the disclosed claims.
    ///
    /// The Issuer-signed JWT is verified against the Issuer's public key and
    /// its time claims are checked, as configured in `issuer_opts`. The
    /// presented disclosures are then substituted into the claims; digests
    /// whose disclosure has been withheld are dropped.
    ///
    /// If a Key Binding JWT is present it is verified against the public key
    /// from the `cnf` claim of the Issuer-signed JWT payload (a disclosed
    /// `cnf` is not accepted), and its `typ`,
    /// `sd_hash`, `nonce`, `aud` and time claims are checked as configured in
    /// `kb_opts`. A missing Key Binding JWT is only accepted when
    /// [`KeyBindingJwtVerificationOpts::key_binding_required`] is `false`.
    ///
    /// The first failing check determines the returned error.
    pub fn verify(
        &self,
        issuer_opts: &IssuerSignedJwtVerificationOpts,
        kb_opts: &KeyBindingJwtVerificationOpts,
        current_time: SecondsSinceEpoch,
    ) -> Result<VerifiedSdJwt, VerificationError> {
        let VerifiedIssuerSignedJwt {
            decoded,
            issued_at,
            confirmation,
        } = verify_issuer_signed_jwt(&self.sd_jwt, issuer_opts, current_time)?;

        let Some(kb_jwt) = &self.key_binding_jwt else {
            if kb_opts.key_binding_required {
                return Err(Error::root(VerificationError::MissingKeyBindingJwt));
            }

            debug!("no Key Binding JWT presented");
            return Ok(VerifiedSdJwt {
                claims: decoded.claims,
                key_binding_claims: None,
            });
        };

        let holder_public_key = holder_public_key(confirmation)?;

        let key_binding_claims = verify_key_binding_jwt(
            kb_jwt,
            &self.sd_jwt,
            &holder_public_key,
            &decoded.hasher,
            issued_at,
            kb_opts,
            current_time,
        )?;

        debug!("Key Binding JWT verified");

        Ok(VerifiedSdJwt {
            claims: decoded.claims,
            key_binding_claims: Some(key_binding_claims),
        })
    }
}
