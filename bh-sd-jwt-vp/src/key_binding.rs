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

use bh_jws_utils::{jwt, JwkPublic, JwtSigner, JwtVerifier as _, SigningAlgorithm};
use bherror::{
    traits::{ForeignBoxed as _, ForeignError as _, PropagateError as _},
    Error,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{SignatureError, VerificationError},
    holder::{HolderError, Result as HolderResult},
    options::KeyBindingJwtVerificationOpts,
    sd_jwt::SdJwt,
    utils, Hasher, JsonObject, Result, SecondsSinceEpoch,
};

/// The required value of the Key Binding `JWT` header `typ` element, as
/// specified [here].
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.3-3.1.2.1
pub(crate) const KB_JWT_HEADER_TYP: &str = "kb+jwt";

/// The lifetime of the Key Binding `JWT` created by the Holder, expressed in
/// seconds and used for its `exp` claim.
///
/// The current default is set to 5 minutes.
pub(crate) const KB_JWT_EXPIRATION_OFFSET: SecondsSinceEpoch = 5 * 60;

/// Header of the Key Binding `JWT`, as specified [here].
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.3-3.1.1
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct KBJwtHeader {
    /// The Key Binding `JWT` type. The value of this attribute **MUST** always
    /// be `kb+jwt`; a missing value is rejected during verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) typ: Option<String>,

    /// A digital signature algorithm identifier, as specified [here].
    ///
    /// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.3-3.1.2.2
    pub(crate) alg: SigningAlgorithm,
}

impl KBJwtHeader {
    /// Constructs and returns a new Key Binding `JWT` header from the provided
    /// [`SigningAlgorithm`].
    ///
    /// The `typ` attribute is always set to [`KB_JWT_HEADER_TYP`].
    pub(crate) fn new(alg: SigningAlgorithm) -> Self {
        Self {
            typ: Some(KB_JWT_HEADER_TYP.to_owned()),
            alg,
        }
    }
}

impl jwt::JoseHeader for KBJwtHeader {
    fn algorithm_type(&self) -> jwt::AlgorithmType {
        self.alg.into()
    }
}

/// Claims of the Key Binding `JWT` created by the Holder, as specified [here].
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.3-3.2.1
#[derive(Debug, Serialize)]
struct KBJwtClaims {
    iat: SecondsSinceEpoch,
    exp: SecondsSinceEpoch,
    aud: String,
    nonce: String,
    sd_hash: String,
}

impl KBJwtClaims {
    fn new(
        challenge: KeyBindingChallenge,
        current_time: SecondsSinceEpoch,
        sd_hash: String,
    ) -> Self {
        Self {
            iat: current_time,
            exp: current_time.saturating_add(KB_JWT_EXPIRATION_OFFSET),
            aud: challenge.aud,
            nonce: challenge.nonce,
            sd_hash,
        }
    }
}

/// The challenge to be sent to the holder. The purpose of the
/// challenge is to ensure the freshness of the key binding signature, as
/// well as the proper audience.
#[derive(Debug, Clone)]
pub struct KeyBindingChallenge {
    /// The intended receiver of the Key Binding `JWT`, as specified [here].
    ///
    /// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.3-3.2.2.2
    /// See also: [RFC7519](https://datatracker.ietf.org/doc/html/rfc7519#section-4.1.3)
    pub aud: String,
    /// A value used to ensure the freshness of the signature, as specified
    /// [here].
    ///
    /// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.3-3.2.2.3
    pub nonce: String,
}

type KBJwtUnverified<'a> = jwt::Token<KBJwtHeader, JsonObject, jwt::Unverified<'a>>;
type KBJwtVerified = jwt::Token<KBJwtHeader, JsonObject, jwt::Verified>;

/// Computes the `sd_hash` value of the provided `SD-JWT`, i.e. the
/// `base64url`-encoded hash digest over the Issuer-signed `JWT` followed by a
/// `~` character and the list of disclosures, each followed by a `~`
/// character.
///
/// The provided `hasher` **MUST** use the same algorithm that was used to
/// hide the claims of the `SD-JWT`.
pub(crate) fn sd_hash(sd_jwt: &SdJwt, hasher: impl Hasher) -> String {
    utils::base64_url_digest(sd_jwt.to_string().as_bytes(), hasher)
}

/// Constructs and signs the Key Binding `JWT` for presenting the given
/// `sd_jwt`.
pub(crate) fn create_key_binding_jwt<S: JwtSigner + ?Sized>(
    sd_jwt: &SdJwt,
    hasher: impl Hasher,
    challenge: KeyBindingChallenge,
    current_time: SecondsSinceEpoch,
    signer: &S,
) -> HolderResult<String> {
    let claims = KBJwtClaims::new(challenge, current_time, sd_hash(sd_jwt, hasher));

    utils::sign_jwt(KBJwtHeader::new(signer.algorithm()), claims, signer)
        .foreign_boxed_err(|| HolderError::KBJwtSigningFailed)
}

/// Verifies the Key Binding `JWT` of a presentation of `sd_jwt`, returning its
/// claims.
///
/// The checks are performed in the following order, and the first failing one
/// determines the returned error:
/// 1. the signature, against the `holder_public_key`,
/// 2. the `typ` header,
/// 3. the `sd_hash` claim, against the digest of `sd_jwt`,
/// 4. the `nonce` and `aud` claims, against the expected values,
/// 5. the `iat` claim, which must not be in the future nor precede
///    `issuer_iat`,
/// 6. the `exp` and `nbf` claims, if enabled in the `opts`.
pub(crate) fn verify_key_binding_jwt(
    kb_jwt: &str,
    sd_jwt: &SdJwt,
    holder_public_key: &JwkPublic,
    hasher: impl Hasher,
    issuer_iat: Option<SecondsSinceEpoch>,
    opts: &KeyBindingJwtVerificationOpts,
    current_time: SecondsSinceEpoch,
) -> Result<JsonObject, VerificationError> {
    let token = verify_signature(kb_jwt, holder_public_key, opts)
        .with_err(|| VerificationError::KeyBindingJwtInvalid)?;

    if token.header().typ.as_deref() != Some(KB_JWT_HEADER_TYP) {
        return Err(Error::root(VerificationError::UnexpectedKeyBindingJwtType));
    }

    let claims = token.claims();

    let Some(claimed_sd_hash) = claims.get("sd_hash").and_then(Value::as_str) else {
        return Err(Error::root(VerificationError::InvalidSdHashType));
    };
    if claimed_sd_hash != sd_hash(sd_jwt, hasher) {
        return Err(Error::root(VerificationError::InvalidSdHash));
    }

    if claims.get("nonce").and_then(Value::as_str) != opts.nonce() {
        return Err(Error::root(VerificationError::UnexpectedNonce));
    }
    if claims.get("aud").and_then(Value::as_str) != opts.aud() {
        return Err(Error::root(VerificationError::UnexpectedAud));
    }

    let iat = utils::validate_iat(claims, current_time)
        .with_err(|| VerificationError::KeyBindingJwtInvalidIat)?;
    if issuer_iat.is_some_and(|issuer_iat| iat < issuer_iat) {
        return Err(Error::root(
            VerificationError::KeyBindingJwtIssuedBeforeIssuerSignedJwt,
        ));
    }

    if opts.validate_expiration_claim {
        utils::validate_exp(claims, current_time, true)
            .with_err(|| VerificationError::KeyBindingJwtInvalidExp)?;
    }
    if opts.validate_not_before_claim {
        utils::validate_nbf(claims, current_time)
            .with_err(|| VerificationError::KeyBindingJwtInvalidNbf)?;
    }

    Ok(claims.clone())
}

fn verify_signature(
    kb_jwt: &str,
    holder_public_key: &JwkPublic,
    opts: &KeyBindingJwtVerificationOpts,
) -> Result<KBJwtVerified, SignatureError> {
    let verifier = opts
        .verifier
        .ok_or_else(|| Error::root(SignatureError::MissingSignatureVerifier))?;

    // The `alg` header is read before the signature is verified; a mismatch
    // with the algorithm of the verifier fails the verification below.
    let token_unverified: KBJwtUnverified = jwt::Token::parse_unverified(kb_jwt)
        .foreign_err(|| SignatureError::MalformedJws)?;

    verifier
        .verify_jwt_signature(token_unverified, holder_public_key)
        .foreign_boxed_err(|| SignatureError::InvalidJwsSignature)
}

#[cfg(test)]
pub(crate) mod tests {
    use bh_jws_utils::{BoxError, Es256Verifier};
    use serde_json::json;

    use super::*;
    use crate::{
        sd_jwt::tests::{DISCLOSURE_1, DISCLOSURE_2, JWT},
        test_utils::*,
        Sha256,
    };

    /// Signs arbitrary Key Binding `JWT` claims, with an arbitrary `typ`
    /// header.
    pub(crate) fn sign_key_binding_jwt(
        typ: Option<&str>,
        claims: JsonObject,
        signer: &impl JwtSigner,
    ) -> std::result::Result<String, BoxError> {
        let header = KBJwtHeader {
            typ: typ.map(str::to_owned),
            alg: signer.algorithm(),
        };
        utils::sign_jwt(header, claims, signer)
    }

    fn sd_jwt() -> SdJwt {
        format!("{JWT}~{DISCLOSURE_1}~{DISCLOSURE_2}~")
            .parse()
            .unwrap()
    }

    #[test]
    fn test_sd_hash() {
        assert_eq!(
            sd_hash(&sd_jwt(), Sha256),
            "jRSm0_vwTSvbteHXOV3DIpnMDjigK1yOpHpZJ09X6Os"
        );

        let without_disclosures: SdJwt = format!("{JWT}~").parse().unwrap();
        assert_eq!(
            sd_hash(&without_disclosures, Sha256),
            "JhGT88vylB_ub5vrxQW5FLYcZeG0X3o2X84ux2ecl88"
        );
    }

    #[test]
    fn test_create_key_binding_jwt() {
        let signer = holder_signer();
        let challenge = KeyBindingChallenge {
            aud: dummy_key_binding_audience(),
            nonce: DUMMY_NONCE.to_owned(),
        };

        let kb_jwt = create_key_binding_jwt(&sd_jwt(), Sha256, challenge, NOW, &signer).unwrap();

        let token: KBJwtVerified = Es256Verifier
            .verify_jwt_signature(kb_jwt.as_str(), &signer.public_jwk().unwrap())
            .unwrap();

        assert_eq!(token.header().typ.as_deref(), Some("kb+jwt"));
        assert_eq!(token.header().alg, SigningAlgorithm::Es256);
        assert_eq!(
            Value::Object(token.claims().clone()),
            json!({
                "iat": NOW,
                "exp": NOW + KB_JWT_EXPIRATION_OFFSET,
                "aud": dummy_key_binding_audience(),
                "nonce": DUMMY_NONCE,
                "sd_hash": "jRSm0_vwTSvbteHXOV3DIpnMDjigK1yOpHpZJ09X6Os",
            })
        );
    }

    #[test]
    fn test_verify_signature() {
        let signer = holder_signer();
        let verifier = Es256Verifier;
        let opts = KeyBindingJwtVerificationOpts::builder()
            .nonce(DUMMY_NONCE)
            .aud(dummy_key_binding_audience())
            .verifier(&verifier)
            .build()
            .unwrap();
        let kb_jwt = sign_key_binding_jwt(Some(KB_JWT_HEADER_TYP), JsonObject::new(), &signer)
            .unwrap();

        verify_signature(&kb_jwt, &signer.public_jwk().unwrap(), &opts).unwrap();

        let error = verify_signature(&kb_jwt, &issuer_signer().public_jwk().unwrap(), &opts)
            .err()
            .unwrap();
        assert_eq!(error.error, SignatureError::InvalidJwsSignature);

        let error = verify_signature("not.a.jwt", &signer.public_jwk().unwrap(), &opts)
            .err()
            .unwrap();
        assert_eq!(error.error, SignatureError::MalformedJws);

        let opts = KeyBindingJwtVerificationOpts::builder()
            .key_binding_required(false)
            .build()
            .unwrap();
        let error = verify_signature(&kb_jwt, &signer.public_jwk().unwrap(), &opts)
            .err()
            .unwrap();
        assert_eq!(error.error, SignatureError::MissingSignatureVerifier);
    }
}
