// Copyright (C) 2020-2025  The Blockhouse Technology Limited (TBTL).
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

use bh_jws_utils::{base64_url_encode, jwt, BoxError, JwtSigner};
use bherror::Error;
use serde_json::Value;

use crate::{error::TimeClaimError, Hasher, JsonObject, SecondsSinceEpoch, RESERVED_CLAIM_NAMES};

/// The field name of the hash algorithm used to hide the claims, as specified [here].
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#name-hash-function-claim
pub(crate) const SD_ALG_FIELD_NAME: &str = "_sd_alg";

/// Returns the `base64url`-encoded hash digest of the given `input` using the
/// provided [`Hasher`] to calculate the digest.
pub fn base64_url_digest(input: &[u8], hasher: impl Hasher) -> String {
    let digest = hasher.digest(input);

    base64_url_encode(digest)
}

/// Checks if provided argument `key` is one of [RESERVED_CLAIM_NAMES] according to [1], [2] and [3]
///
/// [1]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#section-5.1.1-1
/// [2]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#section-5.1-3.7
/// [3]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#section-8.1-4.3.2.3.2.2.2.2
pub(crate) fn is_reserved_key_name(key: &str) -> Option<&'static str> {
    RESERVED_CLAIM_NAMES
        .iter()
        .find(|&name| key.eq(*name))
        .copied()
}

/// The SD-JWT payload MUST NOT contain reserved claims `_sd` and `...`
/// except for the purposes of encoding SD-JWT hash pointers.
///
/// [Reference](https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#section-5.1-3.7)
pub(crate) fn check_claim_names_object(
    object: &JsonObject,
    reserved_predicate: &impl Fn(&str) -> Option<&'static str>,
    recurse: bool,
) -> Option<&'static str> {
    for (claim_name, claim_value) in object {
        if let Some(name) = reserved_predicate(claim_name.as_str()) {
            return Some(name);
        }
        if !recurse {
            continue;
        }
        if let Some(name) = check_claim_names(claim_value, reserved_predicate) {
            return Some(name);
        }
    }
    None
}

fn check_claim_names(
    value: &Value,
    reserved_predicate: &impl Fn(&str) -> Option<&'static str>,
) -> Option<&'static str> {
    match value {
        Value::Object(object) => check_claim_names_object(object, reserved_predicate, true),
        Value::Array(array) => {
            for element in array {
                if let Some(name) = check_claim_names(element, reserved_predicate) {
                    return Some(name);
                }
            }
            None
        }
        _ => None,
    }
}

/// Signs the given `header` and `claims` into a JWS in the Compact
/// Serialization format.
pub(crate) fn sign_jwt<Header, Claims, S>(
    header: Header,
    claims: Claims,
    signer: &S,
) -> Result<String, BoxError>
where
    Header: jwt::ToBase64 + jwt::JoseHeader,
    Claims: jwt::ToBase64,
    S: JwtSigner + ?Sized,
{
    let signed: jwt::Token<Header, Claims, jwt::token::Signed> =
        signer.sign_jwt(jwt::Token::new(header, claims))?;

    Ok(signed.into())
}

/// Reads the NumericDate claim `name`, i.e. a number of seconds since the
/// epoch, as specified in [RFC7519].
///
/// A missing or `null` claim is reported as [`None`]. Fractional seconds are
/// truncated.
///
/// [RFC7519]: https://www.rfc-editor.org/rfc/rfc7519.html#section-2
pub(crate) fn numeric_date_claim(
    claims: &JsonObject,
    name: &'static str,
) -> bherror::Result<Option<SecondsSinceEpoch>, TimeClaimError> {
    let value = match claims.get(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };

    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .map(|seconds| seconds as SecondsSinceEpoch)
        })
        .map(Some)
        .ok_or_else(|| Error::root(TimeClaimError::NotANumber(name)))
}

/// Checks the `iat` claim, which is required and must not be in the future.
pub(crate) fn validate_iat(
    claims: &JsonObject,
    current_time: SecondsSinceEpoch,
) -> bherror::Result<SecondsSinceEpoch, TimeClaimError> {
    let iat = numeric_date_claim(claims, "iat")?
        .ok_or_else(|| Error::root(TimeClaimError::Missing("iat")))?;

    if iat > current_time {
        return Err(Error::root(TimeClaimError::IssuedInTheFuture));
    }

    Ok(iat)
}

/// Checks the `nbf` claim, if present, is not in the future.
pub(crate) fn validate_nbf(
    claims: &JsonObject,
    current_time: SecondsSinceEpoch,
) -> bherror::Result<(), TimeClaimError> {
    if let Some(nbf) = numeric_date_claim(claims, "nbf")? {
        if nbf > current_time {
            return Err(Error::root(TimeClaimError::NotYetValid));
        }
    }

    Ok(())
}

/// Checks the `exp` claim is in the future; RFC7519 rejects the JWT "on or
/// after" the expiration time.
pub(crate) fn validate_exp(
    claims: &JsonObject,
    current_time: SecondsSinceEpoch,
    required: bool,
) -> bherror::Result<(), TimeClaimError> {
    match numeric_date_claim(claims, "exp")? {
        Some(exp) if current_time >= exp => Err(Error::root(TimeClaimError::Expired)),
        Some(_) => Ok(()),
        None if required => Err(Error::root(TimeClaimError::Missing("exp"))),
        None => Ok(()),
    }
}
