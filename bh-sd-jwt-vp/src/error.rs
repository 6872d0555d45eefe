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

use crate::DecodingError;

/// Error returned when verifying an SD-JWT presentation.
///
/// The [`Display`](std::fmt::Display) output of each variant is stable and can
/// be relied upon. Where an underlying cause exists (e.g. a signature
/// verification failure or a violated time claim), it is available through
/// [`std::error::Error::source`] of the surrounding [`bherror::Error`].
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum VerificationError {
    /// The presentation or one of its components could not be parsed.
    #[strum(to_string = "{0}")]
    Format(FormatError),

    /// The disclosed claims could not be reconstructed.
    #[strum(to_string = "{0}")]
    Decoding(DecodingError),

    /// The signature of the Issuer-signed JWT did not verify.
    #[strum(to_string = "Invalid Issuer-signed JWT signature")]
    InvalidIssuerSignedJwtSignature,

    /// The `iat` claim of the Issuer-signed JWT is missing, malformed or in
    /// the future.
    #[strum(to_string = "Issuer-signed JWT: Invalid `iat` claim")]
    IssuerSignedJwtInvalidIat,

    /// The `nbf` claim of the Issuer-signed JWT is malformed or in the future.
    #[strum(to_string = "Issuer-signed JWT: Invalid `nbf` claim")]
    IssuerSignedJwtInvalidNbf,

    /// The `exp` claim of the Issuer-signed JWT is malformed or has passed.
    #[strum(to_string = "Issuer-signed JWT: Invalid `exp` claim")]
    IssuerSignedJwtInvalidExp,

    /// Key binding is required, but the presentation carries no Key Binding
    /// JWT.
    #[strum(to_string = "Missing Key Binding JWT")]
    MissingKeyBindingJwt,

    /// The Issuer-signed JWT carries no usable `cnf` claim.
    #[strum(to_string = "No cnf claim in Issuer-signed JWT for key binding")]
    NoConfirmationClaim,

    /// The Key Binding JWT could not be parsed or its signature did not
    /// verify.
    #[strum(to_string = "Key binding JWT invalid")]
    KeyBindingJwtInvalid,

    /// The `typ` header of the Key Binding JWT is not `kb+jwt`.
    #[strum(to_string = "Key Binding JWT is not of declared typ kb+jwt")]
    UnexpectedKeyBindingJwtType,

    /// The `sd_hash` claim of the Key Binding JWT is missing or not a string.
    #[strum(to_string = "Key binding JWT: Claim `sd_hash` missing or not a string")]
    InvalidSdHashType,

    /// The `sd_hash` claim of the Key Binding JWT does not match the
    /// presentation.
    #[strum(to_string = "Key binding JWT: Invalid `sd_hash` digest")]
    InvalidSdHash,

    /// The `nonce` claim of the Key Binding JWT differs from the expected one.
    #[strum(to_string = "Key binding JWT: Unexpected `nonce` value")]
    UnexpectedNonce,

    /// The `aud` claim of the Key Binding JWT differs from the expected one.
    #[strum(to_string = "Key binding JWT: Unexpected `aud` value")]
    UnexpectedAud,

    /// The `iat` claim of the Key Binding JWT is missing, malformed or in the
    /// future.
    #[strum(to_string = "Key binding JWT: Invalid `iat` claim")]
    KeyBindingJwtInvalidIat,

    /// The Key Binding JWT was issued before the Issuer-signed JWT.
    #[strum(to_string = "Key binding JWT was issued before Issuer-signed JWT")]
    KeyBindingJwtIssuedBeforeIssuerSignedJwt,

    /// The `exp` claim of the Key Binding JWT is missing, malformed or has
    /// passed.
    #[strum(to_string = "Key binding JWT: Invalid `exp` claim")]
    KeyBindingJwtInvalidExp,

    /// The `nbf` claim of the Key Binding JWT is malformed or in the future.
    #[strum(to_string = "Key binding JWT: Invalid `nbf` claim")]
    KeyBindingJwtInvalidNbf,
}

impl bherror::BhError for VerificationError {}

/// Format error related to parsing SD-JWTs, their disclosures and JWTs.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum FormatError {
    /// Error indicating that the SD-JWT format is invalid.
    #[strum(to_string = "Invalid SD-JWT format")]
    InvalidSdJwtFormat,

    /// Error indicating that the SD-JWT is not parsable.
    #[strum(to_string = "Provided JWT is not parsable")]
    NonParseableJwt,

    /// Error indicating that the disclosure data is in an invalid format.
    #[strum(to_string = "Invalid disclosure: {0}")]
    InvalidDisclosure(String),

    /// Error indicating that the disclosure decodes to an array which is
    /// neither a field nor an array element disclosure.
    #[strum(to_string = "Invalid disclosure: deserialized disclosure array has invalid length {0}")]
    InvalidDisclosureLength(usize),
}

impl bherror::BhError for FormatError {}

/// Error type for signature-related issues, used as the cause of the
/// signature related [`VerificationError`]s.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum SignatureError {
    /// Error indicating that the JWS signature is invalid.
    #[strum(to_string = "Invalid JWS signature")]
    InvalidJwsSignature,

    /// Error indicating that the JWS is not in the compact serialization format.
    #[strum(to_string = "Malformed JWS")]
    MalformedJws,

    /// Error indicating that no signature verifier was configured for key
    /// binding.
    #[strum(to_string = "No signature verifier available for key binding")]
    MissingSignatureVerifier,
}

impl bherror::BhError for SignatureError {}

/// Error type for time related claims (`iat`, `nbf`, `exp`), used as the
/// cause of the time related [`VerificationError`]s.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum TimeClaimError {
    /// The `iat` claim is later than the current time.
    #[strum(to_string = "jwt issued in the future")]
    IssuedInTheFuture,

    /// The `exp` claim is not later than the current time.
    #[strum(to_string = "jwt has expired")]
    Expired,

    /// The `nbf` claim is later than the current time.
    #[strum(to_string = "jwt not valid yet")]
    NotYetValid,

    /// The claim is required, but missing or `null`.
    #[strum(to_string = "Missing `{0}` claim or null")]
    Missing(&'static str),

    /// The claim is not a number of seconds since the epoch.
    #[strum(to_string = "Claim `{0}` is not a number")]
    NotANumber(&'static str),
}

impl bherror::BhError for TimeClaimError {}

/// Error returned by the builders of this crate when the provided input is
/// incomplete.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum InputError {
    /// A field required by the builder has not been set.
    #[strum(to_string = "Missing required field `{0}`")]
    MissingRequiredField(&'static str),
}

impl bherror::BhError for InputError {}

/// Result type used across the crate.
pub type Result<T, E> = bherror::Result<T, E>;
