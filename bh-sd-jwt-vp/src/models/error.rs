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

/// Error type defining possible errors while reconstructing the disclosed
/// claims of an SD-JWT.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum DecodingError {
    /// At least one of the provided disclosures does not match any digest
    /// reachable in the claims.
    #[strum(to_string = "At least one disclosure is not protected by digest")]
    DisclosureNotProtectedByDigest,

    /// A disclosure referenced from an `_sd` array is not a field disclosure.
    #[strum(to_string = "A field disclosure must contain exactly three elements")]
    InvalidFieldDisclosureLength,

    /// A disclosure referenced from a `...` array element marker is not an
    /// array element disclosure.
    #[strum(to_string = "An array element disclosure must contain exactly two elements")]
    InvalidArrayElementDisclosureLength,

    /// A disclosure could not be parsed.
    #[strum(to_string = "Malformed disclosure")]
    MalformedDisclosure,

    /// Error indicating that a reserved key name is being used inappropriately.
    #[strum(to_string = "Reserved key name {0} usage")]
    ReservedKeyName(&'static str),

    /// Error indicating that the digest is not in the expected format.
    #[strum(to_string = "Malformed digest: {0}")]
    MalformedDigest(String),

    /// Error indicating that a claim name is duplicated.
    #[strum(to_string = "Duplicate claim name: {0}")]
    DuplicateClaimName(String),

    /// Error indicating that the hash algorithm name is invalid or not
    /// supported.
    #[strum(to_string = "Invalid hash algorithm name: {0}")]
    InvalidHashAlgorithmName(String),

    /// Error indicating that a hasher is missing for the specified hash
    /// algorithm.
    #[strum(to_string = "Missing hasher: {0}")]
    MissingHasher(String),
}

impl bherror::BhError for DecodingError {}

pub(crate) type DecodingResult<T> = bherror::Result<T, DecodingError>;
