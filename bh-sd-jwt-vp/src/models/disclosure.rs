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

use core::fmt;
use std::collections::{hash_map::Entry, HashMap};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bh_jws_utils::base64_url_encode;
use bherror::{
    traits::{ErrorContext, ForeignError, PropagateError},
    Error,
};
use rand_core::{CryptoRngCore, OsRng};

use super::{error::DecodingResult, Value};
use crate::{
    error::{FormatError, InputError},
    utils, DecodingError, Hasher,
};

/// The number of random bytes used for a salt, giving it 128 bits of entropy.
const SALT_ENTROPY_BYTES: usize = 16;

/// A disclosure of a single claim, in both parsed form and the original
/// serialized form.
///
/// A disclosure is either a _field_ disclosure, revealing a claim name
/// together with its value, or an _array element_ disclosure, revealing a bare
/// value. Disclosures are constructed through [`Disclosure::field`] and
/// [`Disclosure::array_element`], or parsed from their serialized form via
/// [`TryFrom<String>`].
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Disclosure {
    pub(crate) data: DisclosureData,
    // serialized-as-hashed
    serialized: String,
}

impl TryFrom<String> for Disclosure {
    type Error = Error<FormatError>;

    fn try_from(serialized: String) -> Result<Self, Self::Error> {
        let decoded = URL_SAFE_NO_PAD
            .decode(&serialized)
            .foreign_err(|| {
                FormatError::InvalidDisclosure("provided string is not base64 ".to_string())
            })
            .ctx(|| serialized.clone())?;

        let array: Vec<Value> = serde_json::from_slice(&decoded)
            .foreign_err(|| {
                FormatError::InvalidDisclosure(
                    "serde json could not parse decoded base64 string ".to_string(),
                )
            })
            .ctx(|| serialized.clone())?;

        let data = match <[Value; 3]>::try_from(array) {
            Ok([salt, key, value]) => create_disclosure_data_key_value(salt, key, value),
            Err(array) => match <[Value; 2]>::try_from(array) {
                Ok([salt, value]) => create_disclosure_data_array_element(salt, value),
                Err(array) => Err(Error::root(FormatError::InvalidDisclosureLength(
                    array.len(),
                ))),
            },
        }
        .ctx(|| serialized.clone())?;

        Ok(Self { data, serialized })
    }
}

fn create_disclosure_data_key_value(
    salt: Value,
    key: Value,
    value: Value,
) -> crate::Result<DisclosureData, FormatError> {
    let Value::String(salt) = salt else {
        return Err(Error::root(FormatError::InvalidDisclosure(
            "salt value is not a string".to_string(),
        )));
    };
    let Value::String(key) = key else {
        return Err(Error::root(FormatError::InvalidDisclosure(
            "key value is not a string".to_string(),
        )));
    };

    Ok(DisclosureData::KeyValue { salt, key, value })
}

fn create_disclosure_data_array_element(
    salt: Value,
    value: Value,
) -> crate::Result<DisclosureData, FormatError> {
    let Value::String(salt) = salt else {
        return Err(Error::root(FormatError::InvalidDisclosure(
            "salt value is not a string".to_string(),
        )));
    };

    Ok(DisclosureData::ArrayElement { salt, value })
}

impl fmt::Display for Disclosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            DisclosureData::KeyValue { salt, key, value } => {
                write!(f, "[{}, {}, {}]", salt, key, value)
            }
            DisclosureData::ArrayElement { salt, value } => write!(f, "[{}, {}]", salt, value),
        }
    }
}

impl Disclosure {
    /// Start building a field disclosure, i.e. one revealing a claim name and
    /// its value.
    pub fn field() -> FieldDisclosureBuilder {
        FieldDisclosureBuilder::default()
    }

    /// Start building an array element disclosure, i.e. one revealing a bare
    /// value of an array element.
    pub fn array_element() -> ArrayElementDisclosureBuilder {
        ArrayElementDisclosureBuilder::default()
    }

    /// Construct a new [`Disclosure`] from the given `salt`, `claim_name` and `claim_value`.
    ///
    /// The array form is serialized as `["<salt>", "<claim_name>", <claim_value>]` (or without
    /// the claim name for array elements) before being `base64url`-encoded.
    pub(crate) fn new(salt: Salt, claim_name: Option<String>, claim_value: Value) -> Self {
        // `Value::from` takes care of escaping the strings
        let input = if let Some(name) = &claim_name {
            format!(
                "[{}, {}, {}]",
                Value::from(salt.as_str()),
                Value::from(name.as_str()),
                claim_value
            )
        } else {
            format!("[{}, {}]", Value::from(salt.as_str()), claim_value)
        };

        let data = if let Some(name) = claim_name {
            DisclosureData::KeyValue {
                salt,
                key: name,
                value: claim_value,
            }
        } else {
            DisclosureData::ArrayElement {
                salt,
                value: claim_value,
            }
        };

        Self {
            data,
            serialized: base64_url_encode(input),
        }
    }

    /// The `base64url`-encoded digest of the serialized disclosure, as it
    /// appears in the `_sd` arrays and `...` array element markers.
    pub fn digest(&self, hasher: impl Hasher) -> Digest {
        utils::base64_url_digest(self.serialized.as_bytes(), hasher)
    }

    /// Disclosure salt.
    pub fn salt(&self) -> &str {
        match &self.data {
            DisclosureData::KeyValue { salt, .. } => salt,
            DisclosureData::ArrayElement { salt, .. } => salt,
        }
    }

    /// Disclosure data value.
    pub fn value(&self) -> &Value {
        match &self.data {
            DisclosureData::KeyValue { value, .. } => value,
            DisclosureData::ArrayElement { value, .. } => value,
        }
    }

    /// Disclosure data key, i.e. claim name.
    pub fn claim_name(&self) -> Option<&str> {
        match &self.data {
            DisclosureData::KeyValue { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Parsed form of [`Self`].
    pub fn data(&self) -> &DisclosureData {
        &self.data
    }

    /// Serialized form of [`Self`]
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Serialize [`Self`] into an owned [`String`].
    pub fn into_string(self) -> String {
        self.serialized
    }
}

/// Parsed form of a disclosure.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum DisclosureData {
    /// A key-value pair disclosure data.
    KeyValue {
        /// Disclosure hash salt.
        salt: Salt,
        /// Key (claim name) of the disclosure.
        key: String,
        /// Value of the disclosure.
        value: Value,
    },
    /// An array element disclosure data.
    ArrayElement {
        /// Disclosure hash salt.
        salt: Salt,
        /// Value of the disclosure.
        value: Value,
    },
}

/// Base64url encoded disclosure hash salt.
pub type Salt = String;

/// Base64url encoded hash value.
pub type Digest = String;

/// Generates a fresh salt from the given cryptographically secure RNG.
pub(crate) fn generate_salt(rng: &mut impl CryptoRngCore) -> Salt {
    let mut salt_bytes = [0u8; SALT_ENTROPY_BYTES];
    rng.fill_bytes(&mut salt_bytes);
    base64_url_encode(salt_bytes)
}

/// Builder of field disclosures, created by [`Disclosure::field`].
///
/// Both the claim name and the value are required; the salt is generated
/// from the operating system RNG unless explicitly provided.
#[derive(Debug, Default, Clone)]
pub struct FieldDisclosureBuilder {
    salt: Option<Salt>,
    name: Option<String>,
    value: Option<Value>,
}

impl FieldDisclosureBuilder {
    /// Use the given salt instead of generating a random one.
    pub fn salt(mut self, salt: impl Into<Salt>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Set the name of the disclosed claim.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the value of the disclosed claim.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Build the [`Disclosure`], failing if the name or the value is missing.
    pub fn build(self) -> crate::Result<Disclosure, InputError> {
        let name = self
            .name
            .ok_or_else(|| Error::root(InputError::MissingRequiredField("name")))?;
        let value = self
            .value
            .ok_or_else(|| Error::root(InputError::MissingRequiredField("value")))?;
        let salt = self.salt.unwrap_or_else(|| generate_salt(&mut OsRng));

        Ok(Disclosure::new(salt, Some(name), value))
    }
}

/// Builder of array element disclosures, created by
/// [`Disclosure::array_element`].
///
/// The value is required; the salt is generated from the operating system RNG
/// unless explicitly provided.
#[derive(Debug, Default, Clone)]
pub struct ArrayElementDisclosureBuilder {
    salt: Option<Salt>,
    value: Option<Value>,
}

impl ArrayElementDisclosureBuilder {
    /// Use the given salt instead of generating a random one.
    pub fn salt(mut self, salt: impl Into<Salt>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Set the value of the disclosed array element.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Build the [`Disclosure`], failing if the value is missing.
    pub fn build(self) -> crate::Result<Disclosure, InputError> {
        let value = self
            .value
            .ok_or_else(|| Error::root(InputError::MissingRequiredField("value")))?;
        let salt = self.salt.unwrap_or_else(|| generate_salt(&mut OsRng));

        Ok(Disclosure::new(salt, None, value))
    }
}

/// A disclosure as carried by an SD-JWT.
///
/// Disclosures whose array has neither two nor three elements cannot be
/// classified on their own; they are kept so that the error can be reported
/// in the context of the digest that references them.
#[derive(Debug, Clone)]
pub(crate) enum CarriedDisclosure {
    Valid(Disclosure),
    InvalidLength(String),
}

impl CarriedDisclosure {
    pub(crate) fn parse(serialized: &str) -> DecodingResult<Self> {
        match Disclosure::try_from(serialized.to_owned()) {
            Ok(disclosure) => Ok(Self::Valid(disclosure)),
            Err(err) if matches!(err.error, FormatError::InvalidDisclosureLength(_)) => {
                Ok(Self::InvalidLength(serialized.to_owned()))
            }
            Err(err) => Err(err).with_err(|| DecodingError::MalformedDisclosure),
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        match self {
            Self::Valid(disclosure) => disclosure.as_str(),
            Self::InvalidLength(serialized) => serialized,
        }
    }
}

/// Carried disclosures indexed by their digest, keeping track of which of
/// them have been referenced from the claims.
///
/// Identical disclosures carried more than once are kept only once.
#[derive(Debug)]
pub(crate) struct DisclosureByDigestTable<'a> {
    disclosures: &'a [CarriedDisclosure],
    by_digest: HashMap<Digest, usize>,
    used: Vec<bool>,
}

impl<'a> DisclosureByDigestTable<'a> {
    pub(crate) fn new(disclosures: &'a [CarriedDisclosure], hasher: impl Hasher) -> Self {
        let mut by_digest = HashMap::new();
        let mut used = vec![false; disclosures.len()];

        for (index, disclosure) in disclosures.iter().enumerate() {
            let digest = utils::base64_url_digest(disclosure.as_str().as_bytes(), &hasher);
            if let Entry::Vacant(entry) = by_digest.entry(digest) {
                entry.insert(index);
            } else {
                // duplicates are covered by the first occurrence
                used[index] = true;
            }
        }

        Self {
            disclosures,
            by_digest,
            used,
        }
    }

    /// Look up the disclosure with the given digest, marking it as used.
    pub(crate) fn lookup(&mut self, digest: &str) -> Option<(usize, &'a CarriedDisclosure)> {
        let index = *self.by_digest.get(digest)?;
        self.used[index] = true;
        let disclosures = self.disclosures;
        Some((index, &disclosures[index]))
    }

    pub(crate) fn all_used(&self) -> bool {
        self.used.iter().all(|used| *used)
    }
}
