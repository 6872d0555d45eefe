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

use std::str::FromStr;

use bherror::{traits::PropagateError, Error};
use serde_json::Value;

use crate::{
    models::path_map::{PathMap, PathMapArray, PathMapObject},
    utils::{is_reserved_key_name, SD_ALG_FIELD_NAME},
    CarriedDisclosure, DecodingError, DecodingResult, DisclosureByDigestTable, DisclosureData,
    Hasher, HashingAlgorithm, JsonObject, ELLIPSIS, SD, SHA_256_ALG_NAME,
};

/// The claims of an SD-JWT, reconstructed from the signed payload and the
/// disclosures carried alongside it.
pub(crate) struct DecodedClaims {
    /// The reconstructed claims, without any `_sd`, `_sd_alg` or `...` keys.
    pub(crate) claims: JsonObject,
    /// The hasher of the algorithm named in the `_sd_alg` claim.
    pub(crate) hasher: Box<dyn Hasher>,
    /// For every node revealed by a disclosure, the index of that disclosure
    /// in the carried list.
    pub(crate) disclosures_by_path: PathMapObject<usize>,
    /// How many digests were resolved to a disclosure.
    pub(crate) resolved_digests: usize,
}

/// Reconstructs the disclosed claims from the signed `claims` and the
/// serialized `disclosures` carried alongside them, following the procedure
/// described [here].
///
/// Digests for which no disclosure has been provided are legitimate and are
/// simply dropped, together with the `_sd` arrays and array element markers
/// that held them. Every provided disclosure must however be referenced by
/// some digest, or [`DecodingError::DisclosureNotProtectedByDigest`] is
/// returned. The same digest may appear more than once, and the same
/// disclosure may be provided more than once.
///
/// A disclosure referenced from an `_sd` array must be a field disclosure and
/// one referenced from a `...` marker must be an array element disclosure.
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1
pub(crate) fn decode_disclosed_claims(
    claims: &JsonObject,
    disclosures: &[String],
    get_hasher: impl Fn(HashingAlgorithm) -> Option<Box<dyn Hasher>>,
) -> DecodingResult<DecodedClaims> {
    let sd_alg = fetch_hashing_algorithm(claims)?;

    let hasher = get_hasher(sd_alg)
        .ok_or_else(|| Error::root(DecodingError::MissingHasher(sd_alg.to_string())))?;

    let carried = disclosures
        .iter()
        .map(|disclosure| CarriedDisclosure::parse(disclosure))
        .collect::<DecodingResult<Vec<_>>>()?;

    let mut state = DecoderState {
        disclosures_by_digest: DisclosureByDigestTable::new(&carried, &hasher),
        resolved_digests: 0,
    };

    let (claims, disclosures_by_path) = decode_object(claims, &mut state, true)?;

    if !state.disclosures_by_digest.all_used() {
        return Err(Error::root(DecodingError::DisclosureNotProtectedByDigest));
    }

    Ok(DecodedClaims {
        claims,
        hasher,
        disclosures_by_path,
        resolved_digests: state.resolved_digests,
    })
}

struct DecoderState<'dis> {
    disclosures_by_digest: DisclosureByDigestTable<'dis>,
    resolved_digests: usize,
}

impl<'dis> DecoderState<'dis> {
    /// Finds the disclosure matching the `digest`, if any was provided.
    fn resolve(
        &mut self,
        digest: &Value,
    ) -> DecodingResult<Option<(usize, &'dis CarriedDisclosure)>> {
        let digest = digest
            .as_str()
            .ok_or_else(|| Error::root(DecodingError::MalformedDigest(digest.to_string())))?;

        let resolved = self.disclosures_by_digest.lookup(digest);
        if resolved.is_some() {
            self.resolved_digests += 1;
        }

        Ok(resolved)
    }
}

/// Identifies the hashing algorithm used to generate the disclosure digests in the claims as described [here]
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-4.1.1
fn fetch_hashing_algorithm(claims: &JsonObject) -> DecodingResult<HashingAlgorithm> {
    let sd_alg_name = claims
        .get(SD_ALG_FIELD_NAME)
        .map_or(Some(SHA_256_ALG_NAME), |value| value.as_str())
        .ok_or_else(|| Error::root(DecodingError::ReservedKeyName(SD_ALG_FIELD_NAME)))?;

    HashingAlgorithm::from_str(sd_alg_name)
        .with_err(|| DecodingError::InvalidHashAlgorithmName(sd_alg_name.to_owned()))
}

fn decode_object(
    object: &JsonObject,
    state: &mut DecoderState<'_>,
    top_level: bool,
) -> DecodingResult<(JsonObject, PathMapObject<usize>)> {
    let mut decoded_object = JsonObject::new();
    let mut disclosures_by_path = PathMapObject::default();

    for (key, value) in object {
        if key == SD {
            continue;
        }
        // `_sd_alg` is only meaningful at the top level, where it gets removed
        if key == SD_ALG_FIELD_NAME && top_level {
            continue;
        }
        process_key_value(
            key,
            value,
            &mut decoded_object,
            state,
            &mut disclosures_by_path,
            None,
        )?;
    }

    let Some(sd) = object.get(SD) else {
        return Ok((decoded_object, disclosures_by_path));
    };
    let sd_array = sd
        .as_array()
        .ok_or_else(|| Error::root(DecodingError::MalformedDigest(sd.to_string())))?;

    for digest in sd_array {
        let Some((index, disclosure)) = state.resolve(digest)? else {
            // the holder did not disclose this claim
            continue;
        };

        let CarriedDisclosure::Valid(disclosure) = disclosure else {
            return Err(Error::root(DecodingError::InvalidFieldDisclosureLength));
        };
        let DisclosureData::KeyValue { key, value, .. } = &disclosure.data else {
            return Err(Error::root(DecodingError::InvalidFieldDisclosureLength));
        };

        process_key_value(
            key,
            value,
            &mut decoded_object,
            state,
            &mut disclosures_by_path,
            Some(index),
        )?;
    }

    Ok((decoded_object, disclosures_by_path))
}

/// Checks the `key`, recursively decodes the `value` and inserts the pair into
/// `object`, recording the disclosure which revealed it, if any.
///
/// Fails if the `key` is reserved, if the recursive decoding fails, or if the
/// `object` already contains the `key`.
fn process_key_value(
    key: &str,
    value: &Value,
    object: &mut JsonObject,
    state: &mut DecoderState<'_>,
    path_map: &mut PathMapObject<usize>,
    disclosure: Option<usize>,
) -> DecodingResult<()> {
    if let Some(reserved_key) = is_reserved_key_name(key) {
        return Err(Error::root(DecodingError::ReservedKeyName(reserved_key)));
    }

    let (decoded_value, mut child_map) = decode_value(value, state)?;

    if object.insert(key.to_owned(), decoded_value).is_some() {
        return Err(Error::root(DecodingError::DuplicateClaimName(
            key.to_owned(),
        )));
    }

    if let Some(disclosure) = disclosure {
        child_map.insert_value(disclosure);
    }

    // Prune empty leaves
    if !child_map.is_empty_leaf() {
        path_map.insert_key(key.to_owned(), child_map)?;
    }

    Ok(())
}

fn decode_array(
    array: &[Value],
    state: &mut DecoderState<'_>,
) -> DecodingResult<(Value, PathMapArray<usize>)> {
    let mut decoded_array = Vec::with_capacity(array.len());
    let mut disclosures_by_path = PathMapArray::default();

    for element in array {
        let (element, disclosure) = match resolve_array_element(element, state)? {
            ArrayElement::Plain(element) => (element, None),
            ArrayElement::Disclosed(element, index) => (element, Some(index)),
            ArrayElement::Undisclosed => continue,
        };

        let (element, mut child_map) = decode_value(element, state)?;

        if let Some(disclosure) = disclosure {
            child_map.insert_value(disclosure);
        }

        // Prune empty leaves
        if !child_map.is_empty_leaf() {
            disclosures_by_path.insert_element(decoded_array.len() as _, child_map);
        }

        decoded_array.push(element);
    }

    Ok((Value::Array(decoded_array), disclosures_by_path))
}

enum ArrayElement<'a> {
    Plain(&'a Value),
    Disclosed(&'a Value, usize),
    Undisclosed,
}

fn resolve_array_element<'a, 'dis: 'a>(
    element: &'a Value,
    state: &mut DecoderState<'dis>,
) -> DecodingResult<ArrayElement<'a>> {
    let Some(digest) = element.as_object().and_then(|object| object.get(ELLIPSIS)) else {
        return Ok(ArrayElement::Plain(element));
    };
    if element.as_object().map_or(0, JsonObject::len) != 1 {
        return Err(Error::root(DecodingError::MalformedDigest(
            element.to_string(),
        )));
    }

    let Some((index, disclosure)) = state.resolve(digest)? else {
        return Ok(ArrayElement::Undisclosed);
    };

    match disclosure {
        CarriedDisclosure::Valid(disclosure) => match &disclosure.data {
            DisclosureData::ArrayElement { value, .. } => Ok(ArrayElement::Disclosed(value, index)),
            DisclosureData::KeyValue { .. } => Err(Error::root(
                DecodingError::InvalidArrayElementDisclosureLength,
            )),
        },
        CarriedDisclosure::InvalidLength(_) => Err(Error::root(
            DecodingError::InvalidArrayElementDisclosureLength,
        )),
    }
}

fn decode_value(
    value: &Value,
    state: &mut DecoderState<'_>,
) -> DecodingResult<(Value, PathMap<usize>)> {
    match value {
        Value::Object(object) => {
            let (value, child_map) = decode_object(object, state, false)?;
            Ok((Value::Object(value), child_map.finish_subtree()))
        }
        Value::Array(array) => {
            let (value, child_map) = decode_array(array, state)?;
            Ok((value, child_map.finish_subtree()))
        }
        _ => Ok((value.to_owned(), PathMap::default())),
    }
}
