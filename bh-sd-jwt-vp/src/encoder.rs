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

use std::collections::BTreeMap;

use bherror::{traits::ErrorContext as _, Error};
use rand_core::CryptoRngCore;
use serde_json::{json, Value};

use crate::{
    issuer::IssuerError,
    models::generate_salt,
    utils::{check_claim_names_object, is_reserved_key_name},
    Disclosure, DisplayWrapper, Hasher, JsonNodePath, JsonNodePathSegment, JsonObject, Salt,
    ELLIPSIS, SD,
};

type Result<T> = bherror::Result<T, IssuerError>;

/// Copies the `claims`, hiding the values at `disclosure_paths` behind the
/// digests of freshly created disclosures, as described [here].
///
/// Returns the redacted claims together with the created disclosures. The
/// disclosures of nested values come before the disclosures of their
/// ancestors.
///
/// # Errors
/// Encoding will fail if:
/// - `claims` contains [RESERVED_CLAIM_NAMES](crate::RESERVED_CLAIM_NAMES)
/// - `disclosure_paths` contains duplicate paths
/// - `disclosure_paths` contains reserved claim names
/// - `disclosure_paths` contains a path that does not exist in `claims`
/// - `disclosure_paths` contains an empty path
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#name-disclosures
pub(crate) fn encode_claims<H: Hasher>(
    claims: &JsonObject,
    disclosure_paths: &[&JsonNodePath],
    hasher: &H,
    rng: &mut impl CryptoRngCore,
) -> Result<(JsonObject, Vec<Disclosure>)> {
    encode_claims_with_salts(claims, disclosure_paths, hasher, &mut || generate_salt(rng))
}

fn encode_claims_with_salts<H: Hasher>(
    claims: &JsonObject,
    disclosure_paths: &[&JsonNodePath],
    hasher: &H,
    next_salt: &mut dyn FnMut() -> Salt,
) -> Result<(JsonObject, Vec<Disclosure>)> {
    if let Some(name) = check_claim_names_object(claims, &is_reserved_key_name, true) {
        return Err(Error::root(IssuerError::ReservedOrRegisteredClaimName(
            name,
        )));
    }

    let selection = Selection::from_paths(disclosure_paths)?;

    let mut encoder = Encoder {
        hasher,
        next_salt,
        disclosures: vec![],
    };
    let redacted = encoder.encode_object(claims, selection)?;

    Ok((redacted, encoder.disclosures))
}

/// The selected paths, arranged as a tree mirroring the claims.
#[derive(Default)]
struct Selection<'p> {
    /// The path selecting this very node, if any.
    selected: Option<&'p JsonNodePath<'p>>,
    keys: BTreeMap<&'p str, Selection<'p>>,
    indices: BTreeMap<u32, Selection<'p>>,
}

impl<'p> Selection<'p> {
    fn from_paths(paths: &[&'p JsonNodePath<'p>]) -> Result<Self> {
        let mut root = Selection::default();

        for &path in paths {
            check_reserved_keys_in_path(path)?;

            // The root object has no parent to hold its digest.
            if path.is_empty() {
                return Err(Error::root(IssuerError::InvalidPath(
                    DisplayWrapper(path).to_string(),
                )));
            }

            let mut node = &mut root;
            for segment in path {
                node = match segment {
                    JsonNodePathSegment::Key(key) => node.keys.entry(*key).or_default(),
                    JsonNodePathSegment::Index(index) => node.indices.entry(*index).or_default(),
                };
            }

            if node.selected.replace(path).is_some() {
                return Err(Error::root(IssuerError::DuplicatePath(
                    DisplayWrapper(path).to_string(),
                )));
            }
        }

        Ok(root)
    }

    fn has_descendants(&self) -> bool {
        !self.keys.is_empty() || !self.indices.is_empty()
    }

    /// Renders one of the paths selecting this node or its descendants.
    fn any_path(&self) -> String {
        if let Some(path) = self.selected {
            return DisplayWrapper(path).to_string();
        }

        self.keys
            .values()
            .chain(self.indices.values())
            .next()
            .map_or_else(|| "$".to_owned(), Selection::any_path)
    }
}

struct Encoder<'a, H> {
    hasher: &'a H,
    next_salt: &'a mut dyn FnMut() -> Salt,
    disclosures: Vec<Disclosure>,
}

impl<H: Hasher> Encoder<'_, H> {
    /// See [here](https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#name-disclosures-for-object-prop).
    fn encode_object(&mut self, object: &JsonObject, selection: Selection) -> Result<JsonObject> {
        let Selection {
            mut keys, indices, ..
        } = selection;

        if let Some(child) = indices.values().next() {
            return Err(Error::root(IssuerError::InvalidPath(child.any_path())))
                .ctx(|| "array index used on an object");
        }

        let mut encoded = JsonObject::new();
        let mut digests = vec![];

        for (key, value) in object {
            let Some(child) = keys.remove(key.as_str()) else {
                encoded.insert(key.clone(), value.clone());
                continue;
            };

            let selected = child.selected.is_some();
            let value = self.encode_value(value, child)?;

            if selected {
                let disclosure = Disclosure::new((self.next_salt)(), Some(key.clone()), value);
                digests.push(disclosure.digest(self.hasher));
                self.disclosures.push(disclosure);
            } else {
                encoded.insert(key.clone(), value);
            }
        }

        if let Some(child) = keys.values().next() {
            return Err(Error::root(IssuerError::NonExistentPath(child.any_path())));
        }

        if !digests.is_empty() {
            // Sorting hides the original order of the claims.
            digests.sort_unstable();
            encoded.insert(SD.to_owned(), digests.into());
        }

        Ok(encoded)
    }

    /// See [here](https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#name-disclosures-for-array-eleme).
    fn encode_array(&mut self, array: &[Value], selection: Selection) -> Result<Vec<Value>> {
        let Selection {
            keys, mut indices, ..
        } = selection;

        if let Some(child) = keys.values().next() {
            return Err(Error::root(IssuerError::InvalidPath(child.any_path())))
                .ctx(|| "object key used on an array");
        }

        let mut encoded = Vec::with_capacity(array.len());

        for (index, value) in array.iter().enumerate() {
            let child = u32::try_from(index)
                .ok()
                .and_then(|index| indices.remove(&index));
            let Some(child) = child else {
                encoded.push(value.clone());
                continue;
            };

            let selected = child.selected.is_some();
            let value = self.encode_value(value, child)?;

            if selected {
                let disclosure = Disclosure::new((self.next_salt)(), None, value);
                encoded.push(json!({ ELLIPSIS: disclosure.digest(self.hasher) }));
                self.disclosures.push(disclosure);
            } else {
                encoded.push(value);
            }
        }

        if let Some(child) = indices.values().next() {
            return Err(Error::root(IssuerError::NonExistentPath(child.any_path())));
        }

        Ok(encoded)
    }

    fn encode_value(&mut self, value: &Value, selection: Selection) -> Result<Value> {
        if !selection.has_descendants() {
            return Ok(value.clone());
        }

        match value {
            Value::Object(object) => self.encode_object(object, selection).map(Value::Object),
            Value::Array(array) => self.encode_array(array, selection).map(Value::Array),
            _ => Err(Error::root(IssuerError::InvalidPath(selection.any_path())))
                .ctx(|| "path continues past a scalar value"),
        }
    }
}

fn check_reserved_keys_in_path(path: &JsonNodePath) -> Result<()> {
    for segment in path {
        if let JsonNodePathSegment::Key(key) = segment {
            if let Some(key) = is_reserved_key_name(key) {
                return Err(Error::root(IssuerError::ReservedOrRegisteredClaimName(key)))
                    .ctx(|| format!("invalid path {0}", DisplayWrapper(path)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;
    use crate::{decoder::decode_disclosed_claims, default_hasher_factory, json_object, Sha256};

    fn encode_with_salts(
        claims: &JsonObject,
        paths: &[&JsonNodePath],
        salts: &[&str],
    ) -> Result<(JsonObject, Vec<Disclosure>)> {
        let mut salts = salts.iter();
        encode_claims_with_salts(claims, paths, &Sha256, &mut || {
            salts.next().expect("not enough salts").to_string()
        })
    }

    fn encode_err(claims: &JsonObject, paths: &[&JsonNodePath]) -> IssuerError {
        encode_claims(claims, paths, &Sha256, &mut rand::thread_rng())
            .unwrap_err()
            .error
    }

    fn address() -> JsonObject {
        json_object!({
            "address": {
                "street_address": "Schulstr. 12",
                "locality": "Schulpforta",
                "region": "Sachsen-Anhalt",
                "country": "DE"
            }
        })
    }

    const ADDRESS_SALTS: [&str; 4] = [
        "2GLC42sKQveCfGfryNRN9w",
        "eluV5Og3gSNII8EYnsxA_A",
        "6Ij7tM-a5iVPGboS5tmvVA",
        "eI8ZWm9QnKPpNPeNenHdhQ",
    ];

    const ADDRESS_DIGESTS_SORTED: [&str; 4] = [
        "6vh9bq-zS4GKM_7GpggVbYzzu6oOGXrmNVGPHP75Ud0",
        "9gjVuXtdFROCgRrtNcGUXmF65rdezi_6Er_j76kmYyM",
        "KURDPh4ZC19-3tiz-Df39V8eidy1oV3a3H1Da2N0g88",
        "WN9r9dCBJ8HTCsS2jKASxTjEyW5m5x65_Z_2ro2jfXM",
    ];

    /// Example taken from [here](https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#name-example-structured-sd-jwt).
    #[test]
    fn test_encode_structured() {
        let paths: &[&JsonNodePath] = &[
            crate::path!["address", "street_address"],
            crate::path!["address", "locality"],
            crate::path!["address", "region"],
            crate::path!["address", "country"],
        ];

        let (redacted, disclosures) = encode_with_salts(&address(), paths, &ADDRESS_SALTS).unwrap();

        assert_eq!(
            redacted,
            json_object!({ "address": { "_sd": ADDRESS_DIGESTS_SORTED } })
        );
        assert_eq!(disclosures.len(), 4);
        assert_eq!(
            disclosures[0].as_str(),
            "WyIyR0xDNDJzS1F2ZUNmR2ZyeU5STjl3IiwgInN0cmVldF9hZGRyZXNzIiwgIlNjaHVsc3RyLiAxMiJd"
        );
        assert_eq!(disclosures[3].claim_name(), Some("country"));
    }

    #[test]
    fn test_encode_recursive() {
        let paths: &[&JsonNodePath] = &[
            crate::path!["address"],
            crate::path!["address", "street_address"],
            crate::path!["address", "locality"],
            crate::path!["address", "region"],
            crate::path!["address", "country"],
        ];
        let mut salts = ADDRESS_SALTS.to_vec();
        salts.push("Qg_O64zqAxe412a108iroA");

        let (redacted, disclosures) = encode_with_salts(&address(), paths, &salts).unwrap();

        assert_eq!(
            redacted,
            json_object!({ "_sd": ["Lm2F77K3FXM8LCcGe_QrouG1qVKKqpNHTOcetyWUKaI"] })
        );

        // the enclosing disclosure comes last and carries the nested digests
        let address = disclosures.last().unwrap();
        assert_eq!(address.claim_name(), Some("address"));
        assert_eq!(address.value(), &json!({ "_sd": ADDRESS_DIGESTS_SORTED }));
    }

    #[test]
    fn test_encode_array_elements() {
        let claims = json_object!({
            "nationalities": ["DE", "FR"],
            "sub": "user_42"
        });

        let (redacted, disclosures) = encode_with_salts(
            &claims,
            &[crate::path!["nationalities", 1]],
            &["lklxF5jMYlGTPUovMNIvCA"],
        )
        .unwrap();

        assert_eq!(
            redacted,
            json_object!({
                "nationalities": [
                    "DE",
                    { "...": "w0I8EKcdCtUPkGCNUrfwVp2xEgNjtoIDlOxc9-PlOhs" }
                ],
                "sub": "user_42"
            })
        );
        assert_eq!(
            disclosures[0].as_str(),
            "WyJsa2x4RjVqTVlsR1RQVW92TU5JdkNBIiwgIkZSIl0"
        );
        assert_eq!(disclosures[0].claim_name(), None);
    }

    #[test]
    fn test_encode_leaves_input_untouched() {
        let claims = address();

        encode_claims(
            &claims,
            &[crate::path!["address", "region"]],
            &Sha256,
            &mut rand::thread_rng(),
        )
        .unwrap();

        assert_eq!(claims, address());
    }

    #[test]
    fn test_encode_then_decode_restores_claims() {
        let claims = json_object!({
            "sub": "user_42",
            "address": {
                "street_address": "123 Main St",
                "country": "US"
            },
            "nationalities": ["US", "DE", {"code": "FR", "since": 2003}],
            "matrix": [[1, 2], [3, 4]]
        });
        let paths: &[&JsonNodePath] = &[
            crate::path!["sub"],
            crate::path!["address"],
            crate::path!["address", "country"],
            crate::path!["nationalities", 0],
            crate::path!["nationalities", 2],
            crate::path!["nationalities", 2, "code"],
            crate::path!["matrix", 1, 0],
        ];

        let (redacted, disclosures) =
            encode_claims(&claims, paths, &Sha256, &mut rand::thread_rng()).unwrap();
        assert_eq!(disclosures.len(), paths.len());
        assert!(!redacted.contains_key("sub"));
        assert!(!redacted.contains_key("address"));

        let disclosures: Vec<String> = disclosures
            .into_iter()
            .map(Disclosure::into_string)
            .collect();
        let decoded = decode_disclosed_claims(&redacted, &disclosures, default_hasher_factory)
            .unwrap();

        assert_eq!(decoded.claims, claims);
    }

    #[test]
    fn test_encode_without_paths_copies_claims() {
        let (redacted, disclosures) =
            encode_claims(&address(), &[], &Sha256, &mut rand::thread_rng()).unwrap();

        assert_eq!(redacted, address());
        assert!(disclosures.is_empty());
    }

    #[test]
    fn test_encode_rejects_reserved_claims() {
        for claims in [
            json_object!({ "_sd": [] }),
            json_object!({ "a": { "...": "b" } }),
            json_object!({ "a": [{ "_sd_alg": "sha-256" }] }),
        ] {
            assert!(matches!(
                encode_err(&claims, &[]),
                IssuerError::ReservedOrRegisteredClaimName(_)
            ));
        }

        assert_eq!(
            encode_err(&address(), &[crate::path!["address", "_sd"]]),
            IssuerError::ReservedOrRegisteredClaimName("_sd")
        );
    }

    #[test]
    fn test_encode_rejects_invalid_paths() {
        let claims = json_object!({
            "address": { "country": "DE" },
            "nationalities": ["DE"]
        });

        assert_eq!(
            encode_err(&claims, &[crate::path![]]),
            IssuerError::InvalidPath("$".to_owned())
        );
        assert_eq!(
            encode_err(&claims, &[crate::path![0]]),
            IssuerError::InvalidPath("$[0]".to_owned())
        );
        assert_eq!(
            encode_err(&claims, &[crate::path!["address", 0]]),
            IssuerError::InvalidPath("$.address[0]".to_owned())
        );
        assert_eq!(
            encode_err(&claims, &[crate::path!["nationalities", "code"]]),
            IssuerError::InvalidPath("$.nationalities.code".to_owned())
        );
        assert_eq!(
            encode_err(&claims, &[crate::path!["address", "country", "code"]]),
            IssuerError::InvalidPath("$.address.country.code".to_owned())
        );
    }

    #[test]
    fn test_encode_rejects_non_existent_paths() {
        let claims = json_object!({
            "address": { "country": "DE" },
            "nationalities": ["DE"]
        });

        assert_eq!(
            encode_err(&claims, &[crate::path!["name"]]),
            IssuerError::NonExistentPath("$.name".to_owned())
        );
        assert_eq!(
            encode_err(&claims, &[crate::path!["address", "region"]]),
            IssuerError::NonExistentPath("$.address.region".to_owned())
        );
        assert_eq!(
            encode_err(&claims, &[crate::path!["nationalities", 1]]),
            IssuerError::NonExistentPath("$.nationalities[1]".to_owned())
        );
    }

    #[test]
    fn test_encode_rejects_duplicate_paths() {
        assert_eq!(
            encode_err(
                &address(),
                &[
                    crate::path!["address", "country"],
                    crate::path!["address"],
                    crate::path!["address", "country"],
                ]
            ),
            IssuerError::DuplicatePath("$.address.country".to_owned())
        );
    }
}
