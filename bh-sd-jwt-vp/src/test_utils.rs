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

use bh_jws_utils::Es256Signer;
use serde_json::Value;

use crate::{json_object, JsonObject, SecondsSinceEpoch};

/// The `iat` claim of [`dummy_claims`].
pub(crate) const ISSUED_AT: SecondsSinceEpoch = 1_700_000_000;

/// A point in time shortly after [`ISSUED_AT`].
pub(crate) const NOW: SecondsSinceEpoch = ISSUED_AT + 60;

pub(crate) const DUMMY_NONCE: &str = "1234567890";

pub(crate) fn issuer_signer() -> Es256Signer {
    Es256Signer::generate("issuer-key".to_owned()).unwrap()
}

pub(crate) fn holder_signer() -> Es256Signer {
    Es256Signer::generate("holder-key".to_owned()).unwrap()
}

pub(crate) fn dummy_key_binding_audience() -> String {
    "https://verifier.example.org".into()
}

pub(crate) fn dummy_claims() -> JsonObject {
    json_object!({
        "iss": "https://issuer.example.com",
        "iat": ISSUED_AT,
        "sub": "user_42",
        "given_name": "John",
        "family_name": "Doe",
        "address": {
            "street_address": "123 Main St",
            "locality": "Anytown",
            "country": "US"
        },
        "nationalities": ["US", "DE"],
        "birthdate": "1940-01-01",
        "email_verified": Value::Null,
    })
}
