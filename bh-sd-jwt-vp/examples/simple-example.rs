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

use bh_jws_utils::{Es256Signer, Es256Verifier};
use bh_sd_jwt_vp::{
    holder::Holder,
    issuer::Issuer,
    json_object,
    verifier::Verifier,
    DisplayWrapper, IssuerSignedJwtVerificationOpts, JsonNodePath,
    JsonNodePathSegment::{Index as I, Key as K},
    SdJwtVP, Sha256,
};

/// Current time in seconds from the UNIX epoch.
const CURRENT_TIME: u64 = 100;

/// The claims that are set to be selectively discloseable by the issuer.
const DISCLOSEABLE_CLAIMS: &[&JsonNodePath] = &[
    &[K("given_name")],
    &[K("address")],
    &[K("address"), K("street_address")],
    &[K("address"), K("locality")],
    &[K("address"), K("postal_code")],
    &[K("address"), K("country")],
    &[K("nationalities")],
    &[K("nationalities"), I(0)],
    &[K("nationalities"), I(1)],
    &[K("nationalities"), I(2)],
];

/// The claims requested by the verifier.
const REQUESTED_CLAIMS: &[&JsonNodePath] = &[
    &[K("address"), K("postal_code")],
    &[K("nationalities"), I(1)],
];

fn main() {
    // the actual issued claims
    let claims = json_object!({
        "iss": "https://example.com/issuer",
        "iat": CURRENT_TIME,
        "given_name": "John",
        "address": {
            "street_address": "Street 17",
            "locality": "New York",
            "postal_code": "07008",
            "country": "US"
        },
        "nationalities": [
            "US", "DE", "RH"
        ],
    });

    // used to sign the issued credential
    let issuer_signer = Es256Signer::generate("issuer_kid".to_owned()).unwrap();

    // used by holder to create a cryptographic key binding
    let holder_signer = Es256Signer::generate("holder_kid".to_owned()).unwrap();

    // the SD-JWT Issuer
    let issuer = Issuer::new(Sha256).with_typ("example+sd-jwt");

    let mut rng = rand::thread_rng();

    // issue the given credential
    let issued_sd_jwt = issuer
        .issue(
            &claims,
            DISCLOSEABLE_CLAIMS,
            Some(holder_signer.public_jwk().unwrap()),
            &issuer_signer,
            &mut rng,
        )
        .unwrap()
        .to_string();

    // both the holder and the verifier check the issuer's signature
    let issuer_opts = IssuerSignedJwtVerificationOpts::builder()
        .verifier(&Es256Verifier)
        .public_key(issuer_signer.public_jwk().unwrap())
        .build()
        .unwrap();

    // the SD-JWT Holder
    // accept the issued credential on the holder (wallet) side
    let holder = Holder::new(&issued_sd_jwt, &issuer_opts, CURRENT_TIME + 10).unwrap();

    println!(
        "Issued Credential:\n{}",
        serde_json::to_string_pretty(holder.claims()).unwrap(),
    );

    // the SD-JWT Verifier
    let verifier = Verifier::new("target_audience".to_owned(), &mut rng).unwrap();

    println!("\nRequested Claims: [");
    for claim in REQUESTED_CLAIMS {
        println!("  {}", DisplayWrapper(*claim))
    }
    println!("]");

    // create a verifiable presentation of the credential
    // only the [`REQUESTED_CLAIMS`] are disclosed
    let presentation = holder
        .present_with_key_binding(
            REQUESTED_CLAIMS,
            verifier.key_binding_challenge().to_owned(),
            CURRENT_TIME + 20,
            &holder_signer,
        )
        .unwrap()
        .to_string();

    println!("\nPresentation:\n{presentation}");

    // verify the presented credential
    let presentation: SdJwtVP = presentation.parse().unwrap();
    let verified = verifier
        .verify(
            &presentation,
            &issuer_opts,
            &Es256Verifier,
            CURRENT_TIME + 30,
        )
        .unwrap();

    println!(
        "\nVerified Claims:\n{}",
        serde_json::to_string_pretty(verified.claims()).unwrap()
    );
}
