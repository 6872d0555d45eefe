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

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! This crate implements Selective Disclosure JSON Web Tokens and the
//! verification of their presentations.
//!
//! It provides functionality to issue JWTs whose claims can be selectively
//! disclosed, to present a chosen subset of them with an optional Key Binding
//! JWT, and to verify such presentations, in accordance with the IETF draft
//! [Selective Disclosure for JWTs (SD-JWT)][1].
//!
//! [1]: <https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt>
//!
//! # Details
//!
//! The main components of this crate are the following.
//!
//! * [`Disclosure`] -- The salted claim (or array element) revealed by a holder,
//!   and its digest.
//! * [`issuer`] -- Hides the selected claims behind digests and signs the
//!   Issuer-signed JWT.
//! * [`holder`] -- Imports an issued SD-JWT and presents selected claims, with
//!   or without key binding.
//! * [`SdJwtVP::verify`] -- Verifies a presentation: the Issuer-signed JWT, the
//!   disclosures and the Key Binding JWT, configured by
//!   [`IssuerSignedJwtVerificationOpts`] and [`KeyBindingJwtVerificationOpts`].
//! * [`verifier`] -- A presentation exchange session requiring key binding
//!   against a freshly generated nonce.
//!
//! # Examples
//!
//! The crate contains [a full example][example] of the issue, present and
//! verify flow.
//!
//! [example]: <https://github.com/blockhousetech/eudi-rust-core/tree/main/bh-sd-jwt-vp/examples>

// Re-export the `bh-jws-utils` crate
pub use bh_jws_utils;
pub use error::{
    FormatError, InputError, Result, SignatureError, TimeClaimError, VerificationError,
};

mod error;
mod key_binding;
mod models;
mod options;
mod presentation;
mod sd_jwt;
#[cfg(test)]
mod test_utils;
mod traits;
mod utils;

mod decoder;
mod encoder;
pub mod holder;
pub mod issuer;
pub mod verifier;

pub use issuer::IssuerJwtHeader;
pub use key_binding::KeyBindingChallenge;
pub use models::*;
pub use options::*;
pub use presentation::VerifiedSdJwt;
pub use sd_jwt::{SdJwt, SdJwtVP};
pub use traits::*;
pub use utils::base64_url_digest;
