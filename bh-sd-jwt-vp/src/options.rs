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

//! Options controlling the verification of SD-JWT presentations, see
//! [`SdJwtVP::verify`](crate::SdJwtVP::verify).

use bh_jws_utils::{JwkPublic, SignatureVerifier};
use bherror::Error;

use crate::{default_hasher_factory, error::InputError, HasherFactory, Result};

/// Options for verifying the Issuer-signed JWT of a presentation.
///
/// Construct it with [`IssuerSignedJwtVerificationOpts::builder`].
pub struct IssuerSignedJwtVerificationOpts<'a> {
    pub(crate) verifier: &'a dyn SignatureVerifier,
    pub(crate) public_key: JwkPublic,
    pub(crate) validate_issued_at_claim: bool,
    pub(crate) validate_not_before_claim: bool,
    pub(crate) hasher_factory: HasherFactory,
}

impl<'a> IssuerSignedJwtVerificationOpts<'a> {
    /// Creates a builder with every check enabled.
    pub fn builder() -> IssuerSignedJwtVerificationOptsBuilder<'a> {
        IssuerSignedJwtVerificationOptsBuilder::default()
    }

    /// Whether the `iat` claim is required and checked not to be in the
    /// future.
    pub fn validate_issued_at_claim(&self) -> bool {
        self.validate_issued_at_claim
    }

    /// Whether the `nbf` claim, if present, is checked not to be in the
    /// future.
    pub fn validate_not_before_claim(&self) -> bool {
        self.validate_not_before_claim
    }
}

/// Builder of [`IssuerSignedJwtVerificationOpts`].
pub struct IssuerSignedJwtVerificationOptsBuilder<'a> {
    verifier: Option<&'a dyn SignatureVerifier>,
    public_key: Option<JwkPublic>,
    validate_issued_at_claim: bool,
    validate_not_before_claim: bool,
    hasher_factory: HasherFactory,
}

impl Default for IssuerSignedJwtVerificationOptsBuilder<'_> {
    fn default() -> Self {
        Self {
            verifier: None,
            public_key: None,
            validate_issued_at_claim: true,
            validate_not_before_claim: true,
            hasher_factory: default_hasher_factory,
        }
    }
}

impl<'a> IssuerSignedJwtVerificationOptsBuilder<'a> {
    /// The verifier of the Issuer's signature. Required.
    pub fn verifier(mut self, verifier: &'a dyn SignatureVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// The public key of the Issuer. Required.
    pub fn public_key(mut self, public_key: JwkPublic) -> Self {
        self.public_key = Some(public_key);
        self
    }

    /// Enables or disables the `iat` claim check. Enabled by default.
    pub fn validate_issued_at_claim(mut self, validate: bool) -> Self {
        self.validate_issued_at_claim = validate;
        self
    }

    /// Enables or disables the `nbf` claim check. Enabled by default.
    pub fn validate_not_before_claim(mut self, validate: bool) -> Self {
        self.validate_not_before_claim = validate;
        self
    }

    /// Selects the [`Hasher`](crate::Hasher) for the `_sd_alg` claim. Defaults
    /// to [`default_hasher_factory`].
    pub fn hasher_factory(mut self, hasher_factory: HasherFactory) -> Self {
        self.hasher_factory = hasher_factory;
        self
    }

    /// Builds the options, failing if a required field is missing.
    pub fn build(self) -> Result<IssuerSignedJwtVerificationOpts<'a>, InputError> {
        let verifier = self
            .verifier
            .ok_or_else(|| Error::root(InputError::MissingRequiredField("verifier")))?;
        let public_key = self
            .public_key
            .ok_or_else(|| Error::root(InputError::MissingRequiredField("public_key")))?;

        Ok(IssuerSignedJwtVerificationOpts {
            verifier,
            public_key,
            validate_issued_at_claim: self.validate_issued_at_claim,
            validate_not_before_claim: self.validate_not_before_claim,
            hasher_factory: self.hasher_factory,
        })
    }
}

/// Options for verifying the Key Binding JWT of a presentation.
///
/// Construct it with [`KeyBindingJwtVerificationOpts::builder`].
pub struct KeyBindingJwtVerificationOpts<'a> {
    pub(crate) key_binding_required: bool,
    pub(crate) nonce: Option<String>,
    pub(crate) aud: Option<String>,
    pub(crate) verifier: Option<&'a dyn SignatureVerifier>,
    pub(crate) validate_expiration_claim: bool,
    pub(crate) validate_not_before_claim: bool,
}

impl<'a> KeyBindingJwtVerificationOpts<'a> {
    /// Creates a builder requiring key binding, with every check enabled.
    pub fn builder() -> KeyBindingJwtVerificationOptsBuilder<'a> {
        KeyBindingJwtVerificationOptsBuilder::default()
    }

    /// Whether a presentation without a Key Binding JWT is rejected.
    pub fn key_binding_required(&self) -> bool {
        self.key_binding_required
    }

    /// The expected `nonce` claim.
    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    /// The expected `aud` claim.
    pub fn aud(&self) -> Option<&str> {
        self.aud.as_deref()
    }

    /// Whether the `exp` claim is required and checked to be in the future.
    pub fn validate_expiration_claim(&self) -> bool {
        self.validate_expiration_claim
    }

    /// Whether the `nbf` claim, if present, is checked not to be in the
    /// future.
    pub fn validate_not_before_claim(&self) -> bool {
        self.validate_not_before_claim
    }
}

/// Builder of [`KeyBindingJwtVerificationOpts`].
pub struct KeyBindingJwtVerificationOptsBuilder<'a> {
    key_binding_required: bool,
    nonce: Option<String>,
    aud: Option<String>,
    verifier: Option<&'a dyn SignatureVerifier>,
    validate_expiration_claim: bool,
    validate_not_before_claim: bool,
}

impl Default for KeyBindingJwtVerificationOptsBuilder<'_> {
    fn default() -> Self {
        Self {
            key_binding_required: true,
            nonce: None,
            aud: None,
            verifier: None,
            validate_expiration_claim: true,
            validate_not_before_claim: true,
        }
    }
}

impl<'a> KeyBindingJwtVerificationOptsBuilder<'a> {
    /// Whether a presentation without a Key Binding JWT is rejected. Defaults
    /// to `true`.
    pub fn key_binding_required(mut self, required: bool) -> Self {
        self.key_binding_required = required;
        self
    }

    /// The `nonce` the Verifier sent to the Holder. Required if key binding
    /// is required.
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// The identifier of the Verifier, expected in the `aud` claim. Required
    /// if key binding is required.
    pub fn aud(mut self, aud: impl Into<String>) -> Self {
        self.aud = Some(aud.into());
        self
    }

    /// The verifier of the Holder's signature. Required if key binding is
    /// required.
    pub fn verifier(mut self, verifier: &'a dyn SignatureVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Enables or disables the `exp` claim check. Enabled by default.
    pub fn validate_expiration_claim(mut self, validate: bool) -> Self {
        self.validate_expiration_claim = validate;
        self
    }

    /// Enables or disables the `nbf` claim check. Enabled by default.
    pub fn validate_not_before_claim(mut self, validate: bool) -> Self {
        self.validate_not_before_claim = validate;
        self
    }

    /// Builds the options, failing if a required field is missing.
    pub fn build(self) -> Result<KeyBindingJwtVerificationOpts<'a>, InputError> {
        if self.key_binding_required {
            if self.nonce.is_none() {
                return Err(Error::root(InputError::MissingRequiredField("nonce")));
            }
            if self.aud.is_none() {
                return Err(Error::root(InputError::MissingRequiredField("aud")));
            }
            if self.verifier.is_none() {
                return Err(Error::root(InputError::MissingRequiredField("verifier")));
            }
        }

        Ok(KeyBindingJwtVerificationOpts {
            key_binding_required: self.key_binding_required,
            nonce: self.nonce,
            aud: self.aud,
            verifier: self.verifier,
            validate_expiration_claim: self.validate_expiration_claim,
            validate_not_before_claim: self.validate_not_before_claim,
        })
    }
}
