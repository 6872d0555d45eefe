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

//! Compact serialization of SD-JWTs and their presentations.

use bherror::Error;

use crate::error::FormatError;

pub(crate) const SD_JWT_DELIMITER: &str = "~";

/// An `SD-JWT`, composed of an Issuer-signed JWT and zero or more
/// Disclosures.
///
/// It can be parsed from, and serialized into, the Compact Serialization
/// format `<Issuer-signed JWT>~<Disclosure 1>~...~<Disclosure N>~`, where the
/// trailing `~` is mandatory.
///
/// No checks are carried out on any of the parts while parsing, e.g. there
/// is no check of the JWT signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdJwt {
    pub(crate) jwt: String,
    pub(crate) disclosures: Vec<String>,
}

impl SdJwt {
    pub(crate) fn new(jwt: String, disclosures: Vec<String>) -> Self {
        Self { jwt, disclosures }
    }

    /// The Issuer-signed JWT in the JWS Compact Serialization format.
    pub fn issuer_signed_jwt(&self) -> &str {
        &self.jwt
    }

    /// The serialized Disclosures, in the order they are carried.
    pub fn disclosures(&self) -> &[String] {
        &self.disclosures
    }
}

impl std::str::FromStr for SdJwt {
    type Err = bherror::Error<FormatError>;

    /// Parse an `SD-JWT` from the Compact Serialization format.
    ///
    /// See the [draft v13] for details.
    ///
    /// [draft v13]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#name-sd-jwt-and-sd-jwtkb-data-fo
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let SdJwtVP {
            sd_jwt,
            key_binding_jwt,
        } = value.parse()?;

        if key_binding_jwt.is_some() {
            return Err(Error::root(FormatError::InvalidSdJwtFormat));
        }

        Ok(sd_jwt)
    }
}

impl std::fmt::Display for SdJwt {
    /// Serialize the `SD-JWT` in the Compact Serialization format. The last
    /// separating tilde character is never omitted.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.jwt, SD_JWT_DELIMITER)?;

        for disclosure in &self.disclosures {
            write!(f, "{}{}", disclosure, SD_JWT_DELIMITER)?;
        }

        Ok(())
    }
}

/// An `SD-JWT` presentation, i.e. an [`SdJwt`] with the Disclosures chosen by
/// the holder, optionally followed by a Key Binding JWT (`KB-JWT`).
///
/// The Compact Serialization format is
/// `<Issuer-signed JWT>~<Disclosure 1>~...~<Disclosure N>~[<KB-JWT>]`. An
/// empty segment after the last `~` means that no `KB-JWT` is present.
///
/// Parsing only checks the framing. Use [`SdJwtVP::verify`] to verify the
/// presentation and obtain the disclosed claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdJwtVP {
    pub(crate) sd_jwt: SdJwt,
    pub(crate) key_binding_jwt: Option<String>,
}

impl SdJwtVP {
    pub(crate) fn new(sd_jwt: SdJwt, key_binding_jwt: Option<String>) -> Self {
        Self {
            sd_jwt,
            key_binding_jwt,
        }
    }

    /// The presented `SD-JWT`, i.e. the Issuer-signed JWT and the presented
    /// Disclosures.
    pub fn sd_jwt(&self) -> &SdJwt {
        &self.sd_jwt
    }

    /// The Key Binding JWT, if present.
    pub fn key_binding_jwt(&self) -> Option<&str> {
        self.key_binding_jwt.as_deref()
    }
}

impl std::str::FromStr for SdJwtVP {
    type Err = bherror::Error<FormatError>;

    /// Parse an `SD-JWT` presentation from the Compact Serialization format.
    ///
    /// The Issuer-signed JWT and every Disclosure must be non-empty, and at
    /// least one `~` must be present.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(SD_JWT_DELIMITER).collect();

        let Some((key_binding_jwt, sd_jwt_parts)) = parts.split_last() else {
            return Err(Error::root(FormatError::InvalidSdJwtFormat));
        };
        let Some((jwt, disclosures)) = sd_jwt_parts.split_first() else {
            return Err(Error::root(FormatError::InvalidSdJwtFormat));
        };

        if jwt.is_empty() || disclosures.iter().any(|disclosure| disclosure.is_empty()) {
            return Err(Error::root(FormatError::InvalidSdJwtFormat));
        }

        let sd_jwt = SdJwt::new(
            jwt.to_string(),
            disclosures.iter().map(|&s| s.to_owned()).collect(),
        );
        let key_binding_jwt = Some(key_binding_jwt)
            .filter(|kb| !kb.is_empty())
            .map(|kb| kb.to_string());

        Ok(Self::new(sd_jwt, key_binding_jwt))
    }
}

impl std::fmt::Display for SdJwtVP {
    /// Serialize the presentation in the Compact Serialization format.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sd_jwt)?;

        if let Some(key_binding_jwt) = &self.key_binding_jwt {
            write!(f, "{}", key_binding_jwt)?;
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const JWT: &str = "\
eyJhbGciOiAiRVMyNTYiLCAidHlwIjogImV4YW1wbGUrc2Qtand0In0.eyJfc2QiOiBb\
IkNyUWU3UzVrcUJBSHQtbk1ZWGdjNmJkdDJTSDVhVFkxc1VfTS1QZ2tqUEkiLCAiSnpZ\
akg0c3ZsaUgwUjNQeUVNZmVadTZKdDY5dTVxZWhabzdGN0VQWWxTRSIsICJQb3JGYnBL\
dVZ1Nnh5bUphZ3ZrRnNGWEFiUm9jMkpHbEFVQTJCQTRvN2NJIiwgIlRHZjRvTGJnd2Q1\
SlFhSHlLVlFaVTlVZEdFMHc1cnREc3JaemZVYW9tTG8iLCAiWFFfM2tQS3QxWHlYN0tB\
TmtxVlI2eVoyVmE1TnJQSXZQWWJ5TXZSS0JNTSIsICJYekZyendzY002R242Q0pEYzZ2\
Vks4QmtNbmZHOHZPU0tmcFBJWmRBZmRFIiwgImdiT3NJNEVkcTJ4Mkt3LXc1d1BFemFr\
b2I5aFYxY1JEMEFUTjNvUUw5Sk0iLCAianN1OXlWdWx3UVFsaEZsTV8zSmx6TWFTRnpn\
bGhRRzBEcGZheVF3TFVLNCJdLCAiaXNzIjogImh0dHBzOi8vaXNzdWVyLmV4YW1wbGUu\
Y29tIiwgImlhdCI6IDE2ODMwMDAwMDAsICJleHAiOiAxODgzMDAwMDAwLCAic3ViIjog\
InVzZXJfNDIiLCAibmF0aW9uYWxpdGllcyI6IFt7Ii4uLiI6ICJwRm5kamtaX1ZDem15\
VGE2VWpsWm8zZGgta284YUlLUWM5RGxHemhhVllvIn0sIHsiLi4uIjogIjdDZjZKa1B1\
ZHJ5M2xjYndIZ2VaOGtoQXYxVTFPU2xlclAwVmtCSnJXWjAifV0sICJfc2RfYWxnIjog\
InNoYS0yNTYiLCAiY25mIjogeyJqd2siOiB7Imt0eSI6ICJFQyIsICJjcnYiOiAiUC0y\
NTYiLCAieCI6ICJUQ0FFUjE5WnZ1M09IRjRqNFc0dmZTVm9ISVAxSUxpbERsczd2Q2VH\
ZW1jIiwgInkiOiAiWnhqaVdXYlpNUUdIVldLVlE0aGJTSWlyc1ZmdWVjQ0U2dDRqVDlG\
MkhaUSJ9fX0.7oEYwv1H4rBa54xAhDH19DEIy-RRSTdwyJvhbjOKVFyQeM0-gcgpwCq-\
yFCbWj9THEjD9M4yYkAeaWXfuvBS-Q";
    pub(crate) const DISCLOSURE_1: &str = "WyIyR0xDNDJzS1F2ZUNmR2ZyeU5STjl3IiwgImdpdmVuX25hbWUiLCAiSm9obiJd";
    pub(crate) const DISCLOSURE_2: &str = "WyJsa2x4RjVqTVlsR1RQVW92TU5JdkNBIiwgIlVTIl0";
    pub(crate) const KEY_BINDING_JWT: &str = "\
eyJhbGciOiAiRVMyNTYiLCAidHlwIjogImtiK2p3dCJ9.eyJub25jZSI6ICIxMjM0NTY\
3ODkwIiwgImF1ZCI6ICJodHRwczovL3ZlcmlmaWVyLmV4YW1wbGUub3JnIiwgImlhdCI\
6IDE3MDIzMTYwMTUsICJzZF9oYXNoIjogIm5ZY09YeVA0M3Y5c3pLcnluX2tfNEdrUnJ\
fajNTVEhoTlNTLWkxRHVhdW8ifQ.12Qymun2geGbkYOwiV-DUVfS-zBBKqNe83yNbxM4\
5J93bno-oM7mph3L1-rPa4lFKQ04wB-T9rU3uAZnBAan5g";

    #[test]
    fn test_from_str_without_disclosures_without_kb_jwt() {
        let presentation = format!("{JWT}~");

        let sd_jwt: SdJwt = presentation.parse().unwrap();
        assert!(sd_jwt.disclosures().is_empty());
        assert_eq!(sd_jwt.issuer_signed_jwt(), JWT);

        let sd_jwt_vp: SdJwtVP = presentation.parse().unwrap();
        assert_eq!(sd_jwt_vp.sd_jwt(), &sd_jwt);
        assert_eq!(sd_jwt_vp.key_binding_jwt(), None);
    }

    #[test]
    fn test_from_str_without_disclosures_with_kb_jwt() {
        let presentation = format!("{JWT}~{KEY_BINDING_JWT}");

        let sd_jwt_vp: SdJwtVP = presentation.parse().unwrap();

        assert!(sd_jwt_vp.sd_jwt().disclosures().is_empty());
        assert_eq!(sd_jwt_vp.sd_jwt().issuer_signed_jwt(), JWT);
        assert_eq!(sd_jwt_vp.key_binding_jwt(), Some(KEY_BINDING_JWT));

        // a presentation with a KB-JWT is not a plain SD-JWT
        let error: Result<SdJwt, Error<FormatError>> = presentation.parse();
        assert_eq!(error.unwrap_err().error, FormatError::InvalidSdJwtFormat);
    }

    #[test]
    fn test_from_str_with_disclosures_without_kb_jwt() {
        let presentation = format!("{JWT}~{DISCLOSURE_1}~{DISCLOSURE_2}~");

        let sd_jwt_vp: SdJwtVP = presentation.parse().unwrap();

        assert_eq!(sd_jwt_vp.sd_jwt().issuer_signed_jwt(), JWT);
        assert_eq!(
            sd_jwt_vp.sd_jwt().disclosures(),
            &[DISCLOSURE_1, DISCLOSURE_2]
        );
        assert_eq!(sd_jwt_vp.key_binding_jwt(), None);
    }

    #[test]
    fn test_from_str_with_disclosures_with_kb_jwt() {
        let presentation = format!("{JWT}~{DISCLOSURE_1}~{DISCLOSURE_2}~{KEY_BINDING_JWT}");

        let sd_jwt_vp: SdJwtVP = presentation.parse().unwrap();

        assert_eq!(sd_jwt_vp.sd_jwt().issuer_signed_jwt(), JWT);
        assert_eq!(
            sd_jwt_vp.sd_jwt().disclosures(),
            &[DISCLOSURE_1, DISCLOSURE_2]
        );
        assert_eq!(sd_jwt_vp.key_binding_jwt(), Some(KEY_BINDING_JWT));
    }

    #[test]
    fn test_from_str_invalid_format() {
        for invalid in [
            "",
            JWT,
            "~",
            &format!("~{DISCLOSURE_1}~"),
            &format!("{JWT}~~{DISCLOSURE_1}~"),
            &format!("{JWT}~{DISCLOSURE_1}~~{KEY_BINDING_JWT}"),
        ] {
            let error = invalid.parse::<SdJwtVP>().unwrap_err();
            assert_eq!(error.error, FormatError::InvalidSdJwtFormat, "{invalid}");

            let error = invalid.parse::<SdJwt>().unwrap_err();
            assert_eq!(error.error, FormatError::InvalidSdJwtFormat, "{invalid}");
        }
    }

    #[test]
    fn test_display_round_trips() {
        for presentation in [
            format!("{JWT}~"),
            format!("{JWT}~{KEY_BINDING_JWT}"),
            format!("{JWT}~{DISCLOSURE_1}~{DISCLOSURE_2}~"),
            format!("{JWT}~{DISCLOSURE_1}~{DISCLOSURE_2}~{KEY_BINDING_JWT}"),
        ] {
            let sd_jwt_vp: SdJwtVP = presentation.parse().unwrap();
            assert_eq!(sd_jwt_vp.to_string(), presentation);
        }
    }

    #[test]
    fn test_display_sd_jwt_keeps_trailing_delimiter() {
        let sd_jwt = SdJwt::new(
            JWT.to_owned(),
            vec![DISCLOSURE_1.to_owned(), DISCLOSURE_2.to_owned()],
        );
        assert_eq!(
            sd_jwt.to_string(),
            format!("{JWT}~{DISCLOSURE_1}~{DISCLOSURE_2}~")
        );

        let sd_jwt_vp = SdJwtVP::new(sd_jwt, Some(KEY_BINDING_JWT.to_owned()));
        assert_eq!(
            sd_jwt_vp.to_string(),
            format!("{JWT}~{DISCLOSURE_1}~{DISCLOSURE_2}~{KEY_BINDING_JWT}")
        );
    }
}
