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

use crate::{Hasher, HashingAlgorithm};

/// A [`Hasher`] implementation for the `SHA-256` hash function.
#[derive(Debug, Default, Copy, Clone)]
pub struct Sha256;

impl Hasher for Sha256 {
    fn algorithm(&self) -> HashingAlgorithm {
        HashingAlgorithm::Sha256
    }

    fn digest(&self, input: &[u8]) -> Vec<u8> {
        openssl::sha::sha256(input).to_vec()
    }
}

/// A [`Hasher`] implementation for the `SHA-384` hash function.
#[derive(Debug, Default, Copy, Clone)]
pub struct Sha384;

impl Hasher for Sha384 {
    fn algorithm(&self) -> HashingAlgorithm {
        HashingAlgorithm::Sha384
    }

    fn digest(&self, input: &[u8]) -> Vec<u8> {
        openssl::sha::sha384(input).to_vec()
    }
}

/// A [`Hasher`] implementation for the `SHA-512` hash function.
#[derive(Debug, Default, Copy, Clone)]
pub struct Sha512;

impl Hasher for Sha512 {
    fn algorithm(&self) -> HashingAlgorithm {
        HashingAlgorithm::Sha512
    }

    fn digest(&self, input: &[u8]) -> Vec<u8> {
        openssl::sha::sha512(input).to_vec()
    }
}

/// The [`HasherFactory`](crate::HasherFactory) backed by the OpenSSL
/// implementations of this crate, supporting every [`HashingAlgorithm`].
pub fn default_hasher_factory(alg: HashingAlgorithm) -> Option<Box<dyn Hasher>> {
    match alg {
        HashingAlgorithm::Sha256 => Some(Box::new(Sha256)),
        HashingAlgorithm::Sha384 => Some(Box::new(Sha384)),
        HashingAlgorithm::Sha512 => Some(Box::new(Sha512)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_test_vectors() {
        assert_eq!(Sha256.algorithm(), HashingAlgorithm::Sha256);
        assert_eq!(
            &hex::encode(Sha256.digest(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            &hex::encode(Sha256.digest(b"Some test content")),
            "0a8d48be37831ed288c5d2d0c2eb7d359c4732c34f0a7c8f9bd0797dc5459029"
        );
    }

    #[test]
    fn sha384_test_vectors() {
        assert_eq!(Sha384.algorithm(), HashingAlgorithm::Sha384);
        assert_eq!(
            &hex::encode(Sha384.digest(b"")),
            "38b060a751ac96384cd9327eb1b1e36a21fdb71114be07434c0cc7bf63f6e1da\
             274edebfe76f65fbd51ad2f14898b95b"
        );
        assert_eq!(
            &hex::encode(Sha384.digest(b"abc")),
            "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed\
             8086072ba1e7cc2358baeca134c825a7"
        );
    }

    #[test]
    fn sha512_test_vectors() {
        assert_eq!(Sha512.algorithm(), HashingAlgorithm::Sha512);
        assert_eq!(
            &hex::encode(Sha512.digest(b"abc")),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn default_hasher_factory_supports_every_algorithm() {
        for alg in [
            HashingAlgorithm::Sha256,
            HashingAlgorithm::Sha384,
            HashingAlgorithm::Sha512,
        ] {
            assert_eq!(default_hasher_factory(alg).unwrap().algorithm(), alg);
        }
    }
}
