//! Signing identity used by the script.

use std::fmt;

use alloy_primitives::{eip191_hash_message, keccak256, Address, PrimitiveSignature, B256, U256};
use k256::ecdsa::{signature::hazmat::PrehashSigner, SigningKey, VerifyingKey};
use rand::RngCore;
use thiserror::Error;

use crate::signature::ExpandedSignature;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid private key hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("private key must be 32 bytes, got {0}")]
    KeyLength(usize),
    #[error("invalid private key: {0}")]
    InvalidKey(#[source] k256::ecdsa::Error),
    #[error("signing failed: {0}")]
    Sign(#[source] k256::ecdsa::Error),
}

/// A secp256k1 key together with the Ethereum address it controls.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    address: Address,
}

impl Wallet {
    /// Parses a hex private key, with or without the `0x` prefix.
    pub fn from_private_key(input: &str) -> Result<Self, SigningError> {
        parse_signing_key(input).map(Self::from_signing_key)
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = wallet_address(&signing_key);
        Self {
            signing_key,
            address,
        }
    }

    /// Fresh throwaway identity.
    pub fn random() -> Self {
        Self::random_with(&mut rand::rng())
    }

    /// Draws candidate scalars until one is a valid secp256k1 key.
    fn random_with<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        loop {
            rng.fill_bytes(&mut bytes);
            if let Ok(key) = SigningKey::from_bytes((&bytes).into()) {
                return Self::from_signing_key(key);
            }
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a 32-byte prehash directly (transaction signing).
    pub fn sign_hash(&self, hash: B256) -> Result<PrimitiveSignature, SigningError> {
        let (sig, recovery_id): (k256::ecdsa::Signature, k256::ecdsa::RecoveryId) = self
            .signing_key
            .sign_prehash(hash.as_ref())
            .map_err(SigningError::Sign)?;
        let r = U256::from_be_slice(sig.r().to_bytes().as_slice());
        let s = U256::from_be_slice(sig.s().to_bytes().as_slice());
        Ok(PrimitiveSignature::new(r, s, recovery_id.is_y_odd()))
    }

    /// Personal-sign (EIP-191) over raw message bytes, split into `(r, s, v)`.
    pub fn sign_message(&self, message: &[u8]) -> Result<ExpandedSignature, SigningError> {
        self.sign_hash(eip191_hash_message(message))
            .map(ExpandedSignature::from)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

pub fn parse_signing_key(input: &str) -> Result<SigningKey, SigningError> {
    let trimmed = input.trim();
    let hex_str = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let decoded = hex::decode(hex_str)?;
    let bytes: [u8; 32] = decoded
        .try_into()
        .map_err(|bytes: Vec<u8>| SigningError::KeyLength(bytes.len()))?;
    SigningKey::from_bytes((&bytes).into()).map_err(SigningError::InvalidKey)
}

pub fn wallet_address(signing_key: &SigningKey) -> Address {
    let verifying_key = VerifyingKey::from(signing_key);
    let public_key = verifying_key.to_encoded_point(false);
    let hash = keccak256(&public_key.as_bytes()[1..]);
    Address::from_slice(&hash.as_slice()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    // Well-known first dev account of hardhat/anvil.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn parse_signing_key_accepts_prefixed_and_unprefixed_hex() {
        let with_prefix = Wallet::from_private_key(DEV_KEY).expect("with-prefix key should parse");
        let without_prefix = Wallet::from_private_key(&DEV_KEY[2..]).expect("bare key should parse");

        assert_eq!(with_prefix.address(), without_prefix.address());
        assert_eq!(
            with_prefix.address(),
            address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }

    #[test]
    fn parse_signing_key_rejects_bad_input() {
        assert!(matches!(
            parse_signing_key("0x1234"),
            Err(SigningError::KeyLength(2))
        ));
        assert!(matches!(parse_signing_key("0xzz"), Err(SigningError::Hex(_))));
        assert!(matches!(
            parse_signing_key(&"00".repeat(32)),
            Err(SigningError::InvalidKey(_))
        ));
    }

    #[test]
    fn debug_output_hides_key_material() {
        let wallet = Wallet::from_private_key(DEV_KEY).unwrap();
        let rendered = format!("{wallet:?}");
        assert!(rendered.contains("address"));
        assert!(!rendered.contains(&DEV_KEY[2..]));
    }

    #[test]
    fn random_wallets_differ() {
        assert_ne!(Wallet::random().address(), Wallet::random().address());
    }

    /// Yields an all-zero (invalid) scalar first, then a fixed valid one.
    struct ZeroThenFixed {
        draws: usize,
    }

    impl RngCore for ZeroThenFixed {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }

        fn next_u64(&mut self) -> u64 {
            let mut bytes = [0u8; 8];
            self.fill_bytes(&mut bytes);
            u64::from_le_bytes(bytes)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            let byte = if self.draws == 0 { 0x00 } else { 0x11 };
            self.draws += 1;
            dest.fill(byte);
        }
    }

    #[test]
    fn random_skips_invalid_scalars() {
        let mut rng = ZeroThenFixed { draws: 0 };
        let wallet = Wallet::random_with(&mut rng);

        assert_eq!(rng.draws, 2);
        let expected = Wallet::from_private_key(&"11".repeat(32)).unwrap();
        assert_eq!(wallet.address(), expected.address());
    }

    #[test]
    fn sign_hash_recovers_to_wallet_address() {
        let wallet = Wallet::random();
        let hash = keccak256("payload");
        let signature = wallet.sign_hash(hash).unwrap();
        assert_eq!(
            signature.recover_address_from_prehash(&hash).unwrap(),
            wallet.address()
        );
    }
}
