//! Message digest and the expanded `(r, s, v)` signature form the contract expects.

use std::fmt;

use alloy_primitives::{keccak256, Address, PrimitiveSignature, SignatureError, B256, U256};
use thiserror::Error;

/// keccak256 over the UTF-8 bytes of `message`.
pub fn message_digest(message: &str) -> B256 {
    keccak256(message.as_bytes())
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("invalid recovery value v={0}, expected 27 or 28")]
    InvalidV(u8),
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// Signature split into the three arguments of `verifyWithRVS`/`registerCompany`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandedSignature {
    pub r: B256,
    pub s: B256,
    /// 27 or 28.
    pub v: u8,
}

impl ExpandedSignature {
    pub fn to_signature(&self) -> Result<PrimitiveSignature, RecoveryError> {
        let y_parity = match self.v {
            27 => false,
            28 => true,
            other => return Err(RecoveryError::InvalidV(other)),
        };
        Ok(PrimitiveSignature::new(
            U256::from_be_slice(self.r.as_slice()),
            U256::from_be_slice(self.s.as_slice()),
            y_parity,
        ))
    }

    /// Recovers the personal-sign signer of `digest`.
    pub fn recover_signer(&self, digest: B256) -> Result<Address, RecoveryError> {
        Ok(self.to_signature()?.recover_address_from_msg(digest.as_slice())?)
    }

    /// 65-byte `r || s || v` encoding.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }
}

impl From<PrimitiveSignature> for ExpandedSignature {
    fn from(signature: PrimitiveSignature) -> Self {
        Self {
            r: B256::from(signature.r().to_be_bytes::<32>()),
            s: B256::from(signature.s().to_be_bytes::<32>()),
            v: 27 + u8::from(signature.v()),
        }
    }
}

impl fmt::Display for ExpandedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}
