use std::collections::HashMap;

use alloy_primitives::{eip191_hash_message, Address, PrimitiveSignature, B256, U256};
use alloy_sol_types::{SolCall, SolInterface};
use thiserror::Error;

use crate::ICompanyReview::{
    companiesCall, ownerCall, registerCompanyCall, verifyWithRVSCall, ICompanyReviewCalls,
};

/// Reasons the contract rejects a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Revert {
    #[error("signature does not belong to sender {0}")]
    InvalidSignature(Address),
    #[error("company address is zero")]
    ZeroAddress,
    #[error("company {0} is already registered")]
    AlreadyRegistered(Address),
    #[error("unrecognized calldata: {0}")]
    BadCalldata(String),
}

/// Storage and rules of a single deployed `CompanyReviewContract`.
///
/// `owner` is fixed to the deployer. `companies` maps an address to its
/// registration flag; a company can be registered once.
#[derive(Debug, Clone)]
pub struct CompanyReviewState {
    owner: Address,
    companies: HashMap<Address, bool>,
}

impl CompanyReviewState {
    pub fn deploy(deployer: Address) -> Self {
        Self {
            owner: deployer,
            companies: HashMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn companies(&self, company: Address) -> bool {
        self.companies.get(&company).copied().unwrap_or(false)
    }

    /// Recovers the personal-sign signer of `message_hash` and compares it to `signer`.
    ///
    /// Malformed signatures recover nothing and therefore never verify.
    pub fn verify_with_rvs(
        &self,
        signer: Address,
        message_hash: B256,
        r: B256,
        s: B256,
        v: u8,
    ) -> bool {
        ecrecover(eip191_hash_message(message_hash), v, r, s) == Some(signer)
    }

    pub fn register_company(
        &mut self,
        caller: Address,
        company: Address,
        message_hash: B256,
        r: B256,
        s: B256,
        v: u8,
    ) -> Result<(), Revert> {
        if !self.verify_with_rvs(caller, message_hash, r, s, v) {
            return Err(Revert::InvalidSignature(caller));
        }
        if company.is_zero() {
            return Err(Revert::ZeroAddress);
        }
        if self.companies(company) {
            return Err(Revert::AlreadyRegistered(company));
        }
        self.companies.insert(company, true);
        Ok(())
    }

    /// Executes ABI-encoded calldata without persisting any state change,
    /// the way `eth_call` does.
    pub fn call(&self, caller: Address, calldata: &[u8]) -> Result<Vec<u8>, Revert> {
        self.clone().transact(caller, calldata)
    }

    /// Executes ABI-encoded calldata as a transaction from `caller` and returns
    /// the ABI-encoded return data.
    pub fn transact(&mut self, caller: Address, calldata: &[u8]) -> Result<Vec<u8>, Revert> {
        let decoded = ICompanyReviewCalls::abi_decode(calldata, true)
            .map_err(|e| Revert::BadCalldata(e.to_string()))?;

        match decoded {
            ICompanyReviewCalls::verifyWithRVS(call) => {
                let valid =
                    self.verify_with_rvs(call.signer, call.messageHash, call.r, call.s, call.v);
                Ok(verifyWithRVSCall::abi_encode_returns(&(valid,)))
            }
            ICompanyReviewCalls::registerCompany(call) => {
                self.register_company(caller, call.company, call.messageHash, call.r, call.s, call.v)?;
                Ok(registerCompanyCall::abi_encode_returns(&()))
            }
            ICompanyReviewCalls::owner(_) => Ok(ownerCall::abi_encode_returns(&(self.owner,))),
            ICompanyReviewCalls::companies(call) => {
                let registered = self.companies(call.company);
                Ok(companiesCall::abi_encode_returns(&(registered,)))
            }
        }
    }
}

/// Solidity `ecrecover`: only `v` of 27 or 28 is accepted.
fn ecrecover(hash: B256, v: u8, r: B256, s: B256) -> Option<Address> {
    let y_parity = match v {
        27 => false,
        28 => true,
        _ => return None,
    };
    let signature = PrimitiveSignature::new(
        U256::from_be_slice(r.as_slice()),
        U256::from_be_slice(s.as_slice()),
        y_parity,
    );
    signature.recover_address_from_prehash(&hash).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, keccak256};
    use k256::ecdsa::{signature::hazmat::PrehashSigner, SigningKey, VerifyingKey};

    const COMPANY: Address = address!("84960ca8edA0936A2AceBd818418be091CFF1720");

    fn fixed_key() -> SigningKey {
        SigningKey::from_bytes((&[0x11u8; 32]).into()).unwrap()
    }

    fn key_address(signing_key: &SigningKey) -> Address {
        let public_key = VerifyingKey::from(signing_key).to_encoded_point(false);
        let hash = keccak256(&public_key.as_bytes()[1..]);
        Address::from_slice(&hash[12..])
    }

    fn personal_sign(signing_key: &SigningKey, message_hash: B256) -> (B256, B256, u8) {
        let prehash = eip191_hash_message(message_hash);
        let (sig, recovery_id): (k256::ecdsa::Signature, k256::ecdsa::RecoveryId) =
            signing_key.sign_prehash(prehash.as_slice()).unwrap();
        let r = B256::from_slice(&sig.r().to_bytes());
        let s = B256::from_slice(&sig.s().to_bytes());
        (r, s, 27 + u8::from(recovery_id.is_y_odd()))
    }

    #[test]
    fn verify_accepts_signer_and_rejects_others() {
        let key = fixed_key();
        let signer = key_address(&key);
        let hash = keccak256(COMPANY.to_string());
        let (r, s, v) = personal_sign(&key, hash);
        let state = CompanyReviewState::deploy(signer);

        assert!(state.verify_with_rvs(signer, hash, r, s, v));
        assert!(!state.verify_with_rvs(COMPANY, hash, r, s, v));
        assert!(!state.verify_with_rvs(signer, keccak256("tampered"), r, s, v));
        assert!(!state.verify_with_rvs(signer, hash, r, s, 1));
    }

    #[test]
    fn register_marks_company_once() {
        let key = fixed_key();
        let signer = key_address(&key);
        let hash = keccak256("company");
        let (r, s, v) = personal_sign(&key, hash);
        let mut state = CompanyReviewState::deploy(signer);

        assert!(!state.companies(COMPANY));
        state.register_company(signer, COMPANY, hash, r, s, v).unwrap();
        assert!(state.companies(COMPANY));

        let err = state.register_company(signer, COMPANY, hash, r, s, v).unwrap_err();
        assert_eq!(err, Revert::AlreadyRegistered(COMPANY));
        assert!(state.companies(COMPANY));
    }

    #[test]
    fn register_rejects_foreign_signature_and_zero_company() {
        let key = fixed_key();
        let signer = key_address(&key);
        let hash = keccak256("company");
        let (r, s, v) = personal_sign(&key, hash);
        let mut state = CompanyReviewState::deploy(signer);

        let err = state.register_company(COMPANY, COMPANY, hash, r, s, v).unwrap_err();
        assert_eq!(err, Revert::InvalidSignature(COMPANY));

        let err = state.register_company(signer, Address::ZERO, hash, r, s, v).unwrap_err();
        assert_eq!(err, Revert::ZeroAddress);
    }

    #[test]
    fn calldata_dispatch_matches_direct_calls() {
        let key = fixed_key();
        let signer = key_address(&key);
        let hash = keccak256("company");
        let (r, s, v) = personal_sign(&key, hash);
        let mut state = CompanyReviewState::deploy(signer);

        let owner = state.call(COMPANY, &ownerCall {}.abi_encode()).unwrap();
        assert_eq!(ownerCall::abi_decode_returns(&owner, true).unwrap().ownerAddress, signer);

        let register = registerCompanyCall { company: COMPANY, messageHash: hash, r, s, v };
        // eth_call style execution leaves storage untouched.
        state.call(signer, &register.abi_encode()).unwrap();
        assert!(!state.companies(COMPANY));

        state.transact(signer, &register.abi_encode()).unwrap();
        let registered = state.call(signer, &companiesCall { company: COMPANY }.abi_encode()).unwrap();
        assert!(companiesCall::abi_decode_returns(&registered, true).unwrap().registered);

        assert!(matches!(state.call(signer, &[0xde, 0xad]), Err(Revert::BadCalldata(_))));
    }
}
