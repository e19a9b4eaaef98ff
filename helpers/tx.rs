//! EIP-1559 transaction construction.

use alloy_consensus::{SignableTransaction, TxEip1559};
use alloy_primitives::{keccak256, Address, Bytes, TxKind, B256, U256};

use crate::wallet::{SigningError, Wallet};

#[derive(Debug, Clone, Copy)]
pub struct TxBuildParams {
    pub chain_id: u64,
    pub to: Address,
    pub gas_limit: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
}

/// Signs a contract call and returns the type-2 envelope bytes with its hash.
pub fn create_signed_tx(
    wallet: &Wallet,
    nonce: u64,
    input: Vec<u8>,
    params: TxBuildParams,
) -> Result<(Vec<u8>, B256), SigningError> {
    let tx = TxEip1559 {
        chain_id: params.chain_id,
        nonce,
        max_priority_fee_per_gas: params.max_priority_fee_per_gas,
        max_fee_per_gas: params.max_fee_per_gas,
        gas_limit: params.gas_limit,
        to: TxKind::Call(params.to),
        value: U256::ZERO,
        input: Bytes::from(input),
        access_list: Default::default(),
    };
    let signature = wallet.sign_hash(tx.signature_hash())?;
    let signed = tx.into_signed(signature);
    let mut encoded = vec![0x02];
    signed.rlp_encode(&mut encoded);
    let hash = keccak256(&encoded);
    Ok((encoded, hash))
}

/// Estimated gas plus 20% headroom.
pub fn gas_with_headroom(estimate: u64) -> u64 {
    estimate.saturating_add(estimate / 5)
}
