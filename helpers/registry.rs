//! Access to a deployed `CompanyReviewContract`.
//!
//! [`CompanyRegistry`] is the seam the workflow talks to. [`RpcCompanyRegistry`]
//! drives a live node over JSON-RPC; tests substitute a simulated chain.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock, PoisonError};
use std::time::Duration;

use alloy_primitives::{Address, B256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use company_review::ICompanyReview::{
    companiesCall, ownerCall, registerCompanyCall, verifyWithRVSCall,
};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::ScriptConfig;
use crate::rpc::{JsonRpcClient, RpcError, TxReceipt};
use crate::signature::ExpandedSignature;
use crate::tx::{create_signed_tx, gas_with_headroom, TxBuildParams};
use crate::wallet::{SigningError, Wallet};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("failed to decode {method} return data: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: alloy_sol_types::Error,
    },
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("call reverted: {0}")]
    Reverted(String),
    #[error("transaction {tx_hash} reverted in block {block_number:?}")]
    TransactionReverted {
        tx_hash: B256,
        block_number: Option<u64>,
    },
    #[error("transaction {tx_hash} not confirmed within {waited:?}")]
    ConfirmationTimeout { tx_hash: B256, waited: Duration },
}

/// The four entry points the script uses.
#[async_trait]
pub trait CompanyRegistry: Send + Sync {
    /// Read-only `verifyWithRVS`.
    async fn verify_with_rvs(
        &self,
        signer: Address,
        digest: B256,
        signature: &ExpandedSignature,
    ) -> Result<bool, RegistryError>;

    /// Submits `registerCompany` and waits for its confirmation.
    async fn register_company(
        &self,
        company: Address,
        digest: B256,
        signature: &ExpandedSignature,
    ) -> Result<TxReceipt, RegistryError>;

    async fn owner(&self) -> Result<Address, RegistryError>;

    /// Read-only `companies(address)`.
    async fn is_registered(&self, company: Address) -> Result<bool, RegistryError>;
}

/// How state-changing transactions are priced and confirmed.
#[derive(Debug, Clone)]
pub struct SubmissionParams {
    /// Queried with `eth_chainId` when unset.
    pub chain_id: Option<u64>,
    /// Estimated with headroom when unset.
    pub gas_limit: Option<u64>,
    /// Node gas price when unset.
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: u128,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SubmissionParams {
    fn default() -> Self {
        Self {
            chain_id: None,
            gas_limit: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: 0,
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Polls `fetch` every `poll_interval` until a receipt included in a block
/// shows up, or fails once `timeout` has elapsed.
///
/// A receipt with a failed status is reported as
/// [`RegistryError::TransactionReverted`].
pub async fn wait_for_receipt<F, Fut, E>(
    tx_hash: B256,
    timeout: Duration,
    poll_interval: Duration,
    mut fetch: F,
) -> Result<TxReceipt, RegistryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<TxReceipt>, E>>,
    RegistryError: From<E>,
{
    let poll = async {
        loop {
            if let Some(receipt) = fetch().await? {
                if receipt.block_number.is_some() {
                    return Ok::<_, RegistryError>(receipt);
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    let receipt = match tokio::time::timeout(timeout, poll).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(RegistryError::ConfirmationTimeout {
                tx_hash,
                waited: timeout,
            })
        }
    };
    if !receipt.status {
        return Err(RegistryError::TransactionReverted {
            tx_hash,
            block_number: receipt.block_number,
        });
    }
    Ok(receipt)
}

/// [`CompanyRegistry`] backed by a JSON-RPC node.
pub struct RpcCompanyRegistry {
    rpc: JsonRpcClient,
    contract: Address,
    wallet: Wallet,
    submission: SubmissionParams,
    // Shared by every registry signing as the same address.
    submit_lock: Arc<Mutex<()>>,
}

/// One in-flight submission per signing address keeps nonces ordered.
fn submission_lock(signer: Address) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<std::sync::Mutex<HashMap<Address, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    locks.entry(signer).or_default().clone()
}

impl RpcCompanyRegistry {
    pub fn new(
        rpc: JsonRpcClient,
        contract: Address,
        wallet: Wallet,
        submission: SubmissionParams,
    ) -> Self {
        let submit_lock = submission_lock(wallet.address());
        Self {
            rpc,
            contract,
            wallet,
            submission,
            submit_lock,
        }
    }

    /// Builds the HTTP client described by `config`. No request is sent.
    pub fn from_config(config: &ScriptConfig) -> Result<Self, RpcError> {
        let rpc = JsonRpcClient::new(config.rpc_url(), config.request_timeout())?;
        Ok(Self::new(
            rpc,
            config.contract_address(),
            config.wallet().clone(),
            config.submission().clone(),
        ))
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    async fn read<C>(&self, call: C) -> Result<C::Return, RegistryError>
    where
        C: SolCall + Send,
    {
        let input = call.abi_encode();
        let output = self
            .rpc
            .eth_call(Some(self.wallet.address()), self.contract, &input)
            .await?;
        C::abi_decode_returns(&output, true).map_err(|source| RegistryError::Decode {
            method: C::SIGNATURE,
            source,
        })
    }

    async fn build_params(&self, input: &[u8]) -> Result<TxBuildParams, RpcError> {
        let chain_id = match self.submission.chain_id {
            Some(chain_id) => chain_id,
            None => self.rpc.chain_id().await?,
        };
        let gas_limit = match self.submission.gas_limit {
            Some(gas_limit) => gas_limit,
            None => gas_with_headroom(
                self.rpc
                    .estimate_gas(self.wallet.address(), self.contract, input)
                    .await?,
            ),
        };
        let max_fee_per_gas = match self.submission.max_fee_per_gas {
            Some(fee) => fee,
            None => self.rpc.gas_price().await?,
        };
        Ok(TxBuildParams {
            chain_id,
            to: self.contract,
            gas_limit,
            max_priority_fee_per_gas: self.submission.max_priority_fee_per_gas.min(max_fee_per_gas),
            max_fee_per_gas,
        })
    }
}

#[async_trait]
impl CompanyRegistry for RpcCompanyRegistry {
    async fn verify_with_rvs(
        &self,
        signer: Address,
        digest: B256,
        signature: &ExpandedSignature,
    ) -> Result<bool, RegistryError> {
        let call = verifyWithRVSCall {
            signer,
            messageHash: digest,
            r: signature.r,
            s: signature.s,
            v: signature.v,
        };
        Ok(self.read(call).await?.valid)
    }

    async fn register_company(
        &self,
        company: Address,
        digest: B256,
        signature: &ExpandedSignature,
    ) -> Result<TxReceipt, RegistryError> {
        let _guard = self.submit_lock.lock().await;

        let input = registerCompanyCall {
            company,
            messageHash: digest,
            r: signature.r,
            s: signature.s,
            v: signature.v,
        }
        .abi_encode();
        let params = self.build_params(&input).await?;
        let nonce = self.rpc.get_transaction_count(self.wallet.address()).await?;

        let (raw_tx, local_hash) = create_signed_tx(&self.wallet, nonce, input, params)?;
        let tx_hash = self.rpc.send_raw_transaction(&raw_tx).await?;
        if tx_hash != local_hash {
            tracing::warn!(%tx_hash, %local_hash, "node returned a different transaction hash");
        }
        tracing::info!(
            %tx_hash,
            nonce,
            gas_limit = params.gas_limit,
            chain_id = params.chain_id,
            "registerCompany submitted, waiting for confirmation"
        );

        wait_for_receipt(
            tx_hash,
            self.submission.confirmation_timeout,
            self.submission.poll_interval,
            || self.rpc.get_transaction_receipt(tx_hash),
        )
        .await
    }

    async fn owner(&self) -> Result<Address, RegistryError> {
        Ok(self.read(ownerCall {}).await?.ownerAddress)
    }

    async fn is_registered(&self, company: Address) -> Result<bool, RegistryError> {
        Ok(self.read(companiesCall { company }).await?.registered)
    }
}
