use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{keccak256, Address, B256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use company_review::ICompanyReview::{
    companiesCall, ownerCall, registerCompanyCall, verifyWithRVSCall,
};
use company_review::CompanyReviewState;
use helpers::registry::wait_for_receipt;
use helpers::{CompanyRegistry, ExpandedSignature, RegistryError, RpcError, TxReceipt, Wallet};

/// Entry point that should fail as if the node were unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailingCall {
    Verify,
    Register,
    Owner,
    IsRegistered,
}

/// When a submitted transaction becomes visible through its receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
    /// Receipt appears on the given poll (1 = first poll).
    OnPoll(u32),
    /// The transaction is never included.
    Never,
}

struct PendingTx {
    receipt: TxReceipt,
    polls_left: u32,
}

struct Chain {
    state: CompanyReviewState,
    block_number: u64,
    nonce: u64,
    pending: HashMap<B256, PendingTx>,
}

/// A single-contract chain that executes calls in memory.
///
/// Calls go through the same ABI bindings as the RPC-backed registry, so
/// calldata and return data are really encoded and decoded. Every trait call
/// counts as one network interaction.
pub struct SimulatedRegistry {
    contract: Address,
    sender: Address,
    chain: Mutex<Chain>,
    interactions: AtomicUsize,
    failing: Option<FailingCall>,
    inclusion: Inclusion,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl SimulatedRegistry {
    /// Deploys the contract from `deployer`; transactions are sent from `sender`.
    pub fn new(deployer: Address, sender: Address) -> Self {
        Self {
            contract: Address::repeat_byte(0xc0),
            sender,
            chain: Mutex::new(Chain {
                state: CompanyReviewState::deploy(deployer),
                block_number: 0,
                nonce: 0,
                pending: HashMap::new(),
            }),
            interactions: AtomicUsize::new(0),
            failing: None,
            inclusion: Inclusion::OnPoll(1),
            confirmation_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(2),
        }
    }

    /// Deploys from and sends as `wallet`.
    pub fn deploy(wallet: &Wallet) -> Self {
        Self::new(wallet.address(), wallet.address())
    }

    pub fn failing(mut self, call: FailingCall) -> Self {
        self.failing = Some(call);
        self
    }

    pub fn inclusion(mut self, inclusion: Inclusion) -> Self {
        self.inclusion = inclusion;
        self
    }

    pub fn confirmation(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn interactions(&self) -> usize {
        self.interactions.load(Ordering::SeqCst)
    }

    pub fn block_number(&self) -> u64 {
        self.chain().block_number
    }

    /// Storage lookup that bypasses the RPC surface and the interaction counter.
    pub fn stored_registration(&self, company: Address) -> bool {
        self.chain().state.companies(company)
    }

    fn chain(&self) -> std::sync::MutexGuard<'_, Chain> {
        self.chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, call: FailingCall, method: &str) -> Result<(), RegistryError> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        if self.failing == Some(call) {
            return Err(RegistryError::Rpc(RpcError::Node {
                method: method.to_string(),
                code: -32000,
                message: "simulated node outage".to_string(),
                data: None,
            }));
        }
        Ok(())
    }

    fn read<C: SolCall>(&self, call: C) -> Result<C::Return, RegistryError> {
        let output = self
            .chain()
            .state
            .call(self.sender, &call.abi_encode())
            .map_err(|revert| RegistryError::Reverted(revert.to_string()))?;
        C::abi_decode_returns(&output, true).map_err(|source| RegistryError::Decode {
            method: C::SIGNATURE,
            source,
        })
    }

    /// Executes the transaction right away and queues its receipt.
    fn submit(&self, input: &[u8]) -> B256 {
        let mut chain = self.chain();
        let status = chain.state.transact(self.sender, input).is_ok();
        chain.block_number += 1;
        chain.nonce += 1;

        let mut preimage = input.to_vec();
        preimage.extend_from_slice(&chain.nonce.to_be_bytes());
        let tx_hash = keccak256(&preimage);

        let receipt = TxReceipt {
            transaction_hash: tx_hash,
            block_number: Some(chain.block_number),
            status,
            gas_used: 46_000,
            from: self.sender,
            to: Some(self.contract),
        };
        let polls_left = match self.inclusion {
            Inclusion::OnPoll(n) => n.max(1),
            Inclusion::Never => u32::MAX,
        };
        chain.pending.insert(tx_hash, PendingTx { receipt, polls_left });
        tracing::debug!(%tx_hash, status, "simulated registerCompany executed");
        tx_hash
    }

    fn poll_receipt(&self, tx_hash: B256) -> Option<TxReceipt> {
        if self.inclusion == Inclusion::Never {
            return None;
        }
        let mut chain = self.chain();
        let pending = chain.pending.get_mut(&tx_hash)?;
        pending.polls_left = pending.polls_left.saturating_sub(1);
        (pending.polls_left == 0).then(|| pending.receipt.clone())
    }
}

#[async_trait]
impl CompanyRegistry for SimulatedRegistry {
    async fn verify_with_rvs(
        &self,
        signer: Address,
        digest: B256,
        signature: &ExpandedSignature,
    ) -> Result<bool, RegistryError> {
        self.enter(FailingCall::Verify, "eth_call")?;
        let call = verifyWithRVSCall {
            signer,
            messageHash: digest,
            r: signature.r,
            s: signature.s,
            v: signature.v,
        };
        Ok(self.read(call)?.valid)
    }

    async fn register_company(
        &self,
        company: Address,
        digest: B256,
        signature: &ExpandedSignature,
    ) -> Result<TxReceipt, RegistryError> {
        self.enter(FailingCall::Register, "eth_sendRawTransaction")?;
        let input = registerCompanyCall {
            company,
            messageHash: digest,
            r: signature.r,
            s: signature.s,
            v: signature.v,
        }
        .abi_encode();
        let tx_hash = self.submit(&input);

        wait_for_receipt(
            tx_hash,
            self.confirmation_timeout,
            self.poll_interval,
            || {
                let receipt = self.poll_receipt(tx_hash);
                async move { Ok::<_, RegistryError>(receipt) }
            },
        )
        .await
    }

    async fn owner(&self) -> Result<Address, RegistryError> {
        self.enter(FailingCall::Owner, "eth_call")?;
        Ok(self.read(ownerCall {})?.ownerAddress)
    }

    async fn is_registered(&self, company: Address) -> Result<bool, RegistryError> {
        self.enter(FailingCall::IsRegistered, "eth_call")?;
        Ok(self.read(companiesCall { company })?.registered)
    }
}
