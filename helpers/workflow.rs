//! Sign once, verify, register, then read the result back.

use std::fmt;

use alloy_primitives::{Address, B256};
use thiserror::Error;

use crate::registry::{CompanyRegistry, RegistryError};
use crate::rpc::TxReceipt;
use crate::signature::{message_digest, ExpandedSignature};
use crate::wallet::{SigningError, Wallet};

/// What a single run signs and registers.
#[derive(Debug, Clone)]
pub struct WorkflowParams {
    pub message: String,
    pub company_address: Address,
    /// Skip registration when the contract rejects the signature.
    pub gate_register_on_verify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    Digest,
    Sign,
    Verify,
    Register,
    ReadOwner,
    ReadRegistration,
}

impl WorkflowStep {
    /// 1-based position in the run.
    pub fn number(self) -> u8 {
        match self {
            Self::Digest => 1,
            Self::Sign => 2,
            Self::Verify => 3,
            Self::Register => 4,
            Self::ReadOwner => 5,
            Self::ReadRegistration => 6,
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Digest => "digest",
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::Register => "register",
            Self::ReadOwner => "read owner",
            Self::ReadRegistration => "read registration",
        };
        write!(f, "step {} ({name})", self.number())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("step 2 (sign) failed: {source}")]
    Signing {
        #[from]
        source: SigningError,
    },
    #[error("contract rejected signature of {signer}; registration not attempted")]
    VerificationRejected { signer: Address },
    #[error("{step} failed: {source}")]
    Step {
        step: WorkflowStep,
        #[source]
        source: RegistryError,
    },
}

impl WorkflowError {
    pub fn step(&self) -> WorkflowStep {
        match self {
            Self::Signing { .. } => WorkflowStep::Sign,
            Self::VerificationRejected { .. } => WorkflowStep::Verify,
            Self::Step { step, .. } => *step,
        }
    }
}

fn at(step: WorkflowStep) -> impl FnOnce(RegistryError) -> WorkflowError {
    move |source| WorkflowError::Step { step, source }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub signer: Address,
    pub message: String,
    pub digest: B256,
    pub signature: ExpandedSignature,
    pub verified: bool,
    pub company: Address,
    pub receipt: TxReceipt,
    pub owner: Address,
    pub company_registered: bool,
}

impl WorkflowReport {
    pub fn log(&self) {
        tracing::info!(
            signer = %self.signer,
            message = %self.message,
            digest = %self.digest,
            signature = %self.signature,
            "signed message"
        );
        tracing::info!(verified = self.verified, "verifyWithRVS");
        tracing::info!(
            tx_hash = %self.receipt.transaction_hash,
            block_number = ?self.receipt.block_number,
            gas_used = self.receipt.gas_used,
            status = self.receipt.status,
            "registerCompany confirmed"
        );
        tracing::info!(owner = %self.owner, "owner");
        tracing::info!(
            company = %self.company,
            registered = self.company_registered,
            "companies"
        );
    }
}

/// Runs the six steps in order against `registry`.
///
/// The digest and signature are produced once and reused for both the
/// verification and the registration call. Any failure stops the run; a
/// failure after registration leaves the on-chain change in place.
pub async fn run_workflow<R>(
    registry: &R,
    wallet: &Wallet,
    params: &WorkflowParams,
) -> Result<WorkflowReport, WorkflowError>
where
    R: CompanyRegistry + ?Sized,
{
    let signer = wallet.address();

    let digest = message_digest(&params.message);
    tracing::debug!(%digest, "derived message digest");

    let signature = wallet.sign_message(digest.as_slice())?;
    tracing::debug!(%signature, "signed digest");

    let verified = registry
        .verify_with_rvs(signer, digest, &signature)
        .await
        .map_err(at(WorkflowStep::Verify))?;
    if verified {
        tracing::debug!(%signer, "signature verified by contract");
    } else if params.gate_register_on_verify {
        return Err(WorkflowError::VerificationRejected { signer });
    } else {
        tracing::warn!(%signer, "contract rejected signature, registering anyway");
    }

    let receipt = registry
        .register_company(params.company_address, digest, &signature)
        .await
        .map_err(at(WorkflowStep::Register))?;
    tracing::debug!(tx_hash = %receipt.transaction_hash, "registration confirmed");

    let owner = registry.owner().await.map_err(at(WorkflowStep::ReadOwner))?;
    tracing::debug!(%owner, "contract owner");

    let company_registered = registry
        .is_registered(params.company_address)
        .await
        .map_err(at(WorkflowStep::ReadRegistration))?;
    tracing::debug!(company = %params.company_address, company_registered, "registration status");

    Ok(WorkflowReport {
        signer,
        message: params.message.clone(),
        digest,
        signature,
        verified,
        company: params.company_address,
        receipt,
        owner,
        company_registered,
    })
}
