//! Command-line surface of the `register-company` script.
//!
//! Every flag can also come from the environment (or a `.env` file loaded
//! before parsing), mirroring the deployment setup of the contract project.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use helpers::config::{DEFAULT_COMPANY_ADDRESS, DEFAULT_CONTRACT_ADDRESS, DEFAULT_MESSAGE};
use helpers::{run_workflow, CompanyRegistry, ConfigError, ScriptConfig, WorkflowReport};

#[derive(Debug, Parser)]
#[command(name = "register-company")]
#[command(about = "Sign a message and register a company on the CompanyReview contract")]
#[command(version)]
pub struct Args {
    /// Hex private key of the signing wallet
    #[arg(long, env = "WALLET_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// JSON-RPC URL of the rollup node
    #[arg(long, env = "ZKSYNC_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Address of the deployed CompanyReview contract
    #[arg(long, env = "CONTRACT_ADDRESS", default_value = DEFAULT_CONTRACT_ADDRESS)]
    pub contract_address: String,

    /// Message whose keccak256 digest is signed
    #[arg(long, env = "SIGNED_MESSAGE", default_value = DEFAULT_MESSAGE)]
    pub message: String,

    /// Company address passed to registerCompany and companies
    #[arg(long, env = "COMPANY_ADDRESS", default_value = DEFAULT_COMPANY_ADDRESS)]
    pub company_address: String,

    /// Chain ID used for signing; queried from the node when omitted
    #[arg(long, env = "CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Gas limit for registerCompany; estimated when omitted
    #[arg(long)]
    pub gas_limit: Option<u64>,

    /// Max fee per gas (wei); node gas price when omitted
    #[arg(long)]
    pub max_fee_per_gas: Option<u128>,

    /// Max priority fee per gas (wei)
    #[arg(long, default_value_t = 0)]
    pub max_priority_fee_per_gas: u128,

    /// HTTP timeout for individual RPC calls
    #[arg(long, default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    /// How long to wait for registerCompany to be included
    #[arg(long, default_value_t = 120)]
    pub confirmation_timeout_secs: u64,

    /// Delay between receipt polls
    #[arg(long, default_value_t = 1_000)]
    pub poll_interval_ms: u64,

    /// Do not submit registerCompany when verifyWithRVS returns false
    #[arg(long)]
    pub gate_register_on_verify: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn to_config(&self) -> Result<ScriptConfig, ConfigError> {
        let mut builder = ScriptConfig::builder()
            .contract_address(&self.contract_address)
            .message(&self.message)
            .company_address(&self.company_address)
            .chain_id(self.chain_id)
            .gas_limit(self.gas_limit)
            .max_fee_per_gas(self.max_fee_per_gas)
            .max_priority_fee_per_gas(self.max_priority_fee_per_gas)
            .request_timeout(Duration::from_millis(self.request_timeout_ms))
            .confirmation_timeout(Duration::from_secs(self.confirmation_timeout_secs))
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .gate_register_on_verify(self.gate_register_on_verify);
        if let Some(private_key) = &self.private_key {
            builder = builder.private_key(private_key);
        }
        if let Some(rpc_url) = &self.rpc_url {
            builder = builder.rpc_url(rpc_url);
        }
        builder.build()
    }
}

/// Validates `args`, then opens the registry with `connect` and runs the workflow.
///
/// `connect` is not called when the configuration is incomplete.
pub async fn run<R, F>(args: &Args, connect: F) -> anyhow::Result<WorkflowReport>
where
    R: CompanyRegistry,
    F: FnOnce(&ScriptConfig) -> anyhow::Result<R>,
{
    let config = args.to_config().context("invalid configuration")?;
    tracing::info!(
        "Running script to interact with contract {:#x}",
        config.contract_address()
    );
    tracing::info!("Signer: {:#x}", config.wallet().address());

    let registry = connect(&config)?;
    let report = run_workflow(&registry, config.wallet(), config.workflow()).await?;
    Ok(report)
}
