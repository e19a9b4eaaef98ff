//! Validated configuration for a script run.
//!
//! [`ScriptConfig`] can only be obtained through [`ScriptConfigBuilder::build`],
//! which rejects a missing signing key or contract address before any client
//! is created.

use std::time::Duration;

use alloy_primitives::Address;
use thiserror::Error;

use crate::registry::SubmissionParams;
use crate::wallet::{SigningError, Wallet};
use crate::workflow::WorkflowParams;

/// `CompanyReviewContract` on the zkSync testnet.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x54803b00E89114D2986B1B7742615548e48920A6";
pub const DEFAULT_MESSAGE: &str = "0x84960ca8edA0936A2AceBd818418be091CFF1720";
pub const DEFAULT_COMPANY_ADDRESS: &str = "0x84960ca8edA0936A2AceBd818418be091CFF1720";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("private key not detected; set WALLET_PRIVATE_KEY")]
    MissingPrivateKey,
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(#[source] SigningError),
    #[error("RPC URL not provided; set ZKSYNC_RPC_URL")]
    MissingRpcUrl,
    #[error("invalid RPC URL '{0}'")]
    InvalidRpcUrl(String),
    #[error("contract address not provided")]
    MissingContractAddress,
    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Debug, Clone)]
pub struct ScriptConfig {
    wallet: Wallet,
    rpc_url: String,
    contract_address: Address,
    request_timeout: Duration,
    workflow: WorkflowParams,
    submission: SubmissionParams,
}

impl ScriptConfig {
    pub fn builder() -> ScriptConfigBuilder {
        ScriptConfigBuilder::default()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn workflow(&self) -> &WorkflowParams {
        &self.workflow
    }

    pub fn submission(&self) -> &SubmissionParams {
        &self.submission
    }
}

#[derive(Default)]
pub struct ScriptConfigBuilder {
    private_key: Option<String>,
    rpc_url: Option<String>,
    contract_address: Option<String>,
    message: Option<String>,
    company_address: Option<String>,
    request_timeout: Option<Duration>,
    gate_register_on_verify: bool,
    submission: SubmissionParams,
}

impl ScriptConfigBuilder {
    pub fn private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    pub fn rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }

    /// Defaults to [`DEFAULT_CONTRACT_ADDRESS`].
    pub fn contract_address(mut self, address: impl Into<String>) -> Self {
        self.contract_address = Some(address.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn company_address(mut self, address: impl Into<String>) -> Self {
        self.company_address = Some(address.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn gate_register_on_verify(mut self, gate: bool) -> Self {
        self.gate_register_on_verify = gate;
        self
    }

    pub fn chain_id(mut self, chain_id: Option<u64>) -> Self {
        self.submission.chain_id = chain_id;
        self
    }

    pub fn gas_limit(mut self, gas_limit: Option<u64>) -> Self {
        self.submission.gas_limit = gas_limit;
        self
    }

    pub fn max_fee_per_gas(mut self, fee: Option<u128>) -> Self {
        self.submission.max_fee_per_gas = fee;
        self
    }

    pub fn max_priority_fee_per_gas(mut self, fee: u128) -> Self {
        self.submission.max_priority_fee_per_gas = fee;
        self
    }

    pub fn confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.submission.confirmation_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.submission.poll_interval = interval;
        self
    }

    pub fn build(self) -> Result<ScriptConfig, ConfigError> {
        let private_key = non_empty(self.private_key).ok_or(ConfigError::MissingPrivateKey)?;
        let wallet =
            Wallet::from_private_key(&private_key).map_err(ConfigError::InvalidPrivateKey)?;

        let rpc_url = non_empty(self.rpc_url).ok_or(ConfigError::MissingRpcUrl)?;
        reqwest::Url::parse(&rpc_url).map_err(|_| ConfigError::InvalidRpcUrl(rpc_url.clone()))?;

        let contract_address = parse_address(
            "contract address",
            non_empty(self.contract_address).as_deref().unwrap_or(DEFAULT_CONTRACT_ADDRESS),
        )?;
        if contract_address.is_zero() {
            return Err(ConfigError::MissingContractAddress);
        }

        let company_address = parse_address(
            "company address",
            non_empty(self.company_address).as_deref().unwrap_or(DEFAULT_COMPANY_ADDRESS),
        )?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        if request_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("request timeout"));
        }
        if self.submission.confirmation_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("confirmation timeout"));
        }
        if self.submission.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll interval"));
        }

        Ok(ScriptConfig {
            wallet,
            rpc_url,
            contract_address,
            request_timeout,
            workflow: WorkflowParams {
                message: self.message.unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
                company_address,
                gate_register_on_verify: self.gate_register_on_verify,
            },
            submission: self.submission,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
    const RPC: &str = "https://sepolia.era.zksync.dev";

    #[test]
    fn builds_with_defaults() {
        let config = ScriptConfig::builder()
            .private_key(KEY)
            .rpc_url(RPC)
            .build()
            .unwrap();

        assert_eq!(
            config.contract_address(),
            DEFAULT_CONTRACT_ADDRESS.parse::<Address>().unwrap()
        );
        assert_eq!(config.workflow().message, DEFAULT_MESSAGE);
        assert_eq!(
            config.workflow().company_address,
            DEFAULT_COMPANY_ADDRESS.parse::<Address>().unwrap()
        );
        assert!(!config.workflow().gate_register_on_verify);
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.submission().chain_id, None);
    }

    #[test]
    fn message_and_company_are_independent() {
        let config = ScriptConfig::builder()
            .private_key(KEY)
            .rpc_url(RPC)
            .message("acme corp")
            .company_address("0x000000000000000000000000000000000000dEaD")
            .build()
            .unwrap();

        assert_eq!(config.workflow().message, "acme corp");
        assert_eq!(
            config.workflow().company_address,
            "0x000000000000000000000000000000000000dEaD".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn missing_or_blank_key_is_rejected() {
        let missing = ScriptConfig::builder().rpc_url(RPC).build();
        assert!(matches!(missing, Err(ConfigError::MissingPrivateKey)));

        let blank = ScriptConfig::builder().private_key("  ").rpc_url(RPC).build();
        assert!(matches!(blank, Err(ConfigError::MissingPrivateKey)));

        let short = ScriptConfig::builder().private_key("0x12").rpc_url(RPC).build();
        assert!(matches!(short, Err(ConfigError::InvalidPrivateKey(_))));
    }

    #[test]
    fn rpc_url_and_contract_are_validated() {
        let no_url = ScriptConfig::builder().private_key(KEY).build();
        assert!(matches!(no_url, Err(ConfigError::MissingRpcUrl)));

        let bad_url = ScriptConfig::builder().private_key(KEY).rpc_url("not a url").build();
        assert!(matches!(bad_url, Err(ConfigError::InvalidRpcUrl(_))));

        let zero = ScriptConfig::builder()
            .private_key(KEY)
            .rpc_url(RPC)
            .contract_address("0x0000000000000000000000000000000000000000")
            .build();
        assert!(matches!(zero, Err(ConfigError::MissingContractAddress)));

        let garbage = ScriptConfig::builder()
            .private_key(KEY)
            .rpc_url(RPC)
            .contract_address("0x1234")
            .build();
        assert!(matches!(
            garbage,
            Err(ConfigError::InvalidAddress { field: "contract address", .. })
        ));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let result = ScriptConfig::builder()
            .private_key(KEY)
            .rpc_url(RPC)
            .confirmation_timeout(Duration::ZERO)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::ZeroDuration("confirmation timeout"))
        ));
    }
}
