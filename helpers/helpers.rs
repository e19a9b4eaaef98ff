//! Shared building blocks for the company registration script and its tests.

pub mod config;
pub mod registry;
pub mod rpc;
pub mod signature;
pub mod tx;
pub mod wallet;
pub mod workflow;

pub use config::{ConfigError, ScriptConfig, ScriptConfigBuilder};
pub use registry::{CompanyRegistry, RegistryError, RpcCompanyRegistry, SubmissionParams};
pub use rpc::{JsonRpcClient, RpcError, TxReceipt};
pub use signature::{message_digest, ExpandedSignature};
pub use wallet::{SigningError, Wallet};
pub use workflow::{run_workflow, WorkflowError, WorkflowParams, WorkflowReport, WorkflowStep};
