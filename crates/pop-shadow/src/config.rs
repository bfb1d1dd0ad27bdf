// SPDX-License-Identifier: GPL-3.0

//! Chain configuration and the [`BlockchainBuilder`].

use crate::{
	Blockchain,
	block::HeaderInfo,
	messages::BuildBlockMode,
	registry::DEFAULT_MAX_MEMORY_BLOCK_COUNT,
	traits::{
		HeadState, InherentProvider, OffchainWorker, RemoteSource, RuntimeExecutor, SnapshotStore,
		TransactionPool,
	},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Signature mock mode for runtime execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureMockMode {
	/// No mock - verify all signatures normally.
	#[default]
	None,
	/// Accept signatures starting with magic bytes `0xdeadbeef` (padded with `0xcd`).
	MagicSignature,
	/// Accept all signatures as valid.
	AlwaysValid,
}

/// Settings handed to the runtime executor with every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
	/// Signature mock mode.
	pub signature_mock: SignatureMockMode,
	/// Whether to allow unresolved imports in the runtime.
	pub allow_unresolved_imports: bool,
	/// Maximum runtime log level (0=off, 1=error, 2=warn, 3=info, 4=debug, 5=trace).
	pub max_log_level: u32,
}

/// Configuration of a shadow chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChainConfig {
	/// Initial build mode of the transaction pool.
	pub build_mode: BuildBlockMode,
	/// Maximum number of blocks kept in the block registry.
	pub max_memory_block_count: usize,
	/// Accept magic signatures so transactions can impersonate any account.
	pub mock_signature_host: bool,
	/// Allow runtimes importing host functions the executor does not provide.
	pub allow_unresolved_imports: bool,
	/// Runtime log level (0=off .. 5=trace).
	pub runtime_log_level: u32,
	/// Run offchain workers on every new head.
	pub offchain_worker: bool,
	/// Extra type definitions used when decoding chain data.
	pub registered_types: serde_json::Value,
}

impl Default for ChainConfig {
	fn default() -> Self {
		Self {
			build_mode: BuildBlockMode::Batch,
			max_memory_block_count: DEFAULT_MAX_MEMORY_BLOCK_COUNT,
			mock_signature_host: false,
			allow_unresolved_imports: false,
			runtime_log_level: 0,
			offchain_worker: false,
			registered_types: serde_json::Value::Object(Default::default()),
		}
	}
}

impl ChainConfig {
	/// The executor settings derived from this configuration.
	pub fn executor_config(&self) -> ExecutorConfig {
		ExecutorConfig {
			signature_mock: if self.mock_signature_host {
				SignatureMockMode::MagicSignature
			} else {
				SignatureMockMode::None
			},
			allow_unresolved_imports: self.allow_unresolved_imports,
			max_log_level: self.runtime_log_level,
		}
	}
}

/// The collaborators and settings a [`Blockchain`] is assembled from.
pub(crate) struct BlockchainParts {
	pub remote: Arc<dyn RemoteSource>,
	pub executor: Arc<dyn RuntimeExecutor>,
	pub txpool: Arc<dyn TransactionPool>,
	pub inherent_provider: Arc<dyn InherentProvider>,
	pub head_state: Arc<dyn HeadState>,
	pub offchain_worker: Option<Arc<dyn OffchainWorker>>,
	pub store: Option<Arc<dyn SnapshotStore>>,
	pub header: HeaderInfo,
	pub config: ChainConfig,
}

/// Builder for [`Blockchain`].
///
/// # Example
///
/// ```ignore
/// let chain = BlockchainBuilder::new(remote, executor, txpool, inherents, head_state, header)
///     .config(ChainConfig { build_mode: BuildBlockMode::Instant, ..Default::default() })
///     .snapshot_store(Arc::new(MemoryStore::new()))
///     .build();
/// ```
pub struct BlockchainBuilder {
	parts: BlockchainParts,
}

impl BlockchainBuilder {
	/// Start a builder from the required collaborators and the header of the fork point.
	pub fn new(
		remote: Arc<dyn RemoteSource>,
		executor: Arc<dyn RuntimeExecutor>,
		txpool: Arc<dyn TransactionPool>,
		inherent_provider: Arc<dyn InherentProvider>,
		head_state: Arc<dyn HeadState>,
		header: HeaderInfo,
	) -> Self {
		Self {
			parts: BlockchainParts {
				remote,
				executor,
				txpool,
				inherent_provider,
				head_state,
				offchain_worker: None,
				store: None,
				header,
				config: ChainConfig::default(),
			},
		}
	}

	/// Replace the chain configuration.
	pub fn config(mut self, config: ChainConfig) -> Self {
		self.parts.config = config;
		self
	}

	/// Set the offchain worker run on head changes when `ChainConfig::offchain_worker` is set.
	pub fn offchain_worker(mut self, worker: Arc<dyn OffchainWorker>) -> Self {
		self.parts.offchain_worker = Some(worker);
		self
	}

	/// Persist remote storage reads in `store`.
	pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
		self.parts.store = Some(store);
		self
	}

	/// Assemble the blockchain.
	pub fn build(self) -> Arc<Blockchain> {
		Blockchain::from_parts(self.parts)
	}
}
