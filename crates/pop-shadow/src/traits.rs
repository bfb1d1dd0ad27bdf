// SPDX-License-Identifier: GPL-3.0

//! Contracts for the collaborators the coordinator drives.
//!
//! The coordinator never talks to the network, interprets runtime code or produces blocks
//! itself. Each of those concerns sits behind one of the traits below, and the coordinator
//! only decides *when* and *with which block* they are invoked.

use crate::{
	Block, DryRunExtrinsic, ExecutorConfig, StorageDiff, StorageView,
	block::HeaderInfo,
	error::{ExecutorError, HeadError, InherentError, RemoteError, StoreError, TxPoolError},
	messages::{
		BuildBlockMode, BuildBlockParams, DownwardMessage, HorizontalMessage, InherentParams,
		PartialBuildBlockParams,
	},
};
use async_trait::async_trait;
use sp_core::H256;
use std::sync::Arc;

/// Everything a runtime operation needs to know about the block it runs against.
///
/// Passed explicitly into every runtime call instead of blocks holding a reference back to
/// the chain.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
	/// The block the call executes at.
	pub block: &'a Block,
	/// Overlay writes visible to the call, on top of the remote state at `block`.
	pub storage: &'a StorageView,
	/// Executor settings derived from the chain configuration.
	pub config: &'a ExecutorConfig,
}

/// Result of a runtime call execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeCallResult {
	/// The output bytes returned by the runtime function.
	pub output: Vec<u8>,
	/// Storage changes made during execution.
	pub storage_diff: StorageDiff,
}

/// Read access to the live chain the shadow chain was forked from.
#[async_trait]
pub trait RemoteSource: Send + Sync {
	/// Resolves once the connection is usable.
	async fn ready(&self) -> Result<(), RemoteError>;

	/// Canonical hash of block `number`, or `None` when the remote does not know it.
	async fn block_hash(&self, number: u32) -> Result<Option<H256>, RemoteError>;

	/// Header of the block with `hash`.
	async fn header(&self, hash: H256) -> Result<HeaderInfo, RemoteError>;

	/// Raw storage value at `key` in the state of block `hash`.
	async fn storage(&self, hash: H256, key: &[u8]) -> Result<Option<Vec<u8>>, RemoteError>;

	/// Human readable chain name.
	async fn chain_name(&self) -> Result<String, RemoteError>;
}

/// Executes runtime entry points against a block's state.
#[async_trait]
pub trait RuntimeExecutor: Send + Sync {
	/// Call runtime `method` with SCALE-encoded `args`.
	async fn call(
		&self,
		ctx: CallContext<'_>,
		method: &str,
		args: &[u8],
	) -> Result<RuntimeCallResult, ExecutorError>;

	/// Apply `inherents` and then `extrinsic` on top of the context block without producing a
	/// block. The output is the SCALE-encoded `ApplyExtrinsicResult` of the extrinsic.
	async fn dry_run_extrinsic(
		&self,
		ctx: CallContext<'_>,
		inherents: &[Vec<u8>],
		extrinsic: &DryRunExtrinsic,
	) -> Result<RuntimeCallResult, ExecutorError>;

	/// Apply `inherents` on top of the context block and return the resulting storage writes.
	async fn dry_run_inherents(
		&self,
		ctx: CallContext<'_>,
		inherents: &[Vec<u8>],
	) -> Result<StorageDiff, ExecutorError>;
}

/// Builds the inherent extrinsics of a block.
#[async_trait]
pub trait InherentProvider: Send + Sync {
	/// Create the inherents for a block on top of the context block.
	async fn create_inherents(
		&self,
		ctx: CallContext<'_>,
		params: &InherentParams,
	) -> Result<Vec<Vec<u8>>, InherentError>;
}

/// Produces a new block from a parent and fully resolved build parameters.
#[async_trait]
pub trait BlockProducer: Send + Sync {
	async fn produce(
		&self,
		parent: Arc<Block>,
		params: BuildBlockParams,
	) -> Result<Arc<Block>, TxPoolError>;
}

/// Queues submitted work and turns it into blocks.
#[async_trait]
pub trait TransactionPool: Send + Sync {
	/// Queue a validated extrinsic.
	fn submit_extrinsic(&self, extrinsic: Vec<u8>) -> Result<(), TxPoolError>;

	/// Queue upward messages sent by `para_id`.
	fn submit_upward_messages(
		&self,
		para_id: u32,
		messages: Vec<Vec<u8>>,
	) -> Result<(), TxPoolError>;

	/// Queue downward messages.
	fn submit_downward_messages(&self, messages: Vec<DownwardMessage>) -> Result<(), TxPoolError>;

	/// Queue horizontal messages sent by `para_id`.
	fn submit_horizontal_messages(
		&self,
		para_id: u32,
		messages: Vec<HorizontalMessage>,
	) -> Result<(), TxPoolError>;

	/// Build one block on `parent`, taking omitted parameters from the queues.
	async fn build_block(
		&self,
		parent: Arc<Block>,
		params: PartialBuildBlockParams,
	) -> Result<Arc<Block>, TxPoolError>;

	/// Build one block on `parent` with exactly `params`, leaving the queues untouched.
	async fn build_block_with_params(
		&self,
		parent: Arc<Block>,
		params: BuildBlockParams,
	) -> Result<Arc<Block>, TxPoolError>;

	/// Number of blocks currently being built.
	fn upcoming_blocks(&self) -> usize;

	/// Current build mode.
	fn mode(&self) -> BuildBlockMode;

	/// Change the build mode.
	fn set_mode(&self, mode: BuildBlockMode);
}

/// Receives head transitions (e.g. to notify storage subscribers).
#[async_trait]
pub trait HeadState: Send + Sync {
	async fn set_head(&self, block: &Arc<Block>) -> Result<(), HeadError>;
}

/// Runs offchain workers for a new head.
#[async_trait]
pub trait OffchainWorker: Send + Sync {
	async fn run(&self, block: &Arc<Block>) -> Result<(), HeadError>;
}

/// Persistent key/value snapshots of remote state, keyed by block hash.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
	/// A previously stored value. `Some(None)` records a key known to be absent.
	async fn get(
		&self,
		block_hash: H256,
		key: &[u8],
	) -> Result<Option<Option<Vec<u8>>>, StoreError>;

	/// Store `value` for `key` at `block_hash`.
	async fn set(
		&self,
		block_hash: H256,
		key: &[u8],
		value: Option<&[u8]>,
	) -> Result<(), StoreError>;
}
