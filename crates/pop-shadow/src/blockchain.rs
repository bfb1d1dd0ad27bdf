// SPDX-License-Identifier: GPL-3.0

//! Chain-state coordinator for shadow chains.
//!
//! This module provides the [`Blockchain`] struct, the entry point for running a speculative
//! local chain on top of a live Polkadot SDK chain.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Blockchain                             │
//! │                                                                 │
//! │  get_block / get_block_at ──► BlockRegistry ──miss──► Resolver  │
//! │                                    ▲            (one fetch per  │
//! │                                    │             hash in flight)│
//! │  set_head ──► head pointer ────────┘                  │         │
//! │      │                                                ▼         │
//! │      └──► HeadState, OffchainWorker            RemoteSource     │
//! │                                                                 │
//! │  submit_* ──► validate (RuntimeExecutor) ──► TransactionPool    │
//! │  new_block ──► TransactionPool::build_block ──► set_head        │
//! │  dry_run_* ──► InherentProvider ──► RuntimeExecutor             │
//! │                (private OverlayScope per call)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pop_shadow::{BlockchainBuilder, ChainConfig, HeaderInfo};
//!
//! let chain = BlockchainBuilder::new(remote, executor, txpool, inherents, head_state, header)
//!     .config(ChainConfig::default())
//!     .build();
//!
//! // Submit a transaction and build a block with it
//! let hash = chain.submit_extrinsic(extrinsic).await?;
//! let head = chain.new_block(Default::default()).await?;
//!
//! // Query storage at head
//! let value = chain.storage(&key).await?;
//! ```

use crate::{
	Block,
	config::{BlockchainParts, ChainConfig, ExecutorConfig},
	error::BlockchainError,
	logging,
	messages::{
		BuildBlockMode, BuildBlockParams, DownwardMessage, HorizontalMessage,
		PartialBuildBlockParams,
	},
	registry::BlockRegistry,
	strings::txpool::runtime_api,
	traits::{
		CallContext, HeadState, InherentProvider, OffchainWorker, RemoteSource, RuntimeCallResult,
		RuntimeExecutor, SnapshotStore, TransactionPool,
	},
	validity::{TransactionSource, TransactionValidity},
};
use futures::future::{BoxFuture, FutureExt, Shared};
use scale::Decode;
use sp_core::H256;
use std::{
	collections::HashMap,
	sync::{
		Arc, Weak,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};
use tokio::sync::{Mutex, RwLock};

/// How long batch mode waits for further submissions before building a block.
const BATCH_BUILD_DELAY: Duration = Duration::from_millis(100);

/// A header fetch shared by every caller resolving the same hash.
type Resolution = Shared<BoxFuture<'static, Option<Arc<Block>>>>;

type InFlight = Arc<Mutex<HashMap<H256, Resolution>>>;

/// Registry and head, always mutated together under one lock.
#[derive(Debug)]
struct ChainState {
	head: Arc<Block>,
	registry: BlockRegistry,
}

impl ChainState {
	fn lookup(&self, hash: &H256) -> Option<Arc<Block>> {
		if self.head.hash == *hash {
			return Some(self.head.clone());
		}
		self.registry.get_by_hash(hash)
	}

	fn register(&mut self, block: Arc<Block>) -> Arc<Block> {
		let head = self.head.hash;
		self.registry.register(block, head)
	}
}

/// The chain-state coordinator of a shadow chain.
///
/// `Blockchain` owns the block registry and the head pointer, resolves unknown blocks against
/// the remote chain, validates and forwards submissions to the transaction pool, and runs
/// speculative executions that never write to canonical state.
///
/// # Thread Safety
///
/// `Blockchain` is `Send + Sync` and is always handed out as `Arc<Blockchain>`.
/// Registry and head live behind one `RwLock`; the lock is never held across a call into a
/// collaborator.
pub struct Blockchain {
	remote: Arc<dyn RemoteSource>,
	executor: Arc<dyn RuntimeExecutor>,
	txpool: Arc<dyn TransactionPool>,
	inherent_provider: Arc<dyn InherentProvider>,
	head_state: Arc<dyn HeadState>,
	offchain_worker: Option<Arc<dyn OffchainWorker>>,
	store: Option<Arc<dyn SnapshotStore>>,

	config: ChainConfig,
	executor_config: ExecutorConfig,

	state: Arc<RwLock<ChainState>>,
	/// Header fetches in progress, keyed by block hash.
	in_flight: InFlight,
	/// Serializes block production so every build sees the previous one as its parent.
	build_lock: Mutex<()>,
	batch_scheduled: AtomicBool,
	this: Weak<Self>,
}

impl Blockchain {
	pub(crate) fn from_parts(parts: BlockchainParts) -> Arc<Self> {
		let BlockchainParts {
			remote,
			executor,
			txpool,
			inherent_provider,
			head_state,
			offchain_worker,
			store,
			header,
			config,
		} = parts;

		if config.offchain_worker && offchain_worker.is_none() {
			log::warn!("Offchain worker enabled without an offchain worker; heads will not run it");
		}
		txpool.set_mode(config.build_mode);

		let mut registry = BlockRegistry::new(config.max_memory_block_count);
		let head = registry.register(Arc::new(Block::new(header.number, header.hash)), header.hash);
		log::debug!("Shadow chain at #{} ({:?})", head.number, head.hash);

		let executor_config = config.executor_config();
		Arc::new_cyclic(|this| Self {
			remote,
			executor,
			txpool,
			inherent_provider,
			head_state,
			offchain_worker,
			store,
			config,
			executor_config,
			state: Arc::new(RwLock::new(ChainState { head, registry })),
			in_flight: Arc::new(Mutex::new(HashMap::new())),
			build_lock: Mutex::new(()),
			batch_scheduled: AtomicBool::new(false),
			this: this.clone(),
		})
	}

	/// The configuration this chain was built with.
	pub fn config(&self) -> &ChainConfig {
		&self.config
	}

	/// The transaction pool submissions are forwarded to.
	pub fn txpool(&self) -> &Arc<dyn TransactionPool> {
		&self.txpool
	}

	/// Name of the remote chain.
	pub async fn chain_name(&self) -> Result<String, BlockchainError> {
		Ok(self.remote.chain_name().await?)
	}

	/// The current head.
	pub async fn head(&self) -> Arc<Block> {
		self.state.read().await.head.clone()
	}

	/// Get the block at `number`, or the head when `number` is `None`.
	///
	/// Numbers above the head resolve to `None` without contacting the remote chain. Unknown
	/// numbers are looked up on the remote chain and registered.
	///
	/// # Errors
	///
	/// Remote failures propagate.
	pub async fn get_block_at(
		&self,
		number: Option<u32>,
	) -> Result<Option<Arc<Block>>, BlockchainError> {
		let Some(number) = number else {
			return Ok(Some(self.head().await));
		};
		{
			let state = self.state.read().await;
			if number > state.head.number {
				return Ok(None);
			}
			if let Some(block) = state.registry.get_by_number(number) {
				return Ok(Some(block));
			}
		}

		let Some(hash) = self.remote.block_hash(number).await? else {
			return Ok(None);
		};
		let block = Arc::new(Block::new(number, hash));
		Ok(Some(self.state.write().await.register(block)))
	}

	/// Get the block with `hash`, or the head when `hash` is `None`.
	///
	/// Unknown hashes are resolved by fetching their header from the remote chain. Concurrent
	/// callers asking for the same hash share a single fetch and observe the same result. A
	/// failed fetch is logged and resolves to `None`; the next call retries.
	pub async fn get_block(
		&self,
		hash: Option<H256>,
	) -> Result<Option<Arc<Block>>, BlockchainError> {
		self.remote.ready().await?;
		let Some(hash) = hash else {
			return Ok(Some(self.head().await));
		};
		if let Some(block) = self.state.read().await.lookup(&hash) {
			return Ok(Some(block));
		}

		let resolution = {
			let mut in_flight = self.in_flight.lock().await;
			// A resolution may have settled since the first lookup.
			if let Some(block) = self.state.read().await.lookup(&hash) {
				return Ok(Some(block));
			}
			in_flight
				.entry(hash)
				.or_insert_with(|| {
					Self::resolve(
						self.remote.clone(),
						self.state.clone(),
						self.in_flight.clone(),
						hash,
					)
					.boxed()
					.shared()
				})
				.clone()
		};
		Ok(resolution.await)
	}

	async fn resolve(
		remote: Arc<dyn RemoteSource>,
		state: Arc<RwLock<ChainState>>,
		in_flight: InFlight,
		hash: H256,
	) -> Option<Arc<Block>> {
		let block = match remote.header(hash).await {
			Ok(header) => {
				let block = Arc::new(Block::new(header.number, hash));
				Some(state.write().await.register(block))
			},
			Err(err) => {
				log::debug!("get_block({hash:?}) failed: {err}");
				None
			},
		};
		in_flight.lock().await.remove(&hash);
		block
	}

	/// All blocks held in memory, oldest registered first.
	pub async fn blocks_in_memory(&self) -> Vec<Arc<Block>> {
		self.state.read().await.registry.blocks()
	}

	/// Forget `block`.
	///
	/// # Errors
	///
	/// Returns [`BlockchainError::InvariantViolation`] when `block` is the current head.
	pub async fn unregister_block(&self, block: &Block) -> Result<(), BlockchainError> {
		let mut state = self.state.write().await;
		let head = state.head.hash;
		Ok(state.registry.unregister(block, head)?)
	}

	/// Make `block` the head.
	///
	/// The head pointer is updated and the block registered before head-state subscribers and
	/// the offchain worker (if enabled) are notified. Their errors propagate, but the head is
	/// not rolled back. Concurrent calls are not serialized: the last pointer write wins.
	pub async fn set_head(&self, block: Arc<Block>) -> Result<(), BlockchainError> {
		log::debug!("setHead #{} ({:?})", block.number, block.hash);
		let head = {
			let mut state = self.state.write().await;
			let hash = block.hash;
			let head = state.registry.register(block, hash);
			state.head = head.clone();
			head
		};

		self.head_state.set_head(&head).await?;
		if self.config.offchain_worker {
			if let Some(worker) = &self.offchain_worker {
				worker.run(&head).await?;
			}
		}
		Ok(())
	}

	/// Check `extrinsic` against the runtime at the current head.
	///
	/// Calls `TaggedTransactionQueue_validate_transaction` with `source ++ extrinsic ++
	/// head_hash`.
	///
	/// # Returns
	///
	/// The decoded validity, which may itself be an error.
	pub async fn validate_extrinsic(
		&self,
		extrinsic: &[u8],
		source: TransactionSource,
	) -> Result<TransactionValidity, BlockchainError> {
		let head = self.head().await;

		let mut args = Vec::with_capacity(1 + extrinsic.len() + 32);
		args.push(source.as_byte());
		args.extend(extrinsic);
		args.extend(head.hash.as_bytes());

		let result =
			self.call_at(&head, runtime_api::TAGGED_TRANSACTION_QUEUE_VALIDATE, &args).await?;
		TransactionValidity::decode(&mut result.output.as_slice())
			.map_err(|source| BlockchainError::Codec { what: "TransactionValidity", source })
	}

	/// Validate `extrinsic` as an external transaction and queue it.
	///
	/// # Returns
	///
	/// The blake2-256 hash of the extrinsic bytes.
	///
	/// # Errors
	///
	/// [`BlockchainError::InvalidTransaction`] carrying the runtime's verdict when validation
	/// fails. Nothing is queued in that case.
	pub async fn submit_extrinsic(&self, extrinsic: Vec<u8>) -> Result<H256, BlockchainError> {
		if let TransactionValidity::Err(err) =
			self.validate_extrinsic(&extrinsic, TransactionSource::External).await?
		{
			log::debug!("Rejected extrinsic {}: {}", logging::hex(&extrinsic), err.reason());
			return Err(BlockchainError::InvalidTransaction(err));
		}

		let hash = H256::from(sp_core::blake2_256(&extrinsic));
		self.txpool.submit_extrinsic(extrinsic)?;
		log::debug!("Submitted extrinsic {hash:?}");
		self.on_submission().await;
		Ok(hash)
	}

	/// Queue upward messages sent by `para_id`.
	pub async fn submit_upward_messages(
		&self,
		para_id: u32,
		messages: Vec<Vec<u8>>,
	) -> Result<(), BlockchainError> {
		log::debug!(
			"submitUpwardMessages para {para_id}: {}",
			logging::truncate_json(&hex_list(&messages))
		);
		self.txpool.submit_upward_messages(para_id, messages)?;
		self.on_submission().await;
		Ok(())
	}

	/// Queue downward messages.
	pub async fn submit_downward_messages(
		&self,
		messages: Vec<DownwardMessage>,
	) -> Result<(), BlockchainError> {
		log::debug!("submitDownwardMessages: {} message(s)", messages.len());
		self.txpool.submit_downward_messages(messages)?;
		self.on_submission().await;
		Ok(())
	}

	/// Queue horizontal messages sent by `para_id`.
	pub async fn submit_horizontal_messages(
		&self,
		para_id: u32,
		messages: Vec<HorizontalMessage>,
	) -> Result<(), BlockchainError> {
		log::debug!("submitHorizontalMessages para {para_id}: {} message(s)", messages.len());
		self.txpool.submit_horizontal_messages(para_id, messages)?;
		self.on_submission().await;
		Ok(())
	}

	/// Build a block on the head, taking omitted parameters from the pool, and make it the
	/// new head.
	pub async fn new_block(
		&self,
		params: PartialBuildBlockParams,
	) -> Result<Arc<Block>, BlockchainError> {
		let _building = self.build_lock.lock().await;
		let parent = self.head().await;
		let block = self.txpool.build_block(parent, params).await?;
		self.set_head(block).await?;
		Ok(self.head().await)
	}

	/// Build a block on the head with exactly `params` and make it the new head.
	pub async fn new_block_with_params(
		&self,
		params: BuildBlockParams,
	) -> Result<Arc<Block>, BlockchainError> {
		let _building = self.build_lock.lock().await;
		let parent = self.head().await;
		let block = self.txpool.build_block_with_params(parent, params).await?;
		self.set_head(block).await?;
		Ok(self.head().await)
	}

	/// Number of blocks the pool is currently building.
	pub fn upcoming_blocks(&self) -> usize {
		self.txpool.upcoming_blocks()
	}

	/// Read `key` at the current head.
	pub async fn storage(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError> {
		let head = self.head().await;
		self.storage_at(&head, key).await
	}

	/// Read `key` at `block`.
	///
	/// The block's overlay is consulted first, then the snapshot store, then the remote chain.
	/// Remote reads are written back to the snapshot store.
	pub async fn storage_at(
		&self,
		block: &Block,
		key: &[u8],
	) -> Result<Option<Vec<u8>>, BlockchainError> {
		if let Some(value) = block.view().get(key) {
			return Ok(value);
		}

		let base = block.remote_base();
		if let Some(store) = &self.store {
			if let Some(value) = store.get(base, key).await? {
				return Ok(value);
			}
		}

		let value = self.remote.storage(base, key).await?;
		log::trace!("Fetched {} at {base:?} from remote", logging::hex(key));
		if let Some(store) = &self.store {
			store.set(base, key, value.as_deref()).await?;
		}
		Ok(value)
	}

	/// Execute runtime `method` at `block` with SCALE-encoded `args`.
	///
	/// Storage writes made by the call are returned, not applied.
	pub async fn call_at(
		&self,
		block: &Block,
		method: &str,
		args: &[u8],
	) -> Result<RuntimeCallResult, BlockchainError> {
		let view = block.view();
		let ctx = CallContext { block, storage: &view, config: &self.executor_config };
		log::trace!("Calling {method} at #{}", block.number);
		Ok(self.executor.call(ctx, method, args).await?)
	}

	/// Resolve `at` (or the head) for a speculative execution.
	pub(crate) async fn resolve_at(&self, at: Option<H256>) -> Result<Arc<Block>, BlockchainError> {
		match at {
			None => {
				self.remote.ready().await?;
				Ok(self.head().await)
			},
			Some(hash) => self
				.get_block(Some(hash))
				.await?
				.ok_or_else(|| BlockchainError::BlockNotFound(format!("{hash:?}"))),
		}
	}

	pub(crate) fn executor(&self) -> &Arc<dyn RuntimeExecutor> {
		&self.executor
	}

	pub(crate) fn inherent_provider(&self) -> &Arc<dyn InherentProvider> {
		&self.inherent_provider
	}

	pub(crate) fn executor_config(&self) -> &ExecutorConfig {
		&self.executor_config
	}

	async fn on_submission(&self) {
		match self.txpool.mode() {
			BuildBlockMode::Instant =>
				if let Err(err) = self.new_block(PartialBuildBlockParams::default()).await {
					log::warn!("Failed to build block: {err}");
				},
			BuildBlockMode::Batch => self.schedule_batch_build(),
			BuildBlockMode::Manual => {},
		}
	}

	fn schedule_batch_build(&self) {
		if self.batch_scheduled.swap(true, Ordering::SeqCst) {
			return;
		}
		let this = self.this.clone();
		tokio::spawn(async move {
			tokio::time::sleep(BATCH_BUILD_DELAY).await;
			let Some(chain) = this.upgrade() else {
				return;
			};
			chain.batch_scheduled.store(false, Ordering::SeqCst);
			if let Err(err) = chain.new_block(PartialBuildBlockParams::default()).await {
				log::warn!("Failed to build batched block: {err}");
			}
		});
	}
}

fn hex_list(items: &[Vec<u8>]) -> serde_json::Value {
	items.iter().map(|item| format!("0x{}", hex::encode(item))).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		StorageLayer,
		error::{HeadError, RegistryError},
		testing::{MockBlockProducer, TestChain, mock_hash},
		validity::{InvalidTransaction, TransactionValidityError},
	};
	use futures::future::join_all;

	#[tokio::test]
	async fn construction_registers_head() {
		let chain = TestChain::new(100);
		let head = chain.blockchain.head().await;

		assert_eq!(head.number, 100);
		assert_eq!(head.hash, mock_hash(100));
		let blocks = chain.blockchain.blocks_in_memory().await;
		assert_eq!(blocks.len(), 1);
		assert!(Arc::ptr_eq(&blocks[0], &head));
		assert_eq!(chain.blockchain.chain_name().await.unwrap(), "Mock Chain");
	}

	#[tokio::test]
	async fn get_block_at_none_returns_head() {
		let chain = TestChain::new(10);
		let head = chain.blockchain.head().await;
		let block = chain.blockchain.get_block_at(None).await.unwrap().unwrap();
		assert!(Arc::ptr_eq(&block, &head));
	}

	#[tokio::test]
	async fn get_block_at_above_head_does_not_fetch() {
		let chain = TestChain::new(10);
		assert!(chain.blockchain.get_block_at(Some(11)).await.unwrap().is_none());
		assert_eq!(chain.remote.block_hash_calls(), 0);
	}

	#[tokio::test]
	async fn get_block_at_fetches_once_then_serves_from_registry() {
		let chain = TestChain::new(10);

		let first = chain.blockchain.get_block_at(Some(5)).await.unwrap().unwrap();
		let second = chain.blockchain.get_block_at(Some(5)).await.unwrap().unwrap();

		assert_eq!(first.hash, mock_hash(5));
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(chain.remote.block_hash_calls(), 1);
		let by_hash = chain.blockchain.get_block(Some(mock_hash(5))).await.unwrap().unwrap();
		assert!(Arc::ptr_eq(&by_hash, &first));
		assert_eq!(chain.remote.header_calls(), 0);
	}

	#[tokio::test]
	async fn get_block_at_unknown_remote_number_is_none() {
		let chain = TestChain::new(10);
		let eleven = chain.blockchain.new_block(Default::default()).await.unwrap();
		chain.blockchain.new_block(Default::default()).await.unwrap();
		chain.blockchain.unregister_block(&eleven).await.unwrap();

		assert!(chain.blockchain.get_block_at(Some(11)).await.unwrap().is_none());
		assert_eq!(chain.remote.block_hash_calls(), 1);
	}

	#[tokio::test]
	async fn eviction_forces_refetch_of_evicted_number() {
		let config = ChainConfig {
			build_mode: BuildBlockMode::Manual,
			max_memory_block_count: 2,
			..Default::default()
		};
		let chain = TestChain::with_config(100, config);

		chain.blockchain.get_block_at(Some(98)).await.unwrap().unwrap();
		chain.blockchain.get_block_at(Some(99)).await.unwrap().unwrap();
		assert_eq!(chain.remote.block_hash_calls(), 2);

		let numbers: Vec<u32> =
			chain.blockchain.blocks_in_memory().await.iter().map(|b| b.number).collect();
		assert_eq!(numbers, vec![100, 99]);

		chain.blockchain.get_block_at(Some(98)).await.unwrap().unwrap();
		assert_eq!(chain.remote.block_hash_calls(), 3);
	}

	#[tokio::test]
	async fn registry_is_bounded_and_keeps_head() {
		let config = ChainConfig {
			build_mode: BuildBlockMode::Manual,
			max_memory_block_count: 3,
			..Default::default()
		};
		let chain = TestChain::with_config(50, config);
		let head = chain.blockchain.head().await;

		for n in 0..20 {
			chain.blockchain.get_block_at(Some(n)).await.unwrap();
			assert!(chain.blockchain.blocks_in_memory().await.len() <= 3);
		}

		let by_number = chain.blockchain.get_block_at(Some(50)).await.unwrap().unwrap();
		let by_hash = chain.blockchain.get_block(Some(head.hash)).await.unwrap().unwrap();
		assert!(Arc::ptr_eq(&by_number, &head));
		assert!(Arc::ptr_eq(&by_hash, &head));
	}

	#[tokio::test]
	async fn concurrent_get_block_shares_one_fetch() {
		let chain = TestChain::new(10);
		chain.remote.set_header_delay(Duration::from_millis(50));
		let hash = mock_hash(3);

		let results = join_all((0..8).map(|_| chain.blockchain.get_block(Some(hash)))).await;

		assert_eq!(chain.remote.header_calls(), 1);
		let blocks: Vec<Arc<Block>> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
		assert!(blocks.iter().all(|b| Arc::ptr_eq(b, &blocks[0])));
		assert_eq!(blocks[0].number, 3);
	}

	#[tokio::test]
	async fn concurrent_failed_fetch_is_shared_and_retried() {
		let chain = TestChain::new(10);
		chain.remote.set_header_delay(Duration::from_millis(20));
		chain.remote.fail_headers(true);
		let hash = mock_hash(4);

		let results = join_all((0..4).map(|_| chain.blockchain.get_block(Some(hash)))).await;
		assert!(results.into_iter().all(|r| r.unwrap().is_none()));
		assert_eq!(chain.remote.header_calls(), 1);

		chain.remote.fail_headers(false);
		let block = chain.blockchain.get_block(Some(hash)).await.unwrap().unwrap();
		assert_eq!(block.number, 4);
		assert_eq!(chain.remote.header_calls(), 2);
	}

	#[tokio::test]
	async fn get_block_unknown_hash_is_none() {
		let chain = TestChain::new(10);
		assert!(chain.blockchain.get_block(Some(H256::repeat_byte(0xee))).await.unwrap().is_none());
		assert!(chain.blockchain.get_block(None).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn unregister_head_is_an_invariant_violation() {
		let chain = TestChain::new(10);
		let head = chain.blockchain.head().await;

		let result = chain.blockchain.unregister_block(&head).await;

		assert!(matches!(
			result,
			Err(BlockchainError::InvariantViolation(RegistryError::HeadUnregister(hash)))
				if hash == head.hash
		));
		assert!(chain.blockchain.get_block(Some(head.hash)).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn unregister_block_removes_it() {
		let chain = TestChain::new(10);
		let block = chain.blockchain.get_block_at(Some(2)).await.unwrap().unwrap();

		chain.blockchain.unregister_block(&block).await.unwrap();

		assert_eq!(chain.blockchain.blocks_in_memory().await.len(), 1);
	}

	#[tokio::test]
	async fn set_head_registers_and_notifies() {
		let chain = TestChain::new(10);
		let block = Arc::new(Block::new(7, mock_hash(7)));

		chain.blockchain.set_head(block.clone()).await.unwrap();

		let head = chain.blockchain.head().await;
		assert!(Arc::ptr_eq(&head, &block));
		let by_number = chain.blockchain.get_block_at(Some(7)).await.unwrap().unwrap();
		assert!(Arc::ptr_eq(&by_number, &block));
		assert_eq!(chain.head_state.heads(), vec![block.hash]);
		assert!(chain.offchain_worker.runs().is_empty());
	}

	#[tokio::test]
	async fn set_head_reuses_registered_identity() {
		let chain = TestChain::new(10);
		let registered = chain.blockchain.get_block_at(Some(4)).await.unwrap().unwrap();

		chain.blockchain.set_head(Arc::new(Block::new(4, mock_hash(4)))).await.unwrap();

		assert!(Arc::ptr_eq(&chain.blockchain.head().await, &registered));
	}

	#[tokio::test]
	async fn set_head_runs_offchain_worker_when_enabled() {
		let config = ChainConfig {
			build_mode: BuildBlockMode::Manual,
			offchain_worker: true,
			..Default::default()
		};
		let chain = TestChain::with_config(10, config);
		let block = chain.blockchain.get_block_at(Some(9)).await.unwrap().unwrap();

		chain.blockchain.set_head(block.clone()).await.unwrap();

		assert_eq!(chain.offchain_worker.runs(), vec![block.hash]);
	}

	#[tokio::test]
	async fn set_head_error_propagates_without_rollback() {
		let chain = TestChain::new(10);
		chain.head_state.fail(true);
		let block = Arc::new(Block::new(8, mock_hash(8)));

		let result = chain.blockchain.set_head(block.clone()).await;

		assert!(matches!(result, Err(BlockchainError::Head(_))));
		assert!(Arc::ptr_eq(&chain.blockchain.head().await, &block));
	}

	#[tokio::test]
	async fn offchain_worker_skipped_when_head_state_fails() {
		let config = ChainConfig {
			build_mode: BuildBlockMode::Manual,
			offchain_worker: true,
			..Default::default()
		};
		let chain = TestChain::with_config(10, config);
		chain.head_state.fail(true);
		let block = Arc::new(Block::new(8, mock_hash(8)));

		let result = chain.blockchain.set_head(block.clone()).await;

		assert!(matches!(result, Err(BlockchainError::Head(HeadError::HeadState(_)))));
		assert!(chain.offchain_worker.runs().is_empty());
		assert!(Arc::ptr_eq(&chain.blockchain.head().await, &block));
	}

	#[tokio::test]
	async fn offchain_worker_error_propagates() {
		let config = ChainConfig {
			build_mode: BuildBlockMode::Manual,
			offchain_worker: true,
			..Default::default()
		};
		let chain = TestChain::with_config(10, config);
		chain.offchain_worker.fail(true);
		let block = Arc::new(Block::new(8, mock_hash(8)));

		let result = chain.blockchain.set_head(block.clone()).await;

		assert!(matches!(result, Err(BlockchainError::Head(HeadError::OffchainWorker(_)))));
		assert_eq!(chain.head_state.heads(), vec![block.hash]);
		assert!(Arc::ptr_eq(&chain.blockchain.head().await, &block));
	}

	#[tokio::test]
	async fn head_stays_reachable_by_number_after_sibling_fetch() {
		let chain = TestChain::new(10);
		let head = Arc::new(Block::new(5, H256::repeat_byte(0x55)));
		chain.blockchain.set_head(head.clone()).await.unwrap();

		let sibling = chain.blockchain.get_block(Some(mock_hash(5))).await.unwrap().unwrap();
		assert_eq!(sibling.number, 5);

		let by_number = chain.blockchain.get_block_at(Some(5)).await.unwrap().unwrap();
		assert!(Arc::ptr_eq(&by_number, &head));
	}

	#[tokio::test]
	async fn single_block_capacity_holds_only_head() {
		let config = ChainConfig {
			build_mode: BuildBlockMode::Manual,
			max_memory_block_count: 1,
			..Default::default()
		};
		let chain = TestChain::with_config(10, config);

		chain.blockchain.get_block_at(Some(5)).await.unwrap().unwrap();
		chain.blockchain.get_block_at(Some(6)).await.unwrap().unwrap();

		let blocks = chain.blockchain.blocks_in_memory().await;
		assert_eq!(blocks.len(), 1);
		assert_eq!(blocks[0].number, 10);
	}

	#[tokio::test]
	async fn validate_extrinsic_passes_source_extrinsic_and_head_hash() {
		let chain = TestChain::new(10);
		let head = chain.blockchain.head().await;

		let validity =
			chain.blockchain.validate_extrinsic(&[0xde, 0xad], TransactionSource::Local).await;

		assert!(matches!(validity, Ok(TransactionValidity::Ok(_))));
		let call = chain.executor.calls().pop().unwrap();
		assert_eq!(call.method, runtime_api::TAGGED_TRANSACTION_QUEUE_VALIDATE);
		assert_eq!(call.block, head.hash);
		let expected = [&[0x01, 0xde, 0xad][..], head.hash.as_bytes()].concat();
		assert_eq!(call.args, expected);
	}

	#[tokio::test]
	async fn submit_valid_extrinsic_returns_its_hash() {
		let chain = TestChain::new(10);

		let hash = chain.blockchain.submit_extrinsic(vec![1, 2, 3]).await.unwrap();
		let again = chain.blockchain.submit_extrinsic(vec![1, 2, 3]).await.unwrap();
		let other = chain.blockchain.submit_extrinsic(vec![4]).await.unwrap();

		assert_eq!(hash, H256::from(sp_core::blake2_256(&[1, 2, 3])));
		assert_eq!(hash, again);
		assert_ne!(hash, other);
		assert_eq!(chain.txpool.len().unwrap(), 3);
		assert_eq!(chain.executor.calls()[0].args[0], 0x02);
	}

	#[tokio::test]
	async fn submit_invalid_extrinsic_is_rejected_verbatim() {
		let chain = TestChain::new(10);
		let invalid = TransactionValidityError::Invalid(InvalidTransaction::BadProof);
		chain.executor.set_validity(TransactionValidity::Err(invalid.clone()));

		let result = chain.blockchain.submit_extrinsic(vec![0xde, 0xad]).await;

		assert!(matches!(result, Err(BlockchainError::InvalidTransaction(err)) if err == invalid));
		assert!(chain.txpool.is_empty().unwrap());
	}

	#[tokio::test]
	async fn undecodable_validity_is_a_codec_error() {
		let chain = TestChain::new(10);
		chain.executor.set_raw_validity(vec![0x07]);

		let result = chain.blockchain.validate_extrinsic(&[1], TransactionSource::External).await;

		assert!(matches!(result, Err(BlockchainError::Codec { what: "TransactionValidity", .. })));
		assert!(chain.blockchain.submit_extrinsic(vec![1]).await.is_err());
		assert!(chain.txpool.is_empty().unwrap());
	}

	#[tokio::test]
	async fn new_block_builds_on_head_with_pending_work() {
		let chain = TestChain::new(10);
		chain.blockchain.submit_extrinsic(vec![7, 7]).await.unwrap();
		chain.blockchain.submit_upward_messages(1000, vec![vec![0xaa]]).await.unwrap();
		chain
			.blockchain
			.submit_downward_messages(vec![DownwardMessage { sent_at: 10, msg: vec![1] }])
			.await
			.unwrap();
		chain
			.blockchain
			.submit_horizontal_messages(2000, vec![HorizontalMessage { sent_at: 10, data: vec![2] }])
			.await
			.unwrap();

		let block = chain.blockchain.new_block(Default::default()).await.unwrap();

		assert_eq!(block.number, 11);
		assert!(Arc::ptr_eq(&chain.blockchain.head().await, &block));
		assert_eq!(chain.head_state.heads(), vec![block.hash]);
		let params = chain.producer.last_params().unwrap();
		assert_eq!(params.transactions, vec![vec![7, 7]]);
		assert_eq!(params.upward_messages[&1000], vec![vec![0xaa]]);
		assert_eq!(params.downward_messages[0].msg, vec![1]);
		assert_eq!(params.horizontal_messages[&2000][0].data, vec![2]);
		assert!(chain.txpool.is_empty().unwrap());

		let included = MockBlockProducer::included_key(&[7, 7]);
		assert_eq!(chain.blockchain.storage(&included).await.unwrap(), Some(vec![7, 7]));
	}

	#[tokio::test]
	async fn new_block_with_params_leaves_pool_untouched() {
		let chain = TestChain::new(10);
		chain.blockchain.submit_extrinsic(vec![1]).await.unwrap();

		let params = BuildBlockParams { transactions: vec![vec![2]], ..Default::default() };
		let block = chain.blockchain.new_block_with_params(params).await.unwrap();

		assert_eq!(block.number, 11);
		assert_eq!(chain.producer.last_params().unwrap().transactions, vec![vec![2]]);
		assert_eq!(chain.txpool.len().unwrap(), 1);
		assert_eq!(chain.blockchain.upcoming_blocks(), 0);
	}

	#[tokio::test]
	async fn instant_mode_builds_on_every_submission() {
		let config = ChainConfig { build_mode: BuildBlockMode::Instant, ..Default::default() };
		let chain = TestChain::with_config(10, config);

		chain.blockchain.submit_extrinsic(vec![1]).await.unwrap();
		chain.blockchain.submit_upward_messages(1000, vec![vec![2]]).await.unwrap();

		assert_eq!(chain.blockchain.head().await.number, 12);
		assert_eq!(chain.producer.produced(), 2);
		assert!(chain.txpool.is_empty().unwrap());
	}

	#[tokio::test]
	async fn batch_mode_builds_one_block_for_a_burst() {
		let chain = TestChain::with_config(10, ChainConfig::default());

		chain.blockchain.submit_extrinsic(vec![1]).await.unwrap();
		chain.blockchain.submit_extrinsic(vec![2]).await.unwrap();
		assert_eq!(chain.producer.produced(), 0);

		tokio::time::sleep(BATCH_BUILD_DELAY * 3).await;

		assert_eq!(chain.producer.produced(), 1);
		assert_eq!(chain.producer.last_params().unwrap().transactions, vec![vec![1], vec![2]]);
		assert_eq!(chain.blockchain.head().await.number, 11);
	}

	#[tokio::test]
	async fn storage_reads_overlay_then_store_then_remote() {
		let chain = TestChain::new(10);
		chain.remote.set_storage(b"remote", b"value");

		assert_eq!(chain.blockchain.storage(b"remote").await.unwrap(), Some(b"value".to_vec()));
		assert_eq!(chain.blockchain.storage(b"remote").await.unwrap(), Some(b"value".to_vec()));
		assert_eq!(chain.remote.storage_calls(), 1);

		assert_eq!(chain.blockchain.storage(b"missing").await.unwrap(), None);
		assert_eq!(chain.blockchain.storage(b"missing").await.unwrap(), None);
		assert_eq!(chain.remote.storage_calls(), 2);

		let mut layer = StorageLayer::new();
		layer.set(b"remote".to_vec(), None);
		layer.set(b"local".to_vec(), Some(b"1".to_vec()));
		chain.blockchain.head().await.push_layer(layer);

		assert_eq!(chain.blockchain.storage(b"remote").await.unwrap(), None);
		assert_eq!(chain.blockchain.storage(b"local").await.unwrap(), Some(b"1".to_vec()));
		assert_eq!(chain.remote.storage_calls(), 2);
	}

	#[tokio::test]
	async fn produced_blocks_read_remote_state_of_fork_point() {
		let chain = TestChain::new(10);
		chain.remote.set_storage(b"key", b"fork");

		let block = chain.blockchain.new_block(Default::default()).await.unwrap();

		assert_eq!(block.remote_base(), mock_hash(10));
		let value = chain.blockchain.storage_at(&block, b"key").await.unwrap();
		assert_eq!(value, Some(b"fork".to_vec()));
	}

	#[tokio::test]
	async fn call_at_uses_block_view_and_config() {
		let chain = TestChain::new(10);
		let block = chain.blockchain.get_block_at(Some(3)).await.unwrap().unwrap();
		let mut layer = StorageLayer::new();
		layer.set(b"k".to_vec(), Some(b"v".to_vec()));
		block.push_layer(layer);

		chain.blockchain.call_at(&block, "Core_version", &[]).await.unwrap();

		let call = chain.executor.calls().pop().unwrap();
		assert_eq!(call.method, "Core_version");
		assert_eq!(call.block, block.hash);
		assert_eq!(call.visible, vec![(b"k".to_vec(), Some(b"v".to_vec()))]);
	}
}
