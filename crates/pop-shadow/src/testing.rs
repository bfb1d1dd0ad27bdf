// SPDX-License-Identifier: GPL-3.0

//! Shared testing utilities for pop-shadow tests.
//!
//! Every collaborator of the coordinator has a mock here that records how it was driven, so
//! tests can assert on fetch counts, inherent parameters and head transitions without a live
//! chain.

use crate::{
	Block, Blockchain, BlockchainBuilder, ChainConfig, DryRunExtrinsic, MemoryStore,
	StorageDiff, StorageLayer, StorageView, TxPool,
	block::HeaderInfo,
	error::{ExecutorError, HeadError, InherentError, RemoteError, TxPoolError},
	messages::{BuildBlockMode, BuildBlockParams, InherentParams},
	strings::txpool::runtime_api,
	traits::{
		BlockProducer, CallContext, HeadState, InherentProvider, OffchainWorker, RemoteSource,
		RuntimeCallResult, RuntimeExecutor,
	},
	validity::{TransactionValidity, ValidTransaction},
};
use async_trait::async_trait;
use scale::Encode;
use sp_core::H256;
use std::{
	collections::{BTreeMap, HashMap},
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
	},
	time::Duration,
};

/// Storage key under which [`MockExecutor`] reports the inherents it applied.
pub const INHERENTS_KEY: &[u8] = b":mock:inherents";

/// Storage key under which [`MockExecutor`] reports the extrinsic it dry-ran.
pub const EXTRINSIC_KEY: &[u8] = b":mock:extrinsic";

/// Storage key prefix under which [`MockBlockProducer`] records included extrinsics.
pub const INCLUDED_PREFIX: &[u8] = b":mock:included:";

/// Install `env_logger` for test output. Safe to call more than once.
pub fn init_logger() {
	let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic hash of the remote block at `number`.
pub fn mock_hash(number: u32) -> H256 {
	H256::from(sp_core::blake2_256(&number.to_le_bytes()))
}

/// Flatten the layers of `view` into one diff, newest write winning.
pub fn visible_entries(view: &StorageView) -> StorageDiff {
	let mut entries = BTreeMap::new();
	for layer in view.layers() {
		entries.extend(layer.to_diff());
	}
	entries.into_iter().collect()
}

/// A remote chain with blocks `0..=best` and a flat storage map.
pub struct MockRemote {
	hashes: HashMap<u32, H256>,
	numbers: HashMap<H256, u32>,
	storage: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
	header_delay: Mutex<Option<Duration>>,
	fail_headers: AtomicBool,
	header_calls: AtomicUsize,
	block_hash_calls: AtomicUsize,
	storage_calls: AtomicUsize,
}

impl MockRemote {
	/// A remote chain whose best block is `best`.
	pub fn new(best: u32) -> Self {
		let hashes: HashMap<u32, H256> = (0..=best).map(|n| (n, mock_hash(n))).collect();
		let numbers = hashes.iter().map(|(n, h)| (*h, *n)).collect();
		Self {
			hashes,
			numbers,
			storage: Mutex::new(HashMap::new()),
			header_delay: Mutex::new(None),
			fail_headers: AtomicBool::new(false),
			header_calls: AtomicUsize::new(0),
			block_hash_calls: AtomicUsize::new(0),
			storage_calls: AtomicUsize::new(0),
		}
	}

	/// Set a storage value visible at every block.
	pub fn set_storage(&self, key: &[u8], value: &[u8]) {
		self.storage.lock().unwrap().insert(key.to_vec(), value.to_vec());
	}

	/// Delay every header request.
	pub fn set_header_delay(&self, delay: Duration) {
		*self.header_delay.lock().unwrap() = Some(delay);
	}

	/// Make header requests fail (or succeed again).
	pub fn fail_headers(&self, fail: bool) {
		self.fail_headers.store(fail, Ordering::SeqCst);
	}

	pub fn header_calls(&self) -> usize {
		self.header_calls.load(Ordering::SeqCst)
	}

	pub fn block_hash_calls(&self) -> usize {
		self.block_hash_calls.load(Ordering::SeqCst)
	}

	pub fn storage_calls(&self) -> usize {
		self.storage_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl RemoteSource for MockRemote {
	async fn ready(&self) -> Result<(), RemoteError> {
		Ok(())
	}

	async fn block_hash(&self, number: u32) -> Result<Option<H256>, RemoteError> {
		self.block_hash_calls.fetch_add(1, Ordering::SeqCst);
		Ok(self.hashes.get(&number).copied())
	}

	async fn header(&self, hash: H256) -> Result<HeaderInfo, RemoteError> {
		self.header_calls.fetch_add(1, Ordering::SeqCst);
		let delay = *self.header_delay.lock().unwrap();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if self.fail_headers.load(Ordering::SeqCst) {
			return Err(RemoteError::RequestFailed("connection reset".into()));
		}
		self.numbers
			.get(&hash)
			.map(|number| HeaderInfo { number: *number, hash })
			.ok_or_else(|| RemoteError::InvalidResponse(format!("Unknown block {hash:?}")))
	}

	async fn storage(&self, _hash: H256, key: &[u8]) -> Result<Option<Vec<u8>>, RemoteError> {
		self.storage_calls.fetch_add(1, Ordering::SeqCst);
		Ok(self.storage.lock().unwrap().get(key).cloned())
	}

	async fn chain_name(&self) -> Result<String, RemoteError> {
		Ok("Mock Chain".into())
	}
}

/// A runtime call observed by [`MockExecutor`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
	pub method: String,
	pub args: Vec<u8>,
	pub block: H256,
	/// Overlay entries visible to the call.
	pub visible: StorageDiff,
}

/// A runtime executor answering from configurable canned outputs.
pub struct MockExecutor {
	validity: Mutex<Vec<u8>>,
	apply_result: Mutex<Vec<u8>>,
	calls: Mutex<Vec<RecordedCall>>,
}

impl Default for MockExecutor {
	fn default() -> Self {
		Self {
			validity: Mutex::new(TransactionValidity::Ok(ValidTransaction::default()).encode()),
			apply_result: Mutex::new(vec![0x00, 0x00]),
			calls: Mutex::new(Vec::new()),
		}
	}
}

impl MockExecutor {
	/// Answer transaction validation with `validity`.
	pub fn set_validity(&self, validity: TransactionValidity) {
		*self.validity.lock().unwrap() = validity.encode();
	}

	/// Answer transaction validation with raw bytes, which need not decode.
	pub fn set_raw_validity(&self, output: Vec<u8>) {
		*self.validity.lock().unwrap() = output;
	}

	/// Answer extrinsic dry runs with the raw `ApplyExtrinsicResult` bytes.
	pub fn set_apply_result(&self, output: Vec<u8>) {
		*self.apply_result.lock().unwrap() = output;
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.calls.lock().unwrap().clone()
	}

	fn record(&self, ctx: &CallContext<'_>, method: &str, args: Vec<u8>) {
		self.calls.lock().unwrap().push(RecordedCall {
			method: method.into(),
			args,
			block: ctx.block.hash,
			visible: visible_entries(ctx.storage),
		});
	}
}

#[async_trait]
impl RuntimeExecutor for MockExecutor {
	async fn call(
		&self,
		ctx: CallContext<'_>,
		method: &str,
		args: &[u8],
	) -> Result<RuntimeCallResult, ExecutorError> {
		self.record(&ctx, method, args.to_vec());
		let output = if method == runtime_api::TAGGED_TRANSACTION_QUEUE_VALIDATE {
			self.validity.lock().unwrap().clone()
		} else {
			Vec::new()
		};
		Ok(RuntimeCallResult { output, storage_diff: Vec::new() })
	}

	async fn dry_run_extrinsic(
		&self,
		ctx: CallContext<'_>,
		inherents: &[Vec<u8>],
		extrinsic: &DryRunExtrinsic,
	) -> Result<RuntimeCallResult, ExecutorError> {
		self.record(&ctx, "dry_run_extrinsic", inherents.concat());
		let applied = match extrinsic {
			DryRunExtrinsic::Raw(bytes) => bytes.clone(),
			DryRunExtrinsic::Call { call, .. } => call.clone(),
		};
		Ok(RuntimeCallResult {
			output: self.apply_result.lock().unwrap().clone(),
			storage_diff: vec![(EXTRINSIC_KEY.to_vec(), Some(applied))],
		})
	}

	async fn dry_run_inherents(
		&self,
		ctx: CallContext<'_>,
		inherents: &[Vec<u8>],
	) -> Result<StorageDiff, ExecutorError> {
		self.record(&ctx, "dry_run_inherents", inherents.concat());
		let mut diff = visible_entries(ctx.storage);
		diff.push((INHERENTS_KEY.to_vec(), Some(inherents.concat())));
		Ok(diff)
	}
}

/// An inherent provider recording the parameters it was asked for.
#[derive(Default)]
pub struct MockInherentProvider {
	requests: Mutex<Vec<(H256, InherentParams)>>,
	fail: AtomicBool,
}

impl MockInherentProvider {
	/// The inherent every call returns.
	pub const INHERENT: [u8; 2] = [0x04, 0x01];

	pub fn fail(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	/// `(block hash, params)` of every request so far.
	pub fn requests(&self) -> Vec<(H256, InherentParams)> {
		self.requests.lock().unwrap().clone()
	}
}

#[async_trait]
impl InherentProvider for MockInherentProvider {
	async fn create_inherents(
		&self,
		ctx: CallContext<'_>,
		params: &InherentParams,
	) -> Result<Vec<Vec<u8>>, InherentError> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(InherentError::State {
				identifier: "mock",
				message: "inherent data unavailable".into(),
			});
		}
		self.requests.lock().unwrap().push((ctx.block.hash, params.clone()));
		Ok(vec![Self::INHERENT.to_vec()])
	}
}

/// Records head transitions.
#[derive(Default)]
pub struct MockHeadState {
	heads: Mutex<Vec<H256>>,
	fail: AtomicBool,
}

impl MockHeadState {
	pub fn fail(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	pub fn heads(&self) -> Vec<H256> {
		self.heads.lock().unwrap().clone()
	}
}

#[async_trait]
impl HeadState for MockHeadState {
	async fn set_head(&self, block: &Arc<Block>) -> Result<(), HeadError> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(HeadError::HeadState("subscriber gone".into()));
		}
		self.heads.lock().unwrap().push(block.hash);
		Ok(())
	}
}

/// Records offchain worker runs.
#[derive(Default)]
pub struct MockOffchainWorker {
	runs: Mutex<Vec<H256>>,
	fail: AtomicBool,
}

impl MockOffchainWorker {
	pub fn fail(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	pub fn runs(&self) -> Vec<H256> {
		self.runs.lock().unwrap().clone()
	}
}

#[async_trait]
impl OffchainWorker for MockOffchainWorker {
	async fn run(&self, block: &Arc<Block>) -> Result<(), HeadError> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(HeadError::OffchainWorker("worker crashed".into()));
		}
		self.runs.lock().unwrap().push(block.hash);
		Ok(())
	}
}

/// Produces child blocks recording included extrinsics in a storage layer.
#[derive(Default)]
pub struct MockBlockProducer {
	delay: Option<Duration>,
	produced: AtomicU64,
	params: Mutex<Vec<BuildBlockParams>>,
}

impl MockBlockProducer {
	/// A producer taking `delay` to build each block.
	pub fn with_delay(delay: Duration) -> Self {
		Self { delay: Some(delay), ..Default::default() }
	}

	/// Parameters of the most recent build.
	pub fn last_params(&self) -> Option<BuildBlockParams> {
		self.params.lock().unwrap().last().cloned()
	}

	/// Number of blocks produced so far.
	pub fn produced(&self) -> u64 {
		self.produced.load(Ordering::SeqCst)
	}

	/// Storage key under which `extrinsic` is recorded in produced blocks.
	pub fn included_key(extrinsic: &[u8]) -> Vec<u8> {
		[INCLUDED_PREFIX, &sp_core::blake2_256(extrinsic)[..]].concat()
	}
}

#[async_trait]
impl BlockProducer for MockBlockProducer {
	async fn produce(
		&self,
		parent: Arc<Block>,
		params: BuildBlockParams,
	) -> Result<Arc<Block>, TxPoolError> {
		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}
		let nonce = self.produced.fetch_add(1, Ordering::SeqCst);
		let number = params.unsafe_block_height.unwrap_or(parent.number + 1);
		let hash = H256::from(sp_core::blake2_256(
			&[parent.hash.as_bytes(), &number.to_le_bytes(), &nonce.to_le_bytes()].concat(),
		));

		let mut changes = StorageLayer::new();
		for extrinsic in &params.transactions {
			changes.set(Self::included_key(extrinsic), Some(extrinsic.clone()));
		}
		self.params.lock().unwrap().push(params);
		Ok(Arc::new(Block::child(&parent, number, hash, changes)))
	}
}

/// A coordinator wired to mock collaborators and a real [`TxPool`].
pub struct TestChain {
	pub blockchain: Arc<Blockchain>,
	pub remote: Arc<MockRemote>,
	pub executor: Arc<MockExecutor>,
	pub txpool: Arc<TxPool>,
	pub producer: Arc<MockBlockProducer>,
	pub inherents: Arc<MockInherentProvider>,
	pub head_state: Arc<MockHeadState>,
	pub offchain_worker: Arc<MockOffchainWorker>,
	pub store: Arc<MemoryStore>,
}

impl TestChain {
	/// A chain forked at remote block `head`, building blocks only on request.
	pub fn new(head: u32) -> Self {
		let config = ChainConfig { build_mode: BuildBlockMode::Manual, ..Default::default() };
		Self::with_config(head, config)
	}

	/// A chain forked at remote block `head` with `config`.
	pub fn with_config(head: u32, config: ChainConfig) -> Self {
		init_logger();
		let remote = Arc::new(MockRemote::new(head));
		let executor = Arc::new(MockExecutor::default());
		let producer = Arc::new(MockBlockProducer::default());
		let txpool = Arc::new(TxPool::new(producer.clone(), config.build_mode));
		let inherents = Arc::new(MockInherentProvider::default());
		let head_state = Arc::new(MockHeadState::default());
		let offchain_worker = Arc::new(MockOffchainWorker::default());
		let store = Arc::new(MemoryStore::new());

		let blockchain = BlockchainBuilder::new(
			remote.clone(),
			executor.clone(),
			txpool.clone(),
			inherents.clone(),
			head_state.clone(),
			HeaderInfo { number: head, hash: mock_hash(head) },
		)
		.config(config)
		.offchain_worker(offchain_worker.clone())
		.snapshot_store(store.clone())
		.build();

		Self {
			blockchain,
			remote,
			executor,
			txpool,
			producer,
			inherents,
			head_state,
			offchain_worker,
			store,
		}
	}
}
