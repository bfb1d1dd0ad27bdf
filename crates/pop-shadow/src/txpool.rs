// SPDX-License-Identifier: GPL-3.0

//! Minimal transaction pool for collecting submitted extrinsics and messages.
//!
//! Queues are plain FIFOs with no validation or ordering; validation happens in the
//! coordinator before anything reaches the pool. Turning queued work into a block is left to
//! a [`BlockProducer`].

use crate::{
	Block,
	error::TxPoolError,
	messages::{
		BuildBlockMode, BuildBlockParams, DownwardMessage, HorizontalMessage, HorizontalMessages,
		PartialBuildBlockParams, UpwardMessages,
	},
	traits::{BlockProducer, TransactionPool},
};
use async_trait::async_trait;
use std::sync::{
	Arc, PoisonError, RwLock,
	atomic::{AtomicUsize, Ordering},
};

#[derive(Debug, Default)]
struct Queues {
	extrinsics: Vec<Vec<u8>>,
	upward: UpwardMessages,
	downward: Vec<DownwardMessage>,
	horizontal: HorizontalMessages,
}

/// Counts a block as upcoming for as long as the guard lives.
struct Upcoming<'a>(&'a AtomicUsize);

impl<'a> Upcoming<'a> {
	fn start(counter: &'a AtomicUsize) -> Self {
		counter.fetch_add(1, Ordering::SeqCst);
		Self(counter)
	}
}

impl Drop for Upcoming<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

/// A minimal transaction pool that stores pending extrinsics and cross-chain messages.
///
/// Thread-safe FIFO queues for work awaiting inclusion in a block. Extrinsics are included
/// in submission order.
pub struct TxPool {
	queues: RwLock<Queues>,
	mode: RwLock<BuildBlockMode>,
	upcoming: AtomicUsize,
	producer: Arc<dyn BlockProducer>,
}

impl TxPool {
	/// Create a new empty transaction pool.
	pub fn new(producer: Arc<dyn BlockProducer>, mode: BuildBlockMode) -> Self {
		Self {
			queues: RwLock::new(Queues::default()),
			mode: RwLock::new(mode),
			upcoming: AtomicUsize::new(0),
			producer,
		}
	}

	/// Get a clone of all pending extrinsics without removing them.
	pub fn pending(&self) -> Result<Vec<Vec<u8>>, TxPoolError> {
		Ok(self.queues.read().map_err(|err| TxPoolError::Lock(err.to_string()))?.extrinsics.clone())
	}

	/// Returns the number of pending extrinsics.
	pub fn len(&self) -> Result<usize, TxPoolError> {
		Ok(self.queues.read().map_err(|err| TxPoolError::Lock(err.to_string()))?.extrinsics.len())
	}

	/// Returns true if there are no pending extrinsics.
	pub fn is_empty(&self) -> Result<bool, TxPoolError> {
		Ok(self.len()? == 0)
	}

	/// Resolve omitted parameters by draining the matching queues.
	fn take_params(&self, params: PartialBuildBlockParams) -> Result<BuildBlockParams, TxPoolError> {
		let mut queues = self.queues.write().map_err(|err| TxPoolError::Lock(err.to_string()))?;
		Ok(BuildBlockParams {
			transactions: params
				.transactions
				.unwrap_or_else(|| std::mem::take(&mut queues.extrinsics)),
			downward_messages: params
				.downward_messages
				.unwrap_or_else(|| std::mem::take(&mut queues.downward)),
			upward_messages: params
				.upward_messages
				.unwrap_or_else(|| std::mem::take(&mut queues.upward)),
			horizontal_messages: params
				.horizontal_messages
				.unwrap_or_else(|| std::mem::take(&mut queues.horizontal)),
			unsafe_block_height: params.unsafe_block_height,
		})
	}

	async fn produce(
		&self,
		parent: Arc<Block>,
		params: BuildBlockParams,
	) -> Result<Arc<Block>, TxPoolError> {
		let _upcoming = Upcoming::start(&self.upcoming);
		log::debug!(
			"Building block on #{} with {} extrinsic(s)",
			parent.number,
			params.transactions.len()
		);
		self.producer.produce(parent, params).await
	}
}

#[async_trait]
impl TransactionPool for TxPool {
	fn submit_extrinsic(&self, extrinsic: Vec<u8>) -> Result<(), TxPoolError> {
		self.queues
			.write()
			.map_err(|err| TxPoolError::Lock(err.to_string()))?
			.extrinsics
			.push(extrinsic);
		Ok(())
	}

	fn submit_upward_messages(
		&self,
		para_id: u32,
		messages: Vec<Vec<u8>>,
	) -> Result<(), TxPoolError> {
		self.queues
			.write()
			.map_err(|err| TxPoolError::Lock(err.to_string()))?
			.upward
			.entry(para_id)
			.or_default()
			.extend(messages);
		Ok(())
	}

	fn submit_downward_messages(&self, messages: Vec<DownwardMessage>) -> Result<(), TxPoolError> {
		self.queues
			.write()
			.map_err(|err| TxPoolError::Lock(err.to_string()))?
			.downward
			.extend(messages);
		Ok(())
	}

	fn submit_horizontal_messages(
		&self,
		para_id: u32,
		messages: Vec<HorizontalMessage>,
	) -> Result<(), TxPoolError> {
		self.queues
			.write()
			.map_err(|err| TxPoolError::Lock(err.to_string()))?
			.horizontal
			.entry(para_id)
			.or_default()
			.extend(messages);
		Ok(())
	}

	async fn build_block(
		&self,
		parent: Arc<Block>,
		params: PartialBuildBlockParams,
	) -> Result<Arc<Block>, TxPoolError> {
		let params = self.take_params(params)?;
		self.produce(parent, params).await
	}

	async fn build_block_with_params(
		&self,
		parent: Arc<Block>,
		params: BuildBlockParams,
	) -> Result<Arc<Block>, TxPoolError> {
		self.produce(parent, params).await
	}

	fn upcoming_blocks(&self) -> usize {
		self.upcoming.load(Ordering::SeqCst)
	}

	fn mode(&self) -> BuildBlockMode {
		*self.mode.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn set_mode(&self, mode: BuildBlockMode) {
		*self.mode.write().unwrap_or_else(PoisonError::into_inner) = mode;
	}
}
