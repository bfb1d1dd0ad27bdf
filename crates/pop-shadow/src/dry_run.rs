// SPDX-License-Identifier: GPL-3.0

//! Speculative execution against a block without touching its canonical state.
//!
//! Every dry run resolves its target block, asks the [`InherentProvider`] for inherents with
//! only the message dimension under test populated, and hands both to the
//! [`RuntimeExecutor`] through a fresh [`OverlayScope`]. Anything the run writes stays in
//! that scope and is returned as a [`StorageDiff`].
//!
//! [`InherentProvider`]: crate::traits::InherentProvider
//! [`RuntimeExecutor`]: crate::traits::RuntimeExecutor

use crate::{
	Block, Blockchain, OverlayScope, StorageDiff, StorageLayer,
	error::BlockchainError,
	logging,
	messages::{DownwardMessage, HorizontalMessages, InherentParams, UpwardMessages},
	strings::storage::ump,
	traits::CallContext,
	validity::ApplyExtrinsicResult,
};
use scale::Encode;
use sp_core::H256;

/// The extrinsic a dry run applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DryRunExtrinsic {
	/// A complete, signed extrinsic.
	Raw(Vec<u8>),
	/// An unsigned call to be dispatched as if signed by `address`.
	Call {
		/// SCALE-encoded call.
		call: Vec<u8>,
		/// SS58 address of the impersonated origin.
		address: String,
	},
}

/// Result of [`Blockchain::dry_run_extrinsic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunOutcome {
	/// How the runtime applied the extrinsic.
	pub outcome: ApplyExtrinsicResult,
	/// Storage writes the extrinsic and the block's inherents would make.
	pub storage_diff: StorageDiff,
}

impl Blockchain {
	/// Apply `extrinsic` on top of `at` (or the head) and report the outcome.
	///
	/// # Errors
	///
	/// [`BlockchainError::BlockNotFound`] when `at` cannot be resolved.
	pub async fn dry_run_extrinsic(
		&self,
		extrinsic: DryRunExtrinsic,
		at: Option<H256>,
	) -> Result<DryRunOutcome, BlockchainError> {
		let block = self.resolve_at(at).await?;
		log::debug!("dryRunExtrinsic at #{} ({:?})", block.number, block.hash);

		let scope = OverlayScope::new(&block);
		let ctx = self.context(&block, &scope);
		let inherents =
			self.inherent_provider().create_inherents(ctx, &InherentParams::default()).await?;
		let result = self.executor().dry_run_extrinsic(ctx, &inherents, &extrinsic).await?;

		let outcome = ApplyExtrinsicResult::decode_from(&result.output)
			.map_err(|source| BlockchainError::Codec { what: "ApplyExtrinsicResult", source })?;
		Ok(DryRunOutcome { outcome, storage_diff: result.storage_diff })
	}

	/// Apply the inherents of a block receiving the horizontal messages `hrmp`.
	pub async fn dry_run_hrmp(
		&self,
		hrmp: HorizontalMessages,
		at: Option<H256>,
	) -> Result<StorageDiff, BlockchainError> {
		let params = InherentParams { horizontal_messages: hrmp, ..Default::default() };
		self.dry_run_inherents(params, None, at).await
	}

	/// Apply the inherents of a block receiving the downward messages `dmp`.
	pub async fn dry_run_dmp(
		&self,
		dmp: Vec<DownwardMessage>,
		at: Option<H256>,
	) -> Result<StorageDiff, BlockchainError> {
		let params = InherentParams { downward_messages: dmp, ..Default::default() };
		self.dry_run_inherents(params, None, at).await
	}

	/// Apply the inherents of a relay block with `ump` queued for dispatch.
	///
	/// The messages are not passed to the inherent provider. Instead the `Ump` pallet's
	/// dispatch queues are seeded with them in a speculative layer.
	///
	/// # Errors
	///
	/// [`BlockchainError::EmptyUpwardMessages`] when a para has an empty message list, and
	/// [`BlockchainError::UpwardMessagesTooLarge`] when a queue's size overflows `u32`.
	pub async fn dry_run_ump(
		&self,
		ump: UpwardMessages,
		at: Option<H256>,
	) -> Result<StorageDiff, BlockchainError> {
		log::debug!(
			"dryRunUmp paras {:?}: {}",
			ump.keys().collect::<Vec<_>>(),
			logging::truncate_json(&ump_json(&ump))
		);
		let layer = ump_dispatch_layer(&ump)?;
		self.dry_run_inherents(InherentParams::default(), Some(layer), at).await
	}

	/// The inherents of a block built on the head with no messages.
	pub async fn get_inherents(&self) -> Result<Vec<Vec<u8>>, BlockchainError> {
		let block = self.resolve_at(None).await?;
		let view = block.view();
		let ctx = CallContext { block: &block, storage: &view, config: self.executor_config() };
		Ok(self.inherent_provider().create_inherents(ctx, &InherentParams::default()).await?)
	}

	async fn dry_run_inherents(
		&self,
		params: InherentParams,
		seed: Option<StorageLayer>,
		at: Option<H256>,
	) -> Result<StorageDiff, BlockchainError> {
		let block = self.resolve_at(at).await?;
		let mut scope = OverlayScope::new(&block);
		if let Some(layer) = seed {
			scope.push_layer(layer);
		}

		let ctx = self.context(&block, &scope);
		let inherents = self.inherent_provider().create_inherents(ctx, &params).await?;
		Ok(self.executor().dry_run_inherents(ctx, &inherents).await?)
	}

	fn context<'a>(&'a self, block: &'a Block, scope: &'a OverlayScope) -> CallContext<'a> {
		CallContext { block, storage: scope.view(), config: self.executor_config() }
	}
}

/// `twox128("Ump") ++ twox128(item)`, followed by `twox64(para) ++ para` for map items.
fn ump_key(item: &[u8], para_id: Option<u32>) -> Vec<u8> {
	let mut key = Vec::with_capacity(32 + 12);
	key.extend(sp_core::twox_128(ump::PALLET));
	key.extend(sp_core::twox_128(item));
	if let Some(para_id) = para_id {
		let para_id = para_id.to_le_bytes();
		key.extend(sp_core::twox_64(&para_id));
		key.extend(para_id);
	}
	key
}

/// Storage of the `Ump` pallet with `messages` queued for dispatch.
fn ump_dispatch_layer(messages: &UpwardMessages) -> Result<StorageLayer, BlockchainError> {
	let mut layer = StorageLayer::new();
	let paras: Vec<u32> = messages.keys().copied().collect();
	layer.set(ump_key(ump::NEEDS_DISPATCH, None), Some(paras.encode()));

	for (para_id, queue) in messages {
		if queue.is_empty() {
			return Err(BlockchainError::EmptyUpwardMessages(*para_id));
		}
		let total_size: usize = queue.iter().map(Vec::len).sum();
		let size = dispatch_queue_size(*para_id, queue.len(), total_size)?;
		layer.set(ump_key(ump::RELAY_DISPATCH_QUEUES, Some(*para_id)), Some(queue.encode()));
		layer.set(ump_key(ump::RELAY_DISPATCH_QUEUE_SIZE, Some(*para_id)), Some(size.encode()));
	}
	Ok(layer)
}

/// `(count, total_bytes)` as stored in `RelayDispatchQueueSize`.
fn dispatch_queue_size(
	para_id: u32,
	count: usize,
	total_size: usize,
) -> Result<(u32, u32), BlockchainError> {
	let too_large = |_| BlockchainError::UpwardMessagesTooLarge(para_id);
	Ok((u32::try_from(count).map_err(too_large)?, u32::try_from(total_size).map_err(too_large)?))
}

fn ump_json(messages: &UpwardMessages) -> serde_json::Value {
	messages
		.iter()
		.map(|(para_id, queue)| {
			let queue: serde_json::Value =
				queue.iter().map(|msg| format!("0x{}", hex::encode(msg))).collect();
			(para_id.to_string(), queue)
		})
		.collect::<serde_json::Map<_, _>>()
		.into()
}
