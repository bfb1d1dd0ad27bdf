// SPDX-License-Identifier: GPL-3.0

//! Block identity and block-local storage overlays.
//!
//! A [`Block`] is an immutable `(number, hash)` pair plus a [`StorageOverlay`]: an ordered,
//! append-only stack of [`StorageLayer`]s holding the writes made on top of the remote chain
//! state at that block.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         Block                              │
//! │   number, hash                                             │
//! │   ┌────────────────────────────────────────────────────┐   │
//! │   │ StorageOverlay   [layer 0] [layer 1] ... [layer n] │   │
//! │   └────────────────────────────────────────────────────┘   │
//! └────────────────────────────────────────────────────────────┘
//!                 │ view()                 │ OverlayScope::new()
//!                 ▼                        ▼
//!          StorageView              OverlayScope (shares layers 0..n,
//!          (read-only)              pushes private speculative layers)
//! ```
//!
//! Reads walk the layers newest first. A layer entry of `None` is a tombstone: the key is
//! known to be deleted and the remote state must not be consulted.

use sp_core::H256;
use std::{
	collections::BTreeMap,
	sync::{Arc, PoisonError, RwLock},
};

/// Storage writes produced by a runtime call: `(key, value)` where `None` deletes the key.
pub type StorageDiff = Vec<(Vec<u8>, Option<Vec<u8>>)>;

/// Minimal header information needed to identify a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
	/// The block number (height).
	pub number: u32,
	/// The block hash.
	pub hash: H256,
}

/// A block known to the shadow chain.
///
/// Shared as `Arc<Block>`. The registry holds at most one identity per hash, so
/// `Arc::ptr_eq` is a valid identity check for registered blocks.
#[derive(Debug)]
pub struct Block {
	/// The block number (height).
	pub number: u32,
	/// The block hash.
	pub hash: H256,
	remote_base: H256,
	overlay: StorageOverlay,
}

impl Block {
	/// Create a block with an empty overlay, as used for blocks fetched from the remote chain.
	pub fn new(number: u32, hash: H256) -> Self {
		Self { number, hash, remote_base: hash, overlay: StorageOverlay::default() }
	}

	/// Create a locally produced block on top of `parent`.
	///
	/// The new block shares the parent's layers and adds `changes` on top. Reads that miss
	/// every layer fall back to the same remote state as the parent.
	pub fn child(parent: &Block, number: u32, hash: H256, changes: StorageLayer) -> Self {
		let mut layers = parent.overlay.layers();
		layers.push(Arc::new(changes));
		Self {
			number,
			hash,
			remote_base: parent.remote_base,
			overlay: StorageOverlay::from_layers(layers),
		}
	}

	/// Hash of the remote block whose state lies beneath this block's overlay.
	pub fn remote_base(&self) -> H256 {
		self.remote_base
	}

	/// The block-local storage overlay.
	pub fn overlay(&self) -> &StorageOverlay {
		&self.overlay
	}

	/// Append a persistent layer to this block's overlay.
	pub fn push_layer(&self, layer: StorageLayer) {
		self.overlay.push(Arc::new(layer));
	}

	/// A read-only snapshot of this block's overlay.
	pub fn view(&self) -> StorageView {
		StorageView { layers: self.overlay.layers() }
	}
}

/// A single set of storage writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageLayer {
	entries: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl StorageLayer {
	/// Create an empty layer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Write `value` at `key`. `None` records a deletion.
	pub fn set(&mut self, key: Vec<u8>, value: Option<Vec<u8>>) {
		self.entries.insert(key, value);
	}

	/// Write every `(key, value)` pair, later pairs winning over earlier ones.
	pub fn set_all(&mut self, entries: impl IntoIterator<Item = (Vec<u8>, Option<Vec<u8>>)>) {
		self.entries.extend(entries);
	}

	/// Look up `key`.
	///
	/// Returns `None` when this layer does not touch the key, `Some(None)` for a deletion.
	pub fn get(&self, key: &[u8]) -> Option<Option<&[u8]>> {
		self.entries.get(key).map(|value| value.as_deref())
	}

	/// Number of keys written by this layer.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether this layer writes nothing.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The writes of this layer, ordered by key.
	pub fn to_diff(&self) -> StorageDiff {
		self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
	}
}

impl From<StorageDiff> for StorageLayer {
	fn from(diff: StorageDiff) -> Self {
		let mut layer = Self::new();
		layer.set_all(diff);
		layer
	}
}

/// Ordered, append-only stack of layers owned by a block.
#[derive(Debug, Default)]
pub struct StorageOverlay {
	layers: RwLock<Vec<Arc<StorageLayer>>>,
}

impl StorageOverlay {
	fn from_layers(layers: Vec<Arc<StorageLayer>>) -> Self {
		Self { layers: RwLock::new(layers) }
	}

	/// Append a layer on top of the stack.
	pub fn push(&self, layer: Arc<StorageLayer>) {
		self.layers.write().unwrap_or_else(PoisonError::into_inner).push(layer);
	}

	/// The current layers, oldest first.
	pub fn layers(&self) -> Vec<Arc<StorageLayer>> {
		self.layers.read().unwrap_or_else(PoisonError::into_inner).clone()
	}

	/// Number of layers on the stack.
	pub fn depth(&self) -> usize {
		self.layers.read().unwrap_or_else(PoisonError::into_inner).len()
	}
}

/// A read-only, point-in-time view over a stack of layers.
#[derive(Debug, Clone, Default)]
pub struct StorageView {
	layers: Vec<Arc<StorageLayer>>,
}

impl StorageView {
	/// Resolve `key` against the layers, newest first.
	///
	/// Returns `None` when no layer touches the key and the value has to come from the
	/// underlying chain state.
	pub fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
		self.layers
			.iter()
			.rev()
			.find_map(|layer| layer.get(key))
			.map(|value| value.map(<[u8]>::to_vec))
	}

	/// The layers of this view, oldest first.
	pub fn layers(&self) -> &[Arc<StorageLayer>] {
		&self.layers
	}
}

/// A private copy of a block's layer stack for one speculative call.
///
/// Existing layers are shared read-only; layers pushed here are never visible to the block.
#[derive(Debug, Clone)]
pub struct OverlayScope {
	view: StorageView,
}

impl OverlayScope {
	/// Start a scope on top of `block`'s current overlay.
	pub fn new(block: &Block) -> Self {
		Self { view: block.view() }
	}

	/// Push a speculative layer visible only through this scope.
	pub fn push_layer(&mut self, layer: StorageLayer) {
		self.view.layers.push(Arc::new(layer));
	}

	/// The view runtime calls in this scope read through.
	pub fn view(&self) -> &StorageView {
		&self.view
	}
}
