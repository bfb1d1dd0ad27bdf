// SPDX-License-Identifier: GPL-3.0

//! Bounded, dual-indexed cache of known blocks.
//!
//! Blocks are indexed by number (insertion ordered) and by hash. When a new number is
//! inserted at capacity, the oldest-inserted block that is not the head is evicted from both
//! indices. Eviction follows insertion order only; reads never refresh an entry.
//!
//! The head always keeps its number slot. A block that would displace the head, or that
//! does not fit because the head is the only evictable candidate, is handed back uncached.

use crate::{Block, error::RegistryError};
use indexmap::IndexMap;
use sp_core::H256;
use std::{collections::HashMap, sync::Arc};

/// Default number of blocks kept in memory.
pub const DEFAULT_MAX_MEMORY_BLOCK_COUNT: usize = 2000;

/// In-memory registry of blocks, indexed by number and by hash.
///
/// Both indices always hold the same set of blocks, with the same identity.
#[derive(Debug)]
pub struct BlockRegistry {
	by_number: IndexMap<u32, Arc<Block>>,
	by_hash: HashMap<H256, Arc<Block>>,
	capacity: usize,
}

impl Default for BlockRegistry {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_MEMORY_BLOCK_COUNT)
	}
}

impl BlockRegistry {
	/// Create an empty registry holding at most `capacity` blocks (at least one).
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		Self { by_number: IndexMap::new(), by_hash: HashMap::new(), capacity }
	}

	/// Register `block`, returning the identity now stored for its hash.
	///
	/// If a block with the same hash is already registered, that block is returned and the
	/// registry is left untouched. Registering a new hash for a known number replaces the
	/// slot in place, unless the slot holds `head`. Registering a new number at capacity first
	/// evicts the oldest-inserted block other than `head`; when there is none, `block` is
	/// returned without being registered.
	pub fn register(&mut self, block: Arc<Block>, head: H256) -> Arc<Block> {
		if let Some(existing) = self.by_hash.get(&block.hash) {
			return existing.clone();
		}

		match self.by_number.get_mut(&block.number) {
			Some(slot) if slot.hash == head => {
				log::trace!("Not caching #{} ({:?}): slot held by head", block.number, block.hash);
				return block;
			},
			Some(slot) => {
				let replaced = std::mem::replace(slot, block.clone());
				self.by_hash.remove(&replaced.hash);
			},
			None => {
				if self.by_number.len() >= self.capacity && !self.evict_oldest(head) {
					log::trace!("Not caching #{} ({:?}): registry full", block.number, block.hash);
					return block;
				}
				self.by_number.insert(block.number, block.clone());
			},
		}
		self.by_hash.insert(block.hash, block.clone());
		block
	}

	/// The block registered at `number`, if any.
	pub fn get_by_number(&self, number: u32) -> Option<Arc<Block>> {
		self.by_number.get(&number).cloned()
	}

	/// The block registered under `hash`, if any.
	pub fn get_by_hash(&self, hash: &H256) -> Option<Arc<Block>> {
		self.by_hash.get(hash).cloned()
	}

	/// Remove `block` from the registry.
	///
	/// The by-number slot is only cleared when it still holds `block`'s hash.
	///
	/// # Errors
	///
	/// Returns [`RegistryError::HeadUnregister`] when `block` is the current head.
	pub fn unregister(&mut self, block: &Block, head: H256) -> Result<(), RegistryError> {
		if block.hash == head {
			return Err(RegistryError::HeadUnregister(head));
		}
		if self.by_number.get(&block.number).is_some_and(|b| b.hash == block.hash) {
			self.by_number.shift_remove(&block.number);
		}
		self.by_hash.remove(&block.hash);
		Ok(())
	}

	/// All blocks in the by-number index, oldest inserted first.
	pub fn blocks(&self) -> Vec<Arc<Block>> {
		self.by_number.values().cloned().collect()
	}

	/// Number of blocks in the by-number index.
	pub fn len(&self) -> usize {
		self.by_number.len()
	}

	/// Whether the registry holds no blocks.
	pub fn is_empty(&self) -> bool {
		self.by_number.is_empty()
	}

	/// Maximum number of blocks kept.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	// Returns false when every entry is the head.
	fn evict_oldest(&mut self, head: H256) -> bool {
		let Some(index) = self.by_number.values().position(|b| b.hash != head) else {
			return false;
		};
		match self.by_number.shift_remove_index(index) {
			Some((number, evicted)) => {
				log::trace!("Evicting block #{number} ({:?})", evicted.hash);
				self.by_hash.remove(&evicted.hash);
				true
			},
			None => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn block(number: u32) -> Arc<Block> {
		Arc::new(Block::new(number, H256::from_low_u64_be(number as u64)))
	}

	fn block_with_hash(number: u32, byte: u8) -> Arc<Block> {
		Arc::new(Block::new(number, H256::repeat_byte(byte)))
	}

	#[test]
	fn register_indexes_block_by_number_and_hash() {
		let mut registry = BlockRegistry::default();
		let b = block(5);
		let registered = registry.register(b.clone(), b.hash);

		assert!(Arc::ptr_eq(&registered, &b));
		assert!(Arc::ptr_eq(&registry.get_by_number(5).unwrap(), &b));
		assert!(Arc::ptr_eq(&registry.get_by_hash(&b.hash).unwrap(), &b));
		assert_eq!(registry.capacity(), DEFAULT_MAX_MEMORY_BLOCK_COUNT);
	}

	#[test]
	fn register_known_hash_returns_existing_identity() {
		let mut registry = BlockRegistry::new(10);
		let first = block(1);
		registry.register(first.clone(), first.hash);

		let duplicate = block(1);
		let registered = registry.register(duplicate.clone(), first.hash);

		assert!(Arc::ptr_eq(&registered, &first));
		assert!(!Arc::ptr_eq(&registered, &duplicate));
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn registry_never_exceeds_capacity() {
		let mut registry = BlockRegistry::new(3);
		let head = block(100);
		registry.register(head.clone(), head.hash);
		for n in 0..10 {
			registry.register(block(n), head.hash);
			assert!(registry.len() <= 3);
		}
		assert_eq!(registry.len(), 3);
	}

	#[test]
	fn eviction_follows_insertion_order_and_skips_head() {
		let mut registry = BlockRegistry::new(3);
		let head = block(10);
		registry.register(head.clone(), head.hash);
		let b1 = block(1);
		let b2 = block(2);
		registry.register(b1.clone(), head.hash);
		registry.register(b2.clone(), head.hash);

		// Reads do not refresh insertion order.
		assert!(registry.get_by_number(1).is_some());
		registry.register(block(3), head.hash);

		assert!(registry.get_by_number(10).is_some(), "head must survive eviction");
		assert!(registry.get_by_number(1).is_none());
		assert!(registry.get_by_hash(&b1.hash).is_none());
		assert!(registry.get_by_number(2).is_some());
		let numbers: Vec<u32> = registry.blocks().iter().map(|b| b.number).collect();
		assert_eq!(numbers, vec![10, 2, 3]);
	}

	#[test]
	fn evicted_block_stays_valid_for_holders() {
		let mut registry = BlockRegistry::new(1);
		let head = block(9);
		let b0 = block(0);
		registry.register(b0.clone(), head.hash);
		registry.register(block(1), head.hash);

		assert!(registry.get_by_hash(&b0.hash).is_none());
		assert_eq!(registry.len(), 1);
		assert_eq!(b0.number, 0);
	}

	#[test]
	fn full_registry_holding_only_head_does_not_grow() {
		let mut registry = BlockRegistry::new(1);
		let head = block(5);
		registry.register(head.clone(), head.hash);

		let other = block(6);
		let returned = registry.register(other.clone(), head.hash);

		assert!(Arc::ptr_eq(&returned, &other));
		assert_eq!(registry.len(), 1);
		assert!(registry.get_by_hash(&other.hash).is_none());
		assert!(Arc::ptr_eq(&registry.get_by_number(5).unwrap(), &head));
	}

	#[test]
	fn replacing_number_keeps_insertion_position() {
		let mut registry = BlockRegistry::new(10);
		let head = block(9);
		registry.register(block(1), head.hash);
		registry.register(block(2), head.hash);
		let old = registry.get_by_number(1).unwrap();
		let replacement = block_with_hash(1, 0xaa);
		registry.register(replacement.clone(), head.hash);

		let numbers: Vec<u32> = registry.blocks().iter().map(|b| b.number).collect();
		assert_eq!(numbers, vec![1, 2]);
		assert!(Arc::ptr_eq(&registry.get_by_number(1).unwrap(), &replacement));
		assert!(registry.get_by_hash(&old.hash).is_none());
	}

	#[test]
	fn head_keeps_its_number_slot() {
		let mut registry = BlockRegistry::new(10);
		let head = block(5);
		registry.register(head.clone(), head.hash);
		let sibling = block_with_hash(5, 0xbb);
		let returned = registry.register(sibling.clone(), head.hash);

		assert!(Arc::ptr_eq(&returned, &sibling));
		assert!(Arc::ptr_eq(&registry.get_by_number(5).unwrap(), &head));
		assert!(Arc::ptr_eq(&registry.get_by_hash(&head.hash).unwrap(), &head));
		assert!(registry.get_by_hash(&sibling.hash).is_none());
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn new_head_takes_over_number_slot() {
		let mut registry = BlockRegistry::new(10);
		let old_head = block(5);
		registry.register(old_head.clone(), old_head.hash);
		let new_head = block_with_hash(5, 0xbb);
		registry.register(new_head.clone(), new_head.hash);

		assert!(Arc::ptr_eq(&registry.get_by_number(5).unwrap(), &new_head));
		assert!(registry.get_by_hash(&old_head.hash).is_none());
	}

	#[test]
	fn unregister_head_fails() {
		let mut registry = BlockRegistry::new(10);
		let head = block(1);
		registry.register(head.clone(), head.hash);

		assert_eq!(
			registry.unregister(&head, head.hash),
			Err(RegistryError::HeadUnregister(head.hash))
		);
		assert!(registry.get_by_hash(&head.hash).is_some());
	}

	#[test]
	fn unregister_removes_both_indices() {
		let mut registry = BlockRegistry::new(10);
		let head = block(9);
		let b = block(1);
		registry.register(b.clone(), head.hash);

		registry.unregister(&b, head.hash).unwrap();

		assert!(registry.get_by_number(1).is_none());
		assert!(registry.get_by_hash(&b.hash).is_none());
		assert!(registry.is_empty());
	}

	#[test]
	fn unregister_stale_block_keeps_number_slot() {
		let mut registry = BlockRegistry::new(10);
		let head = block(9);
		let stale = block(1);
		let current = block_with_hash(1, 0xcc);
		registry.register(current.clone(), head.hash);

		registry.unregister(&stale, head.hash).unwrap();

		assert!(Arc::ptr_eq(&registry.get_by_number(1).unwrap(), &current));
	}
}
