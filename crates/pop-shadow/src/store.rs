// SPDX-License-Identifier: GPL-3.0

//! In-memory snapshot store for remote storage reads.

use crate::{error::StoreError, traits::SnapshotStore};
use async_trait::async_trait;
use sp_core::H256;
use std::{collections::HashMap, sync::RwLock};

type Entries = HashMap<(H256, Vec<u8>), Option<Vec<u8>>>;

/// A [`SnapshotStore`] backed by a hash map.
///
/// Remembers both values and keys known to be absent, so repeated reads of empty storage do
/// not go back to the remote chain.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: RwLock<Entries>,
}

impl MemoryStore {
	/// Create an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored entries across all blocks.
	pub fn len(&self) -> Result<usize, StoreError> {
		Ok(self.entries.read().map_err(|err| StoreError::Lock(err.to_string()))?.len())
	}

	/// Returns true if nothing has been stored.
	pub fn is_empty(&self) -> Result<bool, StoreError> {
		Ok(self.len()? == 0)
	}
}

#[async_trait]
impl SnapshotStore for MemoryStore {
	async fn get(
		&self,
		block_hash: H256,
		key: &[u8],
	) -> Result<Option<Option<Vec<u8>>>, StoreError> {
		let entries = self.entries.read().map_err(|err| StoreError::Lock(err.to_string()))?;
		Ok(entries.get(&(block_hash, key.to_vec())).cloned())
	}

	async fn set(
		&self,
		block_hash: H256,
		key: &[u8],
		value: Option<&[u8]>,
	) -> Result<(), StoreError> {
		self.entries
			.write()
			.map_err(|err| StoreError::Lock(err.to_string()))?
			.insert((block_hash, key.to_vec()), value.map(<[u8]>::to_vec));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn unknown_key_is_not_cached() {
		let store = MemoryStore::new();
		assert_eq!(store.get(H256::zero(), b"missing").await.unwrap(), None);
		assert!(store.is_empty().unwrap());
	}

	#[tokio::test]
	async fn stores_values_and_empty_markers() {
		let store = MemoryStore::new();
		let block_hash = H256::from([1u8; 32]);

		store.set(block_hash, b"key", Some(b"value")).await.unwrap();
		store.set(block_hash, b"empty", None).await.unwrap();

		assert_eq!(store.get(block_hash, b"key").await.unwrap(), Some(Some(b"value".to_vec())));
		assert_eq!(store.get(block_hash, b"empty").await.unwrap(), Some(None));
		assert_eq!(store.len().unwrap(), 2);
	}

	#[tokio::test]
	async fn different_blocks_have_separate_storage() {
		let store = MemoryStore::new();
		let block1 = H256::from([5u8; 32]);
		let block2 = H256::from([6u8; 32]);

		store.set(block1, b"same_key", Some(b"value1")).await.unwrap();
		store.set(block2, b"same_key", Some(b"value2")).await.unwrap();

		assert_eq!(store.get(block1, b"same_key").await.unwrap(), Some(Some(b"value1".to_vec())));
		assert_eq!(store.get(block2, b"same_key").await.unwrap(), Some(Some(b"value2".to_vec())));
	}
}
