// SPDX-License-Identifier: GPL-3.0

//! Development RPC methods for manual chain control.
//!
//! These methods are not part of the Substrate RPC spec. They let tooling build blocks on
//! demand, move the head, patch storage and shift the chain's notion of time. Every failure
//! is reported with JSON-RPC error code `1`.

use crate::{
	Block, Blockchain, StorageLayer,
	error::BlockchainError,
	logging,
	messages::{
		BuildBlockMode, DownwardMessage, HorizontalMessage, HorizontalMessages,
		PartialBuildBlockParams, UpwardMessages,
	},
	strings::{dev::DEV_ERROR_CODE, storage::timestamp},
};
use jsonrpsee::{RpcModule, core::RpcResult, proc_macros::rpc, types::ErrorObjectOwned};
use scale::Encode;
use serde::{Deserialize, Serialize};
use sp_core::H256;
use std::{collections::BTreeMap, fmt, sync::Arc};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// A hex-encoded string with "0x" prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexString(String);

impl HexString {
	/// Create a new HexString from raw bytes.
	pub fn from_bytes(bytes: &[u8]) -> Self {
		Self(format!("0x{}", hex::encode(bytes)))
	}

	/// Decode the hex string back to raw bytes.
	pub fn to_bytes(&self) -> Result<Vec<u8>, DevError> {
		hex::decode(self.0.trim_start_matches("0x"))
			.map_err(|_| DevError::InvalidHex(self.0.clone()))
	}

	/// Decode the hex string as a 32-byte hash.
	pub fn to_hash(&self) -> Result<H256, DevError> {
		let bytes = self.to_bytes()?;
		if bytes.len() != 32 {
			return Err(DevError::InvalidHex(self.0.clone()));
		}
		Ok(H256::from_slice(&bytes))
	}

	/// Get the inner string representation.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for HexString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<H256> for HexString {
	fn from(hash: H256) -> Self {
		Self::from_bytes(hash.as_bytes())
	}
}

/// Errors returned by the dev methods.
#[derive(Debug, thiserror::Error)]
pub enum DevError {
	/// The requested build mode does not exist.
	#[error("Invalid mode {0}")]
	InvalidMode(String),

	/// No block matches the given hash or number.
	#[error("Block not found {0}")]
	BlockNotFound(String),

	/// A parameter is not valid hex (or has the wrong length).
	#[error("Invalid hex string {0}")]
	InvalidHex(String),

	/// The date could not be parsed.
	#[error("Invalid date")]
	InvalidDate,

	/// The coordinator failed.
	#[error(transparent)]
	Chain(#[from] BlockchainError),
}

impl From<DevError> for ErrorObjectOwned {
	fn from(err: DevError) -> Self {
		ErrorObjectOwned::owned(DEV_ERROR_CODE, err.to_string(), None::<()>)
	}
}

/// A downward message as sent over JSON-RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownwardMessageParam {
	/// Relay block number the message was sent at.
	pub sent_at: u32,
	/// Encoded message.
	pub msg: HexString,
}

/// A horizontal message as sent over JSON-RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizontalMessageParam {
	/// Relay block number the message was sent at.
	pub sent_at: u32,
	/// Encoded message.
	pub data: HexString,
}

/// Parameters of `dev_newBlock`. Omitted message kinds are taken from the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlockParams {
	/// Number of blocks to build.
	pub count: Option<u32>,
	/// Build until the head reaches this number. Takes precedence over `count`.
	pub to: Option<u32>,
	/// Extrinsics to include instead of the pending ones.
	pub transactions: Option<Vec<HexString>>,
	/// Upward messages by sending para.
	pub ump: Option<BTreeMap<u32, Vec<HexString>>>,
	/// Downward messages.
	pub dmp: Option<Vec<DownwardMessageParam>>,
	/// Horizontal messages by sending para.
	pub hrmp: Option<BTreeMap<u32, Vec<HorizontalMessageParam>>>,
}

impl NewBlockParams {
	/// How many blocks to build on a head at `head`.
	fn block_count(&self, head: u32) -> u32 {
		let diff = match self.to {
			Some(to) if to > 0 => i64::from(to) - i64::from(head),
			_ => self.count.map(i64::from).unwrap_or_default(),
		};
		u32::try_from(diff).ok().filter(|count| *count > 0).unwrap_or(1)
	}

	fn build_params(&self) -> Result<PartialBuildBlockParams, DevError> {
		let transactions = self.transactions.as_deref().map(decode_all).transpose()?;
		let upward_messages = self
			.ump
			.as_ref()
			.map(|ump| {
				ump.iter()
					.map(|(para_id, msgs)| decode_all(msgs).map(|msgs| (*para_id, msgs)))
					.collect::<Result<UpwardMessages, _>>()
			})
			.transpose()?;
		let downward_messages = self
			.dmp
			.as_ref()
			.map(|dmp| {
				dmp.iter()
					.map(|m| {
						let sent_at = m.sent_at;
						m.msg.to_bytes().map(|msg| DownwardMessage { sent_at, msg })
					})
					.collect::<Result<Vec<_>, _>>()
			})
			.transpose()?;
		let horizontal_messages = self
			.hrmp
			.as_ref()
			.map(|hrmp| {
				hrmp.iter()
					.map(|(para_id, msgs)| {
						msgs.iter()
							.map(|m| {
								let sent_at = m.sent_at;
								m.data.to_bytes().map(|data| HorizontalMessage { sent_at, data })
							})
							.collect::<Result<Vec<_>, _>>()
							.map(|msgs| (*para_id, msgs))
					})
					.collect::<Result<HorizontalMessages, _>>()
			})
			.transpose()?;

		Ok(PartialBuildBlockParams {
			transactions,
			downward_messages,
			upward_messages,
			horizontal_messages,
			unsafe_block_height: None,
		})
	}
}

fn decode_all(items: &[HexString]) -> Result<Vec<Vec<u8>>, DevError> {
	items.iter().map(HexString::to_bytes).collect()
}

/// A block reference accepted by `dev_setHead`.
///
/// Positive numbers are absolute heights, zero and negative numbers are relative to the head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HashOrNumber {
	/// Block height, absolute or relative to the head.
	Number(i64),
	/// Block hash.
	Hash(HexString),
}

impl fmt::Display for HashOrNumber {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Number(number) => write!(f, "{number}"),
			Self::Hash(hash) => write!(f, "{hash}"),
		}
	}
}

/// The date accepted by `dev_timeTravel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeTravelDate {
	/// Milliseconds since the Unix epoch. Fractions are truncated; negative values are
	/// rejected when converted.
	Millis(f64),
	/// An RFC 3339 date, e.g. `2030-01-01T00:00:00Z`.
	Date(String),
}

impl TimeTravelDate {
	/// Milliseconds since the Unix epoch.
	pub fn timestamp(&self) -> Result<u64, DevError> {
		match self {
			Self::Millis(millis) if *millis >= 0.0 && *millis < u64::MAX as f64 =>
				Ok(millis.trunc() as u64),
			Self::Millis(_) => Err(DevError::InvalidDate),
			Self::Date(date) => {
				let date =
					OffsetDateTime::parse(date, &Rfc3339).map_err(|_| DevError::InvalidDate)?;
				u64::try_from(date.unix_timestamp_nanos() / 1_000_000)
					.map_err(|_| DevError::InvalidDate)
			},
		}
	}
}

/// `twox128("Timestamp") ++ twox128("Now")`.
pub fn timestamp_now_key() -> Vec<u8> {
	let mut key = Vec::new();
	key.extend(sp_core::twox_128(timestamp::PALLET));
	key.extend(sp_core::twox_128(timestamp::NOW));
	key
}

/// Development RPC methods for manual chain control.
#[rpc(server, namespace = "dev")]
pub trait DevApi {
	/// Build one or more blocks on the head.
	///
	/// Returns the hash of the last block built.
	#[method(name = "newBlock")]
	async fn new_block(&self, params: Option<NewBlockParams>) -> RpcResult<HexString>;

	/// Change when the transaction pool builds blocks (`Batch`, `Instant` or `Manual`).
	#[method(name = "setBlockBuildMode")]
	async fn set_block_build_mode(&self, mode: String) -> RpcResult<()>;

	/// Move the head to a known block.
	#[method(name = "setHead")]
	async fn set_head(&self, hash_or_number: HashOrNumber) -> RpcResult<HexString>;

	/// Write raw `[key, value]` pairs into a new layer on `at` (or the head).
	///
	/// A `null` value deletes the key.
	#[method(name = "setStorage")]
	async fn set_storage(
		&self,
		values: Vec<(HexString, Option<HexString>)>,
		at: Option<HexString>,
	) -> RpcResult<HexString>;

	/// Set `Timestamp::Now` at the head.
	///
	/// Returns the new timestamp in milliseconds.
	#[method(name = "timeTravel")]
	async fn time_travel(&self, date: TimeTravelDate) -> RpcResult<u64>;
}

/// Implementation of development RPC methods.
pub struct DevApi {
	blockchain: Arc<Blockchain>,
}

impl DevApi {
	/// Create a new DevApi instance.
	pub fn new(blockchain: Arc<Blockchain>) -> Self {
		Self { blockchain }
	}

	async fn resolve(&self, at: Option<&HexString>) -> Result<Arc<Block>, DevError> {
		let Some(at) = at else {
			return Ok(self.blockchain.head().await);
		};
		self.blockchain
			.get_block(Some(at.to_hash()?))
			.await?
			.ok_or_else(|| DevError::BlockNotFound(at.to_string()))
	}

	/// Push `layer` onto `block`, re-announcing the head when it changed.
	async fn write_layer(&self, block: &Arc<Block>, layer: StorageLayer) -> Result<(), DevError> {
		block.push_layer(layer);
		if self.blockchain.head().await.hash == block.hash {
			self.blockchain.set_head(block.clone()).await?;
		}
		Ok(())
	}
}

/// Create the `dev_*` method table for `blockchain`.
pub fn create_dev_module(blockchain: Arc<Blockchain>) -> RpcModule<DevApi> {
	DevApi::new(blockchain).into_rpc()
}

#[async_trait::async_trait]
impl DevApiServer for DevApi {
	async fn new_block(&self, params: Option<NewBlockParams>) -> RpcResult<HexString> {
		let params = params.unwrap_or_default();
		let count = params.block_count(self.blockchain.head().await.number);
		let build = params.build_params()?;

		let mut last = None;
		for _ in 0..count {
			let block = self.blockchain.new_block(build.clone()).await.map_err(DevError::from)?;
			log::debug!("dev_newBlock {:?}", block.hash);
			last = Some(block.hash);
		}
		match last {
			Some(hash) => Ok(hash.into()),
			None => Ok(self.blockchain.head().await.hash.into()),
		}
	}

	async fn set_block_build_mode(&self, mode: String) -> RpcResult<()> {
		log::debug!("dev_setBlockBuildMode {mode}");
		let mode: BuildBlockMode = mode.parse().map_err(|_| DevError::InvalidMode(mode.clone()))?;
		self.blockchain.txpool().set_mode(mode);
		Ok(())
	}

	async fn set_head(&self, hash_or_number: HashOrNumber) -> RpcResult<HexString> {
		let block = match &hash_or_number {
			HashOrNumber::Number(number) => {
				let number = if *number > 0 {
					*number
				} else {
					i64::from(self.blockchain.head().await.number) + number
				};
				match u32::try_from(number) {
					Ok(number) =>
						self.blockchain.get_block_at(Some(number)).await.map_err(DevError::from)?,
					Err(_) => None,
				}
			},
			HashOrNumber::Hash(hash) => {
				let hash = hash.to_hash()?;
				self.blockchain.get_block(Some(hash)).await.map_err(DevError::from)?
			},
		};
		let block = block.ok_or_else(|| DevError::BlockNotFound(hash_or_number.to_string()))?;

		self.blockchain.set_head(block.clone()).await.map_err(DevError::from)?;
		Ok(block.hash.into())
	}

	async fn set_storage(
		&self,
		values: Vec<(HexString, Option<HexString>)>,
		at: Option<HexString>,
	) -> RpcResult<HexString> {
		let block = self.resolve(at.as_ref()).await?;

		let mut layer = StorageLayer::new();
		for (key, value) in &values {
			let value = value.as_ref().map(HexString::to_bytes).transpose()?;
			layer.set(key.to_bytes()?, value);
		}
		log::debug!(
			"dev_setStorage at {:?}: {}",
			block.hash,
			logging::truncate_json(&serde_json::to_value(&values).unwrap_or_default())
		);

		self.write_layer(&block, layer).await?;
		Ok(block.hash.into())
	}

	async fn time_travel(&self, date: TimeTravelDate) -> RpcResult<u64> {
		let timestamp = date.timestamp()?;
		let head = self.blockchain.head().await;

		let mut layer = StorageLayer::new();
		layer.set(timestamp_now_key(), Some(timestamp.encode()));
		self.write_layer(&head, layer).await?;

		log::debug!("dev_timeTravel {timestamp}");
		Ok(timestamp)
	}
}
