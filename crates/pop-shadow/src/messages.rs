// SPDX-License-Identifier: GPL-3.0

//! Cross-chain messages and block build parameters.

use crate::strings::dev::BUILD_MODES;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Upward messages keyed by the sending para id.
pub type UpwardMessages = BTreeMap<u32, Vec<Vec<u8>>>;

/// Horizontal messages keyed by the sending para id.
pub type HorizontalMessages = BTreeMap<u32, Vec<HorizontalMessage>>;

/// A relay-to-para message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownwardMessage {
	/// Relay block number the message was sent at.
	pub sent_at: u32,
	/// Encoded message.
	pub msg: Vec<u8>,
}

/// A para-to-para message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HorizontalMessage {
	/// Relay block number the message was sent at.
	pub sent_at: u32,
	/// Encoded message.
	pub data: Vec<u8>,
}

/// Everything the block producer needs to build one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildBlockParams {
	pub transactions: Vec<Vec<u8>>,
	pub downward_messages: Vec<DownwardMessage>,
	pub upward_messages: UpwardMessages,
	pub horizontal_messages: HorizontalMessages,
	/// Overrides the number of the block being built.
	pub unsafe_block_height: Option<u32>,
}

/// Build parameters where every omitted field is taken from the transaction pool queues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialBuildBlockParams {
	pub transactions: Option<Vec<Vec<u8>>>,
	pub downward_messages: Option<Vec<DownwardMessage>>,
	pub upward_messages: Option<UpwardMessages>,
	pub horizontal_messages: Option<HorizontalMessages>,
	pub unsafe_block_height: Option<u32>,
}

/// Message dimensions handed to the inherent provider.
///
/// Dry runs populate only the dimension under test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InherentParams {
	pub downward_messages: Vec<DownwardMessage>,
	pub upward_messages: UpwardMessages,
	pub horizontal_messages: HorizontalMessages,
}

/// When the transaction pool turns queued work into blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildBlockMode {
	/// Build shortly after submissions stop arriving.
	#[default]
	Batch,
	/// Build one block per submission.
	Instant,
	/// Only build when explicitly asked to.
	Manual,
}

impl fmt::Display for BuildBlockMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mode = match self {
			Self::Batch => "Batch",
			Self::Instant => "Instant",
			Self::Manual => "Manual",
		};
		write!(f, "{mode}")
	}
}

impl FromStr for BuildBlockMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"Batch" => Ok(Self::Batch),
			"Instant" => Ok(Self::Instant),
			"Manual" => Ok(Self::Manual),
			other => Err(format!("Invalid build mode: {other}, expected one of {BUILD_MODES:?}")),
		}
	}
}
