// SPDX-License-Identifier: GPL-3.0

//! Storage key components used to synthesize state for speculative execution.

/// Relay-chain `Ump` pallet storage items.
pub mod ump {
	/// Pallet prefix.
	pub const PALLET: &[u8] = b"Ump";

	/// `Vec<ParaId>` of paras with queued upward messages.
	pub const NEEDS_DISPATCH: &[u8] = b"NeedsDispatch";

	/// Map `ParaId => Vec<UpwardMessage>`.
	pub const RELAY_DISPATCH_QUEUES: &[u8] = b"RelayDispatchQueues";

	/// Map `ParaId => (message count, total byte size)`.
	pub const RELAY_DISPATCH_QUEUE_SIZE: &[u8] = b"RelayDispatchQueueSize";
}

/// `Timestamp` pallet storage items.
pub mod timestamp {
	/// Pallet prefix.
	pub const PALLET: &[u8] = b"Timestamp";

	/// Current time in milliseconds.
	pub const NOW: &[u8] = b"Now";
}
