// SPDX-License-Identifier: GPL-3.0

//! Constants used when validating submitted extrinsics.

/// Runtime API entry points called by the submission front-end.
pub mod runtime_api {
	/// Checks an extrinsic against the head state before it is queued.
	///
	/// Arguments are `source ++ extrinsic ++ head hash`; the output decodes as
	/// `TransactionValidity`.
	pub const TAGGED_TRANSACTION_QUEUE_VALIDATE: &str =
		"TaggedTransactionQueue_validate_transaction";
}

/// SCALE discriminants of `TransactionSource`.
pub mod transaction_source {
	pub const IN_BLOCK: u8 = 0x00;
	pub const LOCAL: u8 = 0x01;
	/// Used for everything arriving through `submit_extrinsic`.
	pub const EXTERNAL: u8 = 0x02;
}
