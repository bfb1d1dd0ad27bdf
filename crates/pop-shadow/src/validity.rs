// SPDX-License-Identifier: GPL-3.0

//! Runtime result types decoded by the coordinator.
//!
//! These mirror `sp_runtime::transaction_validity` and `sp_runtime::ApplyExtrinsicResult`
//! closely enough to decode the SCALE output of `TaggedTransactionQueue_validate_transaction`
//! and `BlockBuilder_apply_extrinsic`.

use crate::strings::txpool::transaction_source;
use scale::{Decode, Encode};

/// Where a transaction being validated comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionSource {
	/// Already part of a block.
	InBlock,
	/// Produced by the node itself (e.g., an offchain worker).
	Local,
	/// Received from the outside world.
	#[default]
	External,
}

impl TransactionSource {
	/// The byte prepended to `TaggedTransactionQueue_validate_transaction` arguments.
	pub fn as_byte(self) -> u8 {
		match self {
			Self::InBlock => transaction_source::IN_BLOCK,
			Self::Local => transaction_source::LOCAL,
			Self::External => transaction_source::EXTERNAL,
		}
	}
}

/// Result of transaction validation.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum TransactionValidity {
	/// Transaction is valid.
	#[codec(index = 0)]
	Ok(ValidTransaction),
	/// Transaction is invalid.
	#[codec(index = 1)]
	Err(TransactionValidityError),
}

/// Information about a valid transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct ValidTransaction {
	/// Priority of the transaction (higher = more likely to be included).
	pub priority: u64,
	/// Tags this transaction depends on.
	pub requires: Vec<Vec<u8>>,
	/// Tags this transaction provides.
	pub provides: Vec<Vec<u8>>,
	/// Number of blocks the transaction stays valid for.
	pub longevity: u64,
	/// Whether this transaction should be gossiped.
	pub propagate: bool,
}

/// Error when transaction validation fails.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum TransactionValidityError {
	/// Transaction is invalid (won't ever be valid).
	#[codec(index = 0)]
	Invalid(InvalidTransaction),
	/// Transaction validity is unknown (might become valid).
	#[codec(index = 1)]
	Unknown(UnknownTransaction),
}

/// Reasons a transaction is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum InvalidTransaction {
	#[codec(index = 0)]
	Call,
	#[codec(index = 1)]
	Payment,
	#[codec(index = 2)]
	Future,
	#[codec(index = 3)]
	Stale,
	#[codec(index = 4)]
	BadProof,
	#[codec(index = 5)]
	AncientBirthBlock,
	#[codec(index = 6)]
	ExhaustsResources,
	#[codec(index = 7)]
	Custom(u8),
	#[codec(index = 8)]
	BadMandatory,
	#[codec(index = 9)]
	MandatoryValidation,
	#[codec(index = 10)]
	BadSigner,
}

/// Reasons transaction validity is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum UnknownTransaction {
	#[codec(index = 0)]
	CannotLookup,
	#[codec(index = 1)]
	NoUnsignedValidator,
	#[codec(index = 2)]
	Custom(u8),
}

impl TransactionValidityError {
	/// Get a human-readable reason for the error.
	pub fn reason(&self) -> String {
		match self {
			Self::Invalid(inv) => match inv {
				InvalidTransaction::Call => "Call failed".into(),
				InvalidTransaction::Payment => "Insufficient funds for fees".into(),
				InvalidTransaction::Future => "Nonce too high".into(),
				InvalidTransaction::Stale => "Nonce too low (already used)".into(),
				InvalidTransaction::BadProof => "Invalid signature".into(),
				InvalidTransaction::AncientBirthBlock => "Mortal era birth block is too old".into(),
				InvalidTransaction::ExhaustsResources => "Block resources exhausted".into(),
				InvalidTransaction::Custom(code) => format!("Custom error: {code}"),
				InvalidTransaction::BadMandatory => "Bad mandatory inherent".into(),
				InvalidTransaction::MandatoryValidation => "Mandatory dispatch validated".into(),
				InvalidTransaction::BadSigner => "Invalid signing address".into(),
			},
			Self::Unknown(unk) => match unk {
				UnknownTransaction::CannotLookup => "Cannot lookup validity".into(),
				UnknownTransaction::NoUnsignedValidator => "No unsigned validator".into(),
				UnknownTransaction::Custom(code) => format!("Custom unknown: {code}"),
			},
		}
	}
}

/// Outcome of applying an extrinsic, decoded from `BlockBuilder_apply_extrinsic` output.
///
/// `DispatchError` is runtime specific, so a failed dispatch keeps its raw SCALE bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyExtrinsicResult {
	/// The extrinsic was applied and dispatched successfully.
	Applied,
	/// The extrinsic was applied but its dispatch failed.
	DispatchFailed {
		/// SCALE-encoded `DispatchError`.
		error: Vec<u8>,
	},
	/// The extrinsic was rejected before dispatch.
	Invalid(TransactionValidityError),
}

impl ApplyExtrinsicResult {
	/// Decode an `ApplyExtrinsicResult` from the raw runtime output.
	pub fn decode_from(mut output: &[u8]) -> Result<Self, scale::Error> {
		match u8::decode(&mut output)? {
			0 => match u8::decode(&mut output)? {
				0 => Ok(Self::Applied),
				1 => Ok(Self::DispatchFailed { error: output.to_vec() }),
				_ => Err("Invalid DispatchOutcome variant".into()),
			},
			1 => Ok(Self::Invalid(TransactionValidityError::decode(&mut output)?)),
			_ => Err("Invalid ApplyExtrinsicResult variant".into()),
		}
	}

	/// Whether the extrinsic dispatched successfully.
	pub fn is_ok(&self) -> bool {
		matches!(self, Self::Applied)
	}
}
