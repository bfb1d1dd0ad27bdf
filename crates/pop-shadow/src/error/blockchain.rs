// SPDX-License-Identifier: GPL-3.0

//! Chain-state coordinator error types.

use crate::{
	error::{
		ExecutorError, HeadError, InherentError, RegistryError, RemoteError, StoreError,
		TxPoolError,
	},
	validity::TransactionValidityError,
};
use thiserror::Error;

/// Errors that can occur when working with the shadow chain.
#[derive(Debug, Error)]
pub enum BlockchainError {
	/// The requested block could not be resolved.
	#[error("Cannot find block {0}")]
	BlockNotFound(String),

	/// An operation would break a registry invariant.
	#[error("Invariant violation: {0}")]
	InvariantViolation(#[from] RegistryError),

	/// The runtime rejected the extrinsic during validation.
	#[error("Invalid transaction: {}", .0.reason())]
	InvalidTransaction(TransactionValidityError),

	/// An upward-message dry run was asked to dispatch an empty queue.
	#[error("No upward message for para {0}")]
	EmptyUpwardMessages(u32),

	/// An upward-message queue does not fit the relay chain's `u32` size accounting.
	#[error("Upward message queue for para {0} is too large")]
	UpwardMessagesTooLarge(u32),

	/// Remote source error.
	#[error(transparent)]
	Remote(#[from] RemoteError),

	/// Runtime executor error.
	#[error(transparent)]
	Executor(#[from] ExecutorError),

	/// Transaction pool error.
	#[error(transparent)]
	TxPool(#[from] TxPoolError),

	/// Inherent provider error.
	#[error(transparent)]
	Inherent(#[from] InherentError),

	/// Head-state or offchain-worker error.
	#[error(transparent)]
	Head(#[from] HeadError),

	/// Snapshot store error.
	#[error(transparent)]
	Store(#[from] StoreError),

	/// A runtime result could not be decoded.
	#[error("Failed to decode {what}: {source}")]
	Codec {
		/// What was being decoded.
		what: &'static str,
		/// The codec error.
		source: scale::Error,
	},
}
