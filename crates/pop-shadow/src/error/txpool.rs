// SPDX-License-Identifier: GPL-3.0

//! Txpool error types.

use thiserror::Error;

/// Errors that can occur when accessing the transaction pool.
#[derive(Debug, Error)]
pub enum TxPoolError {
	/// A pool lock was poisoned.
	#[error("TxPool acquire error: {0}")]
	Lock(String),
	/// The block producer failed to build a block.
	#[error("Block production failed: {0}")]
	Production(String),
}
