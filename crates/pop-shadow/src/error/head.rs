// SPDX-License-Identifier: GPL-3.0

//! Head transition error types.

use thiserror::Error;

/// Errors raised by collaborators that react to a new head.
#[derive(Debug, Error)]
pub enum HeadError {
	/// The head-state collaborator failed to process the new head.
	#[error("Head state transition failed: {0}")]
	HeadState(String),
	/// The offchain worker failed while running against the new head.
	#[error("Offchain worker failed: {0}")]
	OffchainWorker(String),
}
