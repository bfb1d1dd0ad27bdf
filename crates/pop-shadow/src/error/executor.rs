// SPDX-License-Identifier: GPL-3.0

//! Runtime executor error types.

use thiserror::Error;

/// Errors that can occur while executing runtime calls.
#[derive(Debug, Error)]
pub enum ExecutorError {
	/// Runtime code could not be loaded for the target block.
	#[error("Runtime code not found for block {0}")]
	RuntimeCodeNotFound(String),
	/// The runtime trapped or returned an error while executing `method`.
	#[error("Runtime call {method} failed: {message}")]
	CallFailed {
		/// The runtime API method that failed.
		method: String,
		/// Reason reported by the executor.
		message: String,
	},
	/// Reading storage required by the call failed.
	#[error("Storage access failed: {0}")]
	Storage(String),
}
