// SPDX-License-Identifier: GPL-3.0

//! Inherent provider error types.

use thiserror::Error;

/// Errors that can occur while creating inherents.
#[derive(Debug, Error)]
pub enum InherentError {
	/// Reading chain state needed for an inherent failed.
	#[error("Failed to read state for inherent {identifier}: {message}")]
	State {
		/// Identifier of the inherent being created.
		identifier: &'static str,
		/// The underlying failure.
		message: String,
	},
	/// The inherent could not be encoded.
	#[error("Failed to encode inherent {0}")]
	Encoding(&'static str),
}
