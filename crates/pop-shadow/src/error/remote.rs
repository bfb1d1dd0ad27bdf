// SPDX-License-Identifier: GPL-3.0

//! Remote source error types.

use thiserror::Error;

/// Errors that can occur when talking to the remote chain.
#[derive(Debug, Error)]
pub enum RemoteError {
	/// Failed to connect to the remote endpoint.
	#[error("Failed to connect to {endpoint}: {message}")]
	ConnectionFailed {
		/// The endpoint that failed to connect.
		endpoint: String,
		/// The error message describing the failure.
		message: String,
	},
	/// Remote request failed.
	#[error("Remote request failed: {0}")]
	RequestFailed(String),
	/// The remote answered with something that could not be understood.
	#[error("Invalid remote response: {0}")]
	InvalidResponse(String),
}
