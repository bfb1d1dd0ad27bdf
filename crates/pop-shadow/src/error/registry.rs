// SPDX-License-Identifier: GPL-3.0

//! Block registry error types.

use sp_core::H256;
use thiserror::Error;

/// Errors that can occur when mutating the block registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
	/// The current head cannot be removed from the registry.
	#[error("Cannot unregister head block {0:?}")]
	HeadUnregister(H256),
}
