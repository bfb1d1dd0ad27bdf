// SPDX-License-Identifier: GPL-3.0

//! Snapshot store error types.

use thiserror::Error;

/// Errors that can occur when reading or writing persisted key/value snapshots.
#[derive(Debug, Error)]
pub enum StoreError {
	/// Underlying database error.
	#[error("Database error: {0}")]
	Database(String),
	/// A store lock was poisoned.
	#[error("Store acquire error: {0}")]
	Lock(String),
}
