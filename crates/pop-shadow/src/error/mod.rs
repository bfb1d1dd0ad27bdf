// SPDX-License-Identifier: GPL-3.0

//! Error types for shadow chain operations.
//!
//! This module contains all error types used throughout the `pop-shadow` crate,
//! organized by context:
//!
//! - [`blockchain::BlockchainError`] - Errors surfaced by the chain-state coordinator.
//! - [`registry::RegistryError`] - Errors from the in-memory block registry.
//! - [`remote::RemoteError`] - Errors from the remote source collaborator.
//! - [`executor::ExecutorError`] - Errors from the runtime executor collaborator.
//! - [`txpool::TxPoolError`] - Errors from the transaction pool.
//! - [`inherent::InherentError`] - Errors from the inherent provider.
//! - [`head::HeadError`] - Errors from head-state and offchain-worker transitions.
//! - [`store::StoreError`] - Errors from the snapshot store.

pub mod blockchain;
pub mod executor;
pub mod head;
pub mod inherent;
pub mod registry;
pub mod remote;
pub mod store;
pub mod txpool;

pub use blockchain::BlockchainError;
pub use executor::ExecutorError;
pub use head::HeadError;
pub use inherent::InherentError;
pub use registry::RegistryError;
pub use remote::RemoteError;
pub use store::StoreError;
pub use txpool::TxPoolError;
