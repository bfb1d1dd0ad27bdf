// SPDX-License-Identifier: GPL-3.0

//! Chain-state coordination for speculative shadow forks of live Polkadot SDK chains.
//!
//! A shadow chain starts at a block of a live chain and builds its own blocks on top of it.
//! State that was never touched locally is read lazily from the live chain; everything
//! written locally lives in per-block storage overlays.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    dev_* JSON-RPC methods                       │
//! │        (newBlock, setBlockBuildMode, setHead, setStorage, …)    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Blockchain                             │
//! │  ┌───────────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │ BlockRegistry │  │ head pointer │  │ dry runs (scoped     │  │
//! │  │ (bounded FIFO)│  │              │  │ overlays)            │  │
//! │  └───────────────┘  └──────────────┘  └──────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                  │                     │
//!            ▼                  ▼                     ▼
//!      RemoteSource      TransactionPool       RuntimeExecutor
//!      SnapshotStore     HeadState             InherentProvider
//! ```
//!
//! The collaborators at the bottom are traits (see [`traits`]); embedding code supplies the
//! network client, runtime executor and block producer.

pub mod block;
pub mod blockchain;
pub mod config;
pub mod dev;
pub mod dry_run;
pub mod error;
pub mod logging;
pub mod messages;
pub mod registry;
pub mod store;
mod strings;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;
pub mod txpool;
pub mod validity;

pub use block::{
	Block, HeaderInfo, OverlayScope, StorageDiff, StorageLayer, StorageOverlay, StorageView,
};
pub use blockchain::Blockchain;
pub use config::{BlockchainBuilder, ChainConfig, ExecutorConfig, SignatureMockMode};
pub use dev::{DevApi, DevApiServer, create_dev_module};
pub use dry_run::{DryRunExtrinsic, DryRunOutcome};
pub use error::{
	BlockchainError, ExecutorError, HeadError, InherentError, RegistryError, RemoteError,
	StoreError, TxPoolError,
};
pub use messages::{BuildBlockMode, BuildBlockParams, PartialBuildBlockParams};
pub use registry::BlockRegistry;
pub use store::MemoryStore;
pub use txpool::TxPool;
