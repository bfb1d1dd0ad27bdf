// SPDX-License-Identifier: GPL-3.0

//! String constants for the dev method table.

/// JSON-RPC error code returned by every failed `dev_*` method.
pub const DEV_ERROR_CODE: i32 = 1;

/// Build modes accepted by `dev_setBlockBuildMode`.
pub const BUILD_MODES: [&str; 3] = ["Batch", "Instant", "Manual"];
