// SPDX-License-Identifier: GPL-3.0

//! Centralized string constants for the pop-shadow crate.
//!
//! This module organizes static strings used throughout the crate to improve
//! maintainability and avoid magic strings scattered across the codebase.

pub mod dev;
pub mod storage;
pub mod txpool;
