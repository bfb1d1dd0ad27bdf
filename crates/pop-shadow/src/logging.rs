// SPDX-License-Identifier: GPL-3.0

//! Helpers for keeping log lines readable.
//!
//! Storage keys, extrinsics and messages are long hex strings. Unless `VERBOSE_LOG` is set,
//! values longer than a hash are shortened to their first 34 and last 32 characters.

use serde_json::Value;
use std::borrow::Cow;

/// Environment variable disabling truncation.
pub const VERBOSE_LOG_ENV: &str = "VERBOSE_LOG";

const MAX_LEN: usize = 66;
const HEAD_LEN: usize = 34;
const TAIL_LEN: usize = 32;
const ELLIPSIS: char = '…';
const TOO_DEEP: &str = "( Too Deep )";

fn verbose() -> bool {
	std::env::var_os(VERBOSE_LOG_ENV).is_some_and(|v| !v.is_empty())
}

/// Shorten `value` for logging.
pub fn truncate(value: &str) -> Cow<'_, str> {
	truncate_str(value, verbose())
}

/// `0x`-prefixed hex of `bytes`, shortened for logging.
pub fn hex(bytes: &[u8]) -> String {
	truncate(&format!("0x{}", ::hex::encode(bytes))).into_owned()
}

/// Shorten every string nested in `value` for logging.
pub fn truncate_json(value: &Value) -> Value {
	truncate_value(value, 0, verbose())
}

fn truncate_str(value: &str, verbose: bool) -> Cow<'_, str> {
	let len = value.chars().count();
	if verbose || len <= MAX_LEN {
		return Cow::Borrowed(value);
	}
	let head: String = value.chars().take(HEAD_LEN).collect();
	let tail: String = value.chars().skip(len - TAIL_LEN).collect();
	Cow::Owned(format!("{head}{ELLIPSIS}{tail}"))
}

fn truncate_value(value: &Value, depth: usize, verbose: bool) -> Value {
	let limit = if verbose { 10 } else { 5 };
	if value.is_null() {
		return Value::Null;
	}
	if depth > limit {
		return Value::String(TOO_DEEP.into());
	}
	match value {
		Value::String(s) => Value::String(truncate_str(s, verbose).into_owned()),
		Value::Array(items) =>
			Value::Array(items.iter().map(|v| truncate_value(v, depth + 1, verbose)).collect()),
		Value::Object(map) => Value::Object(
			map.iter()
				.map(|(k, v)| (k.clone(), truncate_value(v, depth + 1, verbose)))
				.collect(),
		),
		other => other.clone(),
	}
}
