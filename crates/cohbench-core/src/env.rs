//! Environment variable utilities
//!
//! Typed lookups with defaults, used by the runtime's `BenchConfig::from_env`.
//!
//! # Usage
//!
//! ```ignore
//! use cohbench_core::env::{env_get, env_get_hex};
//!
//! let iterations: u32 = env_get("COHBENCH_ITERATIONS", 100);
//! let base: u64 = env_get_hex("COHBENCH_PHYS_BASE", 0x3E00_0000);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset and unparsable values both yield the default.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get an address-like value: `0x` prefixed hex, or decimal
///
/// Underscores are ignored, so `0x3E00_0000` works.
pub fn env_get_hex(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_hex_or_dec(&v))
        .unwrap_or(default)
}

/// Parse `0x1F`, `0X1f`, `0x3E00_0000` or `4096`.
pub fn parse_hex_or_dec(s: &str) -> Option<u64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != '_').collect();
    match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => cleaned.parse().ok(),
    }
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_returns_default() {
        let val: u32 = env_get("__COHBENCH_TEST_UNSET__", 42);
        assert_eq!(val, 42);
        assert_eq!(env_get_hex("__COHBENCH_TEST_UNSET__", 0xFF11_0000), 0xFF11_0000);
        assert_eq!(env_get_str("__COHBENCH_TEST_UNSET__", "out.csv"), "out.csv");
        assert!(env_get_opt::<u32>("__COHBENCH_TEST_UNSET__").is_none());
    }

    #[test]
    fn test_parse_hex_or_dec() {
        assert_eq!(parse_hex_or_dec("0x3E00_0000"), Some(0x3E00_0000));
        assert_eq!(parse_hex_or_dec("0XFF110000"), Some(0xFF11_0000));
        assert_eq!(parse_hex_or_dec(" 4096 "), Some(4096));
        assert_eq!(parse_hex_or_dec("0xZZ"), None);
        assert_eq!(parse_hex_or_dec("lots"), None);
    }

    #[test]
    fn test_set_values() {
        std::env::set_var("__COHBENCH_TEST_ITER__", "250");
        let val: u32 = env_get("__COHBENCH_TEST_ITER__", 0);
        assert_eq!(val, 250);
        std::env::remove_var("__COHBENCH_TEST_ITER__");

        std::env::set_var("__COHBENCH_TEST_BASE__", "0x7000_0000");
        assert_eq!(env_get_hex("__COHBENCH_TEST_BASE__", 0), 0x7000_0000);
        std::env::remove_var("__COHBENCH_TEST_BASE__");

        std::env::set_var("__COHBENCH_TEST_BAD__", "ten");
        let val: u32 = env_get("__COHBENCH_TEST_BAD__", 10);
        assert_eq!(val, 10);
        std::env::remove_var("__COHBENCH_TEST_BAD__");
    }
}
