/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Common parsing utilities and helper functions

use crate::domain::MIB;
use std::str::FromStr;

/// Split a `--format=csv,noheader,nounits` row into trimmed fields
pub fn split_csv_row(line: &str) -> Vec<&str> {
    line.split(',').map(|s| s.trim()).collect()
}

/// Parse a numeric field with surrounding whitespace trimmed
///
/// Placeholders such as `[N/A]` or `[Not Supported]` yield `None`.
pub fn parse_field<T: FromStr>(field: &str) -> Option<T> {
    field.trim().parse().ok()
}

/// Convert a MiB figure to bytes
pub fn mib_to_bytes(mib: u64) -> u64 {
    mib.saturating_mul(MIB)
}

/// Convert bytes to the compact human-readable form used in responses
///
/// # Arguments
/// * `bytes` - Number of bytes
///
/// # Returns
/// * Human-readable string (e.g., "512B", "1.5GB", "12GB")
pub fn bytes_to_human_readable(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 || size >= 10.0 {
        format!("{:.0}{}", size, UNITS[unit_index])
    } else {
        format!("{:.1}{}", size, UNITS[unit_index])
    }
}

/// Parse the leading byte count of `du -sb` style output
pub fn parse_leading_bytes(output: &str) -> Option<u64> {
    output
        .split_whitespace()
        .next()
        .and_then(|field| field.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_csv_row() {
        assert_eq!(
            split_csv_row("0, NVIDIA A100 ,  4096"),
            vec!["0", "NVIDIA A100", "4096"]
        );
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(parse_field::<u64>(" 4096 "), Some(4096));
        assert_eq!(parse_field::<f64>("71.35"), Some(71.35));
        assert_eq!(parse_field::<u32>("[N/A]"), None);
        assert_eq!(parse_field::<u32>(""), None);
    }

    #[test]
    fn test_mib_to_bytes() {
        assert_eq!(mib_to_bytes(4096), 4096 * 1024 * 1024);
    }

    #[test]
    fn test_bytes_to_human_readable() {
        assert_eq!(bytes_to_human_readable(0), "0B");
        assert_eq!(bytes_to_human_readable(512), "512B");
        assert_eq!(bytes_to_human_readable(1024), "1.0KB");
        assert_eq!(bytes_to_human_readable(1536 * 1024 * 1024), "1.5GB");
        assert_eq!(bytes_to_human_readable(12 * 1024 * 1024 * 1024), "12GB");
        assert_eq!(bytes_to_human_readable(3 * 1024_u64.pow(5)), "3072TB");
    }

    #[test]
    fn test_parse_leading_bytes() {
        assert_eq!(
            parse_leading_bytes("123456\t/publicdata/model/llama\n"),
            Some(123456)
        );
        assert_eq!(parse_leading_bytes(""), None);
        assert_eq!(parse_leading_bytes("du: cannot access"), None);
    }
}
