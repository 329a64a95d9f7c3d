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

//! Disk usage parsing functions

/// Pick the free-space figure from `df --output=avail,source -B1` output
///
/// The row whose source is `device` wins. Without such a row the largest
/// available figure across all filesystems is used, which is normally the
/// main data disk.
///
/// # Arguments
/// * `output` - Raw df output, header included
/// * `device` - Block device to look for (e.g. `/dev/nvme1n1p1`)
///
/// # Returns
/// * `Some(bytes)` - Available bytes
/// * `None` - No parsable row
pub fn parse_df_available(output: &str, device: &str) -> Option<u64> {
    let mut largest: Option<u64> = None;

    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let Some(avail) = fields.next().and_then(|f| f.parse::<u64>().ok()) else {
            continue;
        };
        let source = fields.next().unwrap_or("");

        if source == device {
            return Some(avail);
        }
        largest = Some(largest.map_or(avail, |l| l.max(avail)));
    }

    largest
}
