// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Kubernetes resource quantity parsing (`"250m"`, `"1.5"`, `"512Mi"`, `"1e9"`).

use crate::error::{ClusterCostError, Result};

const BINARY_SUFFIXES: [(&str, f64); 6] = [
    ("Ki", 1024.0),
    ("Mi", 1_048_576.0),
    ("Gi", 1_073_741_824.0),
    ("Ti", 1_099_511_627_776.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ei", 1_152_921_504_606_846_976.0),
];

const DECIMAL_SUFFIXES: [(&str, f64); 8] = [
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
];

/// Parse a quantity into its plain numeric value.
fn parse_value(raw: &str) -> Result<f64> {
    let malformed = || ClusterCostError::MalformedQuantity(raw.to_string());
    let s = raw.trim();
    if s.is_empty() {
        return Err(malformed());
    }

    let (number, multiplier) = BINARY_SUFFIXES
        .iter()
        .chain(DECIMAL_SUFFIXES.iter())
        .find_map(|(suffix, mult)| s.strip_suffix(suffix).map(|n| (n, *mult)))
        // a trailing "E" is exa, a lowercase 'e' inside is an exponent
        .or_else(|| s.strip_suffix('E').map(|n| (n, 1e18)))
        .unwrap_or((s, 1.0));

    let value: f64 = number.parse().map_err(|_| malformed())?;
    if !value.is_finite() || value < 0.0 {
        return Err(malformed());
    }
    Ok(value * multiplier)
}

/// Round up, ignoring float noise from the suffix multiplication.
fn ceil_whole(value: f64) -> u64 {
    (value - 1e-6).ceil().max(0.0) as u64
}

/// CPU quantity in millicores, rounded up like the kubelet does.
pub fn parse_cpu_millicores(raw: &str) -> Result<u64> {
    Ok(ceil_whole(parse_value(raw)? * 1000.0))
}

/// Memory quantity in bytes.
pub fn parse_memory_bytes(raw: &str) -> Result<u64> {
    Ok(ceil_whole(parse_value(raw)?))
}
