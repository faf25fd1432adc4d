// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_TTFT_MS: u64 = 100;
pub const DEFAULT_ITL_MS: u64 = 50;
pub const DEFAULT_OUTPUT_LENGTH: usize = 20;

/// Timing contract for one request: the delay before unit 0 and the delay
/// between consecutive units. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyProfile {
    ttft_ms: u64,
    itl_ms: u64,
}

impl LatencyProfile {
    pub fn new(ttft_ms: u64, itl_ms: u64) -> Self {
        LatencyProfile { ttft_ms, itl_ms }
    }

    pub fn ttft_ms(&self) -> u64 {
        self.ttft_ms
    }

    pub fn itl_ms(&self) -> u64 {
        self.itl_ms
    }

    /// Offset from request start at which unit `index` becomes ready:
    /// `ttft + index * itl`, saturating.
    pub fn ready_at_ms(&self, index: usize) -> u64 {
        let index = u64::try_from(index).unwrap_or(u64::MAX);
        self.ttft_ms
            .saturating_add(index.saturating_mul(self.itl_ms))
    }

    /// Wall-clock cost of emitting `count` units, i.e. the ready time of the last one.
    pub fn total_ms(&self, count: usize) -> u64 {
        match count {
            0 => self.ttft_ms,
            n => self.ready_at_ms(n - 1),
        }
    }
}

impl Default for LatencyProfile {
    fn default() -> Self {
        LatencyProfile::new(DEFAULT_TTFT_MS, DEFAULT_ITL_MS)
    }
}

/// The exact number of tokens a request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    requested_token_count: NonZeroUsize,
}

impl OutputSpec {
    pub fn new(requested_token_count: NonZeroUsize) -> Self {
        OutputSpec {
            requested_token_count,
        }
    }

    pub fn requested_token_count(&self) -> usize {
        self.requested_token_count.get()
    }
}

/// One output token, as handed to the response assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedUnit {
    pub index: usize,
    pub text: String,
    pub ready_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmissionEvent {
    Unit(EmittedUnit),
    Finished(FinishReason),
}

/// What a scheduler actually did, independent of what usage reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmissionReport {
    pub requested: usize,
    pub emitted: usize,
    pub cancelled: bool,
}

/// Server-side defaults applied when a request carries no usable timing directive.
#[derive(Debug, Clone, Serialize, Deserialize, Builder, Validate)]
#[builder(pattern = "owned", build_fn(public))]
pub struct MockEngineArgs {
    #[builder(default = "DEFAULT_TTFT_MS")]
    pub default_ttft_ms: u64,

    #[builder(default = "DEFAULT_ITL_MS")]
    pub default_itl_ms: u64,

    #[validate(range(min = 1))]
    #[builder(default = "DEFAULT_OUTPUT_LENGTH")]
    pub default_output_length: usize,
}

impl Default for MockEngineArgs {
    fn default() -> MockEngineArgs {
        MockEngineArgs {
            default_ttft_ms: DEFAULT_TTFT_MS,
            default_itl_ms: DEFAULT_ITL_MS,
            default_output_length: DEFAULT_OUTPUT_LENGTH,
        }
    }
}

impl MockEngineArgs {
    pub fn builder() -> MockEngineArgsBuilder {
        MockEngineArgsBuilder::default()
    }

    pub fn default_profile(&self) -> LatencyProfile {
        LatencyProfile::new(self.default_ttft_ms, self.default_itl_ms)
    }

    pub fn default_output(&self) -> OutputSpec {
        OutputSpec::new(
            NonZeroUsize::new(self.default_output_length).unwrap_or(NonZeroUsize::MIN),
        )
    }

    /// Create MockEngineArgs from a JSON file of overrides
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let mut builder = Self::builder();

        let file_content = std::fs::read_to_string(path)?;
        let extra_args: HashMap<String, serde_json::Value> = serde_json::from_str(&file_content)?;

        let valid_fields: HashSet<&str> = [
            "default_ttft_ms",
            "default_itl_ms",
            "default_output_length",
        ]
        .iter()
        .cloned()
        .collect();

        let mut invalid_args: Vec<String> = extra_args
            .keys()
            .filter(|key| !valid_fields.contains(key.as_str()))
            .cloned()
            .collect();
        invalid_args.sort();

        if !invalid_args.is_empty() {
            return Err(anyhow::anyhow!(
                "Invalid arguments found in JSON file: {}. Valid arguments are: {:?}",
                invalid_args.join(", "),
                valid_fields
            ));
        }

        if let Some(value) = extra_args.get("default_ttft_ms")
            && let Some(num) = value.as_u64()
        {
            builder = builder.default_ttft_ms(num);
        }

        if let Some(value) = extra_args.get("default_itl_ms")
            && let Some(num) = value.as_u64()
        {
            builder = builder.default_itl_ms(num);
        }

        if let Some(value) = extra_args.get("default_output_length")
            && let Some(num) = value.as_u64()
        {
            builder = builder.default_output_length(num as usize);
        }

        let args = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build MockEngineArgs: {}", e))?;
        args.validate()?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ready_at_is_absolute_offset() {
        let profile = LatencyProfile::new(150, 75);
        assert_eq!(profile.ready_at_ms(0), 150);
        assert_eq!(profile.ready_at_ms(29), 150 + 29 * 75);
        assert_eq!(profile.total_ms(30), 2325);
        assert_eq!(profile.total_ms(1), 150);
    }

    #[test]
    fn test_ready_at_saturates() {
        let profile = LatencyProfile::new(u64::MAX - 1, 10);
        assert_eq!(profile.ready_at_ms(5), u64::MAX);
    }

    #[test]
    fn test_defaults() {
        let args = MockEngineArgs::default();
        assert_eq!(args.default_profile(), LatencyProfile::new(100, 50));
        assert_eq!(args.default_output().requested_token_count(), 20);

        let built = MockEngineArgs::builder().default_itl_ms(5).build().unwrap();
        assert_eq!(built.default_ttft_ms, 100);
        assert_eq!(built.default_itl_ms, 5);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_ttft_ms": 250, "default_output_length": 64}}"#).unwrap();

        let args = MockEngineArgs::from_json_file(file.path()).unwrap();
        assert_eq!(args.default_ttft_ms, 250);
        assert_eq!(args.default_itl_ms, DEFAULT_ITL_MS);
        assert_eq!(args.default_output_length, 64);
    }

    #[test]
    fn test_from_json_file_rejects_unknown_and_zero() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"num_gpu_blocks": 8}}"#).unwrap();
        let err = MockEngineArgs::from_json_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("num_gpu_blocks"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_output_length": 0}}"#).unwrap();
        assert!(MockEngineArgs::from_json_file(file.path()).is_err());
    }
}
