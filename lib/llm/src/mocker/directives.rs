// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-request timing directives.
//!
//! A caller dictates the latency profile and the exact output length through
//! three optional directives. Malformed values never fail a request: each one
//! falls back to the server default and the fallback is logged at `debug`.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use axum::http::HeaderMap;

use super::protocols::{LatencyProfile, MockEngineArgs, OutputSpec};

pub const TTFT_HEADER: &str = "x-ttft-ms";
pub const ITL_HEADER: &str = "x-itl-ms";
pub const OUTPUT_LENGTH_HEADER: &str = "x-output-length";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("not a number: {0:?}")]
    NotANumber(String),

    #[error("not a finite number: {0:?}")]
    NotFinite(String),

    #[error("negative value: {0:?}")]
    Negative(String),

    #[error("expected a positive integer: {0:?}")]
    NotPositive(String),
}

/// Anything that can carry named directives, matched case-insensitively.
pub trait DirectiveSource {
    fn directive(&self, name: &str) -> Option<&str>;
}

impl DirectiveSource for HeaderMap {
    fn directive(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

impl DirectiveSource for HashMap<String, String> {
    fn directive(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Parse a millisecond delay. Integers are taken as-is; non-negative finite
/// decimals round to the nearest millisecond.
pub fn parse_millis(raw: &str) -> Result<u64, DirectiveError> {
    let trimmed = raw.trim();
    if let Ok(ms) = trimmed.parse::<u64>() {
        return Ok(ms);
    }

    let value: f64 = trimmed
        .parse()
        .map_err(|_| DirectiveError::NotANumber(raw.to_string()))?;
    if !value.is_finite() {
        return Err(DirectiveError::NotFinite(raw.to_string()));
    }
    if value < 0.0 {
        return Err(DirectiveError::Negative(raw.to_string()));
    }
    // float-to-int `as` saturates at u64::MAX
    Ok(value.round() as u64)
}

/// Parse a requested output length; only positive integers are accepted.
pub fn parse_output_length(raw: &str) -> Result<NonZeroUsize, DirectiveError> {
    let trimmed = raw.trim();
    match trimmed.parse::<usize>() {
        Ok(n) => NonZeroUsize::new(n).ok_or_else(|| DirectiveError::NotPositive(raw.to_string())),
        Err(_) if trimmed.starts_with('-') && trimmed[1..].parse::<u64>().is_ok() => {
            Err(DirectiveError::Negative(raw.to_string()))
        }
        Err(_) => Err(DirectiveError::NotPositive(raw.to_string())),
    }
}

/// The resolved directives of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDirectives {
    pub profile: LatencyProfile,
    pub output: OutputSpec,
}

impl RequestDirectives {
    pub fn from_source(source: &impl DirectiveSource, args: &MockEngineArgs) -> Self {
        let ttft_ms = resolve(source, TTFT_HEADER, parse_millis, args.default_ttft_ms);
        let itl_ms = resolve(source, ITL_HEADER, parse_millis, args.default_itl_ms);
        let output = resolve(
            source,
            OUTPUT_LENGTH_HEADER,
            |raw| parse_output_length(raw).map(OutputSpec::new),
            args.default_output(),
        );

        RequestDirectives {
            profile: LatencyProfile::new(ttft_ms, itl_ms),
            output,
        }
    }
}

impl From<&MockEngineArgs> for RequestDirectives {
    fn from(args: &MockEngineArgs) -> Self {
        RequestDirectives {
            profile: args.default_profile(),
            output: args.default_output(),
        }
    }
}

fn resolve<T: std::fmt::Debug>(
    source: &impl DirectiveSource,
    name: &str,
    parse: impl Fn(&str) -> Result<T, DirectiveError>,
    default: T,
) -> T {
    let Some(raw) = source.directive(name) else {
        return default;
    };
    match parse(raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(directive = name, %err, ?default, "falling back to default");
            default
        }
    }
}
