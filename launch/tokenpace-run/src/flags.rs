// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::Parser;
use tokenpace_llm::mocker::protocols::{
    DEFAULT_ITL_MS, DEFAULT_OUTPUT_LENGTH, DEFAULT_TTFT_MS, MockEngineArgs,
};
use tokenpace_runtime::config::environment_names::emulator as env_emulator;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Flags {
    /// HTTP host to bind
    #[arg(long, default_value = "0.0.0.0", env = env_emulator::TOKENPACE_HTTP_HOST)]
    pub http_host: String,

    /// HTTP port to listen on
    #[arg(long, default_value_t = 3000, env = env_emulator::TOKENPACE_HTTP_PORT)]
    pub http_port: u16,

    /// Path to a HuggingFace `tokenizer.json`. Defaults to the built-in cl100k_base vocabulary.
    #[arg(long, env = env_emulator::TOKENPACE_TOKENIZER_PATH)]
    pub tokenizer_path: Option<PathBuf>,

    /// Time to first token, in milliseconds, when a request carries no X-TTFT-MS header
    #[arg(long, default_value_t = DEFAULT_TTFT_MS, env = env_emulator::TOKENPACE_DEFAULT_TTFT_MS)]
    pub default_ttft_ms: u64,

    /// Inter-token latency, in milliseconds, when a request carries no X-ITL-MS header
    #[arg(long, default_value_t = DEFAULT_ITL_MS, env = env_emulator::TOKENPACE_DEFAULT_ITL_MS)]
    pub default_itl_ms: u64,

    /// Output length, in tokens, when a request carries no usable X-OUTPUT-LENGTH header
    #[arg(
        long,
        default_value_t = DEFAULT_OUTPUT_LENGTH as u64,
        value_parser = clap::value_parser!(u64).range(1..),
        env = env_emulator::TOKENPACE_DEFAULT_OUTPUT_LENGTH
    )]
    pub default_output_length: u64,

    /// JSON file of engine defaults. When given, it replaces the three default flags above;
    /// keys missing from the file take the built-in defaults.
    #[arg(long)]
    pub extra_engine_args: Option<PathBuf>,
}

impl Flags {
    /// The engine defaults, from `--extra-engine-args` when given, otherwise from the flags.
    pub fn engine_args(&self) -> anyhow::Result<MockEngineArgs> {
        if let Some(path) = &self.extra_engine_args {
            return MockEngineArgs::from_json_file(path);
        }

        let default_output_length = usize::try_from(self.default_output_length)?;
        Ok(MockEngineArgs::builder()
            .default_ttft_ms(self.default_ttft_ms)
            .default_itl_ms(self.default_itl_ms)
            .default_output_length(default_output_length)
            .build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(
            [
                env_emulator::TOKENPACE_HTTP_HOST,
                env_emulator::TOKENPACE_HTTP_PORT,
                env_emulator::TOKENPACE_TOKENIZER_PATH,
                env_emulator::TOKENPACE_DEFAULT_TTFT_MS,
                env_emulator::TOKENPACE_DEFAULT_ITL_MS,
                env_emulator::TOKENPACE_DEFAULT_OUTPUT_LENGTH,
            ],
            || {
                let flags = Flags::try_parse_from(["tokenpace-run"]).unwrap();
                assert_eq!(flags.http_host, "0.0.0.0");
                assert_eq!(flags.http_port, 3000);
                assert!(flags.tokenizer_path.is_none());

                let args = flags.engine_args().unwrap();
                assert_eq!(args.default_ttft_ms, 100);
                assert_eq!(args.default_itl_ms, 50);
                assert_eq!(args.default_output_length, 20);
            },
        );
    }

    #[test]
    fn test_flags_override_defaults() {
        let flags = Flags::try_parse_from([
            "tokenpace-run",
            "--http-port",
            "8081",
            "--default-ttft-ms",
            "250",
            "--default-output-length",
            "64",
        ])
        .unwrap();
        assert_eq!(flags.http_port, 8081);
        let args = flags.engine_args().unwrap();
        assert_eq!(args.default_ttft_ms, 250);
        assert_eq!(args.default_output_length, 64);
    }

    #[test]
    fn test_zero_output_length_is_rejected() {
        assert!(Flags::try_parse_from(["tokenpace-run", "--default-output-length", "0"]).is_err());
    }

    #[test]
    fn test_env_port() {
        temp_env::with_var(env_emulator::TOKENPACE_HTTP_PORT, Some("9090"), || {
            let flags = Flags::try_parse_from(["tokenpace-run"]).unwrap();
            assert_eq!(flags.http_port, 9090);
        });
    }

    #[test]
    fn test_extra_engine_args_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_itl_ms": 7}}"#).unwrap();

        let flags = Flags::try_parse_from([
            "tokenpace-run",
            "--extra-engine-args",
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        let args = flags.engine_args().unwrap();
        assert_eq!(args.default_itl_ms, 7);
        assert_eq!(args.default_ttft_ms, 100);
    }
}
