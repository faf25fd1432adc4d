// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;

use tokenpace_run::Flags;
use tokenpace_runtime::{Worker, logging};

fn main() -> anyhow::Result<()> {
    logging::init();
    let flags = Flags::parse();

    tracing::debug!(?flags, "Starting tokenpace-run");

    let worker = Worker::from_settings()?;
    worker.execute(|runtime| async move { tokenpace_run::run(runtime, flags).await })
}
