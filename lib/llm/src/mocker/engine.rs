// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! MockChatEngine - drives the emission scheduler for one chat completion
//!
//! A request is first *prepared*: directives are resolved, the prompt is
//! counted and the output units are synthesized, all before any time is
//! spent. The prepared request is then run either buffered (one awaited
//! result after the full latency) or streaming (a producer task feeding a
//! channel that the transport drains).

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::directives::{DirectiveSource, RequestDirectives};
use super::protocols::{
    EmissionEvent, EmissionReport, FinishReason, LatencyProfile, MockEngineArgs, OutputSpec,
};
use super::scheduler::EmissionScheduler;
use super::synthesizer::{SynthesisError, TokenSynthesizer};
use super::usage::{UsageAccountant, UsageSummary};
use crate::tokenizers::SharedTokenizer;

/// A request whose units and usage are fixed; only the timing remains.
#[derive(Debug)]
pub struct PreparedCompletion {
    /// Origin of the schedule; preparation time counts against the TTFT.
    pub received_at: Instant,
    pub profile: LatencyProfile,
    pub output: OutputSpec,
    pub usage: UsageSummary,
    units: Vec<String>,
}

impl PreparedCompletion {
    pub fn units(&self) -> &[String] {
        &self.units
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedCompletion {
    pub text: String,
    pub usage: UsageSummary,
    /// `None` when the run was cancelled before finishing.
    pub finish_reason: Option<FinishReason>,
    pub report: EmissionReport,
}

#[derive(Clone)]
pub struct MockChatEngine {
    synthesizer: Arc<TokenSynthesizer>,
    accountant: UsageAccountant,
    args: MockEngineArgs,
}

impl MockChatEngine {
    pub fn new(tokenizer: SharedTokenizer, args: MockEngineArgs) -> Result<Self, SynthesisError> {
        let synthesizer = Arc::new(TokenSynthesizer::new(tokenizer.clone())?);
        tracing::info!(
            default_ttft_ms = args.default_ttft_ms,
            default_itl_ms = args.default_itl_ms,
            default_output_length = args.default_output_length,
            "Mock chat engine ready"
        );
        Ok(MockChatEngine {
            synthesizer,
            accountant: UsageAccountant::new(tokenizer),
            args,
        })
    }

    pub fn directives(&self, source: &impl DirectiveSource) -> RequestDirectives {
        RequestDirectives::from_source(source, &self.args)
    }

    /// Count the prompt and synthesize the output.
    ///
    /// `received_at` is when the request arrived. Unit `i` is released at
    /// `received_at + ttft + i * itl` however long preparation took.
    pub fn prepare<'a>(
        &self,
        received_at: Instant,
        prompt_segments: impl IntoIterator<Item = &'a str>,
        directives: RequestDirectives,
    ) -> Result<PreparedCompletion, SynthesisError> {
        let requested = directives.output.requested_token_count();
        let usage = self
            .accountant
            .summarize_segments(prompt_segments, requested);
        let units = self.synthesizer.synthesize(requested)?;

        Ok(PreparedCompletion {
            received_at,
            profile: directives.profile,
            output: directives.output,
            usage,
            units,
        })
    }

    /// Run to completion, paying `ttft + (n - 1) * itl` before returning.
    pub async fn run_buffered(
        &self,
        prepared: PreparedCompletion,
        cancel: &CancellationToken,
    ) -> BufferedCompletion {
        let PreparedCompletion {
            received_at,
            profile,
            usage,
            units,
            ..
        } = prepared;

        let mut scheduler = EmissionScheduler::new(profile, units).with_origin(received_at);
        let text = scheduler.run_to_completion(cancel).await;
        let report = scheduler.report();

        match text {
            Some(text) => BufferedCompletion {
                text,
                usage,
                finish_reason: Some(FinishReason::Stop),
                report,
            },
            None => BufferedCompletion {
                text: String::new(),
                usage,
                finish_reason: None,
                report,
            },
        }
    }

    /// Spawn the producer and return the stream of its events.
    ///
    /// The producer stops when `parent` is cancelled, when the returned
    /// stream is dropped, or when [`EmissionStream::cancel`] is called.
    pub fn run_streaming(
        &self,
        prepared: PreparedCompletion,
        parent: &CancellationToken,
    ) -> EmissionStream {
        let PreparedCompletion {
            received_at,
            profile,
            output,
            usage,
            units,
        } = prepared;

        let token = parent.child_token();
        let (tx, rx) = mpsc::unbounded_channel::<EmissionEvent>();

        let producer = tokio::spawn({
            let token = token.clone();
            async move {
                let mut scheduler = EmissionScheduler::new(profile, units).with_origin(received_at);
                while let Some(event) = scheduler.next_event(&token).await {
                    if tx.send(event).is_err() {
                        tracing::debug!("emission receiver closed");
                        token.cancel();
                    }
                }
                let report = scheduler.report();
                tracing::trace!(?report, "emission producer finished");
                report
            }
        });

        EmissionStream {
            events: UnboundedReceiverStream::new(rx),
            producer: Some(producer),
            usage,
            requested: output.requested_token_count(),
            token: token.clone(),
            _guard: token.drop_guard(),
        }
    }
}

/// Events of one streaming run, in emission order.
///
/// Dropping the stream cancels the producer and releases its timer.
pub struct EmissionStream {
    events: UnboundedReceiverStream<EmissionEvent>,
    producer: Option<JoinHandle<EmissionReport>>,
    usage: UsageSummary,
    requested: usize,
    token: CancellationToken,
    _guard: DropGuard,
}

impl EmissionStream {
    pub fn usage(&self) -> &UsageSummary {
        &self.usage
    }

    /// Cancel the producer and wait until it has released its timer.
    pub async fn cancel(mut self) -> EmissionReport {
        self.token.cancel();
        self.join().await
    }

    /// Wait for the producer to exit on its own, e.g. after the stream is drained.
    pub async fn finish(mut self) -> EmissionReport {
        self.join().await
    }

    async fn join(&mut self) -> EmissionReport {
        let requested = self.requested;
        match self.producer.take() {
            Some(producer) => producer.await.unwrap_or_else(|err| {
                tracing::error!(%err, "emission producer failed");
                EmissionReport {
                    requested,
                    emitted: 0,
                    cancelled: true,
                }
            }),
            None => EmissionReport {
                requested,
                emitted: 0,
                cancelled: true,
            },
        }
    }
}

impl Stream for EmissionStream {
    type Item = EmissionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::time::Duration;

    fn engine() -> MockChatEngine {
        MockChatEngine::new(
            SharedTokenizer::cl100k().unwrap(),
            MockEngineArgs::default(),
        )
        .unwrap()
    }

    fn directives(engine: &MockChatEngine, ttft: &str, itl: &str, n: &str) -> RequestDirectives {
        let headers = HashMap::from([
            ("x-ttft-ms".to_string(), ttft.to_string()),
            ("x-itl-ms".to_string(), itl.to_string()),
            ("x-output-length".to_string(), n.to_string()),
        ]);
        engine.directives(&headers)
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffered_scenario() {
        let engine = engine();
        let prepared = engine
            .prepare(Instant::now(), ["Tell me a story."], directives(&engine, "200", "50", "25"))
            .unwrap();

        let start = Instant::now();
        let completion = engine
            .run_buffered(prepared, &CancellationToken::new())
            .await;
        assert!(start.elapsed() >= Duration::from_millis(1400));

        let tokenizer = SharedTokenizer::cl100k().unwrap();
        assert_eq!(tokenizer.count(&completion.text).unwrap(), 25);
        assert_eq!(completion.usage.completion_tokens, 25);
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.report.emitted, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_length_defaults_to_twenty() {
        let engine = engine();
        let prepared = engine
            .prepare(Instant::now(), ["hi"], directives(&engine, "0", "0", "abc"))
            .unwrap();
        assert_eq!(prepared.units().len(), 20);

        let completion = engine
            .run_buffered(prepared, &CancellationToken::new())
            .await;
        let tokenizer = SharedTokenizer::cl100k().unwrap();
        assert_eq!(tokenizer.count(&completion.text).unwrap(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_scenario() {
        let engine = engine();
        let prepared = engine
            .prepare(Instant::now(), ["Tell me a story."], directives(&engine, "150", "75", "30"))
            .unwrap();

        let start = Instant::now();
        let mut stream = engine.run_streaming(prepared, &CancellationToken::new());
        assert_eq!(stream.usage().completion_tokens, 30);

        let mut received = Vec::new();
        let mut finished = 0;
        while let Some(event) = stream.next().await {
            match event {
                EmissionEvent::Unit(unit) => {
                    assert_eq!(unit.index, received.len());
                    assert!(start.elapsed() >= Duration::from_millis(150 + 75 * unit.index as u64));
                    received.push(unit.text);
                }
                EmissionEvent::Finished(reason) => {
                    assert_eq!(reason, FinishReason::Stop);
                    finished += 1;
                }
            }
        }

        assert_eq!(received.len(), 30);
        assert_eq!(finished, 1);
        assert!(start.elapsed() >= Duration::from_millis(2325));

        let report = stream.finish().await;
        assert_eq!(
            report,
            EmissionReport {
                requested: 30,
                emitted: 30,
                cancelled: false
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_is_anchored_at_request_arrival() {
        let engine = engine();

        // preparation shorter than the TTFT is absorbed by it
        let received_at = Instant::now();
        let prepared = engine
            .prepare(received_at, ["hi"], directives(&engine, "100", "0", "3"))
            .unwrap();
        tokio::time::advance(Duration::from_millis(80)).await;
        let mut stream = engine.run_streaming(prepared, &CancellationToken::new());
        assert!(matches!(stream.next().await, Some(EmissionEvent::Unit(_))));
        assert_eq!(received_at.elapsed(), Duration::from_millis(100));

        // preparation longer than the TTFT releases the first unit at once
        let received_at = Instant::now();
        let prepared = engine
            .prepare(received_at, ["hi"], directives(&engine, "100", "50", "3"))
            .unwrap();
        tokio::time::advance(Duration::from_millis(300)).await;
        let completion = engine
            .run_buffered(prepared, &CancellationToken::new())
            .await;
        assert_eq!(completion.report.emitted, 3);
        assert_eq!(received_at.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_k_units() {
        let engine = engine();
        let prepared = engine
            .prepare(Instant::now(), ["hi"], directives(&engine, "10", "100", "50"))
            .unwrap();
        let mut stream = engine.run_streaming(prepared, &CancellationToken::new());

        for _ in 0..5 {
            assert!(matches!(stream.next().await, Some(EmissionEvent::Unit(_))));
        }

        // usage stays at the requested count
        assert_eq!(stream.usage().completion_tokens, 50);

        let report = stream.cancel().await;
        assert!(report.cancelled);
        assert_eq!(report.requested, 50);
        assert!((5..50).contains(&report.emitted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_stream_stops_producer() {
        let engine = engine();
        let parent = CancellationToken::new();
        let prepared = engine
            .prepare(Instant::now(), ["hi"], directives(&engine, "10", "100", "50"))
            .unwrap();
        let mut stream = engine.run_streaming(prepared, &parent);
        stream.next().await;

        let token = stream.token.clone();
        drop(stream);
        assert!(token.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_ends_stream() {
        let engine = engine();
        let parent = CancellationToken::new();
        let prepared = engine
            .prepare(Instant::now(), ["hi"], directives(&engine, "10", "100", "50"))
            .unwrap();
        let mut stream = engine.run_streaming(prepared, &parent);
        stream.next().await;

        parent.cancel();
        assert_eq!(stream.next().await, None);
        assert!(stream.finish().await.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffered_cancel_reports_partial_run() {
        let engine = engine();
        let cancel = CancellationToken::new();
        let prepared = engine
            .prepare(Instant::now(), ["hi"], directives(&engine, "100", "100", "10"))
            .unwrap();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(350)).await;
                cancel.cancel();
            })
        };

        let completion = engine.run_buffered(prepared, &cancel).await;
        canceller.await.unwrap();

        assert_eq!(completion.finish_reason, None);
        assert_eq!(completion.report.emitted, 3);
        assert!(completion.report.cancelled);
        assert_eq!(completion.usage.completion_tokens, 10);
    }
}
