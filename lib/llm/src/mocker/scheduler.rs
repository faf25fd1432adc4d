// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Emission scheduler.
//!
//! A timer-driven state machine that releases pre-synthesized units at the
//! offsets dictated by a [`LatencyProfile`]:
//!
//! ```text
//! Idle -> AwaitingFirst -> Emitting(0) -> ... -> Emitting(n-1) -> Done
//!              \________________\___________________\________-> Cancelled
//! ```
//!
//! Unit `i` is released at the absolute deadline `origin + ttft + i * itl`,
//! measured on the tokio clock, so a late wake-up never shifts later units and
//! never skips or duplicates one. The same machine serves buffered delivery
//! ([`EmissionScheduler::run_to_completion`]) and streaming delivery (one
//! [`EmissionScheduler::next_event`] call per event).
//!
//! `next_event` is cancel-safe: dropping it mid-wait leaves the state
//! untouched and the next call waits for the same deadline.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::protocols::{EmissionEvent, EmissionReport, EmittedUnit, FinishReason, LatencyProfile};

/// Upper bound for a deadline that would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    AwaitingFirst,
    /// Unit `i` has been released.
    Emitting(usize),
    Done,
    Cancelled,
}

#[derive(Debug)]
pub struct EmissionScheduler {
    profile: LatencyProfile,
    // taken on release, so delivered text is not retained
    units: Vec<Option<String>>,
    state: SchedulerState,
    origin: Option<Instant>,
    emitted: usize,
}

impl EmissionScheduler {
    pub fn new(profile: LatencyProfile, units: Vec<String>) -> Self {
        EmissionScheduler {
            profile,
            units: units.into_iter().map(Some).collect(),
            state: SchedulerState::Idle,
            origin: None,
            emitted: 0,
        }
    }

    /// Anchor the schedule at `origin` instead of the first call to [`Self::next_event`].
    pub fn with_origin(mut self, origin: Instant) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn report(&self) -> EmissionReport {
        EmissionReport {
            requested: self.units.len(),
            emitted: self.emitted,
            cancelled: self.state == SchedulerState::Cancelled,
        }
    }

    /// Advance by one event.
    ///
    /// Returns the next unit once its deadline has passed, then a single
    /// `Finished` marker, then `None`. Returns `None` immediately, and forever
    /// after, once `cancel` fires.
    pub async fn next_event(&mut self, cancel: &CancellationToken) -> Option<EmissionEvent> {
        match self.state {
            SchedulerState::Idle => {
                let origin = *self.origin.get_or_insert_with(Instant::now);
                tracing::trace!(?origin, requested = self.units.len(), "awaiting first unit");
                if self.units.is_empty() {
                    self.state = SchedulerState::Done;
                    return Some(EmissionEvent::Finished(FinishReason::Stop));
                }
                self.state = SchedulerState::AwaitingFirst;
                self.release(0, cancel).await
            }
            SchedulerState::AwaitingFirst => self.release(0, cancel).await,
            SchedulerState::Emitting(i) if i + 1 < self.units.len() => {
                self.release(i + 1, cancel).await
            }
            SchedulerState::Emitting(_) => {
                self.state = SchedulerState::Done;
                Some(EmissionEvent::Finished(FinishReason::Stop))
            }
            SchedulerState::Done | SchedulerState::Cancelled => None,
        }
    }

    /// Drive the schedule to `Done`, concatenating every unit.
    ///
    /// Pays the full timing cost before returning. Returns `None` if
    /// cancelled; [`Self::report`] then tells how far it got.
    pub async fn run_to_completion(&mut self, cancel: &CancellationToken) -> Option<String> {
        let mut text = String::new();
        while let Some(event) = self.next_event(cancel).await {
            match event {
                EmissionEvent::Unit(unit) => text.push_str(&unit.text),
                EmissionEvent::Finished(_) => return Some(text),
            }
        }
        None
    }

    async fn release(&mut self, index: usize, cancel: &CancellationToken) -> Option<EmissionEvent> {
        let ready_at_ms = self.profile.ready_at_ms(index);
        let deadline = self.deadline(ready_at_ms);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(index, emitted = self.emitted, "emission cancelled");
                self.state = SchedulerState::Cancelled;
                return None;
            }
            _ = tokio::time::sleep_until(deadline) => {}
        }

        let text = self.units.get_mut(index).and_then(Option::take)?;
        self.emitted += 1;
        self.state = SchedulerState::Emitting(index);

        Some(EmissionEvent::Unit(EmittedUnit {
            index,
            text,
            ready_at_ms,
        }))
    }

    fn deadline(&self, offset_ms: u64) -> Instant {
        let origin = self.origin.unwrap_or_else(Instant::now);
        origin
            .checked_add(Duration::from_millis(offset_ms))
            .unwrap_or(origin + FAR_FUTURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn units(n: usize) -> Vec<String> {
        (0..n).map(|i| format!(" u{i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_units_release_at_absolute_offsets() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let mut scheduler = EmissionScheduler::new(LatencyProfile::new(150, 75), units(30));
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        for i in 0..30 {
            let Some(EmissionEvent::Unit(unit)) = scheduler.next_event(&cancel).await else {
                panic!("expected unit {i}");
            };
            assert_eq!(unit.index, i);
            assert_eq!(unit.ready_at_ms, 150 + 75 * i as u64);
            assert_eq!(start.elapsed(), Duration::from_millis(unit.ready_at_ms));
            assert_eq!(scheduler.state(), SchedulerState::Emitting(i));
        }

        assert_eq!(
            scheduler.next_event(&cancel).await,
            Some(EmissionEvent::Finished(FinishReason::Stop))
        );
        // no trailing wait after the last unit
        assert_eq!(start.elapsed(), Duration::from_millis(2325));
        assert_eq!(scheduler.state(), SchedulerState::Done);
        assert_eq!(scheduler.next_event(&cancel).await, None);
        assert_eq!(
            scheduler.report(),
            EmissionReport {
                requested: 30,
                emitted: 30,
                cancelled: false
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffered_run_pays_full_cost() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let mut scheduler = EmissionScheduler::new(LatencyProfile::new(200, 50), units(25));

        let text = scheduler.run_to_completion(&cancel).await.unwrap();
        assert_eq!(text, units(25).concat());
        assert_eq!(start.elapsed(), Duration::from_millis(1400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_unit_has_no_itl() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let mut scheduler = EmissionScheduler::new(LatencyProfile::new(40, 10_000), units(1));
        scheduler.run_to_completion(&cancel).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_consumer_does_not_shift_schedule() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let mut scheduler = EmissionScheduler::new(LatencyProfile::new(100, 50), units(5));

        scheduler.next_event(&cancel).await;
        // consumer stalls past the next two deadlines
        tokio::time::sleep(Duration::from_millis(120)).await;

        let Some(EmissionEvent::Unit(unit)) = scheduler.next_event(&cancel).await else {
            panic!("expected unit 1");
        };
        assert_eq!(unit.index, 1);
        assert_eq!(start.elapsed(), Duration::from_millis(220));

        let Some(EmissionEvent::Unit(unit)) = scheduler.next_event(&cancel).await else {
            panic!("expected unit 2");
        };
        assert_eq!(unit.index, 2);
        assert_eq!(start.elapsed(), Duration::from_millis(220));

        let Some(EmissionEvent::Unit(unit)) = scheduler.next_event(&cancel).await else {
            panic!("expected unit 3");
        };
        assert_eq!(unit.index, 3);
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_wait_stops_emission() {
        let cancel = CancellationToken::new();
        let mut scheduler = EmissionScheduler::new(LatencyProfile::new(100, 1000), units(10));

        for _ in 0..3 {
            assert!(matches!(
                scheduler.next_event(&cancel).await,
                Some(EmissionEvent::Unit(_))
            ));
        }

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cancel.cancel();
            })
        };

        let start = Instant::now();
        assert_eq!(scheduler.next_event(&cancel).await, None);
        assert_eq!(start.elapsed(), Duration::from_millis(10));
        canceller.await.unwrap();

        assert_eq!(scheduler.state(), SchedulerState::Cancelled);
        assert_eq!(scheduler.next_event(&cancel).await, None);
        assert_eq!(
            scheduler.report(),
            EmissionReport {
                requested: 10,
                emitted: 3,
                cancelled: true
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins_over_elapsed_deadline() {
        let cancel = CancellationToken::new();
        let mut scheduler = EmissionScheduler::new(LatencyProfile::new(0, 0), units(3));
        cancel.cancel();
        assert_eq!(scheduler.run_to_completion(&cancel).await, None);
        assert_eq!(scheduler.report().emitted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_wait_resumes_same_deadline() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let mut scheduler = EmissionScheduler::new(LatencyProfile::new(100, 50), units(2));

        let timed_out =
            tokio::time::timeout(Duration::from_millis(30), scheduler.next_event(&cancel)).await;
        assert!(timed_out.is_err());
        assert_eq!(scheduler.state(), SchedulerState::AwaitingFirst);

        let Some(EmissionEvent::Unit(unit)) = scheduler.next_event(&cancel).await else {
            panic!("expected unit 0");
        };
        assert_eq!(unit.index, 0);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_delays_do_not_overflow() {
        let cancel = CancellationToken::new();
        let mut scheduler =
            EmissionScheduler::new(LatencyProfile::new(u64::MAX, u64::MAX), units(2));
        let result =
            tokio::time::timeout(Duration::from_secs(3600), scheduler.next_event(&cancel)).await;
        assert!(result.is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_exact_count_in_order(ttft in 0u64..500, itl in 0u64..200, n in 1usize..60) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();

            let (indices, offsets, finished, elapsed) = rt.block_on(async move {
                let cancel = CancellationToken::new();
                let start = Instant::now();
                let mut scheduler = EmissionScheduler::new(LatencyProfile::new(ttft, itl), units(n));
                let mut indices = Vec::new();
                let mut offsets = Vec::new();
                let mut finished = 0;
                while let Some(event) = scheduler.next_event(&cancel).await {
                    match event {
                        EmissionEvent::Unit(unit) => {
                            indices.push(unit.index);
                            offsets.push(start.elapsed().as_millis() as u64);
                        }
                        EmissionEvent::Finished(_) => finished += 1,
                    }
                }
                (indices, offsets, finished, start.elapsed())
            });

            prop_assert_eq!(indices, (0..n).collect::<Vec<_>>());
            prop_assert_eq!(finished, 1);
            for (i, offset) in offsets.iter().enumerate() {
                prop_assert_eq!(*offset, ttft + i as u64 * itl);
            }
            prop_assert_eq!(elapsed, Duration::from_millis(ttft + (n as u64 - 1) * itl));
        }
    }
}
