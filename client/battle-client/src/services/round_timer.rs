use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::models::timer::{RoundTimerState, TimerEvent, Urgency};

/// Countdown events after filtering, ready for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    Tick {
        remaining_seconds: u32,
        urgency: Urgency,
    },
    Expired,
}

/// Per-round countdown.
///
/// At most one countdown task exists at a time: `start` and `resume` always
/// cancel the previous one first. Every countdown gets a fresh generation and
/// `accept` drops events from older generations, so a tick that was already
/// queued when the timer was cancelled is never delivered.
pub struct RoundTimer {
    limit_secs: u32,
    tick: Duration,
    generation: u64,
    state: RoundTimerState,
    sender: UnboundedSender<TimerEvent>,
    task: Option<JoinHandle<()>>,
}

impl RoundTimer {
    pub fn new(limit_secs: u32, tick: Duration) -> (Self, UnboundedReceiver<TimerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let timer = Self {
            limit_secs: limit_secs.max(1),
            tick,
            generation: 0,
            state: RoundTimerState::default(),
            sender,
            task: None,
        };
        (timer, receiver)
    }

    /// Restarts the countdown from the full limit.
    pub fn start(&mut self) {
        self.resume(self.limit_secs);
    }

    /// Restarts the countdown from `remaining_seconds`.
    pub fn resume(&mut self, remaining_seconds: u32) {
        self.cancel();

        let remaining = remaining_seconds.clamp(1, self.limit_secs);
        self.generation += 1;
        self.state = RoundTimerState {
            remaining_seconds: remaining,
            is_running: true,
        };

        let generation = self.generation;
        let period = self.tick;
        let sender = self.sender.clone();
        self.task = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut remaining = remaining;
            loop {
                interval.tick().await;
                remaining = remaining.saturating_sub(1);
                if sender.send(TimerEvent::tick(generation, remaining)).is_err() {
                    return;
                }
                if remaining == 0 {
                    let _ = sender.send(TimerEvent::expired(generation));
                    return;
                }
            }
        }));

        tracing::debug!(
            "Round timer {} started at {}s",
            self.generation,
            remaining
        );
    }

    /// Stops the countdown. Safe to call when nothing is running.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.state.is_running {
            tracing::debug!("Round timer {} cancelled", self.generation);
        }
        self.generation += 1;
        self.state.is_running = false;
    }

    /// Applies a raw event from the countdown task. Stale events yield `None`.
    pub fn accept(&mut self, event: TimerEvent) -> Option<TimerSignal> {
        if event.generation() != self.generation || !self.state.is_running {
            return None;
        }

        match event {
            TimerEvent::TimerTick(tick) => {
                self.state.remaining_seconds = tick.remaining_seconds;
                Some(TimerSignal::Tick {
                    remaining_seconds: tick.remaining_seconds,
                    urgency: Urgency::from_remaining(tick.remaining_seconds),
                })
            }
            TimerEvent::TimeExpired(_) => {
                self.state = RoundTimerState {
                    remaining_seconds: 0,
                    is_running: false,
                };
                self.task = None;
                tracing::info!("Round timer {} expired", self.generation);
                Some(TimerSignal::Expired)
            }
        }
    }

    pub fn state(&self) -> RoundTimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.state.remaining_seconds
    }

    pub fn limit_secs(&self) -> u32 {
        self.limit_secs
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counts_down_then_expires() {
        let (mut timer, mut rx) = RoundTimer::new(3, Duration::from_secs(1));
        timer.start();
        assert!(timer.is_running());
        assert_eq!(timer.remaining_seconds(), 3);

        let mut signals = Vec::new();
        while let Some(event) = rx.recv().await {
            if let Some(signal) = timer.accept(event) {
                signals.push(signal);
                if signal == TimerSignal::Expired {
                    break;
                }
            }
        }

        assert_eq!(
            signals,
            vec![
                TimerSignal::Tick {
                    remaining_seconds: 2,
                    urgency: Urgency::Danger
                },
                TimerSignal::Tick {
                    remaining_seconds: 1,
                    urgency: Urgency::Danger
                },
                TimerSignal::Tick {
                    remaining_seconds: 0,
                    urgency: Urgency::Danger
                },
                TimerSignal::Expired,
            ]
        );
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_events_are_dropped() {
        let (mut timer, mut rx) = RoundTimer::new(30, Duration::from_secs(1));
        timer.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        timer.cancel();

        // ticks queued before the cancel are stale now
        while let Ok(event) = rx.try_recv() {
            assert_eq!(timer.accept(event), None);
        }
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let (mut timer, _rx) = RoundTimer::new(30, Duration::from_secs(1));
        timer.cancel();
        timer.start();
        timer.cancel();
        timer.cancel();
        assert_eq!(timer.state(), RoundTimerState {
            remaining_seconds: 30,
            is_running: false
        });
    }

    #[tokio::test(start_paused = true)]
    async fn resume_keeps_remaining_time() {
        let (mut timer, mut rx) = RoundTimer::new(30, Duration::from_secs(1));
        timer.resume(12);
        let event = rx.recv().await.unwrap();
        assert_eq!(
            timer.accept(event),
            Some(TimerSignal::Tick {
                remaining_seconds: 11,
                urgency: Urgency::Normal
            })
        );
    }
}
