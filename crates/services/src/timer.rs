//! One-second countdown driver for a running session.
//!
//! The timer owns no countdown value of its own. Each cycle it reads the
//! current remaining time from a `watch` channel and either reports a tick or,
//! when one second or less is left, reports expiry once and halts. Whoever
//! consumes those notifications is responsible for decrementing the value.
//!
//! Every start opens a new [`TimerRun`] and each notification carries the run
//! that produced it, so a consumer can drop notifications queued by a cycle
//! that has since been stopped.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Cycle length of the production countdown.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Sequence number of one started cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRun(u64);

type Handler = Box<dyn Fn(TimerRun) + Send + Sync>;

struct Handlers {
    on_tick: Handler,
    on_expire: Handler,
}

/// Edge-triggered periodic task around a shared remaining-time reading.
pub struct Timer {
    remaining: watch::Receiver<u32>,
    handlers: Arc<Mutex<Handlers>>,
    period: Duration,
    running: bool,
    run: u64,
    task: Option<JoinHandle<()>>,
}

impl Timer {
    #[must_use]
    pub fn new(
        remaining: watch::Receiver<u32>,
        on_tick: impl Fn(TimerRun) + Send + Sync + 'static,
        on_expire: impl Fn(TimerRun) + Send + Sync + 'static,
    ) -> Self {
        Self {
            remaining,
            handlers: Arc::new(Mutex::new(Handlers {
                on_tick: Box::new(on_tick),
                on_expire: Box::new(on_expire),
            })),
            period: TICK_PERIOD,
            running: false,
            run: 0,
            task: None,
        }
    }

    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Swap the notification handlers. A running cycle keeps its schedule and
    /// uses the new handlers from its next firing on.
    pub fn set_handlers(
        &self,
        on_tick: impl Fn(TimerRun) + Send + Sync + 'static,
        on_expire: impl Fn(TimerRun) + Send + Sync + 'static,
    ) {
        let mut handlers = lock(&self.handlers);
        handlers.on_tick = Box::new(on_tick);
        handlers.on_expire = Box::new(on_expire);
    }

    /// Follow the running flag: a false-to-true edge starts a fresh cycle,
    /// a true-to-false edge cancels it. Repeating the current value is a no-op.
    ///
    /// Starting requires a Tokio runtime context.
    pub fn set_running(&mut self, running: bool) {
        if running == self.running {
            return;
        }
        self.running = running;
        if running {
            self.start();
        } else {
            self.stop();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The cycle notifications are currently accepted from; `None` while stopped.
    #[must_use]
    pub fn current_run(&self) -> Option<TimerRun> {
        self.running.then_some(TimerRun(self.run))
    }

    /// Whether the periodic task is still scheduled; false after expiry even
    /// while the running flag stays set.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn start(&mut self) {
        self.stop();
        self.run += 1;
        let run = TimerRun(self.run);
        let remaining = self.remaining.clone();
        let handlers = Arc::clone(&self.handlers);
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let left = *remaining.borrow();
                let handlers = lock(&handlers);
                if left <= 1 {
                    (handlers.on_expire)(run);
                    break;
                }
                (handlers.on_tick)(run);
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(handlers: &Mutex<Handlers>) -> MutexGuard<'_, Handlers> {
    match handlers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counters() -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)))
    }

    fn timer_with(
        rx: watch::Receiver<u32>,
        ticks: &Arc<AtomicU32>,
        expiries: &Arc<AtomicU32>,
    ) -> Timer {
        let ticks = Arc::clone(ticks);
        let expiries = Arc::clone(expiries);
        Timer::new(
            rx,
            move |_| {
                ticks.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                expiries.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    async fn advance(secs: u64) {
        for _ in 0..secs {
            time::sleep(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second_while_running() {
        let (_tx, rx) = watch::channel(600);
        let (ticks, expiries) = counters();
        let mut timer = timer_with(rx, &ticks, &expiries);

        timer.set_running(true);
        advance(3).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(expiries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_fires_when_not_running() {
        let (_tx, rx) = watch::channel(600);
        let (ticks, expiries) = counters();
        let _timer = timer_with(rx, &ticks, &expiries);

        advance(5).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(expiries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expires_once_when_one_second_is_left() {
        let (tx, rx) = watch::channel(3);
        let (ticks, expiries) = counters();
        let mut timer = timer_with(rx, &ticks, &expiries);
        timer.set_running(true);

        // Consumer decrements on each tick.
        for _ in 0..2 {
            advance(1).await;
            tx.send_modify(|left| *left -= 1);
        }
        advance(5).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert_eq!(expiries.load(Ordering::SeqCst), 1);
        assert!(timer.is_running());
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_remaining_expires_on_first_cycle() {
        let (_tx, rx) = watch::channel(0);
        let (ticks, expiries) = counters();
        let mut timer = timer_with(rx, &ticks, &expiries);

        timer.set_running(true);
        advance(2).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(expiries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_cancels_the_cycle() {
        let (_tx, rx) = watch::channel(600);
        let (ticks, expiries) = counters();
        let mut timer = timer_with(rx, &ticks, &expiries);

        timer.set_running(true);
        advance(2).await;
        timer.set_running(false);
        advance(5).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_handlers_keeps_the_schedule() {
        let (_tx, rx) = watch::channel(600);
        let (ticks, expiries) = counters();
        let mut timer = timer_with(rx, &ticks, &expiries);
        timer.set_running(true);
        advance(2).await;

        let replaced = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&replaced);
        timer.set_handlers(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            |_| {},
        );
        advance(2).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert_eq!(replaced.load(Ordering::SeqCst), 2);
        assert!(timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_start_does_not_double_tick() {
        let (_tx, rx) = watch::channel(600);
        let (ticks, expiries) = counters();
        let mut timer = timer_with(rx, &ticks, &expiries);

        timer.set_running(true);
        timer.set_running(true);
        advance(3).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_period_sets_the_cadence() {
        let (_tx, rx) = watch::channel(600);
        let (ticks, expiries) = counters();
        let mut timer =
            timer_with(rx, &ticks, &expiries).with_period(Duration::from_millis(500));

        timer.set_running(true);
        advance(2).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn each_start_tags_notifications_with_a_new_run() {
        let (_tx, rx) = watch::channel(600);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut timer = Timer::new(
            rx,
            move |run| lock_runs(&sink).push(run),
            |_| {},
        );
        assert_eq!(timer.current_run(), None);

        timer.set_running(true);
        let first = timer.current_run().unwrap();
        advance(1).await;
        timer.set_running(false);
        assert_eq!(timer.current_run(), None);
        timer.set_running(true);
        let second = timer.current_run().unwrap();
        advance(1).await;

        assert_ne!(first, second);
        assert_eq!(*lock_runs(&seen), vec![first, second]);
    }

    fn lock_runs(runs: &Mutex<Vec<TimerRun>>) -> MutexGuard<'_, Vec<TimerRun>> {
        runs.lock().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_the_task() {
        let (_tx, rx) = watch::channel(600);
        let (ticks, expiries) = counters();
        let mut timer = timer_with(rx, &ticks, &expiries);
        timer.set_running(true);
        advance(1).await;
        drop(timer);
        advance(3).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }
}
