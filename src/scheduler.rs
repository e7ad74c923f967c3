//! A cooperative, timer-driven main loop.
//!
//! Every registered task has its own deadline. On each iteration the loop
//! reads the clock once, runs every due task in registration order, and then
//! sleeps for a short fixed quantum. Tasks run to completion; anything that
//! waits on I/O is expected to bound its own wait.
use std::time::{Duration, Instant};

/// A periodic deadline.
///
/// When the timer fires, the next deadline is `now + period` rather than
/// `previous deadline + period`, so a late tick pushes every later tick back
/// by the same amount.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timer {
    period: Duration,
    next_fire: Instant,
}

pub type TaskFn<C> = fn(&mut C, Instant) -> anyhow::Result<()>;

pub struct Scheduler<C> {
    tasks: heapless::Vec<Task<C>, MAX_TASKS>,
    quantum: Duration,
}

struct Task<C> {
    name: &'static str,
    timer: Timer,
    run: TaskFn<C>,
    failures: usize,
}

const MAX_TASKS: usize = 16;

// === impl Timer ===

impl Timer {
    /// Returns a timer that is due immediately.
    pub const fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next_fire: now,
        }
    }

    /// Returns a timer whose first deadline is `first_delay` from `now`.
    pub fn with_first_delay(period: Duration, first_delay: Duration, now: Instant) -> Self {
        Self {
            period,
            next_fire: now + first_delay,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_fire
    }

    /// Reschedules the timer relative to `now`.
    pub fn reschedule(&mut self, now: Instant) {
        self.next_fire = now + self.period;
    }

    /// If the timer is due, reschedules it and returns `true`.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.reschedule(now);
            true
        } else {
            false
        }
    }

    pub fn next_fire(&self) -> Instant {
        self.next_fire
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

// === impl Scheduler ===

impl<C> Scheduler<C> {
    pub const fn new(quantum: Duration) -> Self {
        Self {
            tasks: heapless::Vec::new(),
            quantum,
        }
    }

    /// Registers a task. Tasks that are due in the same iteration run in the
    /// order they were added.
    pub fn add(&mut self, name: &'static str, timer: Timer, run: TaskFn<C>) -> anyhow::Result<()> {
        self.tasks
            .push(Task {
                name,
                timer,
                run,
                failures: 0,
            })
            .map_err(|_| anyhow::anyhow!("too many tasks; can't add {name}"))?;
        log::debug!(
            target: "airnode::scheduler",
            "added task {name} (every {:?})",
            timer.period()
        );
        Ok(())
    }

    /// Runs every task that is due at `now`, returning how many ran.
    ///
    /// A task that fails is logged and rescheduled like any other; it never
    /// stops the tasks after it from running.
    pub fn run_due(&mut self, ctx: &mut C, now: Instant) -> usize {
        let mut ran = 0;
        for task in &mut self.tasks {
            if !task.timer.poll(now) {
                continue;
            }
            ran += 1;
            if let Err(error) = (task.run)(ctx, now) {
                task.failures += 1;
                log::warn!(
                    target: "airnode::scheduler",
                    "{} failed: {error:#} ({} failures)",
                    task.name,
                    task.failures,
                );
            }
        }
        ran
    }

    /// Returns how many times the named task has failed.
    pub fn failures(&self, name: &str) -> Option<usize> {
        self.tasks
            .iter()
            .find(|task| task.name == name)
            .map(|task| task.failures)
    }

    pub fn run(&mut self, ctx: &mut C) -> ! {
        log::info!(
            target: "airnode::scheduler",
            "running {} tasks (quantum {:?})",
            self.tasks.len(),
            self.quantum
        );
        loop {
            self.run_due(ctx, Instant::now());
            std::thread::sleep(self.quantum);
        }
    }
}
