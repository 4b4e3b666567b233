//! Cooperative task table.
//!
//! Every periodic duty of the main loop (WiFi back-off, sensor sampling,
//! log writes, the "log written" icon timeout) is an entry in a
//! [`TaskTable`].  An entry holds its interval and the tick of its last run;
//! the table decides when it is due and hands it to a [`TaskDelegate`],
//! which owns the actual work.
//!
//! ```text
//!   main loop ──▶ TaskTable::run_due(class, now) ──▶ TaskDelegate::on_task_due
//!                        │                                  │
//!                        └── last_run = now ◀── TaskOutcome ┘
//! ```
//!
//! All time arithmetic goes through [`elapsed_ms`], so a `u32` millisecond
//! tick that wraps after ~49.7 days keeps gating correctly.

use crate::app::ports::{TaskDelegate, TaskOutcome};
use log::{debug, info};

/// Milliseconds from `since_ms` to `now_ms` on a wrapping `u32` tick.
///
/// Correct as long as the true gap is below 2³² ms.
#[inline]
pub const fn elapsed_ms(now_ms: u32, since_ms: u32) -> u32 {
    now_ms.wrapping_sub(since_ms)
}

// ═══════════════════════════════════════════════════════════════
//  Task types
// ═══════════════════════════════════════════════════════════════

/// Identity of a scheduled duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskId {
    /// WiFi station reconnect attempt.
    Reconnect,
    /// Log one `<epoch>,<watts>` record.
    Log,
    /// Hide the "log written" icon.
    LogIndicator,
    /// Sample temperature and humidity.
    Sample,
}

/// Which phase of the loop iteration runs the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskClass {
    /// Runs every iteration before rendering, regardless of frame budget.
    Housekeeping,
    /// Runs only when the render step left budget over.
    Deferred,
}

/// How a task re-arms itself after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    /// Fires every `interval_ms`.
    Periodic,
    /// Fires once `interval_ms` after being armed, then disables itself.
    OneShot,
}

/// A single task-table entry.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicTask {
    pub id: TaskId,
    /// Human-readable label for logs.
    pub label: &'static str,
    pub class: TaskClass,
    pub kind: ScheduleKind,
    pub interval_ms: u32,
    /// `None` until the first run; a never-run task is due immediately.
    last_run_ms: Option<u32>,
    enabled: bool,
}

impl PeriodicTask {
    /// A periodic task that is due on the first poll.
    pub const fn periodic(id: TaskId, label: &'static str, class: TaskClass, interval_ms: u32) -> Self {
        Self {
            id,
            label,
            class,
            kind: ScheduleKind::Periodic,
            interval_ms,
            last_run_ms: None,
            enabled: true,
        }
    }

    /// A one-shot task, disabled until [`TaskTable::arm`] is called.
    pub const fn one_shot(id: TaskId, label: &'static str, class: TaskClass, interval_ms: u32) -> Self {
        Self {
            id,
            label,
            class,
            kind: ScheduleKind::OneShot,
            interval_ms,
            last_run_ms: None,
            enabled: false,
        }
    }

    /// Treat `now_ms` as the last run, so the first fire is one interval out.
    pub const fn starting_at(mut self, now_ms: u32) -> Self {
        self.last_run_ms = Some(now_ms);
        self
    }

    /// Whether the task should run at `now_ms`.
    pub fn is_due(&self, now_ms: u32) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_run_ms {
            None => true,
            Some(last) => elapsed_ms(now_ms, last) >= self.interval_ms,
        }
    }

    pub fn last_run_ms(&self) -> Option<u32> {
        self.last_run_ms
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ═══════════════════════════════════════════════════════════════
//  Task table
// ═══════════════════════════════════════════════════════════════

/// Maximum number of table entries (stack-allocated).
pub const MAX_TASKS: usize = 6;

/// Fixed-capacity task table, iterated in insertion order.
pub struct TaskTable {
    tasks: heapless::Vec<PeriodicTask, MAX_TASKS>,
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTable {
    pub fn new() -> Self {
        Self {
            tasks: heapless::Vec::new(),
        }
    }

    /// Add a task.  Returns the task back if the table is full.
    pub fn add(&mut self, task: PeriodicTask) -> Result<(), PeriodicTask> {
        let label = task.label;
        self.tasks.push(task)?;
        info!("Scheduler: added '{}' (slot {})", label, self.tasks.len() - 1);
        Ok(())
    }

    /// Run every due task of `class`, in table order.
    ///
    /// A task's last-run tick is updated whether or not its work succeeded:
    /// a failed attempt simply waits for the next slot.  Returns the number
    /// of tasks that ran.
    pub fn run_due(&mut self, class: TaskClass, now_ms: u32, delegate: &mut dyn TaskDelegate) -> usize {
        let mut ran = 0;
        for i in 0..self.tasks.len() {
            let task = &mut self.tasks[i];
            if task.class != class || !task.is_due(now_ms) {
                continue;
            }
            task.last_run_ms = Some(now_ms);
            if task.kind == ScheduleKind::OneShot {
                task.enabled = false;
            }
            let id = task.id;
            debug!("Scheduler: '{}' due", task.label);

            if let TaskOutcome::Arm(other) = delegate.on_task_due(id, now_ms) {
                self.arm(other, now_ms);
            }
            ran += 1;
        }
        ran
    }

    /// Enable `id` and restart its interval from `now_ms`.
    pub fn arm(&mut self, id: TaskId, now_ms: u32) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.enabled = true;
            task.last_run_ms = Some(now_ms);
        }
    }

    /// Disable `id` without running it.
    pub fn disarm(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.enabled = false;
        }
    }

    pub fn get(&self, id: TaskId) -> Option<&PeriodicTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Enumerate the schedule.
    pub fn iter(&self) -> impl Iterator<Item = &PeriodicTask> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
