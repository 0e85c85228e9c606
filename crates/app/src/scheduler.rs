//! Cron scheduler — a live table of tagged jobs driven by one timer loop.
//!
//! The scheduler is an explicit object with a `new → start → stop`
//! lifecycle, owned by the automation engine and injectable into tests.
//! Registrations are transient: the durable source of truth is the
//! automation store, and the whole table can be rebuilt from it at any time.
//!
//! Per job-tag the state machine is `Unregistered → Scheduled →
//! Unregistered`; there is no paused state. Replacing a job is always an
//! explicit `deregister` followed by `register` — this module never
//! silently overwrites a tag.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use homestead_domain::cron;
use homestead_domain::error::SchedulerError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Callback invoked when a job fires. Each invocation runs on its own task,
/// so a slow callback never blocks the tick loop.
pub type JobCallback = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct JobEntry {
    schedule: ::cron::Schedule,
    callback: JobCallback,
    next_fire: Option<DateTime<Local>>,
    /// Guards against overlapping invocations of the same tag.
    running: Arc<AtomicBool>,
}

struct DueJob {
    tag: String,
    callback: JobCallback,
    running: Arc<AtomicBool>,
}

type JobTable = Arc<Mutex<HashMap<String, JobEntry>>>;

/// Timer-driven scheduler for tagged cron jobs.
pub struct CronScheduler {
    jobs: JobTable,
    tick: Duration,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CronScheduler {
    /// Create a scheduler with the default sub-second tick.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tick(Duration::from_millis(500))
    }

    /// Create a scheduler with a custom tick interval.
    #[must_use]
    pub fn with_tick(tick: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            tick,
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Register a job under a unique tag.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DuplicateTag`] when the tag is already
    /// registered (callers deregister first when replacing), or
    /// [`SchedulerError::InvalidExpression`] when `expr` cannot be parsed.
    pub fn register(
        &self,
        tag: &str,
        expr: &str,
        callback: JobCallback,
    ) -> Result<(), SchedulerError> {
        let schedule = cron::to_schedule(expr)
            .map_err(|_| SchedulerError::InvalidExpression(tag.to_string()))?;
        let mut jobs = self.jobs.lock().expect("scheduler job table poisoned");
        if jobs.contains_key(tag) {
            return Err(SchedulerError::DuplicateTag(tag.to_string()));
        }
        let next_fire = schedule.after(&Local::now()).next();
        jobs.insert(
            tag.to_string(),
            JobEntry {
                schedule,
                callback,
                next_fire,
                running: Arc::new(AtomicBool::new(false)),
            },
        );
        tracing::debug!(tag, expr, "registered scheduler job");
        Ok(())
    }

    /// Remove the job registered under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRegistered`] when the tag is absent.
    pub fn deregister(&self, tag: &str) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.lock().expect("scheduler job table poisoned");
        if jobs.remove(tag).is_none() {
            return Err(SchedulerError::NotRegistered(tag.to_string()));
        }
        tracing::debug!(tag, "deregistered scheduler job");
        Ok(())
    }

    /// Whether a job is currently registered under `tag`.
    #[must_use]
    pub fn is_registered(&self, tag: &str) -> bool {
        self.jobs
            .lock()
            .expect("scheduler job table poisoned")
            .contains_key(tag)
    }

    /// Number of registered jobs.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.jobs.lock().expect("scheduler job table poisoned").len()
    }

    /// Start the background tick loop. Calling twice is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock().expect("scheduler handle poisoned");
        if handle.is_some() {
            return;
        }
        let jobs = Arc::clone(&self.jobs);
        let tick = self.tick;
        let mut shutdown = self.shutdown.subscribe();
        *handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        dispatch_due(collect_due(&jobs, Local::now()));
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        }));
        tracing::info!("cron scheduler started");
    }

    /// Stop the tick loop without interrupting in-flight job callbacks:
    /// callbacks run on their own tasks, stopping only prevents new firings.
    pub async fn stop(&self) {
        let handle = self
            .handle
            .lock()
            .expect("scheduler handle poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = self.shutdown.send(true);
            let _ = handle.await;
            tracing::info!("cron scheduler stopped");
        }
    }
}

/// Pop every job whose fire time has arrived, advancing its `next_fire`
/// under the table lock so a replacement registered concurrently is never
/// double-fired.
fn collect_due(jobs: &JobTable, now: DateTime<Local>) -> Vec<DueJob> {
    let mut jobs = jobs.lock().expect("scheduler job table poisoned");
    jobs.iter_mut()
        .filter(|(_, entry)| entry.next_fire.is_some_and(|at| now >= at))
        .map(|(tag, entry)| {
            entry.next_fire = entry.schedule.after(&now).next();
            DueJob {
                tag: tag.clone(),
                callback: Arc::clone(&entry.callback),
                running: Arc::clone(&entry.running),
            }
        })
        .collect()
}

fn dispatch_due(due: Vec<DueJob>) {
    for job in due {
        if job.running.swap(true, Ordering::SeqCst) {
            tracing::warn!(tag = %job.tag, "previous firing still in flight, skipping");
            continue;
        }
        let fut = (job.callback)();
        let running = job.running;
        tokio::spawn(async move {
            fut.await;
            running.store(false, Ordering::SeqCst);
        });
    }
}
