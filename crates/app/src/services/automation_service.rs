//! Automation engine — schedule lifecycle and the job-fire callback.
//!
//! Orchestrates the automation store, the cron scheduler, and the solar
//! calculator. The store exclusively owns durable state; a scheduler
//! registration is a transient cache keyed by the automation id and is
//! rebuilt from the store by [`AutomationEngine::activate_system`].
//!
//! All registration-mutating operations are serialized behind one engine
//! mutex, so a solar job re-anchoring itself while an API call modifies the
//! same automation resolves to last-write-wins instead of interleaving.

use std::sync::Arc;

use chrono::Local;
use homestead_domain::automation::{Automation, AutomationUpdate, NewAutomation, TimingMode};
use homestead_domain::cron;
use homestead_domain::error::{HomesteadError, NotFoundError, ValidationError};
use homestead_domain::id::AutomationId;
use homestead_domain::notification::NotificationLevel;
use homestead_domain::suntime;
use homestead_domain::time;
use tokio::sync::Mutex as AsyncMutex;

use crate::ports::{AutomationRepository, EventLog, Notifier, ScriptRunner, ServerConfig};
use crate::scheduler::{CronScheduler, JobCallback};

/// Orchestrates automation creation, modification, removal, system-wide
/// activation, and the daily re-anchoring of solar-relative jobs.
pub struct AutomationEngine<R, C, N, E, S> {
    repo: R,
    config: C,
    notifier: N,
    events: E,
    runner: S,
    scheduler: Arc<CronScheduler>,
    /// Serializes every scheduler-registration mutation.
    registration: AsyncMutex<()>,
}

impl<R, C, N, E, S> AutomationEngine<R, C, N, E, S>
where
    R: AutomationRepository + Send + Sync + 'static,
    C: ServerConfig + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
    E: EventLog + Send + Sync + 'static,
    S: ScriptRunner + Send + Sync + 'static,
{
    /// Create a new engine around an (unstarted or started) scheduler.
    pub fn new(
        repo: R,
        config: C,
        notifier: N,
        events: E,
        runner: S,
        scheduler: Arc<CronScheduler>,
    ) -> Self {
        Self {
            repo,
            config,
            notifier,
            events,
            runner,
            scheduler,
            registration: AsyncMutex::new(()),
        }
    }

    /// Borrow the scheduler, e.g. to start or stop it.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<CronScheduler> {
        &self.scheduler
    }

    /// Create a new automation and, when it is enabled and the system
    /// toggle is on, register it with the scheduler.
    ///
    /// Solar timing modes first register a no-op placeholder (so the
    /// immediate re-anchor has a registration to replace), then re-anchor
    /// to the real sunrise/sunset time.
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::Validation`] on bad input, a storage error
    /// from the repository, or a scheduler error from registration.
    pub async fn create(
        self: &Arc<Self>,
        request: NewAutomation,
    ) -> Result<AutomationId, HomesteadError> {
        let expr = cron::generate(request.hour, request.minute, &request.weekdays)?;
        let automation = Automation::builder()
            .owner(request.owner)
            .name(request.name)
            .description(request.description)
            .cron_expression(expr)
            .script_id(request.script_id)
            .enabled(request.enabled)
            .timing_mode(request.timing_mode)
            .build()?;
        let automation = self.repo.create(automation).await?;
        let id = automation.id;

        if automation.enabled {
            self.notify(
                &automation.owner,
                "Automation Added",
                &format!("Automation '{}' has been added", automation.name),
                NotificationLevel::Info,
            )
            .await;
        } else {
            self.notify(
                &automation.owner,
                "Inactive Automation Added",
                &format!(
                    "Automation '{}' has been added but is currently disabled",
                    automation.name
                ),
                NotificationLevel::Warn,
            )
            .await;
            return Ok(id);
        }

        let solar = automation.timing_mode.is_solar();
        {
            // The toggle is read under the registration lock so a job is
            // never registered while the system is being switched off.
            let _guard = self.registration.lock().await;
            if !self.config.automation_enabled().await? {
                return Ok(id);
            }
            if solar {
                // Placeholder so the re-anchor below has a registration to
                // replace.
                self.scheduler.register(
                    &id.to_string(),
                    &automation.cron_expression,
                    noop_callback(),
                )?;
            } else {
                self.scheduler.register(
                    &id.to_string(),
                    &automation.cron_expression,
                    self.job_callback(id),
                )?;
            }
        }
        if solar {
            self.reanchor(id, automation.timing_mode == TimingMode::Sunrise)
                .await?;
        }
        tracing::debug!(%id, owner = %automation.owner, "created and scheduled automation");
        Ok(id)
    }

    /// Replace an automation's data, re-registering its scheduler job to
    /// match the new state.
    ///
    /// For solar timing modes the hour/minute of the supplied expression are
    /// re-derived from the solar calculator; the weekdays of the supplied
    /// expression are kept as-is (new weekdays win over stored ones).
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::Validation`] when the new cron expression
    /// is invalid, [`HomesteadError::NotFound`] for an unknown id, or
    /// storage/scheduler errors.
    pub async fn modify(
        self: &Arc<Self>,
        id: AutomationId,
        mut update: AutomationUpdate,
    ) -> Result<(), HomesteadError> {
        if !cron::is_valid(&update.cron_expression) {
            return Err(
                ValidationError::InvalidCronExpression(update.cron_expression.clone()).into(),
            );
        }
        let before = self.repo.get_by_id(id).await?.ok_or_else(|| NotFoundError {
            entity: "Automation",
            id: id.to_string(),
        })?;

        if update.timing_mode.is_solar() {
            let weekdays = cron::extract_weekdays(&update.cron_expression)?;
            let (latitude, longitude) = self.config.coordinates().await?;
            let (sunrise, sunset) =
                suntime::sun_times(latitude, longitude, Local::now().date_naive());
            let at = if update.timing_mode == TimingMode::Sunrise {
                sunrise
            } else {
                sunset
            };
            update.cron_expression = cron::generate(at.hour, at.minute, &weekdays)?;
        }

        let after = before.with_update(update);
        self.repo.update(after.clone()).await?;

        let tag = id.to_string();
        {
            let _guard = self.registration.lock().await;
            let system_on = self.config.automation_enabled().await?;
            if before.enabled && system_on {
                if let Err(err) = self.scheduler.deregister(&tag) {
                    // Absent-when-expected is logged, never fatal.
                    tracing::warn!(%tag, %err, "expected scheduler registration missing");
                }
            }
            if after.enabled && system_on {
                self.scheduler
                    .register(&tag, &after.cron_expression, self.job_callback(id))?;
            }
        }

        if after.enabled && !before.enabled {
            self.notify(
                &after.owner,
                "Automation Activated",
                &format!("Automation '{}' has been activated", after.name),
                NotificationLevel::Info,
            )
            .await;
        }
        if !after.enabled && before.enabled {
            self.notify(
                &after.owner,
                "Automation Disabled",
                &format!("Automation '{}' has been disabled", after.name),
                NotificationLevel::Warn,
            )
            .await;
        }
        Ok(())
    }

    /// Delete an automation, deregistering its scheduler job only when it
    /// was actually registered.
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::NotFound`] for an unknown id or a storage
    /// error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, id: AutomationId) -> Result<(), HomesteadError> {
        let before = self.repo.get_by_id(id).await?.ok_or_else(|| NotFoundError {
            entity: "Automation",
            id: id.to_string(),
        })?;
        self.repo.delete(id).await?;

        {
            let _guard = self.registration.lock().await;
            if before.enabled && self.config.automation_enabled().await? {
                if let Err(err) = self.scheduler.deregister(&id.to_string()) {
                    tracing::warn!(tag = %id, %err, "expected scheduler registration missing");
                }
            }
        }
        self.notify(
            &before.owner,
            "Automation Removed",
            &format!(
                "The automation '{}' has been removed from the system",
                before.name
            ),
            NotificationLevel::Info,
        )
        .await;
        Ok(())
    }

    /// Rebuild the scheduler from the store: register every enabled
    /// automation with a valid cron expression.
    ///
    /// Invalid expressions are logged and skipped; a store read failure
    /// aborts the whole pass.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the repository, or a scheduler error if
    /// a registration fails.
    pub async fn activate_system(self: &Arc<Self>) -> Result<u32, HomesteadError> {
        let automations = self.repo.get_all().await?;
        let _guard = self.registration.lock().await;
        let mut activated: u32 = 0;
        for automation in automations {
            if !automation.enabled {
                continue;
            }
            if !cron::is_valid(&automation.cron_expression) {
                self.events
                    .error(
                        "Automation Activation Failure",
                        &format!(
                            "The automation '{}' could not be activated: invalid cron expression. Please remove it from the system.",
                            automation.name
                        ),
                    )
                    .await;
                self.notify(
                    &automation.owner,
                    "Automation Activation Failure",
                    &format!(
                        "The automation '{}' could not be activated due to an internal error. Please remove it from the system.",
                        automation.name
                    ),
                    NotificationLevel::Error,
                )
                .await;
                continue;
            }
            match self.scheduler.register(
                &automation.id.to_string(),
                &automation.cron_expression,
                self.job_callback(automation.id),
            ) {
                Ok(()) => {
                    activated += 1;
                    self.events
                        .debug(
                            "Automation Activated",
                            &format!(
                                "Successfully activated automation '{}' of user '{}'",
                                automation.id, automation.owner
                            ),
                        )
                        .await;
                }
                Err(err) => {
                    self.events
                        .error(
                            "Automation Activation Failure",
                            &format!(
                                "Could not activate automation '{}': failed to register cron job: {err}",
                                automation.id
                            ),
                        )
                        .await;
                    return Err(err.into());
                }
            }
        }
        if activated > 0 {
            self.events
                .info(
                    "Automation System Activated",
                    &format!("Activated saved automations: registered {activated} jobs"),
                )
                .await;
        }
        Ok(activated)
    }

    /// Deregister every enabled automation, best-effort: a failure for one
    /// item is logged and processing continues.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the automation list cannot be read.
    pub async fn deactivate_system(&self) -> Result<(), HomesteadError> {
        let automations = self.repo.get_all().await?;
        let _guard = self.registration.lock().await;
        for automation in automations {
            if !automation.enabled {
                continue;
            }
            if let Err(err) = self.scheduler.deregister(&automation.id.to_string()) {
                self.events
                    .warn(
                        "Automation Deactivation Failure",
                        &format!(
                            "Failed to deactivate automation '{}': {err}",
                            automation.id
                        ),
                    )
                    .await;
                continue;
            }
            self.events
                .debug(
                    "Automation Deactivated",
                    &format!(
                        "Successfully deactivated automation '{}' of user '{}'",
                        automation.id, automation.owner
                    ),
                )
                .await;
        }
        self.events
            .info(
                "Automation System Deactivated",
                "All automation jobs were stopped",
            )
            .await;
        Ok(())
    }

    /// Recompute a solar automation's trigger time for today and apply it
    /// via [`Self::modify`], which transitively re-registers the scheduler
    /// job. The weekday field of the stored expression is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`HomesteadError::NotFound`] for an unknown id, or whatever
    /// the transitive modification returns.
    pub async fn reanchor(
        self: &Arc<Self>,
        id: AutomationId,
        use_sunrise: bool,
    ) -> Result<(), HomesteadError> {
        let automation = self.repo.get_by_id(id).await?.ok_or_else(|| NotFoundError {
            entity: "Automation",
            id: id.to_string(),
        })?;
        let weekdays = cron::extract_weekdays(&automation.cron_expression)?;
        let (latitude, longitude) = self.config.coordinates().await?;
        let (sunrise, sunset) = suntime::sun_times(latitude, longitude, Local::now().date_naive());
        let at = if use_sunrise { sunrise } else { sunset };
        let mut update = AutomationUpdate::from(&automation);
        update.cron_expression = cron::generate(at.hour, at.minute, &weekdays)?;
        self.modify(id, update).await?;
        tracing::trace!(%id, "updated next launch time of solar automation");
        Ok(())
    }

    /// The scheduler callback: runs one automation by id.
    ///
    /// Never panics the scheduler; every failure path ends in an event-log
    /// entry (and usually an owner notification) instead.
    pub async fn run_automation(self: &Arc<Self>, id: AutomationId) {
        let automation = match self.repo.get_by_id(id).await {
            Ok(Some(automation)) => automation,
            Ok(None) => {
                self.events
                    .error(
                        "Automation Failed",
                        &format!(
                            "Automation '{id}' could not be executed because it no longer exists"
                        ),
                    )
                    .await;
                // Drop the dangling registration to prevent repeats.
                let _guard = self.registration.lock().await;
                if let Err(err) = self.scheduler.deregister(&id.to_string()) {
                    tracing::warn!(tag = %id, %err, "failed to remove dangling automation job");
                }
                return;
            }
            Err(err) => {
                self.events
                    .error(
                        "Automation Failed",
                        &format!("Automation '{id}' could not be executed: storage failure: {err}"),
                    )
                    .await;
                return;
            }
        };

        if automation.disable_once {
            let mut cleared = automation.clone();
            cleared.disable_once = false;
            if let Err(err) = self.repo.update(cleared).await {
                self.events
                    .error(
                        "Automation Failed",
                        &format!("Could not re-enable automation '{}': {err}", automation.name),
                    )
                    .await;
                return;
            }
            self.notify(
                &automation.owner,
                "Automation Skipped Once",
                &format!(
                    "Automation '{}' was skipped once. It will run regularly the next time.",
                    automation.name
                ),
                NotificationLevel::Info,
            )
            .await;
            return;
        }

        if !automation.enabled {
            self.notify(
                &automation.owner,
                "Automation Skipped",
                &format!(
                    "Automation '{}' was not executed because it is disabled",
                    automation.name
                ),
                NotificationLevel::Info,
            )
            .await;
            return;
        }

        if let Err(err) = self.repo.set_last_run(id, time::now()).await {
            tracing::warn!(%id, %err, "could not record automation run time");
        }

        if automation.timing_mode.is_solar() {
            if let Err(err) = self
                .reanchor(id, automation.timing_mode == TimingMode::Sunrise)
                .await
            {
                self.events
                    .error(
                        "Automation Failed",
                        &format!(
                            "Automation '{}' failed: next launch time could not be adjusted: {err}",
                            automation.name
                        ),
                    )
                    .await;
                self.notify(
                    &automation.owner,
                    "Automation Failed",
                    &format!(
                        "Automation '{}' was not executed because the next time it should run could not be determined",
                        automation.name
                    ),
                    NotificationLevel::Error,
                )
                .await;
                return;
            }
        }

        match self
            .runner
            .run_by_id(&automation.owner, &automation.script_id)
            .await
        {
            Ok(outcome) if outcome.success => {
                self.events
                    .debug(
                        "Automation Executed Successfully",
                        &format!(
                            "Automation '{}' ({id}) of user '{}' has executed successfully",
                            automation.name, automation.owner
                        ),
                    )
                    .await;
            }
            Ok(outcome) => {
                let detail = outcome
                    .errors
                    .first()
                    .map_or_else(|| "unknown script error".to_string(), |err| err.message.clone());
                self.events
                    .error(
                        "Automation Failed",
                        &format!(
                            "Automation '{}' failed during execution of script '{}': {detail}",
                            automation.name, automation.script_id
                        ),
                    )
                    .await;
                self.notify(
                    &automation.owner,
                    "Automation Failed",
                    &format!(
                        "Automation '{}' failed during execution of script '{}': {detail}",
                        automation.name, automation.script_id
                    ),
                    NotificationLevel::Error,
                )
                .await;
            }
            Err(err) => {
                self.events
                    .error(
                        "Automation Failed",
                        &format!(
                            "Automation '{}' failed: script '{}' could not be executed: {err}",
                            automation.name, automation.script_id
                        ),
                    )
                    .await;
                self.notify(
                    &automation.owner,
                    "Automation Failed",
                    &format!(
                        "Automation '{}' failed because its script '{}' could not be executed. Contact your administrator.",
                        automation.name, automation.script_id
                    ),
                    NotificationLevel::Error,
                )
                .await;
            }
        }
    }

    fn job_callback(self: &Arc<Self>, id: AutomationId) -> JobCallback {
        let engine = Arc::clone(self);
        Arc::new(move || {
            let engine = Arc::clone(&engine);
            Box::pin(async move {
                engine.run_automation(id).await;
            })
        })
    }

    async fn notify(&self, owner: &str, title: &str, body: &str, level: NotificationLevel) {
        if let Err(err) = self.notifier.notify(owner, title, body, level).await {
            tracing::warn!(owner, title, %err, "failed to notify user");
        }
    }
}

fn noop_callback() -> JobCallback {
    Arc::new(|| Box::pin(async {}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ScriptRunOutcome, StaticServerConfig};
    use homestead_domain::event::EventLevel;
    use homestead_domain::script::{ScriptError, Span};
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex;

    // ── In-memory automation repo ──────────────────────────────────

    #[derive(Default)]
    struct InMemoryAutomationRepo {
        store: Mutex<HashMap<AutomationId, Automation>>,
        fail_reads: std::sync::atomic::AtomicBool,
    }

    impl InMemoryAutomationRepo {
        fn storage_error() -> HomesteadError {
            HomesteadError::Storage(Box::new(std::io::Error::other("database gone")))
        }
    }

    impl AutomationRepository for InMemoryAutomationRepo {
        fn create(
            &self,
            automation: Automation,
        ) -> impl Future<Output = Result<Automation, HomesteadError>> + Send {
            let mut store = self.store.lock().unwrap();
            store.insert(automation.id, automation.clone());
            async { Ok(automation) }
        }

        fn get_by_id(
            &self,
            id: AutomationId,
        ) -> impl Future<Output = Result<Option<Automation>, HomesteadError>> + Send {
            let failing = self.fail_reads.load(std::sync::atomic::Ordering::SeqCst);
            let result = self.store.lock().unwrap().get(&id).cloned();
            async move {
                if failing {
                    return Err(Self::storage_error());
                }
                Ok(result)
            }
        }

        fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, HomesteadError>> + Send {
            let failing = self.fail_reads.load(std::sync::atomic::Ordering::SeqCst);
            let result: Vec<_> = self.store.lock().unwrap().values().cloned().collect();
            async move {
                if failing {
                    return Err(Self::storage_error());
                }
                Ok(result)
            }
        }

        fn update(
            &self,
            automation: Automation,
        ) -> impl Future<Output = Result<Automation, HomesteadError>> + Send {
            let mut store = self.store.lock().unwrap();
            store.insert(automation.id, automation.clone());
            async { Ok(automation) }
        }

        fn set_last_run(
            &self,
            id: AutomationId,
            at: homestead_domain::time::Timestamp,
        ) -> impl Future<Output = Result<(), HomesteadError>> + Send {
            let mut store = self.store.lock().unwrap();
            if let Some(automation) = store.get_mut(&id) {
                automation.last_run = Some(at);
            }
            async { Ok(()) }
        }

        fn delete(
            &self,
            id: AutomationId,
        ) -> impl Future<Output = Result<(), HomesteadError>> + Send {
            let mut store = self.store.lock().unwrap();
            store.remove(&id);
            async { Ok(()) }
        }
    }

    // ── Spy notifier and event log ─────────────────────────────────

    #[derive(Default)]
    struct SpyNotifier {
        sent: Mutex<Vec<(String, String, NotificationLevel)>>,
    }

    impl Notifier for SpyNotifier {
        fn notify(
            &self,
            owner: &str,
            title: &str,
            _body: &str,
            level: NotificationLevel,
        ) -> impl Future<Output = Result<(), HomesteadError>> + Send {
            self.sent
                .lock()
                .unwrap()
                .push((owner.to_string(), title.to_string(), level));
            async { Ok(()) }
        }
    }

    #[derive(Default)]
    struct SpyEventLog {
        entries: Mutex<Vec<(EventLevel, String)>>,
    }

    impl EventLog for SpyEventLog {
        fn log(
            &self,
            level: EventLevel,
            title: &str,
            _body: &str,
        ) -> impl Future<Output = ()> + Send {
            self.entries
                .lock()
                .unwrap()
                .push((level, title.to_string()));
            async {}
        }
    }

    // ── Fake script runner ─────────────────────────────────────────

    #[derive(Default)]
    struct FakeScriptRunner {
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptRunner for FakeScriptRunner {
        fn run_by_id(
            &self,
            _owner: &str,
            script_id: &str,
        ) -> impl Future<Output = Result<ScriptRunOutcome, HomesteadError>> + Send {
            self.calls.lock().unwrap().push(script_id.to_string());
            let fail = self.fail;
            async move {
                if fail {
                    Ok(ScriptRunOutcome {
                        success: false,
                        output: String::new(),
                        errors: vec![ScriptError::runtime("script blew up", Span::default())],
                    })
                } else {
                    Ok(ScriptRunOutcome {
                        success: true,
                        output: "done".to_string(),
                        errors: vec![],
                    })
                }
            }
        }
    }

    type TestEngine = AutomationEngine<
        Arc<InMemoryAutomationRepo>,
        Arc<StaticServerConfig>,
        Arc<SpyNotifier>,
        Arc<SpyEventLog>,
        Arc<FakeScriptRunner>,
    >;

    struct Harness {
        engine: Arc<TestEngine>,
        repo: Arc<InMemoryAutomationRepo>,
        notifier: Arc<SpyNotifier>,
        events: Arc<SpyEventLog>,
        runner: Arc<FakeScriptRunner>,
        config: Arc<StaticServerConfig>,
    }

    fn harness_with_runner(runner: FakeScriptRunner) -> Harness {
        let repo = Arc::new(InMemoryAutomationRepo::default());
        let config = Arc::new(StaticServerConfig::new(true, 52.52, 13.405));
        let notifier = Arc::new(SpyNotifier::default());
        let events = Arc::new(SpyEventLog::default());
        let runner = Arc::new(runner);
        let engine = Arc::new(AutomationEngine::new(
            Arc::clone(&repo),
            Arc::clone(&config),
            Arc::clone(&notifier),
            Arc::clone(&events),
            Arc::clone(&runner),
            Arc::new(CronScheduler::new()),
        ));
        Harness {
            engine,
            repo,
            notifier,
            events,
            runner,
            config,
        }
    }

    fn harness() -> Harness {
        harness_with_runner(FakeScriptRunner::default())
    }

    fn request(enabled: bool, timing_mode: TimingMode) -> NewAutomation {
        NewAutomation {
            name: "Evening lights".to_string(),
            description: "turn lights on".to_string(),
            hour: 22,
            minute: 0,
            weekdays: vec![1, 2, 3, 4, 5],
            script_id: "lights_on".to_string(),
            owner: "alice".to_string(),
            enabled,
            timing_mode,
        }
    }

    #[tokio::test]
    async fn should_register_enabled_automation_on_create() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        assert!(h.engine.scheduler().is_registered(&id.to_string()));
        let stored = h.repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.cron_expression, "0 22 * * 1,2,3,4,5");
    }

    #[tokio::test]
    async fn should_not_register_disabled_automation_on_create() {
        let h = harness();
        let id = h.engine.create(request(false, TimingMode::Normal)).await.unwrap();
        assert!(!h.engine.scheduler().is_registered(&id.to_string()));
        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Inactive Automation Added");
    }

    #[tokio::test]
    async fn should_not_register_when_system_toggle_off() {
        let h = harness();
        h.config.set_automation_enabled(false);
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        assert!(!h.engine.scheduler().is_registered(&id.to_string()));
    }

    #[tokio::test]
    async fn should_anchor_sunrise_automation_to_solar_time_on_create() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Sunrise)).await.unwrap();

        let stored = h.repo.get_by_id(id).await.unwrap().unwrap();
        let (sunrise, _) = suntime::sun_times(52.52, 13.405, Local::now().date_naive());
        let expected =
            cron::generate(sunrise.hour, sunrise.minute, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(stored.cron_expression, expected);
        assert_eq!(
            cron::extract_weekdays(&stored.cron_expression).unwrap(),
            vec![1, 2, 3, 4, 5]
        );
        assert!(h.engine.scheduler().is_registered(&id.to_string()));
    }

    #[tokio::test]
    async fn should_reject_create_with_too_many_weekdays() {
        let h = harness();
        let mut req = request(true, TimingMode::Normal);
        req.weekdays = vec![0, 1, 2, 3, 4, 5, 6, 0];
        let result = h.engine.create(req).await;
        assert!(matches!(
            result,
            Err(HomesteadError::Validation(ValidationError::TooManyWeekdays(8)))
        ));
    }

    #[tokio::test]
    async fn should_reject_modify_with_invalid_cron_expression() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        let automation = h.repo.get_by_id(id).await.unwrap().unwrap();
        let mut update = AutomationUpdate::from(&automation);
        update.cron_expression = "every other tuesday".to_string();
        let result = h.engine.modify(id, update).await;
        assert!(matches!(
            result,
            Err(HomesteadError::Validation(
                ValidationError::InvalidCronExpression(_)
            ))
        ));
    }

    #[tokio::test]
    async fn should_replace_registration_on_modify() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        let automation = h.repo.get_by_id(id).await.unwrap().unwrap();
        let mut update = AutomationUpdate::from(&automation);
        update.cron_expression = "30 6 * * 0".to_string();
        h.engine.modify(id, update).await.unwrap();

        assert!(h.engine.scheduler().is_registered(&id.to_string()));
        assert_eq!(h.engine.scheduler().job_count(), 1);
        let stored = h.repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.cron_expression, "30 6 * * 0");
    }

    #[tokio::test]
    async fn should_deregister_on_disable_transition_and_notify() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        let automation = h.repo.get_by_id(id).await.unwrap().unwrap();
        let mut update = AutomationUpdate::from(&automation);
        update.enabled = false;
        h.engine.modify(id, update).await.unwrap();

        assert!(!h.engine.scheduler().is_registered(&id.to_string()));
        let sent = h.notifier.sent.lock().unwrap();
        assert!(sent.iter().any(|(_, title, _)| title == "Automation Disabled"));
    }

    #[tokio::test]
    async fn should_register_on_enable_transition_and_notify() {
        let h = harness();
        let id = h.engine.create(request(false, TimingMode::Normal)).await.unwrap();
        let automation = h.repo.get_by_id(id).await.unwrap().unwrap();
        let mut update = AutomationUpdate::from(&automation);
        update.enabled = true;
        h.engine.modify(id, update).await.unwrap();

        assert!(h.engine.scheduler().is_registered(&id.to_string()));
        let sent = h.notifier.sent.lock().unwrap();
        assert!(sent.iter().any(|(_, title, _)| title == "Automation Activated"));
    }

    #[tokio::test]
    async fn should_keep_other_registrations_intact_across_modify() {
        let h = harness();
        let first = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        let mut second_req = request(true, TimingMode::Normal);
        second_req.name = "Morning blinds".to_string();
        second_req.hour = 7;
        let second = h.engine.create(second_req).await.unwrap();

        let automation = h.repo.get_by_id(first).await.unwrap().unwrap();
        let mut update = AutomationUpdate::from(&automation);
        update.name = "Renamed".to_string();
        update.cron_expression = "1 1 * * 1".to_string();
        h.engine.modify(first, update).await.unwrap();

        assert!(h.engine.scheduler().is_registered(&first.to_string()));
        assert!(h.engine.scheduler().is_registered(&second.to_string()));
        assert_eq!(h.engine.scheduler().job_count(), 2);
    }

    #[tokio::test]
    async fn should_remove_automation_and_registration() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        h.engine.remove(id).await.unwrap();

        assert!(!h.engine.scheduler().is_registered(&id.to_string()));
        assert!(h.repo.get_by_id(id).await.unwrap().is_none());
        let sent = h.notifier.sent.lock().unwrap();
        assert!(sent.iter().any(|(_, title, _)| title == "Automation Removed"));
    }

    #[tokio::test]
    async fn should_return_not_found_when_removing_unknown_automation() {
        let h = harness();
        let result = h.engine.remove(AutomationId::new()).await;
        assert!(matches!(result, Err(HomesteadError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_rebuild_registrations_on_activate() {
        let h = harness();
        h.config.set_automation_enabled(false);
        let enabled_id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        let disabled_id = h.engine.create(request(false, TimingMode::Normal)).await.unwrap();
        assert_eq!(h.engine.scheduler().job_count(), 0);

        h.config.set_automation_enabled(true);
        let activated = h.engine.activate_system().await.unwrap();
        assert_eq!(activated, 1);
        assert!(h.engine.scheduler().is_registered(&enabled_id.to_string()));
        assert!(!h.engine.scheduler().is_registered(&disabled_id.to_string()));
    }

    #[tokio::test]
    async fn should_skip_invalid_expressions_on_activate() {
        let h = harness();
        h.config.set_automation_enabled(false);
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        // Corrupt the stored expression behind the engine's back.
        let mut automation = h.repo.get_by_id(id).await.unwrap().unwrap();
        automation.cron_expression = "broken".to_string();
        h.repo.update(automation).await.unwrap();

        h.config.set_automation_enabled(true);
        let activated = h.engine.activate_system().await.unwrap();
        assert_eq!(activated, 0);
        let entries = h.events.entries.lock().unwrap();
        assert!(entries
            .iter()
            .any(|(level, title)| *level == EventLevel::Error
                && title == "Automation Activation Failure"));
    }

    #[tokio::test]
    async fn should_abort_activate_on_storage_failure() {
        let h = harness();
        h.repo
            .fail_reads
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let result = h.engine.activate_system().await;
        assert!(matches!(result, Err(HomesteadError::Storage(_))));
    }

    #[tokio::test]
    async fn should_deactivate_idempotently() {
        let h = harness();
        h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        assert_eq!(h.engine.scheduler().job_count(), 2);

        h.engine.deactivate_system().await.unwrap();
        assert_eq!(h.engine.scheduler().job_count(), 0);
        // Second pass finds nothing registered and still succeeds.
        h.engine.deactivate_system().await.unwrap();
        assert_eq!(h.engine.scheduler().job_count(), 0);
    }

    #[tokio::test]
    async fn should_run_script_when_automation_fires() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        h.engine.run_automation(id).await;

        assert_eq!(*h.runner.calls.lock().unwrap(), vec!["lights_on"]);
        let stored = h.repo.get_by_id(id).await.unwrap().unwrap();
        assert!(stored.last_run.is_some());
        let entries = h.events.entries.lock().unwrap();
        assert!(entries
            .iter()
            .any(|(_, title)| title == "Automation Executed Successfully"));
    }

    #[tokio::test]
    async fn should_notify_owner_when_script_fails() {
        let h = harness_with_runner(FakeScriptRunner {
            fail: true,
            calls: Mutex::new(vec![]),
        });
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        h.engine.run_automation(id).await;

        let sent = h.notifier.sent.lock().unwrap();
        assert!(sent
            .iter()
            .any(|(owner, title, level)| owner == "alice"
                && title == "Automation Failed"
                && *level == NotificationLevel::Error));
    }

    #[tokio::test]
    async fn should_skip_and_notify_when_disabled_automation_fires() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        let mut automation = h.repo.get_by_id(id).await.unwrap().unwrap();
        automation.enabled = false;
        h.repo.update(automation).await.unwrap();

        h.engine.run_automation(id).await;
        assert!(h.runner.calls.lock().unwrap().is_empty());
        let sent = h.notifier.sent.lock().unwrap();
        assert!(sent.iter().any(|(_, title, _)| title == "Automation Skipped"));
    }

    #[tokio::test]
    async fn should_clear_disable_once_and_skip_single_firing() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        let mut automation = h.repo.get_by_id(id).await.unwrap().unwrap();
        automation.disable_once = true;
        h.repo.update(automation).await.unwrap();

        h.engine.run_automation(id).await;
        assert!(h.runner.calls.lock().unwrap().is_empty());
        let stored = h.repo.get_by_id(id).await.unwrap().unwrap();
        assert!(!stored.disable_once);

        // Next firing runs normally.
        h.engine.run_automation(id).await;
        assert_eq!(h.runner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_log_event_and_drop_registration_when_automation_vanished() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Normal)).await.unwrap();
        h.repo.delete(id).await.unwrap();

        h.engine.run_automation(id).await;
        let entries = h.events.entries.lock().unwrap();
        assert!(entries
            .iter()
            .any(|(level, title)| *level == EventLevel::Error && title == "Automation Failed"));
        assert!(!h.engine.scheduler().is_registered(&id.to_string()));
    }

    #[tokio::test]
    async fn should_reanchor_solar_automation_when_it_fires() {
        let h = harness();
        let id = h.engine.create(request(true, TimingMode::Sunrise)).await.unwrap();
        // Push the stored expression off the solar time to observe the
        // re-anchor rewriting it.
        let mut automation = h.repo.get_by_id(id).await.unwrap().unwrap();
        automation.cron_expression = "0 3 * * 1,2,3,4,5".to_string();
        h.repo.update(automation).await.unwrap();

        h.engine.run_automation(id).await;

        let stored = h.repo.get_by_id(id).await.unwrap().unwrap();
        let (sunrise, _) = suntime::sun_times(52.52, 13.405, Local::now().date_naive());
        let expected = cron::generate(sunrise.hour, sunrise.minute, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(stored.cron_expression, expected);
        assert_eq!(h.runner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_preserve_weekdays_across_reanchor() {
        let h = harness();
        let mut req = request(true, TimingMode::Sunset);
        req.weekdays = vec![0, 6];
        let id = h.engine.create(req).await.unwrap();

        h.engine.reanchor(id, false).await.unwrap();
        let stored = h.repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(cron::extract_weekdays(&stored.cron_expression).unwrap(), vec![0, 6]);
    }
}
