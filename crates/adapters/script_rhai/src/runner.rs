//! `ScriptRunner` implementation — runs stored automation scripts.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use homestead_app::ports::{ScriptRepository, ScriptRunner, ScriptRunOutcome};
use homestead_domain::error::{HomesteadError, NotFoundError};
use rhai::{Dynamic, Engine};

use crate::engine::eval_error;

/// Runs a user's stored script by `(owner, id)` with a bounded budget.
pub struct RhaiScriptRunner<R> {
    scripts: R,
    budget: Duration,
}

impl<R> RhaiScriptRunner<R> {
    #[must_use]
    pub fn new(scripts: R, budget: Duration) -> Self {
        Self { scripts, budget }
    }
}

impl<R: ScriptRepository + Send + Sync> ScriptRunner for RhaiScriptRunner<R> {
    async fn run_by_id(
        &self,
        owner: &str,
        script_id: &str,
    ) -> Result<ScriptRunOutcome, HomesteadError> {
        let script = self
            .scripts
            .get_by_id(owner, script_id)
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "Script",
                id: script_id.to_string(),
            })?;

        let budget = self.budget;
        tokio::task::spawn_blocking(move || eval_blocking(&script.code, budget))
            .await
            .map_err(|err| HomesteadError::Engine(Box::new(err)))
    }
}

fn eval_blocking(code: &str, budget: Duration) -> ScriptRunOutcome {
    let deadline = Instant::now() + budget;
    let mut engine = Engine::new();
    engine.on_progress(move |_operations| {
        if Instant::now() >= deadline {
            Some(Dynamic::UNIT)
        } else {
            None
        }
    });

    let printed = Rc::new(RefCell::new(String::new()));
    let sink = Rc::clone(&printed);
    engine.on_print(move |line| {
        let mut buffer = sink.borrow_mut();
        buffer.push_str(line);
        buffer.push('\n');
    });

    match engine.eval::<Dynamic>(code) {
        Ok(_) => ScriptRunOutcome {
            success: true,
            output: printed.borrow().clone(),
            errors: vec![],
        },
        Err(err) => ScriptRunOutcome {
            success: false,
            output: printed.borrow().clone(),
            errors: vec![eval_error(err)],
        },
    }
}
