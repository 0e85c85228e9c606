//! `ScriptEngine` implementation on top of rhai.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use homestead_app::ports::ScriptEngine;
use homestead_domain::error::HomesteadError;
use homestead_domain::script::{
    DriverSchemas, FunctionInvocation, ScriptError, ScriptOutcome, ScriptType, SingletonSchema,
    SingletonValues, Span,
};
use rhai::{AST, Dynamic, Engine, EvalAltResult, Scope};
use serde_json::Value;

use crate::span_of;

/// Name of the optional function declaring the driver singleton shape.
const DRIVER_TEMPLATE_FN: &str = "driver_template";
/// Name of the optional function declaring the device singleton shape.
const DEVICE_TEMPLATE_FN: &str = "device_template";

/// Budget for evaluating the template functions during schema extraction.
/// Template functions build a literal map; anything slower is a runaway.
const SCHEMA_BUDGET: Duration = Duration::from_secs(2);

/// Runs driver code in a fresh rhai engine per invocation.
///
/// Each run happens on a blocking thread; the execution budget is enforced
/// through the engine's progress hook, so an infinite loop terminates with a
/// runtime interrupt instead of stalling the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct RhaiScriptEngine;

impl RhaiScriptEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ScriptEngine for RhaiScriptEngine {
    async fn schemas(&self, code: &str) -> Result<DriverSchemas, ScriptError> {
        let code = code.to_owned();
        match tokio::task::spawn_blocking(move || extract_schemas(&code)).await {
            Ok(result) => result,
            Err(err) => Err(ScriptError::runtime(
                format!("script engine task failed: {err}"),
                Span::default(),
            )),
        }
    }

    async fn run(
        &self,
        code: &str,
        singletons: SingletonValues,
        invocation: FunctionInvocation,
        budget: Duration,
    ) -> Result<ScriptOutcome, HomesteadError> {
        let code = code.to_owned();
        tokio::task::spawn_blocking(move || run_blocking(&code, singletons, invocation, budget))
            .await
            .map_err(|err| HomesteadError::Engine(Box::new(err)))
    }
}

/// Build the engine used for one run. `deadline` arms the progress hook.
fn base_engine(deadline: Instant) -> Engine {
    let mut engine = Engine::new();
    engine.on_progress(move |_operations| {
        if Instant::now() >= deadline {
            Some(Dynamic::UNIT)
        } else {
            None
        }
    });
    engine
}

fn extract_schemas(code: &str) -> Result<DriverSchemas, ScriptError> {
    let engine = base_engine(Instant::now() + SCHEMA_BUDGET);
    let ast = engine.compile(code).map_err(parse_error)?;
    Ok(DriverSchemas {
        driver: template_schema(&engine, &ast, DRIVER_TEMPLATE_FN)?,
        device: template_schema(&engine, &ast, DEVICE_TEMPLATE_FN)?,
    })
}

fn template_schema(
    engine: &Engine,
    ast: &AST,
    function: &str,
) -> Result<SingletonSchema, ScriptError> {
    let declared = ast
        .iter_functions()
        .any(|meta| meta.name == function && meta.params.is_empty());
    if !declared {
        return Ok(SingletonSchema::default());
    }
    let mut scope = Scope::new();
    let template = engine
        .call_fn::<Dynamic>(&mut scope, ast, function, Vec::<Dynamic>::new())
        .map_err(eval_error)?;
    let json: Value = rhai::serde::from_dynamic(&template).map_err(eval_error)?;
    match json {
        Value::Object(map) => {
            let fields: BTreeMap<String, ScriptType> = map
                .iter()
                .map(|(name, value)| (name.clone(), ScriptType::of(value)))
                .collect();
            Ok(SingletonSchema::new(fields))
        }
        _ => Err(ScriptError::diagnostic(
            format!("`{function}` must return an object map"),
            Span::default(),
        )),
    }
}

fn run_blocking(
    code: &str,
    singletons: SingletonValues,
    invocation: FunctionInvocation,
    budget: Duration,
) -> ScriptOutcome {
    let engine = base_engine(Instant::now() + budget);
    let ast = match engine.compile(code) {
        Ok(ast) => ast,
        Err(err) => return ScriptOutcome::failed(singletons, vec![parse_error(err)]),
    };

    if invocation.args.len() != invocation.signature.params.len() {
        return ScriptOutcome::failed(
            singletons,
            vec![ScriptError::diagnostic(
                format!(
                    "function `{}` expects {} argument(s), got {}",
                    invocation.function,
                    invocation.signature.params.len(),
                    invocation.args.len()
                ),
                Span::default(),
            )],
        );
    }
    for (index, (arg, expected)) in invocation
        .args
        .iter()
        .zip(&invocation.signature.params)
        .enumerate()
    {
        if !expected.check(arg) {
            return ScriptOutcome::failed(
                singletons,
                vec![ScriptError::diagnostic(
                    format!(
                        "argument {index} of `{}` does not match its declared type",
                        invocation.function
                    ),
                    Span::default(),
                )],
            );
        }
    }

    // Singletons become shared values so field assignments inside the
    // script are visible on our handles after the call.
    let driver_shared = match rhai::serde::to_dynamic(&singletons.driver) {
        Ok(dynamic) => dynamic.into_shared(),
        Err(err) => return ScriptOutcome::failed(singletons, vec![eval_error(err)]),
    };
    let device_shared = match &singletons.device {
        Some(device) => match rhai::serde::to_dynamic(device) {
            Ok(dynamic) => Some(dynamic.into_shared()),
            Err(err) => return ScriptOutcome::failed(singletons, vec![eval_error(err)]),
        },
        None => None,
    };

    let mut args: Vec<Dynamic> = Vec::with_capacity(2 + invocation.args.len());
    args.push(driver_shared.clone());
    if let Some(device) = &device_shared {
        args.push(device.clone());
    }
    for arg in &invocation.args {
        match rhai::serde::to_dynamic(arg) {
            Ok(dynamic) => args.push(dynamic),
            Err(err) => return ScriptOutcome::failed(singletons, vec![eval_error(err)]),
        }
    }

    let mut scope = Scope::new();
    let returned = match engine.call_fn::<Dynamic>(&mut scope, &ast, &invocation.function, args) {
        Ok(returned) => returned,
        Err(err) => return ScriptOutcome::failed(singletons, vec![eval_error(err)]),
    };

    let return_value: Value = match rhai::serde::from_dynamic(&returned) {
        Ok(value) => value,
        Err(err) => return ScriptOutcome::failed(singletons, vec![eval_error(err)]),
    };
    if !invocation.signature.returns.check(&return_value) {
        return ScriptOutcome::failed(
            singletons,
            vec![ScriptError::diagnostic(
                format!(
                    "function `{}` returned a value of the wrong type",
                    invocation.function
                ),
                Span::default(),
            )],
        );
    }

    let driver_after: Value = match rhai::serde::from_dynamic(&driver_shared.flatten()) {
        Ok(value) => value,
        Err(err) => return ScriptOutcome::failed(singletons, vec![eval_error(err)]),
    };
    let device_after = match device_shared {
        Some(shared) => match rhai::serde::from_dynamic(&shared.flatten()) {
            Ok(value) => Some(value),
            Err(err) => return ScriptOutcome::failed(singletons, vec![eval_error(err)]),
        },
        None => None,
    };

    ScriptOutcome {
        singletons: SingletonValues {
            driver: driver_after,
            device: device_after,
        },
        return_value,
        errors: vec![],
    }
}

fn parse_error(err: rhai::ParseError) -> ScriptError {
    let span = span_of(err.1);
    ScriptError::syntax(err.to_string(), span)
}

pub(crate) fn eval_error(err: Box<EvalAltResult>) -> ScriptError {
    let span = span_of(err.position());
    match *err {
        EvalAltResult::ErrorTerminated(..) => {
            ScriptError::runtime("script exceeded its execution budget", span)
        }
        EvalAltResult::ErrorParsing(ref kind, _) => ScriptError::syntax(kind.to_string(), span),
        EvalAltResult::ErrorFunctionNotFound(ref name, _) => ScriptError::diagnostic(
            format!("function `{name}` is not defined by this script"),
            span,
        ),
        ref other => ScriptError::runtime(other.to_string(), span),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homestead_domain::script::{FunctionSignature, ScriptErrorKind};
    use serde_json::json;

    const DRIVER_CODE: &str = r#"
        fn driver_template() {
            #{ total_calls: 0 }
        }

        fn device_template() {
            #{ on: false, level: 0 }
        }

        fn set_power(driver, device, state) {
            driver.total_calls += 1;
            device.on = state;
            true
        }

        fn report_power_draw(driver, device) {
            driver.total_calls += 1;
            if device.on { 12 } else { 0 }
        }

        fn bad_draw(driver, device) {
            -1
        }
    "#;

    fn singletons() -> SingletonValues {
        SingletonValues {
            driver: json!({"total_calls": 0}),
            device: Some(json!({"on": false, "level": 0})),
        }
    }

    fn invocation(function: &str, args: Vec<Value>, params: Vec<ScriptType>, returns: ScriptType) -> FunctionInvocation {
        FunctionInvocation {
            function: function.to_string(),
            args,
            signature: FunctionSignature { params, returns },
        }
    }

    #[tokio::test]
    async fn should_extract_schemas_from_template_functions() {
        let engine = RhaiScriptEngine::new();
        let schemas = engine.schemas(DRIVER_CODE).await.unwrap();
        assert_eq!(
            schemas.driver.fields.get("total_calls"),
            Some(&ScriptType::Int)
        );
        assert_eq!(schemas.device.fields.get("on"), Some(&ScriptType::Bool));
        assert_eq!(schemas.device.fields.get("level"), Some(&ScriptType::Int));
    }

    #[tokio::test]
    async fn should_return_empty_schema_when_template_missing() {
        let engine = RhaiScriptEngine::new();
        let schemas = engine.schemas("fn noop(driver) { }").await.unwrap();
        assert!(schemas.driver.fields.is_empty());
        assert!(schemas.device.fields.is_empty());
    }

    #[tokio::test]
    async fn should_report_syntax_error_with_kind() {
        let engine = RhaiScriptEngine::new();
        let err = engine.schemas("fn broken( {").await.unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::Syntax);
    }

    #[tokio::test]
    async fn should_run_function_and_capture_mutated_singletons() {
        let engine = RhaiScriptEngine::new();
        let outcome = engine
            .run(
                DRIVER_CODE,
                singletons(),
                invocation(
                    "set_power",
                    vec![json!(true)],
                    vec![ScriptType::Bool],
                    ScriptType::Bool,
                ),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert!(outcome.success(), "errors: {:?}", outcome.errors);
        assert_eq!(outcome.return_value, json!(true));
        assert_eq!(outcome.singletons.driver, json!({"total_calls": 1}));
        assert_eq!(
            outcome.singletons.device,
            Some(json!({"on": true, "level": 0}))
        );
    }

    #[tokio::test]
    async fn should_report_missing_function_as_diagnostic() {
        let engine = RhaiScriptEngine::new();
        let outcome = engine
            .run(
                DRIVER_CODE,
                singletons(),
                invocation("no_such_fn", vec![], vec![], ScriptType::Null),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.errors[0].kind, ScriptErrorKind::Diagnostic);
    }

    #[tokio::test]
    async fn should_report_wrong_return_type_as_diagnostic() {
        let engine = RhaiScriptEngine::new();
        let outcome = engine
            .run(
                DRIVER_CODE,
                singletons(),
                // bad_draw returns an int, but we demand a bool.
                invocation("bad_draw", vec![], vec![], ScriptType::Bool),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.errors[0].kind, ScriptErrorKind::Diagnostic);
    }

    #[tokio::test]
    async fn should_reject_argument_count_mismatch() {
        let engine = RhaiScriptEngine::new();
        let outcome = engine
            .run(
                DRIVER_CODE,
                singletons(),
                // Signature says one bool, but no args supplied.
                invocation("set_power", vec![], vec![ScriptType::Bool], ScriptType::Bool),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.errors[0].kind, ScriptErrorKind::Diagnostic);
    }

    #[tokio::test]
    async fn should_terminate_runaway_script_within_budget() {
        let engine = RhaiScriptEngine::new();
        let code = "fn spin(driver) { loop { } }";
        let outcome = engine
            .run(
                code,
                SingletonValues {
                    driver: json!({}),
                    device: None,
                },
                invocation("spin", vec![], vec![], ScriptType::Null),
                Duration::from_millis(100),
            )
            .await
            .unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.errors[0].kind, ScriptErrorKind::RuntimeInterrupt);
        assert!(outcome.errors[0].message.contains("budget"));
    }

    #[tokio::test]
    async fn should_keep_input_singletons_on_failure() {
        let engine = RhaiScriptEngine::new();
        let code = "fn explode(driver, device) { driver.total_calls = 99; throw \"boom\"; }";
        let outcome = engine
            .run(
                code,
                singletons(),
                invocation("explode", vec![], vec![], ScriptType::Null),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(!outcome.success());
        // The outcome carries the pre-run values, not the partial mutation.
        assert_eq!(outcome.singletons.driver, json!({"total_calls": 0}));
    }

    #[tokio::test]
    async fn should_run_device_less_invocation_with_single_singleton() {
        let engine = RhaiScriptEngine::new();
        let code = "fn tick(driver) { driver.total_calls += 1; () }";
        let outcome = engine
            .run(
                code,
                SingletonValues {
                    driver: json!({"total_calls": 4}),
                    device: None,
                },
                invocation("tick", vec![], vec![], ScriptType::Null),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(outcome.success(), "errors: {:?}", outcome.errors);
        assert_eq!(outcome.singletons.driver, json!({"total_calls": 5}));
        assert_eq!(outcome.singletons.device, None);
    }
}
