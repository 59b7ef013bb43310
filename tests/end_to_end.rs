//! End-to-end recipe execution with real processes.

#![cfg(unix)]

use recipe_runner::adapter::{AdapterError, ProcessAdapter};
use recipe_runner::config::RunnerConfig;
use recipe_runner::context::Value;
use recipe_runner::recipe::{self, Parser};
use recipe_runner::resolver::AgentResolver;
use recipe_runner::runner::{Runner, StepStatus};
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn no_overrides() -> BTreeMap<String, Value> {
    BTreeMap::new()
}

#[test]
fn chained_bash_steps() {
    let recipe = recipe::parse(
        r#"
name: chain
steps:
  - id: first
    type: bash
    command: echo 1
    output: x
  - id: second
    type: bash
    command: "echo {{x}}"
    output: y
"#,
    )
    .unwrap();

    let result = Runner::new(ProcessAdapter::new()).execute(&recipe, &no_overrides());

    assert!(result.success, "{result:#?}");
    assert_eq!(result.context.get("x").as_str(), Some("1\n"));
    // `echo 1\n` through the shell prints "1" and a newline.
    assert_eq!(result.context.get("y").as_str(), Some("1\n"));
}

#[test]
fn conditional_skip_with_override() {
    let recipe = recipe::parse(
        r#"
name: conditional
context:
  flag: "no"
steps:
  - id: guarded
    type: bash
    command: echo ran
    condition: '{{flag}} == "yes"'
    output: out
"#,
    )
    .unwrap();
    let runner = Runner::new(ProcessAdapter::new());

    let skipped = runner.execute(&recipe, &no_overrides());
    assert!(skipped.success);
    assert_eq!(skipped.steps[0].status, StepStatus::Skipped);
    assert!(skipped.context.get("out").is_null());

    let overrides = BTreeMap::from([("flag".to_string(), Value::from("yes"))]);
    let ran = runner.execute(&recipe, &overrides);
    assert_eq!(ran.steps[0].status, StepStatus::Completed);
    assert_eq!(ran.context.get("out").as_str(), Some("ran\n"));
}

#[test]
fn failing_step_halts_and_reports_stderr() {
    let temp_dir = TempDir::new().unwrap();
    let marker = temp_dir.path().join("after");
    let yaml = format!(
        r#"
name: halting
steps:
  - id: fails
    type: bash
    command: "echo broken >&2; exit 4"
  - id: after
    type: bash
    command: "touch '{}'"
"#,
        marker.display()
    );
    let recipe = recipe::parse(&yaml).unwrap();

    let result = Runner::new(ProcessAdapter::new()).execute(&recipe, &no_overrides());

    assert!(!result.success);
    assert_eq!(result.steps.len(), 1);
    assert_eq!(
        result.failed_step().unwrap().error.as_deref(),
        Some("command exited with code 4: broken")
    );
    assert!(!marker.exists());
}

#[test]
fn step_timeout_fails_promptly() {
    let recipe = recipe::parse(
        r#"
name: slow
steps:
  - id: sleepy
    type: bash
    command: sleep 30
    timeout: 1
"#,
    )
    .unwrap();

    let start = std::time::Instant::now();
    let result = Runner::new(ProcessAdapter::new()).execute(&recipe, &no_overrides());

    assert!(!result.success);
    assert!(start.elapsed() < Duration::from_secs(10));
    let error = result.steps[0].error.as_deref().unwrap();
    assert!(error.starts_with("command timed out"), "{error}");
}

#[test]
fn working_dir_is_rendered() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("marker.txt"), "here").unwrap();
    let recipe = recipe::parse(
        r#"
name: wd
steps:
  - id: read
    type: bash
    command: cat marker.txt
    working_dir: "{{dir}}"
    output: content
"#,
    )
    .unwrap();

    let overrides = BTreeMap::from([(
        "dir".to_string(),
        Value::from(temp_dir.path().to_str().unwrap()),
    )]);
    let result = Runner::new(ProcessAdapter::new()).execute(&recipe, &overrides);

    assert!(result.success, "{result:#?}");
    assert_eq!(result.context.get("content").as_str(), Some("here"));
}

#[test]
fn one_megabyte_output_is_stored_unmodified() {
    let recipe = recipe::parse(
        r#"
name: big
steps:
  - id: big
    type: bash
    command: "head -c 1048576 /dev/zero | tr '\\0' 'a'"
    output: blob
"#,
    )
    .unwrap();

    let result = Runner::new(ProcessAdapter::new()).execute(&recipe, &no_overrides());

    assert!(result.success, "{result:#?}");
    let blob = result.context.get("blob").as_str().unwrap();
    assert_eq!(blob.len(), 1024 * 1024);
    assert!(blob.bytes().all(|b| b == b'a'));
}

#[test]
fn agent_step_through_configured_cli() {
    let agents = TempDir::new().unwrap();
    let dir = agents.path().join("core/writing");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("summarizer.md"), "Summarize briefly.").unwrap();

    let config = RunnerConfig::from_yaml(&format!(
        r#"
agent_command: "sh -c 'printf \"[%s] %s -> %s\" \"$0\" \"$1\" \"$2\"' {{agent}} {{instructions}} {{prompt}}"
agent_search_paths: ['{}']
"#,
        agents.path().display()
    ))
    .unwrap();

    let recipe = config
        .parser()
        .parse(
            r#"
name: agentic
context:
  topic: rust
steps:
  - id: summarize
    type: agent
    agent: core:summarizer
    prompt: "Write about {{topic}}"
    output: summary
"#,
        )
        .unwrap();

    let result = Runner::new(config.build_adapter().unwrap()).execute(&recipe, &no_overrides());

    assert!(result.success, "{result:#?}");
    assert_eq!(
        result.context.get("summary").as_str(),
        Some("[core:summarizer] Summarize briefly. -> Write about rust")
    );
}

#[test]
fn unresolvable_agent_fails_step() {
    let agents = TempDir::new().unwrap();
    let adapter = ProcessAdapter::new().with_resolver(AgentResolver::new([agents.path()]));
    let recipe = recipe::parse(
        r#"
name: missing-agent
steps:
  - id: ask
    type: agent
    agent: core:ghost
    prompt: hello
"#,
    )
    .unwrap();

    let result = Runner::new(adapter).execute(&recipe, &no_overrides());

    assert!(!result.success);
    assert_eq!(
        result.steps[0].error.as_deref(),
        Some("agent 'core:ghost' not found")
    );
}

#[test]
fn thousand_steps_run_in_order() {
    let mut yaml = String::from("name: many\nsteps:\n");
    for i in 0..1000 {
        yaml.push_str(&format!(
            "  - id: step-{i:04}\n    type: bash\n    command: \"true\"\n"
        ));
    }
    let recipe = Parser::new().parse(&yaml).unwrap();
    assert_eq!(recipe.steps.len(), 1000);
    assert_eq!(recipe.steps[0].id, "step-0000");
    assert_eq!(recipe.steps[999].id, "step-0999");
}

#[test]
fn zero_timeout_is_rejected_before_spawn() {
    let adapter = ProcessAdapter::new();
    let err = recipe_runner::Adapter::execute_bash_step(&adapter, "true", None, Duration::ZERO)
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidTimeout));
}
