// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Runs tasks as local child processes
//!
//! Each stdout/stderr line becomes a log line on the run's broker, except
//! output commands:
//!
//! ```text
//! airplane_output_set {"rows": 3}
//! airplane_output_set:count 3
//! airplane_output_append:names "alice"
//! ```

use std::process::Stdio;

use anyhow::Context;
use ap_api_contract::{LogLine, Outputs};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::executor::{ExecutionError, Executor, RunConfig};

const OUTPUT_SET: &str = "airplane_output_set";
const OUTPUT_APPEND: &str = "airplane_output_append";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputOp {
    Set,
    Append,
}

#[derive(Debug, PartialEq)]
struct OutputCommand {
    op: OutputOp,
    key: Option<String>,
    value: Value,
}

fn parse_output_command(line: &str) -> Option<OutputCommand> {
    let (head, rest) = line.trim_end().split_once(' ')?;
    let (name, key) = match head.split_once(':') {
        Some((name, key)) if !key.is_empty() => (name, Some(key.to_string())),
        Some(_) => return None,
        None => (head, None),
    };
    let op = match name {
        OUTPUT_SET => OutputOp::Set,
        OUTPUT_APPEND => OutputOp::Append,
        _ => return None,
    };
    let value = serde_json::from_str(rest.trim()).ok()?;
    Some(OutputCommand { op, key, value })
}

fn apply_output(outputs: &mut Outputs, command: OutputCommand) {
    let target = match command.key {
        None => outputs,
        Some(key) => {
            if !outputs.is_object() {
                *outputs = Value::Object(Default::default());
            }
            match outputs.as_object_mut() {
                Some(map) => map.entry(key).or_insert(Value::Null),
                None => return,
            }
        }
    };
    match command.op {
        OutputOp::Set => *target = command.value,
        OutputOp::Append => match target {
            Value::Array(items) => items.push(command.value),
            other => *other = Value::Array(vec![command.value]),
        },
    }
}

/// Parameter values as environment variables: `PARAM_<NAME>`.
fn param_env(name: &str, value: &Value) -> (String, String) {
    let var = format!("PARAM_{}", name.to_ascii_uppercase().replace(['-', ' '], "_"));
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    (var, text)
}

/// Executes shell, node and python tasks with the local toolchain.
#[derive(Debug, Default, Clone)]
pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        Self
    }

    fn command_for(config: &RunConfig) -> Result<Command, ExecutionError> {
        if let Some(shell) = config.kind_options.get("command").and_then(Value::as_str) {
            let mut cmd = shell_command(shell);
            cmd.current_dir(&config.root_dir);
            return Ok(cmd);
        }

        let entrypoint = config
            .entrypoint
            .as_ref()
            .ok_or_else(|| ExecutionError::new(format!("task {} has no entrypoint", config.task_slug)))?;
        let program = match config.kind.as_str() {
            "shell" => "sh",
            "python" => "python3",
            "node" => "node",
            other => {
                return Err(ExecutionError::new(format!(
                    "task kind {other} cannot be run by the local executor"
                )))
            }
        };
        let mut cmd = Command::new(program);
        cmd.arg(entrypoint).current_dir(&config.root_dir);
        Ok(cmd)
    }

    async fn run(&self, config: RunConfig) -> anyhow::Result<Result<Outputs, ExecutionError>> {
        let mut cmd = match Self::command_for(&config) {
            Ok(cmd) => cmd,
            Err(err) => return Ok(Err(err)),
        };

        cmd.envs(&config.env_vars)
            .envs(config.param_values.iter().map(|(name, value)| param_env(name, value)))
            .env("AIRPLANE_RUN_ID", &config.run_id)
            .env("AIRPLANE_TASK_SLUG", &config.task_slug)
            .env("AIRPLANE_API_HOST", &config.api_host)
            .env("AIRPLANE_ENV_SLUG", config.env_slug.as_deref().unwrap_or_default())
            .env("AIRPLANE_PARAMS", serde_json::to_string(&config.param_values)?)
            .env("AIRPLANE_RESOURCES", serde_json::to_string(&config.resources)?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(run_id = %config.run_id, task = %config.task_slug, "starting task process");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", config.task_slug))?;

        let stderr_pump = child.stderr.take().map(|stderr| {
            let logs = config.logs.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                while let Ok(Some(line)) = read_line_lossy(&mut reader, &mut buf).await {
                    logs.publish(LogLine::error(line)).await;
                }
            })
        });

        let mut outputs = Value::Null;
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            while let Some(line) = read_line_lossy(&mut reader, &mut buf)
                .await
                .context("reading task stdout")?
            {
                match parse_output_command(&line) {
                    Some(command) => {
                        debug!(run_id = %config.run_id, ?command, "task output");
                        apply_output(&mut outputs, command);
                    }
                    None => config.logs.publish(LogLine::info(line)).await,
                }
            }
        }

        if let Some(pump) = stderr_pump {
            if let Err(err) = pump.await {
                warn!(run_id = %config.run_id, error = %err, "stderr reader failed");
            }
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of task '{}'", config.task_slug))?;

        info!(
            run_id = %config.run_id,
            exit_code = status.code().unwrap_or(-1),
            success = status.success(),
            "task process exited"
        );

        if status.success() {
            Ok(Ok(outputs))
        } else {
            let message = match status.code() {
                Some(code) => format!("task process exited with code {code}"),
                None => "task process was terminated by a signal".to_string(),
            };
            Ok(Err(ExecutionError::new(message).with_outputs(outputs)))
        }
    }
}

/// Next line without its terminator. Invalid UTF-8 is replaced, not an error.
async fn read_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

fn shell_command(script: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script);
        c
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn execute(&self, config: RunConfig) -> Result<Outputs, ExecutionError> {
        if config.is_builtin {
            return Err(ExecutionError::new(format!(
                "built-in task {} is not supported by the local executor",
                config.task_slug
            )));
        }
        let run_id = config.run_id.clone();
        match self.run(config).await {
            Ok(result) => result,
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "task execution error");
                Err(ExecutionError::new(format!("{err:#}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogBroker;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn parses_output_commands() {
        assert_eq!(
            parse_output_command(r#"airplane_output_set {"a": 1}"#),
            Some(OutputCommand {
                op: OutputOp::Set,
                key: None,
                value: json!({"a": 1})
            })
        );
        assert_eq!(
            parse_output_command(r#"airplane_output_append:names "bob""#),
            Some(OutputCommand {
                op: OutputOp::Append,
                key: Some("names".into()),
                value: json!("bob")
            })
        );
        assert_eq!(parse_output_command("airplane_output_set not-json"), None);
        assert_eq!(parse_output_command("hello world"), None);
        assert_eq!(parse_output_command("airplane_output_set"), None);
    }

    #[test]
    fn applies_outputs() {
        let mut outputs = Value::Null;
        apply_output(&mut outputs, parse_output_command("airplane_output_append 1").unwrap());
        apply_output(&mut outputs, parse_output_command("airplane_output_append 2").unwrap());
        assert_eq!(outputs, json!([1, 2]));

        apply_output(&mut outputs, parse_output_command("airplane_output_set:count 2").unwrap());
        apply_output(&mut outputs, parse_output_command(r#"airplane_output_append:names "a""#).unwrap());
        assert_eq!(outputs, json!({"count": 2, "names": ["a"]}));
    }

    #[test]
    fn params_become_env_vars() {
        assert_eq!(param_env("user-name", &json!("ada")), ("PARAM_USER_NAME".into(), "ada".into()));
        assert_eq!(param_env("n", &json!(3)), ("PARAM_N".into(), "3".into()));
    }

    fn shell_config(dir: &std::path::Path, script: &str) -> RunConfig {
        let mut kind_options = serde_json::Map::new();
        kind_options.insert("command".into(), json!(script));
        let mut param_values = serde_json::Map::new();
        param_values.insert("name".into(), json!("ada"));
        RunConfig {
            run_id: "run0000000001".into(),
            task_slug: "greet".into(),
            task_name: "Greet".into(),
            kind: "shell".into(),
            kind_options,
            entrypoint: None,
            root_dir: dir.to_path_buf(),
            param_values,
            resources: BTreeMap::new(),
            env_vars: BTreeMap::from([("GREETING".to_string(), "hello".to_string())]),
            env_slug: None,
            is_builtin: false,
            api_host: "http://127.0.0.1:4000".into(),
            logs: Arc::new(LogBroker::new()),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streams_logs_and_collects_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = shell_config(
            dir.path(),
            r#"echo "$GREETING $PARAM_NAME"; echo 'airplane_output_set {"ok": true}'"#,
        );
        let logs = config.logs.clone();

        let outputs = CommandExecutor::new().execute(config).await.unwrap();
        assert_eq!(outputs, json!({"ok": true}));

        let lines: Vec<String> = logs.history().await.into_iter().map(|l| l.text).collect();
        assert_eq!(lines, vec!["hello ada"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_an_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = shell_config(dir.path(), "echo 'airplane_output_set 1'; echo oops >&2; exit 3");
        let logs = config.logs.clone();

        let err = CommandExecutor::new().execute(config).await.unwrap_err();
        assert_eq!(err.message, "task process exited with code 3");
        assert_eq!(err.outputs, json!(1));
        assert_eq!(logs.history().await[0].text, "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_output_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let config = shell_config(dir.path(), r"printf 'bad \377 byte\n'; echo after; printf '\376\n' >&2");
        let logs = config.logs.clone();

        CommandExecutor::new().execute(config).await.unwrap();

        let mut lines: Vec<String> = logs.history().await.into_iter().map(|l| l.text).collect();
        lines.sort();
        assert_eq!(lines, vec!["after", "bad \u{FFFD} byte", "\u{FFFD}"]);
    }

    #[tokio::test]
    async fn builtins_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = shell_config(dir.path(), "true");
        config.is_builtin = true;
        config.task_slug = "airplane:sql_query".into();
        let err = CommandExecutor::new().execute(config).await.unwrap_err();
        assert!(err.message.contains("airplane:sql_query"));
    }
}
