// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup and a scripted CommandRunner standing in for registry tools.

use async_trait::async_trait;
use parking_lot::Mutex;
use pullwarden::process::{CommandOutput, CommandRunner, ProcessError};
use std::collections::VecDeque;
use std::sync::Once;
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("pullwarden=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// One scripted response, matched by a substring of the joined command line.
struct Rule {
    needle: String,
    responses: VecDeque<Result<CommandOutput, String>>,
}

/// Records every invocation and answers from per-command scripts.
///
/// Commands without a matching rule fail with "manifest unknown".
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
    inputs: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `needle` with success. The last answer repeats.
    pub fn succeed(&self, needle: &str, stdout: &str) -> &Self {
        self.push(needle, Ok(ok(stdout)))
    }

    pub fn fail(&self, needle: &str, stderr: &str) -> &Self {
        self.push(needle, Ok(failed(stderr)))
    }

    /// Make the program look absent from PATH.
    pub fn missing(&self, needle: &str) -> &Self {
        self.push(needle, Err(needle.to_string()))
    }

    fn push(&self, needle: &str, response: Result<CommandOutput, String>) -> &Self {
        let mut rules = self.rules.lock();
        match rules.iter_mut().find(|r| r.needle == needle) {
            Some(rule) => rule.responses.push_back(response),
            None => rules.push(Rule {
                needle: needle.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Stdin payloads, paired with the command line that received them.
    pub fn inputs(&self) -> Vec<(String, String)> {
        self.inputs.lock().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: Option<&str>,
        _timeout: Duration,
    ) -> Result<CommandOutput, ProcessError> {
        let line = format!("{} {}", program, args.join(" "));
        self.calls.lock().push(line.clone());
        if let Some(input) = input {
            self.inputs.lock().push((line.clone(), input.to_string()));
        }

        let mut rules = self.rules.lock();
        // Longest needle wins so specific images beat generic prefixes.
        let rule = rules
            .iter_mut()
            .filter(|r| line.contains(&r.needle))
            .max_by_key(|r| r.needle.len());

        let response = match rule {
            Some(rule) if rule.responses.len() > 1 => rule.responses.pop_front(),
            Some(rule) => rule.responses.front().cloned(),
            None => Some(Ok(failed("manifest unknown"))),
        };

        match response {
            Some(Ok(output)) => Ok(output),
            Some(Err(program)) => Err(ProcessError::NotInstalled(program)),
            None => Ok(failed("manifest unknown")),
        }
    }
}

#[allow(dead_code)]
pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        success: true,
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

#[allow(dead_code)]
pub fn failed(stderr: &str) -> CommandOutput {
    CommandOutput {
        success: false,
        exit_code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}
