//! Output and reporting for the onboarder CLI.
use clap::ArgMatches;
use onboarder_api::{api::Outcome, errors::OnboarderAPIError};
use serde_json::{to_string_pretty, Value};

pub mod config;

/// How much the CLI prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

/// Prints outcomes and failures according to the reporting flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reporter {
    pub verbosity: Verbosity,
    /// Skip the JSON response, keep the status line.
    pub suppress: bool,
}

impl Reporter {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let flag = |id: &str| matches!(matches.get_one::<bool>(id), Some(true));
        let verbosity = if flag("verbose") {
            Verbosity::Verbose
        } else if flag("quiet") {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        };
        Self {
            verbosity,
            suppress: flag("suppress"),
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Default `tracing` filter, used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "warn,onboarder_core=debug,onboarder_api=debug,onboarder_cli=debug",
        }
    }

    /// Lines printed to stdout for a successful operation.
    pub fn success_lines(&self, operation: &str, outcome: &Outcome) -> Vec<String> {
        if self.verbosity == Verbosity::Quiet {
            return vec![];
        }
        let mut lines = vec![];
        if !self.suppress {
            lines.push(format_response(&outcome.response));
        }
        if let Some(path) = &outcome.saved_to {
            lines.push(format!("Saved to {}", path.display()));
        }
        lines.push(status_str(label(operation), true, None));
        lines
    }

    /// Lines printed to stderr for a failed operation.
    pub fn failure_lines(&self, operation: &str, err: &anyhow::Error) -> Vec<String> {
        let mut lines = vec![];
        if let Some(body) = err
            .downcast_ref::<OnboarderAPIError>()
            .and_then(OnboarderAPIError::response_body)
        {
            lines.push(body);
        }
        let details = format!("{err:#}");
        lines.push(status_str(label(operation), false, Some(&details)));
        lines
    }

    pub fn report_success(&self, operation: &str, outcome: &Outcome) {
        for line in self.success_lines(operation, outcome) {
            println!("{line}");
        }
    }

    pub fn report_failure(&self, operation: &str, err: &anyhow::Error) {
        for line in self.failure_lines(operation, err) {
            eprintln!("{line}");
        }
    }
}

fn label(operation: &str) -> String {
    format!("{operation}... ")
}

/// Pretty JSON, or the bare text for string responses.
pub fn format_response(response: &Value) -> String {
    match response {
        Value::String(text) => text.clone(),
        other => to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

pub fn status_str(mut str: String, is_ok: bool, details: Option<&str>) -> String {
    if is_ok {
        str.push('✅');
        return str;
    }
    str.push('❌');
    if let Some(detail) = details {
        str.push_str(" [");
        str.push_str(detail);
        str.push(']');
    }
    str
}
