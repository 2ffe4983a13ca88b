//! Resume command construction.
//!
//! After a run (complete or aborted) the operator gets a command that
//! re-runs the same invocation with an identifier map, so existing artifacts
//! are updated instead of created again. The command is computed for cmd.exe,
//! PowerShell and POSIX shells; the dialect most likely in use is shown first.

mod quote;

use quote::{escape_cmd, escape_posix, escape_powershell};

use crate::artifact::Artifact;
use serde_json::{Map, Value};
use std::path::Path;

/// Argument carrying the identifier map.
pub const RESUME_FLAG: &str = "--update";

/// Shell the resume command is quoted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellDialect {
    Cmd,
    PowerShell,
    Posix,
}

impl ShellDialect {
    pub const ALL: [ShellDialect; 3] = [ShellDialect::Cmd, ShellDialect::PowerShell, ShellDialect::Posix];

    /// Guess the operator's shell from the process environment.
    pub fn detect() -> Self {
        Self::detect_with(cfg!(windows), |name| std::env::var_os(name).is_some())
    }

    /// Guess the shell given the platform and an environment probe.
    pub fn detect_with(windows: bool, has_var: impl Fn(&str) -> bool) -> Self {
        if !windows {
            ShellDialect::Posix
        } else if has_var("PSModulePath") && !has_var("PROMPT") {
            ShellDialect::PowerShell
        } else {
            ShellDialect::Cmd
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            ShellDialect::Cmd => "For cmd.exe:",
            ShellDialect::PowerShell => "For PowerShell:",
            ShellDialect::Posix => "For UNIX shell:",
        }
    }
}

/// The process invocation being resumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// `argv[0]` as invoked.
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The current process's invocation.
    pub fn from_env() -> Self {
        let mut argv = std::env::args();
        let program = argv.next().unwrap_or_else(|| "workflow-templater".to_string());
        Self::new(program, argv.collect())
    }
}

/// Map from artifact name to bound identifier, in processing order.
pub fn identifier_map(artifacts: &[Artifact]) -> Map<String, Value> {
    artifacts
        .iter()
        .filter_map(|a| {
            a.identifier()
                .map(|id| (a.name().to_string(), Value::String(id.to_string())))
        })
        .collect()
}

/// A restart invocation carrying the identifier map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeCommand {
    program: String,
    args: Vec<String>,
}

impl ResumeCommand {
    /// Build from the original invocation, inserting or replacing the resume argument.
    pub fn build(invocation: &Invocation, identifiers: &Map<String, Value>) -> Self {
        let map = Value::Object(identifiers.clone()).to_string();
        let mut args = invocation.args.clone();
        let prefixed = format!("{}=", RESUME_FLAG);

        if let Some(i) = args.iter().position(|a| a == RESUME_FLAG) {
            if i + 1 < args.len() {
                args[i + 1] = map;
            } else {
                args.push(map);
            }
        } else if let Some(i) = args.iter().position(|a| a.starts_with(&prefixed)) {
            args[i] = format!("{}{}", prefixed, map);
        } else {
            args.insert(0, RESUME_FLAG.to_string());
            args.insert(1, map);
        }

        Self {
            program: invocation.program.clone(),
            args,
        }
    }

    #[cfg(test)]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The command line quoted for `dialect`.
    pub fn render(&self, dialect: ShellDialect) -> String {
        match dialect {
            ShellDialect::Cmd => std::iter::once(self.program_basename())
                .chain(self.args.iter().map(|a| escape_cmd(a)))
                .collect::<Vec<_>>()
                .join(" "),
            ShellDialect::PowerShell => {
                format!("{} {}", self.program_basename(), escape_powershell(&self.args))
            }
            ShellDialect::Posix => std::iter::once(escape_posix(&self.program))
                .chain(self.args.iter().map(|a| escape_posix(a)))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// All three dialects, `preferred` first, each under its heading.
    pub fn render_all(&self, preferred: ShellDialect) -> String {
        let others = ShellDialect::ALL.into_iter().filter(|d| *d != preferred);
        std::iter::once(preferred)
            .chain(others)
            .map(|d| format!("{}\n{}", d.heading(), self.render(d)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn program_basename(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone())
    }
}
