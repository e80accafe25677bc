//! Command-line templates for external programs.
//!
//! A template is split on whitespace into words; `{name}` placeholders inside
//! a word are replaced by values at render time. No shell is involved, so
//! values with spaces stay a single argument.

use crate::libs::error::{PipelineError, Result};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    words: Vec<String>,
}

impl CommandTemplate {
    /// ```
    /// use wintree::libs::external::CommandTemplate;
    /// let t = CommandTemplate::parse("fastme -i {in} -o {out} -s").unwrap();
    /// assert_eq!(t.program(), "fastme");
    /// assert!(t.has_placeholder("out"));
    /// assert_eq!(
    ///     t.render(&[("in", "a b.phy"), ("out", "a.nwk")]),
    ///     vec!["fastme", "-i", "a b.phy", "-o", "a.nwk", "-s"]
    /// );
    /// assert!(CommandTemplate::parse("   ").is_err());
    /// ```
    pub fn parse(template: &str) -> Result<Self> {
        let words: Vec<String> = template.split_whitespace().map(|s| s.to_string()).collect();
        if words.is_empty() {
            return Err(PipelineError::Config("empty command template".to_string()));
        }
        if words[0].contains('{') {
            return Err(PipelineError::Config(format!(
                "the program name of `{}` cannot be a placeholder",
                template
            )));
        }
        Ok(Self { words })
    }

    pub fn program(&self) -> &str {
        &self.words[0]
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        let needle = format!("{{{}}}", name);
        self.words.iter().any(|w| w.contains(&needle))
    }

    /// Placeholders not listed in `vars` are left untouched.
    pub fn render(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.words
            .iter()
            .map(|word| {
                vars.iter().fold(word.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{}}}", key), value)
                })
            })
            .collect()
    }

    pub fn command(&self, vars: &[(&str, &str)]) -> Command {
        let words = self.render(vars);
        let mut cmd = Command::new(&words[0]);
        cmd.args(&words[1..]);
        cmd
    }

    /// Resolve the program on `PATH`, or as a path when it contains a separator.
    pub fn locate(&self) -> Result<PathBuf> {
        which::which(self.program()).map_err(|_| {
            PipelineError::tool(
                self.program(),
                "not found in PATH or not executable".to_string(),
            )
        })
    }
}

impl std::fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.words.join(" "))
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Exited(Output),
    /// Killed after running past the limit
    TimedOut,
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run to completion, capturing stdout and stderr.
///
/// With a timeout, the child is killed once it runs past it. Output goes to
/// anonymous temp files so a chatty child never blocks on a full pipe.
pub fn run_command(cmd: &mut Command, timeout: Option<Duration>) -> std::io::Result<RunOutcome> {
    let limit = match timeout {
        None => return cmd.stdin(Stdio::null()).output().map(RunOutcome::Exited),
        Some(limit) => limit,
    };

    let mut out_file = tempfile::tempfile()?;
    let mut err_file = tempfile::tempfile()?;
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(out_file.try_clone()?))
        .stderr(Stdio::from(err_file.try_clone()?))
        .spawn()?;

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(RunOutcome::TimedOut);
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let mut stdout = Vec::new();
    out_file.seek(SeekFrom::Start(0))?;
    out_file.read_to_end(&mut stdout)?;
    let mut stderr = Vec::new();
    err_file.seek(SeekFrom::Start(0))?;
    err_file.read_to_end(&mut stderr)?;

    Ok(RunOutcome::Exited(Output {
        status,
        stdout,
        stderr,
    }))
}

/// First line of stderr, for log and error messages.
pub fn stderr_summary(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}
