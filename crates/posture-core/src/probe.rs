//! Evidence probe contract
//!
//! A probe is one low-level inspection of the host. Probes never decide
//! anything; they hand back raw text or a definite "not there" signal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Description of a single inspection to perform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProbeSpec {
    /// Read the full contents of a file
    ReadFile { path: String },

    /// Concatenate every regular file directly inside a directory
    ReadDir { path: String },

    /// Octal mode plus numeric owner of a path, e.g. `600 0 0`
    FileMode { path: String },

    /// Run a native command and capture its output
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        /// Treat a non-zero exit status as unavailable
        #[serde(default)]
        require_success: bool,
        /// Append stderr to the captured text
        #[serde(default)]
        stderr: bool,
        /// Overrides the configured probe timeout
        #[serde(default)]
        timeout_secs: Option<u64>,
    },

    /// Query the service manager for a unit's state
    Service { unit: String },

    /// Locate an executable on PATH
    Executable { name: String },
}

impl ProbeSpec {
    pub fn read_file(path: impl Into<String>) -> Self {
        ProbeSpec::ReadFile { path: path.into() }
    }

    pub fn read_dir(path: impl Into<String>) -> Self {
        ProbeSpec::ReadDir { path: path.into() }
    }

    pub fn file_mode(path: impl Into<String>) -> Self {
        ProbeSpec::FileMode { path: path.into() }
    }

    pub fn command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProbeSpec::Command {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            require_success: false,
            stderr: false,
            timeout_secs: None,
        }
    }

    /// Mark a command probe as requiring a zero exit status
    pub fn require_success(mut self) -> Self {
        if let ProbeSpec::Command { require_success, .. } = &mut self {
            *require_success = true;
        }
        self
    }

    /// Capture stderr alongside stdout for a command probe
    pub fn with_stderr(mut self) -> Self {
        if let ProbeSpec::Command { stderr, .. } = &mut self {
            *stderr = true;
        }
        self
    }

    /// Override the probe timeout for a command probe
    pub fn with_timeout(mut self, secs: u64) -> Self {
        if let ProbeSpec::Command { timeout_secs, .. } = &mut self {
            *timeout_secs = Some(secs);
        }
        self
    }

    pub fn service(unit: impl Into<String>) -> Self {
        ProbeSpec::Service { unit: unit.into() }
    }

    pub fn executable(name: impl Into<String>) -> Self {
        ProbeSpec::Executable { name: name.into() }
    }

    /// Short human-readable description used as the evidence source label
    pub fn describe(&self) -> String {
        match self {
            ProbeSpec::ReadFile { path } => format!("file:{}", path),
            ProbeSpec::ReadDir { path } => format!("dir:{}", path),
            ProbeSpec::FileMode { path } => format!("mode:{}", path),
            ProbeSpec::Command { program, args, .. } => {
                if args.is_empty() {
                    format!("cmd:{}", program)
                } else {
                    format!("cmd:{} {}", program, args.join(" "))
                }
            }
            ProbeSpec::Service { unit } => format!("service:{}", unit),
            ProbeSpec::Executable { name } => format!("which:{}", name),
        }
    }
}

/// Raw probe output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// False when the inspected thing does not exist or cannot be read
    pub available: bool,
    pub text: String,
}

impl ProbeResult {
    pub fn found(text: impl Into<String>) -> Self {
        Self {
            available: true,
            text: text.into(),
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    /// The text when available, otherwise None
    pub fn text(&self) -> Option<&str> {
        self.available.then_some(self.text.as_str())
    }
}

/// A probe result paired with the spec that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    pub spec: ProbeSpec,
    pub result: ProbeResult,
}

impl Evidence {
    pub fn new(spec: ProbeSpec, result: ProbeResult) -> Self {
        Self { spec, result }
    }

    pub fn source(&self) -> String {
        self.spec.describe()
    }
}

/// Infrastructure failure while running a probe
///
/// Missing files, missing programs and timeouts are not errors. These are
/// reserved for conditions where inspection itself is broken.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Probe error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_spec_yaml_shape() {
        let spec: ProbeSpec = serde_json::from_str(
            r#"{"kind":"command","program":"ufw","args":["status"],"require_success":true}"#,
        )
        .unwrap();

        match &spec {
            ProbeSpec::Command {
                program,
                args,
                require_success,
                stderr,
                timeout_secs,
            } => {
                assert_eq!(program, "ufw");
                assert_eq!(args, &vec!["status".to_string()]);
                assert!(require_success);
                assert!(!stderr);
                assert!(timeout_secs.is_none());
            }
            other => panic!("unexpected spec {:?}", other),
        }
        assert_eq!(spec.describe(), "cmd:ufw status");
    }

    #[test]
    fn test_command_modifiers() {
        let spec = ProbeSpec::command("find", ["/", "-xdev"]).with_timeout(120).with_stderr();
        assert_eq!(
            spec,
            ProbeSpec::Command {
                program: "find".into(),
                args: vec!["/".into(), "-xdev".into()],
                require_success: false,
                stderr: true,
                timeout_secs: Some(120),
            }
        );

        // Modifiers are no-ops on other probe kinds
        assert_eq!(
            ProbeSpec::read_file("/etc/motd").with_timeout(1),
            ProbeSpec::read_file("/etc/motd")
        );
    }

    #[test]
    fn test_unavailable_has_no_text() {
        let r = ProbeResult::unavailable();
        assert!(!r.available);
        assert_eq!(r.text(), None);
        assert_eq!(ProbeResult::found("x").text(), Some("x"));
    }
}
