//! Evidence probes against the local system

use async_trait::async_trait;
use posture_core::{ProbeError, ProbeResult, ProbeSpec};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Runs probes; implemented by the live system and by scripted test doubles
#[async_trait]
pub trait Prober: Send + Sync {
    /// Perform one inspection
    ///
    /// Missing things are `Ok(ProbeResult::unavailable())`. `Err` is reserved
    /// for broken inspection machinery.
    async fn run(&self, spec: &ProbeSpec) -> Result<ProbeResult, ProbeError>;
}

/// Prober backed by the real filesystem, process table and systemd
#[derive(Debug, Clone)]
pub struct SystemProber {
    /// Default timeout for spawned commands
    timeout: Duration,
}

impl Default for SystemProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl SystemProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn read_file(&self, path: &str) -> Result<ProbeResult, ProbeError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(ProbeResult::found(String::from_utf8_lossy(&bytes))),
            Err(e) if is_absent(&e) => {
                trace!("{} unavailable: {}", path, e);
                Ok(ProbeResult::unavailable())
            }
            Err(e) => Err(ProbeError::Io {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    async fn read_dir(&self, path: &str) -> Result<ProbeResult, ProbeError> {
        let mut dir = match tokio::fs::read_dir(path).await {
            Ok(dir) => dir,
            Err(e) if is_absent(&e) => return Ok(ProbeResult::unavailable()),
            Err(e) => {
                return Err(ProbeError::Io {
                    path: path.to_string(),
                    source: e,
                })
            }
        };

        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| ProbeError::Io {
            path: path.to_string(),
            source: e,
        })? {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                files.push(entry.path());
            }
        }
        files.sort();

        let mut text = String::new();
        for file in files {
            // Individual unreadable files are skipped
            if let Ok(bytes) = tokio::fs::read(&file).await {
                text.push_str(&String::from_utf8_lossy(&bytes));
                if !text.ends_with('\n') {
                    text.push('\n');
                }
            }
        }
        Ok(ProbeResult::found(text))
    }

    #[cfg(unix)]
    async fn file_mode(&self, path: &str) -> Result<ProbeResult, ProbeError> {
        use std::os::unix::fs::MetadataExt;

        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(ProbeResult::found(format!(
                "{:o} {} {}",
                meta.mode() & 0o7777,
                meta.uid(),
                meta.gid()
            ))),
            Err(e) if is_absent(&e) => Ok(ProbeResult::unavailable()),
            Err(e) => Err(ProbeError::Io {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    #[cfg(not(unix))]
    async fn file_mode(&self, _path: &str) -> Result<ProbeResult, ProbeError> {
        Ok(ProbeResult::unavailable())
    }

    async fn command(
        &self,
        program: &str,
        args: &[String],
        require_success: bool,
        with_stderr: bool,
        timeout_secs: Option<u64>,
    ) -> Result<ProbeResult, ProbeError> {
        let limit = timeout_secs.map(Duration::from_secs).unwrap_or(self.timeout);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) if is_absent(&e) => {
                debug!("{} not runnable: {}", program, e);
                return Ok(ProbeResult::unavailable());
            }
            Err(e) => {
                return Err(ProbeError::Spawn {
                    program: program.to_string(),
                    source: e,
                })
            }
        };

        // Dropping the future on timeout kills the child
        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProbeError::Io {
                    path: program.to_string(),
                    source: e,
                })
            }
            Err(_) => {
                debug!("{} timed out after {:?}", program, limit);
                return Ok(ProbeResult::unavailable());
            }
        };

        if require_success && !output.status.success() {
            trace!("{} exited with {}", program, output.status);
            return Ok(ProbeResult::unavailable());
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if with_stderr {
            text.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        Ok(ProbeResult::found(text))
    }

    async fn service(&self, unit: &str) -> Result<ProbeResult, ProbeError> {
        let args = vec![
            "show".to_string(),
            unit.to_string(),
            "--property=LoadState,ActiveState,UnitFileState".to_string(),
        ];
        let result = self.command("systemctl", &args, true, false, None).await?;

        let Some(text) = result.text() else {
            return Ok(ProbeResult::unavailable());
        };
        let load_state = text
            .lines()
            .find_map(|l| l.strip_prefix("LoadState="))
            .map(str::trim);
        match load_state {
            Some("loaded") | Some("masked") => Ok(ProbeResult::found(text.trim())),
            _ => Ok(ProbeResult::unavailable()),
        }
    }

    fn executable(&self, name: &str) -> ProbeResult {
        find_on_path(name, std::env::var_os("PATH").as_deref())
            .map(|p| ProbeResult::found(p.display().to_string()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Prober for SystemProber {
    async fn run(&self, spec: &ProbeSpec) -> Result<ProbeResult, ProbeError> {
        match spec {
            ProbeSpec::ReadFile { path } => self.read_file(path).await,
            ProbeSpec::ReadDir { path } => self.read_dir(path).await,
            ProbeSpec::FileMode { path } => self.file_mode(path).await,
            ProbeSpec::Command {
                program,
                args,
                require_success,
                stderr,
                timeout_secs,
            } => {
                self.command(program, args, *require_success, *stderr, *timeout_secs)
                    .await
            }
            ProbeSpec::Service { unit } => self.service(unit).await,
            ProbeSpec::Executable { name } => Ok(self.executable(name)),
        }
    }
}

/// Conditions that mean "not there" rather than "inspection broken"
fn is_absent(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied)
        // ENOTDIR / EISDIR
        || matches!(e.raw_os_error(), Some(20) | Some(21))
}

/// Locate an executable file in the given PATH value
pub fn find_on_path(name: &str, path_var: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    if name.contains('/') {
        let candidate = Path::new(name);
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    std::env::split_paths(path_var?)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_file_missing_is_unavailable() {
        let prober = SystemProber::default();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.conf");

        let result = prober
            .run(&ProbeSpec::read_file(path.display().to_string()))
            .await
            .unwrap();
        assert!(!result.available);
        assert_eq!(result.text, "");
    }

    #[tokio::test]
    async fn test_read_file_and_dir() {
        let prober = SystemProber::default();
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.conf"), "second").unwrap();
        std::fs::write(tmp.path().join("a.conf"), "first\n").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();

        let file = prober
            .run(&ProbeSpec::read_file(tmp.path().join("a.conf").display().to_string()))
            .await
            .unwrap();
        assert_eq!(file.text(), Some("first\n"));

        let dir = prober
            .run(&ProbeSpec::read_dir(tmp.path().display().to_string()))
            .await
            .unwrap();
        assert_eq!(dir.text(), Some("first\nsecond\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let prober = SystemProber::default();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("secret");
        std::fs::write(&path, "x").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        let result = prober
            .run(&ProbeSpec::file_mode(path.display().to_string()))
            .await
            .unwrap();
        let text = result.text().unwrap();
        assert!(text.starts_with("640 "), "got {}", text);
        assert_eq!(text.split_whitespace().count(), 3);
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let prober = SystemProber::default();
        let result = prober
            .run(&ProbeSpec::command("posture-no-such-binary", ["--version"]))
            .await
            .unwrap();
        assert!(!result.available);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_output_and_exit_status() {
        let prober = SystemProber::default();

        let ok = prober
            .run(&ProbeSpec::command("sh", ["-c", "echo out; echo err >&2"]).with_stderr())
            .await
            .unwrap();
        assert_eq!(ok.text(), Some("out\nerr\n"));

        let failing = ProbeSpec::command("sh", ["-c", "echo partial; exit 3"]);
        let lenient = prober.run(&failing).await.unwrap();
        assert_eq!(lenient.text(), Some("partial\n"));

        let strict = prober.run(&failing.require_success()).await.unwrap();
        assert!(!strict.available);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_timeout_is_unavailable() {
        let prober = SystemProber::new(Duration::from_millis(200));
        let started = std::time::Instant::now();

        let result = prober
            .run(&ProbeSpec::command("sleep", ["5"]))
            .await
            .unwrap();
        assert!(!result.available);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_find_on_path() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let tool = tmp.path().join("rpm");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(tmp.path().join("apk"), "not executable").unwrap();

        let path_var = std::env::join_paths([tmp.path()]).unwrap();
        assert_eq!(find_on_path("rpm", Some(path_var.as_os_str())), Some(tool));
        assert_eq!(find_on_path("apk", Some(path_var.as_os_str())), None);
        assert_eq!(find_on_path("dpkg-query", None), None);
    }
}
