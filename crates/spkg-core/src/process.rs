//! Child process execution for build steps.
//!
//! The [`CommandRunner`] trait is the seam between the build driver and the
//! operating system. [`SystemRunner`] spawns real processes; tests substitute
//! a recording fake.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use spkg_schema::Invocation;
use wait_timeout::ChildExt;

/// Everything needed to run one build step.
#[derive(Debug, Clone, Copy)]
pub struct StepRequest<'a> {
    /// Program and arguments, placeholders already expanded.
    pub invocation: &'a Invocation,
    /// Working directory of the child.
    pub cwd: &'a Path,
    /// Extra environment variables layered over the inherited environment.
    pub env: &'a [(String, String)],
    /// Append stdout/stderr here; inherit the terminal when `None`.
    pub log_path: Option<&'a Path>,
    /// Kill the child if it runs longer than this.
    pub timeout: Option<Duration>,
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Exit status zero.
    Success,
    /// Non-zero exit, or killed by a signal (`None`).
    Exited(Option<i32>),
    /// Killed after exceeding the timeout.
    TimedOut(Duration),
    /// The program could not be found.
    Missing,
}

impl StepStatus {
    /// Whether the step succeeded.
    pub fn success(self) -> bool {
        self == Self::Success
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "succeeded"),
            Self::Exited(Some(code)) => write!(f, "exited with status {code}"),
            Self::Exited(None) => write!(f, "was terminated by a signal"),
            Self::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs()),
            Self::Missing => write!(f, "could not be started (program not found)"),
        }
    }
}

/// Runs build steps.
pub trait CommandRunner {
    /// Run one step to completion.
    ///
    /// # Errors
    ///
    /// Returns an IO error only for failures of the runner itself (log file
    /// cannot be opened, wait fails). A program that is missing or exits
    /// non-zero is reported through [`StepStatus`].
    fn run(&self, request: &StepRequest<'_>) -> io::Result<StepStatus>;
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, request: &StepRequest<'_>) -> io::Result<StepStatus> {
        tracing::debug!(
            "Running `{}` in {}",
            request.invocation,
            request.cwd.display()
        );

        let mut cmd = Command::new(&request.invocation.program);
        cmd.args(&request.invocation.args)
            .current_dir(request.cwd)
            .stdin(Stdio::null());
        // A timed step gets its own group so the timeout can take down the
        // whole build tree. Untimed steps stay in ours and still see Ctrl-C.
        #[cfg(unix)]
        if request.timeout.is_some() {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        for (key, value) in request.env {
            cmd.env(key, value);
        }

        if let Some(log_path) = request.log_path {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut log = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;
            writeln!(log, "$ {}", request.invocation)?;
            cmd.stdout(Stdio::from(log.try_clone()?))
                .stderr(Stdio::from(log));
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StepStatus::Missing),
            Err(e) => return Err(e),
        };

        let status = match request.timeout {
            Some(limit) => {
                if let Some(status) = child.wait_timeout(limit)? {
                    status
                } else {
                    tracing::warn!("`{}` exceeded {}s, killing", request.invocation, limit.as_secs());
                    kill_step(&mut child)?;
                    child.wait()?;
                    return Ok(StepStatus::TimedOut(limit));
                }
            }
            None => child.wait()?,
        };

        if status.success() {
            Ok(StepStatus::Success)
        } else {
            Ok(StepStatus::Exited(status.code()))
        }
    }
}

/// Kill a step and everything it spawned.
#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_step(child: &mut Child) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: killpg takes plain integers; the group was created at spawn.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
fn kill_step(child: &mut Child) -> io::Result<()> {
    match child.kill() {
        Err(e) if e.kind() != io::ErrorKind::InvalidInput => Err(e),
        _ => Ok(()),
    }
}

/// Read the last N lines from a file efficiently.
///
/// Instead of loading the entire file, we seek to near the end and read a fixed-size
/// tail buffer. This prevents OOM on large build logs (e.g., compiling LLVM).
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_last_lines(path: &Path, n: usize) -> io::Result<String> {
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};

    // Read at most 16KB from the end (enough for ~400 lines at 40 chars each)
    const TAIL_SIZE: u64 = 16 * 1024;

    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let seek_pos = file_len.saturating_sub(TAIL_SIZE);
    file.seek(SeekFrom::Start(seek_pos))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let buffer = String::from_utf8_lossy(&bytes);

    // If we seeked mid-file, skip the first (partial) line in-place
    let content = if seek_pos > 0 {
        buffer
            .find('\n')
            .map_or(buffer.as_ref(), |idx| &buffer[idx + 1..])
    } else {
        buffer.as_ref()
    };

    // Take only the last N lines
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request<'a>(
        inv: &'a Invocation,
        cwd: &'a Path,
        log: Option<&'a Path>,
        timeout: Option<Duration>,
    ) -> StepRequest<'a> {
        StepRequest {
            invocation: inv,
            cwd,
            env: &[],
            log_path: log,
            timeout,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_captures_output_and_status() {
        let tmp = tempdir().unwrap();
        let log = tmp.path().join("logs/build.log");
        let inv = Invocation::new("sh", ["-c", "echo hello-from-step; exit 3"]);

        let status = SystemRunner
            .run(&request(&inv, tmp.path(), Some(&log), None))
            .unwrap();

        assert_eq!(status, StepStatus::Exited(Some(3)));
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("$ sh -c"));
        assert!(content.contains("hello-from-step"));
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_passes_env_and_cwd() {
        let tmp = tempdir().unwrap();
        let log = tmp.path().join("build.log");
        let inv = Invocation::new("sh", ["-c", "echo \"$PREFIX\" > out.txt"]);
        let env = vec![("PREFIX".to_string(), "/managed".to_string())];

        let status = SystemRunner
            .run(&StepRequest {
                invocation: &inv,
                cwd: tmp.path(),
                env: &env,
                log_path: Some(&log),
                timeout: None,
            })
            .unwrap();

        assert!(status.success());
        let out = std::fs::read_to_string(tmp.path().join("out.txt")).unwrap();
        assert_eq!(out.trim(), "/managed");
    }

    #[test]
    fn test_runner_reports_missing_program() {
        let tmp = tempdir().unwrap();
        let inv = Invocation::new("spkg-definitely-not-a-real-program", Vec::<String>::new());
        let status = SystemRunner
            .run(&request(&inv, tmp.path(), None, None))
            .unwrap();
        assert_eq!(status, StepStatus::Missing);
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_kills_on_timeout() {
        let tmp = tempdir().unwrap();
        let log = tmp.path().join("build.log");
        let inv = Invocation::new("sleep", ["5"]);
        let limit = Duration::from_millis(200);

        let status = SystemRunner
            .run(&request(&inv, tmp.path(), Some(&log), Some(limit)))
            .unwrap();
        assert_eq!(status, StepStatus::TimedOut(limit));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_background_children() {
        let tmp = tempdir().unwrap();
        let log = tmp.path().join("build.log");
        let inv = Invocation::new("sh", ["-c", "(sleep 1; touch late-marker) & wait"]);
        let limit = Duration::from_millis(200);

        let status = SystemRunner
            .run(&request(&inv, tmp.path(), Some(&log), Some(limit)))
            .unwrap();
        assert_eq!(status, StepStatus::TimedOut(limit));

        std::thread::sleep(Duration::from_millis(1500));
        assert!(!tmp.path().join("late-marker").exists());
    }

    #[test]
    fn test_read_last_lines() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("log");
        let content: String = (1..=50).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&path, content).unwrap();

        let tail = read_last_lines(&path, 3).unwrap();
        assert_eq!(tail, "line 48\nline 49\nline 50");
    }
}
