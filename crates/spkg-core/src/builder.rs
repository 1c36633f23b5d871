//! Build driver: runs a strategy's steps in a working tree.
//!
//! Steps run one after another and the first failure stops the sequence.
//! Every step sees `PREFIX` and `JOBS` in its environment and has its
//! placeholders (`{prefix}`, `{bin}`, `{src}`, `{jobs}`, `{name}`) expanded
//! first. Output is appended to a per-build log file unless the driver is
//! verbose, in which case the child inherits the terminal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use spkg_schema::{BuildStep, Invocation};

use crate::locate::publish;
use crate::process::{CommandRunner, StepRequest, StepStatus, read_last_lines};
use crate::strategy::BuildStrategy;

/// Number of log lines kept as the failure diagnostic.
pub const DIAGNOSTIC_LINES: usize = 20;

/// Per-build inputs.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Working tree; every step runs here.
    pub tree: PathBuf,
    /// Install prefix (the managed home).
    pub prefix: PathBuf,
    /// Managed binary directory.
    pub bin_dir: PathBuf,
    /// Parallel job count.
    pub jobs: usize,
    /// Expected artifact name.
    pub name: String,
    /// Log file for step output.
    pub log_path: PathBuf,
}

/// Result of running a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Whether every step succeeded.
    pub success: bool,
    /// Artifact placed by an explicit copy step, if any.
    pub artifact: Option<PathBuf>,
    /// Failing step and the tail of its output; empty on success.
    pub diagnostic: String,
    /// Full log, when output was captured.
    pub log_path: Option<PathBuf>,
}

impl BuildOutcome {
    fn failure(diagnostic: String, log_path: Option<PathBuf>) -> Self {
        Self {
            success: false,
            artifact: None,
            diagnostic,
            log_path,
        }
    }
}

/// Executes build strategies through a [`CommandRunner`].
pub struct BuildDriver<'a> {
    runner: &'a dyn CommandRunner,
    timeout: Option<Duration>,
    verbose: bool,
}

impl<'a> BuildDriver<'a> {
    /// Create a driver with no timeout that captures output to the log.
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            timeout: None,
            verbose: false,
        }
    }

    /// Kill any single step that runs longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stream step output to the terminal instead of the log file.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run every step of `strategy` in `cx.tree`.
    ///
    /// # Errors
    ///
    /// Returns an IO error only when the runner itself breaks (log file
    /// cannot be created). Failing steps are reported in the outcome.
    pub fn run(&self, strategy: &BuildStrategy, cx: &BuildContext) -> io::Result<BuildOutcome> {
        let log_path = (!self.verbose).then(|| cx.log_path.clone());

        if !strategy.is_recognized() {
            return Ok(BuildOutcome::failure(
                format!("No recognised build system in {}", cx.tree.display()),
                None,
            ));
        }

        if let Some(log) = &log_path {
            if let Some(parent) = log.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(log, format!("# {} build of {}\n", strategy, cx.name))?;
        }

        let prefix = cx.prefix.to_string_lossy();
        let bin = cx.bin_dir.to_string_lossy();
        let src = cx.tree.to_string_lossy();
        let jobs = cx.jobs.to_string();
        let vars = [
            ("prefix", prefix.as_ref()),
            ("bin", bin.as_ref()),
            ("src", src.as_ref()),
            ("jobs", jobs.as_str()),
            ("name", cx.name.as_str()),
        ];
        let env = vec![
            ("PREFIX".to_string(), prefix.to_string()),
            ("JOBS".to_string(), jobs.clone()),
        ];

        let mut artifact = None;
        for step in strategy.steps() {
            match step {
                BuildStep::Copy { copy } => {
                    let source = cx.tree.join(&copy);
                    match publish(&source, &cx.bin_dir, &cx.name) {
                        Ok(dest) => artifact = Some(dest),
                        Err(e) => {
                            return Ok(BuildOutcome::failure(
                                format!("copy {copy}: {e}"),
                                log_path,
                            ));
                        }
                    }
                }
                BuildStep::Run(template) => {
                    let invocation = resolve_program(template.expand(&vars), &cx.tree);
                    tracing::info!("{}: {}", cx.name, invocation);
                    let status = self.runner.run(&StepRequest {
                        invocation: &invocation,
                        cwd: &cx.tree,
                        env: &env,
                        log_path: log_path.as_deref(),
                        timeout: self.timeout,
                    })?;

                    if !status.success() {
                        let diagnostic = diagnose(&invocation, status, log_path.as_deref());
                        return Ok(BuildOutcome::failure(diagnostic, log_path));
                    }
                }
            }
        }

        Ok(BuildOutcome {
            success: true,
            artifact,
            diagnostic: String::new(),
            log_path,
        })
    }
}

/// A relative program with a path separator (`./build.sh`, `tools/gen`) is
/// relative to the working tree, not to wherever spkg was started.
fn resolve_program(mut invocation: Invocation, tree: &Path) -> Invocation {
    let program = Path::new(&invocation.program);
    if program.is_relative() && invocation.program.contains('/') {
        invocation.program = tree.join(program).to_string_lossy().into_owned();
    }
    invocation
}

fn diagnose(invocation: &Invocation, status: StepStatus, log_path: Option<&Path>) -> String {
    let mut diagnostic = format!("`{invocation}` {status}");
    if let Some(log) = log_path {
        match read_last_lines(log, DIAGNOSTIC_LINES) {
            Ok(tail) if !tail.is_empty() => {
                diagnostic.push('\n');
                diagnostic.push_str(&tail);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not read {}: {e}", log.display()),
        }
    }
    diagnostic
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// Records invocations and fails the first one whose program matches.
    #[derive(Default)]
    struct FakeRunner {
        calls: RefCell<Vec<(Invocation, Vec<(String, String)>)>>,
        fail_on: Option<&'static str>,
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, request: &StepRequest<'_>) -> io::Result<StepStatus> {
            self.calls
                .borrow_mut()
                .push((request.invocation.clone(), request.env.to_vec()));
            if let Some(log) = request.log_path {
                let mut content = fs::read_to_string(log).unwrap_or_default();
                content.push_str(&format!("ran {}\n", request.invocation));
                fs::write(log, content)?;
            }
            if self.fail_on == Some(request.invocation.program.as_str()) {
                Ok(StepStatus::Exited(Some(2)))
            } else {
                Ok(StepStatus::Success)
            }
        }
    }

    impl FakeRunner {
        fn commands(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|(inv, _)| inv.to_string())
                .collect()
        }
    }

    fn context(root: &Path) -> BuildContext {
        BuildContext {
            tree: root.join("src/tool"),
            prefix: root.to_path_buf(),
            bin_dir: root.join("bin"),
            jobs: 3,
            name: "tool".to_string(),
            log_path: root.join("logs/build-tool.log"),
        }
    }

    #[test]
    fn test_cmake_steps_expand_prefix_and_jobs() {
        let tmp = tempdir().unwrap();
        let cx = context(tmp.path());
        fs::create_dir_all(&cx.tree).unwrap();
        let runner = FakeRunner::default();

        let outcome = BuildDriver::new(&runner)
            .run(&BuildStrategy::CMake, &cx)
            .unwrap();

        assert!(outcome.success);
        let commands = runner.commands();
        let prefix = tmp.path().display();
        assert_eq!(commands.len(), 3);
        assert!(commands[0].contains(&format!("-DCMAKE_INSTALL_PREFIX={prefix}")));
        assert_eq!(commands[1], "cmake --build build --parallel 3");

        let (_, env) = &runner.calls.borrow()[0];
        assert!(env.contains(&("PREFIX".to_string(), prefix.to_string())));
        assert!(env.contains(&("JOBS".to_string(), "3".to_string())));
    }

    #[test]
    fn test_first_failure_short_circuits() {
        let tmp = tempdir().unwrap();
        let cx = context(tmp.path());
        fs::create_dir_all(&cx.tree).unwrap();
        let runner = FakeRunner {
            fail_on: Some("sh"),
            ..Default::default()
        };

        let outcome = BuildDriver::new(&runner)
            .run(&BuildStrategy::Configure, &cx)
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(runner.commands().len(), 1, "make must not run");
        assert!(outcome.diagnostic.contains("exited with status 2"));
        assert!(outcome.diagnostic.contains("ran sh ./configure"));
        assert_eq!(outcome.log_path.as_deref(), Some(cx.log_path.as_path()));
    }

    #[test]
    fn test_unrecognized_fails_without_running() {
        let tmp = tempdir().unwrap();
        let cx = context(tmp.path());
        let runner = FakeRunner::default();

        let outcome = BuildDriver::new(&runner)
            .run(&BuildStrategy::Unrecognized, &cx)
            .unwrap();

        assert!(!outcome.success);
        assert!(runner.commands().is_empty());
        assert!(outcome.diagnostic.contains("No recognised build system"));
    }

    #[test]
    fn test_explicit_steps_run_verbatim_and_copy() {
        let tmp = tempdir().unwrap();
        let cx = context(tmp.path());
        fs::create_dir_all(&cx.tree).unwrap();
        fs::write(cx.tree.join("sl"), "binary").unwrap();
        let runner = FakeRunner::default();

        let strategy = BuildStrategy::Explicit(vec![
            BuildStep::run("make", ["CC=cc"]),
            BuildStep::run("./post-build", ["{bin}"]),
            BuildStep::Copy {
                copy: "sl".to_string(),
            },
        ]);
        let outcome = BuildDriver::new(&runner).run(&strategy, &cx).unwrap();

        assert!(outcome.success);
        let commands = runner.commands();
        assert_eq!(commands[0], "make CC=cc");
        assert_eq!(
            commands[1],
            format!(
                "{} {}",
                cx.tree.join("./post-build").display(),
                cx.bin_dir.display()
            )
        );
        assert_eq!(outcome.artifact, Some(cx.bin_dir.join("tool")));
        assert_eq!(fs::read_to_string(cx.bin_dir.join("tool")).unwrap(), "binary");
    }

    #[test]
    fn test_copy_of_missing_file_fails() {
        let tmp = tempdir().unwrap();
        let cx = context(tmp.path());
        fs::create_dir_all(&cx.tree).unwrap();
        let runner = FakeRunner::default();

        let strategy = BuildStrategy::Explicit(vec![BuildStep::Copy {
            copy: "out/tool".to_string(),
        }]);
        let outcome = BuildDriver::new(&runner).run(&strategy, &cx).unwrap();
        assert!(!outcome.success);
        assert!(outcome.diagnostic.starts_with("copy out/tool"));
    }

    #[test]
    fn test_verbose_skips_log_file() {
        let tmp = tempdir().unwrap();
        let cx = context(tmp.path());
        fs::create_dir_all(&cx.tree).unwrap();
        let runner = FakeRunner::default();

        let outcome = BuildDriver::new(&runner)
            .verbose(true)
            .run(&BuildStrategy::Cargo, &cx)
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.log_path.is_none());
        assert!(!cx.log_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_real_runner_builds_in_tree() {
        use crate::process::SystemRunner;

        let tmp = tempdir().unwrap();
        let cx = context(tmp.path());
        fs::create_dir_all(&cx.tree).unwrap();

        let strategy = BuildStrategy::Explicit(vec![
            BuildStep::run("sh", ["-c", "echo built > {name}.out; echo \"$JOBS\" >> {name}.out"]),
            BuildStep::Copy {
                copy: "tool.out".to_string(),
            },
        ]);
        let outcome = BuildDriver::new(&SystemRunner)
            .with_timeout(Some(Duration::from_secs(30)))
            .run(&strategy, &cx)
            .unwrap();

        assert!(outcome.success, "{}", outcome.diagnostic);
        let published = fs::read_to_string(cx.bin_dir.join("tool")).unwrap();
        assert_eq!(published, "built\n3\n");
    }
}
