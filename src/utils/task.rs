// src/utils/task.rs: task descriptors and action execution

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info};
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;

use crate::config::defs::{PipelineError, EMPTY_FILE_THRESHOLD};


/// What a successful action execution reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub label: String,
    pub exit_code: Option<i32>,
}

impl Report {
    pub fn new(label: impl Into<String>) -> Self {
        Report {
            label: label.into(),
            exit_code: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    #[error("`{command}` exited with status {code:?}")]
    NonZeroExit { command: String, code: Option<i32> },

    #[error("failed to spawn `{command}`: {error}")]
    Spawn { command: String, error: String },

    #[error("{label}: {error}")]
    Io { label: String, error: String },

    #[error("{label} reported success but {condition}")]
    Rejected { label: String, condition: String },

    #[error("all {attempts} fallback candidates failed; last: {last}")]
    Exhausted { attempts: usize, last: Box<FailureReason> },

    #[error("{0}")]
    Other(String),
}

/// Tagged result of executing one action, group or fallback plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Report),
    Failure(FailureReason),
}

impl Outcome {
    pub fn success(label: impl Into<String>) -> Self {
        Outcome::Success(Report::new(label))
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Outcome::Failure(FailureReason::Other(reason.into()))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

pub type ActionFn = Arc<dyn Fn() -> BoxFuture<'static, Outcome> + Send + Sync>;

/// In-process step: a labelled closure producing an [`Outcome`].
#[derive(Clone)]
pub struct Callable {
    pub label: String,
    func: ActionFn,
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable").field("label", &self.label).finish()
    }
}

/// One execution step of a task.
#[derive(Debug, Clone)]
pub enum Action {
    Shell { command: String, verbose: bool },
    Callable(Callable),
}

impl Action {
    pub fn shell(command: impl Into<String>) -> Self {
        Action::Shell {
            command: command.into(),
            verbose: false,
        }
    }

    /// Shell command whose command line is logged at `info` when it runs.
    pub fn shell_verbose(command: impl Into<String>, verbose: bool) -> Self {
        Action::Shell {
            command: command.into(),
            verbose,
        }
    }

    pub fn callable<F, Fut>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        Action::Callable(Callable {
            label: label.into(),
            func: Arc::new(move || func().boxed()),
        })
    }

    /// Callable running synchronous file work on the blocking pool.
    /// An `Err` becomes a failed outcome.
    pub fn blocking<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Result<(), PipelineError> + Send + Sync + 'static,
    {
        let label = label.into();
        let func = Arc::new(func);
        Action::callable(label.clone(), move || {
            let func = Arc::clone(&func);
            let label = label.clone();
            async move {
                match tokio::task::spawn_blocking(move || func()).await {
                    Ok(Ok(())) => Outcome::success(label),
                    Ok(Err(e)) => Outcome::Failure(FailureReason::Io {
                        label,
                        error: e.to_string(),
                    }),
                    Err(e) => Outcome::Failure(FailureReason::Other(format!("{}: {}", label, e))),
                }
            }
        })
    }

    /// Human-readable form: the command line, or the callable's label.
    pub fn describe(&self) -> &str {
        match self {
            Action::Shell { command, .. } => command,
            Action::Callable(callable) => &callable.label,
        }
    }

    pub async fn execute(&self) -> Outcome {
        match self {
            Action::Shell { command, verbose } => run_shell(command, *verbose).await,
            Action::Callable(callable) => (callable.func)().await,
        }
    }
}


/// Runs `command` through `sh -c`; success iff the exit status is zero.
async fn run_shell(command: &str, verbose: bool) -> Outcome {
    if verbose {
        info!("{}", command);
    } else {
        debug!("{}", command);
    }

    match Command::new("sh").arg("-c").arg(command).status().await {
        Ok(status) if status.success() => Outcome::Success(Report {
            label: command.to_string(),
            exit_code: status.code(),
        }),
        Ok(status) => Outcome::Failure(FailureReason::NonZeroExit {
            command: command.to_string(),
            code: status.code(),
        }),
        Err(e) => Outcome::Failure(FailureReason::Spawn {
            command: command.to_string(),
            error: e.to_string(),
        }),
    }
}


/// Unit of work handed to the external scheduler.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub actions: Vec<Action>,
    pub file_dep: Vec<PathBuf>,
    pub targets: Vec<PathBuf>,
}

/// Serialisable view of a [`Task`]; callables appear by label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskManifest {
    pub name: String,
    pub actions: Vec<String>,
    pub file_dep: Vec<PathBuf>,
    pub targets: Vec<PathBuf>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Task {
            name: name.into(),
            actions: Vec::new(),
            file_dep: Vec::new(),
            targets: Vec::new(),
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    pub fn file_dep(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_dep.push(path.into());
        self
    }

    pub fn file_deps<P: AsRef<Path>>(mut self, paths: &[P]) -> Self {
        self.file_dep.extend(paths.iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    pub fn target(mut self, path: impl Into<PathBuf>) -> Self {
        self.targets.push(path.into());
        self
    }

    pub fn targets<P: AsRef<Path>>(mut self, paths: &[P]) -> Self {
        self.targets.extend(paths.iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    /// Prepends an action creating the parent directory of every target.
    /// Directories are only made when the task runs, never while the graph
    /// is being built.
    pub fn prepare_target_dirs(self) -> Self {
        let parents: Vec<PathBuf> = self
            .targets
            .iter()
            .filter_map(|t| t.parent())
            .map(Path::to_path_buf)
            .collect();
        self.prepare_dirs(&parents)
    }

    /// Prepends an action creating every directory in `paths`.
    pub fn prepare_dirs<P: AsRef<Path>>(mut self, paths: &[P]) -> Self {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for dir in paths.iter().map(AsRef::as_ref) {
            if !dir.as_os_str().is_empty() && !dirs.iter().any(|d| d == dir) {
                dirs.push(dir.to_path_buf());
            }
        }
        if dirs.is_empty() {
            return self;
        }

        let label = format!(
            "mkdir -p {}",
            dirs.iter().map(|d| d.display().to_string()).collect::<Vec<_>>().join(" ")
        );
        let mkdir = Action::callable(label.clone(), move || {
            let dirs = dirs.clone();
            let label = label.clone();
            async move {
                for dir in &dirs {
                    if let Err(e) = tokio::fs::create_dir_all(dir).await {
                        return Outcome::Failure(FailureReason::Io {
                            label: label.clone(),
                            error: e.to_string(),
                        });
                    }
                }
                Outcome::success(label)
            }
        });
        self.actions.insert(0, mkdir);
        self
    }

    pub fn manifest(&self) -> TaskManifest {
        TaskManifest {
            name: self.name.clone(),
            actions: self.actions.iter().map(|a| a.describe().to_string()).collect(),
            file_dep: self.file_dep.clone(),
            targets: self.targets.clone(),
        }
    }

    /// Executes every action in order, stopping at the first failure.
    pub async fn run(&self) -> Outcome {
        let mut last = Outcome::success(self.name.clone());
        for action in &self.actions {
            last = action.execute().await;
            if let Outcome::Failure(_) = last {
                return last;
            }
        }
        last
    }
}


/// True when `path` is missing or smaller than the empty-file threshold.
pub async fn is_empty_or_missing(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len() < EMPTY_FILE_THRESHOLD,
        Err(_) => true,
    }
}

/// Creates (or truncates) every path as an empty file.
pub async fn touch_all(paths: &[PathBuf]) -> Result<(), std::io::Error> {
    for path in paths {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::File::create(path).await?;
    }
    Ok(())
}

/// Wraps `inner` so that, when any dependency exists but is empty, the
/// external binary is skipped and every target is created as an empty
/// placeholder instead.
///
/// # Arguments
///
/// * `deps` - Inputs inspected when the action runs.
/// * `targets` - Outputs to create empty on skip.
/// * `inner` - The real work.
///
/// # Returns
/// Action performing the check at execution time.
pub fn skip_if_empty(deps: Vec<PathBuf>, targets: Vec<PathBuf>, inner: Action) -> Action {
    let label = format!("skip_if_empty({})", inner.describe());
    Action::callable(label.clone(), move || {
        let deps = deps.clone();
        let targets = targets.clone();
        let inner = inner.clone();
        let label = label.clone();
        async move {
            let mut empty_dep = None;
            for dep in &deps {
                if let Ok(meta) = tokio::fs::metadata(dep).await {
                    if meta.len() < EMPTY_FILE_THRESHOLD {
                        empty_dep = Some(dep.clone());
                        break;
                    }
                }
            }
            match empty_dep {
                Some(dep) => {
                    info!("{} is empty; writing empty targets instead of running the tool", dep.display());
                    match touch_all(&targets).await {
                        Ok(()) => Outcome::success(label),
                        Err(e) => Outcome::Failure(FailureReason::Io {
                            label,
                            error: e.to_string(),
                        }),
                    }
                }
                None => inner.execute().await,
            }
        }
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_shell_exit_codes() {
        assert!(Action::shell("true").execute().await.is_success());
        match Action::shell("exit 3").execute().await {
            Outcome::Failure(FailureReason::NonZeroExit { code, .. }) => assert_eq!(code, Some(3)),
            other => panic!("expected non-zero exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_task_run_stops_at_first_failure() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("never");
        let task = Task::new("stops")
            .action(Action::shell("false"))
            .action(Action::shell(format!("touch {}", marker.display())));
        assert!(!task.run().await.is_success());
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_skip_if_empty_touches_targets() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.fastq");
        fs::write(&input, b"").unwrap();
        let out = dir.path().join("nested").join("out.fasta");
        let sentinel = dir.path().join("binary_ran");

        let action = skip_if_empty(
            vec![input.clone()],
            vec![out.clone()],
            Action::shell(format!("touch {}", sentinel.display())),
        );
        assert!(action.execute().await.is_success());
        assert_eq!(fs::metadata(&out).unwrap().len(), 0);
        assert!(!sentinel.exists());
    }

    #[tokio::test]
    async fn test_skip_if_empty_runs_inner_on_data() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.fastq");
        fs::write(&input, b"@r1\nACGT\n+\nIIII\n").unwrap();
        let sentinel = dir.path().join("binary_ran");

        let action = skip_if_empty(
            vec![input],
            vec![dir.path().join("out.fasta")],
            Action::shell(format!("touch {}", sentinel.display())),
        );
        assert!(action.execute().await.is_success());
        assert!(sentinel.exists());
    }

    #[tokio::test]
    async fn test_prepare_target_dirs() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a").join("b").join("out.txt");
        let task = Task::new("mkdir")
            .target(&target)
            .action(Action::shell(format!("printf x > {}", target.display())))
            .prepare_target_dirs();
        assert_eq!(task.actions.len(), 2);
        assert!(task.run().await.is_success());
        assert!(target.exists());
    }

    #[test]
    fn test_manifest_labels_callables() {
        let task = Task::new("t")
            .action(Action::shell("echo hi"))
            .action(Action::callable("write map", || async { Outcome::success("ok") }))
            .file_dep("in.txt")
            .target("out.txt");
        let manifest = task.manifest();
        assert_eq!(manifest.actions, vec!["echo hi".to_string(), "write map".to_string()]);
        assert_eq!(manifest.targets, vec![PathBuf::from("out.txt")]);
    }
}
