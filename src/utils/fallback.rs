// src/utils/fallback.rs: try-then-recover execution of alternative strategies

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info, warn};

use crate::utils::task::{is_empty_or_missing, Action, FailureReason, Outcome, Report};


/// One alternative of a [`FallbackPlan`].
#[derive(Debug, Clone)]
pub enum Candidate {
    /// A single action.
    Attempt(Action),
    /// Actions that must all succeed, in order. The first failing member
    /// aborts the group.
    Group(Vec<Action>),
}

impl Candidate {
    fn describe(&self) -> String {
        match self {
            Candidate::Attempt(action) => action.describe().to_string(),
            Candidate::Group(actions) => actions
                .iter()
                .map(|a| a.describe())
                .collect::<Vec<&str>>()
                .join(" && "),
        }
    }

    async fn execute(&self) -> Outcome {
        match self {
            Candidate::Attempt(action) => action.execute().await,
            Candidate::Group(actions) => {
                let mut last = Outcome::Failure(FailureReason::Other("empty group".to_string()));
                for action in actions {
                    last = action.execute().await;
                    if !last.is_success() {
                        return last;
                    }
                }
                last
            }
        }
    }
}


pub type ConditionFn = Arc<dyn Fn(Report) -> BoxFuture<'static, bool> + Send + Sync>;

/// Extra predicate evaluated after a candidate reports success.
/// Returning `true` marks the candidate as failed anyway.
#[derive(Clone)]
pub struct FailureCondition {
    pub description: String,
    check: ConditionFn,
}

impl fmt::Debug for FailureCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureCondition")
            .field("description", &self.description)
            .finish()
    }
}

impl FailureCondition {
    pub fn new<F, Fut>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(Report) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        FailureCondition {
            description: description.into(),
            check: Arc::new(move |report| check(report).boxed()),
        }
    }

    /// Fails when `path` is missing or zero bytes once the candidate finished.
    pub fn empty_output(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let description = format!("{} is empty or missing", path.display());
        FailureCondition::new(description, move |_report| {
            let path = path.clone();
            async move { is_empty_or_missing(&path).await }
        })
    }

    pub async fn holds(&self, report: &Report) -> bool {
        (self.check)(report.clone()).await
    }
}


/// Ordered list of alternative strategies plus the extra conditions that
/// every candidate's success must survive.
///
/// Candidates are awaited strictly one after the other. The first accepted
/// candidate ends the run; later ones are never executed.
#[derive(Debug, Clone, Default)]
pub struct FallbackPlan {
    candidates: Vec<Candidate>,
    conditions: Vec<FailureCondition>,
}

impl FallbackPlan {
    pub fn new() -> Self {
        FallbackPlan::default()
    }

    pub fn attempt(mut self, action: Action) -> Self {
        self.candidates.push(Candidate::Attempt(action));
        self
    }

    pub fn group(mut self, actions: Vec<Action>) -> Self {
        self.candidates.push(Candidate::Group(actions));
        self
    }

    pub fn fail_if(mut self, condition: FailureCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn conditions(&self) -> &[FailureCondition] {
        &self.conditions
    }

    /// Executes the candidates in order until one is accepted.
    ///
    /// A candidate is accepted when it reports success and none of the
    /// extra conditions hold for its report.
    ///
    /// # Returns
    /// The accepted candidate's outcome, or `FailureReason::Exhausted`
    /// carrying the last rejection when every candidate was rejected.
    pub async fn run(&self) -> Outcome {
        let mut last_reason = FailureReason::Other("no fallback candidates given".to_string());

        for (index, candidate) in self.candidates.iter().enumerate() {
            debug!("Fallback candidate {}: {}", index + 1, candidate.describe());
            let reason = match candidate.execute().await {
                Outcome::Success(report) => match self.first_failing_condition(&report).await {
                    None => {
                        if index > 0 {
                            info!("Recovered with fallback candidate {}: {}", index + 1, candidate.describe());
                        }
                        return Outcome::Success(report);
                    }
                    Some(condition) => FailureReason::Rejected {
                        label: report.label,
                        condition,
                    },
                },
                Outcome::Failure(reason) => reason,
            };
            warn!("Fallback candidate {} rejected: {}", index + 1, reason);
            last_reason = reason;
        }

        Outcome::Failure(FailureReason::Exhausted {
            attempts: self.candidates.len(),
            last: Box::new(last_reason),
        })
    }

    async fn first_failing_condition(&self, report: &Report) -> Option<String> {
        for condition in &self.conditions {
            if condition.holds(report).await {
                return Some(condition.description.clone());
            }
        }
        None
    }

    /// Embeds the whole plan in a task as one callable action.
    pub fn into_action(self, label: impl Into<String>) -> Action {
        let plan = Arc::new(self);
        Action::callable(label, move || {
            let plan = Arc::clone(&plan);
            async move { plan.run().await }
        })
    }
}
