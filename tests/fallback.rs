use std::fs;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tempfile::tempdir;

use seqtoid_workflows::utils::fallback::{FailureCondition, FallbackPlan};
use seqtoid_workflows::utils::task::{skip_if_empty, Action, FailureReason, Outcome, Task};


fn recording(log: &Arc<Mutex<Vec<String>>>, name: &str, succeed: bool) -> Action {
    let log = Arc::clone(log);
    let name = name.to_string();
    Action::callable(name.clone(), move || {
        let log = Arc::clone(&log);
        let name = name.clone();
        async move {
            log.lock().unwrap().push(name.clone());
            if succeed {
                Outcome::success(name)
            } else {
                Outcome::failure(format!("{} failed", name))
            }
        }
    })
}


#[tokio::test]
async fn test_task_recovers_through_fallback() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("out").join("otu_table.biom");

    let plan = FallbackPlan::new()
        .attempt(Action::shell("false"))
        .attempt(Action::shell(format!(": > {}", output.display())))
        .attempt(Action::shell(format!("printf 'table' > {}", output.display())))
        .fail_if(FailureCondition::empty_output(&output));
    let task = Task::new("pick_otus")
        .action(plan.into_action("pick_otus with fallbacks"))
        .target(&output)
        .prepare_target_dirs();

    assert!(task.run().await.is_success());
    assert_eq!(fs::read_to_string(&output)?, "table");
    Ok(())
}

#[tokio::test]
async fn test_candidates_run_one_after_another() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let plan = FallbackPlan::new()
        .group(vec![recording(&log, "revcomp_map", true), recording(&log, "rerun", false)])
        .attempt(recording(&log, "cp", false))
        .attempt(recording(&log, "last", true));

    assert!(plan.run().await.is_success());
    assert_eq!(*log.lock().unwrap(), vec!["revcomp_map", "rerun", "cp", "last"]);
}

#[tokio::test]
async fn test_exhausted_plan_fails_the_task() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let after = recording(&log, "after", true);
    let task = Task::new("doomed")
        .action(
            FallbackPlan::new()
                .attempt(Action::shell("exit 2"))
                .attempt(recording(&log, "second", false))
                .into_action("doomed"),
        )
        .action(after);

    match task.run().await {
        Outcome::Failure(FailureReason::Exhausted { attempts, last }) => {
            assert_eq!(attempts, 2);
            assert_eq!(*last, FailureReason::Other("second failed".to_string()));
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert_eq!(*log.lock().unwrap(), vec!["second"]);
}

#[tokio::test]
async fn test_skip_if_empty_runs_tool_on_real_input() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("reads.fastq");
    fs::write(&input, "@r1\nACGT\n+\nIIII\n")?;
    let output = dir.path().join("reads.fasta");

    let action = skip_if_empty(
        vec![input.clone()],
        vec![output.clone()],
        Action::shell(format!("cp {} {}", input.display(), output.display())),
    );
    assert!(action.execute().await.is_success());
    assert_eq!(fs::read_to_string(&output)?, "@r1\nACGT\n+\nIIII\n");
    Ok(())
}
