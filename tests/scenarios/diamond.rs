//! Test: Diamond and fan-out graphs - every task runs exactly once, after its dependencies

use crate::helpers::*;
use sluice::core::Task;
use sluice::Pipeline;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_diamond_runs_join_once_after_both_branches() {
    let harness = Harness::with_pause(0, Duration::from_millis(20));
    let pipeline = Pipeline::new("diamond")
        .with_task("a", Task::new("record"))
        .with_task("b", Task::new("record").with_dependencies(["a"]))
        .with_task("c", Task::new("record").with_dependencies(["a"]))
        .with_task("d", Task::new("record").with_dependencies(["b", "c"]));

    let report = harness.run(&pipeline).await.unwrap();

    assert_run_complete(&report);
    assert_eq!(report.completed, 4);
    assert_eq!(report.succeeded(), 4);

    let journal = &harness.journal;
    for task in ["a", "b", "c", "d"] {
        assert_eq!(journal.count(&format!("start:{}", task)), 1, "{} started twice", task);
    }
    assert!(journal.position("finish:a") < journal.position("start:b"));
    assert!(journal.position("finish:a") < journal.position("start:c"));
    assert!(journal.position("finish:b") < journal.position("start:d"));
    assert!(journal.position("finish:c") < journal.position("start:d"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wide_fan_out_completes_every_task() {
    let harness = Harness::new(0);
    let mut pipeline = Pipeline::new("fan").with_task("root", Task::new("record"));
    let leaves: Vec<String> = (0..32).map(|i| format!("leaf{:02}", i)).collect();
    for leaf in &leaves {
        pipeline = pipeline.with_task(leaf.as_str(), Task::new("record").with_dependencies(["root"]));
    }
    pipeline = pipeline.with_task("join", Task::new("record").with_dependencies(leaves.clone()));

    let report = harness.run(&pipeline).await.unwrap();

    assert_run_complete(&report);
    assert_eq!(report.total, 34);
    assert_eq!(harness.journal.count("start:join"), 1);
    for leaf in &leaves {
        assert_eq!(harness.journal.count(&format!("start:{}", leaf)), 1);
        assert!(harness.journal.position(&format!("finish:{}", leaf)) < harness.journal.position("start:join"));
    }
}

#[tokio::test]
async fn test_duplicate_dependencies_do_not_block() {
    let harness = Harness::new(0);
    let pipeline = Pipeline::new("dups")
        .with_task("a", Task::new("record"))
        .with_task("b", Task::new("record").with_dependencies(["a", "a"]));

    let report = harness.run(&pipeline).await.unwrap();

    assert_task_succeeded(&report, "b");
    assert_eq!(harness.journal.count("start:b"), 1);
}

#[tokio::test]
async fn test_single_worker_runs_whole_graph() {
    let harness = Harness::new(0).with_workers(1);

    let pipeline = Pipeline::new("serial")
        .with_task("one", Task::new("record"))
        .with_task("two", Task::new("record").with_dependencies(["one"]))
        .with_task("three", Task::new("record").with_dependencies(["one"]));

    let report = harness.run(&pipeline).await.unwrap();
    assert_run_complete(&report);
    assert_eq!(harness.journal.entries().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_uneven_diamond_is_stable_across_runs() {
    let pipeline = Pipeline::new("uneven")
        .with_task("a", Task::new("record"))
        .with_task("b", Task::new("record").with_dependencies(["a"]))
        .with_task("c", Task::new("record"))
        .with_task("d", Task::new("record").with_dependencies(["b", "c", "b"]));

    for _ in 0..50 {
        let harness = Harness::new(0);
        let report = harness.run(&pipeline).await.unwrap();

        assert_eq!(report.completed, 4);
        assert_eq!(harness.journal.count("start:d"), 1);
        assert!(harness.journal.position("finish:b") < harness.journal.position("start:d"));
        assert!(harness.journal.position("finish:c") < harness.journal.position("start:d"));
    }
}
