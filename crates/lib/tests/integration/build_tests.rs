#![cfg(unix)]

use relgraph_lib::execute::SkipReason;
use relgraph_lib::output::OutputKind;

use super::common::{TestEnv, registry, run};

#[tokio::test]
async fn builds_shared_requirement_once() {
  let env = TestEnv::new();
  let run = run(&["linux/amd64", "linux/arm64"]);
  let instances = env.plan(&registry(None), &["bundle"], &run);
  assert_eq!(instances.len(), 3);

  let report = env.orchestrator(&run).execute(&instances).await.unwrap();

  assert!(report.is_success(), "{:?}", report.first_error());
  assert_eq!(report.built.len(), 3);
  assert!(report.cached.is_empty());

  let mut names: Vec<&str> = report.requested().map(|b| b.name.as_str()).collect();
  names.sort();
  assert_eq!(
    names,
    vec!["demo_v2.0.0_1_linux_amd64.txt", "demo_v2.0.0_1_linux_arm64.txt"]
  );

  let notes = env.store.directory("demo_v2.0.0_1_any_any.notes").unwrap();
  assert!(notes.0.join("README").is_file());

  let arm = env.store.file("demo_v2.0.0_1_linux_arm64.txt").unwrap();
  assert_eq!(
    std::fs::read_to_string(&arm.0).unwrap(),
    "release v2.0.0 for linux/arm64"
  );
}

#[tokio::test]
async fn second_run_over_the_same_store_is_cached() {
  let env = TestEnv::new();
  let run = run(&["linux/amd64"]);
  let registry = registry(None);
  let instances = env.plan(&registry, &["bundle"], &run);

  let first = env.orchestrator(&run).execute(&instances).await.unwrap();
  assert_eq!(first.built.len(), 2);

  let second = env.orchestrator(&run).execute(&instances).await.unwrap();
  assert!(second.built.is_empty());
  assert_eq!(second.cached.len(), 2);
  assert_eq!(
    second.requested().next().map(|b| b.output.kind()),
    Some(OutputKind::File)
  );
}

#[tokio::test]
async fn failing_platform_does_not_stop_the_others() {
  let env = TestEnv::new();
  let run = run(&["linux/amd64", "darwin/arm64"]);
  let instances = env.plan(&registry(Some("darwin")), &["bundle"], &run);

  let report = env.orchestrator(&run).execute(&instances).await.unwrap();

  assert!(!report.is_success());
  assert_eq!(report.failed.len(), 1);
  assert!(report.failed[0].error.to_string().contains("exit code"));
  assert_eq!(report.requested().count(), 1);
  assert!(env.store.exists("demo_v2.0.0_1_linux_amd64.txt"));
  assert!(!env.store.exists("demo_v2.0.0_1_darwin_arm64.txt"));
}

#[tokio::test]
async fn missing_version_fails_every_instance() {
  let env = TestEnv::new();
  let run = relgraph_lib::config::RunOptions::default().with_targets(vec!["linux/amd64".parse().unwrap()]);
  let instances = env.plan(&registry(None), &["bundle"], &run);

  let report = env.orchestrator(&run).execute(&instances).await.unwrap();

  assert_eq!(report.failed.len(), 1);
  assert!(report.failed[0].error.to_string().contains("version is not set"));
  assert!(matches!(report.skipped[0].1, SkipReason::FailedDependency(_)));
}
