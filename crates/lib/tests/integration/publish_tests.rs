#![cfg(unix)]

use relgraph_lib::publish::{PublishConfig, Publisher, publish_jobs};

use super::common::{TestEnv, registry, run};

#[tokio::test]
async fn publishes_requested_outputs_with_checksums() {
  let env = TestEnv::new();
  let run = run(&["linux/amd64", "linux/arm64"]);
  let instances = env.plan(&registry(None), &["bundle"], &run);
  let report = env.orchestrator(&run).execute(&instances).await.unwrap();
  assert!(report.is_success());

  let dist = env.temp.path().join("dist");
  let jobs = publish_jobs(&instances, &report, &dist.display().to_string());
  assert_eq!(jobs.len(), 2, "intermediate outputs are not published");

  let published = Publisher::new(PublishConfig { parallelism: 2 }).publish(jobs).await;

  assert!(published.is_success(), "{:?}", published.first_error());
  for name in ["demo_v2.0.0_1_linux_amd64.txt", "demo_v2.0.0_1_linux_arm64.txt"] {
    assert!(dist.join(name).is_file());
    let sidecar = std::fs::read_to_string(dist.join(format!("{}.sha256", name))).unwrap();
    assert!(sidecar.contains(name));
  }
  assert!(!dist.join("demo_v2.0.0_1_any_any.notes").exists());
}

#[tokio::test]
async fn unsupported_destination_is_reported_per_job() {
  let env = TestEnv::new();
  let run = run(&["linux/amd64"]);
  let instances = env.plan(&registry(None), &["bundle"], &run);
  let report = env.orchestrator(&run).execute(&instances).await.unwrap();

  let jobs = publish_jobs(&instances, &report, "s3://bucket/releases");
  let published = Publisher::new(PublishConfig { parallelism: 1 }).publish(jobs).await;

  assert!(!published.is_success());
  let failure = published.first_error().unwrap();
  assert_eq!(failure.name, "demo_v2.0.0_1_linux_amd64.txt");
  assert!(failure.error.to_string().contains("s3://"));
}
