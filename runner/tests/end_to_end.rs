use clap::Parser;
use engine::CancelCause;
use runner::Options;
use std::fs;
use std::path::Path;

const CONFIG: &str = r#"
type1:
  databases: [db_type1_1, db_type1_2, db_type1_3]
  concurrency: 2
  iterations: 2
  queries:
    - select 1
    - select pg_sleep(0.01)
type2:
  databases: [db_type2_1]
  concurrency: 1
  iterations: 1
  queries: [select now()]
"#;

// Nothing listens on port 1, so every connection attempt is refused.
fn options(config: &Path, extra: &[&str]) -> Options {
    let mut args = vec![
        "concurrent-query",
        "-u",
        "tester",
        "-p",
        "secret",
        "-c",
        config.to_str().unwrap(),
        "-P",
        "1",
    ];
    args.extend_from_slice(extra);
    Options::parse_from(args)
}

#[tokio::test]
async fn test_single_pass_reports_every_connection_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, CONFIG).unwrap();

    let report = runner::run(&options(&path, &["--dontcycle"])).await.unwrap();

    assert_eq!(report.cause, CancelCause::AllGroupsComplete);
    assert_eq!(report.errors, 4);
    assert_eq!(report.results, 0);
    assert_eq!(report.groups_completed, 2);
}

#[tokio::test]
async fn test_run_leaves_no_tasks_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, CONFIG).unwrap();
    let metrics = tokio::runtime::Handle::current().metrics();
    let before = metrics.num_alive_tasks();

    runner::run(&options(&path, &["--dontcycle"])).await.unwrap();

    assert_eq!(metrics.num_alive_tasks(), before);
}

#[tokio::test]
async fn test_errexit_stops_on_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, CONFIG).unwrap();

    let report = runner::run(&options(&path, &["-e", "-d", "30"])).await.unwrap();

    assert_eq!(report.cause, CancelCause::FirstError);
    assert!(report.errors >= 1);
    assert_eq!(report.results, 0);
}

#[tokio::test]
async fn test_invalid_configuration_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "broken:\n  databases: [a]\n  concurrency: 2\n  iterations: 1\n  queries: [select 1]\n").unwrap();

    let err = runner::run(&options(&path, &[])).await.unwrap_err();
    assert!(format!("{err:#}").contains("broken"));

    let missing = dir.path().join("missing.yaml");
    assert!(runner::run(&options(&missing, &[])).await.is_err());
}
