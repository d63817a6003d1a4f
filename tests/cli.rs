use std::process::{Command, Output};

fn fewshot(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fewshot"))
        .args(args)
        .env_remove("FEWSHOT_CACHE_DIR")
        .env_remove("FEWSHOT_LOG")
        .output()
        .expect("failed to run fewshot")
}

#[test]
fn retrieve_succeeds_over_corrupt_redb_cache() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("cache.redb"), b"garbage").unwrap();
    let cache_dir = tmp.path().to_str().unwrap();

    let output = fewshot(&[
        "--store",
        "redb",
        "--cache-dir",
        cache_dir,
        "retrieve",
        "How many orders have been shipped?",
    ]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Counting"));
    assert!(stdout.contains("3 example(s)"));
}

#[test]
fn retrieve_succeeds_when_cache_dir_is_unusable() {
    let tmp = tempfile::tempdir().unwrap();
    let blocker = tmp.path().join("file");
    std::fs::write(&blocker, "not a directory").unwrap();
    let cache_dir = blocker.join("cache");

    let output = fewshot(&[
        "--cache-dir",
        cache_dir.to_str().unwrap(),
        "retrieve",
        "apple",
        "--json",
    ]);

    assert!(output.status.success(), "{output:?}");
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["result_count"], 3);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cache unavailable"));
}

#[test]
fn status_reports_fresh_after_rebuild() {
    let tmp = tempfile::tempdir().unwrap();
    let cache_dir = tmp.path().to_str().unwrap();

    assert!(fewshot(&["--cache-dir", cache_dir, "rebuild"]).status.success());
    let output = fewshot(&["--cache-dir", cache_dir, "status", "--json"]);

    assert!(output.status.success(), "{output:?}");
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["fresh"], true);
    assert_eq!(json["backend"], "dir");
    assert_eq!(json["exemplars"], 16);
}
