use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn julia() -> Command {
    Command::cargo_bin("julia").unwrap()
}

#[test]
fn compares_all_three_schedules() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let summaries = dir.path().join("summaries");
    fs::create_dir(&logs).unwrap();
    fs::create_dir(&summaries).unwrap();

    julia()
        .args(&["--size", "100x100", "--iterations", "1000", "--chunk-height", "25"])
        .args(&["--threads", "4", "--verify"])
        .arg("--log-dir")
        .arg(&logs)
        .arg("--summary-dir")
        .arg(&summaries)
        .assert()
        .success()
        .stdout(predicate::str::contains("Schedule static finished in"))
        .stdout(predicate::str::contains("Schedule dynamic finished in"))
        .stdout(predicate::str::contains("Schedule guided finished in"))
        .stdout(predicate::str::contains("using 4 threads."))
        .stdout(predicate::str::contains("All 3 schedules produced identical rasters."));

    for policy in &["static", "dynamic", "guided"] {
        let log = fs::read_to_string(logs.join(format!("log_{}.txt", policy))).unwrap();
        assert_eq!(log.lines().count(), 5);
        assert!(log.contains("Rank 0, Rows   75-  99: "));
        let summary =
            fs::read_to_string(summaries.join(format!("summary_{}.txt", policy))).unwrap();
        assert!(summary.contains("Threads used: 4"));
        assert!(summary.contains("Processors available: "));
    }
}

#[test]
fn missing_report_directories_do_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    julia()
        .args(&["--size", "40x40", "--iterations", "100", "--chunk-height", "10"])
        .args(&["--threads", "2", "--policy", "guided"])
        .arg("--log-dir")
        .arg(dir.path().join("absent"))
        .arg("--summary-dir")
        .arg(dir.path().join("absent"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Schedule guided finished in"));
}

#[test]
fn unwritable_images_do_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let absent = dir.path().join("absent");
    julia()
        .args(&["--size", "20x20", "--iterations", "50", "--chunk-height", "10"])
        .args(&["--threads", "2", "--policy", "all"])
        .arg("--output")
        .arg(&absent)
        .arg("--reference")
        .arg(absent.join("reference.ppm"))
        .arg("--log-dir")
        .arg(&absent)
        .arg("--summary-dir")
        .arg(&absent)
        .assert()
        .success()
        .stdout(predicate::str::contains("Schedule static finished in"))
        .stdout(predicate::str::contains("Schedule dynamic finished in"))
        .stdout(predicate::str::contains("Schedule guided finished in"))
        .stdout(predicate::str::contains("Reference image saved.").not())
        .stderr(predicate::str::contains("julia_guided.ppm"));
}

#[test]
fn last_rank_takes_the_short_band() {
    let dir = tempfile::tempdir().unwrap();
    julia()
        .args(&["--size", "20x100", "--iterations", "50", "--chunk-height", "30"])
        .args(&["--workers", "4", "--rank", "3", "--threads", "2", "--policy", "static"])
        .arg("--log-dir")
        .arg(dir.path())
        .arg("--summary-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Rank 3: Schedule static finished in"));

    let log = fs::read_to_string(dir.path().join("log_static_rank3.txt")).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert!(log.contains("Rank 3, Rows   90-  99: "));
}

#[test]
fn wrong_worker_count_is_fatal() {
    julia()
        .args(&["--size", "100x100", "--chunk-height", "25", "--workers", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "run with exactly 4 workers (one per chunk of 25 rows), not 3",
        ));
}

#[test]
fn ranks_render_their_own_band() {
    let dir = tempfile::tempdir().unwrap();
    julia()
        .args(&["--size", "30x100", "--iterations", "200", "--chunk-height", "25"])
        .args(&["--workers", "4", "--rank", "2", "--threads", "2", "--policy", "dynamic"])
        .arg("--output")
        .arg(dir.path())
        .arg("--log-dir")
        .arg(dir.path())
        .arg("--summary-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Rank 2: Schedule dynamic finished in"));

    let image = fs::read_to_string(dir.path().join("julia_dynamic_rank2.ppm")).unwrap();
    assert!(image.starts_with("P3\n30 25\n255\n"));
    assert_eq!(image.lines().count(), 3 + 25);
    let log = fs::read_to_string(dir.path().join("log_dynamic_rank2.txt")).unwrap();
    assert!(log.contains("Rank 2, Rows   50-  74: "));
}

#[test]
fn reference_image_marks_chunk_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.ppm");
    julia()
        .args(&["--size", "20x50", "--iterations", "100", "--chunk-height", "10"])
        .args(&["--threads", "1", "--policy", "static"])
        .arg("--reference")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Reference image saved."));

    let image = fs::read_to_string(&path).unwrap();
    let rows: Vec<&str> = image.lines().skip(3).collect();
    assert_eq!(rows.len(), 50);
    for (j, row) in rows.iter().enumerate() {
        let red = row.split(' ').collect::<Vec<_>>().chunks(3).all(|p| p == ["255", "0", "0"]);
        assert_eq!(red, j % 10 == 0, "row {}", j);
    }
}

#[test]
fn graymaps_are_written_on_request() {
    let dir = tempfile::tempdir().unwrap();
    julia()
        .args(&["--size", "16x16", "--iterations", "50", "--chunk-height", "8"])
        .args(&["--threads", "2", "--policy", "static", "--graymap"])
        .arg("--output")
        .arg(dir.path())
        .assert()
        .success();
    let bytes = fs::read(dir.path().join("julia_static.pgm")).unwrap();
    assert!(bytes.starts_with(b"P5"));
}

#[test]
fn bad_arguments_are_rejected() {
    julia().args(&["--threads", "0"]).assert().failure();
    julia().args(&["--size", "tall"]).assert().failure();
    julia().args(&["--policy", "auto"]).assert().failure();
}
