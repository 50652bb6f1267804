use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn cli_bin() -> &'static str {
    env!("CARGO_BIN_EXE_tsprep")
}

fn run_cli(args: &[&str]) -> io::Result<Output> {
    Command::new(cli_bin())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
}

fn assert_cli_success(output: &Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

#[test]
fn combine_directory_end_to_end() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.csv"), "id,v\n1,x\n2,y\n").unwrap();
    fs::write(dir.path().join("b.csv"), "ID,V\n3,z\n").unwrap();
    let report = dir.path().join("summary.json");

    let output = run_cli(&[
        "combine",
        path_str(dir.path()),
        "--report",
        path_str(&report),
    ])
    .unwrap();
    assert_cli_success(&output);

    let combined = fs::read_to_string(dir.path().join("Combined output.csv")).unwrap();
    assert_eq!(
        combined.lines().collect::<Vec<_>>(),
        vec!["id,v", "1,x", "2,y", "3,z"]
    );

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(summary["total_rows"], 3);
    assert_eq!(summary["sources"].as_array().map(Vec::len), Some(2));
}

#[test]
fn combine_aborts_when_output_exists() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.csv"), "id\n1\n").unwrap();
    fs::write(dir.path().join("Combined output.csv"), "existing\n").unwrap();

    let output = run_cli(&["combine", path_str(dir.path())]).unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already exists"), "stderr:\n{}", stderr);
    assert_eq!(
        fs::read_to_string(dir.path().join("Combined output.csv")).unwrap(),
        "existing\n"
    );
}

#[test]
fn combine_fails_on_empty_directory() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["combine", path_str(dir.path())]).unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no CSV files"), "stderr:\n{}", stderr);
}

#[test]
fn clean_with_config_file_and_flag_override() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("weather.csv");
    fs::write(
        &input,
        "Stamp,Temp_C,Note\n\
         \"Mar 03, 01:00 PM\",10,a\n\
         \"Mar 03, 01:10 PM\",12,b\n\
         \"Mar 03, 01:50 PM\",20,c\n",
    )
    .unwrap();
    let config = dir.path().join("clean.json");
    fs::write(
        &config,
        format!(
            r#"{{
                "input": {:?},
                "timestamp_field": "Stamp",
                "interval": "10min",
                "fillable_fields": ["Temp_C"],
                "output_name": "from_config.csv"
            }}"#,
            path_str(&input)
        ),
    )
    .unwrap();

    let output = run_cli(&[
        "clean",
        "--config",
        path_str(&config),
        "--output-name",
        "cleaned.csv",
        "--encoding",
        "utf-8",
    ])
    .unwrap();
    assert_cli_success(&output);
    assert!(!dir.path().join("from_config.csv").exists());

    let cleaned = fs::read_to_string(dir.path().join("cleaned.csv")).unwrap();
    assert_eq!(
        cleaned.lines().collect::<Vec<_>>(),
        vec![
            "Stamp,Temp_C,Note",
            "2023-03-03 13:00:00,10,a",
            "2023-03-03 13:10:00,12,b",
            "2023-03-03 13:20:00,14.0,",
            "2023-03-03 13:30:00,16.0,",
            "2023-03-03 13:40:00,18.0,",
            "2023-03-03 13:50:00,20,c",
        ]
    );
}

#[test]
fn clean_reports_bad_timestamp() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("weather.csv");
    fs::write(&input, "Date/Time,Temp_C\nnot a time,1\n").unwrap();

    let output = run_cli(&["clean", path_str(&input)]).unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot parse timestamp"), "stderr:\n{}", stderr);
    assert!(!dir.path().join("df_final.csv").exists());
}

#[test]
fn clean_writes_json_summary() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("weather.csv");
    fs::write(
        &input,
        "Date/Time,Temp_C\n\
         \"Jan 01, 10:00 AM\",1\n\
         \"Jan 01, 10:02 AM\",5\n\
         \"Jan 01, 10:05 AM\",2\n\
         \"Jan 01, 10:05 AM\",3\n",
    )
    .unwrap();
    let report = dir.path().join("report.json");

    let output = run_cli(&["clean", path_str(&input), "--report", path_str(&report)]).unwrap();
    assert_cli_success(&output);

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(summary["off_grid"], 1);
    assert_eq!(summary["duplicates_removed"], 1);
    assert_eq!(summary["duplicate_records"], 2);
    assert_eq!(summary["missing_timestamps"], 0);
    assert_eq!(summary["rows_written"], 2);
    assert_eq!(summary["encoding"], "iso-8859-1");
}
