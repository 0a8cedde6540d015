use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn game(i: usize, white: u32, black: u32) -> String {
    let time_control = ["180+2", "600+0", "180+2"][i % 3];
    format!(
        "[Event \"Rated Blitz game {i}\"]\n[WhiteElo \"{white}\"]\n[BlackElo \"{black}\"]\n[TimeControl \"{time_control}\"]\n\n1. d4 d5 2. c4 e6 1/2-1/2\n\n"
    )
}

fn write_dataset(dir: &Path) -> (PathBuf, String) {
    let text: String = [(2000, 1900), (1500, 2200), (1850, 1810), (2402, 1799)]
        .iter()
        .enumerate()
        .map(|(i, (white, black))| game(i, *white, *black))
        .collect();
    let path = dir.join("games.pgn.bz2");
    let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    enc.write_all(text.as_bytes()).unwrap();
    fs::write(&path, enc.finish().unwrap()).unwrap();
    (path, text)
}

fn pgn_extract(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pgn_extract"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("spawn pgn_extract")
}

#[test]
fn help_lists_subcommands() {
    let output = pgn_extract(&["--help"]);
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["extract", "filter", "count"] {
        assert!(help.contains(command), "missing {command} in help:\n{help}");
    }
}

#[test]
fn filter_writes_games_with_both_ratings_above_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = write_dataset(dir.path());
    let out = dir.path().join("strong.pgn");

    let output = pgn_extract(&[
        "filter",
        "--input",
        input.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
        "--min-elo",
        "1800",
    ]);
    assert!(output.status.success(), "{output:?}");

    let written = fs::read_to_string(&out).unwrap();
    assert_eq!(written, format!("{}{}", game(0, 2000, 1900), game(2, 1850, 1810)));
}

#[test]
fn extract_honours_max_games_and_reports_json() {
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = write_dataset(dir.path());

    let output = pgn_extract(&[
        "extract",
        "--input",
        input.to_str().unwrap(),
        "--max-games",
        "1",
        "--json-report",
    ]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(String::from_utf8(output.stdout).unwrap(), game(0, 2000, 1900));

    let stderr = String::from_utf8(output.stderr).unwrap();
    let start = stderr.find('{').expect("json report on stderr");
    let report: serde_json::Value = serde_json::from_str(&stderr[start..]).unwrap();
    assert_eq!(report["outcome"], "quota_reached");
    assert_eq!(report["codec"], "bzip2");
    assert_eq!(report["stats"]["records_emitted"], 1);
}

#[test]
fn count_reports_records_and_games() {
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = write_dataset(dir.path());

    let output = pgn_extract(&["count", "--input", input.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "records: 4\ngames: 4\naverage elo: 1938\nelo range: 1500 - 2402\ntime controls: 2\n"
    );

    let output = pgn_extract(&[
        "count",
        "--input",
        input.to_str().unwrap(),
        "--boundary",
        "blank",
    ]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("records: 8\ngames: 4\n"), "{stdout}");

    let output = pgn_extract(&[
        "count",
        "--input",
        input.to_str().unwrap(),
        "--json-report",
    ]);
    assert!(output.status.success(), "{output:?}");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["stats"]["records_scanned"], 4);
    assert_eq!(report["dataset"]["games"], 4);
    assert_eq!(report["dataset"]["average_elo"], 1938.0);
    assert_eq!(report["dataset"]["min_elo"], 1500);
    assert_eq!(report["dataset"]["max_elo"], 2402);
    assert_eq!(report["dataset"]["time_controls"], 2);
}

#[test]
fn corrupt_input_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.pgn.gz");
    fs::write(&input, b"definitely not gzip").unwrap();

    let output = pgn_extract(&["extract", "--input", input.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("gzip"), "{stderr}");
}

#[test]
fn missing_input_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.pgn");

    let output = pgn_extract(&["count", "--input", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.pgn"));
}
