use pretty_assertions::assert_eq;
use std::path::Path;
use std::process::{Command, Output};

fn write_input(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("input.csv");
    std::fs::write(&path, contents).expect("write input csv");
    path
}

fn grouprank(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_grouprank"))
        .args(args)
        .output()
        .expect("run grouprank")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "grouprank failed\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("utf-8 stdout")
}

#[test]
fn ranks_within_groups_and_writes_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "region,sales\nwest,30\nwest,10\neast,5\nwest,NA\neast,\nwest,20\n",
    );

    let output = grouprank(&[
        input.to_str().unwrap(),
        "--group-by",
        "region",
        "--sort-by",
        "region,sales",
        "--name",
        "position",
        "--page-size",
        "2",
    ]);

    assert_eq!(
        stdout(&output),
        "region,sales,position\n\
         east,,\n\
         east,5,1\n\
         west,,\n\
         west,10,1\n\
         west,20,2\n\
         west,30,3\n"
    );
}

#[test]
fn descending_sort_and_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "g,s\n1,30\n1,10\n2,5\n1,20\n");
    let out_path = dir.path().join("ranked.csv");

    let output = grouprank(&[
        input.to_str().unwrap(),
        "--group-by",
        "g",
        "--sort-by",
        "s",
        "--descending",
        "s",
        "--output",
        out_path.to_str().unwrap(),
        "--sequential",
    ]);

    assert_eq!(stdout(&output), "");
    assert_eq!(
        std::fs::read_to_string(&out_path).unwrap(),
        "g,s,rank\n1,30,1\n1,20,2\n1,10,3\n2,5,1\n"
    );
}

#[test]
fn replace_overwrites_an_existing_rank_column() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "g,s,rank\n1,2,x\n1,1,y\n");
    let base = [input.to_str().unwrap(), "--group-by", "g", "--sort-by", "s"];

    let rejected = grouprank(&base);
    assert!(!rejected.status.success());
    assert!(
        String::from_utf8_lossy(&rejected.stderr).contains("column rank already exists"),
        "stderr:\n{}",
        String::from_utf8_lossy(&rejected.stderr)
    );

    let mut args = base.to_vec();
    args.push("--replace");
    assert_eq!(stdout(&grouprank(&args)), "g,s,rank\n1,1,1\n1,2,2\n");
}

#[test]
fn unknown_columns_fail_with_a_message() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "g,s\n1,2\n");

    let output = grouprank(&[input.to_str().unwrap(), "--group-by", "nope", "--sort-by", "s"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown column: nope"), "stderr:\n{stderr}");
}

#[test]
fn missing_input_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.csv");

    let output = grouprank(&[missing.to_str().unwrap(), "--sort-by", "s"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.csv"));
}
