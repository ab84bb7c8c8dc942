use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn demo_script() -> PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
        .join("coffee")
        .join("coffee.bot.xml")
}

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();
    std::env::temp_dir().join(format!("botscript-smoke-{}-{}", name, nanos))
}

fn run(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_botscript"))
        .args(args)
        .output()
        .expect("botscript should run")
}

fn send(state: &PathBuf, event: &[&str]) -> String {
    let bot = demo_script();
    let mut args = vec![
        "send",
        "--bot",
        bot.to_str().expect("path should be utf-8"),
        "--state-file",
        state.to_str().expect("path should be utf-8"),
        "--session",
        "42",
        "--seed",
        "1",
    ];
    args.extend_from_slice(event);
    let output = run(&args);
    assert!(output.status.success(), "send {:?} failed", event);
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn payload_of(stdout: &str, title: &str) -> String {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("MESSAGE_JSON:"))
        .filter_map(|json| serde_json::from_str::<serde_json::Value>(json).ok())
        .filter_map(|message| message["buttons"].as_array().cloned())
        .flatten()
        .find(|button| button["title"] == title)
        .and_then(|button| button["action"]["payload"].as_str().map(str::to_string))
        .expect("button payload")
}

#[test]
fn check_accepts_demo_scripts() {
    let dir = demo_script().parent().expect("demo dir").to_path_buf();
    let output = run(&["check", "--scripts-dir", dir.to_str().expect("utf-8")]);
    assert!(output.status.success(), "check failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("OK:"));
    assert!(stdout.contains("CHECKED:1"));
}

#[test]
fn compile_reports_errors_with_result_lines() {
    let bad = temp_path("broken.bot.xml");
    fs::write(&bad, "<html><body>").expect("write");
    let output = run(&["compile", "--bot", bad.to_str().expect("utf-8")]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("RESULT:ERROR"));
    assert!(stdout.contains("ERROR_CODE:XML_PARSE_ERROR"));
}

#[test]
fn send_requires_exactly_one_event() {
    let state = temp_path("no-event.json");
    let bot = demo_script();
    let output = run(&[
        "send",
        "--bot",
        bot.to_str().expect("utf-8"),
        "--state-file",
        state.to_str().expect("utf-8"),
        "--session",
        "1",
    ]);
    assert!(!output.status.success());
}

#[test]
fn send_persists_the_session_between_invocations() {
    let state = temp_path("session.json");

    let greeting = send(&state, &["--opt-in"]);
    assert!(greeting.contains("RESULT:OK"));
    assert!(greeting.contains("Welcome to the coffee corner."));

    let order = payload_of(&greeting, "Order a coffee");
    let opened = send(&state, &["--postback", &order]);
    assert!(opened.contains("What is your name?"));

    let sizes = send(&state, &["--text", "Ada"]);
    let small = payload_of(&sizes, "Small");
    let done = send(&state, &["--postback", &small]);
    assert!(done.contains("Your coffee is on its way!"));
    assert!(!done.contains("Any milk?"));

    let stored: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&state).expect("state file")).expect("json");
    assert!(stored["values"]
        .get("coffee:session:42:current")
        .is_none());
    assert!(stored["hashes"].get("coffee:session:42:answer").is_none());
}

#[test]
fn chat_reads_commands_from_stdin() {
    let bot = demo_script();
    let mut child = Command::new(env!("CARGO_BIN_EXE_botscript"))
        .args(["chat", "--bot", bot.to_str().expect("utf-8"), "--seed", "1"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("chat should spawn");
    child
        .stdin
        .as_mut()
        .expect("stdin")
        .write_all(b":start\n2\n:quit\n")
        .expect("write stdin");
    let output = child.wait_with_output().expect("chat should finish");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("We brew since 1999."));
    assert!(stdout.contains("bye"));
}
