use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_summaryd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn summaryd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn send_line(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    line: &str,
) -> serde_json::Value {
    writeln!(stdin, "{}", line).expect("write request");
    stdin.flush().expect("flush request");
    let mut out = String::new();
    reader.read_line(&mut out).expect("read response line");
    serde_json::from_str(out.trim()).expect("parse response json")
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    let value = send_line(stdin, reader, &payload.to_string());
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

#[test]
fn router_dispatch_smoke() {
    let workspace = temp_dir("summaryd-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], true);
    assert_eq!(health["result"]["workspacePath"], json!(null));

    let garbage = send_line(&mut stdin, &mut reader, "{not json");
    assert_eq!(garbage["ok"], false);
    assert_eq!(garbage["error"]["code"], "bad_json");

    let unknown = request(&mut stdin, &mut reader, "2", "grades.explode", json!({}));
    assert_eq!(unknown["error"]["code"], "not_implemented");

    let setup = request(&mut stdin, &mut reader, "3", "setup.get", json!({}));
    assert_eq!(setup["error"]["code"], "no_workspace");

    let missing_path = request(&mut stdin, &mut reader, "4", "workspace.select", json!({}));
    assert_eq!(missing_path["error"]["code"], "bad_params");

    let selected = request(
        &mut stdin,
        &mut reader,
        "5",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["ok"], true);
    assert!(workspace.join("summaryd.sqlite3").exists());

    let setup = request(&mut stdin, &mut reader, "6", "setup.get", json!({}));
    assert_eq!(setup["result"]["display"]["timeFormat"], "seconds");

    let bad_section = request(
        &mut stdin,
        &mut reader,
        "7",
        "setup.update",
        json!({ "section": "printer", "patch": {} }),
    );
    assert_eq!(bad_section["error"]["code"], "bad_params");

    let _ = child.kill();
}
