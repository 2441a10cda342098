use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
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
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Returns the error object of a request that must fail.
fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().expect("error object")
}

fn code(error: &serde_json::Value) -> &str {
    error.get("code").and_then(|v| v.as_str()).unwrap_or("")
}

fn fields(error: &serde_json::Value) -> Vec<String> {
    error
        .get("details")
        .and_then(|d| d.get("fields"))
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn open_workspace() -> (
    tempfile::TempDir,
    Child,
    ChildStdin,
    BufReader<ChildStdout>,
) {
    let workspace = tempfile::tempdir().expect("tempdir");
    let (child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    (workspace, child, stdin, reader)
}

#[test]
fn duplicate_student_email_or_number_is_rejected() {
    let (_workspace, mut child, mut stdin, mut reader) = open_workspace();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({
            "firstName": "Jane",
            "lastName": "Smith",
            "email": "jane@example.com",
            "studentId": "S002"
        }),
    );

    let e = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({
            "firstName": "Janet",
            "lastName": "Smyth",
            "email": "jane@example.com",
            "studentId": "S099"
        }),
    );
    assert_eq!(code(&e), "duplicate");
    assert_eq!(fields(&e), vec!["email".to_string()]);

    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "firstName": "Janet",
            "lastName": "Smyth",
            "email": "janet@example.com",
            "studentId": "S002"
        }),
    );
    assert_eq!(code(&e), "duplicate");
    assert_eq!(fields(&e), vec!["student_id".to_string()]);

    let listed = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(
        listed.get("students").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn duplicate_course_code_is_rejected() {
    let (_workspace, mut child, mut stdin, mut reader) = open_workspace();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "courses.create",
        json!({ "courseCode": "SIT223", "courseName": "Professional Practice" }),
    );
    let e = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "courses.create",
        json!({ "courseCode": "SIT223", "courseName": "Something Else" }),
    );
    assert_eq!(code(&e), "duplicate");
    assert_eq!(fields(&e), vec!["course_code".to_string()]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn second_grade_for_pair_fails_without_overwriting() {
    let (_workspace, mut child, mut stdin, mut reader) = open_workspace();

    let s = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({
            "firstName": "Bob",
            "lastName": "Johnson",
            "email": "bob@example.com",
            "studentId": "S003"
        }),
    );
    let student_id = s["student"]["id"].as_str().expect("student id").to_string();
    let c = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.create",
        json!({ "courseCode": "SIT223", "courseName": "Professional Practice", "credits": 1 }),
    );
    let course_id = c["course"]["id"].as_str().expect("course id").to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.create",
        json!({ "student": student_id, "course": course_id, "grade": "HD", "score": 92.5 }),
    );
    let e = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "grades.create",
        json!({ "student": student_id, "course": course_id, "grade": "N", "score": 10 }),
    );
    assert_eq!(code(&e), "duplicate");
    assert_eq!(
        fields(&e),
        vec!["student_id".to_string(), "course_id".to_string()]
    );

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.summary",
        json!({ "id": student_id }),
    );
    assert_eq!(summary["averageScore"].as_f64(), Some(92.5));
    assert_eq!(summary["gpa"].as_f64(), Some(7.0));
    assert_eq!(summary["gradeCount"].as_u64(), Some(1));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn invalid_grade_input_is_bad_params_or_not_found() {
    let (_workspace, mut child, mut stdin, mut reader) = open_workspace();

    let s = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({
            "firstName": "Test",
            "lastName": "Student",
            "email": "test@example.com",
            "studentId": "S005"
        }),
    );
    let student_id = s["student"]["id"].as_str().expect("student id").to_string();
    let c = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.create",
        json!({ "courseCode": "TEST101", "courseName": "Test Course" }),
    );
    let course_id = c["course"]["id"].as_str().expect("course id").to_string();

    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "grades.create",
        json!({ "student": student_id, "course": course_id, "grade": "A+", "score": 90 }),
    );
    assert_eq!(code(&e), "bad_params");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "grades.create",
        json!({ "student": student_id, "course": course_id, "grade": "C", "score": "68.555" }),
    );
    assert_eq!(code(&e), "bad_params");

    // Written as raw text: a Rust float literal would already be rounded.
    writeln!(
        stdin,
        r#"{{"id":"4b","method":"grades.create","params":{{"student":"{}","course":"{}","grade":"C","score":92.4999999999999999}}}}"#,
        student_id, course_id
    )
    .expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value["id"].as_str(), Some("4b"));
    assert_eq!(value["ok"].as_bool(), Some(false), "long fraction accepted: {}", value);
    assert_eq!(code(&value["error"]), "bad_params");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "grades.create",
        json!({ "student": student_id, "course": course_id, "grade": "C", "score": 1000 }),
    );
    assert_eq!(code(&e), "bad_params");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "grades.create",
        json!({ "student": "missing", "course": course_id, "grade": "C", "score": 68.5 }),
    );
    assert_eq!(code(&e), "not_found");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "students.create",
        json!({ "firstName": " ", "lastName": "X", "email": "x@example.com", "studentId": "S9" }),
    );
    assert_eq!(code(&e), "bad_params");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "students.create",
        json!({ "firstName": "Y", "lastName": "Z", "email": "not-an-email", "studentId": "S10" }),
    );
    assert_eq!(code(&e), "bad_params");
    assert_eq!(e["details"]["field"].as_str(), Some("email"));

    drop(stdin);
    let _ = child.wait();
}
