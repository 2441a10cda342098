use crate::calc;
use crate::ipc::error::{err, not_found, ok, store_err};
use crate::ipc::handlers::grades::grade_listing_json;
use crate::ipc::handlers::setup::load_calc_settings;
use crate::ipc::helpers::{db_conn, optional_str, required_str, today};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::store::{self, GradeFilter, NewStudent};
use serde_json::json;

fn student_json(s: &Student) -> serde_json::Value {
    json!({
        "id": s.id,
        "firstName": s.first_name,
        "lastName": s.last_name,
        "email": s.email,
        "studentId": s.student_id,
        "dateEnrolled": s.date_enrolled.to_string(),
        "label": s.to_string(),
    })
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    let settings = match load_calc_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let search = optional_str(req, "search");
    let students = match store::list_students(conn, search.as_deref()) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &e),
    };

    let mut rows = Vec::with_capacity(students.len());
    for s in &students {
        let grades = match store::fetch_grades_for_student(conn, &s.id) {
            Ok(v) => v,
            Err(e) => return store_err(&req.id, &e),
        };
        let mut row = student_json(s);
        row["gpa"] = json!(calc::gpa(&grades, settings.rounding_mode));
        rows.push(row);
    }
    ok(&req.id, json!({ "students": rows }))
}

fn parse_new_student(req: &Request) -> Result<NewStudent, serde_json::Value> {
    Ok(NewStudent {
        first_name: required_str(req, "firstName")?,
        last_name: required_str(req, "lastName")?,
        email: required_str(req, "email")?,
        student_id: required_str(req, "studentId")?,
    })
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let new = match parse_new_student(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match store::create_student(conn, &new, today()) {
        Ok(student) => ok(&req.id, json!({ "student": student_json(&student) })),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Resolves `params.id` (primary key) or `params.studentId` (student number).
fn resolve_student(conn: &rusqlite::Connection, req: &Request) -> Result<Student, serde_json::Value> {
    let (key, found) = if let Some(id) = optional_str(req, "id") {
        let found = store::get_student(conn, &id);
        (id, found)
    } else if let Some(number) = optional_str(req, "studentId") {
        let found = store::find_student_by_number(conn, &number);
        (number, found)
    } else {
        return Err(err(&req.id, "bad_params", "missing id or studentId", None));
    };
    match found {
        Ok(Some(s)) => Ok(s),
        Ok(None) => Err(not_found(&req.id, "student", &key)),
        Err(e) => Err(store_err(&req.id, &e)),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student = match resolve_student(conn, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let settings = match load_calc_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let listings = match store::list_grades(
        conn,
        &GradeFilter {
            student: Some(student.id.clone()),
            ..GradeFilter::default()
        },
    ) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &e),
    };

    let grades: Vec<_> = listings.iter().map(|l| l.grade.clone()).collect();
    let summary = calc::summarize(&grades, settings.rounding_mode);
    ok(
        &req.id,
        json!({
            "student": student_json(&student),
            "grades": listings.iter().map(grade_listing_json).collect::<Vec<_>>(),
            "averageScore": summary.average_score,
            "gpa": summary.gpa,
        }),
    )
}

fn handle_students_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student = match resolve_student(conn, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let settings = match load_calc_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let grades = match store::fetch_grades_for_student(conn, &student.id) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &e),
    };
    let summary = calc::summarize(&grades, settings.rounding_mode);
    ok(
        &req.id,
        json!({
            "studentId": student.student_id,
            "averageScore": summary.average_score,
            "gpa": summary.gpa,
            "gradeCount": summary.grade_count,
            "roundingMode": settings.rounding_mode.as_str(),
        }),
    )
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::delete_student(conn, &id) {
        Ok(summary) => ok(&req.id, json!({ "gradesRemoved": summary.grades_removed })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.summary" => Some(handle_students_summary(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
