use crate::ipc::error::{err, not_found, ok, store_err};
use crate::ipc::helpers::{db_conn, grade_symbol, optional_str, required_str, score_param, today};
use crate::ipc::types::{AppState, Request};
use crate::model::{GradeListing, GradeSymbol};
use crate::store::{self, GradeFilter, GradePatch, NewGrade};
use serde_json::json;

pub fn grade_listing_json(l: &GradeListing) -> serde_json::Value {
    json!({
        "id": l.grade.id,
        "student": l.grade.student,
        "course": l.grade.course,
        "grade": l.grade.grade,
        "score": l.grade.score,
        "dateRecorded": l.grade.date_recorded.to_string(),
        "studentName": l.student_name,
        "courseCode": l.course_code,
        "label": l.to_string(),
    })
}

fn respond_with_listing(conn: &rusqlite::Connection, req: &Request, id: &str) -> serde_json::Value {
    match store::get_grade_listing(conn, id) {
        Ok(Some(listing)) => ok(&req.id, json!({ "grade": grade_listing_json(&listing) })),
        Ok(None) => not_found(&req.id, "grade", id),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_grades_symbols(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let symbols: Vec<_> = GradeSymbol::ALL
        .iter()
        .map(|s| {
            json!({
                "symbol": s.as_str(),
                "label": s.description(),
                "points": s.points(),
            })
        })
        .collect();
    ok(&req.id, json!({ "symbols": symbols }))
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "grades": [] }));
    };
    let filter = GradeFilter {
        student: optional_str(req, "student"),
        course: optional_str(req, "course"),
        grade: optional_str(req, "grade"),
        search: optional_str(req, "search"),
    };
    match store::list_grades(conn, &filter) {
        Ok(rows) => ok(
            &req.id,
            json!({ "grades": rows.iter().map(grade_listing_json).collect::<Vec<_>>() }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn parse_new_grade(req: &Request) -> Result<NewGrade, serde_json::Value> {
    let student = required_str(req, "student")?;
    let course = required_str(req, "course")?;
    let grade = grade_symbol(req, &required_str(req, "grade")?)?;
    let Some(score) = score_param(req, "score")? else {
        return Err(err(&req.id, "bad_params", "missing score", None));
    };
    Ok(NewGrade {
        student,
        course,
        grade,
        score,
    })
}

fn handle_grades_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let new = match parse_new_grade(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::create_grade(conn, &new, today()) {
        Ok(grade) => respond_with_listing(conn, req, &grade.id),
        Err(e) => store_err(&req.id, &e),
    }
}

fn parse_grade_patch(req: &Request) -> Result<GradePatch, serde_json::Value> {
    let grade = match optional_str(req, "grade") {
        Some(raw) => Some(grade_symbol(req, &raw)?),
        None => None,
    };
    Ok(GradePatch {
        grade,
        score: score_param(req, "score")?,
    })
}

fn handle_grades_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match parse_grade_patch(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::update_grade(conn, &id, &patch) {
        Ok(grade) => respond_with_listing(conn, req, &grade.id),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.symbols" => Some(handle_grades_symbols(state, req)),
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.create" => Some(handle_grades_create(state, req)),
        "grades.update" => Some(handle_grades_update(state, req)),
        _ => None,
    }
}
