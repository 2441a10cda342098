use crate::ipc::error::{not_found, ok, store_err};
use crate::ipc::helpers::{db_conn, optional_i64, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Course;
use crate::store::{self, NewCourse};
use serde_json::json;

fn course_json(c: &Course) -> serde_json::Value {
    json!({
        "id": c.id,
        "courseCode": c.course_code,
        "courseName": c.course_name,
        "credits": c.credits,
        "label": c.to_string(),
    })
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };
    let search = optional_str(req, "search");
    match store::list_courses(conn, search.as_deref()) {
        Ok(courses) => ok(
            &req.id,
            json!({ "courses": courses.iter().map(course_json).collect::<Vec<_>>() }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn parse_new_course(req: &Request) -> Result<NewCourse, serde_json::Value> {
    Ok(NewCourse {
        course_code: required_str(req, "courseCode")?,
        course_name: required_str(req, "courseName")?,
        credits: optional_i64(req, "credits")?,
    })
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let new = match parse_new_course(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::create_course(conn, &new) {
        Ok(course) => ok(&req.id, json!({ "course": course_json(&course) })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_courses_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::get_course(conn, &id) {
        Ok(Some(course)) => ok(&req.id, json!({ "course": course_json(&course) })),
        Ok(None) => not_found(&req.id, "course", &id),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::delete_course(conn, &id) {
        Ok(summary) => ok(&req.id, json!({ "gradesRemoved": summary.grades_removed })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.get" => Some(handle_courses_get(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        _ => None,
    }
}
