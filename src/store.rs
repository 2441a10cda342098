use crate::model::{Course, Grade, GradeListing, GradeSymbol, Hundredths, Student, DEFAULT_CREDITS};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {table} record: {} already taken", fields.join(", "))]
    Duplicate {
        table: &'static str,
        fields: Vec<String>,
    },
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Duplicate { .. } => "duplicate",
            StoreError::NotFound { .. } => "not_found",
            StoreError::Invalid { .. } => "bad_params",
            StoreError::Db(_) => "db_error",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_id: String,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub course_code: String,
    pub course_name: String,
    pub credits: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewGrade {
    pub student: String,
    pub course: String,
    pub grade: GradeSymbol,
    pub score: Hundredths,
}

#[derive(Debug, Clone, Default)]
pub struct GradePatch {
    pub grade: Option<GradeSymbol>,
    pub score: Option<Hundredths>,
}

#[derive(Debug, Clone, Default)]
pub struct GradeFilter {
    pub student: Option<String>,
    pub course: Option<String>,
    pub grade: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSummary {
    pub grades_removed: usize,
}

fn clean_text(field: &'static str, raw: &str, max_chars: usize) -> StoreResult<String> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(StoreError::Invalid {
            field,
            message: "must not be empty".into(),
        });
    }
    if t.chars().count() > max_chars {
        return Err(StoreError::Invalid {
            field,
            message: format!("must be at most {} characters", max_chars),
        });
    }
    Ok(t.to_string())
}

// Shape check only: one `@`, a non-empty local part, and a dotted domain.
fn clean_email(raw: &str) -> StoreResult<String> {
    let email = clean_text("email", raw, 254)?;
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !well_formed {
        return Err(StoreError::Invalid {
            field: "email",
            message: "must look like name@domain".into(),
        });
    }
    Ok(email)
}

fn classify_write_error(table: &'static str, e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref fe, Some(ref msg)) = e {
        if fe.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            let fields = unique_columns(msg);
            tracing::warn!(table, fields = ?fields, "uniqueness constraint violated");
            return StoreError::Duplicate { table, fields };
        }
    }
    StoreError::Db(e)
}

// "UNIQUE constraint failed: grades.student_id, grades.course_id"
fn unique_columns(msg: &str) -> Vec<String> {
    msg.strip_prefix("UNIQUE constraint failed: ")
        .map(|rest| {
            rest.split(',')
                .map(|c| {
                    let c = c.trim();
                    c.rsplit_once('.').map(|(_, col)| col).unwrap_or(c).to_string()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

// Every whitespace-separated term must match at least one column.
fn push_search_clause(
    search: Option<&str>,
    columns: &[&str],
    clauses: &mut Vec<String>,
    args: &mut Vec<Value>,
) {
    let Some(search) = search else {
        return;
    };
    for term in search.split_whitespace() {
        let pattern = like_pattern(term);
        let ors: Vec<String> = columns
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
            .collect();
        clauses.push(format!("({})", ors.join(" OR ")));
        for _ in columns {
            args.push(Value::Text(pattern.clone()));
        }
    }
}

fn row_exists(conn: &Connection, table: &str, id: &str) -> StoreResult<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let found: Option<i64> = conn.query_row(&sql, [id], |r| r.get(0)).optional()?;
    Ok(found.is_some())
}

const STUDENT_COLUMNS: &str = "id, first_name, last_name, email, student_id, date_enrolled";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        email: r.get(3)?,
        student_id: r.get(4)?,
        date_enrolled: r.get(5)?,
    })
}

pub fn create_student(conn: &Connection, new: &NewStudent, today: NaiveDate) -> StoreResult<Student> {
    let student = Student {
        id: Uuid::new_v4().to_string(),
        first_name: clean_text("firstName", &new.first_name, 100)?,
        last_name: clean_text("lastName", &new.last_name, 100)?,
        email: clean_email(&new.email)?,
        student_id: clean_text("studentId", &new.student_id, 20)?,
        date_enrolled: today,
    };
    conn.execute(
        "INSERT INTO students(id, first_name, last_name, email, student_id, date_enrolled)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &student.id,
            &student.first_name,
            &student.last_name,
            &student.email,
            &student.student_id,
            student.date_enrolled,
        ),
    )
    .map_err(|e| classify_write_error("students", e))?;
    tracing::debug!(id = %student.id, student_id = %student.student_id, "student created");
    Ok(student)
}

pub fn get_student(conn: &Connection, id: &str) -> StoreResult<Option<Student>> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
    Ok(conn.query_row(&sql, [id], student_from_row).optional()?)
}

pub fn find_student_by_number(conn: &Connection, student_id: &str) -> StoreResult<Option<Student>> {
    let sql = format!("SELECT {} FROM students WHERE student_id = ?", STUDENT_COLUMNS);
    Ok(conn
        .query_row(&sql, [student_id.trim()], student_from_row)
        .optional()?)
}

pub fn list_students(conn: &Connection, search: Option<&str>) -> StoreResult<Vec<Student>> {
    let mut clauses = Vec::new();
    let mut args = Vec::new();
    push_search_clause(
        search,
        &["first_name", "last_name", "student_id"],
        &mut clauses,
        &mut args,
    );
    let mut sql = format!("SELECT {} FROM students", STUDENT_COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY rowid");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_student(conn: &Connection, id: &str) -> StoreResult<DeleteSummary> {
    let tx = conn.unchecked_transaction()?;
    let grades_removed: i64 = tx.query_row(
        "SELECT COUNT(*) FROM grades WHERE student_id = ?",
        [id],
        |r| r.get(0),
    )?;
    if tx.execute("DELETE FROM students WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound {
            entity: "student",
            key: id.to_string(),
        });
    }
    tx.commit()?;
    tracing::info!(id, grades_removed, "student deleted");
    Ok(DeleteSummary {
        grades_removed: grades_removed as usize,
    })
}

const COURSE_COLUMNS: &str = "id, course_code, course_name, credits";

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: r.get(0)?,
        course_code: r.get(1)?,
        course_name: r.get(2)?,
        credits: r.get(3)?,
    })
}

pub fn create_course(conn: &Connection, new: &NewCourse) -> StoreResult<Course> {
    let course = Course {
        id: Uuid::new_v4().to_string(),
        course_code: clean_text("courseCode", &new.course_code, 20)?,
        course_name: clean_text("courseName", &new.course_name, 200)?,
        credits: new.credits.unwrap_or(DEFAULT_CREDITS),
    };
    conn.execute(
        "INSERT INTO courses(id, course_code, course_name, credits) VALUES(?, ?, ?, ?)",
        (
            &course.id,
            &course.course_code,
            &course.course_name,
            course.credits,
        ),
    )
    .map_err(|e| classify_write_error("courses", e))?;
    tracing::debug!(id = %course.id, course_code = %course.course_code, "course created");
    Ok(course)
}

pub fn get_course(conn: &Connection, id: &str) -> StoreResult<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
    Ok(conn.query_row(&sql, [id], course_from_row).optional()?)
}

pub fn list_courses(conn: &Connection, search: Option<&str>) -> StoreResult<Vec<Course>> {
    let mut clauses = Vec::new();
    let mut args = Vec::new();
    push_search_clause(
        search,
        &["course_code", "course_name"],
        &mut clauses,
        &mut args,
    );
    let mut sql = format!("SELECT {} FROM courses", COURSE_COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY rowid");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), course_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_course(conn: &Connection, id: &str) -> StoreResult<DeleteSummary> {
    let tx = conn.unchecked_transaction()?;
    let grades_removed: i64 = tx.query_row(
        "SELECT COUNT(*) FROM grades WHERE course_id = ?",
        [id],
        |r| r.get(0),
    )?;
    if tx.execute("DELETE FROM courses WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound {
            entity: "course",
            key: id.to_string(),
        });
    }
    tx.commit()?;
    tracing::info!(id, grades_removed, "course deleted");
    Ok(DeleteSummary {
        grades_removed: grades_removed as usize,
    })
}

const GRADE_COLUMNS: &str = "g.id, g.student_id, g.course_id, g.grade, g.score, g.date_recorded";

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: r.get(0)?,
        student: r.get(1)?,
        course: r.get(2)?,
        grade: r.get(3)?,
        score: Hundredths::from_raw(r.get(4)?),
        date_recorded: r.get(5)?,
    })
}

fn grade_listing_from_row(r: &Row<'_>) -> rusqlite::Result<GradeListing> {
    let first: String = r.get(6)?;
    let last: String = r.get(7)?;
    Ok(GradeListing {
        grade: grade_from_row(r)?,
        student_name: format!("{} {}", first, last),
        course_code: r.get(8)?,
    })
}

fn grade_listing_sql() -> String {
    format!(
        "SELECT {}, s.first_name, s.last_name, c.course_code
         FROM grades g
         JOIN students s ON s.id = g.student_id
         JOIN courses c ON c.id = g.course_id",
        GRADE_COLUMNS
    )
}

pub fn create_grade(conn: &Connection, new: &NewGrade, today: NaiveDate) -> StoreResult<Grade> {
    if !row_exists(conn, "students", &new.student)? {
        return Err(StoreError::NotFound {
            entity: "student",
            key: new.student.clone(),
        });
    }
    if !row_exists(conn, "courses", &new.course)? {
        return Err(StoreError::NotFound {
            entity: "course",
            key: new.course.clone(),
        });
    }

    let grade = Grade {
        id: Uuid::new_v4().to_string(),
        student: new.student.clone(),
        course: new.course.clone(),
        grade: new.grade.as_str().to_string(),
        score: new.score,
        date_recorded: today,
    };
    conn.execute(
        "INSERT INTO grades(id, student_id, course_id, grade, score, date_recorded)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &grade.id,
            &grade.student,
            &grade.course,
            &grade.grade,
            grade.score.raw(),
            grade.date_recorded,
        ),
    )
    .map_err(|e| classify_write_error("grades", e))?;
    tracing::debug!(id = %grade.id, student = %grade.student, course = %grade.course, "grade recorded");
    Ok(grade)
}

pub fn update_grade(conn: &Connection, id: &str, patch: &GradePatch) -> StoreResult<Grade> {
    let changed = conn.execute(
        "UPDATE grades
         SET grade = COALESCE(?, grade),
             score = COALESCE(?, score)
         WHERE id = ?",
        (
            patch.grade.map(GradeSymbol::as_str),
            patch.score.map(Hundredths::raw),
            id,
        ),
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            entity: "grade",
            key: id.to_string(),
        });
    }
    get_grade(conn, id)?.ok_or_else(|| StoreError::NotFound {
        entity: "grade",
        key: id.to_string(),
    })
}

pub fn get_grade(conn: &Connection, id: &str) -> StoreResult<Option<Grade>> {
    let sql = format!("SELECT {} FROM grades g WHERE g.id = ?", GRADE_COLUMNS);
    Ok(conn.query_row(&sql, [id], grade_from_row).optional()?)
}

pub fn get_grade_listing(conn: &Connection, id: &str) -> StoreResult<Option<GradeListing>> {
    let sql = format!("{} WHERE g.id = ?", grade_listing_sql());
    Ok(conn
        .query_row(&sql, [id], grade_listing_from_row)
        .optional()?)
}

pub fn fetch_grades_for_student(conn: &Connection, student: &str) -> StoreResult<Vec<Grade>> {
    let sql = format!(
        "SELECT {} FROM grades g WHERE g.student_id = ? ORDER BY g.rowid",
        GRADE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([student], grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_grades(conn: &Connection, filter: &GradeFilter) -> StoreResult<Vec<GradeListing>> {
    let mut clauses = Vec::new();
    let mut args = Vec::new();
    if let Some(student) = &filter.student {
        clauses.push("g.student_id = ?".to_string());
        args.push(Value::Text(student.clone()));
    }
    if let Some(course) = &filter.course {
        clauses.push("g.course_id = ?".to_string());
        args.push(Value::Text(course.clone()));
    }
    if let Some(grade) = &filter.grade {
        clauses.push("g.grade = ?".to_string());
        args.push(Value::Text(grade.clone()));
    }
    push_search_clause(
        filter.search.as_deref(),
        &["s.first_name", "s.last_name"],
        &mut clauses,
        &mut args,
    );

    let mut sql = grade_listing_sql();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY g.rowid");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), grade_listing_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
