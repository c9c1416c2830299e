//! Canvas record types
//!
//! Each record names the fields the pipeline reads; everything else the API
//! returns is carried through `extra` and lands in the exports untouched.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Course workflow states queried for a reporting year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseState {
    Available,
    Completed,
}

impl CourseState {
    pub const REPORTED: [Self; 2] = [Self::Available, Self::Completed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Completed => "completed",
        }
    }
}

/// Assignment status bucket used as a query filter.
///
/// Buckets overlap: one assignment can be listed under several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Past,
    Overdue,
    Undated,
    Ungraded,
    Unsubmitted,
    Upcoming,
    Future,
}

impl Bucket {
    /// Buckets fetched by the default extract report.
    pub const DEFAULT: [Self; 2] = [Self::Past, Self::Overdue];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Past => "past",
            Self::Overdue => "overdue",
            Self::Undated => "undated",
            Self::Ungraded => "ungraded",
            Self::Unsubmitted => "unsubmitted",
            Self::Upcoming => "upcoming",
            Self::Future => "future",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "past" => Ok(Self::Past),
            "overdue" => Ok(Self::Overdue),
            "undated" => Ok(Self::Undated),
            "ungraded" => Ok(Self::Ungraded),
            "unsubmitted" => Ok(Self::Unsubmitted),
            "upcoming" => Ok(Self::Upcoming),
            "future" => Ok(Self::Future),
            other => Err(format!("unknown assignment bucket: {other}")),
        }
    }
}

/// Year of a Canvas date.
///
/// Accepts RFC 3339 timestamps (`2022-08-15T05:00:00Z`) and plain dates; the
/// year is taken as written, without converting time zones.
pub fn year_of(date: &str) -> Option<i32> {
    let day = date.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .ok()
        .map(|d| d.year())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    pub name: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub workflow_state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Course {
    pub fn start_year(&self) -> Option<i32> {
        self.start_at.as_deref().and_then(year_of)
    }

    pub fn end_year(&self) -> Option<i32> {
        self.end_at.as_deref().and_then(year_of)
    }

    /// Whether the course runs during `year`: `start ≤ year ≤ end`.
    ///
    /// A missing or unparsable bound is open on that side.
    pub fn in_year(&self, year: i32) -> bool {
        self.start_year().is_none_or(|start| start <= year)
            && self.end_year().is_none_or(|end| year <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: u64,
    pub name: Option<String>,
    pub sortable_name: Option<String>,
    pub login_id: Option<String>,
    /// Courses the student was listed under in this run (annex)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub course_ids: Vec<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: u64,
    /// Set from the course the assignment was fetched through
    #[serde(default)]
    pub course_id: u64,
    pub name: Option<String>,
    pub due_at: Option<String>,
    /// Bucket query the assignment was fetched under (annex)
    #[serde(default)]
    pub bucket: Option<Bucket>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: u64,
    /// Course the submission was fetched through (annex)
    #[serde(default)]
    pub course_id: Option<u64>,
    pub assignment_id: u64,
    pub user_id: u64,
    pub workflow_state: Option<String>,
    pub submitted_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: u64,
    pub user_id: u64,
    pub course_id: u64,
    #[serde(rename = "type")]
    pub enrollment_type: Option<String>,
    pub enrollment_state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Assignment a user has not submitted past its due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingAssignment {
    pub id: u64,
    pub course_id: u64,
    pub name: Option<String>,
    pub due_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Student decorated with missing assignments for one course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentWithMissingAssignments {
    #[serde(flatten)]
    pub student: Student,
    pub missing_assignments: Vec<MissingAssignment>,
}

/// Course with at least one student missing assignments in it.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseWithMissingAssignments {
    pub course: Course,
    pub students: Vec<StudentWithMissingAssignments>,
}

/// Export row of the missing-assignments report: one per course and student.
#[derive(Debug, Clone, Serialize)]
pub struct MissingAssignmentRow<'a> {
    pub course_id: u64,
    pub course_name: Option<&'a str>,
    pub student_id: u64,
    pub student_name: Option<&'a str>,
    pub sortable_name: Option<&'a str>,
    pub login_id: Option<&'a str>,
    pub missing_count: usize,
    pub missing_assignments: &'a [MissingAssignment],
}

impl CourseWithMissingAssignments {
    /// Flatten to rows, course fields denormalized onto each student.
    pub fn rows(&self) -> impl Iterator<Item = MissingAssignmentRow<'_>> {
        self.students.iter().map(|s| MissingAssignmentRow {
            course_id: self.course.id,
            course_name: self.course.name.as_deref(),
            student_id: s.student.id,
            student_name: s.student.name.as_deref(),
            sortable_name: s.student.sortable_name.as_deref(),
            login_id: s.student.login_id.as_deref(),
            missing_count: s.missing_assignments.len(),
            missing_assignments: &s.missing_assignments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(start: Option<&str>, end: Option<&str>) -> Course {
        Course {
            id: 1,
            name: None,
            start_at: start.map(String::from),
            end_at: end.map(String::from),
            workflow_state: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn year_of_formats() {
        assert_eq!(year_of("2022-08-15T05:00:00Z"), Some(2022));
        assert_eq!(year_of("2021-12-31"), Some(2021));
        assert_eq!(year_of("2023-01-01T00:00:00-07:00"), Some(2023));
        assert_eq!(year_of("soon"), None);
        assert_eq!(year_of(""), None);
    }

    #[test]
    fn course_within_single_year() {
        let c = course(Some("2022-01-01"), Some("2022-12-31"));
        assert!(c.in_year(2022));
        assert!(!c.in_year(2021));
        assert!(!c.in_year(2023));
    }

    #[test]
    fn course_spanning_year_boundary() {
        let c = course(Some("2021-08-20T00:00:00Z"), Some("2022-06-10T00:00:00Z"));
        assert!(c.in_year(2021));
        assert!(c.in_year(2022));
        assert!(!c.in_year(2020));
    }

    #[test]
    fn open_bounds() {
        assert!(course(None, None).in_year(1999));
        assert!(course(Some("2020-01-01"), None).in_year(2030));
        assert!(!course(Some("2020-01-01"), None).in_year(2019));
        assert!(course(None, Some("2020-01-01")).in_year(2019));
        assert!(!course(None, Some("2020-01-01")).in_year(2021));
    }

    #[test]
    fn course_keeps_unknown_fields() {
        let json = r#"{"id": 12, "name": "Biology", "start_at": null, "course_code": "BIO-1", "term": {"id": 4}}"#;
        let c: Course = serde_json::from_str(json).unwrap();
        assert_eq!(c.id, 12);
        assert_eq!(c.start_at, None);
        assert_eq!(c.extra["course_code"], "BIO-1");

        let back = serde_json::to_value(&c).unwrap();
        assert_eq!(back["term"]["id"], 4);
        assert_eq!(back["name"], "Biology");
    }

    #[test]
    fn enrollment_type_field() {
        let json = r#"{"id": 1, "user_id": 2, "course_id": 3, "type": "StudentEnrollment", "enrollment_state": "active"}"#;
        let e: Enrollment = serde_json::from_str(json).unwrap();
        assert_eq!(e.enrollment_type.as_deref(), Some("StudentEnrollment"));
        let back = serde_json::to_value(&e).unwrap();
        assert_eq!(back["type"], "StudentEnrollment");
    }

    #[test]
    fn bucket_parse_and_serde() {
        assert_eq!("Unsubmitted".parse::<Bucket>(), Ok(Bucket::Unsubmitted));
        assert!("late".parse::<Bucket>().is_err());
        assert_eq!(serde_json::to_string(&Bucket::Overdue).unwrap(), "\"overdue\"");
        assert_eq!(Bucket::Past.to_string(), "past");
    }

    #[test]
    fn student_without_courses_omits_annex() {
        let s: Student = serde_json::from_str(r#"{"id": 7, "name": "Ada"}"#).unwrap();
        let v = serde_json::to_value(&s).unwrap();
        assert!(v.get("course_ids").is_none());
    }

    #[test]
    fn decorated_student_flattens() {
        let student: Student = serde_json::from_str(r#"{"id": 7, "name": "Ada"}"#).unwrap();
        let missing: MissingAssignment =
            serde_json::from_str(r#"{"id": 90, "course_id": 1, "name": "Essay"}"#).unwrap();
        let decorated = StudentWithMissingAssignments {
            student,
            missing_assignments: vec![missing],
        };
        let v = serde_json::to_value(&decorated).unwrap();
        assert_eq!(v["id"], 7);
        assert_eq!(v["missing_assignments"][0]["name"], "Essay");
    }
}
