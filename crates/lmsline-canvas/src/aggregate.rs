//! Report aggregation: resolvers driven stage by stage
//!
//! Stages run strictly in order and every fetch is awaited before the next
//! one starts: the API rate-limits per credential, and child queries need
//! their parent's id. The first failure aborts the whole aggregation.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use lmsline_core::{ProgressContext, UpstreamError, step_message};

use crate::api::CanvasApi;
use crate::records::{
    Assignment, Bucket, Course, CourseWithMissingAssignments, Enrollment, MissingAssignment,
    Student, StudentWithMissingAssignments, Submission,
};

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Courses,
    Rosters,
    Submissions,
    Enrollments,
    MissingAssignments,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::Rosters => "rosters",
            Self::Submissions => "submissions",
            Self::Enrollments => "enrollments",
            Self::MissingAssignments => "missing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Upstream failure tagged with the stage it aborted.
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub source: UpstreamError,
}

impl StageError {
    fn at(stage: Stage) -> impl FnOnce(UpstreamError) -> Self {
        move |source| Self { stage, source }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.source)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Students deduplicated by id, in first-seen order.
///
/// The first record for an id is kept; later sightings only add the course
/// to its membership annex.
#[derive(Debug, Default, Clone)]
pub struct StudentSet {
    index: FxHashMap<u64, usize>,
    students: Vec<Student>,
}

impl StudentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one course's roster. Returns how many students were new.
    pub fn merge(&mut self, course_id: u64, roster: Vec<Student>) -> usize {
        let mut added = 0;
        for mut student in roster {
            let pos = match self.index.get(&student.id).copied() {
                Some(pos) => pos,
                None => {
                    student.course_ids.clear();
                    self.index.insert(student.id, self.students.len());
                    self.students.push(student);
                    added += 1;
                    self.students.len() - 1
                }
            };
            let course_ids = &mut self.students[pos].course_ids;
            if !course_ids.contains(&course_id) {
                course_ids.push(course_id);
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn as_slice(&self) -> &[Student] {
        &self.students
    }

    pub fn into_vec(self) -> Vec<Student> {
        self.students
    }
}

/// Missing assignments that belong to `course_id`.
pub fn missing_for_course(missing: &[MissingAssignment], course_id: u64) -> Vec<MissingAssignment> {
    missing
        .iter()
        .filter(|m| m.course_id == course_id)
        .cloned()
        .collect()
}

/// Ids in first-seen order, repeats dropped.
///
/// Bucket queries overlap, so the same assignment can come back more than
/// once for a course; its submissions are fetched once.
fn unique_ids(ids: impl Iterator<Item = u64>) -> Vec<u64> {
    let mut seen = FxHashSet::default();
    ids.filter(|id| seen.insert(*id)).collect()
}

/// Fully materialized result of the extract report.
#[derive(Debug, Default)]
pub struct Extract {
    pub courses: Vec<Course>,
    pub students: Vec<Student>,
    pub assignments: Vec<Assignment>,
    pub submissions: Vec<Submission>,
    pub enrollments: Vec<Enrollment>,
}

/// Course roster and assignments, gathered before any submission fetch.
struct CourseWork {
    course_id: u64,
    assignment_ids: Vec<u64>,
}

/// Run the extract report for `year`.
///
/// Stages: courses → rosters (students + assignments per course) →
/// submissions per assignment → enrollments per deduplicated student.
pub async fn extract(
    api: &CanvasApi,
    year: i32,
    buckets: &[Bucket],
    progress: &ProgressContext,
) -> Result<Extract, StageError> {
    let courses = fetch_courses(api, year, progress).await?;

    // Rosters
    let pb = progress.stage_line(Stage::Rosters.name());
    let mut students = StudentSet::new();
    let mut assignments = Vec::new();
    let mut work = Vec::with_capacity(courses.len());
    for (i, course) in courses.iter().enumerate() {
        pb.set_message(step_message("course", i, courses.len()));
        let roster = api
            .students_for_course(course.id)
            .await
            .map_err(StageError::at(Stage::Rosters))?;
        let course_assignments = api
            .assignments_for_course(course.id, buckets)
            .await
            .map_err(StageError::at(Stage::Rosters))?;

        let added = students.merge(course.id, roster);
        log::debug!(
            "course {}: {added} new students, {} assignments",
            course.id,
            course_assignments.len()
        );
        work.push(CourseWork {
            course_id: course.id,
            assignment_ids: unique_ids(course_assignments.iter().map(|a| a.id)),
        });
        assignments.extend(course_assignments);
    }
    pb.finish_with_message(format!(
        "{} students, {} assignments",
        students.len(),
        assignments.len()
    ));
    log::info!(
        "Rosters: {} students, {} assignments",
        students.len(),
        assignments.len()
    );

    // Submissions
    let pb = progress.stage_line(Stage::Submissions.name());
    let total: usize = work.iter().map(|w| w.assignment_ids.len()).sum();
    let mut submissions = Vec::new();
    let mut done = 0;
    for w in &work {
        for &assignment_id in &w.assignment_ids {
            pb.set_message(step_message("assignment", done, total));
            let batch = api
                .submissions_for_assignment(w.course_id, assignment_id)
                .await
                .map_err(StageError::at(Stage::Submissions))?;
            submissions.extend(batch);
            done += 1;
        }
    }
    pb.finish_with_message(format!("{} submissions", submissions.len()));
    log::info!("Submissions: {}", submissions.len());

    // Enrollments
    let pb = progress.stage_line(Stage::Enrollments.name());
    let mut enrollments = Vec::new();
    for (i, student) in students.as_slice().iter().enumerate() {
        pb.set_message(step_message("student", i, students.len()));
        let batch = api
            .enrollments_for_student(student.id)
            .await
            .map_err(StageError::at(Stage::Enrollments))?;
        enrollments.extend(batch);
    }
    pb.finish_with_message(format!("{} enrollments", enrollments.len()));
    log::info!("Enrollments: {}", enrollments.len());

    Ok(Extract {
        courses,
        students: students.into_vec(),
        assignments,
        submissions,
        enrollments,
    })
}

/// Run the missing-assignments report for `year`.
///
/// For each course, every student's missing assignments are filtered to that
/// course. Students with none are dropped, and so are courses left without
/// students. Each student's list is fetched once per run and reused across
/// their courses.
pub async fn missing_assignments(
    api: &CanvasApi,
    year: i32,
    progress: &ProgressContext,
) -> Result<Vec<CourseWithMissingAssignments>, StageError> {
    let courses = fetch_courses(api, year, progress).await?;

    let pb = progress.stage_line(Stage::MissingAssignments.name());
    let mut by_user: FxHashMap<u64, Vec<MissingAssignment>> = FxHashMap::default();
    let mut flagged_courses = Vec::new();
    let course_count = courses.len();

    for (i, course) in courses.into_iter().enumerate() {
        pb.set_message(step_message("course", i, course_count));
        let roster = api
            .students_for_course(course.id)
            .await
            .map_err(StageError::at(Stage::Rosters))?;

        let mut flagged = Vec::new();
        let mut seen = FxHashSet::default();
        for student in roster {
            if !seen.insert(student.id) {
                continue;
            }
            if !by_user.contains_key(&student.id) {
                let missing = api
                    .missing_assignments_for_user(student.id)
                    .await
                    .map_err(StageError::at(Stage::MissingAssignments))?;
                by_user.insert(student.id, missing);
            }
            let for_course = missing_for_course(&by_user[&student.id], course.id);
            if !for_course.is_empty() {
                flagged.push(StudentWithMissingAssignments {
                    student,
                    missing_assignments: for_course,
                });
            }
        }

        if flagged.is_empty() {
            log::debug!("course {}: no missing assignments", course.id);
        } else {
            log::debug!(
                "course {}: {} students with missing assignments",
                course.id,
                flagged.len()
            );
            flagged_courses.push(CourseWithMissingAssignments {
                course,
                students: flagged,
            });
        }
    }

    let students: usize = flagged_courses.iter().map(|c| c.students.len()).sum();
    pb.finish_with_message(format!(
        "{} courses, {students} students",
        flagged_courses.len()
    ));
    log::info!(
        "Missing assignments: {} courses, {students} students",
        flagged_courses.len()
    );
    Ok(flagged_courses)
}

async fn fetch_courses(
    api: &CanvasApi,
    year: i32,
    progress: &ProgressContext,
) -> Result<Vec<Course>, StageError> {
    let pb = progress.stage_line(Stage::Courses.name());
    pb.set_message(format!("courses running in {year}"));
    let courses = api
        .courses_for_year(year)
        .await
        .map_err(StageError::at(Stage::Courses))?;
    pb.finish_with_message(format!("{} courses", courses.len()));
    log::info!("Courses: {} running in {year}", courses.len());
    Ok(courses)
}
