//! Canvas REST resolvers
//!
//! Thin query builders over [`ApiClient::fetch_all`]. Each resolver issues
//! one or more paginated fetches and propagates [`UpstreamError`] as is.

use lmsline_core::{ApiClient, UpstreamError};

use crate::records::{
    Assignment, Bucket, Course, CourseState, Enrollment, MissingAssignment, Student, Submission,
};

/// Canvas API bound to one account.
#[derive(Debug)]
pub struct CanvasApi {
    client: ApiClient,
    account_id: String,
    student_role_id: u64,
}

impl CanvasApi {
    pub fn new(client: ApiClient, account_id: impl Into<String>, student_role_id: u64) -> Self {
        Self {
            client,
            account_id: account_id.into(),
            student_role_id,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// All account courses in one workflow state.
    pub async fn courses_by_state(&self, state: CourseState) -> Result<Vec<Course>, UpstreamError> {
        let path = format!("/api/v1/accounts/{}/courses", self.account_id);
        self.client
            .fetch_all(&path, &[("state", state.as_str().to_string())])
            .await
    }

    /// Available and completed courses running during `year`.
    pub async fn courses_for_year(&self, year: i32) -> Result<Vec<Course>, UpstreamError> {
        let mut courses = Vec::new();
        for state in CourseState::REPORTED {
            let batch = self.courses_by_state(state).await?;
            log::debug!("{} {} courses", batch.len(), state.as_str());
            courses.extend(batch);
        }
        let total = courses.len();
        courses.retain(|c| c.in_year(year));
        log::debug!("{} of {total} courses run during {year}", courses.len());
        Ok(courses)
    }

    /// Users enrolled in the course with the student role.
    pub async fn students_for_course(&self, course_id: u64) -> Result<Vec<Student>, UpstreamError> {
        let path = format!("/api/v1/courses/{course_id}/users");
        self.client
            .fetch_all(
                &path,
                &[("enrollment_role_id", self.student_role_id.to_string())],
            )
            .await
    }

    /// Assignments of a course, one fetch per bucket, concatenated.
    ///
    /// No deduplication: an assignment listed under two buckets appears
    /// twice, tagged with each bucket.
    pub async fn assignments_for_course(
        &self,
        course_id: u64,
        buckets: &[Bucket],
    ) -> Result<Vec<Assignment>, UpstreamError> {
        let path = format!("/api/v1/courses/{course_id}/assignments");
        let mut assignments = Vec::new();
        for &bucket in buckets {
            let batch: Vec<Assignment> = self
                .client
                .fetch_all(&path, &[("bucket", bucket.as_str().to_string())])
                .await?;
            assignments.extend(batch.into_iter().map(|mut a| {
                a.course_id = course_id;
                a.bucket = Some(bucket);
                a
            }));
        }
        Ok(assignments)
    }

    /// Submissions for one course + assignment pair.
    pub async fn submissions_for_assignment(
        &self,
        course_id: u64,
        assignment_id: u64,
    ) -> Result<Vec<Submission>, UpstreamError> {
        let path = format!("/api/v1/courses/{course_id}/assignments/{assignment_id}/submissions");
        let mut submissions: Vec<Submission> = self.client.fetch_all(&path, &[]).await?;
        for s in &mut submissions {
            s.course_id = Some(course_id);
        }
        Ok(submissions)
    }

    /// Past-due unsubmitted assignments across all of the user's courses.
    pub async fn missing_assignments_for_user(
        &self,
        user_id: u64,
    ) -> Result<Vec<MissingAssignment>, UpstreamError> {
        let path = format!("/api/v1/users/{user_id}/missing_submissions");
        self.client.fetch_all(&path, &[]).await
    }

    pub async fn enrollments_for_student(
        &self,
        user_id: u64,
    ) -> Result<Vec<Enrollment>, UpstreamError> {
        let path = format!("/api/v1/users/{user_id}/enrollments");
        self.client.fetch_all(&path, &[]).await
    }
}
