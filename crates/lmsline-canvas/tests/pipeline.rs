//! End-to-end report runs against a mock Canvas server

use std::path::Path;

use lmsline_canvas::{Config, MISSING_EXPORT, RunArgs, Stage, StageError, run_extract, run_missing};
use lmsline_core::ProgressContext;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, out: &Path) -> Config {
    Config::try_from(RunArgs {
        base_url: Some(server.uri()),
        token: Some("secret".to_string()),
        account_id: Some("1".to_string()),
        year: Some(2022),
        output_dir: Some(out.to_path_buf()),
        ..Default::default()
    })
    .unwrap()
}

/// Serve `body` for GET `resource`, optionally requiring one query pair.
async fn serve(
    server: &MockServer,
    resource: &str,
    query: Option<(&str, &str)>,
    body: Value,
    calls: u64,
) {
    let mock = Mock::given(method("GET")).and(path(resource));
    let mock = match query {
        Some((key, value)) => mock.and(query_param(key, value)),
        None => mock,
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(calls)
        .mount(server)
        .await;
}

fn read(out: &Path, name: &str) -> String {
    std::fs::read_to_string(out.join(format!("{name}.csv"))).unwrap()
}

fn data_lines(content: &str) -> Vec<&str> {
    content.lines().skip(1).collect()
}

async fn mount_courses(server: &MockServer, available: Value, completed: Value) {
    let resource = "/api/v1/accounts/1/courses";
    serve(server, resource, Some(("state", "available")), available, 1).await;
    serve(server, resource, Some(("state", "completed")), completed, 1).await;
}

fn course(id: u64, name: &str, start: &str, end: Option<&str>, state: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "start_at": start,
        "end_at": end,
        "workflow_state": state,
    })
}

#[tokio::test]
async fn extract_report_writes_five_tables() {
    let server = MockServer::start().await;
    mount_courses(
        &server,
        json!([course(
            1,
            "Algebra",
            "2022-01-10T00:00:00Z",
            Some("2022-06-01T00:00:00Z"),
            "available"
        )]),
        json!([
            course(
                3,
                "Old",
                "2019-01-01T00:00:00Z",
                Some("2019-12-31T00:00:00Z"),
                "completed"
            ),
            course(2, "Biology", "2021-08-01T00:00:00Z", None, "completed"),
        ]),
    )
    .await;

    let role = Some(("enrollment_role_id", "3"));
    serve(
        &server,
        "/api/v1/courses/1/users",
        role,
        json!([{"id": 7, "name": "Ada"}, {"id": 8, "name": "Ben"}]),
        1,
    )
    .await;
    serve(
        &server,
        "/api/v1/courses/2/users",
        role,
        json!([{"id": 8, "name": "Benjamin"}, {"id": 9, "name": "Cy"}]),
        1,
    )
    .await;

    let essay = json!({"id": 100, "course_id": 1, "name": "Essay"});
    let quiz = json!({"id": 101, "course_id": 1, "name": "Quiz"});
    let lab = json!({"id": 200, "course_id": 2, "name": "Lab"});
    serve(
        &server,
        "/api/v1/courses/1/assignments",
        Some(("bucket", "past")),
        json!([essay]),
        1,
    )
    .await;
    serve(
        &server,
        "/api/v1/courses/1/assignments",
        Some(("bucket", "overdue")),
        json!([essay, quiz]),
        1,
    )
    .await;
    serve(
        &server,
        "/api/v1/courses/2/assignments",
        Some(("bucket", "past")),
        json!([]),
        1,
    )
    .await;
    serve(
        &server,
        "/api/v1/courses/2/assignments",
        Some(("bucket", "overdue")),
        json!([lab]),
        1,
    )
    .await;

    // Listed under both buckets, fetched once
    serve(
        &server,
        "/api/v1/courses/1/assignments/100/submissions",
        None,
        json!([{"id": 1000, "assignment_id": 100, "user_id": 7, "workflow_state": "graded"}]),
        1,
    )
    .await;
    serve(
        &server,
        "/api/v1/courses/1/assignments/101/submissions",
        None,
        json!([{"id": 1001, "assignment_id": 101, "user_id": 8}]),
        1,
    )
    .await;
    serve(
        &server,
        "/api/v1/courses/2/assignments/200/submissions",
        None,
        json!([]),
        1,
    )
    .await;

    for (user, course) in [(7, 1), (8, 1), (9, 2)] {
        let enrollment = json!({
            "id": user * 10,
            "user_id": user,
            "course_id": course,
            "type": "StudentEnrollment",
        });
        let resource = format!("/api/v1/users/{user}/enrollments");
        serve(&server, &resource, None, json!([enrollment]), 1).await;
    }

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let summary = run_extract(&config(&server, &out), &ProgressContext::hidden())
        .await
        .unwrap();

    assert!(summary.exports.is_complete());
    assert_eq!(summary.exports.written.len(), 5);
    assert_eq!(
        summary.counts,
        vec![
            ("courses", 2),
            ("students", 3),
            ("assignments", 4),
            ("submissions", 2),
            ("enrollments", 3),
        ]
    );

    let courses = read(&out, "courses");
    assert!(courses.starts_with("id,name,start_at,end_at,workflow_state\n"));
    let course_rows = data_lines(&courses);
    assert!(course_rows[0].starts_with("1,Algebra,"));
    assert!(course_rows[1].starts_with("2,Biology,2021-08-01T00:00:00Z,,completed"));

    // First occurrence wins; membership accumulates
    let students = read(&out, "students");
    let student_rows = data_lines(&students);
    assert_eq!(student_rows.len(), 3);
    assert!(student_rows[1].starts_with("8,Ben,"));
    assert!(student_rows[1].contains("\"[1,2]\""));

    // Bucket results concatenated, not deduplicated
    let assignments = read(&out, "assignments");
    let bucket_col: Vec<&str> = data_lines(&assignments)
        .iter()
        .map(|l| l.rsplit(',').next().unwrap())
        .collect();
    assert_eq!(bucket_col, vec!["past", "overdue", "overdue", "overdue"]);

    let submissions = read(&out, "submissions");
    assert!(submissions.starts_with("id,course_id,assignment_id,user_id"));
    assert_eq!(
        data_lines(&submissions),
        vec!["1000,1,100,7,graded,", "1001,1,101,8,,"]
    );

    assert_eq!(data_lines(&read(&out, "enrollments")).len(), 3);
}

#[tokio::test]
async fn upstream_failure_aborts_before_any_export() {
    let server = MockServer::start().await;
    let in_year = |id: u64| json!({"id": id, "start_at": "2022-01-01", "end_at": "2022-12-31"});
    mount_courses(
        &server,
        json!([in_year(1), in_year(2), in_year(3)]),
        json!([]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v1/courses/\d+/users$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7}])))
        .mount(&server)
        .await;
    serve(
        &server,
        "/api/v1/courses/1/assignments",
        None,
        json!([{"id": 100}]),
        2,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/courses/2/assignments"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/courses/3/assignments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/submissions$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v1/users/\d+/enrollments$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let err = run_extract(&config(&server, &out), &ProgressContext::hidden())
        .await
        .unwrap_err();

    let stage_err = err.downcast_ref::<StageError>().expect("stage error");
    assert_eq!(stage_err.stage, Stage::Rosters);
    assert_eq!(stage_err.source.status(), Some(500));
    assert_eq!(stage_err.source.path(), "/api/v1/courses/2/assignments");
    assert!(!out.exists());
}

#[tokio::test]
async fn missing_report_filters_per_course() {
    let server = MockServer::start().await;
    let in_year = |id: u64, name: &str| {
        json!({"id": id, "name": name, "start_at": "2022-01-01", "end_at": "2022-12-31"})
    };
    mount_courses(
        &server,
        json!([
            in_year(1, "Algebra"),
            in_year(2, "Biology"),
            in_year(3, "Chemistry")
        ]),
        json!([]),
    )
    .await;

    let ada = json!({"id": 7, "name": "Ada"});
    let ben = json!({"id": 8, "name": "Ben"});
    let roster = json!([ada, ben]);
    serve(&server, "/api/v1/courses/1/users", None, roster, 1).await;
    serve(&server, "/api/v1/courses/2/users", None, json!([ada]), 1).await;
    serve(&server, "/api/v1/courses/3/users", None, json!([ben]), 1).await;

    // One fetch per student per run, reused across courses
    serve(
        &server,
        "/api/v1/users/7/missing_submissions",
        None,
        json!([
            {"id": 100, "course_id": 1, "name": "Essay"},
            {"id": 200, "course_id": 2, "name": "Lab"}
        ]),
        1,
    )
    .await;
    serve(
        &server,
        "/api/v1/users/8/missing_submissions",
        None,
        json!([]),
        1,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let summary = run_missing(&config(&server, dir.path()), &ProgressContext::hidden())
        .await
        .unwrap();

    assert_eq!(summary.counts, vec![("courses", 2), ("students", 2)]);
    let content = read(dir.path(), MISSING_EXPORT);
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines[0],
        "course_id,course_name,student_id,student_name,sortable_name,login_id,missing_count,missing_assignments"
    );
    assert!(lines[1].starts_with("1,Algebra,7,Ada,,,1,"));
    assert!(lines[1].contains("\"\"name\"\":\"\"Essay\"\""));
    assert!(!lines[1].contains("Lab"));
    assert!(lines[2].starts_with("2,Biology,7,Ada,,,1,"));
    assert!(lines[2].contains("Lab"));
    assert_eq!(lines.len(), 3);
}

#[tokio::test]
async fn course_fetch_failure_reports_courses_stage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/1/courses"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = run_missing(&config(&server, dir.path()), &ProgressContext::hidden())
        .await
        .unwrap_err();
    let stage_err = err.downcast_ref::<StageError>().expect("stage error");
    assert_eq!(stage_err.stage, Stage::Courses);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
