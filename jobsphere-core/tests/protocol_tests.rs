//! Wire shape of tasks and results

use jobsphere_core::prompts;
use jobsphere_core::protocol::{
    Attempt, AttemptLog, AttemptOutcome, DatePosted, FailureReason, InterviewQuestions, JobItem,
    JobQuery, OrchestrationResult, OrchestrationStatus, SortOrder, Strategy, TaskDescriptor,
    TaskType,
};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

#[test]
fn test_task_descriptor_serialization_roundtrip() {
    let task = prompts::job_search(
        JobQuery::new("rust")
            .with_location("Berlin")
            .with_country("de")
            .with_limit(10),
    )
    .with_deadline(Duration::from_secs(20));

    let json = serde_json::to_value(&task).unwrap();
    assert_eq!(json["task_type"], "search_jobs");
    assert_eq!(json["strategy"], "fanout");
    assert_eq!(json["payload"]["kind"], "job_query");
    assert_eq!(json["payload"]["country"], "de");
    assert_eq!(json["max_results"], 10);

    let restored: TaskDescriptor = serde_json::from_value(json).unwrap();
    assert_eq!(restored, task);
}

#[test]
fn test_job_query_defaults() {
    let query: JobQuery = serde_json::from_value(json!({"query": "data engineer"})).unwrap();
    assert_eq!(query.limit, 20);
    assert!(!query.remote_only);
    assert!(query.location.is_none());
    assert!(query.date_posted.is_none());
    assert!(query.sort_by.is_none());
}

#[test]
fn test_job_query_filters_wire_shape() {
    let query: JobQuery = serde_json::from_value(json!({
        "query": "rust",
        "location": "Remote",
        "job_type": "FULLTIME",
        "date_posted": "3days",
        "salary_min": 70000,
        "sort_by": "relevance"
    }))
    .unwrap();

    assert_eq!(query.date_posted, Some(DatePosted::ThreeDays));
    assert_eq!(query.sort_by, Some(SortOrder::Relevance));
    assert_eq!(query.salary_min, Some(70_000));
    assert_eq!(query.salary_max, None);
    assert_eq!(query.place(), None);

    let json = serde_json::to_value(&query).unwrap();
    assert_eq!(json["date_posted"], "3days");
    assert!(json.get("salary_max").is_none());
}

#[test]
fn test_task_type_defaults() {
    for task in TaskType::ALL {
        let expected = if task == TaskType::SearchJobs {
            Strategy::Fanout
        } else {
            Strategy::Cascade
        };
        assert_eq!(task.default_strategy(), expected, "{}", task);
        assert_eq!(serde_json::to_value(task).unwrap(), Value::from(task.as_str()));
    }
}

#[test]
fn test_failed_result_shape() {
    let mut attempt = Attempt::begin("gemini", 1);
    attempt.outcome = AttemptOutcome::RateLimited;
    attempt.http_status = Some(429);
    attempt.retry_after_ms = Some(17_000);

    let mut attempts = AttemptLog::new();
    attempts.push(attempt);

    let result = OrchestrationResult {
        run_id: Uuid::new_v4(),
        task_type: TaskType::GenerateAnswer,
        status: OrchestrationStatus::Failure,
        data: None,
        served_by: Vec::new(),
        attempts,
        failure_reason: Some(FailureReason::Exhausted),
        elapsed_ms: 412,
    };

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "failure");
    assert_eq!(json["failure_reason"], "exhausted");
    assert!(json.get("data").is_none());
    assert_eq!(json["attempts"][0]["outcome"], "rate_limited");
    assert_eq!(json["attempts"][0]["credential_index"], 1);
    assert!(json["attempts"][0].get("raw_payload").is_none());

    assert_eq!(result.attempts.as_slice()[0].retry_after(), Some(Duration::from_secs(17)));
    assert!(!result.is_success());
    assert_eq!(result.parse_data::<Value>().unwrap(), None);
}

#[test]
fn test_typed_outputs_from_data() {
    let result = OrchestrationResult {
        run_id: Uuid::new_v4(),
        task_type: TaskType::GenerateQuestions,
        status: OrchestrationStatus::Success,
        data: Some(json!({"technical": ["What is Pin?"], "behavioral": ["Describe a conflict."]})),
        served_by: vec!["groq".to_string()],
        attempts: AttemptLog::new(),
        failure_reason: None,
        elapsed_ms: 900,
    };

    let questions: InterviewQuestions = result.parse_data().unwrap().unwrap();
    assert_eq!(questions.technical, vec!["What is Pin?"]);
    assert!(questions.company.is_empty());
}

#[test]
fn test_job_item_optional_fields_skipped() {
    let item = JobItem::new("Rust Engineer", "Acme", "https://acme.example/jobs/1");
    let json = serde_json::to_value(&item).unwrap();

    assert_eq!(json["title"], "Rust Engineer");
    assert!(json.get("salary").is_none());
    assert!(json.get("remote").is_none());
}

#[test]
fn test_failure_reason_messages() {
    assert_eq!(FailureReason::DeadlineExceeded.to_string(), "deadline exceeded");
    assert_eq!(
        FailureReason::NoEligibleProvider.to_string(),
        "every provider for this task is cooling down"
    );
}
