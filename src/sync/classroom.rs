use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{LoadReport, SyncError};
use crate::core::item::{Completion, Item};
use crate::profile::Profile;
use crate::store::ItemStore;

const API_BASE: &str = "https://classroom.googleapis.com";

/// Submission state tag the upstream API uses for work not yet started.
pub const SUBMISSION_CREATED: &str = "CREATED";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub course_state: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DueDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DueTime {
    #[serde(default)]
    pub hours: u32,
    pub minutes: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseWork {
    pub id: String,
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub alternate_link: String,
    pub due_date: Option<DueDate>,
    pub due_time: Option<DueTime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSubmission {
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct CourseList {
    #[serde(default)]
    courses: Vec<Course>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseWorkList {
    #[serde(default)]
    course_work: Vec<CourseWork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionList {
    #[serde(default)]
    student_submissions: Vec<StudentSubmission>,
}

/// Client for the Classroom REST API, authenticated with the ambient
/// session's bearer token.
pub struct ClassroomClient {
    http: Client,
    base_url: String,
    token: String,
}

impl ClassroomClient {
    pub fn new(token: &str) -> Result<Self, SyncError> {
        Self::with_base_url(token, API_BASE)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, SyncError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        context: &'static str,
    ) -> Result<T, SyncError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Auth(format!("{} returned {}", context, status)));
        }
        if !status.is_success() {
            return Err(SyncError::Status { context, status });
        }

        resp.json()
            .await
            .map_err(|e| SyncError::malformed(format!("{}: {}", context, e)))
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>, SyncError> {
        let list: CourseList = self.get_json("/v1/courses", "courses.list").await?;
        Ok(list.courses)
    }

    pub async fn list_course_work(&self, course_id: &str) -> Result<Vec<CourseWork>, SyncError> {
        let list: CourseWorkList = self
            .get_json(
                &format!("/v1/courses/{}/courseWork", course_id),
                "courseWork.list",
            )
            .await?;
        Ok(list.course_work)
    }

    pub async fn list_submissions(
        &self,
        course_id: &str,
        course_work_id: &str,
    ) -> Result<Vec<StudentSubmission>, SyncError> {
        let list: SubmissionList = self
            .get_json(
                &format!(
                    "/v1/courses/{}/courseWork/{}/studentSubmissions",
                    course_id, course_work_id
                ),
                "studentSubmissions.list",
            )
            .await?;
        Ok(list.student_submissions)
    }
}

/// Assemble the UTC due timestamp from the remote record's date and time
/// parts. Minutes are optional upstream and default to zero; a record with no
/// due date at all gets `now` as the unknown-due-date sentinel, which makes
/// it indistinguishable from a genuinely due-now assignment.
pub fn due_timestamp(
    due_date: Option<&DueDate>,
    due_time: Option<&DueTime>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match due_date {
        Some(date) => {
            let time = due_time.copied().unwrap_or_default();
            Utc.with_ymd_and_hms(
                date.year,
                date.month,
                date.day,
                time.hours,
                time.minutes.unwrap_or(0),
                0,
            )
            .single()
            .unwrap_or(now)
        }
        None => now,
    }
}

/// Insert the user-scope path segment into an assignment link so it opens
/// under the preferred account.
pub fn scoped_link(link: &str, preferred_account: &str) -> String {
    link.replace(
        "classroom.google.com/",
        &format!("classroom.google.com/u/{}/", preferred_account),
    )
}

/// Fetch courses, their coursework, and the student's submissions, and insert
/// one Item per not-yet-started assignment.
///
/// Per-course and per-assignment fetches fan out concurrently and are tagged
/// individually in the report, so one failed fetch skips only its own record.
pub async fn load_classroom_items(
    client: &ClassroomClient,
    profile: &Profile,
    store: &ItemStore,
) -> Result<LoadReport, SyncError> {
    let mut report = LoadReport::default();

    // Every course the student has ever enrolled in, minus archived ones.
    let courses = client.list_courses().await?;
    let current: Vec<Course> = courses
        .into_iter()
        .filter(|course| course.course_state != "ARCHIVED")
        .collect();

    let names_by_course: HashMap<&str, &str> = current
        .iter()
        .map(|course| (course.id.as_str(), course.name.as_str()))
        .collect();

    let work_batches = join_all(current.iter().map(|course| async move {
        (course, client.list_course_work(&course.id).await)
    }))
    .await;

    let mut assignments: Vec<CourseWork> = Vec::new();
    for (course, result) in work_batches {
        match result {
            Ok(works) => assignments.extend(works),
            Err(e) => report.record_skip(format!("courseWork for {}: {}", course.name, e)),
        }
    }

    // There is only ever one submission per assignment in the student view.
    let pairs = join_all(assignments.iter().map(|work| async move {
        client
            .list_submissions(&work.course_id, &work.id)
            .await
            .map(|submissions| (work, submissions.into_iter().next()))
    }))
    .await;

    let preferred_account = profile.preferred_account();
    let now = Utc::now();
    let mut titles: Vec<String> = Vec::new();

    for result in pairs {
        let (work, submission) = match result {
            Ok(pair) => pair,
            Err(e) => {
                report.record_skip(format!("studentSubmissions: {}", e));
                continue;
            }
        };
        let Some(submission) = submission else {
            report.record_skip(format!("no submission for {}", work.title));
            continue;
        };
        titles.push(work.title.clone());

        if submission.state != SUBMISSION_CREATED {
            continue;
        }
        let Some(class_name) = names_by_course.get(work.course_id.as_str()) else {
            report.record_skip(format!("unknown course {} for {}", work.course_id, work.title));
            continue;
        };

        // Every submission reaching this point is CREATED, so this always
        // lands on Incomplete; the Complete arm mirrors the upstream mapping.
        let completed = if submission.state != SUBMISSION_CREATED {
            Completion::Complete
        } else {
            Completion::Incomplete
        };

        store.insert(Item::new(
            work.title.clone(),
            *class_name,
            work.description.clone(),
            scoped_link(&work.alternate_link, &preferred_account),
            due_timestamp(work.due_date.as_ref(), work.due_time.as_ref(), now),
            completed,
        ));
        report.inserted += 1;
    }

    log::info!(
        "Loaded {} Classroom assignments from {} courses: {:?}",
        report.inserted,
        current.len(),
        titles
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_timestamp_defaults_minutes_to_zero() {
        let now = Utc::now();
        let date = DueDate {
            year: 2026,
            month: 9,
            day: 14,
        };
        let time = DueTime {
            hours: 23,
            minutes: None,
        };
        assert_eq!(
            due_timestamp(Some(&date), Some(&time), now),
            Utc.with_ymd_and_hms(2026, 9, 14, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn due_timestamp_uses_minutes_when_present() {
        let now = Utc::now();
        let date = DueDate {
            year: 2026,
            month: 9,
            day: 14,
        };
        let time = DueTime {
            hours: 23,
            minutes: Some(59),
        };
        assert_eq!(
            due_timestamp(Some(&date), Some(&time), now),
            Utc.with_ymd_and_hms(2026, 9, 14, 23, 59, 0).unwrap()
        );
    }

    #[test]
    fn due_timestamp_without_date_is_now_sentinel() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(due_timestamp(None, None, now), now);
    }

    #[test]
    fn due_timestamp_with_date_but_no_time_is_midnight() {
        let now = Utc::now();
        let date = DueDate {
            year: 2026,
            month: 2,
            day: 3,
        };
        assert_eq!(
            due_timestamp(Some(&date), None, now),
            Utc.with_ymd_and_hms(2026, 2, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn scoped_link_inserts_user_segment() {
        assert_eq!(
            scoped_link("https://classroom.google.com/c/abc/a/def/details", "1"),
            "https://classroom.google.com/u/1/c/abc/a/def/details"
        );
        assert_eq!(
            scoped_link("https://classroom.google.com/c/abc", "0"),
            "https://classroom.google.com/u/0/c/abc"
        );
    }

    #[test]
    fn course_work_deserializes_with_optional_fields_missing() {
        let work: CourseWork = serde_json::from_str(
            r#"{"id":"w1","courseId":"c1","title":"Essay"}"#,
        )
        .unwrap();
        assert_eq!(work.description, "");
        assert_eq!(work.alternate_link, "");
        assert!(work.due_date.is_none());
        assert!(work.due_time.is_none());
    }

    #[test]
    fn envelope_with_no_course_work_is_empty() {
        let list: CourseWorkList = serde_json::from_str("{}").unwrap();
        assert!(list.course_work.is_empty());
    }
}
