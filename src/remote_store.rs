use crate::assessment::{Assessment, NewAssessment};
use crate::config::RemoteConfig;
use crate::connection::{build_client, send_http_request, HttpMethod};
use crate::credentials::ApiCredentials;
use crate::error::StorageError;
use crate::rubric::ClassRubric;
use crate::score::{Score, ScoreWrite};
use crate::store::GradeStore;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

// Percent-encodes a free-text key so it stays one path segment. Dot segments
// are refused since URL parsing resolves them even when escaped.
fn path_segment(raw: &str) -> Result<String, StorageError> {
    match raw {
        "" | "." | ".." => Err(StorageError::InvalidKey(raw.to_string())),
        _ => Ok(urlencoding::encode(raw).into_owned()),
    }
}

#[derive(Deserialize)]
struct PublishResponse {
    updated: usize,
}

/// Remote tier: the school's HTTP JSON API.
///
/// Endpoints (relative to `credentials.url_api`):
/// - `classes/{id}/grading-rubrics/` GET / PUT
/// - `classes/{id}/assessments/` GET / POST, `assessments/{id}/` GET / PUT / DELETE
/// - `classes/{id}/scores/` GET / POST (upsert), `students/{id}/scores/` GET
/// - `assessments/{id}/scores/` GET, `assessments/{id}/scores/{student}/` DELETE
/// - `assessments/{id}/scores/publish/` POST `{"is_published": bool}` → `{"updated": n}`
/// - `assessments/{id}/scores/{student}/publish/` POST `{"is_published": bool}` → score
///
/// A 404 on a single-entity read, publish or delete means "absent". Student ids
/// are percent-encoded into a single path segment.
pub struct RemoteStore {
    credentials: ApiCredentials,
    client: Client,
}

impl RemoteStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, StorageError> {
        Ok(RemoteStore {
            credentials: config.credentials.clone(),
            client: build_client(config.timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.credentials.url_api.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: HttpMethod, path: &str) -> Result<Response, StorageError> {
        send_http_request(&self.client, method, &self.url(path), &self.credentials)
    }

    fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StorageError> {
        let text = response
            .text()
            .map_err(|e| StorageError::Unavailable(format!("failed to read response: {}", e)))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StorageError> {
        Self::decode(self.request(HttpMethod::Get, path)?)
    }

    fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StorageError> {
        match self.request(HttpMethod::Get, path) {
            Ok(response) => Ok(Some(Self::decode(response)?)),
            Err(StorageError::Http { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        post: bool,
        path: &str,
        body: &B,
    ) -> Result<T, StorageError> {
        let body = serde_json::to_value(body)?;
        let method = if post {
            HttpMethod::Post(body)
        } else {
            HttpMethod::Put(body)
        };
        Self::decode(self.request(method, path)?)
    }

    fn delete(&self, path: &str) -> Result<bool, StorageError> {
        match self.request(HttpMethod::Delete, path) {
            Ok(_) => Ok(true),
            Err(StorageError::Http { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl GradeStore for RemoteStore {
    fn fetch_rubric(&self, class_id: u64) -> Result<Option<ClassRubric>, StorageError> {
        self.get_optional(&format!("classes/{}/grading-rubrics/", class_id))
    }

    fn store_rubric(&self, class_id: u64, rubric: &ClassRubric) -> Result<(), StorageError> {
        let body = serde_json::to_value(rubric)?;
        self.request(
            HttpMethod::Put(body),
            &format!("classes/{}/grading-rubrics/", class_id),
        )?;
        Ok(())
    }

    fn fetch_assessments(&self, class_id: u64) -> Result<Vec<Assessment>, StorageError> {
        self.get_json(&format!("classes/{}/assessments/", class_id))
    }

    fn fetch_assessment(&self, assessment_id: u64) -> Result<Option<Assessment>, StorageError> {
        self.get_optional(&format!("assessments/{}/", assessment_id))
    }

    fn insert_assessment(&self, draft: &NewAssessment) -> Result<Assessment, StorageError> {
        self.send_json(true, &format!("classes/{}/assessments/", draft.class_id), draft)
    }

    fn replace_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        let body = serde_json::to_value(assessment)?;
        self.request(
            HttpMethod::Put(body),
            &format!("assessments/{}/", assessment.id),
        )?;
        Ok(())
    }

    fn remove_assessment(&self, assessment_id: u64) -> Result<bool, StorageError> {
        self.delete(&format!("assessments/{}/", assessment_id))
    }

    fn fetch_scores(&self, class_id: u64) -> Result<Vec<Score>, StorageError> {
        self.get_json(&format!("classes/{}/scores/", class_id))
    }

    fn fetch_scores_for_assessment(&self, assessment_id: u64) -> Result<Vec<Score>, StorageError> {
        self.get_json(&format!("assessments/{}/scores/", assessment_id))
    }

    fn fetch_scores_for_student(&self, student_id: &str) -> Result<Vec<Score>, StorageError> {
        self.get_json(&format!("students/{}/scores/", path_segment(student_id)?))
    }

    fn write_score(&self, write: &ScoreWrite) -> Result<Score, StorageError> {
        self.send_json(true, &format!("classes/{}/scores/", write.class_id), write)
    }

    fn set_scores_published(&self, assessment_id: u64, published: bool) -> Result<usize, StorageError> {
        let response: PublishResponse = self.send_json(
            true,
            &format!("assessments/{}/scores/publish/", assessment_id),
            &json!({ "is_published": published }),
        )?;
        Ok(response.updated)
    }

    fn set_score_published(
        &self,
        assessment_id: u64,
        student_id: &str,
        published: bool,
    ) -> Result<Option<Score>, StorageError> {
        let path = format!(
            "assessments/{}/scores/{}/publish/",
            assessment_id,
            path_segment(student_id)?
        );
        match self.send_json(true, &path, &json!({ "is_published": published })) {
            Ok(score) => Ok(Some(score)),
            Err(StorageError::Http { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove_score(&self, assessment_id: u64, student_id: &str) -> Result<bool, StorageError> {
        self.delete(&format!(
            "assessments/{}/scores/{}/",
            assessment_id,
            path_segment(student_id)?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_store() -> RemoteStore {
        RemoteStore::new(&RemoteConfig {
            credentials: ApiCredentials::new("http://127.0.0.1:1/api/"),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_url_joining() {
        let store = unreachable_store();
        assert_eq!(
            store.url("/classes/3/scores/"),
            "http://127.0.0.1:1/api/classes/3/scores/"
        );
    }

    #[test]
    fn test_student_id_is_one_path_segment() {
        assert_eq!(
            path_segment("2021/../../classes/9").unwrap(),
            "2021%2F..%2F..%2Fclasses%2F9"
        );
        assert_eq!(path_segment("2021-00123").unwrap(), "2021-00123");
        assert_eq!(path_segment("ana maria?x=1").unwrap(), "ana%20maria%3Fx%3D1");
        assert!(matches!(path_segment(".."), Err(StorageError::InvalidKey(_))));
        assert!(matches!(path_segment(""), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_dot_student_id_is_refused_before_any_request() {
        let store = unreachable_store();
        assert!(matches!(
            store.remove_score(1, ".."),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.fetch_scores_for_student("."),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_unreachable_backend_reports_unavailable() {
        let store = unreachable_store();
        assert!(store.fetch_rubric(1).unwrap_err().is_unavailable());
        assert!(store.fetch_scores(1).unwrap_err().is_unavailable());
    }
}
