use std::time::Instant;

use log::{debug, trace};
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use super::core::{decode_json, GitLabClient, GitLabInstance};
use super::pagination::{fetch_all, Page, MAX_PER_PAGE};
use crate::error::{GitLabToolsError, Result};
use crate::providers::gitlab::types::{Pipeline, PipelineRecord, Project};

pub const QUERY_PAGE: &str = "page";
pub const QUERY_PER_PAGE: &str = "per_page";
pub const QUERY_ORDER_BY: &str = "order_by";
pub const QUERY_SORT: &str = "sort";
/// Wire name of `Pipeline::id`, used as the `order_by` value.
pub const PIPELINE_FIELD_ID: &str = "id";
const SORT_DESCENDING: &str = "desc";

impl GitLabClient {
    /// Lists every pipeline of a project, newest (highest id) first.
    ///
    /// Walks all pages of `GET /projects/{id}/pipelines` and drops entries
    /// without an id or status.
    pub async fn list_pipelines(
        &self,
        instance: &GitLabInstance,
        project_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Pipeline>> {
        let started = Instant::now();
        let base_url = instance.api_url(&["projects", &project_id.to_string(), "pipelines"])?;
        let per_page = MAX_PER_PAGE.to_string();

        let records = fetch_all(MAX_PER_PAGE, |page_number| {
            let mut url = base_url.clone();
            url.query_pairs_mut()
                .append_pair(QUERY_PAGE, &page_number.to_string())
                .append_pair(QUERY_PER_PAGE, &per_page)
                .append_pair(QUERY_ORDER_BY, PIPELINE_FIELD_ID)
                .append_pair(QUERY_SORT, SORT_DESCENDING);

            async move {
                let response = self.send(instance, Method::GET, &url, cancel).await?;
                let headers = response.headers().clone();
                let items: Vec<PipelineRecord> = decode_json(&Method::GET, &url, response).await?;
                trace!(
                    "Fetched page {page_number} with {} pipelines for project {project_id}",
                    items.len()
                );
                Ok(Page::from_headers(page_number, items, &headers))
            }
        })
        .await?;

        let fetched = records.len();
        let pipelines: Vec<Pipeline> = records
            .into_iter()
            .filter_map(PipelineRecord::into_pipeline)
            .collect();

        if pipelines.len() < fetched {
            debug!(
                "Ignored {} pipelines without id or status for project {project_id}",
                fetched - pipelines.len()
            );
        }
        debug!(
            "Duration list_pipelines({project_id}): {} ms",
            started.elapsed().as_millis()
        );

        Ok(pipelines)
    }

    /// Deletes one pipeline. A 404 is a failure like any other status.
    pub async fn delete_pipeline(
        &self,
        instance: &GitLabInstance,
        project_id: u64,
        pipeline_id: u64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = instance.api_url(&[
            "projects",
            &project_id.to_string(),
            "pipelines",
            &pipeline_id.to_string(),
        ])?;
        self.send(instance, Method::DELETE, &url, cancel).await?;
        Ok(())
    }

    /// Deletes `pipelines` one after another, in the given order, stopping at
    /// the first failure or when `cancel` fires.
    pub async fn delete_pipelines(
        &self,
        instance: &GitLabInstance,
        project: &Project,
        pipelines: &[Pipeline],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        let project_id = project.id.ok_or_else(|| {
            GitLabToolsError::Validation(format!(
                "project '{}' has no id",
                project.display_name()
            ))
        })?;

        for pipeline in pipelines {
            if cancel.is_cancelled() {
                return Err(GitLabToolsError::Cancelled);
            }
            trace!(
                "Deleting old pipeline {} from project id '{project_id}' ('{}')",
                pipeline.id,
                project.display_name()
            );
            self.delete_pipeline(instance, project_id, pipeline.id, cancel)
                .await?;
            trace!(
                "Old pipeline {} from project id '{project_id}' ('{}') deleted successfully",
                pipeline.id,
                project.display_name()
            );
        }

        debug!(
            "Duration delete_pipelines({project_id}, {} pipelines): {} ms",
            pipelines.len(),
            started.elapsed().as_millis()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use crate::providers::gitlab::client::core::HttpSettings;
    use crate::providers::gitlab::client::retry::RetryPolicy;
    use crate::providers::gitlab::types::PipelineStatus;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    const TOKEN: &str = "glpat-unittest";
    const PROJECT_ID: u64 = 1147;
    const PIPELINES_PATH: &str = "/api/v4/projects/1147/pipelines";

    fn client() -> GitLabClient {
        let settings = HttpSettings {
            retry: RetryPolicy::new(2).with_backoff(|_| Duration::ZERO),
            ..HttpSettings::default()
        };
        GitLabClient::new(&settings).unwrap()
    }

    fn instance(server: &mockito::ServerGuard) -> GitLabInstance {
        GitLabInstance::new(&server.url(), Token::from(TOKEN)).unwrap()
    }

    fn page_query(page: u32) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), page.to_string()),
            Matcher::UrlEncoded("per_page".into(), "100".into()),
            Matcher::UrlEncoded("order_by".into(), "id".into()),
            Matcher::UrlEncoded("sort".into(), "desc".into()),
        ])
    }

    /// JSON array of `count` successful pipelines with descending ids.
    fn pipelines_body(first_id: u64, count: u64) -> String {
        let items: Vec<_> = (0..count)
            .map(|offset| {
                json!({
                    "id": first_id - offset,
                    "status": "success",
                    "created_at": "2024-03-01T10:00:00.000Z"
                })
            })
            .collect();
        serde_json::Value::Array(items).to_string()
    }

    fn project() -> Project {
        Project {
            id: Some(PROJECT_ID),
            name: Some("api".into()),
            ..Project::default()
        }
    }

    mod list_pipelines {
        use super::*;

        #[tokio::test]
        async fn walks_all_pages_until_total_pages() {
            let mut server = mockito::Server::new_async().await;
            let first = server
                .mock("GET", PIPELINES_PATH)
                .match_query(page_query(1))
                .match_header("PRIVATE-TOKEN", TOKEN)
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_header("x-page", "1")
                .with_header("x-total-pages", "2")
                .with_header("x-per-page", "100")
                .with_header("x-total", "130")
                .with_body(pipelines_body(500, 100))
                .expect(1)
                .create_async()
                .await;
            let second = server
                .mock("GET", PIPELINES_PATH)
                .match_query(page_query(2))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_header("x-page", "2")
                .with_header("x-total-pages", "2")
                .with_body(pipelines_body(400, 30))
                .expect(1)
                .create_async()
                .await;

            let pipelines = client()
                .list_pipelines(&instance(&server), PROJECT_ID, &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(pipelines.len(), 130);
            assert_eq!(pipelines.first().map(|p| p.id), Some(500));
            assert_eq!(pipelines.last().map(|p| p.id), Some(371));
            assert!(pipelines.iter().all(|p| p.status == PipelineStatus::Success));
            first.assert_async().await;
            second.assert_async().await;
        }

        #[tokio::test]
        async fn stops_on_short_page_without_headers() {
            let mut server = mockito::Server::new_async().await;
            let only = server
                .mock("GET", PIPELINES_PATH)
                .match_query(page_query(1))
                .with_status(200)
                .with_body(pipelines_body(10, 10))
                .expect(1)
                .create_async()
                .await;
            let beyond = server
                .mock("GET", PIPELINES_PATH)
                .match_query(page_query(2))
                .with_status(200)
                .with_body("[]")
                .expect(0)
                .create_async()
                .await;

            let pipelines = client()
                .list_pipelines(&instance(&server), PROJECT_ID, &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(pipelines.len(), 10);
            only.assert_async().await;
            beyond.assert_async().await;
        }

        #[tokio::test]
        async fn drops_pipelines_without_id_or_status() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", PIPELINES_PATH)
                .match_query(page_query(1))
                .with_status(200)
                .with_body(
                    json!([
                        {"id": 3, "status": "failed"},
                        {"status": "success"},
                        {"id": 1},
                        {"id": 0, "status": "running"}
                    ])
                    .to_string(),
                )
                .create_async()
                .await;

            let pipelines = client()
                .list_pipelines(&instance(&server), PROJECT_ID, &CancellationToken::new())
                .await
                .unwrap();

            let ids: Vec<_> = pipelines.iter().map(|p| p.id).collect();
            assert_eq!(ids, vec![3, 0]);
        }

        #[tokio::test]
        async fn empty_project_makes_a_single_request() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", PIPELINES_PATH)
                .match_query(page_query(1))
                .with_status(200)
                .with_header("x-total-pages", "0")
                .with_body("[]")
                .expect(1)
                .create_async()
                .await;

            let pipelines = client()
                .list_pipelines(&instance(&server), PROJECT_ID, &CancellationToken::new())
                .await
                .unwrap();

            assert!(pipelines.is_empty());
            mock.assert_async().await;
        }

        #[tokio::test]
        async fn cancelled_token_aborts_before_any_request() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", PIPELINES_PATH)
                .match_query(Matcher::Any)
                .expect(0)
                .create_async()
                .await;
            let cancel = CancellationToken::new();
            cancel.cancel();

            let err = client()
                .list_pipelines(&instance(&server), PROJECT_ID, &cancel)
                .await
                .unwrap_err();

            assert!(matches!(err, GitLabToolsError::Cancelled));
            mock.assert_async().await;
        }

        #[tokio::test]
        async fn cancellation_during_first_page_prevents_the_next_request() {
            let mut server = mockito::Server::new_async().await;
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            let first = server
                .mock("GET", PIPELINES_PATH)
                .match_query(page_query(1))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_header("x-total-pages", "2")
                .with_body_from_request(move |_| {
                    trigger.cancel();
                    pipelines_body(500, 100).into_bytes()
                })
                .expect(1)
                .create_async()
                .await;
            let second = server
                .mock("GET", PIPELINES_PATH)
                .match_query(page_query(2))
                .with_status(200)
                .with_body(pipelines_body(400, 30))
                .expect(0)
                .create_async()
                .await;

            let err = client()
                .list_pipelines(&instance(&server), PROJECT_ID, &cancel)
                .await
                .unwrap_err();

            assert!(matches!(err, GitLabToolsError::Cancelled));
            first.assert_async().await;
            second.assert_async().await;
        }
    }

    mod delete_pipelines {
        use super::*;

        #[tokio::test]
        async fn deletes_each_pipeline_in_order() {
            let mut server = mockito::Server::new_async().await;
            let mut mocks = Vec::new();
            for id in [1, 2, 3] {
                mocks.push(
                    server
                        .mock("DELETE", format!("{PIPELINES_PATH}/{id}").as_str())
                        .match_header("PRIVATE-TOKEN", TOKEN)
                        .with_status(204)
                        .expect(1)
                        .create_async()
                        .await,
                );
            }
            let created_at = "2024-01-01T00:00:00Z".parse().unwrap();
            let pipelines: Vec<_> = [1, 2, 3]
                .into_iter()
                .map(|id| Pipeline::new(id, PipelineStatus::Success, created_at))
                .collect();

            client()
                .delete_pipelines(&instance(&server), &project(), &pipelines, &CancellationToken::new())
                .await
                .unwrap();

            for mock in mocks {
                mock.assert_async().await;
            }
        }

        #[tokio::test]
        async fn already_deleted_pipeline_is_a_failure_and_stops_the_loop() {
            let mut server = mockito::Server::new_async().await;
            let gone = server
                .mock("DELETE", format!("{PIPELINES_PATH}/1").as_str())
                .with_status(404)
                .expect(1)
                .create_async()
                .await;
            let never = server
                .mock("DELETE", format!("{PIPELINES_PATH}/2").as_str())
                .with_status(204)
                .expect(0)
                .create_async()
                .await;
            let created_at = "2024-01-01T00:00:00Z".parse().unwrap();
            let pipelines = vec![
                Pipeline::new(1, PipelineStatus::Failed, created_at),
                Pipeline::new(2, PipelineStatus::Failed, created_at),
            ];

            let err = client()
                .delete_pipelines(&instance(&server), &project(), &pipelines, &CancellationToken::new())
                .await
                .unwrap_err();

            assert_eq!(err.status(), Some(404));
            gone.assert_async().await;
            never.assert_async().await;
        }

        #[tokio::test]
        async fn cancellation_after_first_deletion_stops_the_loop() {
            let mut server = mockito::Server::new_async().await;
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            let first = server
                .mock("DELETE", format!("{PIPELINES_PATH}/1").as_str())
                .with_status(204)
                .with_body_from_request(move |_| {
                    trigger.cancel();
                    Vec::new()
                })
                .expect(1)
                .create_async()
                .await;
            let second = server
                .mock("DELETE", format!("{PIPELINES_PATH}/2").as_str())
                .with_status(204)
                .expect(0)
                .create_async()
                .await;
            let created_at = "2024-01-01T00:00:00Z".parse().unwrap();
            let pipelines = vec![
                Pipeline::new(1, PipelineStatus::Success, created_at),
                Pipeline::new(2, PipelineStatus::Success, created_at),
            ];

            let err = client()
                .delete_pipelines(&instance(&server), &project(), &pipelines, &cancel)
                .await
                .unwrap_err();

            assert!(matches!(err, GitLabToolsError::Cancelled));
            first.assert_async().await;
            second.assert_async().await;
        }
    }
}
