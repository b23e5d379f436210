use std::time::Instant;

use log::debug;
use tokio_util::sync::CancellationToken;

use super::core::{absent_on_not_found, GitLabClient, GitLabInstance};
use crate::error::Result;
use crate::providers::gitlab::types::{Group, Project};

impl GitLabClient {
    /// Reads a single project.
    ///
    /// # Returns
    ///
    /// `None` when GitLab answers 404, the project otherwise.
    ///
    /// # Errors
    ///
    /// Any other transport failure, after retries where applicable.
    pub async fn read_project(
        &self,
        instance: &GitLabInstance,
        project_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<Project>> {
        let started = Instant::now();
        let url = instance.api_url(&["projects", &project_id.to_string()])?;
        let result = absent_on_not_found(self.get_json::<Project>(instance, &url, cancel).await);
        debug!(
            "Duration read_project({project_id}): {} ms",
            started.elapsed().as_millis()
        );
        result
    }

    /// Reads a single group, including its projects when GitLab embeds them.
    ///
    /// # Returns
    ///
    /// `None` when GitLab answers 404, the group otherwise.
    pub async fn read_group(
        &self,
        instance: &GitLabInstance,
        group_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<Group>> {
        let started = Instant::now();
        let url = instance.api_url(&["groups", &group_id.to_string()])?;
        let result = absent_on_not_found(self.get_json::<Group>(instance, &url, cancel).await);
        debug!(
            "Duration read_group({group_id}): {} ms",
            started.elapsed().as_millis()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use crate::error::{FailureCause, GitLabToolsError};
    use crate::providers::gitlab::client::core::HttpSettings;
    use crate::providers::gitlab::client::retry::RetryPolicy;
    use std::time::Duration;

    const TOKEN: &str = "glpat-unittest";

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

    mod read_project {
        use super::*;

        #[tokio::test]
        async fn returns_project_and_sends_private_token() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/api/v4/projects/1147")
                .match_header("PRIVATE-TOKEN", TOKEN)
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(
                    r#"{"id": 1147, "name": "api", "http_url_to_repo": "https://gitlab.example.com/team/api.git"}"#,
                )
                .create_async()
                .await;

            let project = client()
                .read_project(&instance(&server), 1147, &CancellationToken::new())
                .await
                .unwrap()
                .unwrap();

            assert_eq!(project.id, Some(1147));
            assert_eq!(project.name.as_deref(), Some("api"));
            assert_eq!(
                project.http_url_to_repo.as_deref(),
                Some("https://gitlab.example.com/team/api.git")
            );
            mock.assert_async().await;
        }

        #[tokio::test]
        async fn not_found_is_absent_without_retries() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/api/v4/projects/1147")
                .with_status(404)
                .with_body(r#"{"message":"404 Project Not Found"}"#)
                .expect(1)
                .create_async()
                .await;

            let project = client()
                .read_project(&instance(&server), 1147, &CancellationToken::new())
                .await
                .unwrap();

            assert!(project.is_none());
            mock.assert_async().await;
        }

        #[tokio::test]
        async fn unauthorized_is_an_error() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/api/v4/projects/1147")
                .with_status(401)
                .with_body(r#"{"message":"401 Unauthorized"}"#)
                .expect(1)
                .create_async()
                .await;

            let err = client()
                .read_project(&instance(&server), 1147, &CancellationToken::new())
                .await
                .unwrap_err();

            assert_eq!(err.status(), Some(401));
            assert!(err.to_string().contains("401 Unauthorized"));
            mock.assert_async().await;
        }

        #[tokio::test]
        async fn retries_transient_failures_until_success() {
            let mut server = mockito::Server::new_async().await;
            let unavailable = server
                .mock("GET", "/api/v4/projects/1147")
                .with_status(503)
                .expect(2)
                .create_async()
                .await;
            let ok = server
                .mock("GET", "/api/v4/projects/1147")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"id": 1147}"#)
                .expect(1)
                .create_async()
                .await;

            let project = client()
                .read_project(&instance(&server), 1147, &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(project.and_then(|p| p.id), Some(1147));
            unavailable.assert_async().await;
            ok.assert_async().await;
        }

        #[tokio::test]
        async fn malformed_body_is_a_decode_failure() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/api/v4/projects/1147")
                .with_status(200)
                .with_body("<html>maintenance</html>")
                .create_async()
                .await;

            let err = client()
                .read_project(&instance(&server), 1147, &CancellationToken::new())
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                GitLabToolsError::RequestFailed {
                    cause: FailureCause::Decode(_),
                    ..
                }
            ));
        }
    }

    mod read_group {
        use super::*;

        #[tokio::test]
        async fn returns_group_with_embedded_projects() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/api/v4/groups/4711")
                .match_header("PRIVATE-TOKEN", TOKEN)
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"id": 4711, "name": "platform", "projects": [{"id": 1147}, {"id": 1148}]}"#)
                .create_async()
                .await;

            let group = client()
                .read_group(&instance(&server), 4711, &CancellationToken::new())
                .await
                .unwrap()
                .unwrap();

            assert_eq!(group.id, Some(4711));
            let ids: Vec<_> = group.projects.iter().filter_map(|p| p.id).collect();
            assert_eq!(ids, vec![1147, 1148]);
            mock.assert_async().await;
        }

        #[tokio::test]
        async fn not_found_is_absent() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/api/v4/groups/4711")
                .with_status(404)
                .create_async()
                .await;

            let group = client()
                .read_group(&instance(&server), 4711, &CancellationToken::new())
                .await
                .unwrap();

            assert!(group.is_none());
        }
    }
}
