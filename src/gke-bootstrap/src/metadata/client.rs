// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{Error, MetadataSource, Result, TokenGrant};
use reqwest::{Client as ReqwestClient, RequestBuilder};

/// A client for the GCP Compute Engine Metadata Service (MDS).
#[derive(Clone, Debug)]
pub struct Client {
    endpoint: String,
    inner: ReqwestClient,
}

impl Client {
    /// Creates a new client for the Metadata Service.
    ///
    /// The `GCE_METADATA_HOST` environment variable takes precedence over
    /// `endpoint_override`. Without either, the client uses
    /// `http://metadata.google.internal`. Like the environment variable, the
    /// override may be a bare `host:port`.
    pub fn new(endpoint_override: Option<String>) -> Self {
        let (endpoint, is_default_endpoint) = Self::resolve_endpoint(endpoint_override);
        let endpoint = endpoint.trim_end_matches('/').to_string();
        tracing::debug!(%endpoint, is_default_endpoint, "using metadata service");

        Self {
            endpoint,
            inner: ReqwestClient::new(),
        }
    }

    /// Determine the endpoint and whether it is the default one.
    fn resolve_endpoint(endpoint_override: Option<String>) -> (String, bool) {
        if let Ok(host) = std::env::var(super::GCE_METADATA_HOST_ENV_VAR) {
            (format!("http://{host}"), false)
        } else if let Some(e) = endpoint_override {
            if e.contains("://") {
                (e, false)
            } else {
                (format!("http://{e}"), false)
            }
        } else {
            (super::METADATA_ROOT.to_string(), true)
        }
    }

    /// Creates a GET request to the MDS service with the correct headers.
    fn request(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}/{}", self.endpoint, super::METADATA_PREFIX, path);
        self.inner
            .get(url)
            .header(super::METADATA_FLAVOR, super::METADATA_FLAVOR_VALUE)
    }

    async fn send(&self, path: &str) -> Result<reqwest::Response> {
        let response = self
            .request(path)
            .send()
            .await
            .map_err(|source| Error::Transport {
                path: path.to_string(),
                source,
            })?;
        Self::check_response_status(path, response).await
    }

    async fn text(&self, path: &str) -> Result<String> {
        self.send(path)
            .await?
            .text()
            .await
            .map_err(|source| Error::Decode {
                path: path.to_string(),
                source,
            })
    }

    async fn check_response_status(
        path: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotDefined(path.to_string()));
        }
        // The body is only used for diagnostics, a failure to read it is not
        // worth reporting over the status code.
        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            path: path.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait::async_trait]
impl MetadataSource for Client {
    async fn get(&self, path: &str) -> Result<String> {
        self.text(path).await
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let body = self.text(path).await?;
        Ok(super::parse_listing(&body))
    }

    async fn access_token(&self) -> Result<TokenGrant> {
        let path = super::TOKEN_PATH;
        // Decoding errors are not transient. Typically they indicate a badly
        // configured MDS endpoint, or DNS redirecting the request to a random
        // server.
        self.send(path)
            .await?
            .json::<TokenGrant>()
            .await
            .map_err(|source| Error::Decode {
                path: path.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{INSTANCE_ATTRIBUTES_PATH, METADATA_PREFIX, TOKEN_PATH, attribute_path};
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use scoped_env::ScopedEnv;
    use serial_test::{parallel, serial};

    type TestResult = anyhow::Result<()>;

    fn full_path(path: &str) -> String {
        format!("{METADATA_PREFIX}/{path}")
    }

    #[tokio::test]
    #[parallel]
    async fn get_success() -> TestResult {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}", server.addr())));
        let path = attribute_path("k8s-cluster-name");

        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", full_path(&path)),
                request::headers(contains(("metadata-flavor", "Google"))),
            ])
            .respond_with(status_code(200).body("test-cluster")),
        );

        let got = client.get(&path).await?;
        assert_eq!(got, "test-cluster");
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn get_not_defined() -> TestResult {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}", server.addr())));
        let path = attribute_path("k8s-sa-token");

        server.expect(
            Expectation::matching(request::method_path("GET", full_path(&path)))
                .respond_with(status_code(404).body("Not Found")),
        );

        let err = client.get(&path).await.unwrap_err();
        assert!(err.is_not_defined(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn get_server_error() -> TestResult {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}", server.addr())));

        server.expect(
            Expectation::matching(request::method_path("GET", full_path("instance/name")))
                .respond_with(status_code(503).body("try again later")),
        );

        let err = client.get("instance/name").await.unwrap_err();
        match err {
            Error::Status { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "try again later");
            }
            e => panic!("unexpected error {e:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn list_success() -> TestResult {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}", server.addr())));

        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                full_path(INSTANCE_ATTRIBUTES_PATH),
            ))
            .respond_with(
                status_code(200).body("k8s-cluster-name\nk8s-label-team\nother-attr\n"),
            ),
        );

        let got = client.list(INSTANCE_ATTRIBUTES_PATH).await?;
        assert_eq!(got, vec!["k8s-cluster-name", "k8s-label-team", "other-attr"]);
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn access_token_success() -> TestResult {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}", server.addr())));
        let response = TokenGrant {
            access_token: "test-token".to_string(),
            expires_in: 3600,
            token_type: "Bearer".to_string(),
        };

        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", full_path(TOKEN_PATH)),
                request::headers(contains(("metadata-flavor", "Google"))),
            ])
            .respond_with(
                status_code(200)
                    .insert_header("Content-Type", "application/json")
                    .body(serde_json::to_string(&response)?),
            ),
        );

        let got = client.access_token().await?;
        assert_eq!(got, response);
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn access_token_bad_payload() -> TestResult {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}", server.addr())));

        server.expect(
            Expectation::matching(request::method_path("GET", full_path(TOKEN_PATH)))
                .respond_with(status_code(200).body("<html>captive portal</html>")),
        );

        let err = client.access_token().await.unwrap_err();
        assert!(matches!(err, Error::Decode { .. }), "{err:?}");
        Ok(())
    }

    #[test]
    #[serial]
    fn resolve_endpoint_default() {
        let _e = ScopedEnv::remove(crate::metadata::GCE_METADATA_HOST_ENV_VAR);
        let client = Client::new(None);
        assert_eq!(client.endpoint, "http://metadata.google.internal");
    }

    #[test]
    #[serial]
    fn resolve_endpoint_override() {
        let _e = ScopedEnv::remove(crate::metadata::GCE_METADATA_HOST_ENV_VAR);
        let client = Client::new(Some("http://custom.endpoint/".to_string()));
        assert_eq!(client.endpoint, "http://custom.endpoint");
    }

    #[test]
    #[serial]
    fn resolve_endpoint_bare_host() {
        let _e = ScopedEnv::remove(crate::metadata::GCE_METADATA_HOST_ENV_VAR);
        let client = Client::new(Some("127.0.0.1:8080".to_string()));
        assert_eq!(client.endpoint, "http://127.0.0.1:8080");
    }

    #[test]
    #[serial]
    fn resolve_endpoint_env_var_wins() {
        let _e = ScopedEnv::set(crate::metadata::GCE_METADATA_HOST_ENV_VAR, "env.var.host");
        let client = Client::new(Some("http://custom.endpoint".to_string()));
        assert_eq!(client.endpoint, "http://env.var.host");
    }
}
