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

mod client;

pub use client::Client;

pub(crate) const METADATA_FLAVOR_VALUE: &str = "Google";
pub(crate) const METADATA_FLAVOR: &str = "metadata-flavor";
pub(crate) const METADATA_ROOT: &str = "http://metadata.google.internal";
pub(crate) const METADATA_PREFIX: &str = "/computeMetadata/v1";
pub(crate) const GCE_METADATA_HOST_ENV_VAR: &str = "GCE_METADATA_HOST";

pub(crate) const TOKEN_PATH: &str = "instance/service-accounts/default/token";
pub(crate) const INSTANCE_NAME_PATH: &str = "instance/name";
pub(crate) const HOSTNAME_PATH: &str = "instance/hostname";
pub(crate) const INTERNAL_IP_PATH: &str = "instance/network-interfaces/0/ip";
pub(crate) const EXTERNAL_IP_PATH: &str =
    "instance/network-interfaces/0/access-configs/0/external-ip";
pub(crate) const PROJECT_ID_PATH: &str = "project/project-id";
pub(crate) const INSTANCE_ATTRIBUTES_PATH: &str = "instance/attributes/";

/// A `Result` alias for metadata lookups.
pub type Result<T> = std::result::Result<T, Error>;

/// The ways a metadata lookup can fail.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The metadata service does not define a value at this path.
    #[error("metadata value `{0}` is not defined")]
    NotDefined(String),

    /// The metadata service answered with an unexpected status code.
    #[error("metadata request for `{path}` failed with status {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response.
    #[error("metadata request for `{path}` failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be decoded.
    #[error("cannot decode metadata response for `{path}`: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    /// Returns `true` if the metadata service has no value at the requested path.
    pub fn is_not_defined(&self) -> bool {
        matches!(self, Error::NotDefined(_))
    }
}

/// An access token grant for the service account attached to the VM.
#[derive(Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime of the token, in seconds, counted from the time it was fetched.
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[censored]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Read-only lookups against the metadata service.
///
/// Paths are relative to `computeMetadata/v1/`, for example
/// `instance/attributes/k8s-cluster-name`. The identity reader and the token
/// exchanger only depend on this trait, so tests can substitute an in-memory
/// implementation for a live VM.
#[async_trait::async_trait]
pub trait MetadataSource: std::fmt::Debug + Send + Sync {
    /// Returns the value stored at `path`, verbatim.
    async fn get(&self, path: &str) -> Result<String>;

    /// Returns the entries of the directory at `path`, one per line in the response.
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Fetches an access token for the default service account.
    async fn access_token(&self) -> Result<TokenGrant>;
}

/// Returns the path of a custom instance attribute.
pub fn attribute_path(name: &str) -> String {
    format!("{INSTANCE_ATTRIBUTES_PATH}{name}")
}

/// Splits a directory listing into its entries.
pub(crate) fn parse_listing(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    // Used by tests in other modules.
    mockall::mock! {
        #[derive(Debug)]
        pub MetadataSource { }

        #[async_trait::async_trait]
        impl MetadataSource for MetadataSource {
            async fn get(&self, path: &str) -> Result<String>;
            async fn list(&self, path: &str) -> Result<Vec<String>>;
            async fn access_token(&self) -> Result<TokenGrant>;
        }
    }

    /// An in-memory metadata service, keyed by path.
    #[derive(Debug, Default)]
    pub(crate) struct Fixture {
        values: HashMap<String, String>,
        token: Option<TokenGrant>,
    }

    impl Fixture {
        /// A VM with every required identity field set.
        pub(crate) fn vm() -> Self {
            Self::default()
                .with(INSTANCE_NAME_PATH, "test-instance")
                .with(HOSTNAME_PATH, "test-instance.c.test-project.internal")
                .with(INTERNAL_IP_PATH, "10.128.0.2")
                .with(EXTERNAL_IP_PATH, "203.0.113.7")
                .with(PROJECT_ID_PATH, "test-project")
                .with_attribute("k8s-cluster-name", "test-cluster")
                .with_attribute("k8s-cluster-zone", "us-central1-a")
        }

        pub(crate) fn with(mut self, path: &str, value: &str) -> Self {
            self.values.insert(path.to_string(), value.to_string());
            self
        }

        pub(crate) fn with_attribute(self, name: &str, value: &str) -> Self {
            self.with(&attribute_path(name), value)
        }

        pub(crate) fn without(mut self, path: &str) -> Self {
            self.values.remove(path);
            self
        }

        pub(crate) fn with_token(mut self, token: TokenGrant) -> Self {
            self.token = Some(token);
            self
        }

        pub(crate) fn value(&self, path: &str) -> Option<String> {
            self.values.get(path).cloned()
        }
    }

    #[async_trait::async_trait]
    impl MetadataSource for Fixture {
        async fn get(&self, path: &str) -> Result<String> {
            self.value(path)
                .ok_or_else(|| Error::NotDefined(path.to_string()))
        }

        async fn list(&self, path: &str) -> Result<Vec<String>> {
            let mut entries = self
                .values
                .keys()
                .filter_map(|k| k.strip_prefix(path))
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();
            entries.sort();
            Ok(entries)
        }

        async fn access_token(&self) -> Result<TokenGrant> {
            self.token
                .clone()
                .ok_or_else(|| Error::NotDefined(TOKEN_PATH.to_string()))
        }
    }

    #[test]
    fn listing() {
        let got = parse_listing("k8s-cluster-name\nk8s-label-team\n\nssh-keys\n");
        assert_eq!(got, vec!["k8s-cluster-name", "k8s-label-team", "ssh-keys"]);
        assert!(parse_listing("").is_empty());
        assert!(parse_listing("\n \n").is_empty());
    }

    #[test]
    fn token_grant_debug() {
        let grant = TokenGrant {
            access_token: "token-test-only".into(),
            expires_in: 3599,
            token_type: "Bearer".into(),
        };
        let got = format!("{grant:?}");
        assert!(!got.contains("token-test-only"), "{got}");
        assert!(got.contains("[censored]"), "{got}");
        assert!(got.contains("3599"), "{got}");
    }

    #[test]
    fn not_defined() {
        let e = Error::NotDefined(attribute_path("k8s-sa-name"));
        assert!(e.is_not_defined());
        assert!(e.to_string().contains("instance/attributes/k8s-sa-name"));
    }

    #[tokio::test]
    async fn fixture_lists_attributes() -> anyhow::Result<()> {
        let fixture = Fixture::vm().with_attribute("k8s-label-team", "infra");
        let got = fixture.list(INSTANCE_ATTRIBUTES_PATH).await?;
        assert_eq!(
            got,
            vec!["k8s-cluster-name", "k8s-cluster-zone", "k8s-label-team"]
        );
        Ok(())
    }
}
