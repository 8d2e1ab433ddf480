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

//! Synthesizes the kubeconfig used to reach the cluster.
//!
//! The document always contains exactly one cluster, one context and one
//! user. The user entry depends on the authentication mode:
//!
//! * [ClientConfiguration::Dynamic] names this program as the `gcp`
//!   auth-provider command. The Kubernetes client runs
//!   `<program> get-credential` whenever it needs a fresh token.
//! * [ClientConfiguration::Static] embeds the Kubernetes service account
//!   token provisioned in the instance metadata. It is never refreshed.

use crate::Result;
use crate::cluster::ClusterConnection;
use crate::credential::{EXPIRY_KEY, TOKEN_KEY};
use crate::errors::Error;
use crate::identity::VmIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The subcommand that runs the credential provider.
pub const CREDENTIAL_SUBCOMMAND: &str = "get-credential";
/// The auth-provider that knows how to run a token command.
pub const AUTH_PROVIDER_NAME: &str = "gcp";

/// The client configuration for one of the two authentication modes.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientConfiguration {
    /// Fetch tokens on demand by running this program.
    Dynamic(DynamicConfig),
    /// Use a pre-provisioned bearer token.
    Static(StaticConfig),
}

/// Authenticate as the VM service account through the credential provider.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicConfig {
    pub cluster: ClusterConnection,
    /// The program the Kubernetes client runs to get a token.
    pub program: PathBuf,
}

/// Authenticate as a Kubernetes service account with a fixed token.
#[derive(Clone, PartialEq)]
pub struct StaticConfig {
    pub cluster: ClusterConnection,
    pub user: String,
    pub token: String,
}

impl std::fmt::Debug for StaticConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticConfig")
            .field("cluster", &self.cluster)
            .field("user", &self.user)
            .field("token", &"[censored]")
            .finish()
    }
}

impl ClientConfiguration {
    /// Selects the authentication mode and builds the configuration.
    ///
    /// The static mode requires both the service account name and token in
    /// `identity`; anything else uses the dynamic mode with `program` as the
    /// credential provider.
    pub fn synthesize(identity: &VmIdentity, cluster: ClusterConnection, program: &Path) -> Self {
        match identity.static_credentials() {
            Some((user, token)) => Self::Static(StaticConfig {
                cluster,
                user: user.to_string(),
                token: token.to_string(),
            }),
            None => Self::Dynamic(DynamicConfig {
                cluster,
                program: program.to_path_buf(),
            }),
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }

    pub fn cluster(&self) -> &ClusterConnection {
        match self {
            Self::Dynamic(c) => &c.cluster,
            Self::Static(c) => &c.cluster,
        }
    }

    /// Builds the kubeconfig document.
    pub fn document(&self) -> Kubeconfig {
        let cluster = self.cluster();
        let (user_name, user) = match self {
            Self::Dynamic(c) => (cluster.name.clone(), UserConfig::exec(&c.program)),
            Self::Static(c) => (c.user.clone(), UserConfig::token(&c.token)),
        };
        Kubeconfig {
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            clusters: vec![NamedCluster {
                name: cluster.name.clone(),
                cluster: ClusterConfig {
                    server: format!("https://{}", cluster.endpoint),
                    certificate_authority_data: cluster.ca_certificate.clone(),
                },
            }],
            contexts: vec![NamedContext {
                name: cluster.name.clone(),
                context: ContextConfig {
                    cluster: cluster.name.clone(),
                    user: user_name.clone(),
                },
            }],
            current_context: cluster.name.clone(),
            preferences: BTreeMap::new(),
            users: vec![NamedUser {
                name: user_name,
                user,
            }],
        }
    }

    /// Renders the kubeconfig document as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.document()).map_err(Error::Render)
    }

    /// Converts the configuration into the representation used by `kube`.
    pub fn to_kubeconfig(&self) -> Result<kube::config::Kubeconfig> {
        let yaml = self.to_yaml()?;
        kube::config::Kubeconfig::from_yaml(&yaml).map_err(Error::InvalidKubeconfig)
    }
}

/// The path of the running program, as the Kubernetes client should run it.
///
/// This is `argv[0]` resolved against the current directory, so the
/// credential provider can be found no matter where the Kubernetes client
/// runs. A bare program name was found through `PATH`, in that case the
/// path of the current executable is used instead.
pub fn program_path() -> Result<PathBuf> {
    let argv0 = std::env::args_os().next().map(PathBuf::from);
    match argv0 {
        Some(p) if p.components().count() > 1 || p.is_absolute() => {
            let cwd = std::env::current_dir().map_err(Error::ProgramPath)?;
            Ok(cwd.join(p))
        }
        _ => std::env::current_exe().map_err(Error::ProgramPath),
    }
}

/// A kubeconfig document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub contexts: Vec<NamedContext>,
    pub current_context: String,
    pub preferences: BTreeMap<String, String>,
    pub users: Vec<NamedUser>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    /// The API server URL.
    pub server: String,
    /// The base64-encoded CA certificate, possibly empty.
    pub certificate_authority_data: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub cluster: String,
    pub user: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: UserConfig,
}

/// The credentials of a user, exactly one of the fields is set.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider: Option<AuthProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl UserConfig {
    fn exec(program: &Path) -> Self {
        let config = [
            ("cmd-path", program.display().to_string()),
            ("cmd-args", CREDENTIAL_SUBCOMMAND.to_string()),
            ("token-key", TOKEN_KEY.to_string()),
            ("expiry-key", EXPIRY_KEY.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            auth_provider: Some(AuthProviderConfig {
                name: AUTH_PROVIDER_NAME.to_string(),
                config,
            }),
            token: None,
        }
    }

    fn token(token: &str) -> Self {
        Self {
            auth_provider: None,
            token: Some(token.to_string()),
        }
    }
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("auth_provider", &self.auth_provider)
            .field("token", &self.token.as_ref().map(|_| "[censored]"))
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthProviderConfig {
    pub name: String,
    pub config: BTreeMap<String, String>,
}
