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

//! Errors returned while bootstrapping the cluster client.
//!
//! Every variant is fatal: the bootstrap stops at the first error and the
//! process exits. Conditions that degrade to a default value, such as a
//! missing label attribute, never surface as an [Error].

use std::path::PathBuf;

/// The error type for this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required identity attribute could not be read from the metadata service.
    #[error("cannot read instance identity attribute `{attribute}`: {source}")]
    Identity {
        attribute: &'static str,
        #[source]
        source: crate::metadata::Error,
    },

    /// The metadata service did not provide an access token.
    #[error("cannot exchange the instance identity for an access token: {0}")]
    Token(#[source] crate::metadata::Error),

    /// The credentials for the cluster management API could not be created.
    #[error("cannot create credentials for the cluster management API: {0}")]
    ClusterCredentials(#[source] google_cloud_auth::build_errors::Error),

    /// The cluster management API client could not be created.
    #[error("cannot create the cluster management API client: {0}")]
    ClusterClient(#[source] google_cloud_gax::client_builder::Error),

    /// The cluster management API rejected or failed the lookup.
    #[error("cannot get cluster `{name}`: {source}")]
    ClusterLookup {
        name: String,
        #[source]
        source: google_cloud_gax::error::Error,
    },

    /// An existing local kubeconfig could not be loaded.
    #[error("cannot load kubeconfig from {}: {source}", path.display())]
    LocalConfig {
        path: PathBuf,
        #[source]
        source: kube::config::KubeconfigError,
    },

    /// The presence of a local kubeconfig could not be determined.
    #[error("cannot check for a kubeconfig at {}: {source}", path.display())]
    LocalConfigAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The synthesized kubeconfig could not be rendered as YAML.
    #[error("cannot render kubeconfig: {0}")]
    Render(#[source] serde_yaml::Error),

    /// The synthesized kubeconfig was rejected by the Kubernetes client.
    #[error("synthesized kubeconfig is not valid: {0}")]
    InvalidKubeconfig(#[source] kube::config::KubeconfigError),

    /// The Kubernetes client could not be created from the kubeconfig.
    #[error("cannot create the Kubernetes client configuration: {0}")]
    ClientConfig(#[source] kube::config::KubeconfigError),

    /// The credential response could not be serialized.
    #[error("cannot encode credential response: {0}")]
    Encode(#[source] serde_json::Error),

    /// The path of the running program could not be determined.
    #[error("cannot determine the path of the running program: {0}")]
    ProgramPath(#[source] std::io::Error),
}

impl Error {
    /// The error happened before any call to the cluster management API.
    pub fn is_identity(&self) -> bool {
        matches!(self, Error::Identity { .. })
    }

    /// The cluster management API could not resolve the cluster.
    pub fn is_cluster_lookup(&self) -> bool {
        matches!(self, Error::ClusterLookup { .. })
    }
}
