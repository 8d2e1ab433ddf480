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

//! Resolves the connection facts of a GKE cluster.

use crate::Result;
use crate::errors::Error;
use google_cloud_auth::credentials::mds::Builder as MdsBuilder;
use google_cloud_container_v1::client::ClusterManager;
use google_cloud_container_v1::model::Cluster;
use google_cloud_gax::retry_policy::NeverRetry;

/// The scope requested for the cluster management API.
///
/// The same identity also calls the Kubernetes API in the dynamic
/// authentication mode.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// How to reach the control plane of a cluster.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterConnection {
    /// The host (IP address or DNS name) of the control plane.
    pub endpoint: String,
    /// The base64-encoded CA certificate of the control plane.
    pub ca_certificate: String,
    /// The canonical cluster name.
    pub name: String,
}

impl From<Cluster> for ClusterConnection {
    fn from(cluster: Cluster) -> Self {
        Self {
            endpoint: cluster.endpoint,
            ca_certificate: cluster
                .master_auth
                .map(|a| a.cluster_ca_certificate)
                .unwrap_or_default(),
            name: cluster.name,
        }
    }
}

/// Looks up the [ClusterConnection] for a cluster.
#[async_trait::async_trait]
pub trait ClusterResolver: std::fmt::Debug + Send + Sync {
    async fn resolve(&self, project_id: &str, zone: &str, name: &str)
    -> Result<ClusterConnection>;
}

/// Returns the resource name of a cluster.
///
/// The `locations` collection accepts both zones and regions.
pub fn cluster_path(project_id: &str, zone: &str, name: &str) -> String {
    format!("projects/{project_id}/locations/{zone}/clusters/{name}")
}

/// Resolves clusters with the GKE API, authenticated as the VM service account.
#[derive(Clone, Debug, Default)]
pub struct GkeResolver {
    endpoint: Option<String>,
}

impl GkeResolver {
    /// Creates a resolver, optionally overriding the GKE API endpoint.
    ///
    /// Creating the resolver performs no I/O. The client is only created when
    /// a cluster is resolved.
    pub fn new(endpoint: Option<String>) -> Self {
        Self { endpoint }
    }

    /// Creates the client for the GKE API.
    ///
    /// The client uses the metadata service credentials and never retries. A
    /// failed lookup means the VM is misconfigured or the API is unreachable,
    /// either way the supervisor of this process decides what to do next.
    async fn client(&self) -> Result<ClusterManager> {
        let credentials = MdsBuilder::default()
            .with_scopes([CLOUD_PLATFORM_SCOPE])
            .build()
            .map_err(Error::ClusterCredentials)?;
        let builder = ClusterManager::builder()
            .with_credentials(credentials)
            .with_retry_policy(NeverRetry);
        let builder = self
            .endpoint
            .iter()
            .fold(builder, |b, e| b.with_endpoint(e));
        builder.build().await.map_err(Error::ClusterClient)
    }
}

#[async_trait::async_trait]
impl ClusterResolver for GkeResolver {
    async fn resolve(
        &self,
        project_id: &str,
        zone: &str,
        name: &str,
    ) -> Result<ClusterConnection> {
        let client = self.client().await?;
        let path = cluster_path(project_id, zone, name);
        tracing::debug!(cluster = %path, "resolving cluster");
        let cluster = client
            .get_cluster()
            .set_name(&path)
            .send()
            .await
            .map_err(|source| Error::ClusterLookup {
                name: path.clone(),
                source,
            })?;
        let connection = ClusterConnection::from(cluster);
        tracing::info!(
            cluster = %connection.name,
            endpoint = %connection.endpoint,
            "resolved cluster"
        );
        Ok(connection)
    }
}
