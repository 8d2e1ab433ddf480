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

//! Reads the identity of the VM from the metadata service.
//!
//! The operator configures the target cluster, and optionally a Kubernetes
//! service account, through [custom metadata] on the instance:
//!
//! | Attribute            | Meaning                                        |
//! | -------------------- | ---------------------------------------------- |
//! | `k8s-cluster-name`   | The GKE cluster name, required.                |
//! | `k8s-cluster-zone`   | The zone (or region) of the cluster, required. |
//! | `k8s-sa-name`        | Kubernetes service account name, optional.     |
//! | `k8s-sa-token`       | Kubernetes service account token, optional.    |
//! | `k8s-label-<key>`    | Free-form labels for the node, optional.       |
//!
//! [custom metadata]: https://cloud.google.com/compute/docs/metadata/setting-custom-metadata

use crate::Result;
use crate::errors::Error;
use crate::metadata::{self, MetadataSource, attribute_path};
use std::collections::BTreeMap;

pub const CLUSTER_NAME_ATTRIBUTE: &str = "k8s-cluster-name";
pub const CLUSTER_ZONE_ATTRIBUTE: &str = "k8s-cluster-zone";
pub const KSA_NAME_ATTRIBUTE: &str = "k8s-sa-name";
pub const KSA_TOKEN_ATTRIBUTE: &str = "k8s-sa-token";
pub const LABEL_PREFIX: &str = "k8s-label-";

/// A snapshot of the VM identity, captured once at startup.
#[derive(Clone, Default, PartialEq)]
pub struct VmIdentity {
    pub instance_name: String,
    pub hostname: String,
    pub internal_ip: String,
    pub external_ip: String,
    pub project_id: String,
    pub cluster_name: String,
    pub cluster_zone: String,
    /// The Kubernetes service account name, empty if not configured.
    pub ksa_name: String,
    /// The Kubernetes service account token, empty if not configured.
    pub ksa_token: String,
    /// The `k8s-label-` attributes, with the prefix removed from the keys.
    pub labels: BTreeMap<String, String>,
}

impl VmIdentity {
    /// Returns the service account name and token if both are configured.
    ///
    /// This is the only input to the authentication mode selection. If either
    /// value is empty the VM uses its own identity through the credential
    /// provider.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        if self.ksa_name.is_empty() || self.ksa_token.is_empty() {
            return None;
        }
        Some((&self.ksa_name, &self.ksa_token))
    }
}

impl std::fmt::Debug for VmIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ksa_token = if self.ksa_token.is_empty() {
            ""
        } else {
            "[censored]"
        };
        f.debug_struct("VmIdentity")
            .field("instance_name", &self.instance_name)
            .field("hostname", &self.hostname)
            .field("internal_ip", &self.internal_ip)
            .field("external_ip", &self.external_ip)
            .field("project_id", &self.project_id)
            .field("cluster_name", &self.cluster_name)
            .field("cluster_zone", &self.cluster_zone)
            .field("ksa_name", &self.ksa_name)
            .field("ksa_token", &ksa_token)
            .field("labels", &self.labels)
            .finish()
    }
}

/// Reads the [VmIdentity] from the metadata service.
///
/// Fails on the first required field that cannot be read. Missing optional
/// fields and missing label values become empty strings.
pub async fn read<M>(source: &M) -> Result<VmIdentity>
where
    M: MetadataSource + ?Sized,
{
    let instance_name = required(source, metadata::INSTANCE_NAME_PATH).await?;
    let hostname = required(source, metadata::HOSTNAME_PATH).await?;
    let internal_ip = required(source, metadata::INTERNAL_IP_PATH).await?;
    let external_ip = required(source, metadata::EXTERNAL_IP_PATH).await?;
    let project_id = required(source, metadata::PROJECT_ID_PATH).await?;
    let cluster_name = required_attribute(source, CLUSTER_NAME_ATTRIBUTE).await?;
    let cluster_zone = required_attribute(source, CLUSTER_ZONE_ATTRIBUTE).await?;

    let ksa_name = optional_attribute(source, KSA_NAME_ATTRIBUTE).await;
    let ksa_token = optional_attribute(source, KSA_TOKEN_ATTRIBUTE).await;
    if ksa_name.is_empty() != ksa_token.is_empty() {
        tracing::warn!(
            "only one of `{KSA_NAME_ATTRIBUTE}` and `{KSA_TOKEN_ATTRIBUTE}` is set, \
             falling back to the instance service account"
        );
    }

    let labels = read_labels(source).await?;

    let identity = VmIdentity {
        instance_name,
        hostname,
        internal_ip,
        external_ip,
        project_id,
        cluster_name,
        cluster_zone,
        ksa_name,
        ksa_token,
        labels,
    };
    tracing::info!(
        instance = %identity.instance_name,
        project = %identity.project_id,
        cluster = %identity.cluster_name,
        zone = %identity.cluster_zone,
        labels = identity.labels.len(),
        "read instance identity"
    );
    Ok(identity)
}

async fn required<M>(source: &M, path: &'static str) -> Result<String>
where
    M: MetadataSource + ?Sized,
{
    source.get(path).await.map_err(|e| Error::Identity {
        attribute: path,
        source: e,
    })
}

async fn required_attribute<M>(source: &M, name: &'static str) -> Result<String>
where
    M: MetadataSource + ?Sized,
{
    source
        .get(&attribute_path(name))
        .await
        .map_err(|e| Error::Identity {
            attribute: name,
            source: e,
        })
}

async fn optional_attribute<M>(source: &M, name: &str) -> String
where
    M: MetadataSource + ?Sized,
{
    match source.get(&attribute_path(name)).await {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("optional attribute `{name}` is not available: {e}");
            String::new()
        }
    }
}

async fn read_labels<M>(source: &M) -> Result<BTreeMap<String, String>>
where
    M: MetadataSource + ?Sized,
{
    let names = source
        .list(metadata::INSTANCE_ATTRIBUTES_PATH)
        .await
        .map_err(|e| Error::Identity {
            attribute: metadata::INSTANCE_ATTRIBUTES_PATH,
            source: e,
        })?;

    let mut labels = BTreeMap::new();
    for name in &names {
        let Some(key) = name.strip_prefix(LABEL_PREFIX) else {
            continue;
        };
        let value = match source.get(&attribute_path(name)).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("failed to fetch label `{name}`: {e}");
                String::new()
            }
        };
        labels.insert(key.to_string(), value);
    }
    Ok(labels)
}
