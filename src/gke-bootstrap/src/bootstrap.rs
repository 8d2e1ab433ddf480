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

//! Drives the bootstrap of the Kubernetes client configuration.
//!
//! ```text
//! CheckLocalConfig ─┬─ found ─────> use ~/.kube/config verbatim
//!                   └─ not found ─> IdentityRead -> ClusterResolve -> Synthesize
//! ```
//!
//! Every step returns a [Result]. The first error ends the bootstrap, there is
//! no retry and no partially valid configuration.

use crate::Result;
use crate::cluster::ClusterResolver;
use crate::errors::Error;
use crate::identity;
use crate::kubeconfig::{self, ClientConfiguration};
use crate::metadata::MetadataSource;
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::path::{Path, PathBuf};

/// The conventional location of the user kubeconfig, if there is a home directory.
pub fn local_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("config"))
}

/// The configuration produced by [bootstrap].
#[derive(Debug)]
pub enum Bootstrapped {
    /// An existing kubeconfig file, used without changes.
    Local { path: PathBuf, kubeconfig: Kubeconfig },
    /// A configuration synthesized from the instance metadata.
    Synthesized {
        configuration: ClientConfiguration,
        kubeconfig: Kubeconfig,
    },
}

impl Bootstrapped {
    pub fn kubeconfig(&self) -> &Kubeconfig {
        match self {
            Self::Local { kubeconfig, .. } => kubeconfig,
            Self::Synthesized { kubeconfig, .. } => kubeconfig,
        }
    }

    pub fn into_kubeconfig(self) -> Kubeconfig {
        match self {
            Self::Local { kubeconfig, .. } => kubeconfig,
            Self::Synthesized { kubeconfig, .. } => kubeconfig,
        }
    }

    /// Creates the configuration for the Kubernetes client, using the current context.
    pub async fn client_config(self) -> Result<kube::Config> {
        kube::Config::from_custom_kubeconfig(self.into_kubeconfig(), &KubeConfigOptions::default())
            .await
            .map_err(Error::ClientConfig)
    }
}

/// Produces the kubeconfig for this VM.
///
/// If `local_config` names an existing file, that file is loaded and nothing
/// else happens. If it does not exist, the configuration is synthesized with
/// [discover]. Failing to check whether it exists is fatal.
pub async fn bootstrap<M, R>(
    local_config: Option<&Path>,
    metadata: &M,
    resolver: &R,
) -> Result<Bootstrapped>
where
    M: MetadataSource + ?Sized,
    R: ClusterResolver + ?Sized,
{
    if let Some(path) = local_config {
        let exists = path.try_exists().map_err(|source| Error::LocalConfigAccess {
            path: path.to_path_buf(),
            source,
        })?;
        if exists {
            tracing::info!(path = %path.display(), "using local kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path).map_err(|source| Error::LocalConfig {
                path: path.to_path_buf(),
                source,
            })?;
            return Ok(Bootstrapped::Local {
                path: path.to_path_buf(),
                kubeconfig,
            });
        }
        tracing::debug!(path = %path.display(), "no local kubeconfig");
    }

    synthesize(metadata, resolver).await
}

async fn synthesize<M, R>(metadata: &M, resolver: &R) -> Result<Bootstrapped>
where
    M: MetadataSource + ?Sized,
    R: ClusterResolver + ?Sized,
{
    let configuration = discover(metadata, resolver).await?;
    let kubeconfig = configuration.to_kubeconfig()?;
    Ok(Bootstrapped::Synthesized {
        configuration,
        kubeconfig,
    })
}

/// Synthesizes the client configuration from the instance metadata.
pub async fn discover<M, R>(metadata: &M, resolver: &R) -> Result<ClientConfiguration>
where
    M: MetadataSource + ?Sized,
    R: ClusterResolver + ?Sized,
{
    let identity = identity::read(metadata).await?;
    let cluster = resolver
        .resolve(
            &identity.project_id,
            &identity.cluster_zone,
            &identity.cluster_name,
        )
        .await?;
    let program = kubeconfig::program_path()?;
    let configuration = ClientConfiguration::synthesize(&identity, cluster, &program);
    tracing::info!(
        cluster = %configuration.cluster().name,
        static_token = configuration.is_static(),
        "synthesized kubeconfig"
    );
    Ok(configuration)
}
