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

//! Bootstraps a Compute Engine VM into a client of a GKE cluster.

const DESCRIPTION: &str = concat!(
    "Bootstraps a Compute Engine VM into a client of the GKE cluster named in",
    " its instance metadata. The `start` command creates a Kubernetes client,",
    " using `~/.kube/config` if present, or synthesizing a configuration from",
    " the metadata service otherwise. The synthesized configuration runs this",
    " program with `get-credential` to obtain fresh access tokens."
);

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use gke_bootstrap::bootstrap::{self, Bootstrapped};
use gke_bootstrap::cluster::GkeResolver;
use gke_bootstrap::{credential, metadata};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use kube::api::{Api, ListParams};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(_) => return usage(),
    };
    let Some(command) = args.command.clone() else {
        return usage();
    };

    enable_tracing();
    let _ = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    );
    tracing::debug!("{args:?}");

    let metadata = metadata::Client::new(args.metadata_host.clone());
    match command {
        Command::GetCredential => {
            let response = credential::exchange(&metadata).await?;
            println!("{}", response.to_json()?);
        }
        Command::Start => {
            let resolver = GkeResolver::new(args.container_endpoint.clone());
            let local = bootstrap::local_config_path();
            let bootstrapped =
                bootstrap::bootstrap(local.as_deref(), &metadata, &resolver).await?;
            match &bootstrapped {
                Bootstrapped::Local { path, .. } => {
                    tracing::info!("using kubeconfig from {}", path.display())
                }
                Bootstrapped::Synthesized { configuration, .. } => {
                    tracing::info!("using kubeconfig for cluster {}", configuration.cluster().name)
                }
            }
            tracing::debug!(
                context = ?bootstrapped.kubeconfig().current_context,
                "selected kubeconfig context"
            );
            let config = bootstrapped.client_config().await?;
            let client = kube::Client::try_from(config)?;
            let pods: Api<Pod> = Api::namespaced(client, "default");
            for pod in pods.list(&ListParams::default()).await? {
                println!("{}", pod.name_any());
            }
        }
    }
    Ok(())
}

fn usage() -> anyhow::Result<()> {
    let program = std::env::args().next().unwrap_or_else(|| "gke-bootstrap".to_string());
    println!("Usage: {program} [command]");
    Ok(())
}

/// Logs go to stderr, stdout is reserved for command output.
fn enable_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Bootstraps a Compute Engine VM into a client of a GKE cluster.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = DESCRIPTION)]
struct Args {
    /// Overrides the metadata service host.
    ///
    /// The `GCE_METADATA_HOST` environment variable is also consulted by the
    /// metadata client, and takes precedence over this flag.
    #[arg(long, global = true, env = "GCE_METADATA_HOST")]
    metadata_host: Option<String>,

    /// Overrides the endpoint of the GKE API.
    #[arg(long, global = true, env = "GKE_BOOTSTRAP_CONTAINER_ENDPOINT")]
    container_endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Prints a fresh access token for the instance service account as JSON.
    ///
    /// The Kubernetes client runs this command to refresh its credentials.
    GetCredential,
    /// Bootstraps the Kubernetes client and lists the pods in the `default` namespace.
    Start,
}
