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

//! Bootstrap a Compute Engine VM into a client of a GKE cluster.
//!
//! The crate turns machine-local facts, served by the [Metadata Service], into
//! a working Kubernetes client configuration, without a pre-provisioned
//! kubeconfig file. It also implements the credential provider that the
//! Kubernetes client re-executes whenever the access token in that
//! configuration expires.
//!
//! The pieces compose in a fixed order:
//! * [identity] reads the [VmIdentity](identity::VmIdentity) of the VM.
//! * [cluster] resolves the control plane endpoint and CA certificate.
//! * [kubeconfig] renders one of the two authentication modes.
//! * [bootstrap] drives the steps above, or uses `~/.kube/config` if present.
//! * [credential] exchanges the VM identity for a short-lived access token.
//!
//! [Metadata Service]: https://cloud.google.com/compute/docs/metadata/overview

pub mod errors;

/// Read-only access to the Compute Engine [Metadata Service].
///
/// [Metadata Service]: https://cloud.google.com/compute/docs/metadata/overview
pub mod metadata;

pub mod bootstrap;
pub mod cluster;
pub mod credential;
pub mod identity;
pub mod kubeconfig;

/// A `Result` alias where the `Err` case is `gke_bootstrap::errors::Error`.
pub type Result<T> = std::result::Result<T, crate::errors::Error>;
