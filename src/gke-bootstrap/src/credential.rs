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

//! The credential provider used by the Kubernetes client.
//!
//! In the dynamic authentication mode the kubeconfig tells the Kubernetes
//! client to run `<this program> get-credential` and read the access token
//! and its expiration from the JSON object printed on stdout:
//!
//! ```json
//! {"access_token": "ya29....", "token_expiry": "2026-10-18T15:04:05Z"}
//! ```
//!
//! The client runs the program again once the expiration is reached. The
//! expiration is an absolute timestamp because the client has no other way to
//! know when the token was issued.

use crate::Result;
use crate::errors::Error;
use crate::metadata::{MetadataSource, TokenGrant};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// The JSONPath of the access token field, as referenced by the kubeconfig.
pub const TOKEN_KEY: &str = "{.access_token}";
/// The JSONPath of the expiration field, as referenced by the kubeconfig.
pub const EXPIRY_KEY: &str = "{.token_expiry}";

/// The output of the credential provider.
#[derive(Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CredentialResponse {
    pub access_token: String,
    /// An RFC 3339 timestamp in UTC, with whole seconds.
    pub token_expiry: String,
}

impl CredentialResponse {
    /// Converts a token grant fetched at `issued_at`.
    pub fn from_grant(grant: TokenGrant, issued_at: DateTime<Utc>) -> Self {
        let lifetime = i64::try_from(grant.expires_in)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        let expiry = issued_at
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            access_token: grant.access_token,
            token_expiry: expiry.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Serializes the response in the format expected by the Kubernetes client.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Encode)
    }
}

impl std::fmt::Debug for CredentialResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResponse")
            .field("access_token", &"[censored]")
            .field("token_expiry", &self.token_expiry)
            .finish()
    }
}

/// Exchanges the identity of the VM for a short-lived access token.
pub async fn exchange<M>(source: &M) -> Result<CredentialResponse>
where
    M: MetadataSource + ?Sized,
{
    let issued_at = Utc::now();
    let grant = source.access_token().await.map_err(Error::Token)?;
    tracing::debug!(expires_in = grant.expires_in, "fetched access token");
    Ok(CredentialResponse::from_grant(grant, issued_at))
}
