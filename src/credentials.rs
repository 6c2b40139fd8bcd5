//! Connection descriptors for a running server-under-test.
//!
//! An [`EndpointCredential`] is a pure projection of a [`ServerHandle`]:
//! it has no lifecycle of its own and building one can never fail. It knows
//! the two forms the client library consumes — the semicolon-delimited
//! connection string (which must be reproduced byte-for-byte) and a
//! configured SDK client builder.

use azure_storage::{CloudLocation, StorageCredentials};
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder, ContainerClient};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::server::ServerHandle;

/// Well-known development storage account served by every emulator.
pub const DEV_ACCOUNT: &str = "devstoreaccount1";

/// The emulator's publicly documented default shared key. Not a secret.
pub const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Everything the client library needs to reach one server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCredential {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub account: String,
    pub key: String,
}

impl EndpointCredential {
    /// Derive the credential for a running server. Deterministic; the
    /// handle stays usable.
    pub fn from_handle(handle: &ServerHandle) -> Self {
        Self {
            protocol: "http".to_string(),
            host: defaults::LOOPBACK_HOST.to_string(),
            port: handle.port,
            account: handle.account.clone(),
            key: handle.key.clone(),
        }
    }

    /// Path-style blob endpoint URL with the account as the first segment.
    pub fn blob_endpoint(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.protocol, self.host, self.port, self.account
        )
    }

    /// The exact connection-descriptor string the client library parses.
    /// The trailing semicolon is part of the format.
    pub fn connection_string(&self) -> String {
        format!(
            "DefaultEndpointsProtocol={};AccountName={};AccountKey={};BlobEndpoint={};",
            self.protocol,
            self.account,
            self.key,
            self.blob_endpoint()
        )
    }

    fn builder(&self) -> ClientBuilder {
        let credentials = StorageCredentials::access_key(self.account.clone(), self.key.clone());
        ClientBuilder::with_location(
            CloudLocation::Custom {
                account: self.account.clone(),
                uri: self.blob_endpoint(),
            },
            credentials,
        )
    }

    /// Account-level client, used for listing containers.
    pub fn service_client(&self) -> BlobServiceClient {
        self.builder().blob_service_client()
    }

    /// Client for one container under this endpoint.
    pub fn container_client(&self, container: &str) -> ContainerClient {
        self.builder().container_client(container)
    }
}
