//! Clients for the external metadata and publish services.

use crate::config::ServicesConfig;
use crate::contract::{
    DatasetMetadata, PublishPayload, PublishRequest, ServiceResponse, StageTransferPayload,
    TransferRequest,
};
use crate::error::{Cr8torError, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const VALIDATE_ENDPOINT: &str = "project/validate";
const PACKAGE_ENDPOINT: &str = "project/package";
const PUBLISH_ENDPOINT: &str = "project/publish";

/// Remote operations the lifecycle commands depend on.
pub trait DataServices {
    /// Ask the metadata service for the source's view of `request.dataset`.
    fn validate(&self, request: &TransferRequest) -> Result<DatasetMetadata>;

    /// Extract the dataset into the project's staging area.
    fn stage_transfer(&self, request: &TransferRequest) -> Result<StageTransferPayload>;

    fn publish(&self, request: &PublishRequest) -> Result<PublishPayload>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub base_url: String,
    pub token: Option<String>,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct HttpDataServices {
    client: Client,
    metadata: Option<Endpoint>,
    publish: Option<Endpoint>,
}

impl HttpDataServices {
    pub fn new(
        metadata: Option<Endpoint>,
        publish: Option<Endpoint>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            metadata,
            publish,
        })
    }

    /// Build from config plus the bearer tokens taken from the environment.
    pub fn from_config(
        cfg: &ServicesConfig,
        metadata_token: Option<String>,
        publish_token: Option<String>,
    ) -> Result<Self> {
        Self::new(
            cfg.metadata_url
                .as_ref()
                .map(|u| Endpoint::new(u.as_str(), metadata_token)),
            cfg.publish_url
                .as_ref()
                .map(|u| Endpoint::new(u.as_str(), publish_token)),
            Duration::from_secs(cfg.timeout_seconds),
        )
    }

    fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        service: &str,
        endpoint: Option<&Endpoint>,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let endpoint = endpoint.ok_or_else(|| {
            Cr8torError::ExternalService(format!("{service} URL is not configured"))
        })?;
        let url = endpoint.url(path);
        tracing::info!(%url, "calling {service}");

        let mut req = self.client.post(&url).json(body);
        if let Some(token) = &endpoint.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .map_err(|e| Cr8torError::ExternalService(format!("{service} request failed: {e}")))?;

        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(Cr8torError::ExternalService(format!(
                "{service} returned HTTP {status}: {text}"
            )));
        }
        let envelope: ServiceResponse<T> = serde_json::from_str(&text).map_err(|e| {
            Cr8torError::ExternalService(format!("{service} returned a malformed response: {e}"))
        })?;
        envelope.into_payload(service)
    }
}

impl DataServices for HttpDataServices {
    fn validate(&self, request: &TransferRequest) -> Result<DatasetMetadata> {
        self.post("metadata service", self.metadata.as_ref(), VALIDATE_ENDPOINT, request)
    }

    fn stage_transfer(&self, request: &TransferRequest) -> Result<StageTransferPayload> {
        self.post("publish service", self.publish.as_ref(), PACKAGE_ENDPOINT, request)
    }

    fn publish(&self, request: &PublishRequest) -> Result<PublishPayload> {
        self.post("publish service", self.publish.as_ref(), PUBLISH_ENDPOINT, request)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{
        AccessResource, Destination, FileFormat, ProjectRequest, SourceConnection, SqlCredentials,
        SqlSource,
    };
    use mockito::Matcher;

    fn project() -> ProjectRequest {
        ProjectRequest::new(
            "omop_extract",
            "20250102_030405",
            Destination::Filestore {
                name: "LSC".into(),
                format: FileFormat::Duckdb,
            },
        )
        .unwrap()
    }

    fn transfer() -> TransferRequest {
        let access = AccessResource {
            source: SourceConnection::Postgresql(SqlSource {
                host_url: "db".into(),
                database: "omop".into(),
                port: 5432,
                credentials: SqlCredentials {
                    provider: None,
                    username_key: "u".into(),
                    password_key: "p".into(),
                },
            }),
            extract_config: Default::default(),
        };
        let dataset = DatasetMetadata {
            name: Some("omop".into()),
            schema_name: "omop".into(),
            description: None,
            tables: None,
            staging_path: None,
            publish_path: None,
        };
        TransferRequest::new(project(), &access, dataset)
    }

    fn services(server: &mockito::Server) -> HttpDataServices {
        let ep = || Some(Endpoint::new(server.url(), Some("secret".into())));
        HttpDataServices::new(ep(), ep(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn validate_returns_remote_metadata() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/project/validate")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "project_name": "omop_extract",
                "dataset": {"schema_name": "omop"}
            })))
            .with_status(200)
            .with_body(
                r#"{"status":"success","payload":{"schema_name":"omop","tables":[{"name":"person","columns":[{"name":"person_id"}]}]}}"#,
            )
            .create();

        let remote = services(&server).validate(&transfer()).unwrap();
        mock.assert();
        assert_eq!(remote.tables()[0].name, "person");
    }

    #[test]
    fn stage_transfer_parses_tagged_payload() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/project/package")
            .with_status(200)
            .with_body(
                r#"{"status":"success","payload":{"destination_type":"filestore","data_retrieved":[{"file_path":"staging/omop.duckdb"}]}}"#,
            )
            .create();

        let payload = services(&server).stage_transfer(&transfer()).unwrap();
        assert_eq!(payload.primary_location(), Some("staging/omop.duckdb"));
    }

    #[test]
    fn http_error_becomes_external_service_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/project/publish")
            .with_status(502)
            .with_body("upstream down")
            .create();

        let err = services(&server).publish(&project()).unwrap_err();
        assert!(matches!(err, Cr8torError::ExternalService(ref m) if m.contains("upstream down")));
    }

    #[test]
    fn error_envelope_becomes_external_service_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/project/publish")
            .with_status(200)
            .with_body(r#"{"status":"error","message":"no staged data"}"#)
            .create();

        let err = services(&server).publish(&project()).unwrap_err();
        assert!(matches!(err, Cr8torError::ExternalService(ref m) if m.contains("no staged data")));
    }

    #[test]
    fn unconfigured_endpoint_fails_without_request() {
        let svc = HttpDataServices::new(None, None, Duration::from_secs(1)).unwrap();
        let err = svc.validate(&transfer()).unwrap_err();
        assert!(matches!(err, Cr8torError::ExternalService(ref m) if m.contains("not configured")));
    }
}
