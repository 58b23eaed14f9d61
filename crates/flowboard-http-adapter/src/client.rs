//! HTTP implementation of the workflow backend
//!
//! Talks to the backend's JSON API with a shared `reqwest::Client`. Every
//! request checks the status first: non-2xx responses become
//! [`HttpAdapterError::Status`] carrying the body text, and envelopes with
//! `success: false` become [`HttpAdapterError::Unsuccessful`].

use async_trait::async_trait;
use flowboard_engine::{
    CatalogData, CatalogResponse, EngineError, ExecutionDescriptor, ExecutionResponse,
    OptionKey, OptionsProvider, SaveWorkflowRequest, StoredWorkflow, UiOption, WorkflowBackend,
    WorkflowSummary,
};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BackendConfig;
use crate::constants::{endpoints, families};
use crate::error::{HttpAdapterError, Result};

/// `{success, data, error?}` wrapper used by most endpoints
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self, what: &str) -> Result<T> {
        if !self.success {
            let reason = self
                .error
                .or(self.message)
                .unwrap_or_else(|| format!("{} returned success=false", what));
            log::warn!("Backend reported failure: {}", reason);
            return Err(HttpAdapterError::Unsuccessful(reason));
        }
        self.data
            .ok_or_else(|| HttpAdapterError::Unsuccessful(format!("{} returned no data", what)))
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    name: String,
    #[serde(default)]
    points_count: u64,
}

#[derive(Debug, Deserialize)]
struct CollectionsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    collections: Vec<CollectionInfo>,
}

/// Workflow backend reached over HTTP
pub struct HttpBackend {
    /// HTTP client for API requests
    http_client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Create a backend client from a resolved configuration
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&self.config.endpoint(path))
            .map_err(|e| HttpAdapterError::Config(format!("invalid base_url: {}", e)))
    }

    /// Endpoint with one extra path segment, percent-encoded
    fn url_with_segment(&self, path: &str, segment: &str) -> Result<Url> {
        let mut url = self.url(path)?;
        url.path_segments_mut()
            .map_err(|_| HttpAdapterError::Config("base_url cannot carry a path".into()))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        log::debug!("GET {}", url);
        let response = self.http_client.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.config.endpoint(path);
        log::debug!("POST {}", url);
        let response = self.http_client.post(&url).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpAdapterError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Fetch the node catalog
    pub async fn catalog(&self) -> Result<CatalogData> {
        let response: CatalogResponse = self.get_json(self.url(endpoints::CATALOG)?).await?;
        if !response.success {
            log::warn!("Catalog endpoint returned success=false");
            return Err(HttpAdapterError::Unsuccessful(
                "catalog returned success=false".into(),
            ));
        }
        Ok(response.data)
    }

    /// Models offered by one service
    pub async fn models(&self, service: &str) -> Result<Vec<UiOption>> {
        let url = self.url_with_segment(endpoints::MODELS, service)?;
        let envelope: Envelope<ModelList> = self.get_json(url).await?;
        let list = envelope.into_data("models")?;
        Ok(list.models.into_iter().map(UiOption::plain).collect())
    }

    /// Vector store collections, labelled with their document counts
    pub async fn collections(&self) -> Result<Vec<UiOption>> {
        let response: CollectionsResponse = self.get_json(self.url(endpoints::COLLECTIONS)?).await?;
        if !response.success {
            return Err(HttpAdapterError::Unsuccessful(
                "collections returned success=false".into(),
            ));
        }
        Ok(response
            .collections
            .into_iter()
            .map(|c| UiOption {
                label: format!("{} ({} docs)", c.name, c.points_count),
                value: c.name,
                disabled: false,
            })
            .collect())
    }

    /// Resolve an option list by family
    pub async fn options(&self, key: &OptionKey) -> Result<Vec<UiOption>> {
        match key.family.as_str() {
            families::MODELS => {
                let service = key.dependent_value.as_deref().ok_or_else(|| {
                    HttpAdapterError::Config("models require a service value".into())
                })?;
                self.models(service).await
            }
            families::COLLECTIONS => self.collections().await,
            other => Err(HttpAdapterError::UnsupportedOptionFamily(other.to_string())),
        }
    }

    /// Submit a compiled workflow
    ///
    /// A run the engine reports as failed is still `Ok`.
    pub async fn run(&self, descriptor: &ExecutionDescriptor) -> Result<ExecutionResponse> {
        self.post_json(endpoints::EXECUTE, descriptor).await
    }

    pub async fn save(&self, request: &SaveWorkflowRequest) -> Result<Value> {
        self.post_json(endpoints::WORKFLOWS, request).await
    }

    pub async fn load(&self, id: &str) -> Result<StoredWorkflow> {
        let url = self.url_with_segment(endpoints::WORKFLOWS, id)?;
        let envelope: Envelope<StoredWorkflow> = self.get_json(url).await?;
        envelope.into_data("workflow load")
    }

    pub async fn list(&self) -> Result<Vec<WorkflowSummary>> {
        let envelope: Envelope<Vec<WorkflowSummary>> =
            self.get_json(self.url(endpoints::WORKFLOWS)?).await?;
        envelope.into_data("workflow list")
    }
}

#[async_trait]
impl OptionsProvider for HttpBackend {
    async fn fetch_options(&self, key: &OptionKey) -> flowboard_engine::Result<Vec<UiOption>> {
        self.options(key)
            .await
            .map_err(HttpAdapterError::into_schema_fetch)
    }
}

#[async_trait]
impl WorkflowBackend for HttpBackend {
    async fn fetch_catalog(&self) -> flowboard_engine::Result<CatalogData> {
        self.catalog()
            .await
            .map_err(HttpAdapterError::into_schema_fetch)
    }

    async fn execute(
        &self,
        descriptor: &ExecutionDescriptor,
    ) -> flowboard_engine::Result<ExecutionResponse> {
        Ok(self.run(descriptor).await?)
    }

    async fn save_workflow(&self, request: &SaveWorkflowRequest) -> flowboard_engine::Result<Value> {
        Ok(self.save(request).await?)
    }

    async fn load_workflow(&self, id: &str) -> flowboard_engine::Result<StoredWorkflow> {
        Ok(self.load(id).await?)
    }

    async fn list_workflows(&self) -> flowboard_engine::Result<Vec<WorkflowSummary>> {
        self.list().await.map_err(EngineError::from)
    }
}
