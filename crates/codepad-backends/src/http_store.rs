use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use codepad_platform::project::{ProjectRecord, TemplateFolder};
use codepad_platform::store::ProjectStore;

use crate::check_id;

/// Body of `PUT /api/projects/{id}`
#[derive(Serialize)]
struct SaveRequest<'a> {
    tree: &'a TemplateFolder,
}

/// Project store behind the web app's HTTP API
pub struct HttpStore {
    client: reqwest::Client,
    base: String,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn project_url(&self, id: &str) -> Result<String> {
        check_id(id)?;
        Ok(format!("{}/api/projects/{}", self.base, id))
    }
}

#[async_trait]
impl ProjectStore for HttpStore {
    async fn load_project(&self, id: &str) -> Result<ProjectRecord> {
        let url = self.project_url(id)?;
        debug!("GET {}", url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to fetch project {}", id))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            bail!("project {} not found", id);
        }
        if !resp.status().is_success() {
            bail!("project fetch failed: HTTP {}", resp.status());
        }
        resp.json().await.context("invalid project response")
    }

    async fn save_project(&self, id: &str, tree: &TemplateFolder) -> Result<()> {
        let url = self.project_url(id)?;
        debug!("PUT {}", url);
        let resp = self
            .client
            .put(&url)
            .json(&SaveRequest { tree })
            .send()
            .await
            .with_context(|| format!("failed to save project {}", id))?;

        if !resp.status().is_success() {
            bail!("project save failed: HTTP {}", resp.status());
        }
        Ok(())
    }
}
