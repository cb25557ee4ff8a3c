use std::time::Duration;

use crate::commands::PipelineCommand;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::status::{StatusSnapshot, error_detail};

/// Source of status snapshots for one project.
pub trait StatusClient {
    fn fetch(&mut self, project_id: &str) -> Result<StatusSnapshot>;
}

/// Raw answer to a pipeline command; judging the code is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub status: u16,
    pub body: String,
}

pub trait CommandClient {
    fn post_command(&mut self, project_id: &str, command: PipelineCommand) -> Result<CommandReply>;
}

/// Blocking HTTP access to the clustering backend.
pub struct HttpBackend {
    base_url: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("server base_url is empty"));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::msg(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    pub fn from_config(cfg: &ServerConfig) -> Result<Self> {
        Self::new(
            &cfg.resolved_base_url(),
            cfg.resolved_token(),
            Duration::from_secs(cfg.timeout_secs.max(1)),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn status_url(&self, project_id: &str) -> String {
        format!("{}/api/projects/{project_id}/status", self.base_url)
    }

    pub fn command_url(&self, project_id: &str, command: PipelineCommand) -> String {
        format!(
            "{}/api/projects/{project_id}/{}",
            self.base_url,
            command.path_segment()
        )
    }

    fn authorize(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match self.token.as_deref() {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }
}

impl StatusClient for HttpBackend {
    fn fetch(&mut self, project_id: &str) -> Result<StatusSnapshot> {
        let url = self.status_url(project_id);
        tracing::debug!(%url, "fetching project status");
        let res = self
            .authorize(self.client.get(&url))
            .send()
            .map_err(|e| Error::transport(format!("status request failed: {e}")))?;
        let code = res.status();
        let body = res
            .text()
            .map_err(|e| Error::transport(format!("status body read failed: {e}")))?;
        if code != reqwest::StatusCode::OK {
            return Err(Error::protocol(format!(
                "status request answered {}: {}",
                code.as_u16(),
                error_detail(&body)
            )));
        }
        StatusSnapshot::from_json(&body)
    }
}

impl CommandClient for HttpBackend {
    fn post_command(&mut self, project_id: &str, command: PipelineCommand) -> Result<CommandReply> {
        let url = self.command_url(project_id, command);
        tracing::info!(%url, command = command.key(), "posting pipeline command");
        let res = self
            .authorize(self.client.post(&url))
            .send()
            .map_err(|e| Error::transport(format!("{} request failed: {e}", command.key())))?;
        let status = res.status().as_u16();
        let body = res
            .text()
            .map_err(|e| Error::transport(format!("{} body read failed: {e}", command.key())))?;
        Ok(CommandReply { status, body })
    }
}
