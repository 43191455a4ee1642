use amrview_core::{
    ApiEnvelope, CameraBinding, ConfigUpload, DispatchPayload, GridConfig, TaskCell, Zone,
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::dispatch::DispatchTransport;
use crate::error::{BackendError, DispatchError};
use crate::grid_config::ConfigSource;

const ADD_TASK_PATH: &[&str] = &["ics", "taskOrder", "addTask"];

/// Base URLs of the three backend services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEndpoints {
    /// Task data, grid configuration and camera list.
    pub rest: Url,
    /// Task-order submission.
    pub rcs: Url,
    /// Telemetry and monitor WebSockets.
    pub ws: Url,
}

fn parse_base(raw: &str) -> Result<Url, BackendError> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| BackendError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(BackendError::InvalidUrl {
            url: raw.to_string(),
            reason: "not a base url".to_string(),
        });
    }
    Ok(url)
}

fn join(base: &Url, segments: &[&str]) -> Result<Url, BackendError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| BackendError::InvalidUrl {
            url: base.to_string(),
            reason: "not a base url".to_string(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

impl BackendEndpoints {
    /// Hosts without a scheme get `http://` (REST, RCS) or `ws://` (WebSocket).
    pub fn new(rest: &str, rcs: &str, ws: &str) -> Result<Self, BackendError> {
        let ws = if ws.contains("://") {
            ws.to_string()
        } else {
            format!("ws://{ws}")
        };
        Ok(Self {
            rest: parse_base(rest)?,
            rcs: parse_base(rcs)?,
            ws: parse_base(&ws)?,
        })
    }

    /// Legacy positional list: index 0 is the REST server, index 1 the RCS.
    /// A single entry serves both.
    pub fn from_server_ips(ips: &[String], ws: &str) -> Result<Self, BackendError> {
        let rest = ips.first().ok_or_else(|| BackendError::InvalidUrl {
            url: String::new(),
            reason: "server_ips is empty".to_string(),
        })?;
        let rcs = ips.get(1).unwrap_or(rest);
        Self::new(rest, rcs, ws)
    }

    /// Identifies the REST server in grid configuration records.
    pub fn server_key(&self) -> String {
        match (self.rest.host_str(), self.rest.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            _ => self.rest.to_string(),
        }
    }

    pub fn task_data_url(&self, zone: Zone, username: &str) -> Result<Url, BackendError> {
        let mut url = join(&self.rest, &["get-task-data", zone.as_str()])?;
        url.query_pairs_mut().append_pair("username", username);
        Ok(url)
    }

    pub fn config_url(&self, username: Option<&str>) -> Result<Url, BackendError> {
        let mut url = join(&self.rest, &["config"])?;
        if let Some(username) = username {
            url.query_pairs_mut().append_pair("username", username);
        }
        Ok(url)
    }

    pub fn cameras_url(&self, area_id: i64) -> Result<Url, BackendError> {
        let mut url = join(&self.rest, &["cameras"])?;
        url.query_pairs_mut()
            .append_pair("area_id", &area_id.to_string());
        Ok(url)
    }

    pub fn add_task_url(&self) -> Result<Url, BackendError> {
        join(&self.rcs, ADD_TASK_PATH)
    }

    pub fn telemetry_ws_url(&self) -> Result<Url, BackendError> {
        join(&self.ws, &["ws", "agv"])
    }

    pub fn monitor_ws_url(&self, group: &str) -> Result<Url, BackendError> {
        join(&self.ws, &["ws", "group", group])
    }
}

/// HTTP client for the REST backend and the RCS.
#[derive(Debug, Clone)]
pub struct Backend {
    client: Client,
    endpoints: BackendEndpoints,
}

impl Backend {
    pub fn new(endpoints: BackendEndpoints, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &BackendEndpoints {
        &self.endpoints
    }

    async fn envelope<T: DeserializeOwned>(
        endpoint: &Url,
        resp: Response,
    ) -> Result<Option<T>, BackendError> {
        let resp = check_status(endpoint, resp)?;
        let env: ApiEnvelope<T> = resp.json().await?;
        if !env.is_success() {
            return Err(BackendError::Rejected {
                endpoint: endpoint.path().to_string(),
                message: env.message.unwrap_or(env.status),
            });
        }
        Ok(env.data)
    }

    /// Rows of `zone` for `username`. A missing `data` field means no rows.
    pub async fn fetch_task_rows(
        &self,
        zone: Zone,
        username: &str,
    ) -> Result<Vec<TaskCell>, BackendError> {
        let url = self.endpoints.task_data_url(zone, username)?;
        let resp = self.client.get(url.clone()).send().await?;
        let rows: Vec<TaskCell> = Self::envelope(&url, resp).await?.unwrap_or_default();
        tracing::debug!(%zone, rows = rows.len(), "fetched task rows");
        Ok(rows)
    }

    pub async fn fetch_grid_config(&self, username: &str) -> Result<GridConfig, BackendError> {
        let url = self.endpoints.config_url(Some(username))?;
        let resp = self.client.get(url.clone()).send().await?;
        Self::envelope(&url, resp)
            .await?
            .ok_or_else(|| BackendError::Rejected {
                endpoint: url.path().to_string(),
                message: "response carries no configuration".to_string(),
            })
    }

    pub async fn save_grid_config(
        &self,
        config: &GridConfig,
        username: &str,
    ) -> Result<(), BackendError> {
        let url = self.endpoints.config_url(None)?;
        let body = ConfigUpload {
            config_data: config,
            username,
        };
        let resp = self.client.post(url.clone()).json(&body).send().await?;
        Self::envelope::<serde_json::Value>(&url, resp).await?;
        Ok(())
    }

    pub async fn fetch_cameras(&self, area_id: i64) -> Result<Vec<CameraBinding>, BackendError> {
        let url = self.endpoints.cameras_url(area_id)?;
        let resp = self.client.get(url.clone()).send().await?;
        Ok(Self::envelope(&url, resp).await?.unwrap_or_default())
    }

    /// Any 2xx counts as accepted; the body is not inspected.
    pub async fn add_task(&self, payload: &DispatchPayload) -> Result<(), BackendError> {
        let url = self.endpoints.add_task_url()?;
        let resp = self.client.post(url.clone()).json(payload).send().await?;
        check_status(&url, resp)?;
        Ok(())
    }
}

fn check_status(endpoint: &Url, resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(BackendError::Status {
            endpoint: endpoint.path().to_string(),
            status: status.as_u16(),
        })
    }
}

impl DispatchTransport for Backend {
    fn send(&self, payload: DispatchPayload) -> BoxFuture<'static, Result<(), DispatchError>> {
        let backend = self.clone();
        async move {
            backend
                .add_task(&payload)
                .await
                .map_err(|e| DispatchError::Transport(e.to_string()))
        }
        .boxed()
    }
}

impl ConfigSource for Backend {
    fn server_key(&self) -> String {
        self.endpoints.server_key()
    }

    fn fetch(&self, username: &str) -> BoxFuture<'static, Result<GridConfig, BackendError>> {
        let backend = self.clone();
        let username = username.to_string();
        async move { backend.fetch_grid_config(&username).await }.boxed()
    }

    fn save(
        &self,
        config: GridConfig,
        username: &str,
    ) -> BoxFuture<'static, Result<(), BackendError>> {
        let backend = self.clone();
        let username = username.to_string();
        async move { backend.save_grid_config(&config, &username).await }.boxed()
    }
}
