use crate::error::{DashboardError, Result};
use crate::global_variables::{
    PATH_LOAD_MAP, PATH_ROAD_CONDITIONS, PATH_SYSTEM_STATE, PATH_TRAFFIC_LIGHTS,
    PATH_TRAFFIC_UPDATE, PATH_VEHICLES,
};
use crate::shared_data::{
    CityMap, RerouteRequest, RoadConditions, RouteRequest, SystemState, TrafficLight,
    TrafficUpdate, Vehicle,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// The remote simulation operations the poller depends on.
pub trait SimulationService: Send + Sync + 'static {
    /// Submits a map; must succeed before any dynamic fetch.
    fn load_map(&self, map: &CityMap) -> impl Future<Output = Result<()>> + Send;

    fn system_state(&self) -> impl Future<Output = Result<SystemState>> + Send;

    fn road_conditions(&self) -> impl Future<Output = Result<RoadConditions>> + Send;

    fn vehicles(&self) -> impl Future<Output = Result<Vec<Vehicle>>> + Send;
}

/// HTTP client for the simulation service's JSON API.
#[derive(Debug, Clone)]
pub struct HttpSimulationClient {
    client: Client,
    base_url: String,
}

impl HttpSimulationClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url(path)).send().await?;
        decode(path, response).await
    }

    /// Manually sets congestion on one or more roads.
    pub async fn update_traffic(&self, updates: &[TrafficUpdate]) -> Result<serde_json::Value> {
        let response = self
            .client
            .put(self.url(PATH_TRAFFIC_UPDATE))
            .json(updates)
            .send()
            .await?;
        decode(PATH_TRAFFIC_UPDATE, response).await
    }

    pub async fn add_vehicle(&self, request: &RouteRequest) -> Result<Vehicle> {
        let response = self
            .client
            .post(self.url(PATH_VEHICLES))
            .json(request)
            .send()
            .await?;
        decode(PATH_VEHICLES, response).await
    }

    pub async fn reroute_vehicle(&self, vehicle_id: &str, request: &RerouteRequest) -> Result<Vehicle> {
        let path = format!("{}/{}/reroute", PATH_VEHICLES, vehicle_id);
        let response = self.client.post(self.url(&path)).json(request).send().await?;
        decode(&path, response).await
    }

    pub async fn vehicle(&self, vehicle_id: &str) -> Result<Vehicle> {
        self.get_json(&format!("{}/{}", PATH_VEHICLES, vehicle_id))
            .await
    }

    pub async fn traffic_lights(&self) -> Result<Vec<TrafficLight>> {
        self.get_json(PATH_TRAFFIC_LIGHTS).await
    }
}

/// Rejects non-2xx responses, then parses the body as JSON.
async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(DashboardError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

impl SimulationService for HttpSimulationClient {
    async fn load_map(&self, map: &CityMap) -> Result<()> {
        let response = self
            .client
            .post(self.url(PATH_LOAD_MAP))
            .json(map)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            log::info!(
                "Map with {} nodes and {} edges accepted by {}",
                map.nodes.len(),
                map.edges.len(),
                self.base_url
            );
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DashboardError::MapLoad(format!("status {}: {}", status.as_u16(), body)))
        }
    }

    async fn system_state(&self) -> Result<SystemState> {
        self.get_json(PATH_SYSTEM_STATE).await
    }

    async fn road_conditions(&self) -> Result<RoadConditions> {
        self.get_json(PATH_ROAD_CONDITIONS).await
    }

    async fn vehicles(&self) -> Result<Vec<Vehicle>> {
        self.get_json(PATH_VEHICLES).await
    }
}
