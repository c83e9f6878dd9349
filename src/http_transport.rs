// reqwest-backed implementation of the availability API transport

use crate::api_contract::{
    ApiErrorBody, AvailabilityParams, CreateReservationBody, HotelListResponse, ReservationDto,
    RoomListResponse,
};
use crate::booking_client::{ApiError, HotelApi};
use crate::config::{ClientConfig, ClientError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

pub const API_KEY_HEADER: &str = "X-Api-Key";

pub struct HttpHotelApi {
    client: Client,
    base_url: String,
    api_key: String,
}

// Sort a reqwest failure into the client's error taxonomy
pub fn classify(error: reqwest::Error) -> ApiError {
    if let Some(status) = error.status() {
        return ApiError::Http {
            status: status.as_u16(),
            message: None,
        };
    }
    if error.is_decode() {
        return ApiError::Unknown(error.to_string());
    }
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        return ApiError::Io(error.to_string());
    }
    ApiError::Unknown(error.to_string())
}

// Non-2xx bodies are expected to be `ApiErrorBody`, anything else is ignored
pub fn http_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.message)
        .filter(|m| !m.trim().is_empty());
    ApiError::Http {
        status: status.as_u16(),
        message,
    }
}

impl HttpHotelApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let request = if self.api_key.is_empty() {
            request
        } else {
            request.header(API_KEY_HEADER, &self.api_key)
        };

        let response: Response = request.send().await.map_err(classify)?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url());

        if !status.is_success() {
            // a body we cannot read still leaves us with the status
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(status, &body));
        }

        let body = response.text().await.map_err(classify)?;
        serde_json::from_str(&body).map_err(|e| ApiError::Unknown(e.to_string()))
    }
}

#[async_trait]
impl HotelApi for HttpHotelApi {
    async fn search_hotels(
        &self,
        params: &AvailabilityParams,
    ) -> Result<HotelListResponse, ApiError> {
        self.send(self.client.get(self.url("hotels")).query(params))
            .await
    }

    async fn list_rooms(
        &self,
        hotel_id: &str,
        params: &AvailabilityParams,
    ) -> Result<RoomListResponse, ApiError> {
        let url = self.url(&format!("hotels/{}/rooms", hotel_id));
        self.send(self.client.get(url).query(params)).await
    }

    async fn create_reservation(
        &self,
        body: &CreateReservationBody,
    ) -> Result<ReservationDto, ApiError> {
        self.send(self.client.post(self.url("reservations")).json(body))
            .await
    }

    async fn get_reservation(&self, reservation_id: &str) -> Result<ReservationDto, ApiError> {
        let url = self.url(&format!("reservations/{}", reservation_id));
        self.send(self.client.get(url)).await
    }

    async fn cancel_reservation(&self, reservation_id: &str) -> Result<ReservationDto, ApiError> {
        let url = self.url(&format!("reservations/{}", reservation_id));
        self.send(self.client.delete(url)).await
    }
}
