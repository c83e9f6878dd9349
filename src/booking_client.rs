// Booking client: maps the domain model onto the hotel availability API and
// reports every outcome to the UI as a `Resource`

use crate::api_contract::{
    format_date, AvailabilityParams, CreateReservationBody, HotelListResponse, ReservationDto,
    RoomListResponse,
};
use crate::availability_cache::{AvailabilityCache, CacheStatsReport};
use crate::config::{ClientConfig, RetryConfig};
use crate::model::{Hotel, HotelSearchQuery, Reservation, ReservationRequest, Room, StayQuery};
use crate::resource::{with_loading, Resource, HTTP_FALLBACK_MESSAGE, IO_MESSAGE};
use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

// Failure taxonomy for calls to the availability API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("HTTP error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Http {
        status: u16,
        message: Option<String>,
    },

    // Connection, timeout or body-read failures
    #[error("I/O error: {0}")]
    Io(String),

    // Anything the client could not make sense of, e.g. an undecodable body
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Io(_) => true,
            ApiError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            ApiError::Unknown(_) => false,
        }
    }

    // Text shown to the user
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            ApiError::Http { .. } => HTTP_FALLBACK_MESSAGE.to_string(),
            ApiError::Io(_) => IO_MESSAGE.to_string(),
            ApiError::Unknown(detail) => format!("Unknown error: {}", detail),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
    pub cache_hits: usize,
    pub average_response_time_ms: f64,
    pub cache: CacheStatsReport,
}

// The transport the client is built on, one method per endpoint
#[async_trait]
pub trait HotelApi: Send + Sync + 'static {
    async fn search_hotels(&self, params: &AvailabilityParams)
        -> Result<HotelListResponse, ApiError>;

    async fn list_rooms(
        &self,
        hotel_id: &str,
        params: &AvailabilityParams,
    ) -> Result<RoomListResponse, ApiError>;

    async fn create_reservation(
        &self,
        body: &CreateReservationBody,
    ) -> Result<ReservationDto, ApiError>;

    async fn get_reservation(&self, reservation_id: &str) -> Result<ReservationDto, ApiError>;

    async fn cancel_reservation(&self, reservation_id: &str) -> Result<ReservationDto, ApiError>;
}

// Exponential backoff with jitter to prevent thundering herd
pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
    let base_backoff_ms = (config.initial_backoff_ms as f64
        * config.backoff_multiplier.powf(retry_attempt as f64))
    .min(config.max_backoff_ms as f64);

    let jitter = rand::random::<f64>() * config.jitter_factor * base_backoff_ms;
    let backoff_ms = base_backoff_ms * (1.0 - config.jitter_factor / 2.0) + jitter;

    Duration::from_millis(backoff_ms as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    Allowed,
    Never,
}

pub struct BookingClient<A: HotelApi> {
    api: A,
    retry_config: RetryConfig,
    cache: AvailabilityCache,
    stats: Mutex<ClientStats>,
}

impl<A: HotelApi> BookingClient<A> {
    pub fn new(api: A, config: &ClientConfig) -> Self {
        Self {
            api,
            retry_config: config.retry_config.clone(),
            cache: AvailabilityCache::new(config.cache_ttl(), config.cache_max_entries),
            stats: Mutex::new(ClientStats::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn stats(&self) -> ClientStats {
        let mut stats = self.stats.lock().clone();
        stats.cache = self.cache.stats();
        stats
    }

    fn record_attempt(&self, started: Instant, succeeded: bool) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut stats = self.stats.lock();
        stats.requests_sent += 1;
        let n = stats.requests_sent as f64;
        stats.average_response_time_ms += (elapsed_ms - stats.average_response_time_ms) / n;
        if succeeded {
            stats.requests_succeeded += 1;
        } else {
            stats.requests_failed += 1;
        }
    }

    async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        retry: Retry,
        mut call: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0;
        loop {
            debug!("{} (attempt {})", operation, attempt + 1);
            let started = Instant::now();
            match call().await {
                Ok(value) => {
                    self.record_attempt(started, true);
                    return Ok(value);
                }
                Err(e) => {
                    self.record_attempt(started, false);
                    let can_retry = retry == Retry::Allowed
                        && e.is_retryable()
                        && attempt < self.retry_config.max_retries;
                    if !can_retry {
                        warn!("{} failed: {}", operation, e);
                        return Err(e);
                    }

                    let backoff = calculate_backoff(attempt, &self.retry_config);
                    warn!("{} failed: {}, retrying in {:?}", operation, e, backoff);
                    self.stats.lock().requests_retried += 1;
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn search_hotels(&self, query: &HotelSearchQuery) -> Resource<Vec<Hotel>> {
        if let Some(hotels) = self.cache.get(query) {
            self.stats.lock().cache_hits += 1;
            debug!("Serving {} cached hotels for {}", hotels.len(), query.city);
            return Resource::Success(hotels);
        }

        let params = AvailabilityParams {
            city: Some(query.city.trim().to_string()),
            check_in: format_date(query.check_in),
            check_out: format_date(query.check_out),
            guests: query.guests,
        };
        let result = self
            .execute("search_hotels", Retry::Allowed, || self.api.search_hotels(&params))
            .await
            .map(|response| {
                response
                    .hotels
                    .into_iter()
                    .map(Hotel::from)
                    .collect::<Vec<_>>()
            });

        if let Ok(hotels) = &result {
            self.cache.store(query, hotels.clone());
        }
        result.into()
    }

    // Rooms that are free for the stay and fit the party, cheapest first
    pub async fn available_rooms(&self, hotel_id: &str, stay: &StayQuery) -> Resource<Vec<Room>> {
        let params = AvailabilityParams {
            city: None,
            check_in: format_date(stay.check_in),
            check_out: format_date(stay.check_out),
            guests: stay.guests,
        };
        let result = self
            .execute("list_rooms", Retry::Allowed, || {
                self.api.list_rooms(hotel_id, &params)
            })
            .await
            .map(|response| {
                let mut rooms: Vec<Room> = response
                    .rooms
                    .into_iter()
                    .map(Room::from)
                    .filter(|room| room.available && room.capacity >= stay.guests)
                    .collect();
                rooms.sort_by(|a, b| a.price_per_night.total_cmp(&b.price_per_night));
                rooms
            });
        result.into()
    }

    // Creating a booking is not idempotent, so it is never retried
    pub async fn reserve(&self, request: &ReservationRequest) -> Resource<Reservation> {
        let body = CreateReservationBody::from(request);
        let created = self
            .execute("create_reservation", Retry::Never, || {
                self.api.create_reservation(&body)
            })
            .await;

        // the room is taken on the server even if the echo cannot be read
        if created.is_ok() {
            self.cache
                .invalidate_stay(request.check_in, request.check_out);
        }

        let result = created
            .and_then(Reservation::try_from)
            .map(|mut reservation| {
                // the API may not echo the trip reference back
                if reservation.trip_id.is_none() {
                    reservation.trip_id = request.trip_id;
                }
                reservation
            });

        match &result {
            Ok(reservation) => info!(
                "Reserved room {} at {} ({} to {}) as {}",
                reservation.room_id,
                reservation.hotel_id,
                reservation.check_in,
                reservation.check_out,
                reservation.id
            ),
            Err(ApiError::Unknown(detail)) => warn!(
                "Reservation for room {} was accepted but could not be read back: {}",
                request.room_id, detail
            ),
            Err(_) => {}
        }
        result.into()
    }

    pub async fn reservation(&self, reservation_id: &str) -> Resource<Reservation> {
        self.execute("get_reservation", Retry::Allowed, || {
            self.api.get_reservation(reservation_id)
        })
        .await
        .and_then(Reservation::try_from)
        .into()
    }

    pub async fn cancel(&self, reservation_id: &str) -> Resource<Reservation> {
        let result = self
            .execute("cancel_reservation", Retry::Never, || {
                self.api.cancel_reservation(reservation_id)
            })
            .await
            .and_then(Reservation::try_from);

        if let Ok(reservation) = &result {
            info!("Cancelled reservation {}", reservation.id);
            self.cache
                .invalidate_stay(reservation.check_in, reservation.check_out);
        }
        result.into()
    }

    pub fn search_hotels_stream<'a>(
        &'a self,
        query: &'a HotelSearchQuery,
    ) -> impl Stream<Item = Resource<Vec<Hotel>>> + 'a {
        with_loading(self.search_hotels(query))
    }

    pub fn available_rooms_stream<'a>(
        &'a self,
        hotel_id: &'a str,
        stay: &'a StayQuery,
    ) -> impl Stream<Item = Resource<Vec<Room>>> + 'a {
        with_loading(self.available_rooms(hotel_id, stay))
    }

    pub fn reserve_stream<'a>(
        &'a self,
        request: &'a ReservationRequest,
    ) -> impl Stream<Item = Resource<Reservation>> + 'a {
        with_loading(self.reserve(request))
    }

    pub fn reservation_stream<'a>(
        &'a self,
        reservation_id: &'a str,
    ) -> impl Stream<Item = Resource<Reservation>> + 'a {
        with_loading(self.reservation(reservation_id))
    }

    pub fn cancel_stream<'a>(
        &'a self,
        reservation_id: &'a str,
    ) -> impl Stream<Item = Resource<Reservation>> + 'a {
        with_loading(self.cancel(reservation_id))
    }

    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::mock_api::{MockHotelApi, ServerMode};
    use super::*;
    use crate::api_contract::{HotelDto, RoomDto};
    use crate::model::ReservationStatus;
    use chrono::NaiveDate;
    use futures::StreamExt;
    use tokio_test::{assert_err, assert_ok};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn test_config() -> ClientConfig {
        ClientConfig {
            base_url: "https://api.example.com".to_string(),
            api_key: "test_key".to_string(),
            timeout_ms: 1000,
            retry_config: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
                backoff_multiplier: 2.0,
                jitter_factor: 0.1,
            },
            cache_ttl_seconds: 60,
            cache_max_entries: 16,
        }
    }

    fn room(room_id: &str, capacity: u32, price: f64, available: bool) -> RoomDto {
        RoomDto {
            room_id: room_id.to_string(),
            hotel_id: "H1".to_string(),
            name: format!("Room {}", room_id),
            max_occupancy: capacity,
            price_per_night: price,
            currency: "EUR".to_string(),
            available,
        }
    }

    async fn seeded_client() -> BookingClient<MockHotelApi> {
        let api = MockHotelApi::new();
        api.add_hotel(HotelDto {
            hotel_id: "H1".to_string(),
            name: "Casa Azul".to_string(),
            city: "Lisbon".to_string(),
            address: "Rua Augusta 1".to_string(),
            rating: 4.5,
            min_price: 90.0,
            currency: "EUR".to_string(),
        })
        .await;
        api.add_hotel(HotelDto {
            hotel_id: "H2".to_string(),
            name: "Ribeira Inn".to_string(),
            city: "Porto".to_string(),
            address: String::new(),
            rating: 3.5,
            min_price: 60.0,
            currency: "EUR".to_string(),
        })
        .await;
        api.add_room(room("SGL", 1, 90.0, true)).await;
        api.add_room(room("DBL", 2, 120.0, true)).await;
        api.add_room(room("TWN", 2, 110.0, false)).await;
        api.add_room(room("FAM", 4, 100.0, true)).await;
        BookingClient::new(api, &test_config())
    }

    fn lisbon_query() -> HotelSearchQuery {
        HotelSearchQuery {
            city: "Lisbon".to_string(),
            check_in: date(6, 1),
            check_out: date(6, 5),
            guests: 2,
        }
    }

    fn booking(room_id: &str) -> ReservationRequest {
        ReservationRequest {
            hotel_id: "H1".to_string(),
            room_id: room_id.to_string(),
            trip_id: Some(7),
            guest_name: "Ada Lovelace".to_string(),
            guest_email: "ada@example.com".to_string(),
            check_in: date(6, 1),
            check_out: date(6, 5),
            guests: 2,
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::Io("reset".to_string()).is_retryable());
        assert!(ApiError::Http { status: 503, message: None }.is_retryable());
        assert!(ApiError::Http { status: 429, message: None }.is_retryable());
        assert!(!ApiError::Http { status: 409, message: None }.is_retryable());
        assert!(!ApiError::Unknown("eof".to_string()).is_retryable());
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::default();
        let first = calculate_backoff(0, &config);
        assert!(first >= Duration::from_millis(95) && first <= Duration::from_millis(105));

        let capped = calculate_backoff(20, &config);
        assert!(capped <= Duration::from_millis(10_500));
    }

    #[tokio::test]
    async fn test_search_maps_hotels_and_caches() {
        let client = seeded_client().await;

        let first = client.search_hotels(&lisbon_query()).await;
        let hotels = first.data().unwrap();
        assert_eq!(hotels.len(), 1);
        assert_eq!(hotels[0].name, "Casa Azul");
        assert_eq!(hotels[0].price_from, 90.0);

        let second = client.search_hotels(&lisbon_query()).await;
        assert!(second.is_success());
        assert_eq!(client.api().request_count(), 1);

        let stats = client.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.requests_sent, 1);
        assert_eq!(stats.cache.hit_count, 1);
    }

    #[tokio::test]
    async fn test_search_stream_emits_loading_then_success() {
        let client = seeded_client().await;
        let query = lisbon_query();
        let states: Vec<_> = client.search_hotels_stream(&query).collect().await;

        assert_eq!(states.len(), 2);
        assert!(states[0].is_loading());
        assert!(states[1].is_success());
    }

    #[tokio::test]
    async fn test_retry_with_backoff() {
        let client = seeded_client().await;
        client.api().fail_next_requests(2);

        let result = client.search_hotels(&lisbon_query()).await;
        assert!(result.is_success());

        let stats = client.stats();
        assert_eq!(stats.requests_sent, 3);
        assert_eq!(stats.requests_retried, 2);
        assert_eq!(stats.requests_failed, 2);
        assert_eq!(stats.requests_succeeded, 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let client = seeded_client().await;
        client.api().fail_next_requests(10);

        let result = client.search_hotels(&lisbon_query()).await;
        assert_eq!(result.error_message(), Some("Service temporarily unavailable"));
        assert_eq!(client.api().request_count(), 3);
        assert_eq!(client.stats().cache.items_count, 0);
    }

    #[tokio::test]
    async fn test_offline_maps_to_io_message() {
        let client = seeded_client().await;
        client.api().set_mode(ServerMode::Offline);

        let result = client.available_rooms("H1", &booking("DBL").stay()).await;
        assert_eq!(result.error_message(), Some(IO_MESSAGE));
        assert_eq!(client.stats().requests_retried, 2);
    }

    #[tokio::test]
    async fn test_http_without_message_uses_fallback() {
        let client = seeded_client().await;
        client.api().set_mode(ServerMode::Unavailable);

        let result = client.reservation("R-1").await;
        assert_eq!(result.error_message(), Some(HTTP_FALLBACK_MESSAGE));
    }

    #[tokio::test]
    async fn test_garbled_response_is_unknown_and_not_retried() {
        let client = seeded_client().await;
        client.api().set_mode(ServerMode::Garbled);

        let result = client.search_hotels(&lisbon_query()).await;
        assert_eq!(
            result.error_message(),
            Some("Unknown error: expected value at line 1")
        );
        assert_eq!(client.api().request_count(), 1);
    }

    #[tokio::test]
    async fn test_available_rooms_filters_and_sorts() {
        let client = seeded_client().await;

        let rooms = client
            .available_rooms("H1", &booking("DBL").stay())
            .await
            .into_data()
            .unwrap();
        let ids: Vec<&str> = rooms.iter().map(|r| r.id.as_str()).collect();

        // SGL is too small, TWN is sold out
        assert_eq!(ids, vec!["FAM", "DBL"]);
    }

    #[tokio::test]
    async fn test_unknown_hotel_surfaces_server_message() {
        let client = seeded_client().await;
        let result = client.available_rooms("H404", &booking("DBL").stay()).await;
        assert_eq!(result.error_message(), Some("Hotel not found"));
    }

    #[tokio::test]
    async fn test_reserve_and_fetch() {
        let client = seeded_client().await;

        let reservation = client.reserve(&booking("DBL")).await.into_data().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.trip_id, Some(7));
        assert_eq!(reservation.total_price, 480.0);
        assert_eq!(reservation.check_out, date(6, 5));

        let fetched = client.reservation(&reservation.id).await;
        assert_eq!(fetched, Resource::Success(reservation));
    }

    #[tokio::test]
    async fn test_reserve_is_never_retried() {
        let client = seeded_client().await;
        client.api().fail_next_requests(1);

        let result = client.reserve(&booking("DBL")).await;
        assert!(result.is_error());
        assert_eq!(client.api().request_count(), 1);
        assert_eq!(client.stats().requests_retried, 0);
    }

    #[tokio::test]
    async fn test_reserve_conflict() {
        let client = seeded_client().await;
        client.api().conflict_on_room("DBL").await;

        let states: Vec<_> = client.reserve_stream(&booking("DBL")).collect().await;
        assert!(states[0].is_loading());
        assert_eq!(states[1].error_message(), Some("Room no longer available"));
    }

    #[tokio::test]
    async fn test_reserve_invalidates_cached_search() {
        let client = seeded_client().await;
        assert!(client.search_hotels(&lisbon_query()).await.is_success());
        assert_eq!(client.stats().cache.items_count, 1);

        assert!(client.reserve(&booking("DBL")).await.is_success());
        assert_eq!(client.stats().cache.items_count, 0);

        assert!(client.search_hotels(&lisbon_query()).await.is_success());
        // search, reservation, search again
        assert_eq!(client.api().request_count(), 3);
    }

    #[tokio::test]
    async fn test_unreadable_booking_still_invalidates_search() {
        let client = seeded_client().await;
        assert!(client.search_hotels(&lisbon_query()).await.is_success());
        client.api().answer_bookings_with("on-hold").await;

        let result = client.reserve(&booking("DBL")).await;
        assert!(result.is_error());
        assert!(result.error_message().unwrap().starts_with("Unknown error"));
        assert_eq!(client.stats().cache.items_count, 0);
    }

    #[tokio::test]
    async fn test_reservation_stream() {
        let client = seeded_client().await;
        let reservation = client.reserve(&booking("DBL")).await.into_data().unwrap();

        let states: Vec<_> = client.reservation_stream(&reservation.id).collect().await;
        assert_eq!(
            states,
            vec![Resource::Loading(None), Resource::Success(reservation)]
        );

        let missing: Vec<_> = client.reservation_stream("R-404").collect().await;
        assert!(missing[0].is_loading());
        assert_eq!(missing[1].error_message(), Some("Reservation not found"));
    }

    #[tokio::test]
    async fn test_cancel() {
        let client = seeded_client().await;
        let reservation = client.reserve(&booking("FAM")).await.into_data().unwrap();

        let cancelled = client.cancel(&reservation.id).await.into_data().unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);

        let missing = client.cancel("R-999").await;
        assert_eq!(missing.error_message(), Some("Reservation not found"));
    }

    #[tokio::test]
    async fn test_execute_passes_through_results() {
        let client = seeded_client().await;
        let ok: Result<u32, ApiError> = client
            .execute("noop", Retry::Never, || async { Ok(1) })
            .await;
        assert_ok!(ok);

        let err: Result<u32, ApiError> = client
            .execute("broken", Retry::Allowed, || async {
                Err(ApiError::Unknown("nope".to_string()))
            })
            .await;
        assert_err!(err);
        assert_eq!(client.stats().requests_retried, 0);
    }
}
