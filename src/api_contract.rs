// Wire types for the hotel availability REST API and their mapping onto the domain model

use crate::booking_client::ApiError;
use crate::model::{Hotel, Reservation, ReservationRequest, ReservationStatus, Room};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize, Serialize)]
pub struct HotelListResponse {
    pub hotels: Vec<HotelDto>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotelDto {
    pub hotel_id: String,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub rating: f32,
    pub min_price: f64,
    pub currency: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomDto>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomDto {
    pub room_id: String,
    pub hotel_id: String,
    pub name: String,
    pub max_occupancy: u32,
    pub price_per_night: f64,
    pub currency: String,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreateReservationBody {
    pub hotel_id: String,
    pub room_id: String,
    pub check_in: String,
    pub check_out: String,
    pub guests: u32,
    pub guest_name: String,
    pub guest_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReservationDto {
    pub reservation_id: String,
    pub hotel_id: String,
    pub room_id: String,
    pub check_in: String,
    pub check_out: String,
    pub guests: u32,
    pub guest_name: String,
    pub guest_email: String,
    pub total_price: f64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub external_ref: Option<String>,
}

// Body the API sends alongside non-2xx statuses
#[derive(Debug, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

// Query parameters shared by hotel and room listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub check_in: String,
    pub check_out: String,
    pub guests: u32,
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| ApiError::Unknown(format!("invalid {} '{}': {}", field, value, e)))
}

impl From<HotelDto> for Hotel {
    fn from(item: HotelDto) -> Self {
        Hotel {
            id: item.hotel_id,
            name: item.name,
            city: item.city,
            address: item.address,
            rating: item.rating,
            price_from: item.min_price,
            currency: item.currency,
        }
    }
}

impl From<RoomDto> for Room {
    fn from(item: RoomDto) -> Self {
        Room {
            id: item.room_id,
            hotel_id: item.hotel_id,
            name: item.name,
            capacity: item.max_occupancy,
            price_per_night: item.price_per_night,
            currency: item.currency,
            available: item.available,
        }
    }
}

impl From<&ReservationRequest> for CreateReservationBody {
    fn from(item: &ReservationRequest) -> Self {
        CreateReservationBody {
            hotel_id: item.hotel_id.clone(),
            room_id: item.room_id.clone(),
            check_in: format_date(item.check_in),
            check_out: format_date(item.check_out),
            guests: item.guests,
            guest_name: item.guest_name.trim().to_string(),
            guest_email: item.guest_email.trim().to_string(),
            // the API echoes this back, which is how a booking finds its trip again
            external_ref: item.trip_id.map(|id| format!("trip:{}", id)),
        }
    }
}

impl TryFrom<ReservationDto> for Reservation {
    type Error = ApiError;

    fn try_from(item: ReservationDto) -> Result<Self, Self::Error> {
        let check_in = parse_date("check_in", &item.check_in)?;
        let check_out = parse_date("check_out", &item.check_out)?;
        let status: ReservationStatus = item.status.parse().map_err(ApiError::Unknown)?;
        let trip_id = item
            .external_ref
            .as_deref()
            .and_then(|r| r.strip_prefix("trip:"))
            .and_then(|id| id.parse().ok());

        Ok(Reservation {
            id: item.reservation_id,
            hotel_id: item.hotel_id,
            room_id: item.room_id,
            trip_id,
            guest_name: item.guest_name,
            guest_email: item.guest_email,
            check_in,
            check_out,
            guests: item.guests,
            total_price: item.total_price,
            currency: item.currency,
            status,
        })
    }
}
