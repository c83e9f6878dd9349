// Reservation and booking core of the trip planner

pub mod api_contract;
pub mod auth_attempts;
pub mod availability_cache;
pub mod booking_client;
pub mod config;
pub mod http_transport;
pub mod model;
pub mod resource;
pub mod telemetry;
pub mod validation;

// Re-export key types for convenience
pub use auth_attempts::{AttemptState, AuthError, LockoutPolicy, LoginGuard};
pub use availability_cache::{AvailabilityCache, CacheStatsReport};
pub use booking_client::{ApiError, BookingClient, ClientStats, HotelApi};
pub use config::{ClientConfig, ClientError, RetryConfig};
pub use http_transport::HttpHotelApi;
pub use model::{
    DateRange, Hotel, HotelSearchQuery, ItineraryDraft, ItineraryItem, NewUser, Reservation,
    ReservationRequest, ReservationStatus, Room, StayQuery, Trip, TripDraft, User, UserUpdate,
};
pub use resource::{with_loading, Resource};
pub use validation::{
    validate_email, validate_itinerary_item, validate_new_user, validate_password,
    validate_reservation, validate_trip, validate_user_update, PasswordError, ValidationError,
    ValidationErrors,
};
