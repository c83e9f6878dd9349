// Client-side validation for users, trips, itinerary items and reservations.
// Every rule is a pure function over the submitted payload plus whatever
// existing records the cross-entity checks need.

use crate::model::{
    DateRange, ItineraryDraft, ItineraryId, ItineraryItem, NewUser, ReservationRequest, Trip,
    TripDraft, TripId, User, UserId, UserUpdate,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Password must be at least {0} characters long")]
    TooShort(usize),

    #[error("Password must contain at least one letter")]
    MissingLetter,

    #[error("Password must contain at least one digit")]
    MissingDigit,

    #[error("Password must not contain whitespace")]
    ContainsWhitespace,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    Required(&'static str),

    #[error("Email format is invalid")]
    InvalidEmail,

    #[error("Email is already registered")]
    EmailTaken,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("End date cannot be before start date")]
    EndBeforeStart,

    #[error("Start date cannot be in the past")]
    StartInPast,

    #[error("Check-out must be at least one night after check-in")]
    StayTooShort,

    #[error("At least one guest is required")]
    NoGuests,

    #[error("Dates overlap with trip '{title}'")]
    OverlapsTrip { trip_id: TripId, title: String },

    #[error("Times overlap with '{title}'")]
    OverlapsItineraryItem { item_id: ItineraryId, title: String },

    #[error("Dates must fall within the trip ({start} to {end})")]
    OutsideTrip { start: NaiveDate, end: NaiveDate },

    #[error("Item belongs to trip {expected}, not trip {actual}")]
    TripMismatch { expected: TripId, actual: TripId },
}

/// Failures collected per form field, so a screen can show every message at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, Vec<ValidationError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, error: ValidationError) {
        self.fields.entry(field).or_default().push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    pub fn field(&self, field: &str) -> &[ValidationError] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str, error: &ValidationError) -> bool {
        self.field(field).contains(error)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &[ValidationError])> {
        self.fields.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, errors) in &self.fields {
            for error in errors {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, error)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// Half-open overlap: [a_start, a_end) and [b_start, b_end) share an instant.
// Ranges that merely touch do not overlap.
pub fn ranges_overlap<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && b_start < a_end
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn require(value: &str, field: &'static str, errors: &mut ValidationErrors) {
    if is_blank(value) {
        errors.add(field, ValidationError::Required(field));
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::Required("email"));
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort(MIN_PASSWORD_LENGTH));
    }
    if password.chars().any(char::is_whitespace) {
        return Err(PasswordError::ContainsWhitespace);
    }
    // letters and digits are both judged by Unicode class
    if !password.chars().any(char::is_alphabetic) {
        return Err(PasswordError::MissingLetter);
    }
    if !password.chars().any(char::is_numeric) {
        return Err(PasswordError::MissingDigit);
    }
    Ok(())
}

fn email_in_use<'a>(
    email: &str,
    mut users: impl Iterator<Item = &'a User>,
) -> bool {
    let email = email.trim();
    users.any(|u| u.email.trim().eq_ignore_ascii_case(email))
}

fn check_email(
    email: &str,
    others: &[User],
    skip: Option<UserId>,
    errors: &mut ValidationErrors,
) {
    match validate_email(email) {
        Ok(()) => {
            let others = others.iter().filter(|u| Some(u.id) != skip);
            if email_in_use(email, others) {
                errors.add("email", ValidationError::EmailTaken);
            }
        }
        Err(e) => errors.add("email", e),
    }
}

pub fn validate_new_user(user: &NewUser, existing: &[User]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    require(&user.name, "name", &mut errors);
    check_email(&user.email, existing, None, &mut errors);

    if let Err(e) = validate_password(&user.password) {
        errors.add("password", e.into());
    }
    if user.password != user.confirm_password {
        errors.add("confirm_password", ValidationError::PasswordMismatch);
    }

    errors.into_result()
}

pub fn validate_user_update(
    user_id: UserId,
    update: &UserUpdate,
    existing: &[User],
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if let Some(name) = &update.name {
        require(name, "name", &mut errors);
    }
    if let Some(email) = &update.email {
        check_email(email, existing, Some(user_id), &mut errors);
    }
    if let Some(password) = &update.password {
        if let Err(e) = validate_password(password) {
            errors.add("password", e.into());
        }
    }

    errors.into_result()
}

/// Validates a trip create (`editing == None`) or update request.
///
/// A trip may not overlap any other trip of the same user. Trip dates are
/// whole days, so two trips sharing their boundary day do overlap. The
/// start-in-the-past rule only applies on creation so that trips already
/// under way stay editable.
pub fn validate_trip(
    draft: &TripDraft,
    existing: &[Trip],
    editing: Option<TripId>,
    today: NaiveDate,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    require(&draft.title, "title", &mut errors);
    require(&draft.destination, "destination", &mut errors);

    let dates = DateRange::new(draft.start_date, draft.end_date);
    if !dates.is_ordered() {
        errors.add("end_date", ValidationError::EndBeforeStart);
        return errors.into_result();
    }
    if editing.is_none() && draft.start_date < today {
        errors.add("start_date", ValidationError::StartInPast);
    }

    let clash = existing
        .iter()
        .filter(|t| t.user_id == draft.user_id && Some(t.id) != editing)
        .find(|t| t.dates().overlaps(&dates));
    if let Some(trip) = clash {
        errors.add(
            "start_date",
            ValidationError::OverlapsTrip {
                trip_id: trip.id,
                title: trip.title.clone(),
            },
        );
    }

    errors.into_result()
}

// Half-open span of a trip, from midnight of its first day to midnight after its last
fn trip_span(trip: &Trip) -> (NaiveDateTime, NaiveDateTime) {
    let start = trip.start_date.and_time(NaiveTime::MIN);
    let end = (trip.end_date + Duration::days(1)).and_time(NaiveTime::MIN);
    (start, end)
}

pub fn validate_itinerary_item(
    draft: &ItineraryDraft,
    trip: &Trip,
    siblings: &[ItineraryItem],
    editing: Option<ItineraryId>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if draft.trip_id != trip.id {
        errors.add(
            "trip_id",
            ValidationError::TripMismatch {
                expected: trip.id,
                actual: draft.trip_id,
            },
        );
        return errors.into_result();
    }

    require(&draft.title, "title", &mut errors);
    require(&draft.location, "location", &mut errors);

    if draft.ends_at <= draft.starts_at {
        errors.add("ends_at", ValidationError::EndBeforeStart);
        return errors.into_result();
    }

    let (trip_start, trip_end) = trip_span(trip);
    if draft.starts_at < trip_start || draft.ends_at > trip_end {
        errors.add(
            "starts_at",
            ValidationError::OutsideTrip {
                start: trip.start_date,
                end: trip.end_date,
            },
        );
    }

    let clash = siblings
        .iter()
        .filter(|i| i.trip_id == trip.id && Some(i.id) != editing)
        .find(|i| ranges_overlap(draft.starts_at, draft.ends_at, i.starts_at, i.ends_at));
    if let Some(item) = clash {
        errors.add(
            "starts_at",
            ValidationError::OverlapsItineraryItem {
                item_id: item.id,
                title: item.title.clone(),
            },
        );
    }

    errors.into_result()
}

pub fn validate_reservation(
    request: &ReservationRequest,
    trip: Option<&Trip>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    require(&request.hotel_id, "hotel_id", &mut errors);
    require(&request.room_id, "room_id", &mut errors);
    require(&request.guest_name, "guest_name", &mut errors);
    if let Err(e) = validate_email(&request.guest_email) {
        errors.add("guest_email", e);
    }
    if request.guests == 0 {
        errors.add("guests", ValidationError::NoGuests);
    }

    if request.check_out <= request.check_in {
        errors.add("check_out", ValidationError::StayTooShort);
        return errors.into_result();
    }

    if let Some(trip) = trip {
        if let Some(actual) = request.trip_id.filter(|id| *id != trip.id) {
            errors.add(
                "trip_id",
                ValidationError::TripMismatch {
                    expected: trip.id,
                    actual,
                },
            );
        }
        let stay = DateRange::new(request.check_in, request.check_out);
        if !trip.dates().contains_range(&stay) {
            errors.add(
                "check_in",
                ValidationError::OutsideTrip {
                    start: trip.start_date,
                    end: trip.end_date,
                },
            );
        }
    }

    errors.into_result()
}
