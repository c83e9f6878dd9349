// Tri-state outcome of a remote call as seen by the UI layer

use crate::booking_client::ApiError;
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;

pub const HTTP_FALLBACK_MESSAGE: &str = "An unexpected error occurred";
pub const IO_MESSAGE: &str = "Couldn't reach server. Check your internet connection.";

#[derive(Debug, Clone, PartialEq)]
pub enum Resource<T> {
    Success(T),
    // `data` carries a stale value the screen may keep showing
    Error { message: String, data: Option<T> },
    Loading(Option<T>),
}

impl<T> Resource<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Resource::Error {
            message: message.into(),
            data: None,
        }
    }

    pub fn loading() -> Self {
        Resource::Loading(None)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Resource::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Resource::Error { .. })
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Resource::Success(data) => Some(data),
            Resource::Error { data, .. } | Resource::Loading(data) => data.as_ref(),
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Resource::Success(data) => Some(data),
            Resource::Error { data, .. } | Resource::Loading(data) => data,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Resource::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resource<U> {
        match self {
            Resource::Success(data) => Resource::Success(f(data)),
            Resource::Error { message, data } => Resource::Error {
                message,
                data: data.map(f),
            },
            Resource::Loading(data) => Resource::Loading(data.map(f)),
        }
    }

    // Attach a previously shown value to an error or loading state
    pub fn with_stale(self, stale: Option<T>) -> Self {
        match self {
            Resource::Error { message, data } => Resource::Error {
                message,
                data: data.or(stale),
            },
            Resource::Loading(data) => Resource::Loading(data.or(stale)),
            success => success,
        }
    }
}

impl<T> From<Result<T, ApiError>> for Resource<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => Resource::Success(data),
            Err(e) => Resource::error(e.user_message()),
        }
    }
}

/// Emits `Loading` straight away, then whatever the call resolves to.
pub fn with_loading<T, F>(call: F) -> impl Stream<Item = Resource<T>>
where
    F: Future<Output = Resource<T>>,
{
    stream::once(async { Resource::Loading(None) }).chain(stream::once(call))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_messages() {
        let http: Resource<u32> = Err(ApiError::Http {
            status: 500,
            message: None,
        })
        .into();
        assert_eq!(http.error_message(), Some(HTTP_FALLBACK_MESSAGE));

        let http_with_body: Resource<u32> = Err(ApiError::Http {
            status: 409,
            message: Some("Room no longer available".to_string()),
        })
        .into();
        assert_eq!(
            http_with_body.error_message(),
            Some("Room no longer available")
        );

        let io: Resource<u32> = Err(ApiError::Io("connection refused".to_string())).into();
        assert_eq!(io.error_message(), Some(IO_MESSAGE));

        let unknown: Resource<u32> = Err(ApiError::Unknown("bad json".to_string())).into();
        assert_eq!(unknown.error_message(), Some("Unknown error: bad json"));
    }

    #[test]
    fn test_map_keeps_state() {
        let r: Resource<u32> = Resource::Error {
            message: "x".to_string(),
            data: Some(2),
        };
        assert_eq!(
            r.map(|n| n * 10),
            Resource::Error {
                message: "x".to_string(),
                data: Some(20)
            }
        );
        assert_eq!(Resource::Success(1).map(|n: u32| n + 1), Resource::Success(2));
    }

    #[test]
    fn test_with_stale() {
        let r: Resource<&str> = Resource::error("offline").with_stale(Some("cached"));
        assert_eq!(r.data(), Some(&"cached"));
        assert!(r.is_error());

        let s = Resource::Success("fresh").with_stale(Some("cached"));
        assert_eq!(s.into_data(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_with_loading_emits_loading_first() {
        let states: Vec<Resource<u32>> =
            with_loading(async { Resource::Success(7) }).collect().await;
        assert_eq!(states, vec![Resource::Loading(None), Resource::Success(7)]);
    }
}
