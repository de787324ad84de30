use application::{ApplicationError, MediaError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_body(self) -> ErrorBody {
        self.body
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        let message = error.to_string();
        match error {
            DomainError::InvalidIdentity { .. } => {
                ApiError::bad_request("INVALID_IDENTITY", message)
            }
            DomainError::MissingField { .. } => ApiError::bad_request("MISSING_FIELD", message),
            DomainError::EmptyMessage => ApiError::bad_request("EMPTY_MESSAGE", message),
            DomainError::InvalidRating { .. } => ApiError::bad_request("INVALID_RATING", message),
            DomainError::NotFound { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            DomainError::Unauthorized { .. } => {
                ApiError::new(StatusCode::FORBIDDEN, "UNAUTHORIZED", message)
            }
            DomainError::MediaRejected { .. } => ApiError::bad_request("MEDIA_REJECTED", message),
            DomainError::InvalidArgument { .. } => {
                ApiError::bad_request("INVALID_ARGUMENT", message)
            }
            DomainError::SessionClosed => ApiError::bad_request("SESSION_CLOSED", message),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(error: MediaError) -> Self {
        let message = error.to_string();
        match error {
            MediaError::UnsupportedType { .. } => ApiError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                message,
            ),
            MediaError::TooLarge { .. } => {
                ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "MEDIA_TOO_LARGE", message)
            }
            MediaError::Empty => ApiError::bad_request("EMPTY_MEDIA", message),
            MediaError::UnknownReference { .. } | MediaError::AlreadyClaimed { .. } => {
                ApiError::bad_request("MEDIA_REJECTED", message)
            }
            MediaError::Unavailable(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "MEDIA_UNAVAILABLE",
                message,
            ),
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(err) => err.into(),
            ApplicationError::Media(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let cases = [
            (DomainError::invalid_identity("bob"), StatusCode::BAD_REQUEST),
            (DomainError::missing_field("title"), StatusCode::BAD_REQUEST),
            (DomainError::EmptyMessage, StatusCode::BAD_REQUEST),
            (
                DomainError::InvalidRating { value: 9 },
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::not_found("listing", "x"),
                StatusCode::NOT_FOUND,
            ),
            (
                DomainError::unauthorized("remove listing"),
                StatusCode::FORBIDDEN,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn media_errors_use_dedicated_statuses() {
        let too_large = ApiError::from(ApplicationError::Media(MediaError::TooLarge {
            size: 11,
            max: 10,
        }));
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let unsupported = ApiError::from(ApplicationError::Media(MediaError::UnsupportedType {
            content_type: "application/x-sh".into(),
        }));
        assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(unsupported.into_body().code, "UNSUPPORTED_MEDIA_TYPE");
    }

    #[test]
    fn media_claim_errors_are_client_errors() {
        for error in [
            MediaError::UnknownReference {
                handle: "missing".into(),
            },
            MediaError::AlreadyClaimed {
                handle: "taken".into(),
            },
        ] {
            let api = ApiError::from(ApplicationError::Media(error));
            assert_eq!(api.status(), StatusCode::BAD_REQUEST);
            assert_eq!(api.into_body().code, "MEDIA_REJECTED");
        }
    }
}
