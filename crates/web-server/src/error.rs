use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dispatcher::{DispatchError, ErrorCategory};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Dispatch(e) => e.category(),
            AppError::BadRequest(_) => ErrorCategory::BadRequest,
        }
    }
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::BadRequest => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let category = self.category();
        let message = match &self {
            AppError::Dispatch(DispatchError::MarketData(e)) => {
                tracing::error!(error = ?e, "Market data error.");
                "Failed to fetch market data".to_string()
            }
            AppError::Dispatch(DispatchError::Worker(e)) => {
                tracing::error!(error = ?e, "Worker pool error.");
                "The forecast worker failed".to_string()
            }
            other if category == ErrorCategory::Internal => {
                tracing::error!(error = ?other, "Request failed.");
                other.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": { "category": category, "message": message }
        }));
        (status_for(category), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_status_codes() {
        let cases = [
            (DispatchError::UnknownStrategy("foo".into()), StatusCode::BAD_REQUEST),
            (DispatchError::TickerNotFound("X".into()), StatusCode::NOT_FOUND),
            (DispatchError::DependencyUnavailable("tft".into()), StatusCode::NOT_IMPLEMENTED),
            (DispatchError::EmptyForecast, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).into_response().status(), status);
        }
    }
}
