use axum::{
    extract::{FromRequest, Request},
    Json,
};

use crate::errors::ApiError;

/// JSON extractor that rejects malformed bodies with the shared error
/// envelope instead of axum's plain-text response.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                tracing::warn!("Failed to parse JSON request body: {}", rejection);
                Err(ApiError::invalid_input(format!(
                    "Failed to parse JSON request body: {}",
                    rejection
                )))
            }
        }
    }
}
