//! Body extractor that reports rejections through the JSON error contract.

use axum::{
    Json,
    async_trait,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::app::errors::ApiError;

/// `Json<T>`, except a malformed or mistyped body becomes
/// `{"error": "invalid_body", "message": ..}` instead of plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(ApiError::InvalidBody)?;
        Ok(Self(value))
    }
}

