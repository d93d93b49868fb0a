use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use dropvault_infra::ErrorResponse;

use crate::constants::OWNER_HEADER;

const MAX_OWNER_ID_LENGTH: usize = 255;

/// Owner of the request, as asserted by the upstream auth layer.
///
/// The value is opaque: it is stored with each upload and compared on listing,
/// nothing more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerContext {
    pub owner_id: String,
}

fn missing_owner(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
            code: "MISSING_OWNER".to_string(),
            recoverable: false,
            suggested_action: Some(format!("Send the {} header", OWNER_HEADER)),
            details: None,
        }),
    )
}

// Read from request parts so it works alongside Multipart
impl<S> FromRequestParts<S> for OwnerContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| missing_owner("Missing owner identity"))?;

        let owner_id = value
            .to_str()
            .map_err(|_| missing_owner("Owner identity must be printable ASCII"))?
            .trim();

        if owner_id.is_empty() || owner_id.len() > MAX_OWNER_ID_LENGTH {
            return Err(missing_owner("Owner identity must be 1 to 255 characters"));
        }

        Ok(OwnerContext {
            owner_id: owner_id.to_string(),
        })
    }
}
