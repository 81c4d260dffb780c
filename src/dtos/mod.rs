pub mod auth;

use axum::Json;
use serde::Serialize;

/// Success envelope. Errors render through `AppError` with the matching
/// `success: false` shape.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}
