pub mod error;

use serde::Serialize;
use utoipa::ToSchema;

// Body returned by endpoints that have nothing else to say
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Customer deleted successfully")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
