pub mod api_types;
pub mod client;
pub mod error;
pub mod types;

pub use api_types::{CharacterDto, PageResponse};
pub use client::{CatalogApi, CatalogClient};
pub use error::ApiError;
pub use types::{Character, CharacterStatus};
