pub mod api_key;
pub mod auth_service;
pub mod directory_sync;
