pub mod validate_api;
