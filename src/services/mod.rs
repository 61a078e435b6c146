pub mod auth_service;
pub mod presenter_service;
pub mod quota_service;
pub mod search_service;
pub mod session_service;
