pub mod auth_service;
pub mod chunked_uploader;
pub mod media_urls;
pub mod signature_service;
pub mod video_service;
