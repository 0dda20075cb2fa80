//! Client side of the upload pipeline: talks to the TechTube server and to
//! the storage provider.

pub mod api_client;
pub mod cloudinary;
pub mod upload_command;
