//! Delivery URLs derived from a provider asset identifier.

/// `{cdn}/{cloud}/video/upload/{asset_id}`
pub fn video_url(cdn_host: &str, cloud_name: &str, asset_id: &str) -> String {
    format!("{}/{}", upload_prefix(cdn_host, cloud_name), asset_id)
}

/// `{cdn}/{cloud}/video/upload/{asset_id}.jpg` — the provider renders a poster frame.
pub fn thumbnail_url(cdn_host: &str, cloud_name: &str, asset_id: &str) -> String {
    format!("{}/{}.jpg", upload_prefix(cdn_host, cloud_name), asset_id)
}

fn upload_prefix(cdn_host: &str, cloud_name: &str) -> String {
    format!("{}/{}/video/upload", cdn_host.trim_end_matches('/'), cloud_name)
}
