/// Turn a stored media reference into a fetchable URL.
///
/// Image and audio messages keep their storage handle in the `text` field.
/// Anything that already looks like a URL is passed through untouched;
/// a bare handle is served from the blob endpoint under `base_url`.
pub fn resolve_media_url(reference: &str, base_url: &str) -> String {
    if reference.starts_with("http") {
        reference.to_string()
    } else {
        format!("{}/blob/{}", base_url.trim_end_matches('/'), reference)
    }
}
