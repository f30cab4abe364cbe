use super::*;

#[test]
fn public_url_follows_storage_convention() {
    let store = SupabaseStorage::new("https://proj.supabase.co/", "key").unwrap();
    assert_eq!(
        store.public_url("images", "intro/intro_thumbnail.jpg").as_deref(),
        Some("https://proj.supabase.co/storage/v1/object/public/images/intro/intro_thumbnail.jpg")
    );
    assert_eq!(
        store.endpoint("bucket/videos"),
        "https://proj.supabase.co/storage/v1/bucket/videos"
    );
}

#[test]
fn upload_of_missing_file_is_a_storage_error() {
    let store = SupabaseStorage::new("http://127.0.0.1:9", "key").unwrap();
    let err = store
        .upload("videos", "a/a_1.mp4", Path::new("/nonexistent/a_1.mp4"), "video/mp4")
        .unwrap_err();
    assert_eq!(err.stage(), "storage");
}

#[test]
fn existence_check_surfaces_transport_failures() {
    let store = SupabaseStorage::new("http://127.0.0.1:9", "key").unwrap();
    let err = store.exists("images", "intro/intro_thumbnail.jpg").unwrap_err();
    assert_eq!(err.stage(), "storage");
}
