use chrono::Utc;
use upload_router::models::{ImageRecord, UploadImageResponse};
use uuid::Uuid;

#[test]
fn test_upload_response_from_record() {
    let record = ImageRecord {
        id: Uuid::new_v4(),
        key: "img/2026/10/a.webp".to_string(),
        url: "http://cdn/img/2026/10/a.webp".to_string(),
        content_type: "image/webp".to_string(),
        size_bytes: 2048,
        uploaded_by: Uuid::new_v4(),
        created_at: Utc::now(),
    };

    let response = UploadImageResponse::from(record.clone());

    assert_eq!(response.id, record.id);
    assert_eq!(response.key, record.key);
    assert_eq!(response.url, record.url);
    assert_eq!(response.content_type, "image/webp");
    assert_eq!(response.size, 2048);
}

#[test]
fn test_upload_response_json_shape() {
    let response = UploadImageResponse {
        id: Uuid::nil(),
        url: "u".to_string(),
        key: "k".to_string(),
        content_type: "image/png".to_string(),
        size: 1,
    };

    let json = serde_json::to_value(&response).unwrap();
    for field in ["id", "url", "key", "content_type", "size"] {
        assert!(json.get(field).is_some(), "missing `{}`", field);
    }
}
