use super::*;

#[test]
fn accepts_upstream_field_aliases() {
    let json = r#"{
        "id": "photosynthesis",
        "slides": [
            { "title": "Light", "key_points": ["Chlorophyll absorbs light"], "narration_script": "Hi" },
            { "index": 2, "title": "", "bullet_points": [] }
        ],
        "script": "Plants make food.",
        "target_duration_seconds": 45
    }"#;
    let pkg = LessonPackage::from_json_str(json).unwrap();
    assert_eq!(pkg.slides.len(), 2);
    assert_eq!(pkg.slides[0].bullet_points, vec!["Chlorophyll absorbs light"]);
    assert_eq!(pkg.slides[0].narration_hint.as_deref(), Some("Hi"));
    assert_eq!(pkg.full_narration_text, "Plants make food.");
    assert_eq!(pkg.slides[1].display_title(2), "Slide 2");
    assert_eq!(pkg.slides[0].display_title(1), "Light");
}

#[test]
fn rejects_empty_slides_and_zero_duration() {
    let empty = r#"{"id":"a","slides":[],"target_duration_seconds":30}"#;
    assert!(matches!(
        LessonPackage::from_json_str(empty),
        Err(SlidecastError::Validation(_))
    ));

    let zero = r#"{"id":"a","slides":[{"title":"t"}],"target_duration_seconds":0}"#;
    assert!(LessonPackage::from_json_str(zero).is_err());

    let bad_id = r#"{"id":"../a","slides":[{"title":"t"}],"target_duration_seconds":3}"#;
    assert!(LessonPackage::from_json_str(bad_id).is_err());

    assert!(LessonPackage::from_json_str("{").is_err());
}

#[test]
fn location_serializes_with_kind_tag() {
    let loc = ArtifactLocation::Remote {
        url: "https://cdn/x.mp4".to_string(),
        object: StoredObjectRef {
            bucket: "videos".to_string(),
            key: "a/x.mp4".to_string(),
            content_type: "video/mp4".to_string(),
        },
    };
    let v = serde_json::to_value(&loc).unwrap();
    assert_eq!(v["kind"], "remote");
    assert_eq!(v["object"]["bucket"], "videos");
    assert_eq!(loc.href(), "https://cdn/x.mp4");
}
