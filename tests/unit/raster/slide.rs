use super::*;

fn slide(title: &str, points: &[&str]) -> Slide {
    Slide {
        index: 0,
        title: title.to_string(),
        bullet_points: points.iter().map(|p| p.to_string()).collect(),
        narration_hint: None,
    }
}

fn empty_font_rasterizer() -> Rasterizer {
    Rasterizer::with_fontdb(Arc::new(usvg::fontdb::Database::new()), Some(2)).unwrap()
}

#[test]
fn composed_svg_is_well_formed_with_hostile_text() {
    let s = slide(
        "Tags like <b> & \"quotes\"",
        &["x < y && y > z", "it's 'quoted'", "</text><script>"],
    );
    let svg = compose_slide_svg(&s, 2, 5);
    let doc = roxmltree::Document::parse(&svg).unwrap();

    let texts: Vec<String> = doc
        .descendants()
        .filter(|n| n.has_tag_name("text") || n.has_tag_name("tspan"))
        .filter_map(|n| n.text().map(str::to_string))
        .collect();
    assert!(texts.iter().any(|t| t == "Tags like <b> & \"quotes\""));
    assert!(texts.iter().any(|t| t == "\u{2022} x < y && y > z"));
    assert!(texts.iter().any(|t| t == "\u{2022} </text><script>"));
    assert!(texts.iter().any(|t| t == "2 / 5"));
}

#[test]
fn body_lines_stack_with_fixed_pitch() {
    let s = slide("T", &["first", "second"]);
    let svg = compose_slide_svg(&s, 1, 1);
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let ys: Vec<u32> = doc
        .descendants()
        .filter(|n| n.has_tag_name("tspan"))
        .map(|n| n.attribute("y").unwrap().parse().unwrap())
        .collect();
    assert_eq!(ys, vec![BODY_TOP_Y, BODY_TOP_Y + LINE_PITCH + BULLET_GAP]);
}

#[test]
fn continuation_lines_keep_their_indent() {
    let long = "word ".repeat(30);
    let svg = compose_slide_svg(&slide("T", &[long.trim()]), 1, 1);
    let doc = roxmltree::Document::parse(&svg).unwrap();

    let body = doc
        .descendants()
        .find(|n| n.has_tag_name("text") && n.children().any(|c| c.has_tag_name("tspan")))
        .unwrap();
    assert_eq!(
        body.attribute(("http://www.w3.org/XML/1998/namespace", "space")),
        Some("preserve")
    );

    let lines: Vec<&str> = body
        .children()
        .filter(|c| c.has_tag_name("tspan"))
        .filter_map(|c| c.text())
        .collect();
    assert!(lines.len() >= 2, "{lines:?}");
    assert!(lines[0].starts_with('\u{2022}'));
    assert!(lines[1].starts_with("  ") && !lines[1].starts_with("   "), "{:?}", lines[1]);
}

#[test]
fn overflowing_body_is_clipped_above_footer() {
    let many: Vec<String> = (0..40).map(|i| format!("point {i}")).collect();
    let refs: Vec<&str> = many.iter().map(String::as_str).collect();
    let svg = compose_slide_svg(&slide("T", &refs), 1, 1);
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let max_y = doc
        .descendants()
        .filter(|n| n.has_tag_name("tspan"))
        .map(|n| n.attribute("y").unwrap().parse::<u32>().unwrap())
        .max()
        .unwrap();
    assert!(max_y <= BODY_BOTTOM_Y);
}

#[test]
fn blank_title_falls_back_to_slide_number() {
    let svg = compose_slide_svg(&slide("   ", &[]), 3, 4);
    assert!(svg.contains(">Slide 3</text>"));
}

#[test]
fn render_slide_writes_full_size_png() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("one.png");
    let r = empty_font_rasterizer();

    let frame = r.render_slide(&slide("Hello", &["world"]), 1, 1, &out).unwrap();
    assert_eq!(frame.slide_number, 1);
    assert_eq!(image::image_dimensions(&out).unwrap(), (CANVAS_WIDTH, CANVAS_HEIGHT));

    // Background gradient starts at #6366f1 in the top-left corner.
    let img = image::open(&out).unwrap().to_rgba8();
    let px = img.get_pixel(0, 0).0;
    assert_eq!(px[3], 255);
    assert!(px[2] > px[1]);
}

#[test]
fn render_all_names_frames_by_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let layout = OutputLayout::new(dir.path());
    layout.ensure_dirs().unwrap();
    let id = ArtifactId::new("lesson", 7).unwrap();

    let slides = vec![slide("a", &["1"]), slide("b", &["2"]), slide("c", &["3"])];
    let frames = empty_font_rasterizer()
        .render_all(&slides, &layout, &id)
        .unwrap();

    assert_eq!(frames.len(), 3);
    for (i, f) in frames.iter().enumerate() {
        assert_eq!(f.slide_number, i + 1);
        assert_eq!(f.path, layout.frame_path(&id, i + 1));
        assert!(f.path.is_file());
    }
}

#[test]
fn render_failure_reports_slide_number() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("missing-dir").join("x.png");
    let err = empty_font_rasterizer()
        .render_slide(&slide("a", &[]), 4, 4, &out)
        .unwrap_err();
    assert!(matches!(
        err,
        SlidecastError::Rasterization { slide_index: 4, .. }
    ));
}

#[test]
fn zero_threads_is_rejected() {
    assert!(Rasterizer::with_fontdb(Arc::new(usvg::fontdb::Database::new()), Some(0)).is_err());
}

#[test]
fn demultiply_restores_straight_alpha() {
    let mut px = vec![64u8, 0, 0, 128, 10, 20, 30, 255, 0, 0, 0, 0];
    demultiply_rgba8_in_place(&mut px);
    assert_eq!(&px[0..4], &[128, 0, 0, 128]);
    assert_eq!(&px[4..8], &[10, 20, 30, 255]);
    assert_eq!(&px[8..12], &[0, 0, 0, 0]);
}
