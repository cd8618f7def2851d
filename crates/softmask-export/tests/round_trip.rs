//! Integration test: prompt parsing -> stub engine -> pipeline -> JSON
//! response -> decoded PNGs.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use softmask_export::{ResponseDocument, ResponseOptions, decode_png_data_uri, parse_prompts};
use softmask_pipeline::{
    BinaryMask, PipelineConfig, PipelineError, PointLabel, PointPrompt, Proposal, RgbaImage,
    segment,
};

/// Proposes discs of three sizes around the first foreground click,
/// scored so that the middle one wins.
fn disc_engine(image: &RgbaImage, prompts: &[PointPrompt]) -> Result<Vec<Proposal>, PipelineError> {
    let click = prompts
        .iter()
        .find(|p| p.label == PointLabel::Foreground)
        .ok_or_else(|| PipelineError::Proposal("no foreground click".into()))?;
    let (w, h) = image.dimensions();
    let disc = |r: u32| {
        BinaryMask::from_fn(w, h, |x, y| {
            let dx = x.abs_diff(click.x);
            let dy = y.abs_diff(click.y);
            dx * dx + dy * dy <= r * r
        })
    };
    Ok(vec![
        Proposal::new(disc(6), 0.55),
        Proposal::new(disc(12), 0.91),
        Proposal::new(disc(18), 0.74),
    ])
}

fn scene() -> RgbaImage {
    RgbaImage::from_fn(64, 48, |x, y| {
        #[allow(clippy::cast_possible_truncation)]
        image::Rgba([(x * 4) as u8, (y * 5) as u8, 90, 255])
    })
}

#[test]
fn clicks_to_response_document() {
    let prompts = parse_prompts(
        r#"[{"x": 32.4, "y": 24}, {"x": 2, "y": 2}]"#,
        "[1, 0]",
    )
    .unwrap();
    let image = scene();
    let results = segment(&disc_engine, &image, &prompts, &PipelineConfig::default()).unwrap();

    let doc = ResponseDocument::from_results(&results, ResponseOptions::default()).unwrap();
    let json = doc.to_json().unwrap();
    eprintln!("response document: {} bytes", json.len());

    let parsed = ResponseDocument::from_json(&json).unwrap();
    let scores: Vec<f32> = parsed.results.iter().map(|e| e.score).collect();
    assert_eq!(scores, vec![0.91, 0.74, 0.55]);

    for (entry, result) in parsed.results.iter().zip(&results) {
        let mask = image::load_from_memory(&entry.mask).unwrap().to_luma8();
        assert_eq!(mask, result.alpha_mask);

        let preview = image::load_from_memory(&entry.masked_image).unwrap().to_rgba8();
        let bounds = entry.bounds.expect("discs are cropped");
        assert_eq!(preview.dimensions(), (bounds.width(), bounds.height()));
        // The click lies deep inside every disc.
        let centre = preview.get_pixel(32 - bounds.x_min, 24 - bounds.y_min);
        assert_eq!(centre.0[..3], image.get_pixel(32, 24).0[..3]);
        assert!(centre.0[3] > 200);
    }
}

#[test]
fn data_uris_decode_to_png() {
    let prompts = [PointPrompt::new(20, 20, PointLabel::Foreground)];
    let results = segment(&disc_engine, &scene(), &prompts, &PipelineConfig::default()).unwrap();
    let doc = ResponseDocument::from_results(&results, ResponseOptions::default()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

    let uri = json["results"][0]["mask"].as_str().unwrap();
    let png = decode_png_data_uri(uri).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    assert_eq!(png, results[0].alpha_mask_png);
}

#[test]
fn engine_failures_surface_unchanged() {
    let prompts = [PointPrompt::new(5, 5, PointLabel::Background)];
    let err = segment(&disc_engine, &scene(), &prompts, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Proposal(ref msg) if msg == "no foreground click"));
}
