use crate::mapping::{
    AspectRatio, MissingField, RawOptions, UnifiedOptions, first_image, get_str, get_u32,
    get_u64, image_list, put,
};

pub const GEN4_TURBO: &str = "gen4_turbo";

/// Runway expresses ratios as output pixel dimensions.
const RATIOS: &[(AspectRatio, &str)] = &[
    (AspectRatio::Landscape16x9, "1280:720"),
    (AspectRatio::Portrait9x16, "720:1280"),
    (AspectRatio::Landscape4x3, "1104:832"),
    (AspectRatio::Portrait3x4, "832:1104"),
    (AspectRatio::Square, "960:960"),
    (AspectRatio::Cinema21x9, "1584:672"),
];

pub fn ratio_to_pixels(ratio: AspectRatio) -> Option<&'static str> {
    RATIOS.iter().find(|(r, _)| *r == ratio).map(|(_, px)| *px)
}

pub fn ratio_from_pixels(pixels: &str) -> Option<AspectRatio> {
    RATIOS.iter().find(|(_, px)| *px == pixels).map(|(r, _)| *r)
}

/// Image-to-video: the first image input is mandatory, the prompt is not.
/// Ratios Runway has no size for pass through as `w:h` and fail validation.
pub fn gen4_turbo_to_raw(unified: &UnifiedOptions) -> Result<RawOptions, MissingField> {
    let image = first_image(unified).ok_or(MissingField("image_urls"))?;

    let mut raw = RawOptions::new();
    put(&mut raw, "model", Some(GEN4_TURBO));
    put(&mut raw, "promptImage", Some(image));
    put(
        &mut raw,
        "promptText",
        unified.prompt.as_deref().filter(|p| !p.trim().is_empty()),
    );
    put(
        &mut raw,
        "ratio",
        unified
            .aspect_ratio
            .map(|r| ratio_to_pixels(r).unwrap_or(r.as_str())),
    );
    put(&mut raw, "duration", unified.duration_secs);
    put(&mut raw, "seed", unified.seed);
    Ok(raw)
}

pub fn gen4_turbo_from_raw(raw: &RawOptions) -> UnifiedOptions {
    UnifiedOptions {
        prompt: get_str(raw, "promptText"),
        image_urls: image_list(raw, "promptImage"),
        aspect_ratio: get_str(raw, "ratio").and_then(|px| ratio_from_pixels(&px)),
        duration_secs: get_u32(raw, "duration"),
        seed: get_u64(raw, "seed"),
        ..Default::default()
    }
}
