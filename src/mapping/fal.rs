use crate::mapping::{
    AspectRatio, MissingField, RawOptions, UnifiedOptions, get_str, put, require_prompt,
};

// Fal's Kling endpoints take duration as a string enum ("5" | "10").
pub fn kling_to_raw(unified: &UnifiedOptions) -> Result<RawOptions, MissingField> {
    let mut raw = RawOptions::new();
    put(&mut raw, "prompt", Some(require_prompt(unified)?));
    put(&mut raw, "negative_prompt", unified.negative_prompt.as_deref());
    put(&mut raw, "duration", unified.duration_secs.map(|d| d.to_string()));
    put(&mut raw, "aspect_ratio", unified.aspect_ratio.map(|r| r.as_str()));
    Ok(raw)
}

pub fn kling_from_raw(raw: &RawOptions) -> UnifiedOptions {
    UnifiedOptions {
        prompt: get_str(raw, "prompt"),
        negative_prompt: get_str(raw, "negative_prompt"),
        duration_secs: get_str(raw, "duration").and_then(|d| d.parse().ok()),
        aspect_ratio: get_str(raw, "aspect_ratio").and_then(|s| AspectRatio::parse(&s)),
        ..Default::default()
    }
}
