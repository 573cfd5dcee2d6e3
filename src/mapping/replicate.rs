use crate::mapping::{
    AspectRatio, MissingField, OutputFormat, RawOptions, UnifiedOptions, first_image, get_str,
    get_u32, get_u64, image_list, put, require_prompt,
};

/// Kontext's "let the input image decide" sentinel. Unified `None` on both sides.
pub const MATCH_INPUT_IMAGE: &str = "match_input_image";

pub fn minimax_to_raw(unified: &UnifiedOptions) -> Result<RawOptions, MissingField> {
    let mut raw = RawOptions::new();
    put(&mut raw, "prompt", Some(require_prompt(unified)?));
    put(&mut raw, "first_frame_image", first_image(unified));
    Ok(raw)
}

pub fn minimax_from_raw(raw: &RawOptions) -> UnifiedOptions {
    UnifiedOptions {
        prompt: get_str(raw, "prompt"),
        image_urls: image_list(raw, "first_frame_image"),
        ..Default::default()
    }
}

pub fn flux_schnell_to_raw(unified: &UnifiedOptions) -> Result<RawOptions, MissingField> {
    let mut raw = RawOptions::new();
    put(&mut raw, "prompt", Some(require_prompt(unified)?));
    put(&mut raw, "aspect_ratio", unified.aspect_ratio.map(|r| r.as_str()));
    put(&mut raw, "num_outputs", unified.num_outputs);
    put(&mut raw, "output_format", unified.output_format.map(|f| f.as_str()));
    put(&mut raw, "seed", unified.seed);
    Ok(raw)
}

pub fn flux_schnell_from_raw(raw: &RawOptions) -> UnifiedOptions {
    UnifiedOptions {
        prompt: get_str(raw, "prompt"),
        aspect_ratio: get_str(raw, "aspect_ratio").and_then(|s| AspectRatio::parse(&s)),
        num_outputs: get_u32(raw, "num_outputs"),
        output_format: get_str(raw, "output_format").and_then(|s| OutputFormat::parse(&s)),
        seed: get_u64(raw, "seed"),
        ..Default::default()
    }
}

/// Edit-style model: the first image input is mandatory.
pub fn flux_kontext_to_raw(unified: &UnifiedOptions) -> Result<RawOptions, MissingField> {
    let prompt = require_prompt(unified)?;
    let image = first_image(unified).ok_or(MissingField("image_urls"))?;

    let mut raw = RawOptions::new();
    put(&mut raw, "prompt", Some(prompt));
    put(&mut raw, "input_image", Some(image));
    let ratio = unified
        .aspect_ratio
        .map_or(MATCH_INPUT_IMAGE, |r| r.as_str());
    put(&mut raw, "aspect_ratio", Some(ratio));
    put(&mut raw, "output_format", unified.output_format.map(|f| f.as_str()));
    put(&mut raw, "seed", unified.seed);
    Ok(raw)
}

pub fn flux_kontext_from_raw(raw: &RawOptions) -> UnifiedOptions {
    UnifiedOptions {
        prompt: get_str(raw, "prompt"),
        image_urls: image_list(raw, "input_image"),
        aspect_ratio: get_str(raw, "aspect_ratio")
            .filter(|s| s != MATCH_INPUT_IMAGE)
            .and_then(|s| AspectRatio::parse(&s)),
        output_format: get_str(raw, "output_format").and_then(|s| OutputFormat::parse(&s)),
        seed: get_u64(raw, "seed"),
        ..Default::default()
    }
}

pub fn musicgen_to_raw(unified: &UnifiedOptions) -> Result<RawOptions, MissingField> {
    let mut raw = RawOptions::new();
    put(&mut raw, "prompt", Some(require_prompt(unified)?));
    put(&mut raw, "duration", unified.duration_secs);
    put(&mut raw, "output_format", unified.output_format.map(|f| f.as_str()));
    put(&mut raw, "seed", unified.seed);
    Ok(raw)
}

pub fn musicgen_from_raw(raw: &RawOptions) -> UnifiedOptions {
    UnifiedOptions {
        prompt: get_str(raw, "prompt"),
        duration_secs: get_u32(raw, "duration"),
        output_format: get_str(raw, "output_format").and_then(|s| OutputFormat::parse(&s)),
        seed: get_u64(raw, "seed"),
        ..Default::default()
    }
}
