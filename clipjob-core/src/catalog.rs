//! Model catalog
//!
//! Static, immutable lookup data for the video models this tool knows about:
//! alias to provider reference, display names, supported operations and the
//! fixed per-model input parameters. Anything not listed here is passed
//! through to the provider untouched.

use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::job::{InputParams, JobSpec, SpecError};

/// Operation name recorded for text-to-video jobs
pub const TEXT_TO_VIDEO: &str = "text_to_video";
/// Operation name recorded for image-to-video jobs
pub const IMAGE_TO_VIDEO: &str = "image_to_video";

/// Default model for text-to-video requests
pub const DEFAULT_TEXT_MODEL: &str = "wan-t2v-fast";
/// Default model for image-to-video requests
pub const DEFAULT_IMAGE_MODEL: &str = "wan-i2v-fast";

/// Operations a model supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    TextToVideo,
    ImageToVideo,
    Both,
}

impl ModelKind {
    pub fn text_to_video(self) -> bool {
        matches!(self, ModelKind::TextToVideo | ModelKind::Both)
    }

    pub fn image_to_video(self) -> bool {
        matches!(self, ModelKind::ImageToVideo | ModelKind::Both)
    }
}

/// Catalog entry for one model
#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec {
    pub alias: &'static str,
    pub id: &'static str,
    pub name: &'static str,
    pub kind: ModelKind,
    pub default_resolution: &'static str,
    /// Maximum duration in seconds, 0 when the model is frame-driven
    pub max_duration: u32,
    pub features: &'static [&'static str],
}

pub static MODELS: &[ModelSpec] = &[
    ModelSpec {
        alias: "wan-t2v-fast",
        id: "wan-video/wan-2.2-t2v-fast",
        name: "Wan 2.2 Fast Text-to-Video",
        kind: ModelKind::TextToVideo,
        default_resolution: "480p",
        max_duration: 0,
        features: &["fast", "affordable", "go_fast"],
    },
    ModelSpec {
        alias: "wan-i2v-fast",
        id: "wan-video/wan-2.2-i2v-fast",
        name: "Wan 2.2 Fast Image-to-Video",
        kind: ModelKind::ImageToVideo,
        default_resolution: "480p",
        max_duration: 0,
        features: &["fast", "affordable", "go_fast"],
    },
    ModelSpec {
        alias: "veo3",
        id: "google/veo-3",
        name: "Google Veo 3",
        kind: ModelKind::Both,
        default_resolution: "720p",
        max_duration: 0,
        features: &["premium", "audio", "style_preservation", "negative_prompt"],
    },
    ModelSpec {
        alias: "kling-master",
        id: "kwaivgi/kling-v2.1-master",
        name: "Kling 2.1 Master",
        kind: ModelKind::Both,
        default_resolution: "1080p",
        max_duration: 10,
        features: &["high_quality", "duration_control", "negative_prompt"],
    },
];

/// Aliases without a full catalog entry
static EXTRA_ALIASES: &[(&str, &str)] = &[
    ("wan-i2v-full", "wan-video/wan-2.2-i2v-a14b"),
    ("kling", "kwaivgi/kling-v2.1"),
];

/// Looks up a catalog entry by alias
pub fn find(alias: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|model| model.alias == alias)
}

/// Resolves an alias to the provider model reference
///
/// Unknown names are assumed to already be provider references.
pub fn provider_id(model: &str) -> &str {
    if let Some(spec) = find(model) {
        return spec.id;
    }
    EXTRA_ALIASES
        .iter()
        .find(|(alias, _)| *alias == model)
        .map(|(_, id)| *id)
        .unwrap_or(model)
}

/// Front-end request for a generated video
#[derive(Debug, Clone, Default)]
pub struct VideoRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub resolution: Option<String>,
    pub aspect_ratio: Option<String>,
    pub negative_prompt: Option<String>,
    pub duration: Option<u32>,
    pub filename: Option<String>,
}

impl VideoRequest {
    fn checked_prompt(&self) -> Result<&str, SpecError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(SpecError::MissingParameter("prompt".to_string()));
        }
        Ok(prompt)
    }
}

fn lookup(
    model: &str,
    operation: &str,
    supported: fn(ModelKind) -> bool,
) -> Result<&'static ModelSpec, SpecError> {
    let spec = find(model).ok_or_else(|| SpecError::UnknownModel(model.to_string()))?;
    if !supported(spec.kind) {
        return Err(SpecError::UnsupportedOperation {
            model: model.to_string(),
            operation: operation.replace('_', "-"),
        });
    }
    Ok(spec)
}

fn base_input(request: &VideoRequest, prompt: &str, spec: &ModelSpec) -> InputParams {
    let mut input = InputParams::new();
    input.insert("prompt".into(), json!(prompt));
    let resolution = request
        .resolution
        .as_deref()
        .filter(|r| !r.is_empty())
        .unwrap_or(spec.default_resolution);
    input.insert("resolution".into(), json!(resolution));
    input
}

fn insert_negative_prompt(input: &mut InputParams, request: &VideoRequest) {
    if let Some(negative) = request.negative_prompt.as_deref().filter(|n| !n.is_empty()) {
        input.insert("negative_prompt".into(), json!(negative));
    }
}

fn kling_duration(request: &VideoRequest) -> Value {
    json!(request.duration.filter(|d| *d > 0).unwrap_or(5))
}

/// Shapes a text-to-video request into a provider job spec
pub fn shape_text_to_video(request: &VideoRequest) -> Result<JobSpec, SpecError> {
    let prompt = request.checked_prompt()?;
    let model = request.model.as_deref().unwrap_or(DEFAULT_TEXT_MODEL);
    let spec = lookup(model, TEXT_TO_VIDEO, ModelKind::text_to_video)?;

    let mut input = base_input(request, prompt, spec);
    if let Some(aspect) = request.aspect_ratio.as_deref().filter(|a| !a.is_empty()) {
        input.insert("aspect_ratio".into(), json!(aspect));
    }

    match spec.alias {
        "wan-t2v-fast" => {
            input.insert("go_fast".into(), json!(true));
            input.insert("num_frames".into(), json!(81));
            input.insert("frames_per_second".into(), json!(16));
            input.insert("sample_shift".into(), json!(12));
            input.insert("optimize_prompt".into(), json!(false));
        }
        "veo3" => insert_negative_prompt(&mut input, request),
        "kling-master" => {
            input.insert("duration".into(), kling_duration(request));
            insert_negative_prompt(&mut input, request);
        }
        _ => {}
    }

    Ok(JobSpec::new(spec.alias, input)
        .with_operation(TEXT_TO_VIDEO)
        .with_filename(request.filename.clone()))
}

/// Shapes an image-to-video request into a provider job spec
///
/// `image_data_url` is the already-encoded `data:` URL of the source image.
pub fn shape_image_to_video(
    request: &VideoRequest,
    image_data_url: &str,
) -> Result<JobSpec, SpecError> {
    let prompt = request.checked_prompt()?;
    let model = request.model.as_deref().unwrap_or(DEFAULT_IMAGE_MODEL);
    let spec = lookup(model, IMAGE_TO_VIDEO, ModelKind::image_to_video)?;

    let mut input = base_input(request, prompt, spec);

    match spec.alias {
        "wan-i2v-fast" => {
            input.insert("image".into(), json!(image_data_url));
            input.insert("go_fast".into(), json!(true));
            input.insert("num_frames".into(), json!(81));
            input.insert("frames_per_second".into(), json!(16));
            input.insert("sample_shift".into(), json!(12));
            input.insert("disable_safety_checker".into(), json!(false));
        }
        "kling-master" => {
            input.insert("start_image".into(), json!(image_data_url));
            input.insert("duration".into(), kling_duration(request));
            insert_negative_prompt(&mut input, request);
        }
        "veo3" => {
            input.insert("image".into(), json!(image_data_url));
            insert_negative_prompt(&mut input, request);
        }
        _ => {
            input.insert("image".into(), json!(image_data_url));
        }
    }

    Ok(JobSpec::new(spec.alias, input)
        .with_operation(IMAGE_TO_VIDEO)
        .with_filename(request.filename.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: &str) -> VideoRequest {
        VideoRequest {
            prompt: "A car driving on a beach".into(),
            model: Some(model.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_id_resolves_aliases() {
        assert_eq!(provider_id("veo3"), "google/veo-3");
        assert_eq!(provider_id("kling"), "kwaivgi/kling-v2.1");
        assert_eq!(provider_id("owner/custom:abc"), "owner/custom:abc");
    }

    #[test]
    fn test_wan_text_defaults() {
        let spec = shape_text_to_video(&request("wan-t2v-fast")).unwrap();
        assert_eq!(spec.model, "wan-t2v-fast");
        assert_eq!(spec.operation.as_deref(), Some(TEXT_TO_VIDEO));
        assert_eq!(spec.input["resolution"], json!("480p"));
        assert_eq!(spec.input["num_frames"], json!(81));
        assert_eq!(spec.input["go_fast"], json!(true));
    }

    #[test]
    fn test_kling_duration_and_negative_prompt() {
        let mut req = request("kling-master");
        req.negative_prompt = Some("blur".into());
        let spec = shape_text_to_video(&req).unwrap();
        assert_eq!(spec.input["duration"], json!(5));
        assert_eq!(spec.input["negative_prompt"], json!("blur"));

        req.duration = Some(10);
        let spec = shape_text_to_video(&req).unwrap();
        assert_eq!(spec.input["duration"], json!(10));
    }

    #[test]
    fn test_kling_image_uses_start_image() {
        let spec =
            shape_image_to_video(&request("kling-master"), "data:image/png;base64,AA").unwrap();
        assert!(spec.input.get("image").is_none());
        assert_eq!(spec.input["start_image"], json!("data:image/png;base64,AA"));
    }

    #[test]
    fn test_operation_support_is_checked() {
        let err = shape_text_to_video(&request("wan-i2v-fast")).unwrap_err();
        assert!(matches!(err, SpecError::UnsupportedOperation { .. }));

        let err = shape_image_to_video(&request("wan-t2v-fast"), "data:").unwrap_err();
        assert!(matches!(err, SpecError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_empty_prompt_is_rejected() {
        let mut req = request("veo3");
        req.prompt = "   ".into();
        assert_eq!(
            shape_text_to_video(&req).unwrap_err(),
            SpecError::MissingParameter("prompt".into())
        );
    }

    #[test]
    fn test_unknown_model_is_rejected_for_shaping() {
        assert!(matches!(
            shape_text_to_video(&request("nope")).unwrap_err(),
            SpecError::UnknownModel(_)
        ));
    }
}
