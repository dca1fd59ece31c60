//! Generation request domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Inference quality mode forwarded to the inference executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InferMode {
    #[default]
    Accuracy,
    Performance,
    Profiling,
}

impl InferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferMode::Accuracy => "Accuracy",
            InferMode::Performance => "Performance",
            InferMode::Profiling => "Profiling",
        }
    }
}

impl fmt::Display for InferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InferMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accuracy" => Ok(InferMode::Accuracy),
            "performance" => Ok(InferMode::Performance),
            "profiling" => Ok(InferMode::Profiling),
            _ => Err(ValidationError::InvalidInferMode(s.to_string())),
        }
    }
}

/// Output image size parsed from a `WxH` string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidResolution(s.to_string());

        let (width, height) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let width: u32 = width.trim().parse().map_err(|_| invalid())?;
        let height: u32 = height.trim().parse().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Self { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Reasons a generation request is rejected at submission time
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("invalid resolution '{0}', expected WIDTHxHEIGHT")]
    InvalidResolution(String),

    #[error("invalid infer_type '{0}', expected Accuracy, Performance or Profiling")]
    InvalidInferMode(String),

    #[error("{field} must be {expected} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("batch must contain at least one request")]
    EmptyBatch,
}

pub const MAX_INFERENCE_STEPS: u32 = 500;
pub const MAX_IMAGES_PER_PROMPT: u32 = 16;

/// An image generation request as submitted by a client
///
/// Every field except `prompt` has a default so that minimal payloads such as
/// `{"prompt": "a cat"}` are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub resolution: String,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub num_images_per_prompt: u32,
    pub seed: Option<u64>,
    pub batch_size: u32,
    pub infer_type: InferMode,
    /// Overrides the server's configured device count for this job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_count: Option<u32>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            resolution: "1024x1024".to_string(),
            num_inference_steps: 50,
            guidance_scale: 7.5,
            num_images_per_prompt: 1,
            seed: None,
            batch_size: 1,
            infer_type: InferMode::Accuracy,
            device_count: None,
        }
    }
}

impl GenerationRequest {
    /// Creates a request for `prompt` with every other field defaulted
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Parses the `resolution` field
    pub fn parsed_resolution(&self) -> Result<Resolution, ValidationError> {
        self.resolution.parse()
    }

    /// Checks every field against its accepted range
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }

        self.parsed_resolution()?;

        if !(1..=MAX_INFERENCE_STEPS).contains(&self.num_inference_steps) {
            return Err(ValidationError::OutOfRange {
                field: "num_inference_steps",
                value: self.num_inference_steps.to_string(),
                expected: "between 1 and 500",
            });
        }

        if !(self.guidance_scale.is_finite() && self.guidance_scale > 0.0) {
            return Err(ValidationError::OutOfRange {
                field: "guidance_scale",
                value: self.guidance_scale.to_string(),
                expected: "a positive number",
            });
        }

        if !(1..=MAX_IMAGES_PER_PROMPT).contains(&self.num_images_per_prompt) {
            return Err(ValidationError::OutOfRange {
                field: "num_images_per_prompt",
                value: self.num_images_per_prompt.to_string(),
                expected: "between 1 and 16",
            });
        }

        if self.batch_size == 0 {
            return Err(ValidationError::OutOfRange {
                field: "batch_size",
                value: "0".to_string(),
                expected: "at least 1",
            });
        }

        if self.device_count == Some(0) {
            return Err(ValidationError::OutOfRange {
                field: "device_count",
                value: "0".to_string(),
                expected: "at least 1",
            });
        }

        Ok(())
    }

    /// Rough wall-clock estimate for this request, in seconds
    ///
    /// Scales a 15 second baseline by step count (relative to 50), image
    /// count and resolution. Never returns less than 5.
    pub fn estimated_seconds(&self) -> u64 {
        const BASE_SECONDS: f64 = 15.0;
        const MIN_SECONDS: u64 = 5;

        let step_factor = self.num_inference_steps as f64 / 50.0;
        let image_factor = self.num_images_per_prompt as f64;
        let resolution_factor = if self.resolution.contains("2048") {
            2.0
        } else if self.resolution.contains("1536") {
            1.5
        } else {
            1.0
        };

        let estimated = (BASE_SECONDS * step_factor * image_factor * resolution_factor) as u64;
        estimated.max(MIN_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_payload_uses_defaults() {
        let req: GenerationRequest = serde_json::from_str(r#"{"prompt": "a cat"}"#).unwrap();
        assert_eq!(req.prompt, "a cat");
        assert_eq!(req.negative_prompt, "");
        assert_eq!(req.resolution, "1024x1024");
        assert_eq!(req.num_inference_steps, 50);
        assert_eq!(req.num_images_per_prompt, 1);
        assert_eq!(req.batch_size, 1);
        assert_eq!(req.infer_type, InferMode::Accuracy);
        assert!(req.seed.is_none());
        assert!(req.device_count.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_resolution_parsing() {
        assert_eq!(
            "1024x768".parse::<Resolution>().unwrap(),
            Resolution {
                width: 1024,
                height: 768
            }
        );
        assert!("2048X2048".parse::<Resolution>().is_ok());
        assert!("1024".parse::<Resolution>().is_err());
        assert!("0x1024".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());

        let loose: Resolution = " 1536X1024 ".parse().unwrap();
        assert_eq!(loose.to_string(), "1536x1024");
    }

    #[test]
    fn test_negative_prompt_is_a_plain_string() {
        let req: GenerationRequest =
            serde_json::from_str(r#"{"prompt": "a cat", "negative_prompt": "blurry"}"#).unwrap();
        assert_eq!(req.negative_prompt, "blurry");

        let json = serde_json::to_value(GenerationRequest::new("a cat")).unwrap();
        assert_eq!(json["negative_prompt"], "");
    }

    #[test]
    fn test_validation_rejects_bad_fields() {
        let mut req = GenerationRequest::new("  ");
        assert_eq!(req.validate(), Err(ValidationError::EmptyPrompt));

        req.prompt = "p".to_string();
        req.resolution = "big".to_string();
        assert!(matches!(
            req.validate(),
            Err(ValidationError::InvalidResolution(_))
        ));

        req.resolution = "1024x1024".to_string();
        req.num_inference_steps = 0;
        assert!(matches!(
            req.validate(),
            Err(ValidationError::OutOfRange {
                field: "num_inference_steps",
                ..
            })
        ));

        req.num_inference_steps = 30;
        req.num_images_per_prompt = 17;
        assert!(req.validate().is_err());

        req.num_images_per_prompt = 2;
        req.guidance_scale = -1.0;
        assert!(req.validate().is_err());

        req.guidance_scale = 7.5;
        req.device_count = Some(0);
        assert!(req.validate().is_err());

        req.device_count = Some(8);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_estimated_seconds() {
        let mut req = GenerationRequest::new("p");
        assert_eq!(req.estimated_seconds(), 15);

        req.num_inference_steps = 30;
        req.num_images_per_prompt = 2;
        assert_eq!(req.estimated_seconds(), 18);

        req.resolution = "2048x2048".to_string();
        assert_eq!(req.estimated_seconds(), 36);

        req.resolution = "1536x1536".to_string();
        req.num_images_per_prompt = 1;
        req.num_inference_steps = 50;
        assert_eq!(req.estimated_seconds(), 22);

        req.num_inference_steps = 1;
        assert_eq!(req.estimated_seconds(), 5);
    }

    #[test]
    fn test_infer_mode_parsing() {
        assert_eq!("performance".parse::<InferMode>(), Ok(InferMode::Performance));
        assert!("fast".parse::<InferMode>().is_err());
        assert_eq!(InferMode::Profiling.to_string(), "Profiling");
    }
}
