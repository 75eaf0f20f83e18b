//! Prompt flows: face centering and background removal.
//!
//! Each flow validates its input, makes exactly one model call, and
//! validates the image that comes back.

use super::AiError;
use super::client::{GenerateRequest, GenerativeModel, Modality, Part};
use super::data_uri::DataUri;
use tracing::{debug, info};

const REMOVE_BACKGROUND_PROMPT: &str = "You are an expert image editor. Remove the background from this image. The subject is a person. The output should be a PNG with a transparent background.";

#[derive(Debug, Clone, PartialEq)]
pub struct FaceCenterInput {
    pub photo: DataUri,
    pub guide_x: f64,
    pub guide_y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceCenterOutput {
    pub centered_photo: DataUri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveBackgroundInput {
    pub photo: DataUri,
    /// `#RGB` or `#RRGGBB`; `None` keeps the background transparent.
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveBackgroundOutput {
    pub processed_photo: DataUri,
}

fn face_center_prompt(x: f64, y: f64) -> String {
    format!(
        "You are an AI assistant that automatically centers a face in a passport photo.\n\
         \n\
         The photo above is the input. The face center guide is at the coordinates below.\n\
         Return the photo with the face centered on the guide.\n\
         \n\
         Face Center Guide X: {x}\n\
         Face Center Guide Y: {y}"
    )
}

fn recolor_prompt(color: &str) -> String {
    format!(
        "After removing the background, replace the transparent background with a solid color: {color}."
    )
}

fn require_image(photo: &DataUri) -> Result<(), AiError> {
    if !photo.is_image() {
        return Err(AiError::InvalidInput(format!(
            "expected an image, got {}",
            photo.mime_type
        )));
    }
    if photo.bytes.is_empty() {
        return Err(AiError::InvalidInput("photo is empty".to_string()));
    }
    Ok(())
}

/// Accept `#RGB` or `#RRGGBB` hex colours.
pub fn validate_hex_color(color: &str) -> Result<(), AiError> {
    let valid = color
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        Ok(())
    } else {
        Err(AiError::InvalidInput(format!(
            "background colour must be #RGB or #RRGGBB, got {color:?}"
        )))
    }
}

/// First image of the response, or `EmptyResponse` with `message`.
fn first_image(
    model: &impl GenerativeModel,
    request: &GenerateRequest,
    message: &str,
) -> Result<DataUri, AiError> {
    let response = model.generate(request)?;
    let image = response
        .images
        .into_iter()
        .next()
        .ok_or_else(|| AiError::EmptyResponse(message.to_string()))?;
    require_image(&image).map_err(|_| {
        AiError::InvalidDataUri(format!("model returned {} instead of an image", image.mime_type))
    })?;
    Ok(image)
}

/// Ask the model to recentre the face on the guide coordinates.
pub fn face_center(
    model: &impl GenerativeModel,
    input: &FaceCenterInput,
) -> Result<FaceCenterOutput, AiError> {
    require_image(&input.photo)?;
    if !input.guide_x.is_finite() || !input.guide_y.is_finite() {
        return Err(AiError::InvalidInput(
            "face center guide coordinates must be finite numbers".to_string(),
        ));
    }

    info!(x = input.guide_x, y = input.guide_y, "centering face");
    let request = GenerateRequest {
        parts: vec![
            Part::Image(input.photo.clone()),
            Part::Text(face_center_prompt(input.guide_x, input.guide_y)),
        ],
        response_modalities: vec![Modality::Image],
    };
    let centered_photo = first_image(model, &request, "Failed to generate a centered photo.")?;
    Ok(FaceCenterOutput { centered_photo })
}

/// Ask the model to remove the background, optionally filling it with a colour.
pub fn remove_background(
    model: &impl GenerativeModel,
    input: &RemoveBackgroundInput,
) -> Result<RemoveBackgroundOutput, AiError> {
    require_image(&input.photo)?;
    let color = input
        .background_color
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if let Some(color) = color {
        validate_hex_color(color)?;
    }

    let mut parts = vec![
        Part::Image(input.photo.clone()),
        Part::Text(REMOVE_BACKGROUND_PROMPT.to_string()),
    ];
    if let Some(color) = color {
        parts.push(Part::Text(recolor_prompt(color)));
    }
    debug!(background = color.unwrap_or("transparent"), "removing background");

    let request = GenerateRequest {
        parts,
        response_modalities: vec![Modality::Image],
    };
    let processed_photo = first_image(
        model,
        &request,
        "Failed to generate image with background removed.",
    )?;
    Ok(RemoveBackgroundOutput { processed_photo })
}

/// Passport composition: centre the face, then optionally replace the
/// background with a solid colour.
pub fn passport_photo(
    model: &impl GenerativeModel,
    photo: DataUri,
    guide: (f64, f64),
    background_color: Option<String>,
) -> Result<DataUri, AiError> {
    // Blank means no recolouring, as in remove_background
    let background_color = background_color
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if let Some(color) = background_color.as_deref() {
        validate_hex_color(color)?;
    }
    let centered = face_center(
        model,
        &FaceCenterInput {
            photo,
            guide_x: guide.0,
            guide_y: guide.1,
        },
    )?
    .centered_photo;

    match background_color {
        Some(color) => Ok(remove_background(
            model,
            &RemoveBackgroundInput {
                photo: centered,
                background_color: Some(color),
            },
        )?
        .processed_photo),
        None => Ok(centered),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::GenerateResponse;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned responses and records every request.
    #[derive(Default)]
    struct ScriptedModel {
        responses: RefCell<VecDeque<Result<GenerateResponse, AiError>>>,
        requests: RefCell<Vec<GenerateRequest>>,
    }

    impl ScriptedModel {
        fn replying(responses: Vec<Result<GenerateResponse, AiError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                ..Self::default()
            }
        }

        fn with_image(uri: DataUri) -> Self {
            Self::replying(vec![Ok(GenerateResponse {
                images: vec![uri],
                text: None,
            })])
        }

        fn requests(&self) -> Vec<GenerateRequest> {
            self.requests.borrow().clone()
        }
    }

    impl GenerativeModel for ScriptedModel {
        fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, AiError> {
            self.requests.borrow_mut().push(request.clone());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(GenerateResponse::default()))
        }
    }

    fn photo() -> DataUri {
        DataUri::from_bytes("image/jpeg", b"jpeg-bytes".to_vec())
    }

    fn png(tag: &[u8]) -> DataUri {
        DataUri::from_bytes("image/png", tag.to_vec())
    }

    fn texts(request: &GenerateRequest) -> Vec<&str> {
        request
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Image(_) => None,
            })
            .collect()
    }

    // =========================================================================
    // Background removal
    // =========================================================================

    #[test]
    fn transparent_removal_sends_image_then_instruction() {
        let model = ScriptedModel::with_image(png(b"cut-out"));
        let out = remove_background(
            &model,
            &RemoveBackgroundInput {
                photo: photo(),
                background_color: None,
            },
        )
        .unwrap();
        assert_eq!(out.processed_photo, png(b"cut-out"));

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.parts[0], Part::Image(photo()));
        assert_eq!(texts(request), vec![REMOVE_BACKGROUND_PROMPT]);
        assert!(REMOVE_BACKGROUND_PROMPT.contains("transparent background"));
        assert_eq!(request.response_modalities, vec![Modality::Image]);
    }

    #[test]
    fn colored_removal_adds_recolor_instruction() {
        let model = ScriptedModel::with_image(png(b"white"));
        remove_background(
            &model,
            &RemoveBackgroundInput {
                photo: photo(),
                background_color: Some("#FFFFFF".to_string()),
            },
        )
        .unwrap();

        let request = &model.requests()[0];
        assert_eq!(
            texts(request),
            vec![
                REMOVE_BACKGROUND_PROMPT,
                "After removing the background, replace the transparent background with a solid color: #FFFFFF."
            ]
        );
    }

    #[test]
    fn missing_image_is_an_explicit_error() {
        let model = ScriptedModel::replying(vec![Ok(GenerateResponse {
            images: vec![],
            text: Some("I cannot do that".to_string()),
        })]);
        let err = remove_background(
            &model,
            &RemoveBackgroundInput {
                photo: photo(),
                background_color: None,
            },
        )
        .unwrap_err();
        match err {
            AiError::EmptyResponse(msg) => {
                assert_eq!(msg, "Failed to generate image with background removed.")
            }
            other => panic!("expected EmptyResponse, got {other:?}"),
        }
    }

    #[test]
    fn invalid_color_never_reaches_model() {
        let model = ScriptedModel::default();
        for bad in ["white", "#FFFF", "FFFFFF", "#GGGGGG"] {
            let err = remove_background(
                &model,
                &RemoveBackgroundInput {
                    photo: photo(),
                    background_color: Some(bad.to_string()),
                },
            )
            .unwrap_err();
            assert!(matches!(err, AiError::InvalidInput(_)), "{bad}");
        }
        assert!(model.requests().is_empty());
    }

    #[test]
    fn hex_colors() {
        assert!(validate_hex_color("#fff").is_ok());
        assert!(validate_hex_color("#1a2B3c").is_ok());
        assert!(validate_hex_color("#").is_err());
        assert!(validate_hex_color("#12345").is_err());
    }

    #[test]
    fn non_image_response_is_rejected() {
        let model = ScriptedModel::with_image(DataUri::from_bytes("text/plain", b"hi".to_vec()));
        let err = remove_background(
            &model,
            &RemoveBackgroundInput {
                photo: photo(),
                background_color: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AiError::InvalidDataUri(_)));
    }

    #[test]
    fn model_errors_propagate() {
        let model = ScriptedModel::replying(vec![Err(AiError::Status {
            status: 503,
            body: "overloaded".to_string(),
        })]);
        let err = remove_background(
            &model,
            &RemoveBackgroundInput {
                photo: photo(),
                background_color: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AiError::Status { status: 503, .. }));
    }

    // =========================================================================
    // Face centering
    // =========================================================================

    #[test]
    fn face_center_prompt_carries_coordinates() {
        let model = ScriptedModel::with_image(png(b"centered"));
        let out = face_center(
            &model,
            &FaceCenterInput {
                photo: photo(),
                guide_x: 120.5,
                guide_y: 88.0,
            },
        )
        .unwrap();
        assert_eq!(out.centered_photo, png(b"centered"));

        let request = &model.requests()[0];
        assert_eq!(request.parts[0], Part::Image(photo()));
        let text = texts(request)[0];
        assert!(text.contains("Face Center Guide X: 120.5"));
        assert!(text.contains("Face Center Guide Y: 88"));
    }

    #[test]
    fn face_center_rejects_bad_input() {
        let model = ScriptedModel::default();
        let err = face_center(
            &model,
            &FaceCenterInput {
                photo: photo(),
                guide_x: f64::NAN,
                guide_y: 0.0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AiError::InvalidInput(_)));

        let err = face_center(
            &model,
            &FaceCenterInput {
                photo: DataUri::from_bytes("application/pdf", b"%PDF".to_vec()),
                guide_x: 1.0,
                guide_y: 1.0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AiError::InvalidInput(_)));
        assert!(model.requests().is_empty());
    }

    #[test]
    fn face_center_missing_image_errors() {
        let model = ScriptedModel::default();
        let err = face_center(
            &model,
            &FaceCenterInput {
                photo: photo(),
                guide_x: 1.0,
                guide_y: 2.0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse(_)));
    }

    // =========================================================================
    // Passport composition
    // =========================================================================

    #[test]
    fn passport_without_background_is_one_call() {
        let model = ScriptedModel::with_image(png(b"centered"));
        let out = passport_photo(&model, photo(), (10.0, 20.0), None).unwrap();
        assert_eq!(out, png(b"centered"));
        assert_eq!(model.requests().len(), 1);
    }

    #[test]
    fn passport_with_background_chains_centered_output() {
        let model = ScriptedModel::replying(vec![
            Ok(GenerateResponse {
                images: vec![png(b"centered")],
                text: None,
            }),
            Ok(GenerateResponse {
                images: vec![png(b"final")],
                text: None,
            }),
        ]);
        let out = passport_photo(&model, photo(), (10.0, 20.0), Some("#fff".to_string())).unwrap();
        assert_eq!(out, png(b"final"));

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].parts[0], Part::Image(png(b"centered")));
    }

    #[test]
    fn passport_blank_color_only_centers() {
        for blank in ["", "   "] {
            let model = ScriptedModel::with_image(png(b"centered"));
            let out =
                passport_photo(&model, photo(), (1.0, 1.0), Some(blank.to_string())).unwrap();
            assert_eq!(out, png(b"centered"));
            assert_eq!(model.requests().len(), 1);
        }
    }

    #[test]
    fn passport_checks_color_before_any_call() {
        let model = ScriptedModel::default();
        let err = passport_photo(&model, photo(), (1.0, 1.0), Some("blue".to_string())).unwrap_err();
        assert!(matches!(err, AiError::InvalidInput(_)));
        assert!(model.requests().is_empty());
    }
}
