//! # Analysis
//!
//! Runs the result selector on an uploaded image and records the verdict in the caller's history.
//!
//! Persistence failures split in two:
//! - permission, foreign key and missing table errors fail the request, the verdict is dropped
//! - anything else still returns the verdict, with `testId: null` and a `warning`
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    error::{AppError, ErrorKind},
    guard::{ErrorMap, Fallback, MISSING_TABLE, PERMISSION_DENIED, Rule, authenticate, connect, validated},
    models::NewFoodTest,
    selector::{Verdict, analyze_image},
    state::AppState,
};

const OPERATION: &str = "analysis.analyze";

pub const UNSAVED_WARNING: &str = "Analysis completed but could not be saved to history";

pub const PERSIST_ERRORS: ErrorMap = ErrorMap {
    rules: &[
        PERMISSION_DENIED,
        Rule::message(
            &["foreign key"],
            ErrorKind::InvalidInput,
            "Invalid user reference",
        ),
        MISSING_TABLE,
    ],
    unreachable: ErrorKind::InternalError,
    fallback: Fallback::Fixed(ErrorKind::InternalError, "Failed to save analysis"),
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePayload {
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub item_name: Option<String>,
    pub test_type: Option<String>,
}

/// Fields as sent. The selector sees them untrimmed, the stored record trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub image_url: String,
    pub category: String,
    pub item_name: String,
    pub test_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub verdict: Verdict,
    pub test_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

pub fn validate_analysis(payload: AnalyzePayload) -> Result<AnalysisRequest, AppError> {
    let filled = |value: Option<String>| value.filter(|value| !value.trim().is_empty());

    let (Some(image_url), Some(category), Some(item_name), Some(test_type)) = (
        filled(payload.image_url),
        filled(payload.category),
        filled(payload.item_name),
        filled(payload.test_type),
    ) else {
        return Err(AppError::InvalidInput(
            "Missing required fields: imageUrl, category, itemName, testType".to_string(),
        ));
    };

    // relative references fail to parse without a base
    Url::parse(&image_url)
        .map_err(|_| AppError::InvalidInput("Invalid image URL format".to_string()))?;

    Ok(AnalysisRequest {
        image_url,
        category,
        item_name,
        test_type,
    })
}

pub async fn analyze(
    state: &AppState,
    access_token: Option<&str>,
    payload: AnalyzePayload,
) -> Result<AnalysisResponse, AppError> {
    let request = validated(OPERATION, || validate_analysis(payload))?;
    let provider = connect(OPERATION, state, &PERSIST_ERRORS)?;
    let caller = authenticate(OPERATION, provider, access_token).await?;

    let verdict = *analyze_image(
        state.config.analysis_delay,
        &request.image_url,
        &request.category,
        &request.item_name,
    )
    .await
    .map_err(|e| {
        warn!("[{OPERATION}:call] selector failed: {e}");
        AppError::AnalysisFailed("Image analysis failed. Please try again".to_string())
    })?;

    let test = NewFoodTest {
        category: request.category.trim().to_string(),
        item_name: request.item_name.trim().to_string(),
        test_type: request.test_type.trim().to_string(),
        image_url: request.image_url.trim().to_string(),
        result_status: verdict.status,
        confidence_score: Some(verdict.confidence),
        adulterants_detected: verdict.adulterant_list(),
        recommendations: verdict.recommendation_list(),
    };

    match provider.insert_test(&caller, &test).await {
        Ok(record) => {
            info!("[{OPERATION}:call] saved {} as {}", verdict.status, record.id);

            Ok(AnalysisResponse {
                verdict,
                test_id: Some(record.id),
                warning: None,
            })
        }
        Err(error) => {
            if let Some(mapped) = PERSIST_ERRORS.matching(&error) {
                warn!("[{OPERATION}:map] {error} -> {:?}", mapped.kind());
                return Err(mapped);
            }

            warn!("[{OPERATION}:map] verdict returned unsaved: {error}");

            Ok(AnalysisResponse {
                verdict,
                test_id: None,
                warning: Some(UNSAVED_WARNING),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AnalysisResponse, AnalyzePayload, validate_analysis};
    use crate::selector::VERDICTS;

    fn payload(image_url: &str) -> AnalyzePayload {
        AnalyzePayload {
            image_url: Some(image_url.to_string()),
            category: Some("honey".to_string()),
            item_name: Some("raw-honey".to_string()),
            test_type: Some("visual_analysis".to_string()),
        }
    }

    #[test]
    fn test_image_url_must_be_absolute() {
        assert!(validate_analysis(payload("https://cdn.example.com/a.jpg")).is_ok());

        for url in ["/storage/a.jpg", "a.jpg", "not a url"] {
            let error = validate_analysis(payload(url)).unwrap_err();
            assert_eq!(error.to_string(), "Invalid image URL format");
        }
    }

    #[test]
    fn test_fields_kept_as_sent() {
        let mut padded = payload("https://cdn.example.com/a.jpg");
        padded.item_name = Some(" raw-honey ".to_string());

        let request = validate_analysis(padded).unwrap();
        assert_eq!(request.item_name, " raw-honey ");
    }

    #[test]
    fn test_missing_fields() {
        let mut missing = payload("https://cdn.example.com/a.jpg");
        missing.test_type = Some(" ".to_string());

        let error = validate_analysis(missing).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Missing required fields: imageUrl, category, itemName, testType"
        );
    }

    #[test]
    fn test_response_shape() {
        let response = AnalysisResponse {
            verdict: VERDICTS[1],
            test_id: None,
            warning: None,
        };

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["status"], json!("adulterated"));
        assert_eq!(body["confidence"], json!(87));
        assert_eq!(body["adulterants"].as_array().unwrap().len(), 2);
        assert_eq!(body["testId"], json!(null));
        assert!(body.get("warning").is_none());
    }
}
