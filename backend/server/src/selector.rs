//! # Result Selector
//!
//! Placeholder for the image model. Picks one of five canned verdicts from the inputs alone:
//!
//! `index = utf16_len(category + item_name + image_reference) % 10`, verdict = `VERDICTS[index % 5]`
//!
//! Same inputs always give the same verdict. No network, no file access.
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;

use crate::models::ResultStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Missing required parameters for analysis")]
    MissingInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub status: ResultStatus,
    pub confidence: u8,
    pub message: &'static str,
    pub details: &'static str,
    pub recommendations: &'static [&'static str],
    pub adulterants: &'static [&'static str],
}

impl Verdict {
    pub fn recommendation_list(&self) -> Vec<String> {
        self.recommendations.iter().map(|s| s.to_string()).collect()
    }

    pub fn adulterant_list(&self) -> Vec<String> {
        self.adulterants.iter().map(|s| s.to_string()).collect()
    }
}

pub const VERDICTS: [Verdict; 5] = [
    Verdict {
        status: ResultStatus::Pure,
        confidence: 94,
        message: "No adulteration detected",
        details: "The sample shows characteristics consistent with pure, unadulterated food.",
        recommendations: &["Safe for consumption", "Store properly to maintain quality"],
        adulterants: &[],
    },
    Verdict {
        status: ResultStatus::Adulterated,
        confidence: 87,
        message: "Potential adulteration detected",
        details: "The analysis indicates possible presence of artificial additives or adulterants.",
        recommendations: &[
            "Avoid consumption",
            "Consider purchasing from a different source",
            "Report to local authorities",
        ],
        adulterants: &["Artificial coloring", "Chemical preservatives"],
    },
    Verdict {
        status: ResultStatus::Adulterated,
        confidence: 91,
        message: "Adulteration confirmed",
        details: "Multiple adulterants detected in the sample.",
        recommendations: &[
            "Do not consume",
            "Dispose of the product safely",
            "Report to food safety authorities",
        ],
        adulterants: &["Starch", "Chalk powder", "Artificial sweeteners"],
    },
    Verdict {
        status: ResultStatus::Pure,
        confidence: 96,
        message: "High purity confirmed",
        details: "Excellent quality sample with no detectable adulterants.",
        recommendations: &["Safe for consumption", "Good quality product"],
        adulterants: &[],
    },
    Verdict {
        status: ResultStatus::Inconclusive,
        confidence: 65,
        message: "Analysis inconclusive",
        details: "The image quality or sample condition makes it difficult to provide a definitive result.",
        recommendations: &[
            "Retake photo with better lighting",
            "Ensure sample is properly prepared",
            "Try again with a fresh sample",
        ],
        adulterants: &[],
    },
];

pub fn select(
    image_reference: &str,
    category: &str,
    item_name: &str,
) -> Result<&'static Verdict, SelectorError> {
    if image_reference.is_empty() || category.is_empty() || item_name.is_empty() {
        return Err(SelectorError::MissingInput);
    }

    let length = [category, item_name, image_reference]
        .iter()
        .map(|part| part.encode_utf16().count())
        .sum::<usize>();

    let index = length % 10;

    Ok(&VERDICTS[index % VERDICTS.len()])
}

/// [`select`] behind a fixed delay standing in for model latency.
pub async fn analyze_image(
    delay: Duration,
    image_reference: &str,
    category: &str,
    item_name: &str,
) -> Result<&'static Verdict, SelectorError> {
    let verdict = select(image_reference, category, item_name)?;

    if !delay.is_zero() {
        sleep(delay).await;
    }

    Ok(verdict)
}
