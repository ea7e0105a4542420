use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `food_tests.recommendations` holds the list joined with this.
pub const RECOMMENDATION_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pure,
    Adulterated,
    Inconclusive,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Pure => "pure",
            ResultStatus::Adulterated => "adulterated",
            ResultStatus::Inconclusive => "inconclusive",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pure" => Ok(ResultStatus::Pure),
            "adulterated" => Ok(ResultStatus::Adulterated),
            "inconclusive" => Ok(ResultStatus::Inconclusive),
            other => Err(format!("unknown result status {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
}

/// Authenticated identity of the current request plus the token the collaborator issued for it.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub access_token: String,
}

impl Caller {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub session: Session,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub phone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodTestRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: String,
    pub item_name: String,
    pub test_type: String,
    pub image_url: String,
    pub result_status: ResultStatus,
    pub confidence_score: Option<u8>,
    pub adulterants_detected: Vec<String>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A record about to be inserted. The owner is not part of it: adapters always write the
/// caller's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFoodTest {
    pub category: String,
    pub item_name: String,
    pub test_type: String,
    pub image_url: String,
    pub result_status: ResultStatus,
    pub confidence_score: Option<u8>,
    pub adulterants_detected: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestQuery {
    pub limit: usize,
    pub category: Option<String>,
}

/// Narrows a row count. Unset fields do not filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountFilter {
    pub since: Option<DateTime<Utc>>,
    pub status: Option<ResultStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_tests: u64,
    pub recent_tests: u64,
    pub pure_count: u64,
    pub adulterated_count: u64,
}

pub fn join_recommendations(recommendations: &[String]) -> String {
    recommendations.join(RECOMMENDATION_SEPARATOR)
}

pub fn split_recommendations(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }

    joined
        .split(RECOMMENDATION_SEPARATOR)
        .map(str::to_string)
        .collect()
}

/// Out of range scores read back from storage are pinned to the nearest bound.
pub fn clamp_confidence(score: i64) -> u8 {
    score.clamp(0, 100) as u8
}
