use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, ErrorKind},
    guard::{ErrorMap, Fallback, MISSING_TABLE, PERMISSION_DENIED, Rule, guard_caller},
    models::{
        CountFilter, FoodTestRecord, NewFoodTest, ResultStatus, Stats, TestQuery,
        split_recommendations,
    },
    provider::ProviderError,
    state::AppState,
    utils::present,
};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
pub const RECENT_DAYS: i64 = 7;

pub const LIST_TESTS_ERRORS: ErrorMap = ErrorMap {
    rules: &[PERMISSION_DENIED, MISSING_TABLE],
    unreachable: ErrorKind::InternalError,
    fallback: Fallback::Fixed(ErrorKind::InvalidInput, "Failed to fetch tests"),
};

pub const CREATE_TEST_ERRORS: ErrorMap = ErrorMap {
    rules: &[
        PERMISSION_DENIED,
        Rule::message(
            &["foreign key"],
            ErrorKind::InvalidInput,
            "Invalid user reference",
        ),
        Rule::message(
            &["check constraint"],
            ErrorKind::InvalidInput,
            "Invalid data format",
        ),
    ],
    unreachable: ErrorKind::InternalError,
    fallback: Fallback::Fixed(ErrorKind::InvalidInput, "Failed to create test record"),
};

pub const STATS_ERRORS: ErrorMap = ErrorMap {
    rules: &[MISSING_TABLE],
    unreachable: ErrorKind::InternalError,
    fallback: Fallback::Fixed(ErrorKind::InvalidInput, "Failed to fetch test statistics"),
};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Recommendations {
    List(Vec<String>),
    Joined(String),
}

impl Recommendations {
    pub fn into_list(self) -> Vec<String> {
        match self {
            Recommendations::List(list) => list,
            Recommendations::Joined(joined) => split_recommendations(joined.trim()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestPayload {
    pub category: Option<String>,
    pub item_name: Option<String>,
    pub test_type: Option<String>,
    pub image_url: Option<String>,
    pub result_status: Option<String>,
    pub confidence_score: Option<i64>,
    pub adulterants_detected: Option<Vec<String>>,
    pub recommendations: Option<Recommendations>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestList {
    pub tests: Vec<FoodTestRecord>,
}

#[derive(Debug, Serialize)]
pub struct CreatedTest {
    pub test: FoodTestRecord,
}

pub fn validate_confidence(score: Option<i64>) -> Result<Option<u8>, AppError> {
    match score {
        None => Ok(None),
        Some(score @ 0..=100) => Ok(Some(score as u8)),
        Some(_) => Err(AppError::InvalidInput(
            "Confidence score must be between 0 and 100".to_string(),
        )),
    }
}

pub fn validate_new_test(payload: CreateTestPayload) -> Result<NewFoodTest, AppError> {
    let (Some(category), Some(item_name), Some(test_type), Some(image_url), Some(status)) = (
        present(payload.category),
        present(payload.item_name),
        present(payload.test_type),
        present(payload.image_url),
        present(payload.result_status),
    ) else {
        return Err(AppError::InvalidInput("Missing required fields".to_string()));
    };

    let result_status: ResultStatus = status
        .parse()
        .map_err(|_| AppError::InvalidInput("Invalid result status".to_string()))?;

    Ok(NewFoodTest {
        category,
        item_name,
        test_type,
        image_url,
        result_status,
        confidence_score: validate_confidence(payload.confidence_score)?,
        adulterants_detected: payload.adulterants_detected.unwrap_or_default(),
        recommendations: payload
            .recommendations
            .map(Recommendations::into_list)
            .unwrap_or_default(),
    })
}

pub fn validate_query(query: ListQuery) -> Result<TestQuery, AppError> {
    let out_of_range = || AppError::InvalidInput(format!("Limit must be between 1 and {MAX_LIMIT}"));

    let limit = match present(query.limit) {
        Some(limit) => limit.parse::<i64>().map_err(|_| out_of_range())?,
        None => DEFAULT_LIMIT,
    };

    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(out_of_range());
    }

    Ok(TestQuery {
        limit: limit as usize,
        category: present(query.category),
    })
}

pub async fn create_test(
    state: &AppState,
    access_token: Option<&str>,
    payload: CreateTestPayload,
) -> Result<CreatedTest, AppError> {
    guard_caller(
        "tests.create",
        state,
        access_token,
        || validate_new_test(payload),
        |provider, caller, test: NewFoodTest| async move {
            provider
                .insert_test(&caller, &test)
                .await
                .map(|test| CreatedTest { test })
        },
        &CREATE_TEST_ERRORS,
    )
    .await
}

pub async fn list_tests(
    state: &AppState,
    access_token: Option<&str>,
    query: ListQuery,
) -> Result<TestList, AppError> {
    guard_caller(
        "tests.list",
        state,
        access_token,
        || validate_query(query),
        |provider, caller, query: TestQuery| async move {
            provider
                .list_tests(&caller, &query)
                .await
                .map(|tests| TestList { tests })
        },
        &LIST_TESTS_ERRORS,
    )
    .await
}

pub async fn get_stats(state: &AppState, access_token: Option<&str>) -> Result<Stats, AppError> {
    guard_caller(
        "tests.stats",
        state,
        access_token,
        || Ok(()),
        |provider, caller, ()| async move {
            let recent = CountFilter {
                since: Some(Utc::now() - Duration::days(RECENT_DAYS)),
                status: None,
            };
            let with_status = |status| CountFilter {
                since: None,
                status: Some(status),
            };

            let (total_tests, recent_tests, pure_count, adulterated_count) = tokio::try_join!(
                provider.count_tests(&caller, CountFilter::default()),
                provider.count_tests(&caller, recent),
                provider.count_tests(&caller, with_status(ResultStatus::Pure)),
                provider.count_tests(&caller, with_status(ResultStatus::Adulterated)),
            )?;

            Ok::<_, ProviderError>(Stats {
                total_tests,
                recent_tests,
                pure_count,
                adulterated_count,
            })
        },
        &STATS_ERRORS,
    )
    .await
}
