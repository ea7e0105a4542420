use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, ErrorKind},
    guard::{ErrorMap, Fallback, PERMISSION_DENIED, Rule, guard_caller},
    models::{Profile, ProfileUpdate, User},
    provider::NO_ROWS_CODE,
    state::AppState,
    utils::present,
};

const PROFILE_NOT_FOUND: Rule = Rule::code(NO_ROWS_CODE, ErrorKind::NotFound, "Profile not found");

pub const GET_PROFILE_ERRORS: ErrorMap = ErrorMap {
    rules: &[PROFILE_NOT_FOUND, PERMISSION_DENIED],
    unreachable: ErrorKind::InternalError,
    fallback: Fallback::Fixed(ErrorKind::InvalidInput, "Failed to fetch profile"),
};

pub const UPDATE_PROFILE_ERRORS: ErrorMap = ErrorMap {
    rules: &[
        PROFILE_NOT_FOUND,
        PERMISSION_DENIED,
        Rule::message(
            &["duplicate key"],
            ErrorKind::Conflict,
            "Profile data conflicts with existing record",
        ),
    ],
    unreachable: ErrorKind::InternalError,
    fallback: Fallback::Fixed(ErrorKind::InvalidInput, "Failed to update profile"),
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePayload {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

pub fn validate_update(payload: ProfilePayload) -> Result<(String, Option<String>), AppError> {
    let full_name = present(payload.full_name)
        .ok_or_else(|| AppError::InvalidInput("Full name is required".to_string()))?;

    Ok((full_name, present(payload.phone)))
}

pub async fn get_profile(
    state: &AppState,
    access_token: Option<&str>,
) -> Result<ProfileResponse, AppError> {
    guard_caller(
        "profile.get",
        state,
        access_token,
        || Ok(()),
        |provider, caller, ()| async move {
            provider
                .get_profile(&caller)
                .await
                .map(|profile| ProfileResponse {
                    profile,
                    user: Some(caller.user),
                })
        },
        &GET_PROFILE_ERRORS,
    )
    .await
}

pub async fn update_profile(
    state: &AppState,
    access_token: Option<&str>,
    payload: ProfilePayload,
) -> Result<ProfileResponse, AppError> {
    guard_caller(
        "profile.update",
        state,
        access_token,
        || validate_update(payload),
        |provider, caller, (full_name, phone): (String, Option<String>)| async move {
            let update = ProfileUpdate {
                full_name,
                phone,
                updated_at: Utc::now(),
            };

            provider
                .update_profile(&caller, &update)
                .await
                .map(|profile| ProfileResponse {
                    profile,
                    user: None,
                })
        },
        &UPDATE_PROFILE_ERRORS,
    )
    .await
}
