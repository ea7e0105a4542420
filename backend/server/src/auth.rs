use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, ErrorKind},
    guard::{ErrorMap, Fallback, Rule, guard},
    models::{Session, SignUp, User},
    state::AppState,
    utils::present,
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub const SIGN_UP_ERRORS: ErrorMap = ErrorMap {
    rules: &[
        Rule::message(
            &["already registered"],
            ErrorKind::Conflict,
            "An account with this email already exists",
        ),
        Rule::message(
            &["invalid email"],
            ErrorKind::InvalidInput,
            "Please provide a valid email address",
        ),
        Rule::message(
            &["weak password"],
            ErrorKind::InvalidInput,
            "Password is too weak. Please choose a stronger password",
        ),
    ],
    unreachable: ErrorKind::ServiceUnavailable,
    fallback: Fallback::Passthrough(ErrorKind::InvalidInput, "Failed to create account"),
};

pub const SIGN_IN_ERRORS: ErrorMap = ErrorMap {
    rules: &[
        Rule::message(
            &["Invalid login credentials"],
            ErrorKind::Unauthorized,
            "Invalid email or password",
        ),
        Rule::message(
            &["Email not confirmed"],
            ErrorKind::Unauthorized,
            "Please check your email and confirm your account",
        ),
        Rule::message(
            &["Too many requests"],
            ErrorKind::RateLimited,
            "Too many login attempts. Please try again later",
        ),
    ],
    unreachable: ErrorKind::InternalError,
    fallback: Fallback::Passthrough(ErrorKind::InvalidInput, "Failed to sign in"),
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpPayload {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignInPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub message: &'static str,
    pub user: User,
    pub session: Session,
}

fn credentials(
    email: Option<String>,
    password: Option<String>,
) -> Result<(String, String), AppError> {
    // passwords are taken verbatim, only checked for presence
    match (present(email), password.filter(|password| !password.is_empty())) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => Err(AppError::InvalidInput(
            "Email and password are required".to_string(),
        )),
    }
}

pub fn validate_sign_up(payload: SignUpPayload) -> Result<SignUp, AppError> {
    let (email, password) = credentials(payload.email, payload.password)?;

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    Ok(SignUp {
        email,
        password,
        full_name: present(payload.full_name),
        phone: present(payload.phone),
    })
}

pub async fn sign_up(state: &AppState, payload: SignUpPayload) -> Result<SignUpResponse, AppError> {
    let user = guard(
        "auth.sign_up",
        state,
        || validate_sign_up(payload),
        |provider, sign_up: SignUp| async move { provider.sign_up(&sign_up).await },
        &SIGN_UP_ERRORS,
    )
    .await?;

    Ok(SignUpResponse {
        message: "User created successfully",
        user,
    })
}

pub async fn sign_in(state: &AppState, payload: SignInPayload) -> Result<SignInResponse, AppError> {
    let signed_in = guard(
        "auth.sign_in",
        state,
        || credentials(payload.email, payload.password),
        |provider, (email, password): (String, String)| async move {
            provider.sign_in(&email, &password).await
        },
        &SIGN_IN_ERRORS,
    )
    .await?;

    Ok(SignInResponse {
        message: "Signed in successfully",
        user: signed_in.user,
        session: signed_in.session,
    })
}
