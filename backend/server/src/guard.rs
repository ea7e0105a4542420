//! # Guard
//!
//! Every operation runs the same pipeline:
//!
//! 1. **validate**: reject malformed input before any collaborator round trip
//! 2. **authenticate**: resolve the bearer token into a [`Caller`] (authenticated operations only)
//! 3. **call**: delegate to the collaborator
//! 4. **map**: classify a collaborator failure through an ordered [`ErrorMap`]
//!
//! Log lines carry `[operation:stage]` so a failing request can be traced to the stage that
//! rejected it.
use std::future::Future;

use tracing::{debug, error, warn};

use crate::{
    error::{AppError, ErrorKind},
    models::Caller,
    provider::{Provider, ProviderError},
    state::AppState,
};

const UNAVAILABLE: &str = "Service temporarily unavailable. Please try again later";

pub enum Match {
    /// Every needle must appear in the collaborator's message.
    Message(&'static [&'static str]),
    Code(&'static str),
}

pub struct Rule {
    matches: Match,
    kind: ErrorKind,
    message: &'static str,
}

impl Rule {
    pub const fn message(
        needles: &'static [&'static str],
        kind: ErrorKind,
        message: &'static str,
    ) -> Self {
        Self {
            matches: Match::Message(needles),
            kind,
            message,
        }
    }

    pub const fn code(code: &'static str, kind: ErrorKind, message: &'static str) -> Self {
        Self {
            matches: Match::Code(code),
            kind,
            message,
        }
    }

    fn applies(&self, error: &ProviderError) -> bool {
        match self.matches {
            Match::Message(needles) => needles
                .iter()
                .all(|needle| error.message().contains(needle)),
            Match::Code(code) => error.code() == Some(code),
        }
    }
}

pub enum Fallback {
    Fixed(ErrorKind, &'static str),
    /// Forwards the collaborator's own message, or the default when it is blank.
    Passthrough(ErrorKind, &'static str),
}

pub struct ErrorMap {
    pub rules: &'static [Rule],
    pub unreachable: ErrorKind,
    pub fallback: Fallback,
}

pub const PERMISSION_DENIED: Rule =
    Rule::message(&["permission denied"], ErrorKind::Forbidden, "Access denied");

pub const MISSING_TABLE: Rule = Rule::message(
    &["relation", "does not exist"],
    ErrorKind::ServiceMisconfigured,
    "Database table not found. Please run database setup",
);

pub const AUTH_ERRORS: ErrorMap = ErrorMap {
    rules: &[],
    unreachable: ErrorKind::InternalError,
    fallback: Fallback::Fixed(ErrorKind::Unauthorized, "Authentication failed"),
};

impl ErrorMap {
    /// First rule that applies, ignoring the fallback.
    pub fn matching(&self, error: &ProviderError) -> Option<AppError> {
        self.rules
            .iter()
            .find(|rule| rule.applies(error))
            .map(|rule| rule.kind.with(rule.message))
    }

    pub fn classify(&self, error: &ProviderError) -> AppError {
        if error.is_unreachable() {
            return self.unavailable();
        }

        self.matching(error).unwrap_or_else(|| match self.fallback {
            Fallback::Fixed(kind, message) => kind.with(message),
            Fallback::Passthrough(kind, default) => match error.message().trim() {
                "" => kind.with(default),
                message => kind.with(message),
            },
        })
    }

    pub fn unavailable(&self) -> AppError {
        self.unreachable.with(UNAVAILABLE)
    }
}

pub fn validated<V>(
    operation: &'static str,
    validate: impl FnOnce() -> Result<V, AppError>,
) -> Result<V, AppError> {
    validate().inspect_err(|e| debug!("[{operation}:validate] rejected: {e}"))
}

pub fn connect<'a>(
    operation: &'static str,
    state: &'a AppState,
    errors: &ErrorMap,
) -> Result<&'a dyn Provider, AppError> {
    state.provider().ok_or_else(|| {
        error!("[{operation}:call] collaborator not configured");
        errors.unavailable()
    })
}

pub async fn call<T>(
    operation: &'static str,
    request: impl Future<Output = Result<T, ProviderError>>,
    errors: &ErrorMap,
) -> Result<T, AppError> {
    debug!("[{operation}:call] delegating to collaborator");

    request.await.map_err(|error| {
        let mapped = errors.classify(&error);
        warn!("[{operation}:map] {error} -> {:?}", mapped.kind());

        mapped
    })
}

pub async fn authenticate(
    operation: &'static str,
    provider: &dyn Provider,
    access_token: Option<&str>,
) -> Result<Caller, AppError> {
    let Some(access_token) = access_token else {
        debug!("[{operation}:validate] no bearer token");
        return Err(AppError::Unauthorized("Authentication required".to_string()));
    };

    match call(operation, provider.get_user(access_token), &AUTH_ERRORS).await? {
        Some(user) => Ok(Caller {
            user,
            access_token: access_token.to_string(),
        }),
        None => Err(AppError::Unauthorized("User not found".to_string())),
    }
}

/// Validate, then delegate without a caller.
pub async fn guard<'a, V, T, D, Fut>(
    operation: &'static str,
    state: &'a AppState,
    validate: impl FnOnce() -> Result<V, AppError>,
    delegate: D,
    errors: &ErrorMap,
) -> Result<T, AppError>
where
    D: FnOnce(&'a dyn Provider, V) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let input = validated(operation, validate)?;
    let provider = connect(operation, state, errors)?;

    call(operation, delegate(provider, input), errors).await
}

/// Validate, authenticate, then delegate on behalf of the caller.
pub async fn guard_caller<'a, V, T, D, Fut>(
    operation: &'static str,
    state: &'a AppState,
    access_token: Option<&str>,
    validate: impl FnOnce() -> Result<V, AppError>,
    delegate: D,
    errors: &ErrorMap,
) -> Result<T, AppError>
where
    D: FnOnce(&'a dyn Provider, Caller, V) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let input = validated(operation, validate)?;
    let provider = connect(operation, state, errors)?;
    let caller = authenticate(operation, provider, access_token).await?;

    call(operation, delegate(provider, caller, input), errors).await
}
