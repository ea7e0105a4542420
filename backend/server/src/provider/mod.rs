//! # Collaborator
//!
//! Hosted auth + storage + table API this service delegates to. Everything the handlers persist or
//! authenticate goes through [`Provider`].
//!
//! ## Adapters
//! - [`rest::RestProvider`]: Supabase-compatible REST (GoTrue, PostgREST, Storage)
//! - [`memory::MemoryProvider`]: in-process tables with the same error messages, for tests and local runs
//!
//! ## Errors
//! Failures are reported the way the hosted service reports them, as a message plus an optional
//! code. Classification into client-facing errors happens in [`crate::guard`], never here.
use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;

use crate::models::{
    Caller, CountFilter, FoodTestRecord, NewFoodTest, Profile, ProfileUpdate, SignUp, SignedIn,
    TestQuery, User,
};

pub mod memory;
pub mod rest;

/// Code PostgREST returns when a single-row request matched nothing.
pub const NO_ROWS_CODE: &str = "PGRST116";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{message}")]
    Rejected {
        code: Option<String>,
        message: String,
    },

    #[error("Collaborator unreachable: {0}")]
    Unreachable(String),
}

impl ProviderError {
    pub fn rejected(message: impl Into<String>) -> Self {
        ProviderError::Rejected {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Rejected {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProviderError::Rejected { message, .. } => message,
            ProviderError::Unreachable(message) => message,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ProviderError::Rejected { code, .. } => code.as_deref(),
            ProviderError::Unreachable(_) => None,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, ProviderError::Unreachable(_))
    }
}

#[derive(Debug, Clone)]
pub struct ImageObject {
    pub key: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn sign_up(&self, sign_up: &SignUp) -> Result<User, ProviderError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, ProviderError>;

    /// `Ok(None)` when the token is well formed but no longer maps to a user.
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, ProviderError>;

    async fn get_profile(&self, caller: &Caller) -> Result<Profile, ProviderError>;

    async fn update_profile(
        &self,
        caller: &Caller,
        update: &ProfileUpdate,
    ) -> Result<Profile, ProviderError>;

    async fn insert_test(
        &self,
        caller: &Caller,
        test: &NewFoodTest,
    ) -> Result<FoodTestRecord, ProviderError>;

    async fn list_tests(
        &self,
        caller: &Caller,
        query: &TestQuery,
    ) -> Result<Vec<FoodTestRecord>, ProviderError>;

    /// Exact count of the caller's rows, created at or after `filter.since` and with
    /// `filter.status` when set.
    async fn count_tests(&self, caller: &Caller, filter: CountFilter) -> Result<u64, ProviderError>;

    /// Never overwrites: an existing key is reported as `The resource already exists`.
    async fn upload(&self, caller: &Caller, object: ImageObject) -> Result<(), ProviderError>;

    fn public_url(&self, key: &str) -> Option<String>;
}
