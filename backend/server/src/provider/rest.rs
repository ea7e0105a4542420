use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode,
    header::{ACCEPT, CONTENT_RANGE, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{ImageObject, Provider, ProviderError};
use crate::models::{
    Caller, CountFilter, FoodTestRecord, NewFoodTest, Profile, ProfileUpdate, ResultStatus,
    Session, SignUp, SignedIn, TestQuery, User, clamp_confidence, join_recommendations,
    split_recommendations,
};

const PROFILES: &str = "profiles";
const FOOD_TESTS: &str = "food_tests";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RestProvider {
    client: Client,
    base_url: String,
    anon_key: String,
    bucket: String,
}

impl RestProvider {
    pub fn new(base_url: &str, anon_key: &str, bucket: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            bucket: bucket.to_string(),
        })
    }

    fn request(&self, method: Method, url: String, access_token: Option<&str>) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }

    fn auth(&self, method: Method, path: &str, access_token: Option<&str>) -> RequestBuilder {
        self.request(
            method,
            format!("{}/auth/v1/{path}", self.base_url),
            access_token,
        )
    }

    fn table(&self, method: Method, table: &str, caller: &Caller) -> RequestBuilder {
        self.request(
            method,
            format!("{}/rest/v1/{table}", self.base_url),
            Some(&caller.access_token),
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            ProviderError::Unreachable(error.to_string())
        } else {
            ProviderError::rejected(error.to_string())
        }
    }
}

/// Union of the error bodies GoTrue, PostgREST and Storage send back.
#[derive(Deserialize, Default)]
struct ErrorBody {
    code: Option<Value>,
    error_code: Option<String>,
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

async fn rejection(response: Response) -> ProviderError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();

    let code = match body.code {
        Some(Value::String(code)) => Some(code),
        Some(Value::Number(code)) => Some(code.to_string()),
        _ => body.error_code,
    };

    let mut message = body
        .message
        .or(body.msg)
        .or(body.error_description)
        .or(body.error)
        .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });

    if status == StatusCode::TOO_MANY_REQUESTS && !message.contains("Too many requests") {
        message = format!("Too many requests: {message}");
    }

    ProviderError::Rejected { code, message }
}

async fn checked(response: Response) -> Result<Response, ProviderError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(rejection(response).await)
    }
}

async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    Ok(checked(response).await?.json::<T>().await?)
}

#[derive(Deserialize)]
struct WireUser {
    id: Uuid,
    email: Option<String>,
}

impl From<WireUser> for User {
    fn from(user: WireUser) -> Self {
        User {
            id: user.id,
            email: user.email,
        }
    }
}

/// Sign-up answers with a bare user, or with a session when e-mail confirmation is off.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpReply {
    WithSession { user: WireUser },
    User(WireUser),
}

#[derive(Deserialize)]
struct TokenReply {
    access_token: String,
    token_type: String,
    expires_in: u64,
    refresh_token: Option<String>,
    user: WireUser,
}

#[derive(Deserialize)]
struct ProfileRow {
    id: Uuid,
    full_name: Option<String>,
    phone: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            full_name: row.full_name.unwrap_or_default(),
            phone: row.phone,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Serialize)]
struct ProfilePatch<'a> {
    full_name: &'a str,
    phone: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct FoodTestRow {
    id: Uuid,
    user_id: Uuid,
    category: String,
    item_name: String,
    test_type: String,
    image_url: String,
    result_status: ResultStatus,
    confidence_score: Option<i64>,
    adulterants_detected: Option<Vec<String>>,
    recommendations: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<FoodTestRow> for FoodTestRecord {
    fn from(row: FoodTestRow) -> Self {
        FoodTestRecord {
            id: row.id,
            user_id: row.user_id,
            category: row.category,
            item_name: row.item_name,
            test_type: row.test_type,
            image_url: row.image_url,
            result_status: row.result_status,
            confidence_score: row.confidence_score.map(clamp_confidence),
            adulterants_detected: row.adulterants_detected.unwrap_or_default(),
            recommendations: split_recommendations(row.recommendations.as_deref().unwrap_or("")),
            created_at: row.created_at,
        }
    }
}

#[derive(Serialize)]
struct FoodTestInsert<'a> {
    user_id: Uuid,
    category: &'a str,
    item_name: &'a str,
    test_type: &'a str,
    image_url: &'a str,
    result_status: ResultStatus,
    confidence_score: Option<u8>,
    adulterants_detected: &'a [String],
    recommendations: String,
}

fn count_params(user_id: Uuid, filter: CountFilter) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("select", "id".to_string()),
        ("user_id", format!("eq.{user_id}")),
    ];

    if let Some(since) = filter.since {
        params.push((
            "created_at",
            format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ));
    }

    if let Some(status) = filter.status {
        params.push(("result_status", format!("eq.{status}")));
    }

    params
}

/// `Content-Range: 0-0/42` or `*/0`.
fn total_from_range(response: &Response) -> Result<u64, ProviderError> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.rsplit('/').next())
        .and_then(|total| total.parse().ok())
        .ok_or_else(|| ProviderError::rejected("Count missing from Content-Range"))
}

#[async_trait]
impl Provider for RestProvider {
    async fn sign_up(&self, sign_up: &SignUp) -> Result<User, ProviderError> {
        let body = json!({
            "email": sign_up.email,
            "password": sign_up.password,
            "data": {
                "full_name": sign_up.full_name,
                "phone": sign_up.phone,
            },
        });

        let response = self
            .auth(Method::POST, "signup", None)
            .json(&body)
            .send()
            .await?;

        Ok(match read::<SignUpReply>(response).await? {
            SignUpReply::WithSession { user } | SignUpReply::User(user) => user.into(),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, ProviderError> {
        let response = self
            .auth(Method::POST, "token?grant_type=password", None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let reply: TokenReply = read(response).await?;

        Ok(SignedIn {
            user: reply.user.into(),
            session: Session {
                access_token: reply.access_token,
                token_type: reply.token_type,
                expires_in: reply.expires_in,
                refresh_token: reply.refresh_token,
            },
        })
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<User>, ProviderError> {
        let response = self
            .auth(Method::GET, "user", Some(access_token))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(read::<WireUser>(response).await?.into()))
    }

    async fn get_profile(&self, caller: &Caller) -> Result<Profile, ProviderError> {
        let response = self
            .table(Method::GET, PROFILES, caller)
            .header(ACCEPT, SINGLE_OBJECT)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", caller.id()))])
            .send()
            .await?;

        Ok(read::<ProfileRow>(response).await?.into())
    }

    async fn update_profile(
        &self,
        caller: &Caller,
        update: &ProfileUpdate,
    ) -> Result<Profile, ProviderError> {
        let patch = ProfilePatch {
            full_name: &update.full_name,
            phone: update.phone.as_deref(),
            updated_at: update.updated_at,
        };

        let response = self
            .table(Method::PATCH, PROFILES, caller)
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", caller.id()))])
            .json(&patch)
            .send()
            .await?;

        Ok(read::<ProfileRow>(response).await?.into())
    }

    async fn insert_test(
        &self,
        caller: &Caller,
        test: &NewFoodTest,
    ) -> Result<FoodTestRecord, ProviderError> {
        let row = FoodTestInsert {
            user_id: caller.id(),
            category: &test.category,
            item_name: &test.item_name,
            test_type: &test.test_type,
            image_url: &test.image_url,
            result_status: test.result_status,
            confidence_score: test.confidence_score,
            adulterants_detected: &test.adulterants_detected,
            recommendations: join_recommendations(&test.recommendations),
        };

        let response = self
            .table(Method::POST, FOOD_TESTS, caller)
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        Ok(read::<FoodTestRow>(response).await?.into())
    }

    async fn list_tests(
        &self,
        caller: &Caller,
        query: &TestQuery,
    ) -> Result<Vec<FoodTestRecord>, ProviderError> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", caller.id())),
            ("order", "created_at.desc".to_string()),
            ("limit", query.limit.to_string()),
        ];

        if let Some(category) = &query.category {
            params.push(("category", format!("eq.{category}")));
        }

        let response = self
            .table(Method::GET, FOOD_TESTS, caller)
            .query(&params)
            .send()
            .await?;

        let rows: Vec<FoodTestRow> = read(response).await?;

        Ok(rows.into_iter().map(FoodTestRecord::from).collect())
    }

    async fn count_tests(&self, caller: &Caller, filter: CountFilter) -> Result<u64, ProviderError> {
        // one row at most, the total comes from Content-Range
        let response = self
            .table(Method::GET, FOOD_TESTS, caller)
            .header("Prefer", "count=exact")
            .header("Range-Unit", "items")
            .header("Range", "0-0")
            .query(&count_params(caller.id(), filter))
            .send()
            .await?;

        total_from_range(&checked(response).await?)
    }

    async fn upload(&self, caller: &Caller, object: ImageObject) -> Result<(), ProviderError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, object.key
        );

        let response = self
            .request(Method::POST, url, Some(&caller.access_token))
            .header(CONTENT_TYPE, object.content_type)
            .header("x-upsert", "false")
            .body(object.bytes)
            .send()
            .await?;

        checked(response).await.map(|_| ())
    }

    fn public_url(&self, key: &str) -> Option<String> {
        if key.is_empty() {
            return None;
        }

        Some(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        ))
    }
}
