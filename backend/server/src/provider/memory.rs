use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::{ImageObject, NO_ROWS_CODE, Provider, ProviderError};
use crate::models::{
    Caller, CountFilter, FoodTestRecord, NewFoodTest, Profile, ProfileUpdate, Session, SignUp,
    SignedIn, TestQuery, User,
};

const SESSION_TTL_SECS: u64 = 60 * 60;

/// Collaborator calls that can be made to fail once through [`MemoryProvider::inject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SignUp,
    SignIn,
    GetUser,
    GetProfile,
    UpdateProfile,
    InsertTest,
    ListTests,
    CountTests,
    Upload,
}

struct Account {
    user_id: Uuid,
    password: String,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, Uuid>,
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, Profile>,
    tests: Vec<FoodTestRecord>,
    objects: HashMap<String, ImageObject>,
    faults: HashMap<Operation, ProviderError>,
}

impl Tables {
    fn fault(&mut self, operation: Operation) -> Result<(), ProviderError> {
        match self.faults.remove(&operation) {
            Some(error) => {
                debug!("Injected fault for {operation:?}: {error}");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn owned_tests(&self, user_id: Uuid) -> impl DoubleEndedIterator<Item = &FoodTestRecord> {
        self.tests.iter().filter(move |test| test.user_id == user_id)
    }
}

pub struct MemoryProvider {
    bucket: String,
    public_base_url: String,
    tables: Mutex<Tables>,
}

impl MemoryProvider {
    pub fn new(public_base_url: &str, bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            tables: Mutex::new(Tables::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next call of `operation` fails with `error`.
    pub fn inject(&self, operation: Operation, error: ProviderError) {
        self.lock().faults.insert(operation, error);
    }

    /// Inserts a row with an explicit creation time, bypassing the clock.
    pub fn insert_at(
        &self,
        user_id: Uuid,
        test: NewFoodTest,
        created_at: DateTime<Utc>,
    ) -> FoodTestRecord {
        let record = new_record(user_id, test, created_at);
        self.lock().tests.push(record.clone());

        record
    }

    pub fn tests(&self) -> Vec<FoodTestRecord> {
        self.lock().tests.clone()
    }

    pub fn object(&self, key: &str) -> Option<ImageObject> {
        self.lock().objects.get(key).cloned()
    }
}

fn new_record(user_id: Uuid, test: NewFoodTest, created_at: DateTime<Utc>) -> FoodTestRecord {
    FoodTestRecord {
        id: Uuid::new_v4(),
        user_id,
        category: test.category,
        item_name: test.item_name,
        test_type: test.test_type,
        image_url: test.image_url,
        result_status: test.result_status,
        confidence_score: test.confidence_score,
        adulterants_detected: test.adulterants_detected,
        recommendations: test.recommendations,
        created_at,
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

fn no_rows() -> ProviderError {
    ProviderError::with_code(
        NO_ROWS_CODE,
        "JSON object requested, multiple (or no) rows returned",
    )
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn sign_up(&self, sign_up: &SignUp) -> Result<User, ProviderError> {
        let mut tables = self.lock();
        tables.fault(Operation::SignUp)?;

        let email = sign_up.email.trim().to_lowercase();
        if !is_plausible_email(&email) {
            return Err(ProviderError::rejected(
                "Unable to validate email address: invalid email format",
            ));
        }

        if tables.accounts.contains_key(&email) {
            return Err(ProviderError::rejected("User already registered"));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.clone()),
        };

        let full_name = sign_up
            .full_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        tables.profiles.insert(
            user.id,
            Profile {
                id: user.id,
                full_name,
                phone: sign_up.phone.clone(),
                updated_at: Some(Utc::now()),
            },
        );
        tables.accounts.insert(
            email,
            Account {
                user_id: user.id,
                password: sign_up.password.clone(),
            },
        );
        tables.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, ProviderError> {
        let mut tables = self.lock();
        tables.fault(Operation::SignIn)?;

        let user_id = match tables.accounts.get(&email.trim().to_lowercase()) {
            Some(account) if account.password == password => account.user_id,
            _ => return Err(ProviderError::rejected("Invalid login credentials")),
        };

        let user = tables
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| ProviderError::rejected("Invalid login credentials"))?;

        let access_token = Uuid::new_v4().simple().to_string();
        tables.sessions.insert(access_token.clone(), user_id);

        Ok(SignedIn {
            user,
            session: Session {
                access_token,
                token_type: "bearer".to_string(),
                expires_in: SESSION_TTL_SECS,
                refresh_token: Some(Uuid::new_v4().simple().to_string()),
            },
        })
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<User>, ProviderError> {
        let mut tables = self.lock();
        tables.fault(Operation::GetUser)?;

        let user_id = tables
            .sessions
            .get(access_token)
            .copied()
            .ok_or_else(|| ProviderError::rejected("invalid JWT: session not found"))?;

        Ok(tables.users.get(&user_id).cloned())
    }

    async fn get_profile(&self, caller: &Caller) -> Result<Profile, ProviderError> {
        let mut tables = self.lock();
        tables.fault(Operation::GetProfile)?;

        tables.profiles.get(&caller.id()).cloned().ok_or_else(no_rows)
    }

    async fn update_profile(
        &self,
        caller: &Caller,
        update: &ProfileUpdate,
    ) -> Result<Profile, ProviderError> {
        let mut tables = self.lock();
        tables.fault(Operation::UpdateProfile)?;

        let profile = tables.profiles.get_mut(&caller.id()).ok_or_else(no_rows)?;
        profile.full_name = update.full_name.clone();
        profile.phone = update.phone.clone();
        profile.updated_at = Some(update.updated_at);

        Ok(profile.clone())
    }

    async fn insert_test(
        &self,
        caller: &Caller,
        test: &NewFoodTest,
    ) -> Result<FoodTestRecord, ProviderError> {
        let mut tables = self.lock();
        tables.fault(Operation::InsertTest)?;

        if !tables.users.contains_key(&caller.id()) {
            return Err(ProviderError::with_code(
                "23503",
                "insert or update on table \"food_tests\" violates foreign key constraint \"food_tests_user_id_fkey\"",
            ));
        }

        let record = new_record(caller.id(), test.clone(), Utc::now());
        tables.tests.push(record.clone());

        Ok(record)
    }

    async fn list_tests(
        &self,
        caller: &Caller,
        query: &TestQuery,
    ) -> Result<Vec<FoodTestRecord>, ProviderError> {
        let mut tables = self.lock();
        tables.fault(Operation::ListTests)?;

        // Newest insert first among equal timestamps.
        let mut tests: Vec<FoodTestRecord> = tables
            .owned_tests(caller.id())
            .filter(|test| match &query.category {
                Some(category) => &test.category == category,
                None => true,
            })
            .rev()
            .cloned()
            .collect();

        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tests.truncate(query.limit);

        Ok(tests)
    }

    async fn count_tests(&self, caller: &Caller, filter: CountFilter) -> Result<u64, ProviderError> {
        let mut tables = self.lock();
        tables.fault(Operation::CountTests)?;

        let count = tables
            .owned_tests(caller.id())
            .filter(|test| filter.since.is_none_or(|since| test.created_at >= since))
            .filter(|test| filter.status.is_none_or(|status| test.result_status == status))
            .count();

        Ok(count as u64)
    }

    async fn upload(&self, _caller: &Caller, object: ImageObject) -> Result<(), ProviderError> {
        let mut tables = self.lock();
        tables.fault(Operation::Upload)?;

        if tables.objects.contains_key(&object.key) {
            return Err(ProviderError::rejected("The resource already exists"));
        }

        tables.objects.insert(object.key.clone(), object);

        Ok(())
    }

    fn public_url(&self, key: &str) -> Option<String> {
        Some(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.public_base_url, self.bucket, key
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{MemoryProvider, Operation};
    use crate::{
        models::{Caller, CountFilter, NewFoodTest, ResultStatus, SignUp, TestQuery},
        provider::{NO_ROWS_CODE, Provider, ProviderError},
    };

    fn sign_up(email: &str) -> SignUp {
        SignUp {
            email: email.to_string(),
            password: "hunter22".to_string(),
            full_name: Some("Asha Rao".to_string()),
            phone: None,
        }
    }

    fn sample(category: &str) -> NewFoodTest {
        NewFoodTest {
            category: category.to_string(),
            item_name: "milk".to_string(),
            test_type: "visual_analysis".to_string(),
            image_url: "https://cdn.example.com/a.jpg".to_string(),
            result_status: ResultStatus::Pure,
            confidence_score: Some(94),
            adulterants_detected: Vec::new(),
            recommendations: vec!["Safe for consumption".to_string()],
        }
    }

    async fn caller(provider: &MemoryProvider, email: &str) -> Caller {
        provider.sign_up(&sign_up(email)).await.unwrap();
        let signed_in = provider.sign_in(email, "hunter22").await.unwrap();

        Caller {
            user: signed_in.user,
            access_token: signed_in.session.access_token,
        }
    }

    #[tokio::test]
    async fn test_duplicate_sign_up() {
        let provider = MemoryProvider::new("http://localhost:1111", "food-images");

        provider.sign_up(&sign_up("a@b.co")).await.unwrap();
        let error = provider.sign_up(&sign_up("A@B.co")).await.unwrap_err();

        assert_eq!(error.message(), "User already registered");
    }

    #[tokio::test]
    async fn test_sign_in_and_session() {
        let provider = MemoryProvider::new("http://localhost:1111", "food-images");
        let caller = caller(&provider, "a@b.co").await;

        let user = provider.get_user(&caller.access_token).await.unwrap();
        assert_eq!(user.map(|user| user.id), Some(caller.id()));

        let error = provider.sign_in("a@b.co", "wrong-password").await.unwrap_err();
        assert_eq!(error.message(), "Invalid login credentials");

        assert!(provider.get_user("forged").await.is_err());
    }

    #[tokio::test]
    async fn test_profile_created_at_sign_up() {
        let provider = MemoryProvider::new("http://localhost:1111", "food-images");
        let caller = caller(&provider, "a@b.co").await;

        let profile = provider.get_profile(&caller).await.unwrap();
        assert_eq!(profile.id, caller.id());
        assert_eq!(profile.full_name, "Asha Rao");
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_ordered() {
        let provider = MemoryProvider::new("http://localhost:1111", "food-images");
        let alice = caller(&provider, "alice@b.co").await;
        let bob = caller(&provider, "bob@b.co").await;

        let now = Utc::now();
        provider.insert_at(alice.id(), sample("honey"), now - Duration::days(2));
        provider.insert_at(alice.id(), sample("spices"), now);
        provider.insert_at(alice.id(), sample("honey"), now - Duration::days(1));
        provider.insert_at(bob.id(), sample("honey"), now);

        let query = TestQuery {
            limit: 10,
            category: None,
        };
        let tests = provider.list_tests(&alice, &query).await.unwrap();
        assert_eq!(tests.len(), 3);
        assert!(tests.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert!(tests.iter().all(|test| test.user_id == alice.id()));

        let query = TestQuery {
            limit: 1,
            category: Some("honey".to_string()),
        };
        let tests = provider.list_tests(&alice, &query).await.unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].created_at, now - Duration::days(1));
    }

    #[tokio::test]
    async fn test_count_filters() {
        let provider = MemoryProvider::new("http://localhost:1111", "food-images");
        let alice = caller(&provider, "alice@b.co").await;
        let bob = caller(&provider, "bob@b.co").await;

        let now = Utc::now();
        let mut adulterated = sample("honey");
        adulterated.result_status = ResultStatus::Adulterated;

        provider.insert_at(alice.id(), sample("honey"), now - Duration::days(9));
        provider.insert_at(alice.id(), sample("honey"), now);
        provider.insert_at(alice.id(), adulterated.clone(), now);
        provider.insert_at(bob.id(), adulterated, now);

        let recent = now - Duration::days(7);
        let cases = [
            (None, None, 3),
            (Some(recent), None, 2),
            (None, Some(ResultStatus::Pure), 2),
            (Some(recent), Some(ResultStatus::Adulterated), 1),
        ];

        for (since, status, expected) in cases {
            let filter = CountFilter { since, status };
            assert_eq!(provider.count_tests(&alice, filter).await.unwrap(), expected, "{filter:?}");
        }
    }

    #[tokio::test]
    async fn test_profile_update_sets_timestamp() {
        let provider = MemoryProvider::new("http://localhost:1111", "food-images");
        let caller = caller(&provider, "a@b.co").await;
        let now = Utc::now();

        let update = crate::models::ProfileUpdate {
            full_name: "Asha R".to_string(),
            phone: None,
            updated_at: now,
        };
        let profile = provider.update_profile(&caller, &update).await.unwrap();

        assert_eq!(profile.updated_at, Some(now));
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let provider = MemoryProvider::new("http://localhost:1111", "food-images");
        let caller = caller(&provider, "a@b.co").await;

        provider.inject(
            Operation::GetProfile,
            ProviderError::with_code(NO_ROWS_CODE, "no rows"),
        );

        assert!(provider.get_profile(&caller).await.is_err());
        assert!(provider.get_profile(&caller).await.is_ok());
    }
}
