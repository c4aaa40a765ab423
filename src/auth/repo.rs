use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;

use crate::auth::repo_types::{NewUser, UnknownRole, User, UserRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("stored row is invalid: {0}")]
    Corrupt(#[from] UnknownRole),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Conflict(db.constraint().unwrap_or("unique").to_string());
            }
        }
        StoreError::Database(e)
    }
}

/// Persistence seam for user accounts and their refresh session.
///
/// Every method is a single statement; callers must not assume two calls
/// observe a consistent snapshot.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Every user whose username or phone equals `login`, oldest first.
    async fn find_by_login(&self, login: &str) -> Result<Vec<User>, StoreError>;
    /// Only returns a user whose stored token equals `token` and expires after `now`.
    async fn find_by_refresh_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    /// Overwrites any previous session.
    async fn set_refresh_token(
        &self,
        id: i32,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;
    /// Replaces the session only while it still holds `current`. Returns
    /// `false` when another writer got there first.
    async fn rotate_refresh_token(
        &self,
        id: i32,
        current: &str,
        next: &str,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError>;
    async fn clear_refresh_token(&self, id: i32) -> Result<(), StoreError>;
    async fn update_password(
        &self,
        id: i32,
        password_hash: &str,
        password_valid: bool,
    ) -> Result<(), StoreError>;
}

const SELECT_USER: &str = r#"
    SELECT user_id, user_name, email, phone, pass, pss_valid, role,
           refresh_token, refresh_token_exp, created_at, updated_at
    FROM users
"#;

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        arg: &str,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!("{SELECT_USER} WHERE {clause} LIMIT 1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(arg)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::try_from).transpose()?)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (user_name, email, phone, pass, role, pss_valid)
            VALUES ($1, $2, $3, $4, $5, true)
            RETURNING user_id, user_name, email, phone, pass, pss_valid, role,
                      refresh_token, refresh_token_exp, created_at, updated_at
            "#,
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(User::try_from(row)?)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        let sql = format!("{SELECT_USER} WHERE user_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_where("email = $1", email).await
    }

    async fn find_by_login(&self, login: &str) -> Result<Vec<User>, StoreError> {
        let sql = format!("{SELECT_USER} WHERE user_name = $1 OR phone = $1 ORDER BY user_id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(login)
            .fetch_all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_by_refresh_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "{SELECT_USER} WHERE refresh_token = $1 AND refresh_token <> '' \
             AND refresh_token_exp > $2 LIMIT 1"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("{SELECT_USER} ORDER BY user_id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn set_refresh_token(
        &self,
        id: i32,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $1, refresh_token_exp = $2, updated_at = now()
            WHERE user_id = $3
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: i32,
        current: &str,
        next: &str,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $1, refresh_token_exp = $2, updated_at = now()
            WHERE user_id = $3 AND refresh_token = $4
            "#,
        )
        .bind(next)
        .bind(expires_at)
        .bind(id)
        .bind(current)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn clear_refresh_token(&self, id: i32) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = '', refresh_token_exp = NULL, updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn update_password(
        &self,
        id: i32,
        password_hash: &str,
        password_valid: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET pass = $1, pss_valid = $2, updated_at = now()
            WHERE user_id = $3
            "#,
        )
        .bind(password_hash)
        .bind(password_valid)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::Mutex;

    use super::*;

    /// Vec-backed store with the same conflict and session rules as Postgres.
    #[derive(Default)]
    pub struct MemoryUserStore {
        users: Mutex<Vec<User>>,
    }

    impl MemoryUserStore {
        fn with_user<T>(&self, id: i32, f: impl FnOnce(&mut User) -> T) -> Option<T> {
            let mut users = self.users.lock().expect("user store poisoned");
            users.iter_mut().find(|u| u.id == id).map(f)
        }

        fn find(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
            let users = self.users.lock().expect("user store poisoned");
            users.iter().find(|u| pred(u)).cloned()
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn create(&self, new: NewUser) -> Result<User, StoreError> {
            let mut users = self.users.lock().expect("user store poisoned");
            if users.iter().any(|u| u.email == new.email) {
                return Err(StoreError::Conflict("users_email_key".into()));
            }
            let now = OffsetDateTime::now_utc();
            let user = User {
                id: users.len() as i32 + 1,
                username: new.username,
                email: new.email,
                phone: new.phone,
                password_hash: new.password_hash,
                password_valid: true,
                role: new.role,
                refresh_token: String::new(),
                refresh_token_exp: None,
                created_at: now,
                updated_at: now,
            };
            users.push(user.clone());
            Ok(user)
        }

        async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
            Ok(self.find(|u| u.id == id))
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            Ok(self.find(|u| u.email == email))
        }

        async fn find_by_login(&self, login: &str) -> Result<Vec<User>, StoreError> {
            let users = self.users.lock().expect("user store poisoned");
            Ok(users
                .iter()
                .filter(|u| u.username == login || u.phone == login)
                .cloned()
                .collect())
        }

        async fn find_by_refresh_token(
            &self,
            token: &str,
            now: OffsetDateTime,
        ) -> Result<Option<User>, StoreError> {
            Ok(self.find(|u| {
                !u.refresh_token.is_empty()
                    && u.refresh_token == token
                    && u.refresh_token_exp.map_or(false, |exp| exp > now)
            }))
        }

        async fn list(&self) -> Result<Vec<User>, StoreError> {
            Ok(self.users.lock().expect("user store poisoned").clone())
        }

        async fn set_refresh_token(
            &self,
            id: i32,
            token: &str,
            expires_at: OffsetDateTime,
        ) -> Result<(), StoreError> {
            self.with_user(id, |u| {
                u.refresh_token = token.to_string();
                u.refresh_token_exp = Some(expires_at);
                u.updated_at = OffsetDateTime::now_utc();
            });
            Ok(())
        }

        async fn rotate_refresh_token(
            &self,
            id: i32,
            current: &str,
            next: &str,
            expires_at: OffsetDateTime,
        ) -> Result<bool, StoreError> {
            Ok(self
                .with_user(id, |u| {
                    if u.refresh_token != current {
                        return false;
                    }
                    u.refresh_token = next.to_string();
                    u.refresh_token_exp = Some(expires_at);
                    u.updated_at = OffsetDateTime::now_utc();
                    true
                })
                .unwrap_or(false))
        }

        async fn clear_refresh_token(&self, id: i32) -> Result<(), StoreError> {
            self.with_user(id, |u| {
                u.refresh_token.clear();
                u.refresh_token_exp = None;
                u.updated_at = OffsetDateTime::now_utc();
            });
            Ok(())
        }

        async fn update_password(
            &self,
            id: i32,
            password_hash: &str,
            password_valid: bool,
        ) -> Result<(), StoreError> {
            self.with_user(id, |u| {
                u.password_hash = password_hash.to_string();
                u.password_valid = password_valid;
                u.updated_at = OffsetDateTime::now_utc();
            });
            Ok(())
        }
    }

    mod tests {
        use super::*;
        use crate::auth::repo_types::Role;
        use time::Duration;

        fn new_user(email: &str) -> NewUser {
            NewUser {
                username: "a".into(),
                email: email.into(),
                phone: "555".into(),
                password_hash: "hash".into(),
                role: Role::User,
            }
        }

        #[tokio::test]
        async fn duplicate_email_is_a_conflict() {
            let store = MemoryUserStore::default();
            store.create(new_user("a@x.com")).await.unwrap();
            let err = store.create(new_user("a@x.com")).await.unwrap_err();
            assert!(matches!(err, StoreError::Conflict(_)));
        }

        #[tokio::test]
        async fn rotation_requires_the_current_token() {
            let store = MemoryUserStore::default();
            let user = store.create(new_user("a@x.com")).await.unwrap();
            let exp = OffsetDateTime::now_utc() + Duration::hours(1);
            store.set_refresh_token(user.id, "one", exp).await.unwrap();

            assert!(!store.rotate_refresh_token(user.id, "stale", "two", exp).await.unwrap());
            assert!(store.rotate_refresh_token(user.id, "one", "two", exp).await.unwrap());
            assert!(store
                .find_by_refresh_token("one", OffsetDateTime::now_utc())
                .await
                .unwrap()
                .is_none());
        }

        #[tokio::test]
        async fn expired_or_cleared_sessions_are_not_found() {
            let store = MemoryUserStore::default();
            let user = store.create(new_user("a@x.com")).await.unwrap();
            let now = OffsetDateTime::now_utc();
            store
                .set_refresh_token(user.id, "tok", now - Duration::seconds(1))
                .await
                .unwrap();
            assert!(store.find_by_refresh_token("tok", now).await.unwrap().is_none());

            store
                .set_refresh_token(user.id, "tok", now + Duration::hours(1))
                .await
                .unwrap();
            assert!(store.find_by_refresh_token("tok", now).await.unwrap().is_some());

            store.clear_refresh_token(user.id).await.unwrap();
            assert!(store.find_by_refresh_token("", now).await.unwrap().is_none());
        }
    }
}
