//! Credential store access: user rows and the audit trail.

use anyhow::Result;

use crate::db::Db;
use crate::db::schema::{AuditLogCreate, AuditLogRecord, UserCreate, UserRecord};
use crate::types::UserId;

/// User store for database operations.
pub struct UserStore {
    db: Db,
}

impl UserStore {
    /// Create a new user store.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Get a user by canonical email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = email.to_string();

        let query = "SELECT * FROM user WHERE email = $email LIMIT 1";

        let mut res = self.db.query(query).bind(("email", email)).await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Get a user by the public identifier carried in tokens.
    pub async fn get_user_by_id(&self, user_id: &UserId) -> Result<Option<UserRecord>> {
        let query = "SELECT * FROM user WHERE uid = $uid LIMIT 1";

        let mut res = self
            .db
            .query(query)
            .bind(("uid", user_id.clone()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Insert a new user row under a freshly generated identifier.
    ///
    /// Fails if the email is already taken (unique index).
    pub async fn create_user(&self, create: &UserCreate) -> Result<UserRecord> {
        let uid = UserId::generate();

        let query = r#"
            CREATE user CONTENT {
                uid: $uid,
                email: $email,
                password_hash: $password_hash,
                first_name: $first_name,
                last_name: $last_name,
                graduation_year: $graduation_year,
                major: $major,
                is_admin: $is_admin
            }
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("uid", uid))
            .bind(("email", create.email.clone()))
            .bind(("password_hash", create.password_hash.clone()))
            .bind(("first_name", create.first_name.clone()))
            .bind(("last_name", create.last_name.clone()))
            .bind(("graduation_year", create.graduation_year))
            .bind(("major", create.major.clone()))
            .bind(("is_admin", create.is_admin))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Failed to create user"))
    }

    /// Look up only the admin flag. `None` if the user does not exist.
    pub async fn is_admin(&self, user_id: &UserId) -> Result<Option<bool>> {
        Ok(self.get_user_by_id(user_id).await?.map(|u| u.is_admin))
    }

    /// Grant or revoke the admin flag.
    pub async fn set_admin(&self, user_id: &UserId, is_admin: bool) -> Result<()> {
        let query = "UPDATE user SET is_admin = $is_admin WHERE uid = $uid";

        self.db
            .query(query)
            .bind(("uid", user_id.clone()))
            .bind(("is_admin", is_admin))
            .await?
            .check()?;

        Ok(())
    }

    /// Replace the stored password hash.
    pub async fn set_password_hash(&self, user_id: &UserId, password_hash: &str) -> Result<()> {
        let query = "UPDATE user SET password_hash = $password_hash WHERE uid = $uid";

        self.db
            .query(query)
            .bind(("uid", user_id.clone()))
            .bind(("password_hash", password_hash.to_string()))
            .await?
            .check()?;

        Ok(())
    }

    /// Every user, ordered by last then first name.
    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let query = "SELECT * FROM user ORDER BY last_name, first_name";

        let mut res = self.db.query(query).await?;
        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users)
    }

    /// Write an audit log entry.
    pub async fn audit_log(&self, entry: AuditLogCreate) -> Result<()> {
        let query = r#"
            CREATE audit_log CONTENT {
                user_id: $user_id,
                action: $action,
                resource_type: $resource_type,
                resource_id: $resource_id,
                details: $details
            }
        "#;

        self.db
            .query(query)
            .bind(("user_id", entry.user_id))
            .bind(("action", entry.action))
            .bind(("resource_type", entry.resource_type))
            .bind(("resource_id", entry.resource_id))
            .bind(("details", entry.details))
            .await?
            .check()?;

        Ok(())
    }

    /// Get recent audit log entries for a user, newest first.
    pub async fn get_user_audit_log(&self, user_id: &UserId, limit: u32) -> Result<Vec<AuditLogRecord>> {
        let query = r#"
            SELECT * FROM audit_log
            WHERE user_id = $user_id
            ORDER BY created_at DESC
            LIMIT $limit
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("user_id", user_id.to_string()))
            .bind(("limit", limit))
            .await?;

        let logs: Vec<AuditLogRecord> = res.take(0)?;
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::AuditAction;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};

    async fn setup_test_db() -> Db {
        let db = create_connection(DatabaseConfig::memory()).await.unwrap();
        ensure_schema(&db).await.unwrap();
        db
    }

    fn user_create(email: &str) -> UserCreate {
        UserCreate {
            email: email.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            graduation_year: Some(2012),
            major: None,
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let store = UserStore::new(setup_test_db().await);

        let user = store.create_user(&user_create("ada@x.com")).await.unwrap();
        assert_eq!(user.email, "ada@x.com");
        assert_eq!(user.graduation_year, Some(2012));
        assert!(user.major.is_none());
        assert!(!user.is_admin);

        let by_email = store.get_user_by_email("ada@x.com").await.unwrap().unwrap();
        let by_id = store.get_user_by_id(&user.uid).await.unwrap().unwrap();
        assert_eq!(by_email.uid, user.uid);
        assert_eq!(by_id.email, "ada@x.com");
    }

    #[tokio::test]
    async fn test_missing_user_is_none() {
        let store = UserStore::new(setup_test_db().await);

        assert!(store.get_user_by_email("nobody@x.com").await.unwrap().is_none());
        assert!(store.get_user_by_id(&UserId::new("nope")).await.unwrap().is_none());
        assert!(store.is_admin(&UserId::new("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected_by_index() {
        let store = UserStore::new(setup_test_db().await);

        store.create_user(&user_create("ada@x.com")).await.unwrap();
        assert!(store.create_user(&user_create("ada@x.com")).await.is_err());

        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_admin() {
        let store = UserStore::new(setup_test_db().await);
        let user = store.create_user(&user_create("ada@x.com")).await.unwrap();

        store.set_admin(&user.uid, true).await.unwrap();
        assert_eq!(store.is_admin(&user.uid).await.unwrap(), Some(true));

        store.set_admin(&user.uid, false).await.unwrap();
        assert_eq!(store.is_admin(&user.uid).await.unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_list_users_ordered_by_last_name() {
        let store = UserStore::new(setup_test_db().await);

        let mut turing = user_create("alan@x.com");
        turing.first_name = "Alan".to_string();
        turing.last_name = "Turing".to_string();
        store.create_user(&turing).await.unwrap();
        store.create_user(&user_create("ada@x.com")).await.unwrap();

        let names: Vec<String> = store
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.last_name)
            .collect();
        assert_eq!(names, vec!["Lovelace", "Turing"]);
    }

    #[tokio::test]
    async fn test_audit_log() {
        let store = UserStore::new(setup_test_db().await);
        let user = store.create_user(&user_create("ada@x.com")).await.unwrap();

        store
            .audit_log(AuditLogCreate {
                user_id: Some(user.uid.to_string()),
                action: AuditAction::Login.as_str().to_string(),
                resource_type: "user".to_string(),
                resource_id: Some(user.uid.to_string()),
                details: None,
            })
            .await
            .unwrap();

        let logs = store.get_user_audit_log(&user.uid, 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "login");
    }
}
