use bson::{DateTime, oid::ObjectId};
use imhere_db::models::User;
use std::sync::Arc;

use super::base::{BaseDao, DaoError, DaoResult};
use crate::auth::normalize_email;
use crate::store::DocumentStore;

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            base: BaseDao::new(store, User::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        email: &str,
        username: Option<&str>,
        password_hash: String,
    ) -> DaoResult<User> {
        let email = normalize_email(email);
        if !self.base.find_where("email", email.as_str()).await?.is_empty() {
            return Err(DaoError::DuplicateKey(format!("Email {} is already registered", email)));
        }

        let user = User {
            id: ObjectId::new().to_hex(),
            email,
            username: username
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            password_hash: Some(password_hash),
            created_at: DateTime::now(),
        };

        if !self.base.create(&user.id, &user).await? {
            return Err(DaoError::DuplicateKey(format!("User {} already exists", user.id)));
        }
        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: &str) -> DaoResult<User> {
        self.base.find_by_id(user_id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<User> {
        self.base
            .find_where("email", normalize_email(email))
            .await?
            .into_iter()
            .next()
            .ok_or(DaoError::NotFound)
    }
}
