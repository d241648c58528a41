use crate::client::{RegistryApi, decode};
use crate::error::{Error, Result};
use crate::models::{User, UserReq};
use crate::project::to_json;
use crate::secret_string::SecretString;
use std::sync::Arc;
use tracing::info;

pub struct UserService<A> {
    root_url: String,
    api: Arc<A>,
}

impl<A: RegistryApi> UserService<A> {
    pub fn new(root_url: &str, api: Arc<A>) -> Result<Self> {
        Error::require(root_url, "Empty root URL for user operations")?;
        Ok(Self {
            root_url: root_url.to_string(),
            api,
        })
    }

    pub async fn create_user(&self, username: &str, password: &SecretString) -> Result<()> {
        Error::require(username, "Empty user name for creating")?;
        if password.is_blank() {
            return Err(Error::validation("Empty password for creating user"));
        }

        let req = UserReq {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            realname: username.to_string(),
            password: password.expose_secret().to_string(),
            comment: "created by harbor-smoketest".to_string(),
        };
        let body = to_json(&req)?;
        self.api
            .post(&format!("{}/api/v2.0/users", self.root_url), Some(&body))
            .await?;
        info!("Created user {}", username);
        Ok(())
    }

    pub async fn get_user_id(&self, username: &str) -> Result<i64> {
        Error::require(username, "Empty user name for getting ID")?;

        let url = format!(
            "{}/api/v2.0/users/search?username={}",
            self.root_url, username
        );
        let users: Vec<User> = decode("Decode users", &self.api.get(&url).await?)?;
        users
            .into_iter()
            .find(|u| u.username == username)
            .map(|u| u.user_id)
            .ok_or_else(|| {
                Error::transport(format!("Lookup of user {}", username), "no such user")
            })
    }

    pub async fn delete_user(&self, username: &str) -> Result<()> {
        let id = self.get_user_id(username).await?;
        self.api
            .delete(&format!("{}/api/v2.0/users/{}", self.root_url, id))
            .await?;
        info!("Deleted user {}", username);
        Ok(())
    }
}
