//! User use case: account management and login

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    error::{AppError, AppResult},
    hasher::Hasher,
    jwt::{JwtService, LoginTokens},
    models::{
        Id, LoginRecord, NewLoginRecord, NewUser, NewUserRecord, Page, PageQuery, UpdateUser,
        User, UserChanges,
    },
    rate_limiter::LoginAttemptLimiter,
    repositories::{LoginRecordRepository, RoleRepository, UserRepository},
    validation::{PasswordStrength, validate_password, validate_username},
};

/// One login request
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub username: String,
    pub password: String,
    pub ip: String,
    pub user_agent: String,
}

#[derive(Clone)]
pub struct UserUsecase {
    repo: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    records: Arc<dyn LoginRecordRepository>,
    hasher: Arc<dyn Hasher>,
    limiter: LoginAttemptLimiter,
    jwt: JwtService,
    min_strength: PasswordStrength,
}

impl UserUsecase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        records: Arc<dyn LoginRecordRepository>,
        hasher: Arc<dyn Hasher>,
        limiter: LoginAttemptLimiter,
        jwt: JwtService,
        min_strength: PasswordStrength,
    ) -> Self {
        Self {
            repo,
            roles,
            records,
            hasher,
            limiter,
            jwt,
            min_strength,
        }
    }

    fn check_password(&self, password: &str) -> AppResult<()> {
        validate_password(password, self.min_strength).map_err(AppError::PasswordStrength)
    }

    async fn ensure_role(&self, role_id: Id) -> AppResult<()> {
        if self.roles.find(role_id).await?.is_none() {
            return Err(AppError::not_found(format!("role {role_id}")));
        }
        Ok(())
    }

    pub async fn create(&self, new: NewUser) -> AppResult<User> {
        validate_username(&new.username).map_err(AppError::Validation)?;
        self.check_password(&new.password)?;
        self.ensure_role(new.role_id).await?;

        let record = NewUserRecord {
            password_hash: self.hasher.hash(&new.password)?,
            username: new.username,
            is_active: new.is_active,
            is_staff: new.is_staff,
            role_id: new.role_id,
        };
        let user = self.repo.create(&record).await?;

        info!(user_id = user.id, role_id = user.role_id, "User created");
        Ok(user)
    }

    pub async fn update(&self, id: Id, patch: UpdateUser) -> AppResult<User> {
        self.find(id).await?;
        if let Some(username) = &patch.username {
            validate_username(username).map_err(AppError::Validation)?;
        }
        if let Some(role_id) = patch.role_id {
            self.ensure_role(role_id).await?;
        }
        let password_hash = match &patch.password {
            Some(password) => {
                self.check_password(password)?;
                Some(self.hasher.hash(password)?)
            }
            None => None,
        };

        let changes = UserChanges {
            username: patch.username,
            password_hash,
            is_active: patch.is_active,
            is_staff: patch.is_staff,
            role_id: patch.role_id,
        };
        if !self.repo.update(id, &changes).await? {
            return Err(AppError::not_found(format!("user {id}")));
        }

        info!(user_id = id, "User updated");
        self.find(id).await
    }

    pub async fn delete(&self, id: Id) -> AppResult<()> {
        if !self.repo.delete(id).await? {
            return Err(AppError::not_found(format!("user {id}")));
        }
        info!(user_id = id, "User deleted");
        Ok(())
    }

    pub async fn find(&self, id: Id) -> AppResult<User> {
        self.repo
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {id}")))
    }

    pub async fn list(&self, page: PageQuery) -> AppResult<Page<User>> {
        Ok(self.repo.list(page).await?)
    }

    pub async fn login_records(&self, page: PageQuery) -> AppResult<Page<LoginRecord>> {
        Ok(self.records.list(page).await?)
    }

    /// Login history of a single account, newest first
    pub async fn my_login_records(
        &self,
        username: &str,
        page: PageQuery,
    ) -> AppResult<Page<LoginRecord>> {
        Ok(self.records.list_by_username(username, page).await?)
    }

    /// Authenticate and issue tokens
    ///
    /// The lockout check runs before the user lookup. Unknown usernames and
    /// wrong passwords both consume one attempt and fail identically.
    pub async fn login(
        &self,
        cancel: &CancellationToken,
        attempt: &LoginAttempt,
    ) -> AppResult<LoginTokens> {
        let ip = attempt.ip.as_str();
        let remaining = self.limiter.remaining(cancel, ip).await?;
        if self.limiter.is_locked(remaining) {
            warn!(ip, "Login rejected, source is locked");
            self.record(attempt, false).await;
            return Err(AppError::AccountLocked);
        }

        let user = match self.repo.find_by_username(&attempt.username).await? {
            Some(user) => user,
            None => {
                warn!(ip, "Login failed, unknown user");
                self.count_failure(cancel, ip, remaining).await;
                self.record(attempt, false).await;
                return Err(AppError::InvalidCredentials);
            }
        };

        if !user.is_active {
            warn!(ip, user_id = user.id, "Login rejected, user inactive");
            self.record(attempt, false).await;
            return Err(AppError::UserInactive);
        }

        let verified = self
            .hasher
            .verify(&attempt.password, &user.password_hash)
            .unwrap_or_else(|e| {
                error!(user_id = user.id, "Failed to verify password: {}", e);
                false
            });
        if !verified {
            warn!(ip, user_id = user.id, "Login failed, wrong password");
            self.count_failure(cancel, ip, remaining).await;
            self.record(attempt, false).await;
            return Err(AppError::InvalidCredentials);
        }

        if let Err(e) = self.limiter.reset(cancel, ip).await {
            error!(ip, "Failed to reset login attempts: {}", e);
        }
        let tokens = self.jwt.issue(&user)?;
        self.record(attempt, true).await;

        info!(user_id = user.id, ip, "User logged in");
        Ok(tokens)
    }

    async fn count_failure(&self, cancel: &CancellationToken, ip: &str, remaining: i32) {
        if let Err(e) = self.limiter.record_failure(cancel, ip, remaining).await {
            error!(ip, "Failed to store login attempts: {}", e);
        }
    }

    async fn record(&self, attempt: &LoginAttempt, status: bool) {
        let record = NewLoginRecord {
            username: attempt.username.clone(),
            ip_address: attempt.ip.clone(),
            user_agent: attempt.user_agent.clone(),
            status,
        };
        if let Err(e) = self.records.create(&record).await {
            error!(ip = %attempt.ip, "Failed to store login record: {}", e);
        }
    }

    /// Exchange a refresh token for a new token pair
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<LoginTokens> {
        let claims = self.jwt.validate_refresh(refresh_token)?;
        let user = self.repo.find(claims.uid).await?.ok_or(AppError::Token)?;
        if !user.is_active {
            return Err(AppError::UserInactive);
        }
        self.jwt.issue(&user)
    }

    /// Replace the password of `user_id` after checking the old one
    pub async fn change_password(
        &self,
        user_id: Id,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.find(user_id).await?;
        let verified = self
            .hasher
            .verify(old_password, &user.password_hash)
            .unwrap_or_else(|e| {
                error!(user_id, "Failed to verify password: {}", e);
                false
            });
        if !verified {
            return Err(AppError::InvalidCredentials);
        }
        self.check_password(new_password)?;

        let changes = UserChanges {
            password_hash: Some(self.hasher.hash(new_password)?),
            ..UserChanges::default()
        };
        self.repo.update(user_id, &changes).await?;

        info!(user_id, "Password changed");
        Ok(())
    }
}
