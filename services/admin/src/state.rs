//! Application state shared across handlers

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::{
    hasher::Hasher,
    jwt::JwtService,
    policy::{PolicyEnforcer, PolicySynchronizer},
    rate_limiter::LoginAttemptLimiter,
    repositories::{
        ButtonRepository, LoginRecordRepository, MenuRepository, PermissionRepository,
        PgButtonRepository, PgLoginRecordRepository, PgMenuRepository, PgPermissionRepository,
        PgRoleRepository, PgUserRepository, RoleRepository, UserRepository,
    },
    usecases::{
        ButtonUsecase, MenuUsecase, PermissionUsecase, PolicyReloader, RoleUsecase, UserUsecase,
    },
    validation::PasswordStrength,
};

/// Repository implementations behind the use cases
#[derive(Clone)]
pub struct Repositories {
    pub permissions: Arc<dyn PermissionRepository>,
    pub menus: Arc<dyn MenuRepository>,
    pub buttons: Arc<dyn ButtonRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub users: Arc<dyn UserRepository>,
    pub records: Arc<dyn LoginRecordRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            permissions: Arc::new(PgPermissionRepository::new(pool.clone())),
            menus: Arc::new(PgMenuRepository::new(pool.clone())),
            buttons: Arc::new(PgButtonRepository::new(pool.clone())),
            roles: Arc::new(PgRoleRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            records: Arc::new(PgLoginRecordRepository::new(pool)),
        }
    }
}

/// Everything the services need besides the repositories
pub struct Services {
    pub enforcer: Arc<dyn PolicyEnforcer>,
    pub hasher: Arc<dyn Hasher>,
    pub limiter: LoginAttemptLimiter,
    pub jwt_service: JwtService,
    pub min_password_strength: PasswordStrength,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub permissions: PermissionUsecase,
    pub menus: MenuUsecase,
    pub buttons: ButtonUsecase,
    pub roles: RoleUsecase,
    pub users: UserUsecase,
    pub reloader: PolicyReloader,
    pub enforcer: Arc<dyn PolicyEnforcer>,
    pub jwt_service: JwtService,
    /// Cancelled when the server shuts down; requests use child tokens
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(repos: Repositories, services: Services, shutdown: CancellationToken) -> Self {
        let policy = PolicySynchronizer::new(services.enforcer.clone());

        let permissions = PermissionUsecase::new(repos.permissions.clone(), policy.clone());
        let menus = MenuUsecase::new(repos.menus.clone(), permissions.clone(), policy.clone());
        let buttons = ButtonUsecase::new(
            repos.buttons.clone(),
            repos.menus.clone(),
            permissions.clone(),
            policy.clone(),
        );
        let roles = RoleUsecase::new(
            repos.roles.clone(),
            repos.menus.clone(),
            repos.buttons.clone(),
            permissions.clone(),
            policy.clone(),
        );
        let users = UserUsecase::new(
            repos.users.clone(),
            repos.roles.clone(),
            repos.records.clone(),
            services.hasher,
            services.limiter,
            services.jwt_service.clone(),
            services.min_password_strength,
        );
        let reloader = PolicyReloader::new(
            policy,
            permissions.clone(),
            menus.clone(),
            buttons.clone(),
            roles.clone(),
        );

        Self {
            permissions,
            menus,
            buttons,
            roles,
            users,
            reloader,
            enforcer: services.enforcer,
            jwt_service: services.jwt_service,
            shutdown,
        }
    }
}
