//! Shared fixtures: in-memory repositories and a wired application state

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use admin::{
    AppState, Repositories, Services,
    config::TokenConfig,
    hasher::Hasher,
    jwt::JwtService,
    models::{
        Button, Id, LoginRecord, Menu, NewButton, NewLoginRecord, NewMenu, NewPermission,
        NewRole, NewUser, NewUserRecord, Page, PageQuery, Permission, Role, UpdateButton,
        UpdateMenu, UpdatePermission, UpdateRole, User, UserChanges, unique_ids,
    },
    policy::{CasbinEnforcer, PolicyEnforcer},
    rate_limiter::{LoginAttemptLimiter, LoginLimitConfig, MemoryAttemptStore},
    repositories::{
        ButtonRepository, LoginRecordRepository, MenuRepository, PermissionRepository,
        RoleRepository, UserRepository,
    },
    validation::PasswordStrength,
};
use async_trait::async_trait;
use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use tokio_util::sync::CancellationToken;

pub const PASSWORD: &str = "Abc123!@#";

#[derive(Debug, Clone)]
struct RoleRow {
    role: Role,
    permission_ids: Vec<Id>,
    menu_ids: Vec<Id>,
    button_ids: Vec<Id>,
}

#[derive(Default)]
struct Tables {
    next_id: Id,
    permissions: BTreeMap<Id, Permission>,
    menus: BTreeMap<Id, (Menu, Vec<Id>)>,
    buttons: BTreeMap<Id, (Button, Vec<Id>)>,
    roles: BTreeMap<Id, RoleRow>,
    users: BTreeMap<Id, User>,
    records: Vec<LoginRecord>,
}

impl Tables {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn permissions_of(&self, ids: &[Id]) -> Vec<Permission> {
        ids.iter()
            .filter_map(|id| self.permissions.get(id).cloned())
            .collect()
    }

    fn menu(&self, id: Id) -> Option<Menu> {
        self.menus.get(&id).map(|(menu, permission_ids)| Menu {
            permissions: self.permissions_of(permission_ids),
            ..menu.clone()
        })
    }

    fn button(&self, id: Id) -> Option<Button> {
        self.buttons.get(&id).map(|(button, permission_ids)| Button {
            permissions: self.permissions_of(permission_ids),
            ..button.clone()
        })
    }

    fn role(&self, id: Id) -> Option<Role> {
        self.roles.get(&id).map(|row| Role {
            permissions: self.permissions_of(&row.permission_ids),
            menus: row.menu_ids.iter().filter_map(|id| self.menu(*id)).collect(),
            buttons: row
                .button_ids
                .iter()
                .filter_map(|id| self.button(*id))
                .collect(),
            ..row.role.clone()
        })
    }
}

fn page_of<T: Clone>(items: Vec<T>, page: PageQuery) -> Page<T> {
    let total = items.len() as i64;
    let offset = page.offset() as usize;
    let items = match page.limit() {
        Some(limit) => items.into_iter().skip(offset).take(limit as usize).collect(),
        None => items,
    };
    Page { total, items }
}

fn still_referenced(what: &str) -> DatabaseError {
    DatabaseError::Query(sqlx::Error::Protocol(format!("{what} is still referenced")))
}

/// In-memory stand-in for every repository, mirroring the schema's
/// cascade rules
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryDb {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            permissions: Arc::new(self.clone()),
            menus: Arc::new(self.clone()),
            buttons: Arc::new(self.clone()),
            roles: Arc::new(self.clone()),
            users: Arc::new(self.clone()),
            records: Arc::new(self.clone()),
        }
    }

    pub fn login_records(&self) -> Vec<LoginRecord> {
        self.lock().records.clone()
    }
}

#[async_trait]
impl PermissionRepository for MemoryDb {
    async fn create(&self, new: &NewPermission) -> DatabaseResult<Permission> {
        let mut t = self.lock();
        let id = t.next_id();
        let permission = Permission {
            id,
            url: new.url.clone(),
            method: new.method.clone(),
            label: new.label.clone(),
            descr: new.descr.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        t.permissions.insert(id, permission.clone());
        Ok(permission)
    }

    async fn update(&self, id: Id, patch: &UpdatePermission) -> DatabaseResult<bool> {
        let mut t = self.lock();
        let Some(p) = t.permissions.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(url) = &patch.url {
            p.url = url.clone();
        }
        if let Some(method) = &patch.method {
            p.method = method.clone();
        }
        if let Some(label) = &patch.label {
            p.label = label.clone();
        }
        if let Some(descr) = &patch.descr {
            p.descr = descr.clone();
        }
        p.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: Id) -> DatabaseResult<bool> {
        let mut t = self.lock();
        if t.permissions.remove(&id).is_none() {
            return Ok(false);
        }
        for (_, ids) in t.menus.values_mut() {
            ids.retain(|p| *p != id);
        }
        for (_, ids) in t.buttons.values_mut() {
            ids.retain(|p| *p != id);
        }
        for row in t.roles.values_mut() {
            row.permission_ids.retain(|p| *p != id);
        }
        Ok(true)
    }

    async fn find(&self, id: Id) -> DatabaseResult<Option<Permission>> {
        Ok(self.lock().permissions.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[Id]) -> DatabaseResult<Vec<Permission>> {
        Ok(self.lock().permissions_of(&unique_ids(ids)))
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Permission>> {
        let items = self.lock().permissions.values().cloned().collect();
        Ok(page_of(items, page))
    }
}

#[async_trait]
impl MenuRepository for MemoryDb {
    async fn create(&self, new: &NewMenu) -> DatabaseResult<Menu> {
        let mut t = self.lock();
        let id = t.next_id();
        let menu = Menu {
            id,
            path: new.path.clone(),
            component: new.component.clone(),
            name: new.name.clone(),
            meta: new.meta.clone(),
            arrange_order: new.arrange_order,
            is_active: new.is_active,
            descr: new.descr.clone(),
            parent_id: new.parent_id,
            permissions: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        t.menus.insert(id, (menu, unique_ids(&new.permission_ids)));
        Ok(t.menu(id).unwrap())
    }

    async fn update(&self, id: Id, patch: &UpdateMenu) -> DatabaseResult<bool> {
        let mut t = self.lock();
        let Some((m, permission_ids)) = t.menus.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(path) = &patch.path {
            m.path = path.clone();
        }
        if let Some(component) = &patch.component {
            m.component = component.clone();
        }
        if let Some(name) = &patch.name {
            m.name = name.clone();
        }
        if let Some(meta) = &patch.meta {
            m.meta = meta.clone();
        }
        if let Some(order) = patch.arrange_order {
            m.arrange_order = order;
        }
        if let Some(active) = patch.is_active {
            m.is_active = active;
        }
        if let Some(descr) = &patch.descr {
            m.descr = descr.clone();
        }
        if let Some(parent_id) = patch.parent_id {
            m.parent_id = parent_id;
        }
        if let Some(ids) = &patch.permission_ids {
            *permission_ids = unique_ids(ids);
        }
        m.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: Id) -> DatabaseResult<bool> {
        let mut t = self.lock();
        if !t.menus.contains_key(&id) {
            return Ok(false);
        }
        if t.buttons.values().any(|(b, _)| b.menu_id == id) {
            return Err(still_referenced("menu"));
        }
        t.menus.remove(&id);
        for (menu, _) in t.menus.values_mut() {
            if menu.parent_id == Some(id) {
                menu.parent_id = None;
            }
        }
        for row in t.roles.values_mut() {
            row.menu_ids.retain(|m| *m != id);
        }
        Ok(true)
    }

    async fn find(&self, id: Id) -> DatabaseResult<Option<Menu>> {
        Ok(self.lock().menu(id))
    }

    async fn find_many(&self, ids: &[Id]) -> DatabaseResult<Vec<Menu>> {
        let t = self.lock();
        Ok(unique_ids(ids).into_iter().filter_map(|id| t.menu(id)).collect())
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Menu>> {
        let t = self.lock();
        let items = t.menus.keys().filter_map(|id| t.menu(*id)).collect();
        Ok(page_of(items, page))
    }
}

#[async_trait]
impl ButtonRepository for MemoryDb {
    async fn create(&self, new: &NewButton) -> DatabaseResult<Button> {
        let mut t = self.lock();
        let id = t.next_id();
        let button = Button {
            id,
            name: new.name.clone(),
            arrange_order: new.arrange_order,
            is_active: new.is_active,
            descr: new.descr.clone(),
            menu_id: new.menu_id,
            permissions: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        t.buttons.insert(id, (button, unique_ids(&new.permission_ids)));
        Ok(t.button(id).unwrap())
    }

    async fn update(&self, id: Id, patch: &UpdateButton) -> DatabaseResult<bool> {
        let mut t = self.lock();
        let Some((b, permission_ids)) = t.buttons.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(name) = &patch.name {
            b.name = name.clone();
        }
        if let Some(menu_id) = patch.menu_id {
            b.menu_id = menu_id;
        }
        if let Some(order) = patch.arrange_order {
            b.arrange_order = order;
        }
        if let Some(active) = patch.is_active {
            b.is_active = active;
        }
        if let Some(descr) = &patch.descr {
            b.descr = descr.clone();
        }
        if let Some(ids) = &patch.permission_ids {
            *permission_ids = unique_ids(ids);
        }
        b.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: Id) -> DatabaseResult<bool> {
        let mut t = self.lock();
        if t.buttons.remove(&id).is_none() {
            return Ok(false);
        }
        for row in t.roles.values_mut() {
            row.button_ids.retain(|b| *b != id);
        }
        Ok(true)
    }

    async fn find(&self, id: Id) -> DatabaseResult<Option<Button>> {
        Ok(self.lock().button(id))
    }

    async fn find_many(&self, ids: &[Id]) -> DatabaseResult<Vec<Button>> {
        let t = self.lock();
        Ok(unique_ids(ids)
            .into_iter()
            .filter_map(|id| t.button(id))
            .collect())
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Button>> {
        let t = self.lock();
        let items = t.buttons.keys().filter_map(|id| t.button(*id)).collect();
        Ok(page_of(items, page))
    }
}

#[async_trait]
impl RoleRepository for MemoryDb {
    async fn create(&self, new: &NewRole) -> DatabaseResult<Role> {
        let mut t = self.lock();
        let id = t.next_id();
        let role = Role {
            id,
            name: new.name.clone(),
            descr: new.descr.clone(),
            permissions: Vec::new(),
            menus: Vec::new(),
            buttons: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        t.roles.insert(
            id,
            RoleRow {
                role,
                permission_ids: unique_ids(&new.permission_ids),
                menu_ids: unique_ids(&new.menu_ids),
                button_ids: unique_ids(&new.button_ids),
            },
        );
        Ok(t.role(id).unwrap())
    }

    async fn update(&self, id: Id, patch: &UpdateRole) -> DatabaseResult<bool> {
        let mut t = self.lock();
        let Some(row) = t.roles.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(name) = &patch.name {
            row.role.name = name.clone();
        }
        if let Some(descr) = &patch.descr {
            row.role.descr = descr.clone();
        }
        if let Some(ids) = &patch.permission_ids {
            row.permission_ids = unique_ids(ids);
        }
        if let Some(ids) = &patch.menu_ids {
            row.menu_ids = unique_ids(ids);
        }
        if let Some(ids) = &patch.button_ids {
            row.button_ids = unique_ids(ids);
        }
        row.role.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: Id) -> DatabaseResult<bool> {
        let mut t = self.lock();
        if t.users.values().any(|u| u.role_id == id) {
            return Err(still_referenced("role"));
        }
        Ok(t.roles.remove(&id).is_some())
    }

    async fn find(&self, id: Id) -> DatabaseResult<Option<Role>> {
        Ok(self.lock().role(id))
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Role>> {
        let t = self.lock();
        let items = t.roles.keys().filter_map(|id| t.role(*id)).collect();
        Ok(page_of(items, page))
    }
}

#[async_trait]
impl UserRepository for MemoryDb {
    async fn create(&self, new: &NewUserRecord) -> DatabaseResult<User> {
        let mut t = self.lock();
        let id = t.next_id();
        let user = User {
            id,
            username: new.username.clone(),
            password_hash: new.password_hash.clone(),
            is_active: new.is_active,
            is_staff: new.is_staff,
            role_id: new.role_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: Id, changes: &UserChanges) -> DatabaseResult<bool> {
        let mut t = self.lock();
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(hash) = &changes.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(active) = changes.is_active {
            user.is_active = active;
        }
        if let Some(staff) = changes.is_staff {
            user.is_staff = staff;
        }
        if let Some(role_id) = changes.role_id {
            user.role_id = role_id;
        }
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: Id) -> DatabaseResult<bool> {
        Ok(self.lock().users.remove(&id).is_some())
    }

    async fn find(&self, id: Id) -> DatabaseResult<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<User>> {
        let items = self.lock().users.values().cloned().collect();
        Ok(page_of(items, page))
    }
}

#[async_trait]
impl LoginRecordRepository for MemoryDb {
    async fn create(&self, new: &NewLoginRecord) -> DatabaseResult<LoginRecord> {
        let mut t = self.lock();
        let id = t.next_id();
        let record = LoginRecord {
            id,
            username: new.username.clone(),
            ip_address: new.ip_address.clone(),
            user_agent: new.user_agent.clone(),
            status: new.status,
            login_at: Utc::now(),
        };
        t.records.push(record.clone());
        Ok(record)
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<LoginRecord>> {
        let items = self.lock().records.iter().rev().cloned().collect();
        Ok(page_of(items, page))
    }

    async fn list_by_username(
        &self,
        username: &str,
        page: PageQuery,
    ) -> DatabaseResult<Page<LoginRecord>> {
        let items = self
            .lock()
            .records
            .iter()
            .rev()
            .filter(|r| r.username == username)
            .cloned()
            .collect();
        Ok(page_of(items, page))
    }
}

/// Reversible stand-in for argon2, keeping tests fast
#[derive(Debug, Clone, Default)]
pub struct PlainHasher;

impl Hasher for PlainHasher {
    fn hash(&self, password: &str) -> anyhow::Result<String> {
        Ok(format!("plain${password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        match hash.strip_prefix("plain$") {
            Some(stored) => Ok(stored == password),
            None => anyhow::bail!("unknown hash format"),
        }
    }
}

pub fn token_config() -> TokenConfig {
    TokenConfig {
        issuer: "rbac-admin-test".to_string(),
        access_secret: "test-access-secret".to_string(),
        refresh_secret: "test-refresh-secret".to_string(),
        access_ttl_secs: 600,
        refresh_ttl_secs: 3600,
    }
}

/// A wired application over in-memory storage and a real casbin enforcer
pub struct TestApp {
    pub state: AppState,
    pub db: MemoryDb,
    pub enforcer: Arc<dyn PolicyEnforcer>,
    pub cancel: CancellationToken,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_limit(5, Duration::from_secs(30 * 60)).await
    }

    pub async fn with_limit(max_attempts: i32, lock_duration: Duration) -> Self {
        Self::over(MemoryDb::default(), max_attempts, lock_duration).await
    }

    /// A fresh enforcer over existing storage
    pub async fn over(db: MemoryDb, max_attempts: i32, lock_duration: Duration) -> Self {
        let enforcer: Arc<dyn PolicyEnforcer> = Arc::new(CasbinEnforcer::new().await.unwrap());
        let limiter = LoginAttemptLimiter::new(
            LoginLimitConfig {
                max_attempts,
                lock_duration,
            },
            Arc::new(MemoryAttemptStore::new()),
        );
        let services = Services {
            enforcer: enforcer.clone(),
            hasher: Arc::new(PlainHasher),
            limiter,
            jwt_service: JwtService::new(token_config()),
            min_password_strength: PasswordStrength::Medium,
        };
        let cancel = CancellationToken::new();
        let state = AppState::new(db.repositories(), services, cancel.clone());

        Self {
            state,
            db,
            enforcer,
            cancel,
        }
    }

    pub async fn group_edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = self
            .enforcer
            .group_policies()
            .await
            .into_iter()
            .map(|rule| (rule[0].clone(), rule[1].clone()))
            .collect();
        edges.sort();
        edges
    }

    pub async fn has_edge(&self, sub: &str, obj: &str) -> bool {
        self.group_edges()
            .await
            .iter()
            .any(|(s, o)| s == sub && o == obj)
    }

    pub async fn permission(&self, url: &str, method: &str) -> Permission {
        self.state
            .permissions
            .create(
                &self.cancel,
                NewPermission {
                    url: url.to_string(),
                    method: method.to_string(),
                    label: String::new(),
                    descr: String::new(),
                },
            )
            .await
            .unwrap()
    }

    pub async fn menu(&self, name: &str, parent_id: Option<Id>, permission_ids: Vec<Id>) -> Menu {
        self.state
            .menus
            .create(
                &self.cancel,
                NewMenu {
                    path: format!("/{name}"),
                    component: "Layout".to_string(),
                    name: name.to_string(),
                    meta: Default::default(),
                    arrange_order: 0,
                    is_active: true,
                    descr: String::new(),
                    parent_id,
                    permission_ids,
                },
            )
            .await
            .unwrap()
    }

    pub async fn button(&self, name: &str, menu_id: Id, permission_ids: Vec<Id>) -> Button {
        self.state
            .buttons
            .create(
                &self.cancel,
                NewButton {
                    name: name.to_string(),
                    menu_id,
                    arrange_order: 0,
                    is_active: true,
                    descr: String::new(),
                    permission_ids,
                },
            )
            .await
            .unwrap()
    }

    pub async fn role(
        &self,
        name: &str,
        permission_ids: Vec<Id>,
        menu_ids: Vec<Id>,
        button_ids: Vec<Id>,
    ) -> Role {
        self.state
            .roles
            .create(
                &self.cancel,
                NewRole {
                    name: name.to_string(),
                    descr: String::new(),
                    permission_ids,
                    menu_ids,
                    button_ids,
                },
            )
            .await
            .unwrap()
    }

    pub async fn user(&self, username: &str, role_id: Id, is_active: bool) -> User {
        self.state
            .users
            .create(NewUser {
                username: username.to_string(),
                password: PASSWORD.to_string(),
                is_active,
                is_staff: false,
                role_id,
            })
            .await
            .unwrap()
    }
}
