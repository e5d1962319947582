//! Admin service models

pub mod button;
pub mod menu;
pub mod permission;
pub mod record;
pub mod role;
pub mod user;

use serde::{Deserialize, Deserializer};

// Re-export for convenience
pub use button::{Button, NewButton, UpdateButton};
pub use menu::{Menu, MenuMeta, NewMenu, UpdateMenu};
pub use permission::{NewPermission, Permission, UpdatePermission};
pub use record::{LoginRecord, NewLoginRecord};
pub use role::{NewRole, Role, UpdateRole};
pub use user::{NewUser, NewUserRecord, UpdateUser, User, UserChanges};

/// Identity shared by every persisted entity; `0` means "not assigned yet".
pub type Id = i64;

/// Default page size of list endpoints
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page selection for list queries
///
/// Requests always deserialize to a bounded page; only [`PageQuery::all`]
/// selects every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "PageParams")]
pub struct PageQuery {
    /// 1-based page number
    pub page: u32,
    /// Page size, `0` returns every row
    pub size: u32,
}

/// Raw `?page=&size=` parameters
#[derive(Deserialize)]
#[serde(default)]
struct PageParams {
    page: u32,
    size: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl From<PageParams> for PageQuery {
    fn from(params: PageParams) -> Self {
        Self {
            page: params.page.max(1),
            size: params.size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        PageParams::default().into()
    }
}

impl PageQuery {
    /// Unbounded query, used by the policy reload
    pub fn all() -> Self {
        Self { page: 1, size: 0 }
    }

    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// SQL `LIMIT`, `None` meaning no limit
    pub fn limit(&self) -> Option<i64> {
        (self.size > 0).then_some(i64::from(self.size))
    }

    /// SQL `OFFSET`
    pub fn offset(&self) -> i64 {
        match self.limit() {
            Some(limit) => i64::from(self.page.saturating_sub(1)) * limit,
            None => 0,
        }
    }
}

/// A page of rows together with the total row count
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub items: Vec<T>,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Sorted, de-duplicated copy of an id list
pub fn unique_ids(ids: &[Id]) -> Vec<Id> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}
