//! RBAC administration service
//!
//! Manages permissions, menus, buttons, roles and users, and keeps a casbin
//! policy graph in step with them. Requests are authorized against that
//! graph using the role carried in the caller's access token.

pub mod config;
pub mod error;
pub mod hasher;
pub mod jwt;
pub mod menu_tree;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod usecases;
pub mod validation;

pub use error::{AppError, AppResult};
pub use state::{AppState, Repositories, Services};
