//! Per-role navigation tree
//!
//! The tree is built only from the menus and buttons a role holds directly.
//! A menu whose parent is not among them becomes a root.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::models::{Button, Id, Menu};

/// One menu with its nested children and attached buttons
#[derive(Debug, Clone, Serialize)]
pub struct MenuTreeNode {
    #[serde(flatten)]
    pub menu: Menu,
    pub children: Vec<MenuTreeNode>,
    pub buttons: Vec<Button>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MenuTreeError {
    /// The parent chain of `menu_id` loops back on itself
    #[error("menu {menu_id} is part of a parent cycle")]
    Cycle { menu_id: Id },
}

struct TreeBuilder {
    menus: HashMap<Id, Menu>,
    children: HashMap<Id, Vec<Id>>,
    buttons: HashMap<Id, Vec<Button>>,
    visited: HashSet<Id>,
}

impl TreeBuilder {
    fn node(&mut self, id: Id) -> Result<MenuTreeNode, MenuTreeError> {
        if !self.visited.insert(id) {
            return Err(MenuTreeError::Cycle { menu_id: id });
        }
        let menu = self
            .menus
            .remove(&id)
            .ok_or(MenuTreeError::Cycle { menu_id: id })?;

        let child_ids = self.children.remove(&id).unwrap_or_default();
        let children = child_ids
            .into_iter()
            .map(|child| self.node(child))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MenuTreeNode {
            menu,
            children,
            buttons: self.buttons.remove(&id).unwrap_or_default(),
        })
    }
}

/// Build the forest of a role's menus
///
/// Siblings, both menus and buttons, are ordered by `(arrange_order, id)`.
/// Buttons whose menu is not in `menus` are left out.
pub fn build_menu_tree(
    menus: Vec<Menu>,
    buttons: Vec<Button>,
) -> Result<Vec<MenuTreeNode>, MenuTreeError> {
    let menus: HashMap<Id, Menu> = menus.into_iter().map(|m| (m.id, m)).collect();

    let mut ordered: Vec<&Menu> = menus.values().collect();
    ordered.sort_by_key(|m| (m.arrange_order, m.id));

    let mut roots = Vec::new();
    let mut children: HashMap<Id, Vec<Id>> = HashMap::new();
    for menu in ordered {
        match menu.parent_id.filter(|parent| menus.contains_key(parent)) {
            Some(parent) => children.entry(parent).or_default().push(menu.id),
            None => roots.push(menu.id),
        }
    }

    let mut by_menu: HashMap<Id, Vec<Button>> = HashMap::new();
    for button in buttons {
        if menus.contains_key(&button.menu_id) {
            by_menu.entry(button.menu_id).or_default().push(button);
        }
    }
    for list in by_menu.values_mut() {
        list.sort_by_key(|b| (b.arrange_order, b.id));
        list.dedup_by_key(|b| b.id);
    }

    let mut builder = TreeBuilder {
        menus,
        children,
        buttons: by_menu,
        visited: HashSet::new(),
    };

    let forest = roots
        .into_iter()
        .map(|root| builder.node(root))
        .collect::<Result<Vec<_>, _>>()?;

    // Whatever was never reached hangs off a closed parent loop
    if let Some(menu_id) = builder.menus.keys().min().copied() {
        return Err(MenuTreeError::Cycle { menu_id });
    }

    Ok(forest)
}
