use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::collection::PrivilegeCollection;

/// Пользователь: собственные права плюс выданные ему роли
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    /// Права, выданные напрямую пользователю
    pub privileges: PrivilegeCollection,
    /// Роли, выданные пользователю (`public` подразумевается всегда)
    pub roles: BTreeSet<String>,
}

impl User {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name,
            privileges: PrivilegeCollection::new(),
            roles: BTreeSet::new(),
        }
    }

    /// Выдает роль, возвращает false если она уже была
    pub fn grant_role(&mut self, role: &str) -> bool {
        self.roles.insert(role.to_string())
    }

    /// Отзывает роль, возвращает false если ее не было
    pub fn revoke_role(&mut self, role: &str) -> bool {
        self.roles.remove(role)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
