use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::collection::PrivilegeCollection;

/// Роль базы данных (именованный набор прав, который можно выдать пользователю
/// или другой роли)
///
/// Встроенные роли:
/// - `root` - все права на все объекты с grant option
/// - `public` - неявно есть у каждого пользователя
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    /// Встроенную роль нельзя удалить
    pub is_builtin: bool,
    /// Права роли
    pub privileges: PrivilegeCollection,
    /// Роли, которые наследует эта роль (member_of)
    /// Например: analyst наследует readonly
    pub parent_roles: BTreeSet<String>,
}

impl Role {
    /// Создает новую роль
    #[must_use]
    pub fn new(name: String, is_builtin: bool) -> Self {
        Self {
            name,
            is_builtin,
            privileges: PrivilegeCollection::new(),
            parent_roles: BTreeSet::new(),
        }
    }

    /// Добавляет роль, которую наследует текущая роль
    pub fn add_parent_role(&mut self, role_name: &str) -> bool {
        self.parent_roles.insert(role_name.to_string())
    }

    /// Удаляет наследуемую роль
    pub fn remove_parent_role(&mut self, role_name: &str) -> bool {
        self.parent_roles.remove(role_name)
    }
}
