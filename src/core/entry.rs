use serde::{Deserialize, Serialize};

use super::object::PrivilegeObject;
use super::privilege::ActionSet;

/// Запись прав: набор действий на объект (или на весь тип, если объекта нет)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrivilegeEntry {
    pub actions: ActionSet,
    pub object: Option<PrivilegeObject>,
    pub with_grant_option: bool,
}

impl PrivilegeEntry {
    #[must_use]
    pub const fn new(actions: ActionSet, object: Option<PrivilegeObject>, with_grant_option: bool) -> Self {
        Self {
            actions,
            object,
            with_grant_option,
        }
    }

    /// Тот же слот: одинаковый объект (по равенству, не по вхождению) и флаг
    #[must_use]
    pub fn is_slot(&self, object: Option<&PrivilegeObject>, with_grant_option: bool) -> bool {
        self.with_grant_option == with_grant_option && self.object.as_ref() == object
    }

    /// Нечеткий ли шаблон записи; права уровня типа считаются точными
    #[must_use]
    pub fn is_fuzzy(&self) -> bool {
        self.object.as_ref().is_some_and(PrivilegeObject::is_fuzzy)
    }
}
