use serde::{Deserialize, Serialize};
use std::fmt;

use super::privilege::{ActionSet, PrivilegeType};

/// Категория объектов, на которую выдаются права.
///
/// Используется только как ключ раздела внутри `PrivilegeCollection`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Table,
    Database,
    System,
    User,
    Resource,
    View,
    Catalog,
    MaterializedView,
    Function,
    ResourceGroup,
    GlobalFunction,
    StorageVolume,
}

impl ObjectType {
    pub const ALL: [Self; 12] = [
        Self::Table,
        Self::Database,
        Self::System,
        Self::User,
        Self::Resource,
        Self::View,
        Self::Catalog,
        Self::MaterializedView,
        Self::Function,
        Self::ResourceGroup,
        Self::GlobalFunction,
        Self::StorageVolume,
    ];

    /// SQL-имя типа (`MATERIALIZED VIEW`, `RESOURCE GROUP` и т.д.)
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::Database => "DATABASE",
            Self::System => "SYSTEM",
            Self::User => "USER",
            Self::Resource => "RESOURCE",
            Self::View => "VIEW",
            Self::Catalog => "CATALOG",
            Self::MaterializedView => "MATERIALIZED VIEW",
            Self::Function => "FUNCTION",
            Self::ResourceGroup => "RESOURCE GROUP",
            Self::GlobalFunction => "GLOBAL FUNCTION",
            Self::StorageVolume => "STORAGE VOLUME",
        }
    }

    /// Права, которые имеют смысл для этого типа объектов
    #[must_use]
    pub fn valid_actions(self) -> &'static [PrivilegeType] {
        use PrivilegeType as P;
        match self {
            Self::Table => &[
                P::Delete,
                P::Drop,
                P::Insert,
                P::Select,
                P::Alter,
                P::Export,
                P::Update,
            ],
            Self::Database => &[
                P::CreateTable,
                P::Drop,
                P::Alter,
                P::CreateView,
                P::CreateFunction,
                P::CreateMaterializedView,
            ],
            Self::System => &[
                P::Grant,
                P::Node,
                P::CreateResource,
                P::Plugin,
                P::File,
                P::Blacklist,
                P::Operate,
                P::CreateExternalCatalog,
                P::Repository,
                P::CreateResourceGroup,
                P::CreateGlobalFunction,
                P::CreateStorageVolume,
            ],
            Self::User => &[P::Impersonate],
            Self::Resource => &[P::Usage, P::Alter, P::Drop],
            Self::View => &[P::Select, P::Alter, P::Drop],
            Self::Catalog => &[P::Usage, P::CreateDatabase, P::Drop, P::Alter],
            Self::MaterializedView => &[P::Select, P::Alter, P::Refresh, P::Drop],
            Self::Function | Self::GlobalFunction => &[P::Usage, P::Drop],
            Self::ResourceGroup => &[P::Alter, P::Drop],
            Self::StorageVolume => &[P::Drop, P::Alter, P::Usage],
        }
    }

    /// Маска всех допустимых прав (раскрытие `ALL`)
    #[must_use]
    pub fn all_actions(self) -> ActionSet {
        self.valid_actions().iter().copied().collect()
    }

    #[must_use]
    pub fn is_valid_action(self, action: PrivilegeType) -> bool {
        self.valid_actions().contains(&action)
    }

    /// Разбор имени типа: регистр не важен, пробелы и `_` равнозначны
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        Self::ALL.into_iter().find(|t| t.name() == normalized)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(ObjectType::from_name("table"), Some(ObjectType::Table));
        assert_eq!(
            ObjectType::from_name("materialized view"),
            Some(ObjectType::MaterializedView)
        );
        assert_eq!(
            ObjectType::from_name("RESOURCE_GROUP"),
            Some(ObjectType::ResourceGroup)
        );
        assert_eq!(
            ObjectType::from_name("storage-volume"),
            Some(ObjectType::StorageVolume)
        );
        assert_eq!(ObjectType::from_name("tablespace"), None);
    }

    #[test]
    fn test_valid_actions() {
        assert!(ObjectType::Table.is_valid_action(PrivilegeType::Select));
        assert!(!ObjectType::Table.is_valid_action(PrivilegeType::Grant));
        assert!(ObjectType::System.is_valid_action(PrivilegeType::Grant));
        assert!(ObjectType::User.is_valid_action(PrivilegeType::Impersonate));
    }

    #[test]
    fn test_all_actions_matches_valid_list() {
        for object_type in ObjectType::ALL {
            let all = object_type.all_actions();
            assert_eq!(all.actions().len(), object_type.valid_actions().len());
        }
    }
}
