use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Права доступа (действия), которые можно выдать на объект
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrivilegeType {
    Grant,
    Node,
    Operate,
    Delete,
    Drop,
    Insert,
    Select,
    Alter,
    Export,
    Update,
    Usage,
    Plugin,
    File,
    Blacklist,
    Repository,
    Refresh,
    Impersonate,
    CreateDatabase,
    CreateTable,
    CreateView,
    CreateFunction,
    CreateGlobalFunction,
    CreateMaterializedView,
    CreateResource,
    CreateResourceGroup,
    CreateExternalCatalog,
    CreateStorageVolume,
}

impl PrivilegeType {
    pub const ALL: [Self; 27] = [
        Self::Grant,
        Self::Node,
        Self::Operate,
        Self::Delete,
        Self::Drop,
        Self::Insert,
        Self::Select,
        Self::Alter,
        Self::Export,
        Self::Update,
        Self::Usage,
        Self::Plugin,
        Self::File,
        Self::Blacklist,
        Self::Repository,
        Self::Refresh,
        Self::Impersonate,
        Self::CreateDatabase,
        Self::CreateTable,
        Self::CreateView,
        Self::CreateFunction,
        Self::CreateGlobalFunction,
        Self::CreateMaterializedView,
        Self::CreateResource,
        Self::CreateResourceGroup,
        Self::CreateExternalCatalog,
        Self::CreateStorageVolume,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Grant => "GRANT",
            Self::Node => "NODE",
            Self::Operate => "OPERATE",
            Self::Delete => "DELETE",
            Self::Drop => "DROP",
            Self::Insert => "INSERT",
            Self::Select => "SELECT",
            Self::Alter => "ALTER",
            Self::Export => "EXPORT",
            Self::Update => "UPDATE",
            Self::Usage => "USAGE",
            Self::Plugin => "PLUGIN",
            Self::File => "FILE",
            Self::Blacklist => "BLACKLIST",
            Self::Repository => "REPOSITORY",
            Self::Refresh => "REFRESH",
            Self::Impersonate => "IMPERSONATE",
            Self::CreateDatabase => "CREATE DATABASE",
            Self::CreateTable => "CREATE TABLE",
            Self::CreateView => "CREATE VIEW",
            Self::CreateFunction => "CREATE FUNCTION",
            Self::CreateGlobalFunction => "CREATE GLOBAL FUNCTION",
            Self::CreateMaterializedView => "CREATE MATERIALIZED VIEW",
            Self::CreateResource => "CREATE RESOURCE",
            Self::CreateResourceGroup => "CREATE RESOURCE GROUP",
            Self::CreateExternalCatalog => "CREATE EXTERNAL CATALOG",
            Self::CreateStorageVolume => "CREATE STORAGE VOLUME",
        }
    }

    /// Разбор имени права (`select`, `create_table`, `CREATE TABLE`)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        Self::ALL.into_iter().find(|p| p.name() == normalized)
    }

    /// Бит этого права внутри `ActionSet`
    #[must_use]
    pub const fn bit(self) -> ActionSet {
        ActionSet::from_bits_retain(1 << self as u32)
    }
}

impl fmt::Display for PrivilegeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Набор прав в виде битовой маски.
    ///
    /// Объединение (`insert`), разность (`remove`, `difference`), проверка
    /// подмножества (`contains`) и пустоты (`is_empty`) берутся из `bitflags`.
    /// Коллекция никогда не хранит пустой набор.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ActionSet: u64 {
        const GRANT = 1 << PrivilegeType::Grant as u32;
        const NODE = 1 << PrivilegeType::Node as u32;
        const OPERATE = 1 << PrivilegeType::Operate as u32;
        const DELETE = 1 << PrivilegeType::Delete as u32;
        const DROP = 1 << PrivilegeType::Drop as u32;
        const INSERT = 1 << PrivilegeType::Insert as u32;
        const SELECT = 1 << PrivilegeType::Select as u32;
        const ALTER = 1 << PrivilegeType::Alter as u32;
        const EXPORT = 1 << PrivilegeType::Export as u32;
        const UPDATE = 1 << PrivilegeType::Update as u32;
        const USAGE = 1 << PrivilegeType::Usage as u32;
        const PLUGIN = 1 << PrivilegeType::Plugin as u32;
        const FILE = 1 << PrivilegeType::File as u32;
        const BLACKLIST = 1 << PrivilegeType::Blacklist as u32;
        const REPOSITORY = 1 << PrivilegeType::Repository as u32;
        const REFRESH = 1 << PrivilegeType::Refresh as u32;
        const IMPERSONATE = 1 << PrivilegeType::Impersonate as u32;
        const CREATE_DATABASE = 1 << PrivilegeType::CreateDatabase as u32;
        const CREATE_TABLE = 1 << PrivilegeType::CreateTable as u32;
        const CREATE_VIEW = 1 << PrivilegeType::CreateView as u32;
        const CREATE_FUNCTION = 1 << PrivilegeType::CreateFunction as u32;
        const CREATE_GLOBAL_FUNCTION = 1 << PrivilegeType::CreateGlobalFunction as u32;
        const CREATE_MATERIALIZED_VIEW = 1 << PrivilegeType::CreateMaterializedView as u32;
        const CREATE_RESOURCE = 1 << PrivilegeType::CreateResource as u32;
        const CREATE_RESOURCE_GROUP = 1 << PrivilegeType::CreateResourceGroup as u32;
        const CREATE_EXTERNAL_CATALOG = 1 << PrivilegeType::CreateExternalCatalog as u32;
        const CREATE_STORAGE_VOLUME = 1 << PrivilegeType::CreateStorageVolume as u32;
    }
}

impl ActionSet {
    /// Содержит ли набор одно конкретное право
    #[must_use]
    pub fn contains_action(&self, action: PrivilegeType) -> bool {
        self.contains(action.bit())
    }

    /// Права набора в порядке объявления `PrivilegeType`
    #[must_use]
    pub fn actions(&self) -> Vec<PrivilegeType> {
        PrivilegeType::ALL
            .into_iter()
            .filter(|p| self.contains_action(*p))
            .collect()
    }
}

impl From<PrivilegeType> for ActionSet {
    fn from(action: PrivilegeType) -> Self {
        action.bit()
    }
}

impl FromIterator<PrivilegeType> for ActionSet {
    fn from_iter<I: IntoIterator<Item = PrivilegeType>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |acc, action| acc | action.bit())
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.actions().into_iter().map(PrivilegeType::name).collect();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_match_named_flags() {
        assert_eq!(PrivilegeType::Select.bit(), ActionSet::SELECT);
        assert_eq!(PrivilegeType::CreateStorageVolume.bit(), ActionSet::CREATE_STORAGE_VOLUME);
    }

    #[test]
    fn test_union_and_difference() {
        let mut set: ActionSet = [PrivilegeType::Select, PrivilegeType::Insert].into_iter().collect();
        set.insert(ActionSet::DROP);
        assert!(set.contains_action(PrivilegeType::Drop));

        set.remove(ActionSet::SELECT | ActionSet::DROP);
        assert_eq!(set, ActionSet::INSERT);

        set.remove(ActionSet::INSERT);
        assert!(set.is_empty());
    }

    #[test]
    fn test_subset() {
        let held = ActionSet::SELECT | ActionSet::INSERT | ActionSet::UPDATE;
        assert!(held.contains(ActionSet::SELECT | ActionSet::UPDATE));
        assert!(!held.contains(ActionSet::SELECT | ActionSet::DROP));
        assert!(held.contains(ActionSet::empty()));
    }

    #[test]
    fn test_display_in_declaration_order() {
        let set = ActionSet::SELECT | ActionSet::DELETE | ActionSet::CREATE_TABLE;
        assert_eq!(set.to_string(), "DELETE, SELECT, CREATE TABLE");
    }

    #[test]
    fn test_privilege_from_name() {
        assert_eq!(PrivilegeType::from_name("select"), Some(PrivilegeType::Select));
        assert_eq!(
            PrivilegeType::from_name("create_table"),
            Some(PrivilegeType::CreateTable)
        );
        assert_eq!(
            PrivilegeType::from_name("Create  Materialized View"),
            Some(PrivilegeType::CreateMaterializedView)
        );
        assert_eq!(PrivilegeType::from_name("truncate"), None);
    }

    #[test]
    fn test_json_and_binary_encoding() {
        let set = ActionSet::SELECT | ActionSet::INSERT;
        let json = serde_json::to_string(&set).unwrap();
        let decoded: ActionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, set);

        let bytes = bincode::serialize(&set).unwrap();
        let decoded: ActionSet = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, set);
    }
}
