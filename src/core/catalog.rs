use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::error::AuthError;
use super::object_type::ObjectType;

pub const DEFAULT_CATALOG: &str = "default_catalog";
pub const DEFAULT_CATALOG_ID: u64 = 0;
const FIRST_OBJECT_ID: u64 = 10001;

/// Узкий read-only интерфейс к каталогу: существует ли еще конкретный объект.
///
/// Используется `PrivilegeObject::validate` и сборщиком устаревших записей.
/// Никогда не возвращает ошибку: отсутствие объекта это обычный ответ `false`.
pub trait CatalogView {
    fn catalog_exists(&self, id: u64) -> bool;
    fn database_exists(&self, id: u64) -> bool;
    fn table_exists(&self, database: u64, table: &Uuid) -> bool;
    fn view_exists(&self, database: u64, view: &Uuid) -> bool;
    fn materialized_view_exists(&self, database: u64, view: &Uuid) -> bool;
    fn user_exists(&self, name: &str) -> bool;
    fn resource_group_exists(&self, name: &str) -> bool;
    fn resource_exists(&self, name: &str) -> bool;
    fn storage_volume_exists(&self, name: &str) -> bool;
    fn function_exists(&self, database: u64, signature: &str) -> bool;
    fn global_function_exists(&self, signature: &str) -> bool;
}

/// Вид табличного объекта в каталоге
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TableKind {
    Table,
    View,
    MaterializedView,
}

impl TableKind {
    #[must_use]
    pub const fn object_type(self) -> ObjectType {
        match self {
            Self::Table => ObjectType::Table,
            Self::View => ObjectType::View,
            Self::MaterializedView => ObjectType::MaterializedView,
        }
    }

    #[must_use]
    pub const fn from_object_type(object_type: ObjectType) -> Option<Self> {
        match object_type {
            ObjectType::Table => Some(Self::Table),
            ObjectType::View => Some(Self::View),
            ObjectType::MaterializedView => Some(Self::MaterializedView),
            _ => None,
        }
    }
}

/// Объекты каталога, идентифицируемые только именем
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NamedKind {
    ResourceGroup,
    Resource,
    StorageVolume,
}

impl NamedKind {
    #[must_use]
    pub const fn object_type(self) -> ObjectType {
        match self {
            Self::ResourceGroup => ObjectType::ResourceGroup,
            Self::Resource => ObjectType::Resource,
            Self::StorageVolume => ObjectType::StorageVolume,
        }
    }

    #[must_use]
    pub const fn from_object_type(object_type: ObjectType) -> Option<Self> {
        match object_type {
            ObjectType::ResourceGroup => Some(Self::ResourceGroup),
            ObjectType::Resource => Some(Self::Resource),
            ObjectType::StorageVolume => Some(Self::StorageVolume),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub id: Uuid,
    pub kind: TableKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseMeta {
    pub id: u64,
    /// Таблицы и представления: name -> meta
    pub tables: BTreeMap<String, TableMeta>,
    /// Сигнатуры функций, например `my_add(INT,INT)`
    pub functions: BTreeSet<String>,
}

/// Каталог в памяти: имена и идентификаторы объектов, на которые выдаются права
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCatalog {
    next_id: u64,
    catalogs: BTreeMap<String, u64>,
    databases: BTreeMap<String, DatabaseMeta>,
    named: BTreeMap<String, BTreeSet<String>>,
    global_functions: BTreeSet<String>,
}

fn named_key(kind: NamedKind) -> &'static str {
    kind.object_type().name()
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        let mut catalogs = BTreeMap::new();
        catalogs.insert(DEFAULT_CATALOG.to_string(), DEFAULT_CATALOG_ID);
        Self {
            next_id: FIRST_OBJECT_ID,
            catalogs,
            databases: BTreeMap::new(),
            named: BTreeMap::new(),
            global_functions: BTreeSet::new(),
        }
    }

    /// Следующий свободный идентификатор (не резервирует его)
    #[must_use]
    pub const fn next_id(&self) -> u64 {
        self.next_id
    }

    fn observe_id(&mut self, id: u64) {
        if id >= self.next_id {
            self.next_id = id + 1;
        }
    }

    pub fn create_catalog(&mut self, name: &str, id: u64) -> Result<(), AuthError> {
        if self.catalogs.contains_key(name) {
            return Err(AuthError::ObjectAlreadyExists(format!("Catalog '{name}'")));
        }
        if let Some(other) = self.catalog_name(id) {
            return Err(AuthError::ObjectAlreadyExists(format!(
                "Catalog id {id} (used by '{other}')"
            )));
        }
        self.catalogs.insert(name.to_string(), id);
        self.observe_id(id);
        Ok(())
    }

    pub fn drop_catalog(&mut self, name: &str) -> Result<(), AuthError> {
        if name == DEFAULT_CATALOG {
            return Err(AuthError::PermissionDenied(format!(
                "cannot drop the built-in catalog '{name}'"
            )));
        }
        self.catalogs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AuthError::ObjectNotFound(format!("Catalog '{name}'")))
    }

    pub fn create_database(&mut self, name: &str, id: u64) -> Result<(), AuthError> {
        if self.databases.contains_key(name) {
            return Err(AuthError::ObjectAlreadyExists(format!("Database '{name}'")));
        }
        // права хранят идентификатор, повтор сделал бы чужую базу доступной
        if let Some(other) = self.database_name(id) {
            return Err(AuthError::ObjectAlreadyExists(format!(
                "Database id {id} (used by '{other}')"
            )));
        }
        self.databases.insert(
            name.to_string(),
            DatabaseMeta {
                id,
                tables: BTreeMap::new(),
                functions: BTreeSet::new(),
            },
        );
        self.observe_id(id);
        Ok(())
    }

    /// Удаляет базу данных вместе с ее таблицами и функциями
    pub fn drop_database(&mut self, name: &str) -> Result<DatabaseMeta, AuthError> {
        self.databases
            .remove(name)
            .ok_or_else(|| AuthError::ObjectNotFound(format!("Database '{name}'")))
    }

    fn database_mut(&mut self, name: &str) -> Result<&mut DatabaseMeta, AuthError> {
        self.databases
            .get_mut(name)
            .ok_or_else(|| AuthError::ObjectNotFound(format!("Database '{name}'")))
    }

    pub fn create_table(
        &mut self,
        database: &str,
        name: &str,
        kind: TableKind,
        id: Uuid,
    ) -> Result<(), AuthError> {
        let db = self.database_mut(database)?;
        if db.tables.contains_key(name) {
            return Err(AuthError::ObjectAlreadyExists(format!(
                "{} '{database}.{name}'",
                kind.object_type()
            )));
        }
        db.tables.insert(name.to_string(), TableMeta { id, kind });
        Ok(())
    }

    pub fn drop_table(&mut self, database: &str, name: &str, kind: TableKind) -> Result<(), AuthError> {
        let db = self.database_mut(database)?;
        match db.tables.get(name) {
            Some(meta) if meta.kind == kind => {
                db.tables.remove(name);
                Ok(())
            }
            _ => Err(AuthError::ObjectNotFound(format!(
                "{} '{database}.{name}'",
                kind.object_type()
            ))),
        }
    }

    pub fn create_function(&mut self, database: &str, signature: &str) -> Result<(), AuthError> {
        let db = self.database_mut(database)?;
        if !db.functions.insert(signature.to_string()) {
            return Err(AuthError::ObjectAlreadyExists(format!(
                "Function '{database}.{signature}'"
            )));
        }
        Ok(())
    }

    pub fn drop_function(&mut self, database: &str, signature: &str) -> Result<(), AuthError> {
        let db = self.database_mut(database)?;
        if !db.functions.remove(signature) {
            return Err(AuthError::ObjectNotFound(format!(
                "Function '{database}.{signature}'"
            )));
        }
        Ok(())
    }

    pub fn create_global_function(&mut self, signature: &str) -> Result<(), AuthError> {
        if !self.global_functions.insert(signature.to_string()) {
            return Err(AuthError::ObjectAlreadyExists(format!(
                "Global function '{signature}'"
            )));
        }
        Ok(())
    }

    pub fn drop_global_function(&mut self, signature: &str) -> Result<(), AuthError> {
        if !self.global_functions.remove(signature) {
            return Err(AuthError::ObjectNotFound(format!(
                "Global function '{signature}'"
            )));
        }
        Ok(())
    }

    pub fn create_named(&mut self, kind: NamedKind, name: &str) -> Result<(), AuthError> {
        let set = self.named.entry(named_key(kind).to_string()).or_default();
        if !set.insert(name.to_string()) {
            return Err(AuthError::ObjectAlreadyExists(format!(
                "{} '{name}'",
                kind.object_type()
            )));
        }
        Ok(())
    }

    pub fn drop_named(&mut self, kind: NamedKind, name: &str) -> Result<(), AuthError> {
        let removed = self
            .named
            .get_mut(named_key(kind))
            .is_some_and(|set| set.remove(name));
        if !removed {
            return Err(AuthError::ObjectNotFound(format!(
                "{} '{name}'",
                kind.object_type()
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn catalog_id(&self, name: &str) -> Option<u64> {
        self.catalogs.get(name).copied()
    }

    #[must_use]
    pub fn database(&self, name: &str) -> Option<&DatabaseMeta> {
        self.databases.get(name)
    }

    #[must_use]
    pub fn database_id(&self, name: &str) -> Option<u64> {
        self.databases.get(name).map(|db| db.id)
    }

    /// Табличный объект нужного вида: (id базы, meta)
    #[must_use]
    pub fn table(&self, database: &str, name: &str, kind: TableKind) -> Option<(u64, &TableMeta)> {
        let db = self.databases.get(database)?;
        db.tables
            .get(name)
            .filter(|meta| meta.kind == kind)
            .map(|meta| (db.id, meta))
    }

    #[must_use]
    pub fn has_named(&self, kind: NamedKind, name: &str) -> bool {
        self.named
            .get(named_key(kind))
            .is_some_and(|set| set.contains(name))
    }

    #[must_use]
    pub fn has_global_function(&self, signature: &str) -> bool {
        self.global_functions.contains(signature)
    }

    fn database_by_id(&self, id: u64) -> Option<&DatabaseMeta> {
        self.databases.values().find(|db| db.id == id)
    }

    fn has_table_kind(&self, database: u64, table: &Uuid, kind: TableKind) -> bool {
        self.database_by_id(database).is_some_and(|db| {
            db.tables
                .values()
                .any(|meta| meta.id == *table && meta.kind == kind)
        })
    }

    /// Имя базы по идентификатору (для вывода)
    #[must_use]
    pub fn database_name(&self, id: u64) -> Option<&str> {
        self.databases
            .iter()
            .find(|(_, db)| db.id == id)
            .map(|(name, _)| name.as_str())
    }

    /// Имя таблицы по идентификаторам (для вывода)
    #[must_use]
    pub fn table_name(&self, database: u64, table: &Uuid) -> Option<&str> {
        self.database_by_id(database)?
            .tables
            .iter()
            .find(|(_, meta)| meta.id == *table)
            .map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn catalog_name(&self, id: u64) -> Option<&str> {
        self.catalogs
            .iter()
            .find(|(_, cid)| **cid == id)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Каталог плюс зарегистрированные пользователи: полный `CatalogView`
pub struct ObjectView<'a> {
    pub catalog: &'a MemoryCatalog,
    pub users: &'a BTreeSet<String>,
}

impl CatalogView for ObjectView<'_> {
    fn catalog_exists(&self, id: u64) -> bool {
        self.catalog.catalogs.values().any(|cid| *cid == id)
    }

    fn database_exists(&self, id: u64) -> bool {
        self.catalog.database_by_id(id).is_some()
    }

    fn table_exists(&self, database: u64, table: &Uuid) -> bool {
        self.catalog.has_table_kind(database, table, TableKind::Table)
    }

    fn view_exists(&self, database: u64, view: &Uuid) -> bool {
        self.catalog.has_table_kind(database, view, TableKind::View)
    }

    fn materialized_view_exists(&self, database: u64, view: &Uuid) -> bool {
        self.catalog
            .has_table_kind(database, view, TableKind::MaterializedView)
    }

    fn user_exists(&self, name: &str) -> bool {
        self.users.contains(name)
    }

    fn resource_group_exists(&self, name: &str) -> bool {
        self.catalog.has_named(NamedKind::ResourceGroup, name)
    }

    fn resource_exists(&self, name: &str) -> bool {
        self.catalog.has_named(NamedKind::Resource, name)
    }

    fn storage_volume_exists(&self, name: &str) -> bool {
        self.catalog.has_named(NamedKind::StorageVolume, name)
    }

    fn function_exists(&self, database: u64, signature: &str) -> bool {
        self.catalog
            .database_by_id(database)
            .is_some_and(|db| db.functions.contains(signature))
    }

    fn global_function_exists(&self, signature: &str) -> bool {
        self.catalog.has_global_function(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_exists() {
        let catalog = MemoryCatalog::new();
        assert_eq!(catalog.catalog_id(DEFAULT_CATALOG), Some(DEFAULT_CATALOG_ID));
        assert_eq!(catalog.next_id(), FIRST_OBJECT_ID);
    }

    #[test]
    fn test_create_and_drop_table() {
        let mut catalog = MemoryCatalog::new();
        catalog.create_database("db1", 10001).unwrap();
        let id = Uuid::new_v4();
        catalog.create_table("db1", "t1", TableKind::Table, id).unwrap();

        let (db_id, meta) = catalog.table("db1", "t1", TableKind::Table).unwrap();
        assert_eq!(db_id, 10001);
        assert_eq!(meta.id, id);
        // представление с тем же именем не найдется
        assert!(catalog.table("db1", "t1", TableKind::View).is_none());

        assert!(matches!(
            catalog.drop_table("db1", "t1", TableKind::View),
            Err(AuthError::ObjectNotFound(_))
        ));
        catalog.drop_table("db1", "t1", TableKind::Table).unwrap();
        assert!(catalog.table("db1", "t1", TableKind::Table).is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut catalog = MemoryCatalog::new();
        catalog.create_database("public_db", 10001).unwrap();
        assert!(matches!(
            catalog.create_database("secret_db", 10001),
            Err(AuthError::ObjectAlreadyExists(_))
        ));
        assert!(catalog.database("secret_db").is_none());
        assert_eq!(catalog.database_name(10001), Some("public_db"));

        catalog.create_catalog("hive", 10002).unwrap();
        assert!(matches!(
            catalog.create_catalog("iceberg", 10002),
            Err(AuthError::ObjectAlreadyExists(_))
        ));
        assert!(matches!(
            catalog.create_catalog("other", DEFAULT_CATALOG_ID),
            Err(AuthError::ObjectAlreadyExists(_))
        ));
        assert!(catalog.catalog_id("iceberg").is_none());
    }

    #[test]
    fn test_duplicate_database() {
        let mut catalog = MemoryCatalog::new();
        catalog.create_database("db1", 10001).unwrap();
        assert!(matches!(
            catalog.create_database("db1", 10002),
            Err(AuthError::ObjectAlreadyExists(_))
        ));
        assert_eq!(catalog.next_id(), 10002);
    }

    #[test]
    fn test_cannot_drop_default_catalog() {
        let mut catalog = MemoryCatalog::new();
        assert!(matches!(
            catalog.drop_catalog(DEFAULT_CATALOG),
            Err(AuthError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_object_view() {
        let mut catalog = MemoryCatalog::new();
        catalog.create_database("db1", 10001).unwrap();
        let t1 = Uuid::new_v4();
        let v1 = Uuid::new_v4();
        catalog.create_table("db1", "t1", TableKind::Table, t1).unwrap();
        catalog.create_table("db1", "v1", TableKind::View, v1).unwrap();
        catalog.create_function("db1", "my_add(INT,INT)").unwrap();
        catalog.create_named(NamedKind::ResourceGroup, "rg1").unwrap();

        let users: BTreeSet<String> = ["alice".to_string()].into_iter().collect();
        let view = ObjectView {
            catalog: &catalog,
            users: &users,
        };

        assert!(view.catalog_exists(DEFAULT_CATALOG_ID));
        assert!(view.database_exists(10001));
        assert!(view.table_exists(10001, &t1));
        assert!(!view.table_exists(10001, &v1));
        assert!(view.view_exists(10001, &v1));
        assert!(view.function_exists(10001, "my_add(INT,INT)"));
        assert!(view.resource_group_exists("rg1"));
        assert!(!view.resource_exists("rg1"));
        assert!(view.user_exists("alice"));
        assert!(!view.user_exists("bob"));
    }

    #[test]
    fn test_drop_database_cascades() {
        let mut catalog = MemoryCatalog::new();
        catalog.create_database("db1", 10001).unwrap();
        let t1 = Uuid::new_v4();
        catalog.create_table("db1", "t1", TableKind::Table, t1).unwrap();
        catalog.drop_database("db1").unwrap();

        let users = BTreeSet::new();
        let view = ObjectView {
            catalog: &catalog,
            users: &users,
        };
        assert!(!view.database_exists(10001));
        assert!(!view.table_exists(10001, &t1));
    }
}
