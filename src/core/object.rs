use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::catalog::CatalogView;
use super::object_type::ObjectType;

/// Область действия одного поля шаблона: конкретный объект или все объекты
///
/// `All` сортируется раньше `One`, поэтому нечеткие записи стоят в начале списка.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope<T> {
    All,
    One(T),
}

impl<T: PartialEq> Scope<T> {
    /// `self` включает `other`: `All` включает всё, `One(x)` только `One(x)`
    pub fn covers(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::All, _) => true,
            (Self::One(a), Self::One(b)) => a == b,
            (Self::One(_), Self::All) => false,
        }
    }

    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub const fn as_one(&self) -> Option<&T> {
        match self {
            Self::All => None,
            Self::One(value) => Some(value),
        }
    }
}

/// Таблица, представление или материализованное представление.
/// `database == All` всегда означает и `table == All`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableObject {
    pub database: Scope<u64>,
    pub table: Scope<Uuid>,
}

impl TableObject {
    fn covers(&self, other: &Self) -> bool {
        self.database.covers(&other.database) && self.table.covers(&other.table)
    }
}

/// Пользовательская функция внутри базы данных
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionObject {
    pub database: Scope<u64>,
    pub signature: Scope<String>,
}

impl FunctionObject {
    fn covers(&self, other: &Self) -> bool {
        self.database.covers(&other.database) && self.signature.covers(&other.signature)
    }
}

/// Шаблон объекта в записи прав.
///
/// Отсутствие объекта (права уровня типа, например SYSTEM) выражается через
/// `Option<PrivilegeObject>::None` на стороне коллекции. Порядок выводится из
/// самих данных (семейство, затем поля), так что он одинаков между перезапусками.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrivilegeObject {
    Table(TableObject),
    View(TableObject),
    MaterializedView(TableObject),
    Database(Scope<u64>),
    Catalog(Scope<u64>),
    User(Scope<String>),
    ResourceGroup(Scope<String>),
    Resource(Scope<String>),
    StorageVolume(Scope<String>),
    Function(FunctionObject),
    GlobalFunction(Scope<String>),
}

impl PrivilegeObject {
    #[must_use]
    pub const fn table(database: u64, table: Uuid) -> Self {
        Self::Table(TableObject {
            database: Scope::One(database),
            table: Scope::One(table),
        })
    }

    #[must_use]
    pub const fn all_tables_in(database: u64) -> Self {
        Self::Table(TableObject {
            database: Scope::One(database),
            table: Scope::All,
        })
    }

    #[must_use]
    pub const fn all_tables() -> Self {
        Self::Table(TableObject {
            database: Scope::All,
            table: Scope::All,
        })
    }

    #[must_use]
    pub const fn database(id: u64) -> Self {
        Self::Database(Scope::One(id))
    }

    /// Шаблон "все объекты" для типа; `None` для SYSTEM
    #[must_use]
    pub fn all_of(object_type: ObjectType) -> Option<Self> {
        let all_tables = TableObject {
            database: Scope::All,
            table: Scope::All,
        };
        Some(match object_type {
            ObjectType::Table => Self::Table(all_tables),
            ObjectType::View => Self::View(all_tables),
            ObjectType::MaterializedView => Self::MaterializedView(all_tables),
            ObjectType::Database => Self::Database(Scope::All),
            ObjectType::Catalog => Self::Catalog(Scope::All),
            ObjectType::User => Self::User(Scope::All),
            ObjectType::ResourceGroup => Self::ResourceGroup(Scope::All),
            ObjectType::Resource => Self::Resource(Scope::All),
            ObjectType::StorageVolume => Self::StorageVolume(Scope::All),
            ObjectType::Function => Self::Function(FunctionObject {
                database: Scope::All,
                signature: Scope::All,
            }),
            ObjectType::GlobalFunction => Self::GlobalFunction(Scope::All),
            ObjectType::System => return None,
        })
    }

    /// Тип объектов, к которому относится шаблон
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        match self {
            Self::Table(_) => ObjectType::Table,
            Self::View(_) => ObjectType::View,
            Self::MaterializedView(_) => ObjectType::MaterializedView,
            Self::Database(_) => ObjectType::Database,
            Self::Catalog(_) => ObjectType::Catalog,
            Self::User(_) => ObjectType::User,
            Self::ResourceGroup(_) => ObjectType::ResourceGroup,
            Self::Resource(_) => ObjectType::Resource,
            Self::StorageVolume(_) => ObjectType::StorageVolume,
            Self::Function(_) => ObjectType::Function,
            Self::GlobalFunction(_) => ObjectType::GlobalFunction,
        }
    }

    /// Включает ли область `self` объект или шаблон `other`.
    ///
    /// Направленная проверка: нечеткий шаблон включает конкретные объекты в своей
    /// области, конкретный объект включает только равный себе.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Table(a), Self::Table(b))
            | (Self::View(a), Self::View(b))
            | (Self::MaterializedView(a), Self::MaterializedView(b)) => a.covers(b),
            (Self::Database(a), Self::Database(b)) | (Self::Catalog(a), Self::Catalog(b)) => {
                a.covers(b)
            }
            (Self::User(a), Self::User(b))
            | (Self::ResourceGroup(a), Self::ResourceGroup(b))
            | (Self::Resource(a), Self::Resource(b))
            | (Self::StorageVolume(a), Self::StorageVolume(b))
            | (Self::GlobalFunction(a), Self::GlobalFunction(b)) => a.covers(b),
            (Self::Function(a), Self::Function(b)) => a.covers(b),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_fuzzy(&self) -> bool {
        match self {
            Self::Table(t) | Self::View(t) | Self::MaterializedView(t) => {
                t.database.is_all() || t.table.is_all()
            }
            Self::Database(s) | Self::Catalog(s) => s.is_all(),
            Self::User(s)
            | Self::ResourceGroup(s)
            | Self::Resource(s)
            | Self::StorageVolume(s)
            | Self::GlobalFunction(s) => s.is_all(),
            Self::Function(f) => f.database.is_all() || f.signature.is_all(),
        }
    }

    /// Существует ли еще объект, на который ссылается шаблон.
    ///
    /// Нечеткие шаблоны всегда валидны. Отсутствие объекта не ошибка:
    /// по нему сборщик удаляет устаревшие записи.
    #[must_use]
    pub fn validate(&self, view: &dyn CatalogView) -> bool {
        if self.is_fuzzy() {
            return true;
        }
        match self {
            Self::Table(t) => one_pair(&t.database, &t.table)
                .is_some_and(|(db, tbl)| view.table_exists(*db, tbl)),
            Self::View(t) => one_pair(&t.database, &t.table)
                .is_some_and(|(db, tbl)| view.view_exists(*db, tbl)),
            Self::MaterializedView(t) => one_pair(&t.database, &t.table)
                .is_some_and(|(db, tbl)| view.materialized_view_exists(*db, tbl)),
            Self::Database(s) => s.as_one().is_some_and(|id| view.database_exists(*id)),
            Self::Catalog(s) => s.as_one().is_some_and(|id| view.catalog_exists(*id)),
            Self::User(s) => s.as_one().is_some_and(|name| view.user_exists(name)),
            Self::ResourceGroup(s) => s
                .as_one()
                .is_some_and(|name| view.resource_group_exists(name)),
            Self::Resource(s) => s.as_one().is_some_and(|name| view.resource_exists(name)),
            Self::StorageVolume(s) => s
                .as_one()
                .is_some_and(|name| view.storage_volume_exists(name)),
            Self::Function(f) => one_pair(&f.database, &f.signature)
                .is_some_and(|(db, sig)| view.function_exists(*db, sig)),
            Self::GlobalFunction(s) => s
                .as_one()
                .is_some_and(|sig| view.global_function_exists(sig)),
        }
    }
}

fn one_pair<'a, A: PartialEq, B: PartialEq>(
    a: &'a Scope<A>,
    b: &'a Scope<B>,
) -> Option<(&'a A, &'a B)> {
    Some((a.as_one()?, b.as_one()?))
}

fn fmt_table_like(f: &mut fmt::Formatter<'_>, t: &TableObject, plural: &str) -> fmt::Result {
    match (&t.database, &t.table) {
        (Scope::All, _) => write!(f, "ALL {plural} IN ALL DATABASES"),
        (Scope::One(db), Scope::All) => write!(f, "ALL {plural} IN DATABASE {db}"),
        (Scope::One(db), Scope::One(tbl)) => write!(f, "{db}.{tbl}"),
    }
}

fn fmt_named(f: &mut fmt::Formatter<'_>, s: &Scope<String>, plural: &str) -> fmt::Result {
    match s {
        Scope::All => write!(f, "ALL {plural}"),
        Scope::One(name) => write!(f, "{name}"),
    }
}

impl fmt::Display for PrivilegeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(t) => fmt_table_like(f, t, "TABLES"),
            Self::View(t) => fmt_table_like(f, t, "VIEWS"),
            Self::MaterializedView(t) => fmt_table_like(f, t, "MATERIALIZED VIEWS"),
            Self::Database(Scope::All) => write!(f, "ALL DATABASES"),
            Self::Database(Scope::One(id)) => write!(f, "{id}"),
            Self::Catalog(Scope::All) => write!(f, "ALL CATALOGS"),
            Self::Catalog(Scope::One(id)) => write!(f, "{id}"),
            Self::User(Scope::All) => write!(f, "ALL USERS"),
            Self::User(Scope::One(name)) => write!(f, "'{name}'"),
            Self::ResourceGroup(s) => fmt_named(f, s, "RESOURCE GROUPS"),
            Self::Resource(s) => fmt_named(f, s, "RESOURCES"),
            Self::StorageVolume(s) => fmt_named(f, s, "STORAGE VOLUMES"),
            Self::GlobalFunction(s) => fmt_named(f, s, "GLOBAL FUNCTIONS"),
            Self::Function(func) => match (&func.database, &func.signature) {
                (Scope::All, _) => write!(f, "ALL FUNCTIONS IN ALL DATABASES"),
                (Scope::One(db), Scope::All) => write!(f, "ALL FUNCTIONS IN DATABASE {db}"),
                (Scope::One(db), Scope::One(sig)) => write!(f, "{db}.{sig}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    struct FakeCatalog {
        tables: BTreeSet<(u64, Uuid)>,
        databases: BTreeSet<u64>,
    }

    impl CatalogView for FakeCatalog {
        fn catalog_exists(&self, _id: u64) -> bool {
            false
        }
        fn database_exists(&self, id: u64) -> bool {
            self.databases.contains(&id)
        }
        fn table_exists(&self, database: u64, table: &Uuid) -> bool {
            self.tables.contains(&(database, *table))
        }
        fn view_exists(&self, _database: u64, _view: &Uuid) -> bool {
            false
        }
        fn materialized_view_exists(&self, _database: u64, _view: &Uuid) -> bool {
            false
        }
        fn user_exists(&self, _name: &str) -> bool {
            false
        }
        fn resource_group_exists(&self, _name: &str) -> bool {
            false
        }
        fn resource_exists(&self, _name: &str) -> bool {
            false
        }
        fn storage_volume_exists(&self, _name: &str) -> bool {
            false
        }
        fn function_exists(&self, _database: u64, _signature: &str) -> bool {
            false
        }
        fn global_function_exists(&self, _signature: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_fuzzy_table_covers_concrete() {
        let t1 = Uuid::new_v4();
        let concrete = PrivilegeObject::table(10, t1);

        assert!(PrivilegeObject::all_tables_in(10).covers(&concrete));
        assert!(PrivilegeObject::all_tables().covers(&concrete));
        assert!(!PrivilegeObject::all_tables_in(11).covers(&concrete));
        assert!(concrete.covers(&concrete.clone()));
    }

    #[test]
    fn test_concrete_does_not_cover_fuzzy() {
        let concrete = PrivilegeObject::table(10, Uuid::new_v4());
        assert!(!concrete.covers(&PrivilegeObject::all_tables_in(10)));
        assert!(!PrivilegeObject::all_tables_in(10).covers(&PrivilegeObject::all_tables()));
        assert!(PrivilegeObject::all_tables().covers(&PrivilegeObject::all_tables_in(10)));
    }

    #[test]
    fn test_families_never_cover_each_other() {
        let table = PrivilegeObject::all_tables();
        let view = PrivilegeObject::all_of(ObjectType::View).unwrap();
        assert!(!table.covers(&view));
        assert!(!view.covers(&table));
        assert!(!PrivilegeObject::Database(Scope::All).covers(&PrivilegeObject::Catalog(Scope::One(0))));
    }

    #[test]
    fn test_is_fuzzy() {
        assert!(PrivilegeObject::all_tables().is_fuzzy());
        assert!(PrivilegeObject::all_tables_in(1).is_fuzzy());
        assert!(!PrivilegeObject::table(1, Uuid::new_v4()).is_fuzzy());
        assert!(!PrivilegeObject::User(Scope::One("alice".to_string())).is_fuzzy());
        assert!(PrivilegeObject::User(Scope::All).is_fuzzy());
    }

    #[test]
    fn test_ordering_puts_wildcards_first() {
        let t = Uuid::new_v4();
        let mut objects = vec![
            PrivilegeObject::table(2, t),
            PrivilegeObject::all_tables_in(2),
            PrivilegeObject::table(1, t),
            PrivilegeObject::all_tables(),
        ];
        objects.sort();
        assert_eq!(objects[0], PrivilegeObject::all_tables());
        assert_eq!(objects[1], PrivilegeObject::table(1, t));
        assert_eq!(objects[2], PrivilegeObject::all_tables_in(2));
        assert_eq!(objects[3], PrivilegeObject::table(2, t));
    }

    #[test]
    fn test_validate_against_catalog() {
        let live = Uuid::new_v4();
        let dropped = Uuid::new_v4();
        let catalog = FakeCatalog {
            tables: [(1, live)].into_iter().collect(),
            databases: [1].into_iter().collect(),
        };

        assert!(PrivilegeObject::table(1, live).validate(&catalog));
        assert!(!PrivilegeObject::table(1, dropped).validate(&catalog));
        assert!(PrivilegeObject::database(1).validate(&catalog));
        assert!(!PrivilegeObject::database(2).validate(&catalog));
        // нечеткие шаблоны не проверяются
        assert!(PrivilegeObject::all_tables_in(99).validate(&catalog));
        assert!(PrivilegeObject::Resource(Scope::All).validate(&catalog));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            PrivilegeObject::all_tables_in(10001).to_string(),
            "ALL TABLES IN DATABASE 10001"
        );
        assert_eq!(
            PrivilegeObject::all_tables().to_string(),
            "ALL TABLES IN ALL DATABASES"
        );
        assert_eq!(
            PrivilegeObject::ResourceGroup(Scope::All).to_string(),
            "ALL RESOURCE GROUPS"
        );
        assert_eq!(
            PrivilegeObject::User(Scope::One("bob".to_string())).to_string(),
            "'bob'"
        );
    }
}
