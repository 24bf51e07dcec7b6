use super::object_ref::{NameScope, ObjectRef};
use crate::core::{
    AuthError, AuthState, FunctionObject, NamedKind, PrivilegeObject, Scope, TableKind,
    TableObject,
};

fn not_found(what: impl std::fmt::Display) -> AuthError {
    AuthError::ObjectNotFound(what.to_string())
}

impl AuthState {
    fn resolve_database(&self, name: &str) -> Result<u64, AuthError> {
        self.catalog
            .database_id(name)
            .ok_or_else(|| not_found(format!("Database '{name}'")))
    }

    fn resolve_table(
        &self,
        kind: TableKind,
        database: &NameScope,
        table: &NameScope,
    ) -> Result<TableObject, AuthError> {
        let (database, table) = match (database, table) {
            (NameScope::All, _) => (Scope::All, Scope::All),
            (NameScope::Named(db), NameScope::All) => {
                (Scope::One(self.resolve_database(db)?), Scope::All)
            }
            (NameScope::Named(db), NameScope::Named(name)) => {
                let db_id = self.resolve_database(db)?;
                let (_, meta) = self
                    .catalog
                    .table(db, name, kind)
                    .ok_or_else(|| not_found(format!("{} '{db}.{name}'", kind.object_type())))?;
                (Scope::One(db_id), Scope::One(meta.id))
            }
        };
        Ok(TableObject { database, table })
    }

    fn resolve_named(&self, kind: NamedKind, name: &NameScope) -> Result<Scope<String>, AuthError> {
        match name {
            NameScope::All => Ok(Scope::All),
            NameScope::Named(name) if self.catalog.has_named(kind, name) => {
                Ok(Scope::One(name.clone()))
            }
            NameScope::Named(name) => Err(not_found(format!("{} '{name}'", kind.object_type()))),
        }
    }

    /// Переводит ссылку с именами в шаблон с идентификаторами каталога.
    ///
    /// `None` означает права уровня типа (SYSTEM). Неизвестное имя дает `ObjectNotFound`.
    pub fn resolve_object(&self, object: &ObjectRef) -> Result<Option<PrivilegeObject>, AuthError> {
        let resolved = match object {
            ObjectRef::System => return Ok(None),
            ObjectRef::Table {
                kind,
                database,
                table,
            } => {
                let t = self.resolve_table(*kind, database, table)?;
                match kind {
                    TableKind::Table => PrivilegeObject::Table(t),
                    TableKind::View => PrivilegeObject::View(t),
                    TableKind::MaterializedView => PrivilegeObject::MaterializedView(t),
                }
            }
            ObjectRef::Database(NameScope::All) => PrivilegeObject::Database(Scope::All),
            ObjectRef::Database(NameScope::Named(name)) => {
                PrivilegeObject::database(self.resolve_database(name)?)
            }
            ObjectRef::Catalog(NameScope::All) => PrivilegeObject::Catalog(Scope::All),
            ObjectRef::Catalog(NameScope::Named(name)) => PrivilegeObject::Catalog(Scope::One(
                self.catalog
                    .catalog_id(name)
                    .ok_or_else(|| not_found(format!("Catalog '{name}'")))?,
            )),
            ObjectRef::User(NameScope::All) => PrivilegeObject::User(Scope::All),
            ObjectRef::User(NameScope::Named(name)) => {
                if !self.users.contains_key(name) {
                    return Err(not_found(format!("User '{name}'")));
                }
                PrivilegeObject::User(Scope::One(name.clone()))
            }
            ObjectRef::Named { kind, name } => {
                let scope = self.resolve_named(*kind, name)?;
                match kind {
                    NamedKind::ResourceGroup => PrivilegeObject::ResourceGroup(scope),
                    NamedKind::Resource => PrivilegeObject::Resource(scope),
                    NamedKind::StorageVolume => PrivilegeObject::StorageVolume(scope),
                }
            }
            ObjectRef::Function {
                database,
                signature,
            } => {
                let (database, signature) = match (database, signature) {
                    (NameScope::All, _) => (Scope::All, Scope::All),
                    (NameScope::Named(db), NameScope::All) => {
                        (Scope::One(self.resolve_database(db)?), Scope::All)
                    }
                    (NameScope::Named(db), NameScope::Named(sig)) => {
                        let db_id = self.resolve_database(db)?;
                        let exists = self
                            .catalog
                            .database(db)
                            .is_some_and(|meta| meta.functions.contains(sig));
                        if !exists {
                            return Err(not_found(format!("Function '{db}.{sig}'")));
                        }
                        (Scope::One(db_id), Scope::One(sig.clone()))
                    }
                };
                PrivilegeObject::Function(FunctionObject {
                    database,
                    signature,
                })
            }
            ObjectRef::GlobalFunction(NameScope::All) => PrivilegeObject::GlobalFunction(Scope::All),
            ObjectRef::GlobalFunction(NameScope::Named(sig)) => {
                if !self.catalog.has_global_function(sig) {
                    return Err(not_found(format!("Global function '{sig}'")));
                }
                PrivilegeObject::GlobalFunction(Scope::One(sig.clone()))
            }
        };
        Ok(Some(resolved))
    }

    pub fn resolve_objects(&self, objects: &[ObjectRef]) -> Result<Vec<Option<PrivilegeObject>>, AuthError> {
        objects.iter().map(|o| self.resolve_object(o)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ObjectType;
    use crate::parser::parse_object_refs;
    use uuid::Uuid;

    fn state() -> (AuthState, Uuid) {
        let mut state = AuthState::initialize("root");
        state.catalog.create_database("db1", 10001).unwrap();
        let t1 = Uuid::new_v4();
        state
            .catalog
            .create_table("db1", "t1", TableKind::Table, t1)
            .unwrap();
        state.catalog.create_function("db1", "my_add(INT,INT)").unwrap();
        (state, t1)
    }

    fn resolve(state: &AuthState, object_type: ObjectType, text: &str) -> Result<Vec<Option<PrivilegeObject>>, AuthError> {
        state.resolve_objects(&parse_object_refs(object_type, text)?)
    }

    #[test]
    fn test_resolve_tables() {
        let (state, t1) = state();
        assert_eq!(
            resolve(&state, ObjectType::Table, "db1.t1, db1.*, *.*").unwrap(),
            vec![
                Some(PrivilegeObject::table(10001, t1)),
                Some(PrivilegeObject::all_tables_in(10001)),
                Some(PrivilegeObject::all_tables()),
            ]
        );
    }

    #[test]
    fn test_unknown_names() {
        let (state, _) = state();
        assert!(matches!(
            resolve(&state, ObjectType::Table, "db1.missing"),
            Err(AuthError::ObjectNotFound(_))
        ));
        assert!(matches!(
            resolve(&state, ObjectType::Table, "nodb.*"),
            Err(AuthError::ObjectNotFound(_))
        ));
        // t1 таблица, а не представление
        assert!(matches!(
            resolve(&state, ObjectType::View, "db1.t1"),
            Err(AuthError::ObjectNotFound(_))
        ));
        assert!(matches!(
            resolve(&state, ObjectType::User, "ghost"),
            Err(AuthError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_functions_and_system() {
        let (state, _) = state();
        assert_eq!(
            resolve(&state, ObjectType::Function, "db1.my_add(int, int)").unwrap(),
            vec![Some(PrivilegeObject::Function(FunctionObject {
                database: Scope::One(10001),
                signature: Scope::One("my_add(INT,INT)".to_string()),
            }))]
        );
        assert_eq!(resolve(&state, ObjectType::System, "").unwrap(), vec![None]);
    }

    #[test]
    fn test_resolve_user_and_database() {
        let (state, _) = state();
        assert_eq!(
            resolve(&state, ObjectType::User, "root").unwrap(),
            vec![Some(PrivilegeObject::User(Scope::One("root".to_string())))]
        );
        assert_eq!(
            resolve(&state, ObjectType::Database, "db1").unwrap(),
            vec![Some(PrivilegeObject::database(10001))]
        );
    }
}
