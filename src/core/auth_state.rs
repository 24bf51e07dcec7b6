use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::catalog::{MemoryCatalog, ObjectView};
use super::collection::PrivilegeCollection;
use super::error::AuthError;
use super::object::{PrivilegeObject, Scope, TableObject};
use super::object_type::ObjectType;
use super::privilege::{ActionSet, PrivilegeType};
use super::role::Role;
use super::user::User;

pub const ROOT_ROLE: &str = "root";
pub const PUBLIC_ROLE: &str = "public";

/// Получатель прав: пользователь или роль
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Grantee {
    User(String),
    Role(String),
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(name) => write!(f, "USER '{name}'"),
            Self::Role(name) => write!(f, "ROLE '{name}'"),
        }
    }
}

/// Строка вывода SHOW GRANTS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRow {
    pub object_type: ObjectType,
    pub object: String,
    pub actions: String,
    pub grantable: bool,
}

/// Корневой объект авторизации - пользователи, роли и каталог объектов
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthState {
    /// Все пользователи: name -> User
    pub users: BTreeMap<String, User>,
    /// Все роли: name -> Role
    pub roles: BTreeMap<String, Role>,
    /// Объекты, на которые выдаются права
    pub catalog: MemoryCatalog,
}

impl AuthState {
    /// Пустое состояние со встроенными ролями `root` и `public`
    #[must_use]
    pub fn new() -> Self {
        let mut root = Role::new(ROOT_ROLE.to_string(), true);
        for object_type in ObjectType::ALL {
            root.privileges.grant(
                object_type,
                object_type.all_actions(),
                &[PrivilegeObject::all_of(object_type)],
                true,
            );
        }
        let public = Role::new(PUBLIC_ROLE.to_string(), true);

        let mut roles = BTreeMap::new();
        roles.insert(ROOT_ROLE.to_string(), root);
        roles.insert(PUBLIC_ROLE.to_string(), public);

        Self {
            users: BTreeMap::new(),
            roles,
            catalog: MemoryCatalog::new(),
        }
    }

    /// Создает начальную конфигурацию (суперпользователь с ролью root)
    #[must_use]
    pub fn initialize(root_user: &str) -> Self {
        let mut state = Self::new();
        let mut user = User::new(root_user.to_string());
        user.grant_role(ROOT_ROLE);
        state.users.insert(root_user.to_string(), user);
        state
    }

    pub fn user(&self, name: &str) -> Result<&User, AuthError> {
        self.users
            .get(name)
            .ok_or_else(|| AuthError::UserNotFound(name.to_string()))
    }

    pub fn role(&self, name: &str) -> Result<&Role, AuthError> {
        self.roles
            .get(name)
            .ok_or_else(|| AuthError::RoleNotFound(name.to_string()))
    }

    /// Создает пользователя
    pub fn create_user(&mut self, name: &str) -> Result<(), AuthError> {
        if self.users.contains_key(name) {
            return Err(AuthError::UserAlreadyExists(name.to_string()));
        }
        self.users.insert(name.to_string(), User::new(name.to_string()));
        Ok(())
    }

    /// Удаляет пользователя вместе с его правами
    pub fn drop_user(&mut self, name: &str) -> Result<(), AuthError> {
        self.users
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AuthError::UserNotFound(name.to_string()))
    }

    pub fn create_role(&mut self, name: &str) -> Result<(), AuthError> {
        if self.roles.contains_key(name) {
            return Err(AuthError::RoleAlreadyExists(name.to_string()));
        }
        self.roles
            .insert(name.to_string(), Role::new(name.to_string(), false));
        Ok(())
    }

    /// Удаляет роль и отвязывает ее от всех пользователей и ролей
    pub fn drop_role(&mut self, name: &str) -> Result<(), AuthError> {
        if self.role(name)?.is_builtin {
            return Err(AuthError::PermissionDenied(format!(
                "cannot drop built-in role '{name}'"
            )));
        }
        self.roles.remove(name);
        for user in self.users.values_mut() {
            user.revoke_role(name);
        }
        for role in self.roles.values_mut() {
            role.remove_parent_role(name);
        }
        Ok(())
    }

    fn collection_mut(&mut self, grantee: &Grantee) -> Result<&mut PrivilegeCollection, AuthError> {
        match grantee {
            Grantee::User(name) => self
                .users
                .get_mut(name)
                .map(|u| &mut u.privileges)
                .ok_or_else(|| AuthError::UserNotFound(name.clone())),
            Grantee::Role(name) => {
                let role = self
                    .roles
                    .get_mut(name)
                    .ok_or_else(|| AuthError::RoleNotFound(name.clone()))?;
                if role.name == ROOT_ROLE {
                    return Err(AuthError::PermissionDenied(format!(
                        "privileges of built-in role '{ROOT_ROLE}' cannot be changed"
                    )));
                }
                Ok(&mut role.privileges)
            }
        }
    }

    /// Собственные (без ролей) права получателя
    pub fn privileges(&self, grantee: &Grantee) -> Result<&PrivilegeCollection, AuthError> {
        match grantee {
            Grantee::User(name) => self.user(name).map(|u| &u.privileges),
            Grantee::Role(name) => self.role(name).map(|r| &r.privileges),
        }
    }

    /// Проверяет, что права и объекты подходят к типу
    pub fn validate_grant(
        object_type: ObjectType,
        actions: ActionSet,
        objects: &[Option<PrivilegeObject>],
    ) -> Result<(), AuthError> {
        if actions.is_empty() {
            return Err(AuthError::ParseError("no privileges specified".to_string()));
        }
        if objects.is_empty() {
            return Err(AuthError::ParseError("no objects specified".to_string()));
        }
        if let Some(action) = actions
            .actions()
            .into_iter()
            .find(|a| !object_type.is_valid_action(*a))
        {
            return Err(AuthError::InvalidPrivilege {
                object_type,
                action: action.to_string(),
            });
        }
        for object in objects {
            let fits = match object {
                None => object_type == ObjectType::System,
                Some(o) => o.object_type() == object_type,
            };
            if !fits {
                return Err(AuthError::ObjectTypeMismatch {
                    expected: object_type,
                    found: object
                        .as_ref()
                        .map_or_else(|| "<none>".to_string(), ToString::to_string),
                });
            }
        }
        Ok(())
    }

    pub fn grant_privileges(
        &mut self,
        grantee: &Grantee,
        object_type: ObjectType,
        actions: ActionSet,
        objects: &[Option<PrivilegeObject>],
        with_grant_option: bool,
    ) -> Result<(), AuthError> {
        Self::validate_grant(object_type, actions, objects)?;
        self.collection_mut(grantee)?
            .grant(object_type, actions, objects, with_grant_option);
        Ok(())
    }

    pub fn revoke_privileges(
        &mut self,
        grantee: &Grantee,
        object_type: ObjectType,
        actions: ActionSet,
        objects: &[Option<PrivilegeObject>],
    ) -> Result<(), AuthError> {
        Self::validate_grant(object_type, actions, objects)?;
        self.collection_mut(grantee)?
            .revoke(object_type, actions, objects)
    }

    /// Наследует ли роль `from` (напрямую или через цепочку) роль `target`
    fn inherits(&self, from: &str, target: &str) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(name) = stack.pop() {
            if name == target {
                return true;
            }
            if !visited.insert(name) {
                continue;
            }
            if let Some(role) = self.roles.get(name) {
                stack.extend(role.parent_roles.iter().map(String::as_str));
            }
        }
        false
    }

    /// Выдает роль пользователю или другой роли
    pub fn grant_role(&mut self, role: &str, grantee: &Grantee) -> Result<(), AuthError> {
        self.role(role)?;
        match grantee {
            Grantee::User(name) => {
                self.users
                    .get_mut(name)
                    .ok_or_else(|| AuthError::UserNotFound(name.clone()))?
                    .grant_role(role);
            }
            Grantee::Role(name) => {
                self.role(name)?;
                if self.inherits(role, name) {
                    return Err(AuthError::RoleCycle(role.to_string()));
                }
                if let Some(target) = self.roles.get_mut(name) {
                    target.add_parent_role(role);
                }
            }
        }
        Ok(())
    }

    pub fn revoke_role(&mut self, role: &str, grantee: &Grantee) -> Result<(), AuthError> {
        let revoked = match grantee {
            Grantee::User(name) => self
                .users
                .get_mut(name)
                .ok_or_else(|| AuthError::UserNotFound(name.clone()))?
                .revoke_role(role),
            Grantee::Role(name) => self
                .roles
                .get_mut(name)
                .ok_or_else(|| AuthError::RoleNotFound(name.clone()))?
                .remove_parent_role(role),
        };
        if !revoked {
            return Err(AuthError::RoleNotGranted {
                role: role.to_string(),
                grantee: grantee.to_string(),
            });
        }
        Ok(())
    }

    /// Итоговые права: собственные права, слитые со всеми достижимыми ролями.
    ///
    /// Роли обходятся в глубину в порядке имен, каждая ровно один раз;
    /// пользователь всегда получает `public`.
    pub fn effective_privileges(&self, grantee: &Grantee) -> Result<PrivilegeCollection, AuthError> {
        let mut visited = BTreeSet::new();
        let (mut merged, start): (PrivilegeCollection, Vec<&str>) = match grantee {
            Grantee::User(name) => {
                let user = self.user(name)?;
                let mut start = vec![PUBLIC_ROLE];
                start.extend(user.roles.iter().map(String::as_str));
                (user.privileges.clone(), start)
            }
            Grantee::Role(name) => {
                let role = self.role(name)?;
                visited.insert(role.name.as_str());
                let start = role.parent_roles.iter().map(String::as_str).collect();
                (role.privileges.clone(), start)
            }
        };

        let mut stack: Vec<&str> = start.into_iter().rev().collect();
        while let Some(name) = stack.pop() {
            if !visited.insert(name) {
                continue;
            }
            let Some(role) = self.roles.get(name) else {
                continue;
            };
            merged.merge(&role.privileges);
            stack.extend(role.parent_roles.iter().rev().map(String::as_str));
        }
        Ok(merged)
    }

    /// Может ли пользователь выполнить действие над объектом
    pub fn check_privilege(
        &self,
        user: &str,
        object_type: ObjectType,
        action: PrivilegeType,
        object: Option<&PrivilegeObject>,
    ) -> Result<bool, AuthError> {
        let effective = self.effective_privileges(&Grantee::User(user.to_string()))?;
        Ok(effective.check(object_type, action, object))
    }

    /// Есть ли у пользователя хоть что-то на объекте или внутри него
    pub fn search_privilege(
        &self,
        user: &str,
        object_type: ObjectType,
        object: Option<&PrivilegeObject>,
        action: Option<PrivilegeType>,
    ) -> Result<bool, AuthError> {
        let effective = self.effective_privileges(&Grantee::User(user.to_string()))?;
        Ok(match action {
            Some(action) => effective.search_action_on_object(object_type, object, action),
            None => effective.search_any_action_on_object(object_type, object),
        })
    }

    /// Видна ли пользователю база данных (SHOW DATABASES): права на саму базу
    /// или на что-нибудь внутри нее
    pub fn can_see_database(&self, user: &str, database: u64) -> Result<bool, AuthError> {
        let effective = self.effective_privileges(&Grantee::User(user.to_string()))?;
        let inner = TableObject {
            database: Scope::One(database),
            table: Scope::All,
        };
        Ok(effective.search_any_action_on_object(
            ObjectType::Database,
            Some(&PrivilegeObject::database(database)),
        ) || effective
            .search_any_action_on_object(ObjectType::Table, Some(&PrivilegeObject::Table(inner.clone())))
            || effective
                .search_any_action_on_object(ObjectType::View, Some(&PrivilegeObject::View(inner.clone())))
            || effective.search_any_action_on_object(
                ObjectType::MaterializedView,
                Some(&PrivilegeObject::MaterializedView(inner)),
            ))
    }

    /// Может ли `granter` выдать права другим: системное GRANT или grant option
    pub fn check_grantable(
        &self,
        granter: &str,
        object_type: ObjectType,
        actions: ActionSet,
        objects: &[Option<PrivilegeObject>],
    ) -> Result<bool, AuthError> {
        let effective = self.effective_privileges(&Grantee::User(granter.to_string()))?;
        Ok(effective.check(ObjectType::System, PrivilegeType::Grant, None)
            || effective.allow_grant(object_type, actions, objects))
    }

    /// Удаляет у всех пользователей и ролей записи на удаленные объекты
    pub fn remove_invalid_objects(&mut self) -> usize {
        let user_names: BTreeSet<String> = self.users.keys().cloned().collect();
        let view = ObjectView {
            catalog: &self.catalog,
            users: &user_names,
        };
        let mut removed = 0;
        for user in self.users.values_mut() {
            removed += user.privileges.remove_invalid_objects(&view);
        }
        for role in self.roles.values_mut() {
            removed += role.privileges.remove_invalid_objects(&view);
        }
        removed
    }

    /// Человекочитаемое имя объекта: идентификаторы заменяются именами из каталога
    #[must_use]
    pub fn object_label(&self, object: &PrivilegeObject) -> String {
        let db_name = |id: &u64| {
            self.catalog
                .database_name(*id)
                .map_or_else(|| id.to_string(), str::to_string)
        };
        match object {
            PrivilegeObject::Table(t)
            | PrivilegeObject::View(t)
            | PrivilegeObject::MaterializedView(t) => match (&t.database, &t.table) {
                (Scope::One(db), Scope::One(tbl)) => {
                    let table = self
                        .catalog
                        .table_name(*db, tbl)
                        .map_or_else(|| tbl.to_string(), str::to_string);
                    format!("{}.{table}", db_name(db))
                }
                (Scope::One(db), Scope::All) => {
                    let plural = match object.object_type() {
                        ObjectType::View => "VIEWS",
                        ObjectType::MaterializedView => "MATERIALIZED VIEWS",
                        _ => "TABLES",
                    };
                    format!("ALL {plural} IN DATABASE {}", db_name(db))
                }
                _ => object.to_string(),
            },
            PrivilegeObject::Database(Scope::One(id)) => db_name(id),
            PrivilegeObject::Catalog(Scope::One(id)) => self
                .catalog
                .catalog_name(*id)
                .map_or_else(|| id.to_string(), str::to_string),
            PrivilegeObject::Function(f) => match (&f.database, &f.signature) {
                (Scope::One(db), Scope::One(sig)) => format!("{}.{sig}", db_name(db)),
                (Scope::One(db), Scope::All) => {
                    format!("ALL FUNCTIONS IN DATABASE {}", db_name(db))
                }
                _ => object.to_string(),
            },
            _ => object.to_string(),
        }
    }

    /// Собственные права получателя в виде строк SHOW GRANTS
    pub fn show_grants(&self, grantee: &Grantee) -> Result<Vec<GrantRow>, AuthError> {
        let collection = self.privileges(grantee)?;
        let rows = collection
            .buckets()
            .iter()
            .flat_map(|(object_type, entries)| {
                entries.iter().map(move |entry| GrantRow {
                    object_type: *object_type,
                    object: entry
                        .object
                        .as_ref()
                        .map_or_else(|| object_type.to_string(), |o| self.object_label(o)),
                    actions: entry.actions.to_string(),
                    grantable: entry.with_grant_option,
                })
            })
            .collect();
        Ok(rows)
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::TableKind;
    use uuid::Uuid;

    fn setup() -> (AuthState, u64, Uuid) {
        let mut state = AuthState::initialize("root");
        state.catalog.create_database("db1", 10001).unwrap();
        let t1 = Uuid::new_v4();
        state
            .catalog
            .create_table("db1", "t1", TableKind::Table, t1)
            .unwrap();
        state.create_user("alice").unwrap();
        (state, 10001, t1)
    }

    fn user(name: &str) -> Grantee {
        Grantee::User(name.to_string())
    }

    fn role(name: &str) -> Grantee {
        Grantee::Role(name.to_string())
    }

    #[test]
    fn test_root_has_everything() {
        let (state, db, t1) = setup();
        let table = PrivilegeObject::table(db, t1);
        assert!(state
            .check_privilege("root", ObjectType::Table, PrivilegeType::Drop, Some(&table))
            .unwrap());
        assert!(state
            .check_privilege("root", ObjectType::System, PrivilegeType::Grant, None)
            .unwrap());
        assert!(state
            .check_grantable("root", ObjectType::Table, ActionSet::SELECT, &[Some(table)])
            .unwrap());
    }

    #[test]
    fn test_privileges_through_role_chain() {
        let (mut state, db, t1) = setup();
        let table = PrivilegeObject::table(db, t1);
        state.create_role("readonly").unwrap();
        state.create_role("analyst").unwrap();
        state
            .grant_privileges(
                &role("readonly"),
                ObjectType::Table,
                ActionSet::SELECT,
                &[Some(PrivilegeObject::all_tables_in(db))],
                false,
            )
            .unwrap();
        state.grant_role("readonly", &role("analyst")).unwrap();
        state.grant_role("analyst", &user("alice")).unwrap();

        assert!(state
            .check_privilege("alice", ObjectType::Table, PrivilegeType::Select, Some(&table))
            .unwrap());
        assert!(!state
            .check_privilege("alice", ObjectType::Table, PrivilegeType::Insert, Some(&table))
            .unwrap());
        assert!(state.can_see_database("alice", db).unwrap());
        assert!(!state.can_see_database("alice", db + 1).unwrap());
    }

    #[test]
    fn test_role_cycle_rejected() {
        let (mut state, _, _) = setup();
        state.create_role("a").unwrap();
        state.create_role("b").unwrap();
        state.grant_role("a", &role("b")).unwrap();
        assert!(matches!(
            state.grant_role("b", &role("a")),
            Err(AuthError::RoleCycle(_))
        ));
        assert!(matches!(
            state.grant_role("a", &role("a")),
            Err(AuthError::RoleCycle(_))
        ));
    }

    #[test]
    fn test_invalid_privilege_for_type() {
        let (mut state, db, _) = setup();
        let result = state.grant_privileges(
            &user("alice"),
            ObjectType::Database,
            ActionSet::SELECT,
            &[Some(PrivilegeObject::database(db))],
            false,
        );
        assert!(matches!(result, Err(AuthError::InvalidPrivilege { .. })));

        let result = state.grant_privileges(
            &user("alice"),
            ObjectType::Table,
            ActionSet::SELECT,
            &[Some(PrivilegeObject::database(db))],
            false,
        );
        assert!(matches!(result, Err(AuthError::ObjectTypeMismatch { .. })));
    }

    #[test]
    fn test_root_role_is_immutable() {
        let (mut state, _, _) = setup();
        assert!(matches!(state.drop_role(ROOT_ROLE), Err(AuthError::PermissionDenied(_))));
        let result = state.revoke_privileges(
            &role(ROOT_ROLE),
            ObjectType::System,
            ActionSet::GRANT,
            &[None],
        );
        assert!(matches!(result, Err(AuthError::PermissionDenied(_))));
    }

    #[test]
    fn test_drop_role_detaches_it() {
        let (mut state, _, _) = setup();
        state.create_role("r1").unwrap();
        state.create_role("r2").unwrap();
        state.grant_role("r1", &user("alice")).unwrap();
        state.grant_role("r1", &role("r2")).unwrap();

        state.drop_role("r1").unwrap();
        assert!(!state.user("alice").unwrap().has_role("r1"));
        assert!(state.role("r2").unwrap().parent_roles.is_empty());
    }

    #[test]
    fn test_revoke_role_not_granted() {
        let (mut state, _, _) = setup();
        state.create_role("r1").unwrap();
        assert!(matches!(
            state.revoke_role("r1", &user("alice")),
            Err(AuthError::RoleNotGranted { .. })
        ));
    }

    #[test]
    fn test_public_role_applies_to_every_user() {
        let (mut state, db, _) = setup();
        state
            .grant_privileges(
                &role(PUBLIC_ROLE),
                ObjectType::Database,
                ActionSet::CREATE_TABLE,
                &[Some(PrivilegeObject::database(db))],
                false,
            )
            .unwrap();
        assert!(state
            .check_privilege(
                "alice",
                ObjectType::Database,
                PrivilegeType::CreateTable,
                Some(&PrivilegeObject::database(db))
            )
            .unwrap());
    }

    #[test]
    fn test_grant_option_through_role() {
        let (mut state, db, t1) = setup();
        let table = Some(PrivilegeObject::table(db, t1));
        state.create_role("owner").unwrap();
        state
            .grant_privileges(
                &role("owner"),
                ObjectType::Table,
                ActionSet::SELECT | ActionSet::INSERT,
                std::slice::from_ref(&table),
                true,
            )
            .unwrap();
        state.grant_role("owner", &user("alice")).unwrap();

        assert!(state
            .check_grantable("alice", ObjectType::Table, ActionSet::SELECT, std::slice::from_ref(&table))
            .unwrap());
        assert!(!state
            .check_grantable("alice", ObjectType::Table, ActionSet::DROP, &[table])
            .unwrap());
    }

    #[test]
    fn test_sweep_after_drop() {
        let (mut state, db, t1) = setup();
        state
            .grant_privileges(
                &user("alice"),
                ObjectType::Table,
                ActionSet::SELECT,
                &[Some(PrivilegeObject::table(db, t1)), Some(PrivilegeObject::all_tables_in(db))],
                false,
            )
            .unwrap();
        state.create_user("bob").unwrap();
        state
            .grant_privileges(
                &user("alice"),
                ObjectType::User,
                ActionSet::IMPERSONATE,
                &[Some(PrivilegeObject::User(Scope::One("bob".to_string())))],
                false,
            )
            .unwrap();

        state.catalog.drop_table("db1", "t1", TableKind::Table).unwrap();
        state.drop_user("bob").unwrap();
        assert_eq!(state.remove_invalid_objects(), 2);

        let rows = state.show_grants(&user("alice")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].object, "ALL TABLES IN DATABASE db1");
    }

    #[test]
    fn test_show_grants_uses_names() {
        let (mut state, db, t1) = setup();
        state
            .grant_privileges(
                &user("alice"),
                ObjectType::Table,
                ActionSet::SELECT | ActionSet::INSERT,
                &[Some(PrivilegeObject::table(db, t1))],
                true,
            )
            .unwrap();
        let rows = state.show_grants(&user("alice")).unwrap();
        assert_eq!(
            rows,
            vec![GrantRow {
                object_type: ObjectType::Table,
                object: "db1.t1".to_string(),
                actions: "INSERT, SELECT".to_string(),
                grantable: true,
            }]
        );
    }
}
