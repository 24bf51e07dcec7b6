use crate::core::{
    ActionSet, AuthError, AuthState, GrantRow, Grantee, ObjectType, PrivilegeCollection,
    PrivilegeObject, PrivilegeType, ROOT_ROLE,
};
use crate::parser::ObjectRef;
use crate::storage::{Operation, StorageEngine};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use tracing::{error, info, warn};

/// Точка входа: состояние авторизации под RwLock плюс журнал на диске.
///
/// Все изменения идут через `execute*`: операция применяется под write lock и
/// попадает в журнал, если изменила состояние. Отзыв по нескольким объектам может
/// завершиться `NoSuchGrant` после частичного изменения: такая операция тоже
/// журналируется, и повтор при загрузке воспроизводит то же состояние.
/// Чтения берут read lock.
pub struct AuthorizationManager {
    state: RwLock<AuthState>,
    storage: Option<Mutex<StorageEngine>>,
}

impl AuthorizationManager {
    /// Открывает (или создает) хранилище в `data_dir`
    pub fn open<P: AsRef<Path>>(
        data_dir: P,
        root_user: &str,
        snapshot_threshold: usize,
    ) -> Result<Self, AuthError> {
        let mut storage = StorageEngine::new(data_dir)?.with_snapshot_threshold(snapshot_threshold);
        let state = storage.load_state(root_user)?;
        info!(
            users = state.users.len(),
            roles = state.roles.len(),
            "authorization manager opened"
        );

        let manager = Self {
            state: RwLock::new(state),
            storage: Some(Mutex::new(storage)),
        };

        // суперпользователь мог смениться в конфигурации
        let has_root_user = manager.state.read().users.contains_key(root_user);
        if !has_root_user {
            info!(user = root_user, "creating superuser");
            manager.execute(Operation::CreateUser {
                name: root_user.to_string(),
            })?;
            manager.execute(Operation::GrantRole {
                role: ROOT_ROLE.to_string(),
                grantee: Grantee::User(root_user.to_string()),
            })?;
        }

        Ok(manager)
    }

    /// Менеджер без диска (для тестов и встраивания)
    #[must_use]
    pub fn in_memory(root_user: &str) -> Self {
        Self {
            state: RwLock::new(AuthState::initialize(root_user)),
            storage: None,
        }
    }

    fn journal(&self, state: &AuthState, operation: Operation) -> Result<(), AuthError> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let mut storage = storage.lock();
        if let Err(e) = storage.log(operation) {
            error!(error = %e, "operation applied in memory but not journaled");
            return Err(e);
        }
        storage.maybe_checkpoint(state)?;
        Ok(())
    }

    /// Применяет операцию к заблокированному состоянию и журналирует ее
    fn commit(&self, state: &mut AuthState, operation: Operation) -> Result<(), AuthError> {
        let before = revoke_target(state, &operation);
        if let Err(e) = state.apply(&operation) {
            if before.is_some() && before != revoke_target(state, &operation) {
                warn!(error = %e, "revoke failed after partial change, journaling it");
                self.journal(state, operation)?;
            }
            return Err(e);
        }
        self.journal(state, operation)
    }

    /// Применяет операцию и записывает ее в журнал
    pub fn execute(&self, operation: Operation) -> Result<(), AuthError> {
        let mut state = self.state.write();
        self.commit(&mut state, operation)
    }

    /// Строит операцию по текущему состоянию и выполняет ее под одной блокировкой.
    /// Возвращает выполненную операцию.
    pub fn execute_with<F>(&self, build: F) -> Result<Operation, AuthError>
    where
        F: FnOnce(&AuthState) -> Result<Operation, AuthError>,
    {
        let mut state = self.state.write();
        let operation = build(&state)?;
        self.commit(&mut state, operation.clone())?;
        Ok(operation)
    }

    /// Выполняет операцию от имени пользователя `actor`.
    ///
    /// Выдача и отзыв прав требуют `check_grantable`, остальное - системного GRANT.
    pub fn execute_as(&self, actor: &str, operation: Operation) -> Result<(), AuthError> {
        let mut state = self.state.write();
        authorize(&state, actor, &operation)?;
        self.commit(&mut state, operation)
    }

    /// GRANT по ссылкам на объекты: разрешение имен, проверка полномочий и выдача
    /// выполняются атомарно.
    pub fn grant(
        &self,
        granter: Option<&str>,
        grantee: &Grantee,
        object_type: ObjectType,
        actions: ActionSet,
        objects: &[ObjectRef],
        with_grant_option: bool,
    ) -> Result<(), AuthError> {
        let mut state = self.state.write();
        let operation = Operation::GrantPrivileges {
            grantee: grantee.clone(),
            object_type,
            actions,
            objects: state.resolve_objects(objects)?,
            with_grant_option,
        };
        if let Some(granter) = granter {
            authorize(&state, granter, &operation)?;
        }
        self.commit(&mut state, operation)
    }

    pub fn revoke(
        &self,
        granter: Option<&str>,
        grantee: &Grantee,
        object_type: ObjectType,
        actions: ActionSet,
        objects: &[ObjectRef],
    ) -> Result<(), AuthError> {
        let mut state = self.state.write();
        let operation = Operation::RevokePrivileges {
            grantee: grantee.clone(),
            object_type,
            actions,
            objects: state.resolve_objects(objects)?,
        };
        if let Some(granter) = granter {
            authorize(&state, granter, &operation)?;
        }
        self.commit(&mut state, operation)
    }

    /// Чтение состояния под read lock
    pub fn read<R>(&self, f: impl FnOnce(&AuthState) -> R) -> R {
        f(&self.state.read())
    }

    pub fn check_privilege(
        &self,
        user: &str,
        object_type: ObjectType,
        action: PrivilegeType,
        object: Option<&PrivilegeObject>,
    ) -> Result<bool, AuthError> {
        self.state
            .read()
            .check_privilege(user, object_type, action, object)
    }

    /// Проверка по ссылке на объект (разрешение имен и проверка под одной блокировкой)
    pub fn check(
        &self,
        user: &str,
        object_type: ObjectType,
        action: PrivilegeType,
        object: &ObjectRef,
    ) -> Result<bool, AuthError> {
        let state = self.state.read();
        let object = state.resolve_object(object)?;
        state.check_privilege(user, object_type, action, object.as_ref())
    }

    pub fn search_privilege(
        &self,
        user: &str,
        object_type: ObjectType,
        object: Option<&PrivilegeObject>,
        action: Option<PrivilegeType>,
    ) -> Result<bool, AuthError> {
        self.state
            .read()
            .search_privilege(user, object_type, object, action)
    }

    pub fn can_see_database(&self, user: &str, database: &str) -> Result<bool, AuthError> {
        let state = self.state.read();
        let id = state
            .catalog
            .database_id(database)
            .ok_or_else(|| AuthError::ObjectNotFound(format!("Database '{database}'")))?;
        state.can_see_database(user, id)
    }

    pub fn effective_privileges(&self, grantee: &Grantee) -> Result<PrivilegeCollection, AuthError> {
        self.state.read().effective_privileges(grantee)
    }

    pub fn show_grants(&self, grantee: &Grantee) -> Result<Vec<GrantRow>, AuthError> {
        self.state.read().show_grants(grantee)
    }

    /// Удаляет записи на удаленные объекты; в журнал попадает только непустая сборка
    pub fn sweep(&self) -> Result<usize, AuthError> {
        let mut state = self.state.write();
        let removed = state.remove_invalid_objects();
        if removed > 0 {
            self.journal(&state, Operation::RemoveInvalidObjects)?;
        }
        info!(removed, "invalid privilege entries swept");
        Ok(removed)
    }

    /// Принудительный snapshot (no-op без диска)
    pub fn checkpoint(&self) -> Result<(), AuthError> {
        let state = self.state.read();
        if let Some(storage) = &self.storage {
            storage.lock().checkpoint(&state)?;
        }
        Ok(())
    }

    pub fn dump_json(&self, path: &Path) -> Result<(), AuthError> {
        StorageEngine::dump_json(&self.state.read(), path)
    }
}

/// Копия коллекции получателя для `RevokePrivileges`, иначе `None`
fn revoke_target(state: &AuthState, operation: &Operation) -> Option<PrivilegeCollection> {
    match operation {
        Operation::RevokePrivileges { grantee, .. } => state.privileges(grantee).ok().cloned(),
        _ => None,
    }
}

/// Может ли `actor` выполнить операцию
fn authorize(state: &AuthState, actor: &str, operation: &Operation) -> Result<(), AuthError> {
    let allowed = match operation {
        Operation::GrantPrivileges {
            object_type,
            actions,
            objects,
            ..
        }
        | Operation::RevokePrivileges {
            object_type,
            actions,
            objects,
            ..
        } => state.check_grantable(actor, *object_type, *actions, objects)?,
        _ => state.check_privilege(actor, ObjectType::System, PrivilegeType::Grant, None)?,
    };
    if allowed {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied(format!(
            "user '{actor}' is not allowed to perform this operation"
        )))
    }
}
