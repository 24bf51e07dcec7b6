// Module declarations
pub mod error;
pub mod object_type;
pub mod privilege;
pub mod object;
pub mod catalog;
pub mod entry;
pub mod collection;
pub mod user;
pub mod role;
pub mod auth_state;

// Re-exports for convenience
pub use error::AuthError;
pub use object_type::ObjectType;
pub use privilege::{ActionSet, PrivilegeType};
pub use object::{FunctionObject, PrivilegeObject, Scope, TableObject};
pub use catalog::{CatalogView, MemoryCatalog, NamedKind, ObjectView, TableKind};
pub use entry::PrivilegeEntry;
pub use collection::PrivilegeCollection;
pub use user::User;
pub use role::Role;
pub use auth_state::{AuthState, GrantRow, Grantee, PUBLIC_ROLE, ROOT_ROLE};

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_object_type_display() {
        assert_eq!(ObjectType::Table.to_string(), "TABLE");
        assert_eq!(ObjectType::MaterializedView.to_string(), "MATERIALIZED VIEW");
        assert_eq!(ObjectType::GlobalFunction.to_string(), "GLOBAL FUNCTION");
    }

    #[test]
    fn test_collection_round_trip_through_state() {
        let mut state = AuthState::initialize("root");
        state.catalog.create_database("db1", 10001).unwrap();
        let t1 = Uuid::new_v4();
        state
            .catalog
            .create_table("db1", "t1", TableKind::Table, t1)
            .unwrap();
        state.create_user("bob").unwrap();

        let bob = Grantee::User("bob".to_string());
        let table = Some(PrivilegeObject::table(10001, t1));
        state
            .grant_privileges(&bob, ObjectType::Table, ActionSet::SELECT, std::slice::from_ref(&table), false)
            .unwrap();
        state
            .revoke_privileges(&bob, ObjectType::Table, ActionSet::SELECT, std::slice::from_ref(&table))
            .unwrap();

        assert!(state.user("bob").unwrap().privileges.is_empty());
        assert!(matches!(
            state.revoke_privileges(&bob, ObjectType::Table, ActionSet::SELECT, &[table]),
            Ok(())
        ));
    }

    #[test]
    fn test_no_such_grant_message() {
        let mut state = AuthState::initialize("root");
        state.catalog.create_database("db1", 10001).unwrap();
        state.create_user("bob").unwrap();
        let bob = Grantee::User("bob".to_string());
        state
            .grant_privileges(
                &bob,
                ObjectType::Database,
                ActionSet::CREATE_TABLE,
                &[Some(PrivilegeObject::database(10001))],
                false,
            )
            .unwrap();

        let err = state
            .revoke_privileges(
                &bob,
                ObjectType::Database,
                ActionSet::DROP,
                &[Some(PrivilegeObject::database(10002))],
            )
            .unwrap_err();
        assert!(matches!(err, AuthError::NoSuchGrant { .. }));
        assert!(err.to_string().starts_with("There is no such grant defined on"));
    }
}
