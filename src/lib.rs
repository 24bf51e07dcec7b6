// PostgrustSQL ACL - privilege collections and role merging for PostgrustSQL catalogs
// Modular architecture: core model, object-reference parser, journaled storage

// Clippy configuration - allow non-critical warnings for pet project
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::type_complexity)]

// Privilege model: object types, actions, patterns, collections, users, roles
pub mod core;

// Object-reference factory (names -> privilege objects)
pub mod parser;

// Storage layer (snapshot, operation journal)
pub mod storage;

// Thread-safe facade over the state and the journal
pub mod manager;

// Re-export commonly used types for convenience
pub use core::{
    ActionSet, AuthError, AuthState, CatalogView, GrantRow, Grantee, MemoryCatalog, NamedKind,
    ObjectType, PrivilegeCollection, PrivilegeEntry, PrivilegeObject, PrivilegeType, Scope,
    TableKind,
};
pub use manager::AuthorizationManager;
pub use parser::{ObjectRef, parse_actions, parse_object_ref, parse_object_refs, parse_object_type};
pub use storage::{Operation, StorageEngine};
