use thiserror::Error;

use super::object_type::ObjectType;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("There is no such grant defined on {object}")]
    NoSuchGrant {
        object_type: ObjectType,
        object: String,
    },
    #[error("User '{0}' not found")]
    UserNotFound(String),
    #[error("User '{0}' already exists")]
    UserAlreadyExists(String),
    #[error("Role '{0}' not found")]
    RoleNotFound(String),
    #[error("Role '{0}' already exists")]
    RoleAlreadyExists(String),
    #[error("{0} not found")]
    ObjectNotFound(String),
    #[error("{0} already exists")]
    ObjectAlreadyExists(String),
    #[error("Privilege '{action}' is not valid on {object_type}")]
    InvalidPrivilege {
        object_type: ObjectType,
        action: String,
    },
    #[error("Object {found} cannot be used with object type {expected}")]
    ObjectTypeMismatch {
        expected: ObjectType,
        found: String,
    },
    #[error("Role '{role}' is not granted to {grantee}")]
    RoleNotGranted { role: String, grantee: String },
    #[error("Granting role '{0}' would create a cycle")]
    RoleCycle(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Binary Serialization error: {0}")]
    BinarySerialization(String),
    #[error("Config error: {0}")]
    Config(String),
}
