//! Audit log domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditEventType {
    PermissionGranted,
    PermissionRevoked,
    RoleAssigned,
    RoleDeleted,
    LoginSucceeded,
    LoginFailed,
    AccessDenied,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionGranted => "PermissionGranted",
            Self::PermissionRevoked => "PermissionRevoked",
            Self::RoleAssigned => "RoleAssigned",
            Self::RoleDeleted => "RoleDeleted",
            Self::LoginSucceeded => "LoginSucceeded",
            Self::LoginFailed => "LoginFailed",
            Self::AccessDenied => "AccessDenied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PermissionGranted" => Some(Self::PermissionGranted),
            "PermissionRevoked" => Some(Self::PermissionRevoked),
            "RoleAssigned" => Some(Self::RoleAssigned),
            "RoleDeleted" => Some(Self::RoleDeleted),
            "LoginSucceeded" => Some(Self::LoginSucceeded),
            "LoginFailed" => Some(Self::LoginFailed),
            "AccessDenied" => Some(Self::AccessDenied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// `None` for system-initiated events.
    pub actor_id: Option<Uuid>,
    pub event_type: AuditEventType,
    /// Role, user or permission the event is about.
    pub target_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub tenant_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub event_type: AuditEventType,
    pub target_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}
