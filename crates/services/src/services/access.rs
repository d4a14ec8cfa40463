use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    #[default]
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
pub struct Permissions {
    pub view: bool,
    pub edit_events: bool,
    pub delete_events: bool,
    pub manage_categories: bool,
    pub delete_categories: bool,
    pub update_status: bool,
    pub comment: bool,
    pub delete_comments: bool,
}

impl Role {
    pub const fn permissions(self) -> Permissions {
        match self {
            Role::Admin => Permissions {
                view: true,
                edit_events: true,
                delete_events: true,
                manage_categories: true,
                delete_categories: true,
                update_status: true,
                comment: true,
                delete_comments: true,
            },
            Role::Editor => Permissions {
                view: true,
                edit_events: true,
                delete_events: false,
                manage_categories: true,
                delete_categories: false,
                update_status: true,
                comment: true,
                delete_comments: false,
            },
            Role::Viewer => Permissions {
                view: true,
                edit_events: false,
                delete_events: false,
                manage_categories: false,
                delete_categories: false,
                update_status: false,
                comment: true,
                delete_comments: false,
            },
        }
    }
}

/// A single capability, checked against [`Permissions`] at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    View,
    EditEvents,
    DeleteEvents,
    ManageCategories,
    DeleteCategories,
    UpdateStatus,
    Comment,
    DeleteComments,
}

impl Permissions {
    pub const fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::View => self.view,
            Permission::EditEvents => self.edit_events,
            Permission::DeleteEvents => self.delete_events,
            Permission::ManageCategories => self.manage_categories,
            Permission::DeleteCategories => self.delete_categories,
            Permission::UpdateStatus => self.update_status,
            Permission::Comment => self.comment,
            Permission::DeleteComments => self.delete_comments,
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
pub struct Actor {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub role: Role,
}

impl Actor {
    /// Identity used when access control is disabled.
    pub fn local_admin() -> Self {
        Self {
            user_id: None,
            name: "local".to_string(),
            role: Role::Admin,
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.role.permissions().allows(permission)
    }
}
