use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Channel, Role};

/// Events pushed over the WebSocket gateway.
///
/// They are change notifications: clients refetch the affected query rather
/// than patching local state from the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, name: String },

    /// Server confirms which of the requested workspaces are now subscribed
    Subscribed { workspace_ids: Vec<Uuid> },

    WorkspaceUpdate { workspace_id: Uuid, name: String },

    WorkspaceDelete { workspace_id: Uuid },

    ChannelCreate { workspace_id: Uuid, channel: Channel },

    ChannelUpdate {
        workspace_id: Uuid,
        channel_id: Uuid,
        name: String,
    },

    ChannelDelete { workspace_id: Uuid, channel_id: Uuid },

    MemberJoin {
        workspace_id: Uuid,
        member_id: Uuid,
        user_id: Uuid,
    },

    MemberUpdate {
        workspace_id: Uuid,
        member_id: Uuid,
        role: Role,
    },

    MemberRemove { workspace_id: Uuid, member_id: Uuid },

    MessageCreate {
        workspace_id: Uuid,
        message_id: Uuid,
        member_id: Uuid,
        channel_id: Option<Uuid>,
        conversation_id: Option<Uuid>,
        parent_message_id: Option<Uuid>,
    },

    MessageUpdate { workspace_id: Uuid, message_id: Uuid },

    MessageDelete { workspace_id: Uuid, message_id: Uuid },

    ReactionAdd {
        workspace_id: Uuid,
        message_id: Uuid,
        member_id: Uuid,
        emoji: String,
    },

    ReactionRemove {
        workspace_id: Uuid,
        message_id: Uuid,
        member_id: Uuid,
        emoji: String,
    },
}

impl GatewayEvent {
    /// Returns the workspace this event belongs to.
    /// Connection-level events (`Ready`, `Subscribed`) return `None`.
    pub fn workspace_id(&self) -> Option<Uuid> {
        match self {
            Self::Ready { .. } | Self::Subscribed { .. } => None,
            Self::WorkspaceUpdate { workspace_id, .. }
            | Self::WorkspaceDelete { workspace_id }
            | Self::ChannelCreate { workspace_id, .. }
            | Self::ChannelUpdate { workspace_id, .. }
            | Self::ChannelDelete { workspace_id, .. }
            | Self::MemberJoin { workspace_id, .. }
            | Self::MemberUpdate { workspace_id, .. }
            | Self::MemberRemove { workspace_id, .. }
            | Self::MessageCreate { workspace_id, .. }
            | Self::MessageUpdate { workspace_id, .. }
            | Self::MessageDelete { workspace_id, .. }
            | Self::ReactionAdd { workspace_id, .. }
            | Self::ReactionRemove { workspace_id, .. } => Some(*workspace_id),
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Replace this connection's workspace subscriptions.
    /// Workspaces the user is not a member of are silently dropped.
    Subscribe { workspace_ids: Vec<Uuid> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_use_tagged_layout() {
        let workspace_id = Uuid::new_v4();
        let event = GatewayEvent::WorkspaceDelete { workspace_id };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "WorkspaceDelete");
        assert_eq!(json["data"]["workspace_id"], workspace_id.to_string());
        assert_eq!(event.workspace_id(), Some(workspace_id));
    }

    #[test]
    fn ready_is_not_workspace_scoped() {
        let event = GatewayEvent::Ready {
            user_id: Uuid::new_v4(),
            name: "ada".into(),
        };
        assert_eq!(event.workspace_id(), None);
    }

    #[test]
    fn subscribe_command_parses() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"Subscribe","data":{{"workspace_ids":["{}"]}}}}"#, id);
        let GatewayCommand::Subscribe { workspace_ids } = serde_json::from_str(&raw).unwrap();
        assert_eq!(workspace_ids, vec![id]);
    }
}
