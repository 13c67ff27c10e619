//! The identity and network metadata of whoever is calling the engine.

use serde::{Deserialize, Serialize};

use crate::roles::{holds_any, ROLE_SYSTEM};

/// Identity of the system actor used for automatic step completion.
pub const SYSTEM_ACTOR_ID: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorContext {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ActorContext {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            roles: Vec::new(),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_network(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    /// The built-in actor that completes automatic steps.
    pub fn system() -> Self {
        Self::new(SYSTEM_ACTOR_ID, "Validation Engine").with_roles([ROLE_SYSTEM])
    }

    pub fn holds_any_role(&self, required: &[String]) -> bool {
        holds_any(&self.roles, required)
    }
}
