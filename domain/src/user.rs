//! Users: registration aggregate and the directory read model.
//!
//! A user stream is keyed by email address. Registration carries the full
//! profile (local credentials or a federated provider id); roles are
//! assigned afterwards by an admin. Uniqueness of emails is advisory —
//! callers consult the directory before registering; the aggregate does not
//! close the race.

use emporium_core::aggregate::{Aggregate, decode_payload, decode_stored, encode_payload};
use emporium_core::error::CommandError;
use emporium_core::event::{Actor, Role};
use emporium_runtime::{Projection, ProjectionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Where a user's identity comes from.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Email + password held locally.
    #[default]
    Local,
    /// Federated Google sign-in.
    Google,
}

/// Register a user under their email stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    /// Email address (also the stream id).
    pub email: String,
    /// Display name.
    pub name: String,
    /// Avatar URL, when the provider supplies one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub picture: Option<String>,
    /// Identity provider.
    pub provider: Provider,
    /// Provider-scoped id (used for federated lookups).
    pub provider_id: String,
    /// Local password hash; absent for federated users.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub password_hash: Option<String>,
}

/// Assign a role to a registered user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssignRole {
    /// The role to assign.
    pub role: Role,
}

/// Folded user state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserState {
    /// Registered email, empty until registration.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Current role.
    pub role: Option<Role>,
    /// Identity provider.
    pub provider: Provider,
    /// Provider-scoped id.
    pub provider_id: String,
}

/// Commands accepted by [`User`].
pub enum UserCommand {
    /// See [`RegisterUser`].
    Register(RegisterUser),
    /// See [`AssignRole`].
    AssignRole(AssignRole),
}

/// Events emitted by [`User`]. Payloads mirror their commands.
pub enum UserEvent {
    /// `UserRegistered`.
    Registered(RegisterUser),
    /// `RoleAssigned`.
    RoleAssigned(AssignRole),
}

/// The user aggregate definition.
pub struct User;

impl Aggregate for User {
    type State = UserState;
    type Command = UserCommand;
    type Event = UserEvent;

    fn name(&self) -> &'static str {
        "User"
    }

    fn init(&self) -> UserState {
        UserState::default()
    }

    fn command_names(&self) -> &'static [&'static str] {
        &["RegisterUser", "AssignRole"]
    }

    fn event_names(&self) -> &'static [&'static str] {
        &["UserRegistered", "RoleAssigned"]
    }

    fn decode_command(&self, name: &str, payload: &Value) -> Result<UserCommand, CommandError> {
        match name {
            "RegisterUser" => decode_payload(name, payload).map(UserCommand::Register),
            "AssignRole" => decode_payload(name, payload).map(UserCommand::AssignRole),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    fn decode_event(&self, name: &str, data: &Value) -> Result<UserEvent, CommandError> {
        match name {
            "UserRegistered" => decode_stored(name, data).map(UserEvent::Registered),
            "RoleAssigned" => decode_stored(name, data).map(UserEvent::RoleAssigned),
            other => Err(CommandError::Codec(format!("unexpected event {other}"))),
        }
    }

    fn encode_event(&self, event: &UserEvent) -> Result<(&'static str, Value), CommandError> {
        match event {
            UserEvent::Registered(registered) => encode_payload("UserRegistered", registered),
            UserEvent::RoleAssigned(assigned) => encode_payload("RoleAssigned", assigned),
        }
    }

    fn patch(&self, state: &mut UserState, event: &UserEvent) {
        match event {
            UserEvent::Registered(registered) => {
                state.email.clone_from(&registered.email);
                state.name.clone_from(&registered.name);
                state.provider = registered.provider;
                state.provider_id.clone_from(&registered.provider_id);
            }
            UserEvent::RoleAssigned(assigned) => {
                state.role = Some(assigned.role);
            }
        }
    }

    fn handle(
        &self,
        _state: &UserState,
        command: UserCommand,
        _actor: &Actor,
    ) -> Result<Vec<UserEvent>, CommandError> {
        Ok(vec![match command {
            UserCommand::Register(register) => UserEvent::Registered(register),
            UserCommand::AssignRole(assign) => UserEvent::RoleAssigned(assign),
        }])
    }
}

/// One user as seen by readers of the directory.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Avatar URL, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Current role; every registration starts as [`Role::User`].
    pub role: Role,
    /// Identity provider.
    pub provider: Provider,
    /// Provider-scoped id.
    pub provider_id: String,
    /// Local password hash, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

#[derive(Default)]
struct DirectoryState {
    users: HashMap<String, UserProfile>,
    by_provider_id: HashMap<String, String>,
}

/// The user directory read model: profiles by email plus a provider-id
/// secondary index.
#[derive(Clone, Default)]
pub struct UserDirectory {
    store: Arc<RwLock<DirectoryState>>,
}

impl UserDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The projection registration maintaining this read model.
    ///
    /// `RoleAssigned` on a never-registered stream is a silent no-op.
    #[must_use]
    pub fn projection(&self) -> Projection {
        let store = Arc::clone(&self.store);
        Projection::new(
            "users",
            &["UserRegistered", "RoleAssigned"],
            move |event| {
                let mut directory = store.write().unwrap_or_else(PoisonError::into_inner);
                match event.name.as_str() {
                    "UserRegistered" => {
                        let data: RegisterUser = serde_json::from_value(event.data.clone())
                            .map_err(|e| ProjectionError::Codec(format!("UserRegistered: {e}")))?;
                        directory
                            .by_provider_id
                            .insert(data.provider_id.clone(), event.stream.to_string());
                        directory.users.insert(
                            event.stream.to_string(),
                            UserProfile {
                                email: data.email,
                                name: data.name,
                                picture: data.picture,
                                role: Role::User,
                                provider: data.provider,
                                provider_id: data.provider_id,
                                password_hash: data.password_hash,
                            },
                        );
                    }
                    "RoleAssigned" => {
                        let data: AssignRole = serde_json::from_value(event.data.clone())
                            .map_err(|e| ProjectionError::Codec(format!("RoleAssigned: {e}")))?;
                        if let Some(user) = directory.users.get_mut(event.stream.as_str()) {
                            user.role = data.role;
                        }
                    }
                    _ => {}
                }
                Ok(())
            },
        )
    }

    /// Look up a user by email.
    #[must_use]
    pub fn get_user_by_email(&self, email: &str) -> Option<UserProfile> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .users
            .get(email)
            .cloned()
    }

    /// Look up a user through the provider-id index.
    #[must_use]
    pub fn get_user_by_provider_id(&self, provider_id: &str) -> Option<UserProfile> {
        let directory = self.store.read().unwrap_or_else(PoisonError::into_inner);
        directory
            .by_provider_id
            .get(provider_id)
            .and_then(|email| directory.users.get(email))
            .cloned()
    }

    /// All registered users.
    #[must_use]
    pub fn all_users(&self) -> Vec<UserProfile> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .users
            .values()
            .cloned()
            .collect()
    }

    /// Drop all profiles and indexes.
    pub fn clear(&self) {
        let mut directory = self.store.write().unwrap_or_else(PoisonError::into_inner);
        directory.users.clear();
        directory.by_provider_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_user_accepts_local_and_google_payloads() {
        let local = User.decode_command(
            "RegisterUser",
            &json!({
                "email": "a@test.com",
                "name": "A",
                "provider": "local",
                "providerId": "local:a@test.com",
                "passwordHash": "hash"
            }),
        );
        assert!(matches!(local, Ok(UserCommand::Register(ref r)) if r.provider == Provider::Local));

        let google = User.decode_command(
            "RegisterUser",
            &json!({
                "email": "g@test.com",
                "name": "G",
                "picture": "https://example.com/g.png",
                "provider": "google",
                "providerId": "google-123"
            }),
        );
        assert!(
            matches!(google, Ok(UserCommand::Register(ref r)) if r.provider == Provider::Google
                && r.password_hash.is_none())
        );
    }

    #[test]
    fn role_assignment_patches_only_the_role() {
        let mut state = UserState::default();
        User.patch(
            &mut state,
            &UserEvent::Registered(RegisterUser {
                email: "a@test.com".to_string(),
                name: "A".to_string(),
                picture: None,
                provider: Provider::Local,
                provider_id: "local:a@test.com".to_string(),
                password_hash: Some("hash".to_string()),
            }),
        );
        User.patch(
            &mut state,
            &UserEvent::RoleAssigned(AssignRole { role: Role::Admin }),
        );
        assert_eq!(state.role, Some(Role::Admin));
        assert_eq!(state.email, "a@test.com");
    }
}
