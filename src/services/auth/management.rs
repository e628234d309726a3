/*
 * Responsibility
 * - RestUserManagement: the user store seen by authentication providers and handlers
 * - InMemoryUserManagement: dashmap-backed implementation (id -> user, username -> id)
 */
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;
use uuid::Uuid;

use crate::services::auth::user::{RestUser, UserError};

pub trait RestUserManagement: Send + Sync {
    fn find_user(&self, id: Uuid) -> Option<RestUser>;

    fn find_user_by_name(&self, username: &str) -> Option<RestUser>;

    /// Create or replace the user with the same id.
    fn save_user(&self, user: RestUser) -> Result<(), UserError>;

    /// Apply `update` to the stored user atomically and return the stored result.
    fn update_user(&self, id: Uuid, update: &mut dyn FnMut(&mut RestUser)) -> Option<RestUser>;

    fn delete_user(&self, id: Uuid) -> bool;

    fn users(&self) -> Vec<RestUser>;
}

#[derive(Debug, Default)]
pub struct InMemoryUserManagement {
    users: DashMap<Uuid, RestUser>,
    names: DashMap<String, Uuid>,
}

impl InMemoryUserManagement {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RestUserManagement for InMemoryUserManagement {
    fn find_user(&self, id: Uuid) -> Option<RestUser> {
        self.users.get(&id).map(|u| u.value().clone())
    }

    fn find_user_by_name(&self, username: &str) -> Option<RestUser> {
        let id = *self.names.get(username)?;
        self.find_user(id)
    }

    fn save_user(&self, user: RestUser) -> Result<(), UserError> {
        match self.names.entry(user.username().to_string()) {
            Entry::Occupied(entry) if *entry.get() != user.id() => {
                return Err(UserError::UsernameTaken(user.username().to_string()));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(user.id());
            }
        }

        debug!(user_id = %user.id(), username = user.username(), "saving rest user");
        if let Some(previous) = self.users.insert(user.id(), user.clone())
            && previous.username() != user.username()
        {
            self.names.remove(previous.username());
        }
        Ok(())
    }

    fn update_user(&self, id: Uuid, update: &mut dyn FnMut(&mut RestUser)) -> Option<RestUser> {
        let mut entry = self.users.get_mut(&id)?;
        update(entry.value_mut());
        Some(entry.value().clone())
    }

    fn delete_user(&self, id: Uuid) -> bool {
        match self.users.remove(&id) {
            Some((_, user)) => {
                self.names.remove(user.username());
                debug!(user_id = %id, "deleted rest user");
                true
            }
            None => false,
        }
    }

    fn users(&self) -> Vec<RestUser> {
        self.users.iter().map(|u| u.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::user::{PASSWORD_PROPERTY, SALT_PROPERTY};

    fn user(name: &str) -> RestUser {
        RestUser::builder(name)
            .property(PASSWORD_PROPERTY, "00")
            .property(SALT_PROPERTY, "00")
            .build()
            .unwrap()
    }

    #[test]
    fn test_save_and_lookup() {
        let users = InMemoryUserManagement::new();
        let alice = user("alice");
        users.save_user(alice.clone()).unwrap();

        assert_eq!(users.find_user(alice.id()), Some(alice.clone()));
        assert_eq!(users.find_user_by_name("alice"), Some(alice.clone()));
        assert!(users.find_user_by_name("bob").is_none());

        assert_eq!(
            users.save_user(user("alice")),
            Err(UserError::UsernameTaken("alice".to_string()))
        );
    }

    #[test]
    fn test_rename_and_delete() {
        let users = InMemoryUserManagement::new();
        let alice = user("alice");
        users.save_user(alice.clone()).unwrap();

        let renamed = RestUser::builder("alicia")
            .id(alice.id())
            .property(PASSWORD_PROPERTY, "00")
            .property(SALT_PROPERTY, "00")
            .build()
            .unwrap();
        users.save_user(renamed).unwrap();
        assert!(users.find_user_by_name("alice").is_none());
        assert!(users.find_user_by_name("alicia").is_some());

        assert!(users.delete_user(alice.id()));
        assert!(!users.delete_user(alice.id()));
        assert!(users.users().is_empty());
    }

    #[test]
    fn test_update_user() {
        let users = InMemoryUserManagement::new();
        let alice = user("alice");
        users.save_user(alice.clone()).unwrap();

        let updated = users
            .update_user(alice.id(), &mut |u| u.set_property("note", Some("x".to_string())))
            .unwrap();
        assert_eq!(updated.property("note"), Some("x"));
        assert_eq!(users.find_user(alice.id()).unwrap().property("note"), Some("x"));
        assert!(users.update_user(Uuid::now_v7(), &mut |_| {}).is_none());
    }
}
