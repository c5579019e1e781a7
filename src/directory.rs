//! Domain-object directory.
//!
//! Converters resolve users, members, channels and roles through the
//! [`Directory`] trait. The dispatcher never owns domain state; it only asks
//! the directory what the invoking context can see.

use async_trait::async_trait;
use dashmap::DashMap;

/// Numeric identifier of any domain object.
pub type Snowflake = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Snowflake,
    pub name: String,
    pub global_name: Option<String>,
    pub bot: bool,
}

impl User {
    pub fn new(id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            global_name: None,
            bot: false,
        }
    }

    /// The name shown to other users.
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.name)
    }
}

/// A user as seen inside one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user: User,
    pub scope_id: Snowflake,
    pub nick: Option<String>,
    /// Role ids, highest first.
    pub roles: Vec<Snowflake>,
}

impl Member {
    pub fn new(user: User, scope_id: Snowflake) -> Self {
        Self {
            user,
            scope_id,
            nick: None,
            roles: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> Snowflake {
        self.user.id
    }

    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or_else(|| self.user.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: Snowflake,
    pub name: String,
    /// `None` for private channels.
    pub scope_id: Option<Snowflake>,
    pub category_id: Option<Snowflake>,
    pub nsfw: bool,
}

impl Channel {
    pub fn new(id: Snowflake, name: impl Into<String>, scope_id: Option<Snowflake>) -> Self {
        Self {
            id,
            name: name.into(),
            scope_id,
            category_id: None,
            nsfw: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
    pub scope_id: Snowflake,
}

impl Role {
    pub fn new(id: Snowflake, name: impl Into<String>, scope_id: Snowflake) -> Self {
        Self {
            id,
            name: name.into(),
            scope_id,
        }
    }
}

/// Lookup provider for convertible domain objects.
///
/// Listing methods return what is visible in a scope; the converters do the
/// matching. Lookups may perform I/O.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Every user the agent can see.
    async fn users(&self) -> Vec<User>;

    /// Members of a scope.
    async fn members(&self, scope_id: Snowflake) -> Vec<Member>;

    /// Channels of a scope.
    async fn channels(&self, scope_id: Snowflake) -> Vec<Channel>;

    /// Roles of a scope.
    async fn roles(&self, scope_id: Snowflake) -> Vec<Role>;

    async fn user(&self, id: Snowflake) -> Option<User> {
        self.users().await.into_iter().find(|u| u.id == id)
    }

    async fn member(&self, scope_id: Snowflake, id: Snowflake) -> Option<Member> {
        self.members(scope_id).await.into_iter().find(|m| m.id() == id)
    }

    async fn channel(&self, scope_id: Snowflake, id: Snowflake) -> Option<Channel> {
        self.channels(scope_id).await.into_iter().find(|c| c.id == id)
    }

    async fn role(&self, scope_id: Snowflake, id: Snowflake) -> Option<Role> {
        self.roles(scope_id).await.into_iter().find(|r| r.id == id)
    }
}

/// In-memory directory backed by concurrent maps.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: DashMap<Snowflake, User>,
    members: DashMap<(Snowflake, Snowflake), Member>,
    channels: DashMap<Snowflake, Channel>,
    roles: DashMap<Snowflake, Role>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Add a member; its user is added too.
    pub fn add_member(&self, member: Member) {
        self.users.insert(member.user.id, member.user.clone());
        self.members.insert((member.scope_id, member.user.id), member);
    }

    pub fn add_channel(&self, channel: Channel) {
        self.channels.insert(channel.id, channel);
    }

    pub fn add_role(&self, role: Role) {
        self.roles.insert(role.id, role);
    }

    pub fn remove_user(&self, id: Snowflake) -> Option<User> {
        self.members.retain(|(_, user), _| *user != id);
        self.users.remove(&id).map(|(_, u)| u)
    }
}

// Listings are sorted by id so name matching is deterministic.
#[async_trait]
impl Directory for MemoryDirectory {
    async fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        users
    }

    async fn members(&self, scope_id: Snowflake) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .filter(|e| e.key().0 == scope_id)
            .map(|e| e.value().clone())
            .collect();
        members.sort_by_key(|m| m.id());
        members
    }

    async fn channels(&self, scope_id: Snowflake) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self
            .channels
            .iter()
            .filter(|e| e.value().scope_id == Some(scope_id))
            .map(|e| e.value().clone())
            .collect();
        channels.sort_by_key(|c| c.id);
        channels
    }

    async fn roles(&self, scope_id: Snowflake) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .roles
            .iter()
            .filter(|e| e.value().scope_id == scope_id)
            .map(|e| e.value().clone())
            .collect();
        roles.sort_by_key(|r| r.id);
        roles
    }

    async fn user(&self, id: Snowflake) -> Option<User> {
        self.users.get(&id).map(|u| u.value().clone())
    }

    async fn member(&self, scope_id: Snowflake, id: Snowflake) -> Option<Member> {
        self.members.get(&(scope_id, id)).map(|m| m.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_directory_scopes_listings() {
        let dir = MemoryDirectory::new();
        dir.add_member(Member::new(User::new(2, "bob"), 10));
        dir.add_member(Member::new(User::new(1, "alice"), 10));
        dir.add_member(Member::new(User::new(3, "carol"), 11));
        dir.add_channel(Channel::new(50, "general", Some(10)));
        dir.add_role(Role::new(70, "mods", 10));

        let names: Vec<_> = dir.members(10).await.into_iter().map(|m| m.user.name).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(dir.users().await.len(), 3);
        assert_eq!(dir.channels(10).await.len(), 1);
        assert!(dir.channels(11).await.is_empty());
        assert_eq!(dir.role(10, 70).await.map(|r| r.name), Some("mods".to_string()));
        assert!(dir.member(11, 1).await.is_none());
    }

    #[tokio::test]
    async fn removing_a_user_drops_memberships() {
        let dir = MemoryDirectory::new();
        dir.add_member(Member::new(User::new(1, "alice"), 10));
        assert!(dir.remove_user(1).is_some());
        assert!(dir.members(10).await.is_empty());
    }

    #[test]
    fn display_names_prefer_nick() {
        let mut user = User::new(1, "alice");
        assert_eq!(user.display_name(), "alice");
        user.global_name = Some("Alice".into());
        let mut member = Member::new(user, 10);
        assert_eq!(member.display_name(), "Alice");
        member.nick = Some("ally".into());
        assert_eq!(member.display_name(), "ally");
    }
}
