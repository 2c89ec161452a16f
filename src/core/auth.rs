//! Callers, sharing and identity
//!
//! A [`Caller`] is whoever issued the request. Objects of shareable types
//! carry a [`Sharing`] block deciding which callers may see or change them.
//! Access strings are eight characters: metadata read/write followed by data
//! read/write, padded with `-` (e.g. `rw------`, `r-r-----`).

use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Authority granting every permission
pub const SUPERUSER_AUTHORITY: &str = "ALL";

/// The identity a request is evaluated for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// User id, `None` for anonymous requests
    pub id: Option<String>,
    pub username: String,
    #[serde(default)]
    pub authorities: Vec<String>,
    /// Ids of the user groups the caller belongs to
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self {
            id: None,
            username: "anonymous".to_string(),
            authorities: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn user(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            username: username.into(),
            authorities: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn superuser(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self::user(id, username).with_authority(SUPERUSER_AUTHORITY)
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.push(authority.into());
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.groups.push(group_id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_super(&self) -> bool {
        self.authorities.iter().any(|a| a == SUPERUSER_AUTHORITY)
    }

    /// Whether the caller holds `authority` (superusers hold all of them)
    pub fn has_authority(&self, authority: &str) -> bool {
        self.is_super() || self.authorities.iter().any(|a| a == authority)
    }

    /// Whether this caller may manage (and thus filter by the access of) `other`
    pub fn can_manage(&self, other: &Caller) -> bool {
        self.is_super() || (self.id.is_some() && self.id == other.id)
    }
}

/// A single grant in a sharing block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingEntry {
    pub id: String,
    pub access: String,
}

/// Per-object access control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sharing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default = "no_access")]
    pub public: String,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub users: IndexMap<String, SharingEntry>,
    #[serde(default)]
    pub user_groups: IndexMap<String, SharingEntry>,
}

fn no_access() -> String {
    "--------".to_string()
}

impl Default for Sharing {
    fn default() -> Self {
        Self {
            owner: None,
            public: no_access(),
            external: false,
            users: IndexMap::new(),
            user_groups: IndexMap::new(),
        }
    }
}

impl Sharing {
    /// Sharing visible to everybody (`rw------`)
    pub fn public() -> Self {
        Self {
            public: "rw------".to_string(),
            ..Self::default()
        }
    }

    /// Sharing visible to nobody but `owner` and superusers
    pub fn private(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    pub fn with_public(mut self, access: impl Into<String>) -> Self {
        self.public = access.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>, access: impl Into<String>) -> Self {
        let id = user_id.into();
        self.users.insert(
            id.clone(),
            SharingEntry {
                id,
                access: access.into(),
            },
        );
        self
    }

    pub fn with_user_group(
        mut self,
        group_id: impl Into<String>,
        access: impl Into<String>,
    ) -> Self {
        let id = group_id.into();
        self.user_groups.insert(
            id.clone(),
            SharingEntry {
                id,
                access: access.into(),
            },
        );
        self
    }

    /// Whether any grant reaching `caller` matches the access `pattern`
    ///
    /// Patterns use `_` for one character and `%` for any run of
    /// characters, like SQL `LIKE`. Owners and superusers always match.
    pub fn grants(&self, caller: &Caller, pattern: &str) -> bool {
        if caller.is_super() {
            return true;
        }
        if let Some(id) = caller.id() {
            if self.owner.as_deref() == Some(id) {
                return true;
            }
            if self
                .users
                .get(id)
                .is_some_and(|e| access_matches(&e.access, pattern))
            {
                return true;
            }
        }
        if caller.groups.iter().any(|g| {
            self.user_groups
                .get(g)
                .is_some_and(|e| access_matches(&e.access, pattern))
        }) {
            return true;
        }
        access_matches(&self.public, pattern)
    }

    pub fn can_read(&self, caller: &Caller) -> bool {
        self.grants(caller, CAN_READ)
    }

    pub fn can_write(&self, caller: &Caller) -> bool {
        self.grants(caller, CAN_WRITE)
    }
}

/// Metadata read
pub const CAN_READ: &str = "r%";
/// Metadata write
pub const CAN_WRITE: &str = "_w%";
/// Data read
pub const CAN_DATA_READ: &str = "__r%";
/// Data write
pub const CAN_DATA_WRITE: &str = "___w%";

/// Match an access string against a `LIKE` style pattern
pub fn access_matches(access: &str, pattern: &str) -> bool {
    fn go(access: &[char], pattern: &[char]) -> bool {
        match pattern.split_first() {
            None => access.is_empty(),
            Some(('%', rest)) => (0..=access.len()).any(|i| go(&access[i..], rest)),
            Some(('_', rest)) => !access.is_empty() && go(&access[1..], rest),
            Some((c, rest)) => access.first() == Some(c) && go(&access[1..], rest),
        }
    }
    let access: Vec<char> = access.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    go(&access, &pattern)
}

/// Effective permissions of a caller on an object, rendered by `access`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessSummary {
    pub manage: bool,
    pub externalize: bool,
    pub write: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
}

impl AccessSummary {
    pub fn of(caller: &Caller, sharing: Option<&Sharing>) -> Self {
        let (read, write) = match sharing {
            Some(sharing) => (sharing.can_read(caller), sharing.can_write(caller)),
            None => (true, caller.is_super()),
        };
        Self {
            manage: write,
            externalize: caller.is_super() || sharing.is_some_and(|s| s.external),
            write,
            read,
            update: write,
            delete: write,
        }
    }
}

/// Resolves who is calling and looks up other users
///
/// Authentication itself happens upstream; the identity is taken from the
/// request as given.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identify the caller of a request
    async fn current_caller(&self, headers: &HeaderMap) -> Result<Caller>;

    /// Look up a user by id
    async fn find_user(&self, id: &str) -> Result<Option<Caller>>;
}

/// Identity provider treating every request as anonymous
pub struct AnonymousIdentityProvider;

#[async_trait]
impl IdentityProvider for AnonymousIdentityProvider {
    async fn current_caller(&self, _headers: &HeaderMap) -> Result<Caller> {
        Ok(Caller::anonymous())
    }

    async fn find_user(&self, _id: &str) -> Result<Option<Caller>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_pattern_matching() {
        assert!(access_matches("rw------", "r%"));
        assert!(access_matches("rw------", "_w%"));
        assert!(!access_matches("r-------", "_w%"));
        assert!(access_matches("--r-----", "__r%"));
        assert!(access_matches("rw------", "rw------"));
        assert!(!access_matches("rw------", "rw"));
        assert!(access_matches("rw------", "%"));
    }

    #[test]
    fn test_public_sharing() {
        let sharing = Sharing::public();
        assert!(sharing.can_read(&Caller::anonymous()));
        assert!(sharing.can_write(&Caller::user("u1", "guest")));
    }

    #[test]
    fn test_private_sharing() {
        let sharing = Sharing::private("owner");
        assert!(!sharing.can_read(&Caller::user("u1", "guest")));
        assert!(sharing.can_read(&Caller::user("owner", "owner")));
        assert!(sharing.can_read(&Caller::superuser("admin", "admin")));
        assert!(!sharing.can_read(&Caller::anonymous()));
    }

    #[test]
    fn test_user_and_group_grants() {
        let sharing = Sharing::private("owner")
            .with_user("u1", "r-------")
            .with_user_group("g1", "rw------");

        let u1 = Caller::user("u1", "one");
        assert!(sharing.can_read(&u1));
        assert!(!sharing.can_write(&u1));

        let member = Caller::user("u2", "two").with_group("g1");
        assert!(sharing.can_write(&member));
    }

    #[test]
    fn test_can_manage() {
        let admin = Caller::superuser("admin", "admin");
        let guest = Caller::user("guest", "guest");
        assert!(admin.can_manage(&guest));
        assert!(guest.can_manage(&guest));
        assert!(!guest.can_manage(&admin));
        assert!(!Caller::anonymous().can_manage(&Caller::anonymous()));
    }

    #[test]
    fn test_access_summary() {
        let guest = Caller::user("guest", "guest");
        let summary = AccessSummary::of(&guest, Some(&Sharing::public().with_public("r-------")));
        assert!(summary.read);
        assert!(!summary.write);
        assert!(!summary.delete);

        let summary = AccessSummary::of(&Caller::superuser("a", "admin"), None);
        assert!(summary.read && summary.write && summary.manage && summary.externalize);
    }
}
