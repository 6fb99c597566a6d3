//! Tenant permission grants shared by the auth webhook and sync clients.
//!
//! A grant lists collection patterns of the form `tenantId:collection` or
//! `tenantId:*`. Every membership may read its whole tenant; write access
//! depends on the member's role.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifetime of an issued grant.
pub const GRANT_TTL_SECONDS: i64 = 3600;

/// Collections board members may write.
pub const BOARD_WRITABLE_COLLECTIONS: [&str; 6] = [
    "crm",
    "events",
    "financial",
    "governance",
    "projects",
    "rostering",
];

/// Collections regular members may write.
pub const MEMBER_WRITABLE_COLLECTIONS: [&str; 3] = ["crm", "events", "rostering"];

const WILDCARD: &str = "*";

/// Role of a user within one tenant. Unknown roles are treated as `Member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MemberRole {
    Admin,
    Board,
    Member,
}

impl MemberRole {
    pub fn parse(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            "board" => Self::Board,
            _ => Self::Member,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Board => "board",
            Self::Member => "member",
        }
    }

    /// Write patterns this role earns inside `tenant_id`. A blank tenant earns none.
    pub fn write_patterns(self, tenant_id: &str) -> Vec<String> {
        let tenant_id = tenant_id.trim();
        if tenant_id.is_empty() {
            return Vec::new();
        }
        match self {
            Self::Admin => vec![grant_pattern(tenant_id, WILDCARD)],
            Self::Board => scoped_all(tenant_id, &BOARD_WRITABLE_COLLECTIONS),
            Self::Member => scoped_all(tenant_id, &MEMBER_WRITABLE_COLLECTIONS),
        }
    }
}

impl From<String> for MemberRole {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<MemberRole> for String {
    fn from(value: MemberRole) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `tenant_members` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: String,
    pub role: MemberRole,
}

impl TenantMembership {
    pub fn new(tenant_id: impl Into<String>, role: MemberRole) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub read: Vec<String>,
    pub write: Vec<String>,
}

/// Read/write patterns issued to one user, valid until `expires_at` (Unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub user_id: String,
    pub permissions: Permissions,
    pub expires_at: i64,
}

impl PermissionGrant {
    /// Build a grant from a user's memberships, issued at `issued_at` (Unix seconds).
    pub fn for_memberships(
        user_id: impl Into<String>,
        memberships: &[TenantMembership],
        issued_at: i64,
    ) -> Self {
        let user_id = user_id.into();
        let mut permissions = Permissions::default();
        for membership in memberships {
            let tenant_id = membership.tenant_id.trim();
            if tenant_id.is_empty() {
                tracing::warn!(user_id = %user_id, "Skipping membership without tenant id");
                continue;
            }
            permissions.read.push(grant_pattern(tenant_id, WILDCARD));
            permissions
                .write
                .extend(membership.role.write_patterns(tenant_id));
        }

        Self {
            user_id,
            permissions,
            expires_at: issued_at.saturating_add(GRANT_TTL_SECONDS),
        }
    }

    pub fn can_read(&self, tenant_id: &str, collection: &str) -> bool {
        any_pattern_matches(&self.permissions.read, tenant_id, collection)
    }

    pub fn can_write(&self, tenant_id: &str, collection: &str) -> bool {
        any_pattern_matches(&self.permissions.write, tenant_id, collection)
    }

    pub const fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// True when the grant lapses within `window` of `now`.
    pub fn expires_within(&self, window: Duration, now: i64) -> bool {
        let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        self.expires_at <= now.saturating_add(window)
    }
}

/// Whether `pattern` covers `collection` in `tenant_id`.
///
/// Collection names match exactly; `*` covers every collection in the tenant.
pub fn pattern_matches(pattern: &str, tenant_id: &str, collection: &str) -> bool {
    let Some((pattern_tenant, pattern_collection)) = pattern.split_once(':') else {
        return false;
    };
    pattern_tenant == tenant_id
        && (pattern_collection == WILDCARD || pattern_collection == collection)
}

fn any_pattern_matches(patterns: &[String], tenant_id: &str, collection: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| pattern_matches(pattern, tenant_id, collection))
}

/// Name of a collection as seen by the sync engine: `tenantId:collection`,
/// or the bare name when no tenant is known.
pub fn scoped_collection_name(tenant_id: Option<&str>, collection: &str) -> String {
    match tenant_id.map(str::trim).filter(|tenant| !tenant.is_empty()) {
        Some(tenant_id) => format!("{tenant_id}:{collection}"),
        None => collection.to_string(),
    }
}

/// Grant patterns always carry a tenant; callers reject blank ids first.
fn grant_pattern(tenant_id: &str, collection: &str) -> String {
    format!("{tenant_id}:{collection}")
}

fn scoped_all(tenant_id: &str, collections: &[&str]) -> Vec<String> {
    collections
        .iter()
        .map(|collection| grant_pattern(tenant_id, collection))
        .collect()
}

/// Body posted to the auth webhook.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthWebhookRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl fmt::Debug for AuthWebhookRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthWebhookRequest")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Body returned by the auth webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthWebhookResponse {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthWebhookResponse {
    pub fn granted(grant: PermissionGrant) -> Self {
        Self {
            authenticated: true,
            user_id: Some(grant.user_id),
            permissions: Some(grant.permissions),
            expires_at: Some(grant.expires_at),
            error: None,
        }
    }

    pub fn denied(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            user_id: None,
            permissions: None,
            expires_at: None,
            error: Some(error.into()),
        }
    }

    /// The grant carried by a successful response, `None` otherwise.
    pub fn into_grant(self) -> Option<PermissionGrant> {
        if !self.authenticated {
            return None;
        }
        Some(PermissionGrant {
            user_id: self.user_id?,
            permissions: self.permissions.unwrap_or_default(),
            expires_at: self.expires_at?,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const ISSUED_AT: i64 = 1_767_261_600;

    #[test]
    fn board_member_grant_matches_expected_shape() {
        let grant = PermissionGrant::for_memberships(
            "user-1",
            &[TenantMembership::new("T", MemberRole::Board)],
            ISSUED_AT,
        );

        assert_eq!(grant.permissions.read, vec!["T:*"]);
        assert_eq!(
            grant.permissions.write,
            vec![
                "T:crm",
                "T:events",
                "T:financial",
                "T:governance",
                "T:projects",
                "T:rostering"
            ]
        );
        assert_eq!(grant.expires_at, ISSUED_AT + 3600);
        assert!(grant.can_write("T", "crm"));
        assert!(!grant.can_write("T", "settings"));
        assert!(grant.can_read("T", "settings"));
    }

    #[test]
    fn admin_and_member_grants_across_tenants() {
        let grant = PermissionGrant::for_memberships(
            "user-1",
            &[
                TenantMembership::new("A", MemberRole::Admin),
                TenantMembership::new("B", MemberRole::Member),
            ],
            ISSUED_AT,
        );

        assert_eq!(grant.permissions.read, vec!["A:*", "B:*"]);
        assert_eq!(
            grant.permissions.write,
            vec!["A:*", "B:crm", "B:events", "B:rostering"]
        );
        assert!(grant.can_write("A", "settings"));
        assert!(!grant.can_write("B", "financial"));
        assert!(!grant.can_read("C", "crm"));
    }

    #[test]
    fn no_memberships_yields_empty_grant() {
        let grant = PermissionGrant::for_memberships("user-1", &[], ISSUED_AT);
        assert!(grant.permissions.read.is_empty());
        assert!(grant.permissions.write.is_empty());
        assert_eq!(grant.expires_at, ISSUED_AT + GRANT_TTL_SECONDS);
    }

    #[test]
    fn blank_tenant_membership_grants_nothing() {
        let grant = PermissionGrant::for_memberships(
            "user-1",
            &[
                TenantMembership::new("  ", MemberRole::Admin),
                TenantMembership::new("", MemberRole::Board),
                TenantMembership::new("T", MemberRole::Member),
            ],
            ISSUED_AT,
        );

        assert_eq!(grant.permissions.read, vec!["T:*"]);
        assert_eq!(
            grant.permissions.write,
            vec!["T:crm", "T:events", "T:rostering"]
        );
        assert!(grant
            .permissions
            .read
            .iter()
            .chain(&grant.permissions.write)
            .all(|pattern| pattern.starts_with("T:")));
        assert!(MemberRole::Admin.write_patterns(" ").is_empty());
    }

    #[test]
    fn unknown_role_is_member() {
        let membership: TenantMembership =
            serde_json::from_value(json!({"tenant_id": "T", "role": "treasurer"})).unwrap();
        assert_eq!(membership.role, MemberRole::Member);
        assert_eq!(MemberRole::parse("Admin"), MemberRole::Member);
    }

    #[test]
    fn patterns_match_exact_collection_or_wildcard() {
        assert!(pattern_matches("T:*", "T", "anything"));
        assert!(pattern_matches("T:crm", "T", "crm"));
        assert!(!pattern_matches("T:crm", "T", "crm_contacts"));
        assert!(!pattern_matches("T:crm", "U", "crm"));
        assert!(!pattern_matches("malformed", "T", "crm"));
    }

    #[test]
    fn scoped_collection_name_prefixes_tenant() {
        assert_eq!(scoped_collection_name(Some("T"), "crm"), "T:crm");
        assert_eq!(scoped_collection_name(Some("  "), "crm"), "crm");
        assert_eq!(scoped_collection_name(None, "crm"), "crm");
    }

    #[test]
    fn expiry_checks() {
        let grant = PermissionGrant::for_memberships("u", &[], ISSUED_AT);
        assert!(!grant.is_expired_at(ISSUED_AT));
        assert!(grant.is_expired_at(ISSUED_AT + 3600));
        assert!(!grant.expires_within(Duration::from_secs(60), ISSUED_AT));
        assert!(grant.expires_within(Duration::from_secs(60), ISSUED_AT + 3550));
    }

    #[test]
    fn response_wire_shape_is_camel_case() {
        let grant = PermissionGrant::for_memberships(
            "user-1",
            &[TenantMembership::new("T", MemberRole::Admin)],
            ISSUED_AT,
        );
        let value = serde_json::to_value(AuthWebhookResponse::granted(grant.clone())).unwrap();
        assert_eq!(
            value,
            json!({
                "authenticated": true,
                "userId": "user-1",
                "permissions": {"read": ["T:*"], "write": ["T:*"]},
                "expiresAt": ISSUED_AT + 3600
            })
        );

        let parsed: AuthWebhookResponse = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.into_grant(), Some(grant));
    }

    #[test]
    fn denied_response_has_no_grant() {
        let value = serde_json::to_value(AuthWebhookResponse::denied("No token provided")).unwrap();
        assert_eq!(
            value,
            json!({"authenticated": false, "error": "No token provided"})
        );
        assert_eq!(AuthWebhookResponse::denied("x").into_grant(), None);
    }

    #[test]
    fn request_debug_redacts_token() {
        let request = AuthWebhookRequest {
            token: Some("secret".to_string()),
            client_id: Some("client".to_string()),
        };
        let debug = format!("{request:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
