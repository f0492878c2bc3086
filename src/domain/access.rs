///! Page access decisions.
///! Compiled-in role -> path prefix defaults, superseded by admin override rules.

use crate::domain::models::{PageAccessRule, UserRole};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Reachable without a session.
pub const PUBLIC_PATHS: &[&str] = &["/", "/login", "/signup"];

/// Reachable by any signed-in user.
pub const UNIVERSAL_PATHS: &[&str] = &["/dashboard", "/profile", "/settings"];

pub fn default_prefixes(role: UserRole) -> &'static [&'static str] {
    match role {
        UserRole::Candidate => &["/careers", "/applications"],
        UserRole::Salesperson => &["/careers", "/training", "/visits"],
        UserRole::Manager => &[
            "/careers",
            "/jobs",
            "/candidates",
            "/training",
            "/visits",
            "/team",
            "/reports",
        ],
        UserRole::Admin => &["/admin"],
    }
}

/// Default table inverted to page -> roles, used to seed override rows.
pub static DEFAULT_PAGE_ROLES: Lazy<BTreeMap<&'static str, Vec<UserRole>>> = Lazy::new(|| {
    let mut pages: BTreeMap<&'static str, Vec<UserRole>> = BTreeMap::new();
    for role in UserRole::ALL {
        for prefix in default_prefixes(role) {
            pages.entry(*prefix).or_default().push(role);
        }
    }
    for roles in pages.values_mut() {
        if !roles.contains(&UserRole::Admin) {
            roles.push(UserRole::Admin);
        }
    }
    pages
});

/// Who is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Authenticated(UserRole),
    /// Session is valid but the role could not be loaded.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    PageDisabled,
    RoleNotAllowed,
    RoleUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    Deny { reason: DenyReason },
    RedirectToLogin { return_to: String },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Strips query and fragment, removes trailing slashes, ensures a leading slash.
pub fn normalize_path(raw: &str) -> String {
    let path = raw
        .trim()
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Segment-aware prefix match: `/jobs` covers `/jobs/manage` but not `/jobsboard`.
pub fn path_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

pub fn is_universal(path: &str) -> bool {
    UNIVERSAL_PATHS.iter().any(|prefix| path_matches(prefix, path))
}

pub fn default_allows(role: UserRole, path: &str) -> bool {
    default_prefixes(role)
        .iter()
        .any(|prefix| path_matches(prefix, path))
}

pub fn decide(raw_path: &str, viewer: Viewer, overrides: &HashMap<String, PageAccessRule>) -> AccessDecision {
    let path = normalize_path(raw_path);
    if is_public(&path) {
        return AccessDecision::Allow;
    }

    let role = match viewer {
        Viewer::Anonymous => return AccessDecision::RedirectToLogin { return_to: path },
        Viewer::Unresolved => {
            return AccessDecision::Deny {
                reason: DenyReason::RoleUnavailable,
            }
        }
        Viewer::Authenticated(role) => role,
    };

    if is_universal(&path) {
        return AccessDecision::Allow;
    }

    match role {
        UserRole::Admin => AccessDecision::Allow,
        UserRole::Candidate | UserRole::Salesperson | UserRole::Manager => {
            decide_for_member(&path, role, overrides)
        }
    }
}

fn decide_for_member(path: &str, role: UserRole, overrides: &HashMap<String, PageAccessRule>) -> AccessDecision {
    let matching: Vec<&PageAccessRule> = overrides
        .values()
        .filter(|rule| path_matches(&normalize_path(&rule.page_path), path))
        .collect();

    if matching.iter().any(|rule| !rule.is_enabled) {
        return AccessDecision::Deny {
            reason: DenyReason::PageDisabled,
        };
    }

    let allowed = match matching.iter().max_by_key(|rule| rule.page_path.len()) {
        Some(rule) => rule.allowed_roles.contains(&role),
        None => default_allows(role, path),
    };

    if allowed {
        AccessDecision::Allow
    } else {
        AccessDecision::Deny {
            reason: DenyReason::RoleNotAllowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(path: &str, enabled: bool, roles: &[UserRole]) -> (String, PageAccessRule) {
        (
            path.to_string(),
            PageAccessRule {
                page_path: path.to_string(),
                is_enabled: enabled,
                allowed_roles: roles.to_vec(),
                updated_at: Utc::now(),
            },
        )
    }

    fn no_overrides() -> HashMap<String, PageAccessRule> {
        HashMap::new()
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("jobs/"), "/jobs");
        assert_eq!(normalize_path("/training?video=3#quiz"), "/training");
        assert_eq!(normalize_path("/jobs/manage///"), "/jobs/manage");
    }

    #[test]
    fn prefix_match_respects_segments() {
        assert!(path_matches("/jobs", "/jobs"));
        assert!(path_matches("/jobs", "/jobs/manage"));
        assert!(!path_matches("/jobs", "/jobsboard"));
        assert!(!path_matches("/", "/jobs"));
    }

    #[test]
    fn public_paths_allow_everyone() {
        for path in PUBLIC_PATHS {
            assert_eq!(decide(path, Viewer::Anonymous, &no_overrides()), AccessDecision::Allow);
        }
    }

    #[test]
    fn anonymous_is_redirected_with_attempted_path() {
        let decision = decide("/training?video=7", Viewer::Anonymous, &no_overrides());
        assert_eq!(
            decision,
            AccessDecision::RedirectToLogin {
                return_to: "/training".to_string()
            }
        );
    }

    #[test]
    fn universal_paths_allow_any_role() {
        for role in UserRole::ALL {
            for path in ["/dashboard", "/profile", "/settings/notifications"] {
                assert!(decide(path, Viewer::Authenticated(role), &no_overrides()).is_allowed());
            }
        }
    }

    #[test]
    fn unknown_path_denied_for_non_admins() {
        let overrides = HashMap::from([rule("/jobs", true, &[UserRole::Manager])]);
        for role in [UserRole::Candidate, UserRole::Salesperson, UserRole::Manager] {
            assert_eq!(
                decide("/payroll", Viewer::Authenticated(role), &overrides),
                AccessDecision::Deny {
                    reason: DenyReason::RoleNotAllowed
                }
            );
        }
    }

    #[test]
    fn admin_is_always_allowed() {
        let overrides = HashMap::from([
            rule("/jobs", false, &[]),
            rule("/admin", true, &[UserRole::Manager]),
        ]);
        for path in ["/jobs", "/jobs/manage", "/admin/users", "/anything/at/all"] {
            assert!(decide(path, Viewer::Authenticated(UserRole::Admin), &overrides).is_allowed());
            assert!(decide(path, Viewer::Authenticated(UserRole::Admin), &no_overrides()).is_allowed());
        }
    }

    #[test]
    fn salesperson_defaults() {
        let viewer = Viewer::Authenticated(UserRole::Salesperson);
        assert_eq!(
            decide("/jobs/manage", viewer, &no_overrides()),
            AccessDecision::Deny {
                reason: DenyReason::RoleNotAllowed
            }
        );
        assert!(decide("/training", viewer, &no_overrides()).is_allowed());
    }

    #[test]
    fn disabled_override_beats_default() {
        let manager = Viewer::Authenticated(UserRole::Manager);
        assert!(decide("/jobs", manager, &no_overrides()).is_allowed());

        let overrides = HashMap::from([rule("/jobs", false, &[UserRole::Manager, UserRole::Admin])]);
        assert_eq!(
            decide("/jobs", manager, &overrides),
            AccessDecision::Deny {
                reason: DenyReason::PageDisabled
            }
        );
        assert_eq!(
            decide("/jobs/manage", manager, &overrides),
            AccessDecision::Deny {
                reason: DenyReason::PageDisabled
            }
        );
    }

    #[test]
    fn override_roles_replace_default_roles() {
        let overrides = HashMap::from([rule("/visits", true, &[UserRole::Candidate])]);
        assert!(decide("/visits", Viewer::Authenticated(UserRole::Candidate), &overrides).is_allowed());
        assert!(!decide("/visits/today", Viewer::Authenticated(UserRole::Salesperson), &overrides).is_allowed());
    }

    #[test]
    fn most_specific_override_wins() {
        let overrides = HashMap::from([
            rule("/jobs", true, &[UserRole::Manager, UserRole::Salesperson]),
            rule("/jobs/manage", true, &[UserRole::Manager]),
        ]);
        let sales = Viewer::Authenticated(UserRole::Salesperson);
        assert!(decide("/jobs", sales, &overrides).is_allowed());
        assert!(!decide("/jobs/manage/42", sales, &overrides).is_allowed());
    }

    #[test]
    fn unresolved_role_is_denied_not_redirected() {
        assert_eq!(
            decide("/training", Viewer::Unresolved, &no_overrides()),
            AccessDecision::Deny {
                reason: DenyReason::RoleUnavailable
            }
        );
        assert!(decide("/login", Viewer::Unresolved, &no_overrides()).is_allowed());
    }

    #[test]
    fn seeded_defaults_match_static_table() {
        let overrides: HashMap<String, PageAccessRule> = DEFAULT_PAGE_ROLES
            .iter()
            .map(|(path, roles)| rule(path, true, roles))
            .collect();
        for role in [UserRole::Candidate, UserRole::Salesperson, UserRole::Manager] {
            for path in ["/careers", "/applications/12", "/training", "/jobs/manage", "/team", "/admin"] {
                assert_eq!(
                    decide(path, Viewer::Authenticated(role), &overrides).is_allowed(),
                    decide(path, Viewer::Authenticated(role), &no_overrides()).is_allowed(),
                    "{role:?} {path}"
                );
            }
        }
    }
}
