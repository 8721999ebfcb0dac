//! Small helpers for working with sandboxes.

use uuid::Uuid;

/// Generate a sandbox name that will not collide with other active sandboxes:
/// `<prefix>-<8 hex chars>`.
///
/// ```
/// let name = agentkernel_rs::utils::unique_sandbox_name("ci");
/// assert!(name.starts_with("ci-"));
/// assert_eq!(name.len(), "ci-".len() + 8);
/// ```
pub fn unique_sandbox_name(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    let prefix = prefix.trim_end_matches('-');
    if prefix.is_empty() {
        format!("sandbox-{}", &id[..8])
    } else {
        format!("{prefix}-{}", &id[..8])
    }
}
