//! UNC share-name parsing and the share-interception filter.
//!
//! Grounded on `FSCache.full_path_from_sharename` in `fs_cache.py`: a share
//! name is a `\\host\share` UNC, and two special host prefixes select an
//! alternate mapping instead of the literal host/share pair.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

const DRIVE_PREFIX: &str = "hostluna_drive_";
const NFS_PREFIX: &str = "hostluna_nfs";

/// Resolves a `(share_name, relative_path)` pair to the absolute path the
/// backend fileserver understands.
///
/// - `\\hostluna_drive_X\share` maps to the `X:\` drive.
/// - `\\hostluna_nfs\<base64>` maps to the POSIX path the base64 segment
///   decodes to, with the relative path's separators flipped to `/`.
/// - Anything else is joined onto the share name as a plain UNC path.
pub fn full_path_from_share(share_name: &str, path: &str) -> String {
    let parts: Vec<&str> = share_name.trim_start_matches('\\').split('\\').collect();
    let (unc_host, unc_share) = match parts.as_slice() {
        [host, share, ..] => (*host, *share),
        [host] => (*host, ""),
        [] => ("", ""),
    };

    if let Some(drive_letter) = unc_host
        .strip_prefix(DRIVE_PREFIX)
        .and_then(|rest| rest.chars().next())
    {
        let prefix = format!("{drive_letter}:\\");
        join_windows(&prefix, path)
    } else if unc_host.starts_with(NFS_PREFIX) {
        match BASE64.decode(unc_share) {
            Ok(decoded) => {
                let prefix = String::from_utf8_lossy(&decoded).into_owned();
                let suffix = path.replace('\\', "/");
                join_posix(&prefix, &suffix)
            }
            Err(_) => join_windows(share_name, path),
        }
    } else {
        join_windows(share_name, path)
    }
}

fn join_windows(prefix: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return prefix.trim_end_matches('\\').to_string();
    }
    format!(
        "{}\\{}",
        prefix.trim_end_matches('\\'),
        suffix.trim_start_matches('\\')
    )
}

fn join_posix(prefix: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return prefix.trim_end_matches('/').to_string();
    }
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        suffix.trim_start_matches('/')
    )
}

/// Shares the proxy never intercepts, regardless of configuration: the
/// administrative SMB shares, and the proxy's own scratch share (matched by
/// suffix, case-insensitively, since studios mount it under varying UNC
/// prefixes).
pub fn is_excluded_share(share_name: &str) -> bool {
    let last_component = share_name.rsplit('\\').find(|s| !s.is_empty()).unwrap_or("");
    let trimmed = last_component.trim_end_matches('$');
    trimmed.eq_ignore_ascii_case("IPC")
        || trimmed.eq_ignore_ascii_case("ADMIN")
        || last_component.to_ascii_lowercase().ends_with("my_seekscale_data")
}

/// Rewrites the UNC host component of `share_name` to `force_host`, when
/// configured. This replaces the original implementation's hardcoded
/// `"HOTFIX"` host rewrite with a config-driven one, so the same proxy
/// binary can serve multiple tenants with different backend host names.
pub fn apply_force_host(share_name: &str, force_host: Option<&str>) -> String {
    let Some(force_host) = force_host else {
        return share_name.to_string();
    };
    let mut parts: Vec<&str> = share_name.split('\\').collect();
    // `share_name` looks like ["", "", host, share, ...] once split on '\\'.
    if let Some(host_slot) = parts.iter_mut().find(|p| !p.is_empty()) {
        *host_slot = force_host;
    }
    parts.join("\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_share_maps_to_drive_letter() {
        let p = full_path_from_share(r"\\hostluna_drive_e\whatever", r"foo\bar.txt");
        assert_eq!(p, r"e:\foo\bar.txt");
    }

    #[test]
    fn nfs_share_decodes_base64_prefix() {
        let prefix = "/mnt/data";
        let b64 = BASE64.encode(prefix);
        let share = format!(r"\\hostluna_nfs\{b64}");
        let p = full_path_from_share(&share, r"foo\bar.txt");
        assert_eq!(p, "/mnt/data/foo/bar.txt");
    }

    #[test]
    fn plain_share_joins_unc_path() {
        let p = full_path_from_share(r"\\myserver\share", r"foo\bar.txt");
        assert_eq!(p, r"\\myserver\share\foo\bar.txt");
    }

    #[test]
    fn excludes_admin_shares_and_seekscale_data() {
        assert!(is_excluded_share("IPC$"));
        assert!(is_excluded_share("ADMIN$"));
        assert!(is_excluded_share(r"MY_SEEKSCALE_DATA"));
        assert!(!is_excluded_share("projects"));
    }

    #[test]
    fn excludes_admin_shares_with_a_real_unc_host_prefix() {
        assert!(is_excluded_share(r"\\HOST\IPC$"));
        assert!(is_excluded_share(r"\\HOST\ADMIN$"));
        assert!(is_excluded_share(r"\\HOST\my_seekscale_data"));
        assert!(!is_excluded_share(r"\\HOST\projects"));
    }

    #[test]
    fn force_host_rewrites_host_component() {
        let p = apply_force_host(r"\\original\share", Some("rewritten"));
        assert_eq!(p, r"\\rewritten\share");
    }

    #[test]
    fn force_host_noop_when_unset() {
        let p = apply_force_host(r"\\original\share", None);
        assert_eq!(p, r"\\original\share");
    }
}
