//! Environment identity: naming, derivation, resolution
//!
//! Every managed environment is keyed by a `fdevc.`-prefixed name. The
//! resolver maps whatever the user typed (nothing, a 1-based index, a bare
//! name, a full identity) onto one of those keys.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::Local;
use rand::Rng;

use crate::error::{FdevcError, Result};

pub const IDENTITY_PREFIX: &str = "fdevc.";
pub const VM_PREFIX: &str = "fdevc.vm.";
pub const TMP_SUFFIX: &str = ".tmp";

const ADJECTIVES: &[&str] = &[
    "happy", "calm", "bold", "eager", "gentle", "bright", "mellow", "serene", "joyful", "brave",
    "curious", "lively", "proud", "spirited", "tranquil", "radiant", "clever", "swift", "nimble",
    "fearless", "daring", "playful", "sunny", "cozy", "sparkling", "valiant", "whimsical", "zen",
    "dapper", "vivid", "cosmic", "stellar",
];

const ANIMALS: &[&str] = &[
    "fox", "panda", "otter", "lynx", "heron", "dolphin", "sparrow", "wolf", "koala", "tiger",
    "alpaca", "falcon", "rabbit", "bison", "jaguar", "whale", "phoenix", "orca", "badger", "lemur",
    "beaver", "owl", "eagle", "seal", "puma", "ibis", "yak", "wren", "penguin", "hedgehog",
    "narwhal", "raven", "mongoose",
];

/// Canonical identity of one managed environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnvId(String);

impl EnvId {
    /// Wrap a name already known to be canonical (e.g. from the runtime).
    pub fn new(raw: impl Into<String>) -> Self {
        EnvId(raw.into())
    }

    /// Identity for a user-chosen name. Already-prefixed names pass through.
    pub fn named(name: &str) -> Self {
        if name.starts_with(IDENTITY_PREFIX) {
            EnvId(name.to_string())
        } else {
            EnvId(format!("{}{}", IDENTITY_PREFIX, sanitize(name)))
        }
    }

    /// Identity derived from a directory's base name (the default mode).
    pub fn for_dir(dir: &Path) -> Self {
        let base = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        EnvId(format!("{}{}", IDENTITY_PREFIX, sanitize(&base)))
    }

    /// Timestamp-suffixed disposable identity for the same directory.
    pub fn disposable(dir: &Path) -> Self {
        let base = Self::for_dir(dir);
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        EnvId(format!("{}.{}{}", base.0, stamp, TMP_SUFFIX))
    }

    /// Random `fdevc.vm.<adjective>-<animal>` identity.
    pub fn random_vm() -> Self {
        let mut rng = rand::thread_rng();
        let adj = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
        let animal = ANIMALS[rng.gen_range(0..ANIMALS.len())];
        EnvId(format!("{}{}-{}", VM_PREFIX, adj, animal))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without the `fdevc.` prefix, for display.
    pub fn short(&self) -> &str {
        self.0.strip_prefix(IDENTITY_PREFIX).unwrap_or(&self.0)
    }

    pub fn is_vm(&self) -> bool {
        self.0.starts_with(VM_PREFIX)
    }

    pub fn is_tmp(&self) -> bool {
        self.0.ends_with(TMP_SUFFIX)
    }

    /// For a `.tmp` identity, the identity it was derived from: the `.tmp`
    /// suffix goes, and so does the timestamp segment `disposable` added.
    pub fn base(&self) -> Option<EnvId> {
        let stripped = self.0.strip_suffix(TMP_SUFFIX)?;
        let base = match stripped.rsplit_once('.') {
            Some((head, stamp)) if is_timestamp(stamp) => head,
            _ => stripped,
        };
        Some(EnvId(base.to_string()))
    }

    /// Tag under which a build-recipe image for this identity is stored.
    pub fn image_tag(&self) -> String {
        format!("fdevc.img.{}", self.short())
    }
}

impl std::fmt::Display for EnvId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EnvId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The `%Y%m%d-%H%M%S` shape `disposable` stamps onto its base name.
fn is_timestamp(s: &str) -> bool {
    s.len() == 15
        && s.as_bytes()[8] == b'-'
        && s.bytes()
            .enumerate()
            .all(|(i, b)| i == 8 || b.is_ascii_digit())
}

/// Reduce a name to runtime-safe characters: lowercase alphanumerics plus
/// `.`, `-`, `_`. Everything else becomes `-`.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "env".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The ordered listing numeric references index into: live names and saved
/// identities, deduplicated and sorted.
pub fn indexed_union(live: &[String], saved: &[String]) -> Vec<String> {
    let mut names: BTreeSet<&String> = live.iter().collect();
    names.extend(saved.iter());
    names.into_iter().cloned().collect()
}

/// Map a user reference onto an identity.
///
/// No reference derives from `cwd`; an all-digit reference is a 1-based
/// index into `names` and fails when out of range; anything else names an
/// identity verbatim (known names match first, with or without the
/// `fdevc.` prefix), so a fresh name is how new environments get created.
pub fn resolve(user_ref: Option<&str>, names: &[String], cwd: &Path) -> Result<EnvId> {
    let user_ref = match user_ref {
        None | Some("") => return Ok(EnvId::for_dir(cwd)),
        Some(r) => r,
    };

    if let Ok(index) = user_ref.parse::<usize>() {
        if index >= 1 {
            if let Some(name) = names.get(index - 1) {
                return Ok(EnvId::new(name.clone()));
            }
        }
        return Err(FdevcError::IdentityNotFound(user_ref.to_string()));
    }

    if names.iter().any(|n| n == user_ref) {
        return Ok(EnvId::new(user_ref));
    }
    let prefixed = format!("{}{}", IDENTITY_PREFIX, user_ref);
    if names.iter().any(|n| n == &prefixed) {
        return Ok(EnvId::new(prefixed));
    }
    Ok(EnvId::named(user_ref))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("My Project!"), "my-project");
        assert_eq!(sanitize("api_v2.widgets"), "api_v2.widgets");
        assert_eq!(sanitize("///"), "env");
    }

    #[test]
    fn test_named_is_idempotent_on_prefixed_input() {
        assert_eq!(EnvId::named("proj").as_str(), "fdevc.proj");
        assert_eq!(EnvId::named("fdevc.proj").as_str(), "fdevc.proj");
    }

    #[test]
    fn test_for_dir_uses_base_name() {
        let id = EnvId::for_dir(Path::new("/home/u/My Widgets"));
        assert_eq!(id.as_str(), "fdevc.my-widgets");
        assert_eq!(id.short(), "my-widgets");
    }

    #[test]
    fn test_disposable_shape() {
        let id = EnvId::disposable(Path::new("/home/u/proj"));
        assert!(id.as_str().starts_with("fdevc.proj."));
        assert!(id.is_tmp());
        assert_eq!(id.base().unwrap().as_str(), "fdevc.proj");
    }

    #[test]
    fn test_base_without_timestamp_only_drops_the_suffix() {
        assert_eq!(
            EnvId::new("fdevc.proj.tmp").base().unwrap().as_str(),
            "fdevc.proj"
        );
    }

    #[test]
    fn test_vm_label_shape() {
        let id = EnvId::random_vm();
        assert!(id.is_vm());
        let label = id.as_str().strip_prefix(VM_PREFIX).unwrap();
        let (adj, animal) = label.split_once('-').unwrap();
        assert!(ADJECTIVES.contains(&adj));
        assert!(ANIMALS.contains(&animal));
    }

    #[test]
    fn test_base_of_non_tmp_is_none() {
        assert_eq!(EnvId::named("proj").base(), None);
    }

    #[test]
    fn test_image_tag() {
        assert_eq!(EnvId::named("proj").image_tag(), "fdevc.img.proj");
    }

    #[test]
    fn test_indexed_union_sorts_and_dedups() {
        let live = names(&["fdevc.b", "fdevc.a"]);
        let saved = names(&["fdevc.c", "fdevc.a"]);
        assert_eq!(
            indexed_union(&live, &saved),
            names(&["fdevc.a", "fdevc.b", "fdevc.c"])
        );
    }

    #[test]
    fn test_resolve_empty_derives_from_cwd() {
        let cwd = PathBuf::from("/home/u/proj");
        let id = resolve(None, &[], &cwd).unwrap();
        assert_eq!(id.as_str(), "fdevc.proj");
        let id = resolve(Some(""), &[], &cwd).unwrap();
        assert_eq!(id.as_str(), "fdevc.proj");
    }

    #[test]
    fn test_resolve_numeric_is_one_based() {
        let listing = names(&["fdevc.a", "fdevc.b", "fdevc.c"]);
        let cwd = PathBuf::from("/tmp");
        let id = resolve(Some("2"), &listing, &cwd).unwrap();
        assert_eq!(id.as_str(), "fdevc.b");
    }

    #[test]
    fn test_resolve_numeric_out_of_range_is_not_found() {
        let listing = names(&["fdevc.only"]);
        let cwd = PathBuf::from("/tmp");
        let err = resolve(Some("2"), &listing, &cwd).unwrap_err();
        assert!(matches!(err, FdevcError::IdentityNotFound(r) if r == "2"));
        let err = resolve(Some("0"), &listing, &cwd).unwrap_err();
        assert!(matches!(err, FdevcError::IdentityNotFound(_)));
    }

    #[test]
    fn test_resolve_verbatim_then_prefixed() {
        let listing = names(&["fdevc.app"]);
        let cwd = PathBuf::from("/tmp");
        assert_eq!(
            resolve(Some("fdevc.app"), &listing, &cwd).unwrap().as_str(),
            "fdevc.app"
        );
        assert_eq!(
            resolve(Some("app"), &listing, &cwd).unwrap().as_str(),
            "fdevc.app"
        );
    }

    #[test]
    fn test_resolve_fresh_name_passes_through() {
        let listing = names(&["fdevc.app"]);
        let cwd = PathBuf::from("/tmp");
        assert_eq!(
            resolve(Some("ghost"), &listing, &cwd).unwrap().as_str(),
            "fdevc.ghost"
        );
    }
}
