//! Portable path codec
//!
//! Records are shared and replayed from different filesystem roots, so
//! absolute paths are stored as relocatable tokens: paths under the project
//! root become `$PROJECT_ROOT/...`, paths under the home directory become
//! `$HOME/...`, anything else is preserved as-is. Expansion reverses the
//! first matching placeholder and leaves unknown placeholders untouched.

use std::path::{Path, PathBuf};

pub const PROJECT_ROOT_TOKEN: &str = "$PROJECT_ROOT";
pub const HOME_TOKEN: &str = "$HOME";

/// Collapse an absolute path into its portable token form.
pub fn collapse(path: &Path, project_root: Option<&Path>, home: Option<&Path>) -> String {
    if let Some(root) = project_root {
        if let Some(token) = replace_prefix(path, root, PROJECT_ROOT_TOKEN) {
            return token;
        }
    }
    if let Some(home) = home {
        if let Some(token) = replace_prefix(path, home, HOME_TOKEN) {
            return token;
        }
    }
    path.to_string_lossy().to_string()
}

/// Expand a stored token back into a concrete path.
pub fn expand(token: &str, project_root: Option<&Path>, home: Option<&Path>) -> PathBuf {
    if let Some(root) = project_root {
        if let Some(path) = restore_prefix(token, PROJECT_ROOT_TOKEN, root) {
            return path;
        }
    }
    if let Some(home) = home {
        if let Some(path) = restore_prefix(token, HOME_TOKEN, home) {
            return path;
        }
    }
    PathBuf::from(token)
}

/// Collapse absolute-path tokens inside a command string.
///
/// Startup commands often reference files (`/home/u/proj/setup.sh --fast`);
/// each space-separated token that is an absolute path is collapsed on its
/// own. Spacing is preserved exactly so the expanded command matches the
/// original byte for byte.
pub fn collapse_command(cmd: &str, project_root: Option<&Path>, home: Option<&Path>) -> String {
    map_command_tokens(cmd, |tok| {
        if tok.starts_with('/') {
            collapse(Path::new(tok), project_root, home)
        } else {
            tok.to_string()
        }
    })
}

/// Expand placeholder tokens inside a command string.
pub fn expand_command(cmd: &str, project_root: Option<&Path>, home: Option<&Path>) -> String {
    map_command_tokens(cmd, |tok| {
        if tok.starts_with(PROJECT_ROOT_TOKEN) || tok.starts_with(HOME_TOKEN) {
            expand(tok, project_root, home).to_string_lossy().to_string()
        } else {
            tok.to_string()
        }
    })
}

fn map_command_tokens(cmd: &str, f: impl Fn(&str) -> String) -> String {
    cmd.split(' ').map(|tok| f(tok)).collect::<Vec<_>>().join(" ")
}

fn replace_prefix(path: &Path, prefix: &Path, token: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix).ok()?;
    if rest.as_os_str().is_empty() {
        Some(token.to_string())
    } else {
        Some(format!("{}/{}", token, rest.to_string_lossy()))
    }
}

fn restore_prefix(token: &str, placeholder: &str, base: &Path) -> Option<PathBuf> {
    if token == placeholder {
        return Some(base.to_path_buf());
    }
    let rest = token.strip_prefix(placeholder)?.strip_prefix('/')?;
    Some(base.join(rest))
}
