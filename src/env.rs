//! Shell-style expansion of configured environment variables.
//!
//! Values are expanded against the environment recorded on the *current*
//! instance, not against the list being expanded, so `PATH=/opt/bin:$PATH`
//! prepends to whatever `PATH` the running image already has. An expansion
//! done before `set_env` commits therefore sees the previous instance.

use crate::metadata::EnvVar;
use std::collections::HashMap;

/// Expands every value and renders the list as `KEY=VALUE` strings.
///
/// Returns `None` for an empty list so callers can tell "no overrides" apart
/// from an explicit override set.
pub fn expand_env_vars(vars: &[EnvVar], env: &HashMap<String, String>) -> Option<Vec<String>> {
    if vars.is_empty() {
        return None;
    }

    Some(
        vars.iter()
            .map(|var| format!("{}={}", var.key, expand(&var.value, env)))
            .collect(),
    )
}

/// Applies `overrides` on top of `base`, both as `KEY=VALUE` lists.
///
/// Keys keep their first position; a later value for the same key wins.
pub fn overlay(base: &[String], overrides: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = base.to_vec();

    for var in overrides {
        let key = var.split_once('=').map(|(k, _)| k).unwrap_or(&var);
        let existing = merged
            .iter()
            .position(|m| m.split_once('=').map(|(k, _)| k).unwrap_or(m) == key);
        match existing {
            Some(idx) => merged[idx] = var,
            None => merged.push(var),
        }
    }

    merged
}

/// Replaces `$name` and `${name}` with values from `env`; unknown names expand to "".
pub fn expand(value: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];

        match shell_name(after) {
            (Some(name), width) => {
                if let Some(v) = env.get(name) {
                    out.push_str(v);
                }
                rest = &after[width..];
            }
            // Bad syntax such as `${}`: the consumed characters are dropped.
            (None, width) if width > 0 => rest = &after[width..],
            (None, _) => {
                out.push('$');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Reads a variable name from the text following a `$`.
///
/// Returns the name (if any) and how many bytes of `s` it consumed.
fn shell_name(s: &str) -> (Option<&str>, usize) {
    let bytes = s.as_bytes();
    let Some(&first) = bytes.first() else {
        return (None, 0);
    };

    if first == b'{' {
        if bytes.len() > 2 && is_special(bytes[1]) && bytes[2] == b'}' {
            return (Some(&s[1..2]), 3);
        }
        return match s[1..].find('}') {
            Some(0) => (None, 2),
            Some(end) => (Some(&s[1..end + 1]), end + 2),
            None => (None, 1),
        };
    }

    if is_special(first) {
        return (Some(&s[..1]), 1);
    }

    let width = bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    if width == 0 {
        (None, 0)
    } else {
        (Some(&s[..width]), width)
    }
}

fn is_special(c: u8) -> bool {
    matches!(c, b'*' | b'#' | b'$' | b'@' | b'!' | b'?' | b'-') || c.is_ascii_digit()
}
