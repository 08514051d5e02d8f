use std::{env, path::PathBuf};

use crate::error::{PathError, PathResult};

/// Returns the user's home directory from `$HOME`.
pub fn home_dir() -> PathResult<PathBuf> {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .ok_or(PathError::NoHome)
}

fn xdg_dir(var: &str, fallback: &str) -> PathResult<PathBuf> {
    match env::var_os(var) {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => Ok(home_dir()?.join(fallback)),
    }
}

/// `$XDG_CONFIG_HOME`, defaulting to `~/.config`.
pub fn xdg_config_home() -> PathResult<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// `$XDG_DATA_HOME`, defaulting to `~/.local/share`.
pub fn xdg_data_home() -> PathResult<PathBuf> {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

/// `$XDG_CACHE_HOME`, defaulting to `~/.cache`.
pub fn xdg_cache_home() -> PathResult<PathBuf> {
    xdg_dir("XDG_CACHE_HOME", ".cache")
}

/// Expands a leading `~` and any `$VAR` / `${VAR}` references in `input`.
///
/// Relative results are kept relative; callers decide what they are relative
/// to.
///
/// # Errors
///
/// * [`PathError::Empty`] if `input` is blank
/// * [`PathError::MissingEnvVar`] if a referenced variable is unset
/// * [`PathError::UnclosedVariable`] for `${` without a closing brace
pub fn resolve_path(input: &str) -> PathResult<PathBuf> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    let mut out = String::with_capacity(input.len());
    let rest = if input == "~" || input.starts_with("~/") {
        out.push_str(&home_dir()?.to_string_lossy());
        &input[1..]
    } else {
        input
    };

    let mut chars = rest.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let var = if chars.peek().map(|&(_, next)| next) == Some('{') {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for (_, c) in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                name.push(c);
            }
            if !closed {
                return Err(PathError::UnclosedVariable {
                    input: rest[idx..].to_string(),
                });
            }
            name
        } else {
            let mut name = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            name
        };

        if var.is_empty() {
            out.push('$');
            continue;
        }

        let value = env::var(&var).map_err(|_| PathError::MissingEnvVar {
            var: var.clone(),
            input: input.to_string(),
        })?;
        out.push_str(&value);
    }

    Ok(PathBuf::from(out))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn with_vars<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let saved: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var_os(k))).collect();
        for (k, v) in vars {
            match v {
                Some(v) => env::set_var(k, v),
                None => env::remove_var(k),
            }
        }
        f();
        for (k, v) in saved {
            match v {
                Some(v) => env::set_var(k, v),
                None => env::remove_var(k),
            }
        }
    }

    #[test]
    #[serial]
    fn test_resolve_tilde_and_vars() {
        with_vars(
            &[("HOME", Some("/home/tester")), ("FDSYNC_SUB", Some("cache"))],
            || {
                assert_eq!(resolve_path("~").unwrap(), PathBuf::from("/home/tester"));
                assert_eq!(
                    resolve_path("~/x/$FDSYNC_SUB").unwrap(),
                    PathBuf::from("/home/tester/x/cache")
                );
                assert_eq!(
                    resolve_path("${HOME}/${FDSYNC_SUB}.db").unwrap(),
                    PathBuf::from("/home/tester/cache.db")
                );
                assert_eq!(resolve_path("a/~b").unwrap(), PathBuf::from("a/~b"));
                assert_eq!(resolve_path("cost$").unwrap(), PathBuf::from("cost$"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_resolve_errors() {
        with_vars(&[("FDSYNC_UNSET", None)], || {
            assert!(matches!(resolve_path("   "), Err(PathError::Empty)));
            assert!(matches!(
                resolve_path("$FDSYNC_UNSET/x"),
                Err(PathError::MissingEnvVar { var, .. }) if var == "FDSYNC_UNSET"
            ));
            assert!(matches!(
                resolve_path("/a/${HOME"),
                Err(PathError::UnclosedVariable { .. })
            ));
        });
    }

    #[test]
    #[serial]
    fn test_xdg_dirs() {
        with_vars(
            &[
                ("HOME", Some("/home/tester")),
                ("XDG_CONFIG_HOME", Some("/cfg")),
                ("XDG_DATA_HOME", None),
                ("XDG_CACHE_HOME", Some("")),
            ],
            || {
                assert_eq!(xdg_config_home().unwrap(), PathBuf::from("/cfg"));
                assert_eq!(
                    xdg_data_home().unwrap(),
                    PathBuf::from("/home/tester/.local/share")
                );
                assert_eq!(
                    xdg_cache_home().unwrap(),
                    PathBuf::from("/home/tester/.cache")
                );
            },
        );
    }
}
