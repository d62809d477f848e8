//! Shell escaping and quoting utilities.

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote and join multiple arguments for shell execution.
pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wrap an entire command string in single quotes so it survives `sh -c`.
pub fn escape_command_for_shell(command: &str) -> String {
    format!("'{}'", escape_single_quote_content(command))
}

/// Quote a path for shell execution (always quotes).
pub fn quote_path(path: &str) -> String {
    format!("'{}'", escape_single_quote_content(path))
}

/// Join a base directory and a relative path with exactly one separator.
pub fn join_path(base: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    if base.is_empty() {
        return relative.to_string();
    }
    if relative.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), relative)
}

/// Split a path into its parent directory and final component.
pub fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => (".", trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_arg_simple() {
        assert_eq!(quote_arg("pm-list"), "pm-list");
        assert_eq!(quote_arg("1.2.3"), "1.2.3");
    }

    #[test]
    fn quote_arg_with_spaces() {
        assert_eq!(quote_arg("cc all"), "'cc all'");
    }

    #[test]
    fn quote_arg_with_single_quote() {
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
    }

    #[test]
    fn quote_arg_empty() {
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn quote_args_mixed() {
        let args = vec!["pm-list".to_string(), "--status=disabled,not installed".to_string()];
        assert_eq!(quote_args(&args), "pm-list '--status=disabled,not installed'");
    }

    #[test]
    fn quote_path_always_quotes() {
        assert_eq!(quote_path("/srv/app/releases"), "'/srv/app/releases'");
        assert_eq!(quote_path("/srv/it's"), "'/srv/it'\\''s'");
    }

    #[test]
    fn escape_command_wraps_operators() {
        assert_eq!(
            escape_command_for_shell("cd /srv && ls"),
            "'cd /srv && ls'"
        );
    }

    #[test]
    fn join_path_normalizes_separators() {
        assert_eq!(join_path("/srv/app/", "/shared"), "/srv/app/shared");
        assert_eq!(join_path("/srv/app", "config.yml"), "/srv/app/config.yml");
        assert_eq!(join_path("/srv/app", ""), "/srv/app");
        assert_eq!(join_path("", "media"), "media");
    }

    #[test]
    fn split_parent_handles_root_and_relative() {
        assert_eq!(split_parent("/srv/app/current"), ("/srv/app", "current"));
        assert_eq!(split_parent("/current"), ("/", "current"));
        assert_eq!(split_parent("current"), (".", "current"));
        assert_eq!(split_parent("/srv/app/media/"), ("/srv/app", "media"));
    }
}
