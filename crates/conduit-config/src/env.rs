use std::sync::OnceLock;

use regex::Regex;

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// Supports an optional default value via `{{ env.VAR | default("fallback") }}`.
/// Expansion happens on the raw config text before deserialization, so
/// config structs use plain String/SecretString. Lines starting with `#`
/// (TOML comments) are passed through unchanged.
pub fn expand_env(input: &str) -> Result<String, String> {
    fn re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        // Group 1: the scoped key (e.g. `env.VAR_NAME`)
        // Group 2: optional default inside default("...")
        RE.get_or_init(|| {
            Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
                .expect("must be valid regex")
        })
    }

    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut failure: Option<String> = None;
        let expanded = re().replace_all(line, |captures: &regex::Captures<'_>| {
            let key = captures.get(1).map_or("", |m| m.as_str());
            let default_value = captures.get(2).map(|m| m.as_str());

            let Some(var_name) = key.strip_prefix("env.").filter(|rest| !rest.contains('.')) else {
                failure = Some(format!("only variables scoped with 'env.' are supported: `{key}`"));
                return String::new();
            };

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => default_value.map_or_else(
                    || {
                        failure = Some(format!("environment variable not found: `{var_name}`"));
                        String::new()
                    },
                    ToOwned::to_owned,
                ),
            }
        });

        if let Some(err) = failure {
            return Err(err);
        }

        output.push_str(&expanded);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_placeholders() {
        let input = "key = \"value\"";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn single_env_var() {
        temp_env::with_var("CONDUIT_TEST_VAR", Some("hello"), || {
            let result = expand_env("key = \"{{ env.CONDUIT_TEST_VAR }}\"").unwrap();
            assert_eq!(result, "key = \"hello\"");
        });
    }

    #[test]
    fn missing_env_var() {
        temp_env::with_var_unset("CONDUIT_MISSING_VAR", || {
            let err = expand_env("key = \"{{ env.CONDUIT_MISSING_VAR }}\"").unwrap_err();
            assert!(err.contains("CONDUIT_MISSING_VAR"));
        });
    }

    #[test]
    fn unsupported_scope() {
        let err = expand_env("key = \"{{ foo.BAR }}\"").unwrap_err();
        assert!(err.contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn commented_lines_skip_expansion() {
        temp_env::with_var_unset("CONDUIT_MISSING_VAR", || {
            let input = "# key = \"{{ env.CONDUIT_MISSING_VAR }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }

    #[test]
    fn default_used_when_var_missing() {
        temp_env::with_var_unset("CONDUIT_OPTIONAL_VAR", || {
            let result = expand_env("key = \"{{ env.CONDUIT_OPTIONAL_VAR | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"fallback\"");
        });
    }

    #[test]
    fn default_not_used_when_var_present() {
        temp_env::with_var("CONDUIT_OPTIONAL_VAR", Some("actual"), || {
            let result = expand_env("key = \"{{ env.CONDUIT_OPTIONAL_VAR | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"actual\"");
        });
    }
}
