use std::{path::Path, str::FromStr};

use anyhow::bail;
use indoc::indoc;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use std::fmt::Write;
use toml::Value;

use crate::{Config, RequestMatcherConfig};

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path)?;
    let mut raw_config: Value = toml::from_str(&content)?;

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate(&config)?;

    if !config.server.csrf.enabled {
        log::warn!("CSRF protection is disabled, every state-changing request will be accepted without a token");
    }

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    validate_csrf(config)?;
    validate_session(config)?;
    validate_login(config)?;

    Ok(())
}

fn validate_csrf(config: &Config) -> anyhow::Result<()> {
    let csrf = &config.server.csrf;

    if csrf.parameter_name.trim().is_empty() {
        bail!("server.csrf.parameter_name must not be empty");
    }

    if csrf.max_form_size == 0 {
        bail!("server.csrf.max_form_size must be greater than zero");
    }

    if let Some(endpoint) = &csrf.token_endpoint {
        validate_path("server.csrf.token_endpoint", endpoint)?;
    }

    if let Some(matcher) = &csrf.require_protection {
        validate_matcher("server.csrf.require_protection", matcher)?;
    }

    for (i, matcher) in csrf.ignoring.iter().enumerate() {
        validate_matcher(&format!("server.csrf.ignoring[{i}]"), matcher)?;
    }

    Ok(())
}

fn validate_session(config: &Config) -> anyhow::Result<()> {
    let session = &config.server.session;

    let valid_cookie_name = !session.cookie_name.is_empty()
        && session
            .cookie_name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));

    if !valid_cookie_name {
        bail!(
            "server.session.cookie_name '{}' is not a valid cookie name",
            session.cookie_name
        );
    }

    if session.max_sessions == 0 {
        bail!("server.session.max_sessions must be greater than zero");
    }

    Ok(())
}

fn validate_login(config: &Config) -> anyhow::Result<()> {
    let login = &config.server.login;

    if !login.enabled {
        return Ok(());
    }

    validate_path("server.login.path", &login.path)?;
    validate_path("server.login.logout_path", &login.logout_path)?;

    if login.path == login.logout_path {
        bail!("server.login.path and server.login.logout_path must differ");
    }

    if login.users.is_empty() {
        bail!(indoc! {r#"
            Form login is enabled but no users are configured. Add at least one account, for example:

              [[server.login.users]]
              username = "user"
              password = "{{ env.BULWARK_USER_PASSWORD }}"
        "#});
    }

    Ok(())
}

fn validate_matcher(location: &str, matcher: &RequestMatcherConfig) -> anyhow::Result<()> {
    validate_path(location, matcher.path())
}

fn validate_path(location: &str, path: &str) -> anyhow::Result<()> {
    if !path.starts_with('/') {
        bail!("{location} must start with '/', got '{path}'");
    }

    Ok(())
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();
                for segment in path {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]")?,
                    }
                }
                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}
