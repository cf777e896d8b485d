//! Form login configuration.

use std::borrow::Cow;

use secrecy::SecretString;
use serde::Deserialize;

/// Form login and logout endpoints.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoginConfig {
    /// Whether the login and logout endpoints are exposed.
    pub enabled: bool,
    /// Path accepting the login form.
    pub path: Cow<'static, str>,
    /// Path accepting logout requests.
    pub logout_path: Cow<'static, str>,
    /// Form field holding the username.
    pub username_parameter: String,
    /// Form field holding the password.
    pub password_parameter: String,
    /// Redirect target after a successful login.
    pub success_url: String,
    /// Redirect target after a failed login.
    pub failure_url: String,
    /// Redirect target after logout.
    pub logout_success_url: String,
    /// Accounts allowed to log in.
    pub users: Vec<UserConfig>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: Cow::Borrowed("/login"),
            logout_path: Cow::Borrowed("/logout"),
            username_parameter: "username".into(),
            password_parameter: "password".into(),
            success_url: "/".into(),
            failure_url: "/login?error".into(),
            logout_success_url: "/login?logout".into(),
            users: Vec::new(),
        }
    }
}

/// A single account.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    /// The login name.
    pub username: String,
    /// The plain text password, usually taken from the environment.
    pub password: SecretString,
}
