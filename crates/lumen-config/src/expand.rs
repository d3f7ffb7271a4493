//! Expansion of host document roots.
//!
//! `${VAR}` and `${VAR:-default}` are replaced from the environment and a
//! leading `~` becomes the home directory. A value without `${` keeps any `$`
//! as written.

use std::borrow::Cow;
use std::env::VarError;

use crate::ConfigError;

/// Expand environment references, then a leading `~`, in the value of
/// `field`.
pub(crate) fn expand_path(value: &str, field: &str) -> Result<String, ConfigError> {
    let with_env = if value.contains("${") {
        shellexpand::env_with_context(value, |name| std::env::var(name).map(Some)).map_err(
            |e| {
                let reason = match e.cause {
                    VarError::NotPresent => "not set",
                    VarError::NotUnicode(_) => "not valid UTF-8",
                };
                ConfigError::EnvVar {
                    field: field.to_owned(),
                    message: format!("${{{}}} {reason}", e.var_name),
                }
            },
        )?
    } else {
        Cow::Borrowed(value)
    };
    Ok(shellexpand::tilde(&with_env).into_owned())
}
