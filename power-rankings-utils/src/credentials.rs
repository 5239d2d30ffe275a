use std::fmt::{self, Debug};

use derive_more::{AsRef, Display, From};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

pub const USERNAME_VAR: &str = "ESPN_USERNAME";
pub const PASSWORD_VAR: &str = "ESPN_PASSWORD";

#[derive(Debug, TypedBuilder, Serialize, Deserialize)]
pub struct Credentials {
    pub username: Username,
    pub password: Password,
}

#[derive(Clone, Debug, From, AsRef, Display, Serialize, Deserialize)]
#[as_ref(forward)]
pub struct Username(String);

#[derive(Clone, From, AsRef, Serialize, Deserialize)]
#[as_ref(forward)]
pub struct Password(String);
impl Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl Credentials {
    /// Picks explicit values first, then `ESPN_USERNAME` / `ESPN_PASSWORD`.
    /// Empty strings count as missing.
    pub fn resolve(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        let pick = |explicit: Option<&str>, var: &str| {
            explicit
                .map(str::to_owned)
                .or_else(|| std::env::var(var).ok())
                .filter(|x| !x.is_empty())
        };
        Some(Self {
            username: pick(username, USERNAME_VAR)?.into(),
            password: pick(password, PASSWORD_VAR)?.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Credentials;

    #[test]
    fn test_explicit_values_win() {
        let credentials = Credentials::resolve(Some("user@example.com"), Some("secret")).unwrap();
        let username: &str = credentials.username.as_ref();
        let password: &str = credentials.password.as_ref();
        assert_eq!(username, "user@example.com");
        assert_eq!(password, "secret");
    }

    #[test]
    fn test_password_is_not_printed() {
        let credentials = Credentials::builder()
            .username("abc".to_owned().into())
            .password("def".to_owned().into())
            .build();
        let printed = format!("{credentials:?}");
        assert!(printed.contains("abc"));
        assert!(!printed.contains("def"));
    }
}
