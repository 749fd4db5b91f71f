//! Account types returned before and after `authorize`.

use serde::Deserialize;

/// One entry of `getUserLogin`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserLoginInfo {
    pub username: String,
    #[serde(rename = "currentOSUsername", default)]
    pub current_os_username: Option<String>,
    #[serde(rename = "loggedInOSUsername", default)]
    pub logged_in_os_username: Option<String>,
    #[serde(rename = "lastLoginTime", default)]
    pub last_login_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_user_login() {
        let json = r#"[{
            "currentOSUsername": "alice",
            "lastLoginTime": "2024-01-15T10:30:00.000+07:00",
            "loggedInOSUsername": "alice",
            "username": "alice_emotiv"
        }]"#;
        let users: Vec<UserLoginInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(users[0].username, "alice_emotiv");
        assert_eq!(users[0].current_os_username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_optional_fields_default() {
        let user: UserLoginInfo = serde_json::from_str(r#"{"username": "bob"}"#).unwrap();
        assert!(user.last_login_time.is_none());
    }
}
