//! Profile protocol types.

use std::collections::HashMap;

use serde::Deserialize;

/// Profile state returned by `getCurrentProfile`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentProfileInfo {
    /// Name of the currently loaded profile, or `None` when no profile is loaded.
    pub name: Option<String>,
    /// Whether the profile is loaded by this app.
    #[serde(default, rename = "loadedByThisApp")]
    pub loaded_by_this_app: bool,
    /// Forward-compatible storage for additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CurrentProfileInfo {
    /// Whether `profile` is already loaded for the headset.
    #[must_use]
    pub fn is_loaded(&self, profile: &str) -> bool {
        self.name.as_deref() == Some(profile)
    }
}

/// Actions for the `setupProfile` method that the bridge issues.
#[derive(Debug, Clone, Copy)]
pub enum ProfileAction {
    Load,
    Unload,
}

impl ProfileAction {
    /// Returns the Cortex API string for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileAction::Load => "load",
            ProfileAction::Unload => "unload",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_current_profile_info() {
        let json = r#"{
            "name": "my_profile",
            "loadedByThisApp": true
        }"#;

        let profile: CurrentProfileInfo = serde_json::from_str(json).unwrap();
        assert!(profile.is_loaded("my_profile"));
        assert!(!profile.is_loaded("other"));
        assert!(profile.loaded_by_this_app);
        assert!(profile.extra.is_empty());
    }

    #[test]
    fn test_deserialize_current_profile_info_null_name() {
        let json = r#"{"name": null, "extraField": "x"}"#;

        let profile: CurrentProfileInfo = serde_json::from_str(json).unwrap();
        assert!(profile.name.is_none());
        assert!(!profile.loaded_by_this_app);
        assert!(!profile.is_loaded(""));
        assert_eq!(
            profile.extra.get("extraField"),
            Some(&serde_json::json!("x"))
        );
    }

    #[test]
    fn test_profile_action_strings() {
        assert_eq!(ProfileAction::Load.as_str(), "load");
        assert_eq!(ProfileAction::Unload.as_str(), "unload");
    }
}
