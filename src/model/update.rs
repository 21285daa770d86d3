//! Tri-state field updates for PATCH payloads.
//!
//! A nullable attribute in a patch can be left alone (field absent), cleared
//! (explicit `null`) or replaced (any other value). Fields of this type must
//! carry `#[serde(default)]` so an absent field becomes [`UpdateValue::NoChange`].

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum UpdateValue<T> {
    /// Replace the value.
    Set(T),
    /// Clear the value.
    Unset,
    /// Keep the current value.
    #[default]
    NoChange,
}

impl<T> UpdateValue<T> {
    pub fn is_change(&self) -> bool {
        !matches!(self, UpdateValue::NoChange)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            UpdateValue::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn apply_to(self, existing: Option<T>) -> Option<T> {
        match self {
            UpdateValue::Set(value) => Some(value),
            UpdateValue::Unset => None,
            UpdateValue::NoChange => existing,
        }
    }

    pub fn map<U, F>(self, f: F) -> UpdateValue<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            UpdateValue::Set(value) => UpdateValue::Set(f(value)),
            UpdateValue::Unset => UpdateValue::Unset,
            UpdateValue::NoChange => UpdateValue::NoChange,
        }
    }

    /// Like [`UpdateValue::map`] for conversions that can reject the value.
    pub fn try_map<U, E, F>(self, f: F) -> Result<UpdateValue<U>, E>
    where
        F: FnOnce(T) -> Result<U, E>,
    {
        Ok(match self {
            UpdateValue::Set(value) => UpdateValue::Set(f(value)?),
            UpdateValue::Unset => UpdateValue::Unset,
            UpdateValue::NoChange => UpdateValue::NoChange,
        })
    }
}

impl<'de, T> Deserialize<'de> for UpdateValue<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only reached when the field is present; absence is handled by
        // `#[serde(default)]` on the containing struct.
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => UpdateValue::Set(value),
            None => UpdateValue::Unset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default)]
        host: UpdateValue<String>,
    }

    #[test]
    fn test_absent_null_and_value() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.host, UpdateValue::NoChange);

        let null: Patch = serde_json::from_str(r#"{"host": null}"#).unwrap();
        assert_eq!(null.host, UpdateValue::Unset);

        let set: Patch = serde_json::from_str(r#"{"host": "db"}"#).unwrap();
        assert_eq!(set.host, UpdateValue::Set("db".to_string()));
    }

    #[test]
    fn test_apply_to() {
        let current = Some("old".to_string());
        assert_eq!(UpdateValue::NoChange.apply_to(current.clone()), current);
        assert_eq!(UpdateValue::<String>::Unset.apply_to(current.clone()), None);
        assert_eq!(
            UpdateValue::Set("new".to_string()).apply_to(current),
            Some("new".to_string())
        );
    }

    #[test]
    fn test_try_map() {
        let parsed: Result<UpdateValue<u16>, String> =
            UpdateValue::Set(70_000i64).try_map(|v| u16::try_from(v).map_err(|e| e.to_string()));
        assert!(parsed.is_err());
        assert!(!UpdateValue::<i64>::NoChange.is_change());
    }
}
