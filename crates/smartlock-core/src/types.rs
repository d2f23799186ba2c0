use crate::{
    Result,
    config::LockConfig,
    constants::{ACL_SEPARATOR, MAX_CODE_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::{Choice, ConstantTimeEq};

/// Code presented at the panel, either typed on the keypad or read from a card.
///
/// Codes are normalized (trimmed and lower-cased) on construction so that
/// lookups in an [`AccessList`] are case-insensitive.
///
/// # Security
/// Equality is constant-time to avoid leaking how much of a code matched.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessCode(String);

impl AccessCode {
    /// Create a new access code with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidAccessCode` if the normalized code is empty,
    /// longer than [`MAX_CODE_LENGTH`] or contains the list separator.
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim().to_lowercase();

        if code.is_empty() {
            return Err(Error::InvalidAccessCode("code is empty".to_string()));
        }

        if code.chars().count() > MAX_CODE_LENGTH {
            return Err(Error::InvalidAccessCode(format!(
                "code must be at most {MAX_CODE_LENGTH} chars"
            )));
        }

        if code.contains(ACL_SEPARATOR) {
            return Err(Error::InvalidAccessCode(format!(
                "code must not contain '{ACL_SEPARATOR}'"
            )));
        }

        Ok(AccessCode(code))
    }

    /// Get the normalized code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AccessCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AccessCode::new(s)
    }
}

impl TryFrom<String> for AccessCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        AccessCode::new(&value)
    }
}

impl From<AccessCode> for String {
    fn from(code: AccessCode) -> Self {
        code.0
    }
}

impl PartialEq for AccessCode {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for AccessCode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Wire representations accepted for an access list.
///
/// Older configuration sources send a `;`-joined string, newer ones a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum AccessListRepr {
    Joined(String),
    List(Vec<String>),
}

impl From<AccessListRepr> for AccessList {
    fn from(repr: AccessListRepr) -> Self {
        match repr {
            AccessListRepr::Joined(joined) => AccessList::from_joined(&joined),
            AccessListRepr::List(codes) => AccessList::from_codes(codes.iter().map(String::as_str)),
        }
    }
}

/// Ordered set of normalized codes authorized to open the lock.
///
/// This is the single canonical representation used by the controller; the
/// joined-string and list forms are both converted at the config boundary.
///
/// # Examples
///
/// ```
/// use smartlock_core::{AccessCode, AccessList};
///
/// let acl = AccessList::from_joined("A1B2; c3d4;;");
/// assert_eq!(acl.len(), 2);
///
/// let code = AccessCode::new("a1b2").unwrap();
/// assert_eq!(acl.authorize(&code), Ok(true));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AccessListRepr", into = "Vec<String>")]
pub struct AccessList(Vec<AccessCode>);

impl AccessList {
    /// Create an empty access list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from a `;`-joined string.
    ///
    /// Blank and invalid entries are skipped, duplicates keep their first position.
    #[must_use]
    pub fn from_joined(joined: &str) -> Self {
        Self::from_codes(joined.split(ACL_SEPARATOR))
    }

    /// Build a list from individual codes.
    ///
    /// Blank and invalid entries are skipped, duplicates keep their first position.
    pub fn from_codes<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        let mut list = Self::new();
        for raw in codes {
            if let Ok(code) = AccessCode::new(raw) {
                list.insert(code);
            }
        }
        list
    }

    /// Insert a code, returning `false` if it was already present.
    pub fn insert(&mut self, code: AccessCode) -> bool {
        if self.0.contains(&code) {
            return false;
        }
        self.0.push(code);
        true
    }

    /// Check whether `code` is authorized.
    ///
    /// Every entry is compared so the time taken does not depend on where
    /// (or whether) the code is found.
    ///
    /// # Errors
    /// Returns `Error::EmptyAccessList` when the list has no entries, which
    /// is a misconfiguration rather than a plain miss.
    pub fn authorize(&self, code: &AccessCode) -> Result<bool> {
        if self.0.is_empty() {
            return Err(Error::EmptyAccessList);
        }

        let found = self.0.iter().fold(Choice::from(0), |acc, entry| {
            acc | entry.as_str().as_bytes().ct_eq(code.as_str().as_bytes())
        });

        Ok(found.into())
    }

    /// Number of codes in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list has no codes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the codes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AccessCode> {
        self.0.iter()
    }

    /// Join the codes back into the `;`-separated form.
    #[must_use]
    pub fn to_joined(&self) -> String {
        self.0
            .iter()
            .map(AccessCode::as_str)
            .collect::<Vec<_>>()
            .join(&ACL_SEPARATOR.to_string())
    }
}

impl From<AccessList> for Vec<String> {
    fn from(list: AccessList) -> Self {
        list.0.into_iter().map(String::from).collect()
    }
}

/// Live lock state, owned by the control loop.
///
/// `blocked` is an overlay on top of `closed`: a blocked lock never opens
/// from the keypad or card path, whatever its access list says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockState {
    /// Lock is closed (door secured).
    pub closed: bool,

    /// Lock is blocked by the operator.
    pub blocked: bool,

    /// Audio feedback is enabled.
    pub sound_enabled: bool,

    /// Alert level attached to denial alerts.
    pub alert_level: i32,

    /// Auto-close delay in seconds, `<= 0` disables auto-close.
    pub auto_close_secs: i64,

    /// Codes authorized to open the lock.
    pub access_list: AccessList,
}

impl LockState {
    /// Create the initial state from a configuration snapshot.
    #[must_use]
    pub fn from_config(config: &LockConfig) -> Self {
        Self {
            closed: config.closed,
            blocked: config.blocked,
            sound_enabled: config.sound,
            alert_level: config.alert,
            auto_close_secs: config.timer,
            access_list: config.acl.clone(),
        }
    }

    /// Refresh every field except `closed` from a newer snapshot.
    ///
    /// `closed` is left to the caller because it has to go through the actuator.
    pub fn refresh(&mut self, config: &LockConfig) {
        self.blocked = config.blocked;
        self.sound_enabled = config.sound;
        self.alert_level = config.alert;
        self.auto_close_secs = config.timer;
        self.access_list = config.acl.clone();
    }
}

impl Default for LockState {
    fn default() -> Self {
        Self::from_config(&LockConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("A1B2", "a1b2")]
    #[case("  1234 ", "1234")]
    #[case("DeadBeef", "deadbeef")]
    fn test_access_code_normalized(#[case] input: &str, #[case] expected: &str) {
        let code = AccessCode::new(input).unwrap();
        assert_eq!(code.as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("a;b")]
    fn test_access_code_invalid(#[case] input: &str) {
        assert!(AccessCode::new(input).is_err());
    }

    #[test]
    fn test_access_code_too_long() {
        let long = "1".repeat(MAX_CODE_LENGTH + 1);
        assert!(AccessCode::new(&long).is_err());
        assert!(AccessCode::new(&long[1..]).is_ok());
    }

    #[test]
    fn test_access_list_from_joined() {
        let acl = AccessList::from_joined("A1B2;;c3d4; a1b2 ");
        assert_eq!(acl.len(), 2);
        assert_eq!(acl.to_joined(), "a1b2;c3d4");
    }

    #[test]
    fn test_access_list_authorize() {
        let acl = AccessList::from_codes(["A1B2", "9999"]);

        assert_eq!(acl.authorize(&AccessCode::new("a1b2").unwrap()), Ok(true));
        assert_eq!(acl.authorize(&AccessCode::new("A1B2").unwrap()), Ok(true));
        assert_eq!(acl.authorize(&AccessCode::new("a1b3").unwrap()), Ok(false));
        assert_eq!(acl.authorize(&AccessCode::new("a1b").unwrap()), Ok(false));
    }

    #[test]
    fn test_empty_access_list_is_an_error() {
        let acl = AccessList::new();
        let result = acl.authorize(&AccessCode::new("1234").unwrap());
        assert_eq!(result, Err(Error::EmptyAccessList));
    }

    #[test]
    fn test_access_list_deserialize_both_forms() {
        let joined: AccessList = serde_json::from_str(r#""a1b2;C3D4""#).unwrap();
        let list: AccessList = serde_json::from_str(r#"["A1B2", "c3d4"]"#).unwrap();
        assert_eq!(joined, list);

        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"["a1b2","c3d4"]"#);
    }

    #[test]
    fn test_lock_state_refresh_keeps_closed() {
        let mut state = LockState::default();
        assert!(state.closed);

        let config = LockConfig {
            closed: false,
            blocked: true,
            timer: 5,
            ..LockConfig::default()
        };
        state.refresh(&config);

        assert!(state.closed);
        assert!(state.blocked);
        assert_eq!(state.auto_close_secs, 5);
    }
}
