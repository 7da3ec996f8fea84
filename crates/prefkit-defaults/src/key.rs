//! Typed key descriptors and their accessors.
//!
//! Reads never fail: absence, store errors and undecodable values all resolve to the key's
//! default (or `None` for optional keys). Writes never fail either; a value that cannot be
//! encoded is logged and the store is left as it was.

use std::{fmt, marker::PhantomData};

use tracing::{debug, warn};

use crate::{
    suite::Suite,
    value::{SettingValue, ValueKind},
};

/// Which of the four descriptor shapes a key has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyVariant {
    /// Required default; native or structured value.
    Required,
    /// No default; native or structured value.
    Optional,
    /// Required default; secure archived value.
    RequiredSecure,
    /// No default; secure archived value.
    OptionalSecure,
}

/// A setting with a default value.
///
/// Building a key registers its default in the suite's default layer, so every reader of
/// the same store observes it.
///
/// ```rust
/// use prefkit_defaults::{InMemoryDefaultsStore, Key, Suite};
///
/// let suite = Suite::new("app", InMemoryDefaultsStore::new());
/// let retries = Key::in_suite("retryCount", 3_i64, &suite);
///
/// assert_eq!(retries.get(), 3);
/// retries.set(&5);
/// assert_eq!(retries.get(), 5);
/// suite.clear();
/// assert_eq!(retries.get(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Key<T: SettingValue> {
    name: String,
    default: T,
    suite: Suite,
}

impl<T: SettingValue> Key<T> {
    /// Key in the process-wide [`Suite::standard`].
    pub fn new(name: impl Into<String>, default: T) -> Self {
        Self::in_suite(name, default, &Suite::standard())
    }

    pub fn in_suite(name: impl Into<String>, default: T, suite: &Suite) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "setting names must not be empty");

        match default.encode(suite.archiver()) {
            Ok(raw) => suite.register_default(&name, raw),
            Err(err) => {
                warn!(suite = suite.name(), key = %name, "default not registered: {err}");
            }
        }

        Self {
            name,
            default,
            suite: suite.clone(),
        }
    }

    /// Current value, or the default if nothing readable is stored.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        read(&self.suite, &self.name).unwrap_or_else(|| self.default.clone())
    }

    pub fn set(&self, value: &T) {
        write(&self.suite, &self.name, value);
    }

    /// Drop the persisted value so reads return the default again.
    pub fn reset(&self) {
        self.suite.remove_raw(&self.name);
    }

    /// Whether the suite holds a persisted entry (not just the default) for this key.
    pub fn is_persisted(&self) -> bool {
        self.suite.contains(&self.name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    pub fn variant(&self) -> KeyVariant {
        match T::KIND {
            ValueKind::Secure => KeyVariant::RequiredSecure,
            ValueKind::Native(_) | ValueKind::Structured => KeyVariant::Required,
        }
    }
}

/// A setting without a default. Reads yield `None` until a value is written.
pub struct OptionalKey<T: SettingValue> {
    name: String,
    suite: Suite,
    _marker: PhantomData<fn() -> T>,
}

impl<T: SettingValue> OptionalKey<T> {
    /// Key in the process-wide [`Suite::standard`].
    pub fn new(name: impl Into<String>) -> Self {
        Self::in_suite(name, &Suite::standard())
    }

    pub fn in_suite(name: impl Into<String>, suite: &Suite) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "setting names must not be empty");
        Self {
            name,
            suite: suite.clone(),
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> Option<T> {
        read(&self.suite, &self.name)
    }

    /// Store `value`, or remove the entry entirely for `None`.
    pub fn set(&self, value: Option<&T>) {
        match value {
            Some(value) => write(&self.suite, &self.name, value),
            None => self.remove(),
        }
    }

    pub fn remove(&self) {
        self.suite.remove_raw(&self.name);
    }

    pub fn is_persisted(&self) -> bool {
        self.suite.contains(&self.name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    pub fn variant(&self) -> KeyVariant {
        match T::KIND {
            ValueKind::Secure => KeyVariant::OptionalSecure,
            ValueKind::Native(_) | ValueKind::Structured => KeyVariant::Optional,
        }
    }
}

impl<T: SettingValue> Clone for OptionalKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            suite: self.suite.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: SettingValue> fmt::Debug for OptionalKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionalKey")
            .field("name", &self.name)
            .field("suite", &self.suite)
            .finish()
    }
}

fn read<T: SettingValue>(suite: &Suite, name: &str) -> Option<T> {
    let raw = suite.read_raw(name)?;
    match T::decode(raw, suite.archiver()) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(suite = suite.name(), key = %name, "stored value unreadable, using fallback: {err}");
            None
        }
    }
}

fn write<T: SettingValue>(suite: &Suite, name: &str, value: &T) {
    match value.encode(suite.archiver()) {
        Ok(raw) => suite.write_raw(name, raw),
        Err(err) => warn!(suite = suite.name(), key = %name, "value not written: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use prefkit_core::{
        store::{DefaultsStore, InMemoryDefaultsStore},
        value::RawValue,
    };
    use prefkit_storage::{
        archiver::SecureArchiver, file_store::FileDefaultsStore, key_provider::InMemoryKeyProvider,
    };
    use serde::{Deserialize, Serialize, Serializer};

    use super::*;
    use crate::{register_secure_setting, register_structured_setting};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct SyncUrl(String);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        display_name: String,
        tags: Vec<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ApiToken {
        value: String,
        expires_at: DateTime<Utc>,
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Unencodable(u8);

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refuses to serialize"))
        }
    }

    register_structured_setting!(SyncUrl, Profile, Unencodable);
    register_secure_setting!(ApiToken, "api_token");

    fn memory_suite() -> (InMemoryDefaultsStore, Suite) {
        let store = InMemoryDefaultsStore::new();
        let suite = Suite::new("test", store.clone());
        (store, suite)
    }

    fn sealed_suite(store: &InMemoryDefaultsStore) -> Suite {
        Suite::new("test", store.clone())
            .with_archiver(SecureArchiver::from_provider(&InMemoryKeyProvider::default()))
    }

    fn token() -> ApiToken {
        ApiToken {
            value: "tok_123".into(),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn retry_count_scenario() {
        let (_, suite) = memory_suite();
        let retries = Key::in_suite("retryCount", 3_i64, &suite);

        assert_eq!(retries.get(), 3);
        retries.set(&5);
        assert_eq!(retries.get(), 5);
        suite.clear();
        assert_eq!(retries.get(), 3);
    }

    #[test]
    fn last_sync_url_scenario() {
        let (store, suite) = memory_suite();
        let last_sync = OptionalKey::<SyncUrl>::in_suite("lastSyncURL", &suite);
        let url = SyncUrl("https://sync.example.com/v1".into());

        assert_eq!(last_sync.get(), None);
        last_sync.set(Some(&url));
        assert_eq!(last_sync.get(), Some(url));
        last_sync.set(None);
        assert_eq!(last_sync.get(), None);
        assert!(!store.all_keys().expect("keys").contains("lastSyncURL"));
    }

    #[test]
    fn native_values_round_trip() {
        let (store, suite) = memory_suite();
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

        let flag = Key::in_suite("flag", false, &suite);
        flag.set(&true);
        assert!(flag.get());

        let greeting = Key::in_suite("greeting", String::from("hi"), &suite);
        greeting.set(&"hello".to_string());
        assert_eq!(greeting.get(), "hello");

        let ratio = Key::in_suite("ratio", 0.5_f64, &suite);
        ratio.set(&0.75);
        assert_eq!(ratio.get(), 0.75);

        let scale = Key::in_suite("scale", 1.0_f32, &suite);
        scale.set(&2.5);
        assert_eq!(scale.get(), 2.5);

        let small = Key::in_suite("small", 1_i32, &suite);
        small.set(&-12);
        assert_eq!(small.get(), -12);

        let seen = Key::in_suite("seen", DateTime::<Utc>::UNIX_EPOCH, &suite);
        seen.set(&ts);
        assert_eq!(seen.get(), ts);

        let blob = Key::in_suite("blob", Vec::<u8>::new(), &suite);
        blob.set(&vec![9, 8, 7]);
        assert_eq!(blob.get(), vec![9, 8, 7]);

        // Native values are stored untouched.
        assert_eq!(store.get("flag").expect("get"), Some(RawValue::Bool(true)));
        assert_eq!(store.get("small").expect("get"), Some(RawValue::Integer(-12)));
    }

    #[test]
    fn structured_values_round_trip_as_json_text() {
        let (store, suite) = memory_suite();
        let profile = Key::in_suite(
            "profile",
            Profile {
                display_name: "anonymous".into(),
                tags: Vec::new(),
            },
            &suite,
        );
        let updated = Profile {
            display_name: "Ada".into(),
            tags: vec!["admin".into()],
        };

        profile.set(&updated);
        assert_eq!(profile.get(), updated);
        assert_eq!(
            store.get("profile").expect("get"),
            Some(RawValue::String(
                r#"{"display_name":"Ada","tags":["admin"]}"#.into()
            ))
        );
    }

    #[test]
    fn required_defaults_are_registered_in_encoded_form() {
        let (store, suite) = memory_suite();
        let _url = Key::in_suite("homepage", SyncUrl("https://example.com".into()), &suite);
        let _retries = Key::in_suite("retryCount", 3_i64, &suite);

        assert_eq!(
            store.get("homepage").expect("get"),
            Some(RawValue::String(r#""https://example.com""#.into()))
        );
        assert_eq!(store.get("retryCount").expect("get"), Some(RawValue::Integer(3)));
        assert!(store.all_keys().expect("keys").is_empty());
    }

    #[test]
    fn other_consumers_observe_registered_default() {
        let (store, suite) = memory_suite();
        let _writer = Key::in_suite("pageSize", 50_i64, &suite);

        let other_suite = Suite::new("test", store);
        let reader = OptionalKey::<i64>::in_suite("pageSize", &other_suite);
        assert_eq!(reader.get(), Some(50));
    }

    #[test]
    fn optional_keys_register_nothing() {
        let (store, suite) = memory_suite();
        let key = OptionalKey::<Profile>::in_suite("profile", &suite);

        assert_eq!(key.get(), None);
        assert_eq!(store.get("profile").expect("get"), None);
    }

    #[test]
    fn secure_values_round_trip_sealed() {
        let store = InMemoryDefaultsStore::new();
        let suite = sealed_suite(&store);
        let key = OptionalKey::<ApiToken>::in_suite("apiToken", &suite);

        key.set(Some(&token()));
        assert_eq!(key.get(), Some(token()));

        let Some(RawValue::Bytes(archive)) = store.get("apiToken").expect("get") else {
            panic!("secure values are stored as bytes");
        };
        assert!(!String::from_utf8_lossy(&archive).contains("tok_123"));
    }

    #[test]
    fn required_secure_key_falls_back_to_default() {
        let store = InMemoryDefaultsStore::new();
        let suite = sealed_suite(&store);
        let key = Key::in_suite("apiToken", token(), &suite);
        assert_eq!(key.variant(), KeyVariant::RequiredSecure);
        assert_eq!(key.get(), token());

        let rotated = ApiToken {
            value: "tok_456".into(),
            ..token()
        };
        key.set(&rotated);
        assert_eq!(key.get(), rotated);

        key.reset();
        assert!(!key.is_persisted());
        assert_eq!(key.get(), token());
    }

    #[test]
    fn unsealed_archive_is_rejected_by_sealing_suite() {
        let store = InMemoryDefaultsStore::new();
        let plain_suite = Suite::new("test", store.clone());
        OptionalKey::<ApiToken>::in_suite("apiToken", &plain_suite).set(Some(&token()));

        let sealed = OptionalKey::<ApiToken>::in_suite("apiToken", &sealed_suite(&store));
        assert_eq!(sealed.get(), None);
    }

    #[test]
    fn undecodable_values_fall_back() {
        let (store, suite) = memory_suite();
        let retries = Key::in_suite("retryCount", 3_i64, &suite);
        store
            .set("retryCount", RawValue::String("five".into()))
            .expect("set");
        assert_eq!(retries.get(), 3);

        let profile = OptionalKey::<Profile>::in_suite("profile", &suite);
        store
            .set("profile", RawValue::String("{ truncated".into()))
            .expect("set");
        assert_eq!(profile.get(), None);

        let small = Key::in_suite("small", 1_i32, &suite);
        store.set("small", RawValue::Integer(i64::MAX)).expect("set");
        assert_eq!(small.get(), 1);
    }

    #[test]
    fn encode_failures_leave_store_untouched() {
        let (store, suite) = memory_suite();
        let key = Key::in_suite("broken", Unencodable(1), &suite);

        assert_eq!(store.get("broken").expect("get"), None);
        assert_eq!(key.get(), Unencodable(1));

        store.set("broken", RawValue::String("7".into())).expect("set");
        key.set(&Unencodable(2));
        assert_eq!(
            store.get("broken").expect("get"),
            Some(RawValue::String("7".into()))
        );
    }

    #[test]
    fn variants_follow_value_kind_and_optionality() {
        let (_, suite) = memory_suite();
        assert_eq!(
            Key::in_suite("a", 1_i64, &suite).variant(),
            KeyVariant::Required
        );
        assert_eq!(
            OptionalKey::<Profile>::in_suite("b", &suite).variant(),
            KeyVariant::Optional
        );
        assert_eq!(
            OptionalKey::<ApiToken>::in_suite("c", &suite).variant(),
            KeyVariant::OptionalSecure
        );
    }

    #[test]
    fn integer_widths_round_trip() {
        let (store, suite) = memory_suite();

        let port = Key::in_suite("port", 8080_u16, &suite);
        assert_eq!(port.get(), 8080);
        port.set(&443);
        assert_eq!(port.get(), 443);

        let quota = Key::in_suite("quota", 0_u32, &suite);
        quota.set(&4_000_000_000);
        assert_eq!(quota.get(), 4_000_000_000);
        assert_eq!(
            store.get("quota").expect("get"),
            Some(RawValue::Integer(4_000_000_000))
        );

        let level = Key::in_suite("level", 0_i8, &suite);
        store.set("level", RawValue::Integer(300)).expect("set");
        assert_eq!(level.get(), 0);

        let offset = Key::in_suite("offset", 1_u64, &suite);
        offset.set(&7);
        offset.set(&u64::MAX);
        assert_eq!(offset.get(), 7);
    }

    #[test]
    fn foreign_types_round_trip_through_wrappers() {
        use std::collections::HashMap;

        use crate::value::{ArchiveTag, Archived, Json};

        struct RecoveryCodes;
        impl ArchiveTag for RecoveryCodes {
            const ARCHIVE_TYPE: &'static str = "recovery_codes";
        }

        let store = InMemoryDefaultsStore::new();
        let suite = sealed_suite(&store);

        let ports = Key::in_suite("ports", Json(Vec::<i64>::new()), &suite);
        ports.set(&Json(vec![8080, 8443]));
        assert_eq!(ports.get(), Json(vec![8080, 8443]));
        assert_eq!(
            store.get("ports").expect("get"),
            Some(RawValue::String("[8080,8443]".into()))
        );

        let limits = OptionalKey::<Json<HashMap<String, u16>>>::in_suite("limits", &suite);
        let value = Json(HashMap::from([("burst".to_string(), 20_u16)]));
        limits.set(Some(&value));
        assert_eq!(limits.get(), Some(value));

        let missing = OptionalKey::<Json<Option<String>>>::in_suite("nickname", &suite);
        missing.set(Some(&Json(None)));
        assert_eq!(missing.get(), Some(Json(None)));

        let codes = OptionalKey::<Archived<Vec<String>, RecoveryCodes>>::in_suite("codes", &suite);
        assert_eq!(codes.variant(), KeyVariant::OptionalSecure);
        codes.set(Some(&Archived::new(vec!["a1b2".into(), "c3d4".into()])));
        assert_eq!(
            codes.get().map(Archived::into_inner),
            Some(vec!["a1b2".to_string(), "c3d4".to_string()])
        );
    }

    #[test]
    fn rejected_writes_keep_previous_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileDefaultsStore::open(dir.path(), "app").expect("open");
        let suite = Suite::new("app", store);
        let ratio = Key::in_suite("ratio", 0.5_f64, &suite);

        ratio.set(&0.75);
        ratio.set(&f64::NAN);
        assert_eq!(ratio.get(), 0.75);

        let reopened = FileDefaultsStore::open(dir.path(), "app").expect("reopen");
        assert_eq!(
            reopened.get("ratio").expect("get"),
            Some(RawValue::Double(0.75))
        );
    }

    #[test]
    fn keys_without_suite_use_standard() {
        let key = Key::new("key.tests.standard", 42_i64);
        assert_eq!(key.suite().name(), crate::suite::STANDARD_SUITE);
        assert_eq!(
            Suite::standard()
                .store()
                .get("key.tests.standard")
                .expect("get"),
            Some(RawValue::Integer(42))
        );

        let optional = OptionalKey::<String>::new("key.tests.standard.optional");
        optional.set(Some(&"x".to_string()));
        assert!(optional.is_persisted());
        optional.remove();
        assert!(!optional.is_persisted());
    }
}
