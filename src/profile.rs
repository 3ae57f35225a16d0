use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::bookmark::{self, Bookmark};
use crate::storage::Storage;

/// Default profile photo shown while signed out.
pub const DEFAULT_ICON: &str =
    "https://lh3.googleusercontent.com/-XdUIqdMkCWA/AAAAAAAAAAI/AAAAAAAAAAA/4252rscbv5M/photo.jpg";
pub const DEFAULT_NAME: &str = "Signed out";

const KEY_NAME: &str = "profileName";
const KEY_ICON: &str = "profileIcon";
const KEY_BOOKMARKS: &str = "profileBookmarks";
const KEY_CANVAS_URL: &str = "profileCanvasURL";
const KEY_PREFERRED_ACCOUNT: &str = "profilePreferredGoogleUser";
const KEY_COLOR_SCHEME: &str = "profilePreferredColorScheme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorScheme {
    #[default]
    Auto,
    Light,
    Dark,
}

impl ColorScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

/// Which profile field changed, passed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    Icon,
    Bookmarks,
    CanvasUrl,
    PreferredAccount,
    ColorScheme,
}

#[derive(Debug, Clone)]
struct Fields {
    name: String,
    icon: String,
    bookmarks: Vec<Bookmark>,
    canvas_url: String,
    preferred_account: String,
    color_scheme: ColorScheme,
}

type ProfileSubscriber = Box<dyn Fn(ProfileField) + Send + Sync>;

/// User profile and bookmark state, persisted through a [`Storage`] handle.
///
/// Each field initializes from storage (or its default) at construction and
/// re-persists on every set for the lifetime of the process. Constructed
/// explicitly once at startup and never torn down.
pub struct Profile {
    storage: Arc<dyn Storage>,
    fields: Mutex<Fields>,
    subscribers: Mutex<Vec<ProfileSubscriber>>,
}

impl Profile {
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let bookmarks = storage
            .get(KEY_BOOKMARKS)
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default();
        let fields = Fields {
            name: storage.get(KEY_NAME).unwrap_or_else(|| DEFAULT_NAME.to_string()),
            icon: storage.get(KEY_ICON).unwrap_or_else(|| DEFAULT_ICON.to_string()),
            bookmarks,
            canvas_url: storage.get(KEY_CANVAS_URL).unwrap_or_default(),
            preferred_account: storage
                .get(KEY_PREFERRED_ACCOUNT)
                .unwrap_or_else(|| "0".to_string()),
            color_scheme: storage
                .get(KEY_COLOR_SCHEME)
                .and_then(|s| ColorScheme::from_key(&s))
                .unwrap_or_default(),
        };
        Self {
            storage,
            fields: Mutex::new(fields),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> String {
        self.fields.lock().unwrap().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.fields.lock().unwrap().name = name.clone();
        self.storage.set(KEY_NAME, &name);
        self.notify(ProfileField::Name);
    }

    pub fn icon(&self) -> String {
        self.fields.lock().unwrap().icon.clone()
    }

    pub fn set_icon(&self, icon: impl Into<String>) {
        let icon = icon.into();
        self.fields.lock().unwrap().icon = icon.clone();
        self.storage.set(KEY_ICON, &icon);
        self.notify(ProfileField::Icon);
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.fields.lock().unwrap().bookmarks.clone()
    }

    pub fn set_bookmarks(&self, bookmarks: Vec<Bookmark>) {
        let json = serde_json::to_string(&bookmarks);
        self.fields.lock().unwrap().bookmarks = bookmarks;
        match json {
            Ok(json) => self.storage.set(KEY_BOOKMARKS, &json),
            Err(e) => log::error!("Failed to serialize bookmarks: {}", e),
        }
        self.notify(ProfileField::Bookmarks);
    }

    pub fn canvas_url(&self) -> String {
        self.fields.lock().unwrap().canvas_url.clone()
    }

    pub fn set_canvas_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.fields.lock().unwrap().canvas_url = url.clone();
        self.storage.set(KEY_CANVAS_URL, &url);
        self.notify(ProfileField::CanvasUrl);
    }

    pub fn preferred_account(&self) -> String {
        self.fields.lock().unwrap().preferred_account.clone()
    }

    pub fn set_preferred_account(&self, account: impl Into<String>) {
        let account = account.into();
        self.fields.lock().unwrap().preferred_account = account.clone();
        self.storage.set(KEY_PREFERRED_ACCOUNT, &account);
        self.notify(ProfileField::PreferredAccount);
    }

    pub fn color_scheme(&self) -> ColorScheme {
        self.fields.lock().unwrap().color_scheme
    }

    pub fn set_color_scheme(&self, scheme: ColorScheme) {
        self.fields.lock().unwrap().color_scheme = scheme;
        self.storage.set(KEY_COLOR_SCHEME, scheme.as_str());
        self.notify(ProfileField::ColorScheme);
    }

    /// Reset name and icon to defaults when the Classroom session ends.
    /// Other fields are untouched.
    pub fn sign_out_reset(&self) {
        self.set_name(DEFAULT_NAME);
        self.set_icon(DEFAULT_ICON);
    }

    /// Alias -> bookmark position, recomputed from the current bookmark list.
    pub fn alias_index(&self) -> HashMap<String, usize> {
        bookmark::alias_index(&self.fields.lock().unwrap().bookmarks)
    }

    /// Deduplicated link names across all bookmarks.
    pub fn link_names(&self) -> Vec<String> {
        bookmark::link_names(&self.fields.lock().unwrap().bookmarks)
    }

    pub fn subscribe(&self, callback: impl Fn(ProfileField) + Send + Sync + 'static) {
        self.subscribers.lock().unwrap().push(Box::new(callback));
    }

    fn notify(&self, field: ProfileField) {
        for callback in self.subscribers.lock().unwrap().iter() {
            callback(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bookmark::Link;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn profile_with_storage() -> (Profile, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (Profile::load(storage.clone()), storage)
    }

    #[test]
    fn fields_initialize_from_defaults() {
        let (profile, _) = profile_with_storage();
        assert_eq!(profile.name(), DEFAULT_NAME);
        assert_eq!(profile.icon(), DEFAULT_ICON);
        assert_eq!(profile.preferred_account(), "0");
        assert_eq!(profile.color_scheme(), ColorScheme::Auto);
        assert_eq!(profile.canvas_url(), "");
        assert!(profile.bookmarks().is_empty());
    }

    #[test]
    fn fields_initialize_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("profileName", "Ada");
        storage.set("profilePreferredColorScheme", "dark");
        storage.set(
            "profileBookmarks",
            r#"[{"links":[{"name":"agenda","url":"https://example.com"}],"aliases":["math"]}]"#,
        );
        let profile = Profile::load(storage);
        assert_eq!(profile.name(), "Ada");
        assert_eq!(profile.color_scheme(), ColorScheme::Dark);
        assert_eq!(profile.bookmarks().len(), 1);
    }

    #[test]
    fn every_set_persists_immediately() {
        let (profile, storage) = profile_with_storage();
        profile.set_name("Ada");
        profile.set_canvas_url("https://canvas.example.com/feed.ics");
        profile.set_color_scheme(ColorScheme::Light);
        assert_eq!(storage.get("profileName"), Some("Ada".to_string()));
        assert_eq!(
            storage.get("profileCanvasURL"),
            Some("https://canvas.example.com/feed.ics".to_string())
        );
        assert_eq!(storage.get("profilePreferredColorScheme"), Some("light".to_string()));
    }

    #[test]
    fn bookmarks_persist_as_json() {
        let (profile, storage) = profile_with_storage();
        profile.set_bookmarks(vec![Bookmark {
            links: vec![Link {
                name: "agenda".to_string(),
                url: "https://example.com".to_string(),
            }],
            aliases: vec!["math".to_string()],
        }]);
        let json = storage.get("profileBookmarks").unwrap();
        let parsed: Vec<Bookmark> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, profile.bookmarks());
    }

    #[test]
    fn bookmarks_reach_memory_before_storage() {
        struct PanickingStorage;
        impl crate::storage::Storage for PanickingStorage {
            fn get(&self, _key: &str) -> Option<String> {
                None
            }
            fn set(&self, _key: &str, _value: &str) {
                panic!("storage offline");
            }
        }

        let profile = Profile::load(Arc::new(PanickingStorage));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            profile.set_bookmarks(vec![Bookmark {
                links: vec![],
                aliases: vec!["math".to_string()],
            }]);
        }));
        assert!(result.is_err());
        // The in-memory field updated before the storage write blew up.
        assert_eq!(profile.bookmarks().len(), 1);
    }

    #[test]
    fn sign_out_resets_only_name_and_icon() {
        let (profile, _) = profile_with_storage();
        profile.set_name("Ada");
        profile.set_icon("https://example.com/ada.jpg");
        profile.set_canvas_url("https://canvas.example.com/feed.ics");
        profile.sign_out_reset();
        assert_eq!(profile.name(), DEFAULT_NAME);
        assert_eq!(profile.icon(), DEFAULT_ICON);
        assert_eq!(profile.canvas_url(), "https://canvas.example.com/feed.ics");
    }

    #[test]
    fn derived_views_follow_bookmark_changes() {
        let (profile, _) = profile_with_storage();
        let changes = Arc::new(AtomicUsize::new(0));
        let changes_clone = changes.clone();
        profile.subscribe(move |field| {
            if field == ProfileField::Bookmarks {
                changes_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        profile.set_bookmarks(vec![
            Bookmark {
                links: vec![],
                aliases: vec!["a".to_string(), "b".to_string()],
            },
            Bookmark {
                links: vec![],
                aliases: vec!["c".to_string()],
            },
        ]);

        let index = profile.alias_index();
        assert_eq!(index.get("a"), Some(&0));
        assert_eq!(index.get("b"), Some(&0));
        assert_eq!(index.get("c"), Some(&1));
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn color_scheme_string_roundtrip() {
        for scheme in [ColorScheme::Auto, ColorScheme::Light, ColorScheme::Dark] {
            assert_eq!(ColorScheme::from_key(scheme.as_str()), Some(scheme));
        }
        assert_eq!(ColorScheme::from_key("sepia"), None);
    }
}
