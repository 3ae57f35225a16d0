use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single destination inside a Bookmark. Names are unique per bookmark but
/// encouraged to repeat across bookmarks, e.g. an "agenda" for every class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub url: String,
}

/// A named group of links reachable by one or more aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Map every alias to the position of its bookmark.
///
/// Aliases are expected to be unique across bookmarks but this is not
/// enforced; on a collision the later bookmark wins.
pub fn alias_index(bookmarks: &[Bookmark]) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (position, bookmark) in bookmarks.iter().enumerate() {
        for alias in &bookmark.aliases {
            index.insert(alias.clone(), position);
        }
    }
    index
}

/// All link names across all bookmarks, first occurrence order, deduplicated.
pub fn link_names(bookmarks: &[Bookmark]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for bookmark in bookmarks {
        for link in &bookmark.links {
            if !names.contains(&link.name) {
                names.push(link.name.clone());
            }
        }
    }
    names
}
