//! URL-safe identifiers derived from filesystem names
//!
//! A subdirectory with its own configuration document gets a hierarchical
//! slug of `parent-local`, combined at most one level deep; parents already
//! carry their own combined slug.

/// Generate a URL-safe slug from a filesystem name.
/// Lowercases, keeps alphanumerics, collapses everything else to single
/// hyphens and trims them from the ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true;
    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Combine a parent slug with a child's local slug
pub fn child_slug(parent: &str, local: &str) -> String {
    if parent.is_empty() {
        return local.to_string();
    }
    format!("{}-{}", parent, local)
}

/// Synthesize a human-readable title from a folder name
pub fn title_from_folder(name: &str) -> String {
    let mut title = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        if c == '-' || c == '_' {
            if !title.ends_with(' ') && !title.is_empty() {
                title.push(' ');
            }
            at_word_start = true;
        } else if at_word_start {
            title.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            title.push(c);
        }
    }
    title.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Japan"), "japan");
        assert_eq!(slugify("Summer 2024"), "summer-2024");
        assert_eq!(slugify("Tokyo_Night Shots"), "tokyo-night-shots");
    }

    #[test]
    fn test_slugify_collapses_and_trims() {
        assert_eq!(slugify("  -- Hello,   World! --  "), "hello-world");
        assert_eq!(slugify("a///b"), "a-b");
        assert_eq!(slugify("...."), "");
    }

    #[test]
    fn test_child_slug() {
        assert_eq!(child_slug("parent", "sub"), "parent-sub");
        assert_eq!(child_slug("", "sub"), "sub");
        // Parents carry their own combined slug; no deeper chains are built
        assert_eq!(child_slug("gallery-event", "day1"), "gallery-event-day1");
    }

    #[test]
    fn test_title_from_folder() {
        assert_eq!(title_from_folder("summer-trip"), "Summer Trip");
        assert_eq!(title_from_folder("tokyo_nights"), "Tokyo Nights");
        assert_eq!(title_from_folder("Japan"), "Japan");
        assert_eq!(title_from_folder("already Titled"), "Already Titled");
    }

    proptest! {
        #[test]
        fn prop_slugify_is_url_safe(name in "\\PC{0,64}") {
            let slug = slugify(&name);
            prop_assert!(slug.chars().all(|c| c.is_alphanumeric() || c == '-'));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }
    }
}
