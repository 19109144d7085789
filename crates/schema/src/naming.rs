//! Naming helpers for relations and polymorphic argument keys

use heck::ToUpperCamelCase;

// ============================================================================
// Relation Names
// ============================================================================

/// Name of a self-relation: `<field>On<Type>`
pub fn self_relation_name(field: &str, type_name: &str) -> String {
    format!("{}On{}", field, type_name)
}

/// Name of an implicit relation between two types: sorted names joined by `_`
pub fn implicit_relation_name(a: &str, b: &str) -> String {
    let mut names = [a, b];
    names.sort();
    names.join("_")
}

/// Storage bucket name for a set of types sharing an abstract parent
pub fn shared_storage_name<'a>(types: impl IntoIterator<Item = &'a str>) -> String {
    let mut names: Vec<&str> = types.into_iter().collect();
    names.sort();
    names.dedup();
    names.join("_")
}

// ============================================================================
// Polymorphic Keys
// ============================================================================

/// Concrete type named by a polymorphic argument key
///
/// The key is singularized and capitalized: `"blogPosts"` → `"BlogPost"`.
pub fn concrete_type_name(key: &str) -> String {
    capitalize(&singularize(key))
}

/// Uppercase the first character and keep the rest in camel case
pub fn capitalize(s: &str) -> String {
    s.to_upper_camel_case()
}

/// Convert a plural English word into its singular form
pub fn singularize(s: &str) -> String {
    if !s.is_ascii() {
        return s.to_string();
    }
    let lower = s.to_ascii_lowercase();

    // Irregular plurals
    for (plural, singular) in [
        ("people", "person"),
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("geese", "goose"),
        ("mice", "mouse"),
    ] {
        if lower.ends_with(plural) {
            let stem = &s[..s.len() - plural.len()];
            let tail = &s[s.len() - plural.len()..];
            return format!("{}{}", stem, match_case(tail, singular));
        }
    }

    if lower.ends_with("ies") && s.len() > 3 {
        return format!("{}y", &s[..s.len() - 3]);
    }
    if ["sses", "shes", "ches", "xes", "zes"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        return s[..s.len() - 2].to_string();
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us") && s.len() > 1 {
        return s[..s.len() - 1].to_string();
    }
    s.to_string()
}

fn match_case(original: &str, replacement: &str) -> String {
    match original.chars().next() {
        Some(c) if c.is_uppercase() => replacement.to_upper_camel_case(),
        _ => replacement.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_names() {
        assert_eq!(self_relation_name("friends", "User"), "friendsOnUser");
        assert_eq!(implicit_relation_name("User", "Post"), "Post_User");
        assert_eq!(implicit_relation_name("Post", "User"), "Post_User");
        assert_eq!(shared_storage_name(["Dog", "Cat", "Dog"]), "Cat_Dog");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("dogs"), "dog");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("salesPeople"), "salesPerson");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("dog"), "dog");
    }

    #[test]
    fn test_concrete_type_name() {
        assert_eq!(concrete_type_name("dogs"), "Dog");
        assert_eq!(concrete_type_name("blogPosts"), "BlogPost");
        assert_eq!(concrete_type_name("cat"), "Cat");
    }
}
