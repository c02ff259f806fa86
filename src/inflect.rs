//! Resource naming: record type name -> lower-cased, pluralized path segment.

/// Irregular singular -> plural pairs.
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("ox", "oxen"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("knife", "knives"),
    ("wife", "wives"),
    ("half", "halves"),
    ("wolf", "wolves"),
    ("potato", "potatoes"),
    ("tomato", "tomatoes"),
    ("hero", "heroes"),
    ("echo", "echoes"),
    ("quiz", "quizzes"),
];

/// Same singular and plural.
const UNCOUNTABLE: &[&str] = &[
    "sheep", "fish", "deer", "series", "species", "news", "equipment", "information", "rice", "money",
    "data", "metadata",
];

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// English plural of a lower-case word.
/// e.g. "car" -> "cars", "bus" -> "buses", "person" -> "people", "company" -> "companies"
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }
    if let Some(stem) = word.strip_suffix("person") {
        return format!("{}people", stem);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| word.ends_with(end)) {
        return format!("{}es", word);
    }
    let mut chars = word.chars().rev();
    let last = chars.next();
    let before_last = chars.next();
    if last == Some('y') && before_last.is_some_and(|c| !is_vowel(c)) {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    format!("{}s", word)
}

/// Path segment for a record type name: lower-cased, then pluralized.
/// e.g. "TestEntity" -> "testentities"
pub fn resource_segment(type_name: &str) -> String {
    pluralize(&type_name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_sibilant_and_irregular() {
        assert_eq!(pluralize("car"), "cars");
        assert_eq!(pluralize("bus"), "buses");
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("church"), "churches");
        assert_eq!(pluralize("company"), "companies");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("salesperson"), "salespeople");
        assert_eq!(pluralize("sheep"), "sheep");
    }

    #[test]
    fn segment_lowercases_before_pluralizing() {
        assert_eq!(resource_segment("TestEntity"), "testentities");
        assert_eq!(resource_segment("Person"), "people");
        assert_eq!(resource_segment("Item"), "items");
        assert_eq!(resource_segment("Bus"), "buses");
    }
}
