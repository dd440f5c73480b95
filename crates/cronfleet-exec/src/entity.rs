/// Entities the web console may have substituted into a stored command.
const ENTITIES: &[(&str, &str)] = &[
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    // last, so `&amp;lt;` decodes to `&lt;` and not `<`
    ("&amp;", "&"),
];

pub fn contains_html_entity(s: &str) -> bool {
    s.contains('&') && ENTITIES.iter().any(|(from, _)| s.contains(from))
}

/// Decodes the HTML entities in [`ENTITIES`] back to their characters.
pub fn clean_html_entities(s: &str) -> String {
    if !contains_html_entity(s) {
        return s.to_string();
    }
    ENTITIES
        .iter()
        .fold(s.to_string(), |acc, (from, to)| acc.replace(from, to))
}
