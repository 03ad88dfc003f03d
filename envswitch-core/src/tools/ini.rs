//! Minimal INI reader for gcloud, aws and git config files.

use std::collections::BTreeMap;
use std::path::Path;

pub(crate) type Sections = BTreeMap<String, BTreeMap<String, String>>;

/// Parse `[section]` headers and `key = value` pairs
///
/// Keys are lowercased, values trimmed and stripped of surrounding double
/// quotes. Lines starting with `#` or `;` are comments.
pub(crate) fn parse(text: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current = String::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = header.trim().to_string();
            sections.entry(current.clone()).or_default();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_lowercase(), value.to_string());
        }
    }
    sections
}

/// Parse a file; unreadable files yield no sections
pub(crate) fn read(path: &Path) -> Sections {
    std::fs::read_to_string(path)
        .map(|text| parse(&text))
        .unwrap_or_default()
}

pub(crate) fn get<'a>(sections: &'a Sections, section: &str, key: &str) -> Option<&'a str> {
    sections
        .get(section)
        .and_then(|s| s.get(key))
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections_and_comments() {
        let text = "; top comment\n[core]\naccount = dev@corp.io\n# note\nproject=\"billing\"\n\n[compute]\nRegion = europe-west1\n";
        let sections = parse(text);

        assert_eq!(get(&sections, "core", "account"), Some("dev@corp.io"));
        assert_eq!(get(&sections, "core", "project"), Some("billing"));
        assert_eq!(get(&sections, "compute", "region"), Some("europe-west1"));
        assert_eq!(get(&sections, "compute", "zone"), None);
    }

    #[test]
    fn test_quoted_section_names_are_kept() {
        let sections = parse("[remote \"origin\"]\nurl = git@x:y.git\n");
        assert_eq!(get(&sections, "remote \"origin\"", "url"), Some("git@x:y.git"));
    }
}
