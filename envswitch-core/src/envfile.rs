/*!
Reader and writer for `env-vars.env` snapshot files.

Files are read with `dotenvy`, so hand-edited snapshots follow the usual
dotenv rules (comments, `export` prefixes, quoting, `$VAR` substitution).
The writer emits one `KEY=VALUE` pair per line and double-quotes any value
that is empty or holds whitespace, quotes, backslashes, `#` or `$`. Inside
quotes `\\`, `\"`, `\$` and newlines (`\n`) are escaped; other characters
are written as-is because dotenvy has no escape for them.
*/

use crate::{EnvSwitchError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Render variables as env-file text, sorted by name
pub fn format_env_file(vars: &BTreeMap<String, String>) -> String {
    let mut out = String::from("# Captured by envswitch\n");
    for (key, value) in vars {
        out.push_str(key);
        out.push('=');
        out.push_str(&quote_value(value));
        out.push('\n');
    }
    out
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '#' | '$'))
}

fn quote_value(value: &str) -> String {
    if !needs_quotes(value) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '$' => quoted.push_str("\\$"),
            '\n' => quoted.push_str("\\n"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

/// Parse env-file text; `path` is only used in error messages
pub fn parse_env_file(text: &str, path: &Path) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    for item in dotenvy::from_read_iter(text.as_bytes()) {
        let (key, value) = item.map_err(|e| env_file_error(text, path, e))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn env_file_error(text: &str, path: &Path, err: dotenvy::Error) -> EnvSwitchError {
    let line = match &err {
        dotenvy::Error::LineParse(bad, _) => source_line(text, bad),
        _ => 0,
    };
    EnvSwitchError::EnvFile {
        path: path.to_path_buf(),
        line,
        reason: err.to_string(),
    }
}

/// 1-based line of `text` where the offending input starts, 0 if unknown
fn source_line(text: &str, bad: &str) -> usize {
    let first = bad.lines().next().unwrap_or(bad).trim();
    if first.is_empty() {
        return 0;
    }
    let lines: Vec<&str> = text.lines().collect();
    lines
        .iter()
        .position(|l| l.trim() == first)
        .or_else(|| lines.iter().position(|l| l.contains(first)))
        .map_or(0, |i| i + 1)
}

/// Read an env file; a missing file yields `None`
pub fn read_env_file(path: &Path) -> Result<Option<BTreeMap<String, String>>> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_env_file(&text, path).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write an env file atomically
pub fn write_env_file(path: &Path, vars: &BTreeMap<String, String>) -> Result<()> {
    crate::fsutil::write_atomic(path, format_env_file(vars).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_plain_values_stay_unquoted() {
        let text = format_env_file(&vars(&[("AWS_PROFILE", "prod"), ("KUBECONFIG", "/k/c")]));
        assert!(text.contains("AWS_PROFILE=prod\n"));
        assert!(text.contains("KUBECONFIG=/k/c\n"));
    }

    #[test]
    fn test_special_values_are_quoted_and_escaped() {
        let text = format_env_file(&vars(&[
            ("GREETING", "hello world"),
            ("QUOTE", "say \"hi\""),
            ("MULTI", "a\nb"),
            ("PRICE", "$5"),
            ("EMPTY", ""),
        ]));
        assert!(text.contains("GREETING=\"hello world\"\n"));
        assert!(text.contains("QUOTE=\"say \\\"hi\\\"\"\n"));
        assert!(text.contains("MULTI=\"a\\nb\"\n"));
        assert!(text.contains("PRICE=\"\\$5\"\n"));
        assert!(text.contains("EMPTY=\"\"\n"));
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let text = "# header\n\n  # indented comment\nA=1\nB=\"two words\"\nexport C='single quoted'\n";
        let parsed = parse_env_file(text, Path::new("x.env")).unwrap();
        assert_eq!(
            parsed,
            vars(&[("A", "1"), ("B", "two words"), ("C", "single quoted")])
        );
    }

    #[test]
    fn test_written_file_reads_back_identically() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("env-vars.env");
        let original = vars(&[
            ("PATHY", "C:\\tools\\bin"),
            ("TABS", "a\tb"),
            ("CRLF", "line\r\nnext"),
            ("HASH", "#notacomment"),
            ("DOLLAR", "$HOME/bin"),
            ("BRACED", "${PATH}"),
            ("QUOTES", "it's \"quoted\""),
            ("EMPTY", ""),
            ("PLAIN", "v=1"),
        ]);

        write_env_file(&path, &original).unwrap();
        assert_eq!(read_env_file(&path).unwrap(), Some(original));
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(read_env_file(&temp_dir.path().join("nope.env")).unwrap(), None);
    }

    #[test]
    fn test_malformed_lines_report_line_number() {
        let path = PathBuf::from("bad.env");
        let err = parse_env_file("A=1\nnot a pair\n", &path).unwrap_err();
        match err {
            EnvSwitchError::EnvFile { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        assert!(parse_env_file("A=\"open\n", &path).is_err());
        assert!(parse_env_file("=value\n", &path).is_err());
    }
}
