//! JavaScript / TypeScript splitter.

use regex::Regex;
use std::sync::LazyLock;

use super::{Accumulator, FileMeta, IMPORT_SCAN_LINES};
use crate::models::Fragment;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:function\b|class\b|const\s+\w+\s*=)").expect("valid declaration regex")
});

static DECLARATION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfunction\s+(\w+)|\bclass\s+(\w+)|\bconst\s+(\w+)")
        .expect("valid declaration name regex")
});

fn is_import(line: &str) -> bool {
    line.contains("import ") || line.contains("require(")
}

fn brace_delta(line: &str) -> i64 {
    line.chars().fold(0, |depth, c| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

fn declaration_name(line: &str) -> String {
    DECLARATION_NAME
        .captures(line)
        .and_then(|caps| caps.iter().skip(1).flatten().next())
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "Anonymous".to_string())
}

/// Split on top-level `function` / `class` / `const x =` lines.
///
/// A declaration only opens a new fragment when brace nesting is zero before
/// the line; the size flush only happens when nesting is back to zero after it.
pub fn chunk_script(content: &str, meta: &FileMeta, max_tokens: usize) -> Vec<Fragment> {
    let mut acc = Accumulator::new(meta);
    let mut depth: i64 = 0;

    for (i, line) in content.split('\n').enumerate() {
        if i < IMPORT_SCAN_LINES && is_import(line) {
            acc.hoist_import(line);
            continue;
        }

        let top_level = depth <= 0;
        depth += brace_delta(line);

        if top_level && DECLARATION.is_match(line) {
            acc.start(line, declaration_name(line));
        } else {
            acc.push_line(line);
        }

        if depth <= 0 && acc.over_budget(max_tokens) {
            acc.flush();
        }
    }

    acc.finish()
}
