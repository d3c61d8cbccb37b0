//! Python splitter: zero-indent `def` / `class` lines open new fragments.

use regex::Regex;
use std::sync::LazyLock;

use super::{Accumulator, FileMeta, IMPORT_SCAN_LINES};
use crate::models::Fragment;

static DEF_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bdef\s+(\w+)|\bclass\s+(\w+)").expect("valid def/class regex")
});

fn is_import(line: &str) -> bool {
    line.starts_with("import ") || line.starts_with("from ")
}

fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

fn is_declaration(line: &str) -> bool {
    line.starts_with("def ") || line.starts_with("class ") || line.starts_with("async def ")
}

fn declaration_name(line: &str) -> String {
    DEF_NAME
        .captures(line)
        .and_then(|caps| caps.iter().skip(1).flatten().next())
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "Anonymous".to_string())
}

pub fn chunk_python(content: &str, meta: &FileMeta, max_tokens: usize) -> Vec<Fragment> {
    let mut acc = Accumulator::new(meta);

    for (i, line) in content.split('\n').enumerate() {
        if i < IMPORT_SCAN_LINES && is_import(line) {
            acc.hoist_import(line);
            continue;
        }

        let top_level = !is_indented(line);

        if top_level && is_declaration(line) {
            acc.start(line, declaration_name(line));
        } else {
            acc.push_line(line);
        }

        if top_level && acc.over_budget(max_tokens) {
            acc.flush();
        }
    }

    acc.finish()
}
