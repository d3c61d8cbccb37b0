//! Code chunking: declaration-aware line scanning for JavaScript/TypeScript and
//! Python, fixed-size character windows for everything else.

pub mod fallback;
pub mod python;
pub mod script;

use serde::{Deserialize, Serialize};

use crate::models::{ChunkType, Fragment, FragmentMetadata};

/// Files shorter than this (in characters) become a single `complete` fragment.
pub const SMALL_FILE_THRESHOLD: usize = 1000;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Import lines are only hoisted from the first this-many lines of a file.
pub const IMPORT_SCAN_LINES: usize = 20;

/// Default token budget per fragment.
pub const DEFAULT_MAX_TOKENS: usize = 400;

/// Coarse language tag derived from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Java,
    Go,
    C,
    Cpp,
    Rust,
    Html,
    Css,
    Text,
}

impl Language {
    /// Map a lower-case file extension to a language, `Text` when unknown.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "js" | "jsx" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "py" => Language::Python,
            "java" => Language::Java,
            "go" => Language::Go,
            "c" | "h" => Language::C,
            "cpp" | "hpp" => Language::Cpp,
            "rs" => Language::Rust,
            "html" => Language::Html,
            "css" => Language::Css,
            _ => Language::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Go => "go",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Rust => "rust",
            Language::Html => "html",
            Language::Css => "css",
            Language::Text => "text",
        }
    }
}

/// Text after the last `.` of the path, lower-cased. A path without a dot is
/// its own extension and classifies as `Text`.
pub fn extension_of(file_path: &str) -> String {
    file_path
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Crude token estimate: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Per-file provenance shared by all fragments of that file.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub path: String,
    pub language: Language,
    pub extension: String,
}

impl FileMeta {
    pub fn for_path(file_path: &str) -> Self {
        let extension = extension_of(file_path);
        Self {
            path: file_path.to_string(),
            language: Language::from_extension(&extension),
            extension,
        }
    }

    pub fn fragment(&self, content: String, chunk_type: ChunkType, name: &str) -> Fragment {
        Fragment {
            content,
            metadata: FragmentMetadata {
                path: self.path.clone(),
                language: self.language,
                extension: self.extension.clone(),
                chunk_type,
                name: name.to_string(),
            },
        }
    }

    pub fn complete(&self, content: &str) -> Fragment {
        self.fragment(content.to_string(), ChunkType::Complete, "Complete file")
    }
}

/// Split one file into fragments of roughly `max_tokens` estimated tokens.
///
/// Never returns an empty list: content that no splitter can cut is returned
/// as a single `complete` fragment.
pub fn chunk_file(content: &str, file_path: &str, max_tokens: usize) -> Vec<Fragment> {
    let meta = FileMeta::for_path(file_path);

    if content.chars().count() < SMALL_FILE_THRESHOLD {
        return vec![meta.complete(content)];
    }

    let fragments = match meta.language {
        Language::JavaScript | Language::TypeScript => {
            script::chunk_script(content, &meta, max_tokens)
        }
        Language::Python => python::chunk_python(content, &meta, max_tokens),
        _ => fallback::chunk_by_size(content, &meta, max_tokens),
    };

    if fragments.is_empty() {
        return vec![meta.complete(content)];
    }
    fragments
}

/// Running state of the line-oriented splitters.
///
/// Hoisted import lines are prepended to every emitted fragment.
pub(crate) struct Accumulator<'a> {
    meta: &'a FileMeta,
    imports: String,
    current: String,
    name: String,
    fragments: Vec<Fragment>,
}

impl<'a> Accumulator<'a> {
    pub(crate) fn new(meta: &'a FileMeta) -> Self {
        Self {
            meta,
            imports: String::new(),
            current: String::new(),
            name: String::new(),
            fragments: Vec::new(),
        }
    }

    pub(crate) fn hoist_import(&mut self, line: &str) {
        self.imports.push_str(line);
        self.imports.push('\n');
    }

    pub(crate) fn push_line(&mut self, line: &str) {
        self.current.push_str(line);
        self.current.push('\n');
    }

    /// Close the running fragment and open a new one named `name`.
    pub(crate) fn start(&mut self, line: &str, name: String) {
        self.flush();
        self.name = name;
        self.push_line(line);
    }

    pub(crate) fn over_budget(&self, max_tokens: usize) -> bool {
        estimate_tokens(&self.current) > max_tokens
    }

    /// Emit the running fragment if it holds anything but whitespace.
    pub(crate) fn flush(&mut self) {
        if !self.current.trim().is_empty() {
            let name = if self.name.is_empty() {
                "Code block"
            } else {
                self.name.as_str()
            };
            let content = format!("{}{}", self.imports, self.current);
            let fragment = self.meta.fragment(content, ChunkType::Code, name);
            self.fragments.push(fragment);
        }
        self.current.clear();
    }

    pub(crate) fn finish(mut self) -> Vec<Fragment> {
        self.flush();
        self.fragments
    }
}
