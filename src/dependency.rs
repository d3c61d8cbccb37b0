//! File-level dependency graph built from import statements.
//!
//! Edges come from relative `import`/`require` specifiers, route strings
//! passed to `router.push`/`href`, and JSX component tags. Only edges whose
//! target is one of the analysed files are kept; package imports are ignored.

use futures_util::future::join_all;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::chunking::{extension_of, Language};
use crate::explorer::resolve_relative;
use crate::source::{FileSource, RemoteFile};

/// Files downloaded and analysed per request.
pub const MAX_ANALYZED_FILES: usize = 50;

/// Above this many nodes, unconnected files are dropped unless important.
const CONNECTED_ONLY_THRESHOLD: usize = 30;
const MAX_ISOLATED_NODES: usize = 10;
const MAX_WEIGHT: u32 = 10;

const RESOLVE_EXTENSIONS: &[&str] = &["", ".js", ".jsx", ".ts", ".tsx", ".json"];
const INDEX_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx"];

static STATIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s+(?:[\w*{}\s,]+?\s+from\s+)?['"`]([^'"`]+)['"`]"#)
        .expect("valid import regex")
});
static REQUIRE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\s*\(\s*['"`]([^'"`]+)['"`]\s*\)"#).expect("valid require regex")
});
static DYNAMIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s*\(\s*['"`]([^'"`]+)['"`]\s*\)"#).expect("valid dynamic import regex")
});
static ROUTE_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"`](/[^'"`\s]*)['"`]"#).expect("valid route regex"));
static COMPONENT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Z][A-Za-z0-9]*)").expect("valid component regex"));
static IMPORT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"import\s+").expect("valid import keyword regex"));
static EXPORT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"export\s+").expect("valid export keyword regex"));
static FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"function\s+\w+|const\s+\w+\s*=\s*\(").expect("valid function regex")
});
static CLASS_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+\w+").expect("valid class regex"));

/// Role of a file, from where it lives in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Api,
    Page,
    Component,
    Utility,
    Style,
    Config,
    Test,
    Documentation,
    File,
}

impl FileKind {
    pub fn classify(path: &str) -> Self {
        if path.starts_with("pages/api/") {
            FileKind::Api
        } else if path.starts_with("pages/") {
            FileKind::Page
        } else if path.starts_with("components/") {
            FileKind::Component
        } else if path.starts_with("lib/") {
            FileKind::Utility
        } else if path.starts_with("styles/") {
            FileKind::Style
        } else if path.contains("config") {
            FileKind::Config
        } else if path.contains("test") || path.contains("spec") {
            FileKind::Test
        } else if path.ends_with(".md") {
            FileKind::Documentation
        } else {
            FileKind::File
        }
    }
}

/// How one file refers to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Import,
    Require,
    Dynamic,
    Route,
    Component,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// 1..=10
    pub weight: u32,
    /// Characters; 0 when the file could not be downloaded
    pub size: usize,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_files: usize,
    pub analyzed_files: usize,
    pub connected_files: usize,
    pub dependencies: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyGraph {
    pub nodes: Vec<DependencyNode>,
    pub links: Vec<DependencyLink>,
    pub metadata: GraphStats,
}

/// Download the first [`MAX_ANALYZED_FILES`] files in windows of
/// `fetch_concurrency` and build their graph.
pub async fn map_dependencies(
    source: &dyn FileSource,
    files: &[RemoteFile],
    fetch_concurrency: usize,
) -> DependencyGraph {
    let analyzed = &files[..files.len().min(MAX_ANALYZED_FILES)];
    tracing::info!(
        "Analyzing {} of {} files for dependencies",
        analyzed.len(),
        files.len()
    );

    let mut contents = Vec::with_capacity(analyzed.len());
    for window in analyzed.chunks(fetch_concurrency.max(1)) {
        let fetched = join_all(window.iter().map(|file| source.fetch(file))).await;
        contents.extend(
            window
                .iter()
                .zip(fetched)
                .map(|(file, content)| (file.path.clone(), content)),
        );
    }

    build_graph(files.len(), &contents)
}

/// Graph over already-downloaded files; `None` marks a file that could not
/// be read and becomes a placeholder node.
pub fn build_graph(total_files: usize, files: &[(String, Option<String>)]) -> DependencyGraph {
    let nodes: Vec<DependencyNode> = files
        .iter()
        .map(|(path, content)| DependencyNode {
            id: path.clone(),
            kind: FileKind::classify(path),
            weight: content.as_deref().map_or(1, |c| file_weight(path, c)),
            size: content.as_deref().map_or(0, |c| c.chars().count()),
            language: Language::from_extension(&extension_of(path)),
        })
        .collect();

    let known: HashSet<&str> = files
        .iter()
        .filter(|(_, content)| content.is_some())
        .map(|(path, _)| path.as_str())
        .collect();

    let mut links: Vec<DependencyLink> = Vec::new();
    for (path, content) in files {
        let Some(content) = content else { continue };
        for (target, kind) in extract_dependencies(path, content, &known) {
            if target == *path {
                continue;
            }
            links.push(DependencyLink {
                source: path.clone(),
                target,
                kind,
            });
        }
    }
    tracing::debug!("Created {} nodes and {} links", nodes.len(), links.len());

    let nodes = if nodes.len() > CONNECTED_ONLY_THRESHOLD {
        keep_connected(nodes, &links)
    } else {
        nodes
    };

    DependencyGraph {
        metadata: GraphStats {
            total_files,
            analyzed_files: files.len(),
            connected_files: nodes.len(),
            dependencies: links.len(),
        },
        nodes,
        links,
    }
}

/// Connected nodes, followed by up to ten unconnected ones that look central.
fn keep_connected(nodes: Vec<DependencyNode>, links: &[DependencyLink]) -> Vec<DependencyNode> {
    let connected: HashSet<&str> = links
        .iter()
        .flat_map(|l| [l.source.as_str(), l.target.as_str()])
        .collect();

    let (mut kept, isolated): (Vec<_>, Vec<_>) = nodes
        .into_iter()
        .partition(|n| connected.contains(n.id.as_str()));

    kept.extend(
        isolated
            .into_iter()
            .filter(|n| {
                matches!(n.kind, FileKind::Page | FileKind::Api)
                    || n.weight > 5
                    || ["index", "main", "app"].iter().any(|s| n.id.contains(s))
            })
            .take(MAX_ISOLATED_NODES),
    );
    kept
}

/// Resolved in-repository targets of one file, first occurrence wins.
fn extract_dependencies(
    path: &str,
    content: &str,
    known: &HashSet<&str>,
) -> Vec<(String, DependencyKind)> {
    let dir = path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
    let mut found: Vec<(String, DependencyKind)> = Vec::new();
    let mut add = |target: Option<String>, kind: DependencyKind| {
        if let Some(target) = target {
            if !found.iter().any(|(t, _)| *t == target) {
                found.push((target, kind));
            }
        }
    };

    let specifiers = [
        (&*STATIC_IMPORT, DependencyKind::Import),
        (&*REQUIRE_CALL, DependencyKind::Require),
        (&*DYNAMIC_IMPORT, DependencyKind::Dynamic),
    ];
    for (pattern, kind) in specifiers {
        for caps in pattern.captures_iter(content) {
            add(resolve_module(&caps[1], dir, known), kind);
        }
    }

    if content.contains("router.push") || content.contains("href=") {
        for caps in ROUTE_LITERAL.captures_iter(content) {
            add(resolve_route(&caps[1], known), DependencyKind::Route);
        }
    }

    let ext = extension_of(path);
    if ext == "jsx" || ext == "tsx" || content.contains("React") {
        for caps in COMPONENT_TAG.captures_iter(content) {
            let component = &caps[1];
            let mut matches: Vec<&str> = known
                .iter()
                .copied()
                .filter(|p| file_stem(p) == component)
                .collect();
            matches.sort_unstable();
            for target in matches {
                add(Some(target.to_string()), DependencyKind::Component);
            }
        }
    }

    found
}

/// A relative (`./`, `../`) or root-relative (`/`) specifier resolved to a
/// known file, trying script extensions and then `index` files.
fn resolve_module(specifier: &str, dir: &str, known: &HashSet<&str>) -> Option<String> {
    let base = if specifier.starts_with("./") || specifier.starts_with("../") {
        resolve_relative(dir, specifier)
    } else if let Some(rooted) = specifier.strip_prefix('/') {
        rooted.to_string()
    } else {
        return None;
    };
    resolve_base(&base, known)
}

fn resolve_base(base: &str, known: &HashSet<&str>) -> Option<String> {
    RESOLVE_EXTENSIONS
        .iter()
        .map(|ext| format!("{base}{ext}"))
        .chain(INDEX_EXTENSIONS.iter().map(|ext| format!("{base}/index{ext}")))
        .find(|candidate| known.contains(candidate.as_str()))
}

/// Next.js-style route to its page or API handler file.
fn resolve_route(route: &str, known: &HashSet<&str>) -> Option<String> {
    if route.starts_with("//") {
        return None;
    }
    let page = route.trim_end_matches('/');
    if page.is_empty() {
        resolve_base("pages/index", known)
    } else {
        resolve_base(&format!("pages{page}"), known)
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}

/// Importance score from location, length, import/export volume and
/// declaration count, capped at 10.
fn file_weight(path: &str, content: &str) -> u32 {
    let mut weight = 1;

    if path.contains("index") {
        weight += 3;
    }
    if path.contains("main") {
        weight += 3;
    }
    if path.contains("app") {
        weight += 2;
    }
    if path.starts_with("pages/") {
        weight += 2;
    }
    if path.starts_with("pages/api/") {
        weight += 1;
    }
    if path.starts_with("components/") {
        weight += 1;
    }

    let lines = content.split('\n').count();
    weight += match lines {
        n if n > 500 => 3,
        n if n > 200 => 2,
        n if n > 100 => 1,
        _ => 0,
    };

    let imports_exports =
        IMPORT_KEYWORD.find_iter(content).count() + EXPORT_KEYWORD.find_iter(content).count();
    weight += (imports_exports / 3).min(3) as u32;

    let declarations =
        FUNCTION_DECL.find_iter(content).count() + CLASS_DECL.find_iter(content).count();
    weight += (declarations / 2).min(2) as u32;

    weight.min(MAX_WEIGHT)
}
