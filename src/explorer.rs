//! Heuristic API endpoint extraction from retrieved handler code.
//!
//! Works on plain text with regexes; it recognises the request/response idioms
//! of Node-style handlers (`req.body`, `req.query`, `res.status(..).json(..)`)
//! and Next.js `pages/api/` routing.

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::models::QueryHit;

/// Text embedded to pull handler-like fragments out of the store.
pub const API_PROBE: &str = "API endpoint route handler request response";

/// How many fragments the probe retrieves.
pub const API_PROBE_TOP_K: usize = 50;

static DOC_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*\*.*?\*/").expect("valid doc comment regex"));
static API_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//.*API.*endpoint").expect("valid api comment regex"));
static BODY_DESTRUCTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"const\s*\{([^}]+)\}\s*=\s*req\.body").expect("valid destructure regex")
});
static BODY_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"req\.body\.(\w+)").expect("valid body field regex"));
static QUERY_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"req\.query\.(\w+)").expect("valid query field regex"));
static JSON_RESPONSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"res(?:ponse)?\.(?:status\(\d+\)\.)?json\(\s*(\{[^}]+\})")
        .expect("valid json response regex")
});
static RETURN_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"return\s*(\{[^}]+\})").expect("valid return regex"));
static IMPORT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\bimport\s+(?:.*?\s+from\s+)?|\brequire\(\s*)['"]([^'"]+)['"]"#)
        .expect("valid import regex")
});
static TYPEOF_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"typeof\s+(\w+)\s*===?\s*["'](\w+)["']"#).expect("valid typeof regex")
});
static UPPERCASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z])").expect("valid uppercase regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestParam {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub required: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub path: String,
    pub method: String,
    pub description: String,
    pub request_params: Vec<RequestParam>,
    pub response_fields: Vec<ResponseField>,
    pub example_request: Map<String, Value>,
    pub example_response: Map<String, Value>,
    pub source_path: String,
    pub related_files: Vec<String>,
}

/// Counters reported alongside the endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerDebug {
    pub total_chunks: usize,
    pub filtered_chunks: usize,
    pub processed_files: usize,
    pub endpoint_count: usize,
}

/// Whether a retrieved fragment looks like request handling code.
pub fn looks_like_handler(hit: &QueryHit) -> bool {
    let path = &hit.metadata.path;
    let content = &hit.content;
    path.contains("/api/")
        || path.contains("controller")
        || path.contains("routes")
        || content.contains("export default")
        || content.contains("req.method")
        || content.contains("res.status")
        || content.contains("res.json")
}

/// Filter `hits`, group them by file and describe one endpoint per file.
/// Endpoints come back sorted by route path.
pub fn discover_endpoints(hits: &[QueryHit]) -> (Vec<Endpoint>, ExplorerDebug) {
    let handlers: Vec<&QueryHit> = hits.iter().filter(|h| looks_like_handler(h)).collect();

    let mut by_path: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for hit in &handlers {
        by_path
            .entry(hit.metadata.path.as_str())
            .or_default()
            .push(hit.content.as_str());
    }

    let mut endpoints: Vec<Endpoint> = by_path
        .iter()
        .map(|(path, contents)| extract_endpoint(path, &contents.join("\n\n")))
        .collect();
    endpoints.sort_by(|a, b| a.path.cmp(&b.path));

    let debug = ExplorerDebug {
        total_chunks: hits.len(),
        filtered_chunks: handlers.len(),
        processed_files: by_path.len(),
        endpoint_count: endpoints.len(),
    };
    (endpoints, debug)
}

fn file_stem(path: &str) -> &str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// `/api/<stem>`, or the route implied by a Next.js `pages/api/` location.
pub fn route_path(path: &str) -> String {
    if let Some((_, rest)) = path.split_once("pages/api/") {
        let route = rest.rsplit_once('.').map(|(r, _)| r).unwrap_or(rest);
        return format!("/api/{route}");
    }
    format!("/api/{}", file_stem(path))
}

fn detect_method(content: &str) -> &'static str {
    for method in ["GET", "PUT", "DELETE"] {
        if content.contains(&format!("req.method === '{method}'"))
            || content.contains(&format!("method: '{method}'"))
        {
            return method;
        }
    }
    "POST"
}

fn humanize(name: &str) -> String {
    UPPERCASE.replace_all(name, " $1").to_lowercase()
}

fn describe(content: &str, method: &str, stem: &str) -> String {
    let found = DOC_COMMENT
        .find(content)
        .or_else(|| API_COMMENT.find(content));
    match found {
        Some(m) => {
            let stripped = m
                .as_str()
                .replace("/**", "")
                .replace("*/", "")
                .replace("//", "")
                .replace('*', "");
            let joined = stripped
                .trim()
                .lines()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(" ");
            WHITESPACE.replace_all(&joined, " ").into_owned()
        }
        None => format!("{method} endpoint for {} operations", stem.replace('-', " ")),
    }
}

fn is_required(content: &str, param: &str, accessor: &str) -> bool {
    content.contains(&format!("if (!{accessor}{param})"))
        || content.contains(&format!("if(!{accessor}{param})"))
        || content.contains(&format!("{param} is required"))
}

/// Type guess from a parameter's name, then from how the code uses it.
fn guess_type_from_usage(param: &str, content: &str) -> String {
    let has = |needles: &[&str]| needles.iter().any(|n| param.contains(n));

    let by_name = if has(&["id", "Id", "name", "Name", "email", "Email"]) {
        Some("string")
    } else if has(&["count", "Count"]) {
        Some("number")
    } else if has(&["is", "has", "enable", "disable"]) {
        Some("boolean")
    } else if has(&["date", "Date"]) {
        Some("string")
    } else if has(&["list", "List", "array", "Array"]) {
        Some("array")
    } else if has(&["options", "Options", "config", "Config"]) {
        Some("object")
    } else {
        None
    };
    if let Some(kind) = by_name {
        return kind.to_string();
    }

    if let Some(caps) = TYPEOF_CHECK
        .captures_iter(content)
        .find(|caps| &caps[1] == param)
    {
        return caps[2].to_string();
    }

    let used = |suffix: &str| content.contains(&format!("{param}{suffix}"));
    let kind = if used(".map") || used(".forEach") || used(".filter") {
        "array"
    } else if used(".length") {
        if used("[") {
            "array"
        } else {
            "string"
        }
    } else if used(".toUpperCase") || used(".toLowerCase") {
        "string"
    } else if used(".toFixed") || used(" + 1") {
        "number"
    } else {
        "string"
    };
    kind.to_string()
}

/// Type guess from a literal or expression on the right of `name: value`.
fn guess_type_from_value(value: Option<&str>) -> String {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return "string".to_string();
    };

    let kind = if value == "true" || value == "false" {
        "boolean"
    } else if value.chars().all(|c| c.is_ascii_digit()) {
        "number"
    } else if (value.starts_with('\'') || value.starts_with('"'))
        && (value.ends_with('\'') || value.ends_with('"'))
        && value.len() >= 2
    {
        "string"
    } else if value.starts_with('[') && value.ends_with(']') {
        "array"
    } else if value.starts_with('{') && value.ends_with('}') {
        "object"
    } else if value.contains('?') && value.contains(':') {
        return guess_type_from_value(value.split(':').nth(1));
    } else if value.contains("JSON.stringify") || value.contains("join") {
        "string"
    } else if value.contains("map") || value.contains("filter") {
        "array"
    } else if is_identifier(value) {
        let has = |needles: &[&str]| needles.iter().any(|n| value.contains(n));
        if has(&["count", "Count", "total", "Total"]) {
            "number"
        } else if has(&["is", "has"]) {
            "boolean"
        } else if has(&["list", "List", "array", "Array"]) {
            "array"
        } else if has(&["obj", "Obj", "options", "Options"]) {
            "object"
        } else {
            "string"
        }
    } else {
        "string"
    };
    kind.to_string()
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn request_params(content: &str, method: &str) -> Vec<RequestParam> {
    let mut params: Vec<RequestParam> = Vec::new();
    let push = |params: &mut Vec<RequestParam>, name: &str, accessor: &str, noun: &str| {
        if name.is_empty() || params.iter().any(|p| p.name == name) {
            return;
        }
        params.push(RequestParam {
            name: name.to_string(),
            kind: guess_type_from_usage(name, content),
            required: is_required(content, name, accessor),
            description: format!("The {} {noun}", humanize(name)),
        });
    };

    if let Some(caps) = BODY_DESTRUCTURE.captures(content) {
        for name in caps[1].split(',').map(str::trim) {
            push(&mut params, name, "", "parameter");
        }
    }
    for caps in BODY_FIELD.captures_iter(content) {
        push(&mut params, &caps[1], "req.body.", "parameter");
    }
    if method == "GET" {
        for caps in QUERY_FIELD.captures_iter(content) {
            push(&mut params, &caps[1], "req.query.", "query parameter");
        }
    }
    params
}

fn object_fields(object: &str) -> Vec<ResponseField> {
    object
        .replace(['{', '}'], "")
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .filter_map(|field| {
            let mut parts = field.split(':').map(str::trim);
            let name = parts.next()?.replace(['\'', '"'], "");
            if name.is_empty() {
                return None;
            }
            Some(ResponseField {
                kind: guess_type_from_value(parts.next()),
                description: format!("The {} response field", humanize(&name)),
                name,
            })
        })
        .collect()
}

fn fields_of_first_object(re: &Regex, content: &str) -> Vec<ResponseField> {
    re.captures(content)
        .map(|caps| object_fields(&caps[1]))
        .unwrap_or_default()
}

/// Fields of the first `res.json({..})` object, else of the first returned
/// object literal.
fn response_fields(content: &str) -> Vec<ResponseField> {
    let fields = fields_of_first_object(&JSON_RESPONSE, content);
    if fields.is_empty() {
        fields_of_first_object(&RETURN_OBJECT, content)
    } else {
        fields
    }
}

fn example_value(kind: &str, name: &str) -> Value {
    match kind {
        "number" => json!(123),
        "boolean" => json!(true),
        "array" => json!([1, 2, 3]),
        "object" => json!({ "id": 1, "name": "example" }),
        _ => json!(format!("example-{name}")),
    }
}

/// Join a relative import onto the importing file's directory.
pub(crate) fn resolve_relative(dir: &str, import: &str) -> String {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in import.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relative imports resolved against the file's directory. Extensionless
/// imports expand to each script extension.
fn related_files(path: &str, content: &str) -> Vec<String> {
    let dir = path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");

    let mut related: Vec<String> = Vec::new();
    for caps in IMPORT_PATH.captures_iter(content) {
        let import = &caps[1];
        if !import.starts_with('.') {
            continue;
        }
        let resolved = resolve_relative(dir, import);
        let has_extension = resolved.rsplit('/').next().is_some_and(|name| name.contains('.'));

        let candidates = if has_extension {
            vec![resolved]
        } else {
            [".js", ".ts", ".jsx", ".tsx"]
                .iter()
                .map(|ext| format!("{resolved}{ext}"))
                .collect()
        };
        for candidate in candidates {
            if !related.contains(&candidate) {
                related.push(candidate);
            }
        }
    }
    related
}

/// Describe the endpoint implemented by `path` from its retrieved code.
pub fn extract_endpoint(path: &str, content: &str) -> Endpoint {
    let stem = file_stem(path);
    let method = detect_method(content);

    let mut request_params = request_params(content, method);
    let mut response_fields = response_fields(content);

    let mut example_request: Map<String, Value> = request_params
        .iter()
        .map(|p| (p.name.clone(), example_value(&p.kind, &p.name)))
        .collect();
    let mut example_response: Map<String, Value> = response_fields
        .iter()
        .map(|f| (f.name.clone(), example_value(&f.kind, &f.name)))
        .collect();

    if request_params.is_empty() {
        request_params.push(RequestParam {
            name: "id".to_string(),
            kind: "string".to_string(),
            required: true,
            description: "Identifier for the resource".to_string(),
        });
        example_request.insert("id".to_string(), json!("example-id"));
    }
    if response_fields.is_empty() {
        response_fields.push(ResponseField {
            name: "success".to_string(),
            kind: "boolean".to_string(),
            description: "Whether the request was successful".to_string(),
        });
        example_response.insert("success".to_string(), json!(true));
    }

    Endpoint {
        id: stem.to_string(),
        path: route_path(path),
        method: method.to_string(),
        description: describe(content, method, stem),
        request_params,
        response_fields,
        example_request,
        example_response,
        source_path: path.to_string(),
        related_files: related_files(path, content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::FileMeta;
    use crate::models::ChunkType;

    const USERS_HANDLER: &str = r#"import { findUser } from '../../lib/db';
import helpers from './helpers.js';
import express from 'express';

/**
 * Look up a user
 * by id.
 */
export default async function handler(req, res) {
  if (req.method === 'GET') {
    const userId = req.query.userId;
    if (!req.query.userId) return res.status(400).json({ error: 'missing' });
  }
  const { displayName, tags } = req.body;
  if (!displayName) return;
  tags.map((t) => t);
  res.status(200).json({ user: userObj, total: totalCount, ok: true });
}
"#;

    fn hit(path: &str, content: &str) -> QueryHit {
        let fragment = FileMeta::for_path(path).fragment(content.to_string(), ChunkType::Code, "x");
        QueryHit {
            chunk_id: "chunk_0".to_string(),
            content: fragment.content,
            metadata: fragment.metadata,
            distance: 0.1,
        }
    }

    #[test]
    fn test_route_path() {
        assert_eq!(route_path("pages/api/users/[id].js"), "/api/users/[id]");
        assert_eq!(route_path("src/pages/api/search.ts"), "/api/search");
        assert_eq!(route_path("server/controllers/orderController.js"), "/api/orderController");
    }

    #[test]
    fn test_extract_endpoint_from_handler() {
        let ep = extract_endpoint("pages/api/users.js", USERS_HANDLER);
        assert_eq!(ep.id, "users");
        assert_eq!(ep.path, "/api/users");
        assert_eq!(ep.method, "GET");
        assert_eq!(ep.description, "Look up a user by id.");

        let names: Vec<&str> = ep.request_params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["displayName", "tags", "userId"]);
        assert!(ep.request_params[0].required);
        assert_eq!(ep.request_params[0].kind, "string");
        assert_eq!(ep.request_params[0].description, "The display name parameter");
        assert_eq!(ep.request_params[1].kind, "array");
        assert!(ep.request_params[2].required);
        assert_eq!(ep.request_params[2].description, "The user id query parameter");

        // First json() call wins
        let fields: Vec<(&str, &str)> = ep
            .response_fields
            .iter()
            .map(|f| (f.name.as_str(), f.kind.as_str()))
            .collect();
        assert_eq!(fields, vec![("error", "string")]);

        assert_eq!(
            ep.related_files,
            vec![
                "lib/db.js".to_string(),
                "lib/db.ts".to_string(),
                "lib/db.jsx".to_string(),
                "lib/db.tsx".to_string(),
                "pages/api/helpers.js".to_string(),
            ]
        );
    }

    #[test]
    fn test_defaults_when_nothing_is_detected() {
        let ep = extract_endpoint("routes/health-check.js", "module.exports = router;");
        assert_eq!(ep.method, "POST");
        assert_eq!(ep.description, "POST endpoint for health check operations");
        assert_eq!(ep.request_params[0].name, "id");
        assert_eq!(ep.example_request["id"], json!("example-id"));
        assert_eq!(ep.response_fields[0].name, "success");
        assert_eq!(ep.example_response["success"], json!(true));
        assert!(ep.related_files.is_empty());
    }

    #[test]
    fn test_value_type_guesses() {
        assert_eq!(guess_type_from_value(Some("true")), "boolean");
        assert_eq!(guess_type_from_value(Some("42")), "number");
        assert_eq!(guess_type_from_value(Some("'x'")), "string");
        assert_eq!(guess_type_from_value(Some("[a, b]")), "array");
        assert_eq!(guess_type_from_value(Some("totalCount")), "number");
        assert_eq!(guess_type_from_value(Some("items.map(f)")), "array");
        assert_eq!(guess_type_from_value(None), "string");
    }

    #[test]
    fn test_usage_type_guesses() {
        assert_eq!(guess_type_from_usage("pageCount", ""), "number");
        assert_eq!(guess_type_from_usage("flag", "if (typeof flag === 'boolean')"), "boolean");
        assert_eq!(
            guess_type_from_usage("limit", "typeof page === 'string' && typeof limit == \"number\""),
            "number"
        );
        assert_eq!(guess_type_from_usage("amount", "amount.toFixed(2)"), "number");
        assert_eq!(guess_type_from_usage("rows", "rows.forEach(print)"), "array");
    }

    #[test]
    fn test_discover_filters_groups_and_sorts() {
        let hits = vec![
            hit("pages/api/zeta.js", "export default function z(req, res) {}"),
            hit("src/utils/math.js", "function add(a, b) { return a + b; }"),
            hit("pages/api/alpha.js", "res.json({ ok: true })"),
            hit("pages/api/zeta.js", "res.status(201).json({ id: newId })"),
        ];

        let (endpoints, debug) = discover_endpoints(&hits);
        let paths: Vec<&str> = endpoints.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/api/alpha", "/api/zeta"]);
        assert_eq!(endpoints[1].response_fields[0].name, "id");
        assert_eq!(
            debug,
            ExplorerDebug {
                total_chunks: 4,
                filtered_chunks: 3,
                processed_files: 2,
                endpoint_count: 2,
            }
        );
    }
}
