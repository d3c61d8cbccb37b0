//! Fixed-size splitter for languages without a declaration-aware scanner.
//!
//! Cuts the raw text into contiguous, non-overlapping windows of
//! `max_tokens * CHARS_PER_TOKEN` characters. Windows are counted in
//! characters, so a cut never lands inside a UTF-8 sequence.

use super::{FileMeta, CHARS_PER_TOKEN};
use crate::models::{ChunkType, Fragment};

pub fn chunk_by_size(content: &str, meta: &FileMeta, max_tokens: usize) -> Vec<Fragment> {
    let window = (max_tokens * CHARS_PER_TOKEN).max(1);

    let mut fragments = Vec::new();
    let mut start = 0usize;
    let mut chars_in_window = 0usize;

    for (offset, _) in content.char_indices() {
        if chars_in_window == window {
            push_window(&mut fragments, meta, &content[start..offset]);
            start = offset;
            chars_in_window = 0;
        }
        chars_in_window += 1;
    }

    if start < content.len() {
        push_window(&mut fragments, meta, &content[start..]);
    }

    fragments
}

fn push_window(fragments: &mut Vec<Fragment>, meta: &FileMeta, text: &str) {
    let name = format!("Chunk {}", fragments.len() + 1);
    fragments.push(meta.fragment(text.to_string(), ChunkType::Chunk, &name));
}
