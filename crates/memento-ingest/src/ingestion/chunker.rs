//! Text chunking with prioritized separators and trailing-context overlap.
//!
//! Splitting prefers paragraph breaks, then line breaks, then sentence
//! punctuation, then word boundaries, then hard character cuts. Lengths are
//! character counts, not tokens. Separators stay attached to the start of the
//! following piece, so no content is lost at boundaries; overlap repeats
//! trailing pieces of the previous chunk.

use std::collections::VecDeque;

use crate::types::{Chunk, Document};

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
/// Default overlap between consecutive chunks
pub const DEFAULT_CHUNK_OVERLAP: usize = 400;

const SEPARATORS: [&str; 7] = ["\n\n", "\n", ".", "!", "?", " ", ""];

/// Splits documents into chunks of bounded character length
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    /// Chunk a document list in order, then fix up `chunk_index` and
    /// `total_chunks` across the final list and reconcile the 0-based page
    /// index into the 1-based `page_number` the image anchors use.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            let page_number = document.metadata.page_index.map(|p| p + 1);
            for piece in self.split_text(&document.text) {
                chunks.push(Chunk::new(
                    piece,
                    document.metadata.source_name.clone(),
                    page_number,
                ));
            }
        }

        let total = chunks.len() as u32;
        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.chunk_index = index as u32;
            chunk.total_chunks = total;
        }
        chunks
    }

    /// Split text into pieces of at most `chunk_size` characters
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        // First separator that actually occurs wins; "" always matches
        let mut separator: &str = separators.last().copied().unwrap_or("");
        let mut remaining: &[&'static str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() || text.contains(candidate) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut final_chunks = Vec::new();
        let mut good_pieces: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) <= self.chunk_size {
                good_pieces.push(piece);
            } else {
                // Oversized piece: flush what we have, then split it finer
                if !good_pieces.is_empty() {
                    final_chunks.extend(self.merge_pieces(std::mem::take(&mut good_pieces)));
                }
                if remaining.is_empty() {
                    final_chunks.push(piece);
                } else {
                    final_chunks.extend(self.split_recursive(&piece, remaining));
                }
            }
        }
        if !good_pieces.is_empty() {
            final_chunks.extend(self.merge_pieces(good_pieces));
        }
        final_chunks
    }

    /// Pack pieces into chunks up to `chunk_size`, carrying `chunk_overlap`
    /// characters of trailing pieces into the next chunk
    fn merge_pieces(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<String> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let piece_len = char_len(&piece);
            if total + piece_len > self.chunk_size && !window.is_empty() {
                let chunk = join_window(&window);
                if !chunk.is_empty() {
                    chunks.push(chunk);
                }
                // Retire leading pieces until the rest fits as overlap
                while total > self.chunk_overlap
                    || (total + piece_len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(first) => total -= char_len(&first),
                        None => break,
                    }
                }
            }
            total += piece_len;
            window.push_back(piece);
        }

        let chunk = join_window(&window);
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join_window(window: &VecDeque<String>) -> String {
    let mut out = String::new();
    for piece in window {
        out.push_str(piece);
    }
    out.trim().to_string()
}

/// Split at separator occurrences, keeping each separator attached to the
/// start of the piece that follows it
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut cuts = vec![0usize];
    cuts.extend(
        text.match_indices(separator)
            .map(|(index, _)| index)
            .filter(|&index| index != 0),
    );
    cuts.push(text.len());

    cuts.windows(2)
        .filter(|window| window[1] > window[0])
        .map(|window| text[window[0]..window[1]].to_string())
        .collect()
}
