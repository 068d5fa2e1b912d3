//! Utility functions and helpers

pub mod alignment;

pub use alignment::{align_up, bytes_to_words, is_aligned, words_to_bytes};
