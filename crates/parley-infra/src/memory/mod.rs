//! Thread memory backed by a `FileStore`.

pub mod file_memory;
