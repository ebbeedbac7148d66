use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use crate::transcript::Transcript;

/// Stable fingerprint of a video URL (SHA-256 hex of the trimmed URL)
pub fn fingerprint(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Transcripts already acquired, keyed by URL fingerprint.
///
/// Entries live as long as the cache and are never invalidated.
#[derive(Debug, Default)]
pub struct TranscriptCache {
    entries: HashMap<String, Arc<Transcript>>,
}

impl TranscriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Arc<Transcript>> {
        self.entries.get(&fingerprint(url)).cloned()
    }

    /// Store `transcript` for `url`, returning the shared handle
    pub fn insert(&mut self, url: &str, transcript: Transcript) -> Arc<Transcript> {
        let transcript = Arc::new(transcript);
        self.entries.insert(fingerprint(url), Arc::clone(&transcript));
        transcript
    }
}
