//! Conversation correlation for multi-turn chat exchanges
//!
//! Chat APIs resend the full transcript on every turn, so no
//! caller-managed session id is needed: after each response the gateway
//! stores a hash of the full transcript (including that response) in an
//! expiring map. A later request containing assistant messages hashes
//! every transcript prefix that ends right after an assistant message,
//! probes longest first, and adopts the conversation id of the first
//! hit. Probing consumes the entry atomically, so one stored hash can
//! extend exactly one chain.
//!
//! The hash covers only role + content of the message list. Model and
//! sampling parameters are deliberately excluded so the same transcript
//! replayed against a different model still correlates.

mod store;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use store::{ConversationStore, ConversationStoreError, MemoryConversationStore, ValkeyConversationStore};

/// One transcript turn reduced to the fields the hash covers
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptTurn {
    /// Message role ("system", "user", "assistant", "tool")
    pub role: String,
    /// Canonicalized content (flattened text and part representations)
    pub content: String,
}

impl TranscriptTurn {
    /// Convenience constructor
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }
}

/// Value stored under a transcript hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Conversation the transcript belongs to
    pub conversation_id: String,
    /// Run that produced the stored response
    pub run_id: String,
}

/// Resolved conversation identity for one request
#[derive(Debug, Clone)]
pub struct ConversationHandle {
    /// Conversation id, matched or freshly minted
    pub conversation_id: String,
    /// Run id minted for this request
    pub run_id: String,
    /// Whether the id came from a transcript-hash match
    pub matched: bool,
}

/// SHA-256 hash over the role + content of a transcript
pub fn transcript_hash(turns: &[TranscriptTurn]) -> String {
    let json = serde_json::to_string(turns).unwrap_or_default();
    let hash = Sha256::digest(json.as_bytes());
    format!("{hash:x}")
}

/// Hashes of every prefix ending right after an assistant turn, longest first
pub fn prefix_hashes(turns: &[TranscriptTurn]) -> Vec<String> {
    turns
        .iter()
        .enumerate()
        .filter(|(_, turn)| turn.is_assistant())
        .map(|(i, _)| transcript_hash(&turns[..=i]))
        .rev()
        .collect()
}

/// Hash-based conversation correlator over an expiring store
#[derive(Clone)]
pub struct Correlator {
    store: Arc<dyn ConversationStore>,
    ttl: Duration,
}

impl Correlator {
    /// Create a correlator over the given store
    pub fn new(store: Arc<dyn ConversationStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Resolve the conversation identity for an inbound transcript
    ///
    /// An explicit id bypasses hashing entirely. Otherwise the transcript
    /// prefixes are probed longest first; each probe is an atomic take, so
    /// a hit consumes the entry. Transcripts with no assistant turn, or
    /// whose entries have expired, mint a fresh conversation id.
    ///
    /// Store failures degrade to a miss: correlation is off the
    /// correctness-critical path.
    pub async fn resolve(&self, explicit: Option<&str>, turns: &[TranscriptTurn]) -> ConversationHandle {
        let run_id = uuid::Uuid::new_v4().to_string();

        if let Some(id) = explicit {
            return ConversationHandle {
                conversation_id: id.to_owned(),
                run_id,
                matched: false,
            };
        }

        for hash in prefix_hashes(turns) {
            match self.store.take(&hash).await {
                Ok(Some(entry)) => {
                    tracing::debug!(
                        conversation_id = %entry.conversation_id,
                        "transcript prefix matched existing conversation"
                    );
                    return ConversationHandle {
                        conversation_id: entry.conversation_id,
                        run_id,
                        matched: true,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "conversation store unavailable, treating as miss");
                    break;
                }
            }
        }

        ConversationHandle {
            conversation_id: uuid::Uuid::new_v4().to_string(),
            run_id,
            matched: false,
        }
    }

    /// Store the hash of a completed transcript so the next turn can chain
    ///
    /// `turns` must include the new assistant response as its final turn.
    pub async fn record_response(&self, handle: &ConversationHandle, turns: &[TranscriptTurn]) {
        let hash = transcript_hash(turns);
        let entry = ConversationEntry {
            conversation_id: handle.conversation_id.clone(),
            run_id: handle.run_id.clone(),
        };

        if let Err(e) = self.store.put(&hash, &entry, self.ttl).await {
            tracing::warn!(error = %e, "failed to record conversation hash");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, content: &str) -> TranscriptTurn {
        TranscriptTurn::new(role, content)
    }

    #[test]
    fn hash_covers_role_and_content_only() {
        let a = vec![turn("user", "hi"), turn("assistant", "hello")];
        let b = vec![turn("user", "hi"), turn("assistant", "hello")];
        assert_eq!(transcript_hash(&a), transcript_hash(&b));

        let c = vec![turn("user", "hi"), turn("assistant", "hey")];
        assert_ne!(transcript_hash(&a), transcript_hash(&c));
    }

    #[test]
    fn prefix_hashes_longest_first() {
        let turns = vec![
            turn("system", "s"),
            turn("user", "u1"),
            turn("assistant", "a1"),
            turn("user", "u2"),
            turn("assistant", "a2"),
            turn("user", "u3"),
        ];

        let hashes = prefix_hashes(&turns);
        assert_eq!(hashes.len(), 2);
        // Longest prefix (through a2) probes before the shorter one (through a1)
        assert_eq!(hashes[0], transcript_hash(&turns[..5]));
        assert_eq!(hashes[1], transcript_hash(&turns[..3]));
    }

    #[test]
    fn no_assistant_turn_yields_no_prefixes() {
        let turns = vec![turn("system", "s"), turn("user", "u1")];
        assert!(prefix_hashes(&turns).is_empty());
    }

    fn correlator(ttl: Duration) -> Correlator {
        Correlator::new(Arc::new(MemoryConversationStore::new()), ttl)
    }

    #[tokio::test]
    async fn explicit_id_bypasses_hashing() {
        let correlator = correlator(Duration::from_secs(3600));
        let turns = vec![turn("user", "hi"), turn("assistant", "hello")];

        let handle = correlator.resolve(Some("conv-explicit"), &turns).await;
        assert_eq!(handle.conversation_id, "conv-explicit");
        assert!(!handle.matched);
    }

    #[tokio::test]
    async fn three_turn_chain_resolves_to_one_conversation() {
        let correlator = correlator(Duration::from_secs(3600));

        // T1: [S, U1] -> A1
        let t1 = vec![turn("system", "s"), turn("user", "u1")];
        let h1 = correlator.resolve(None, &t1).await;
        assert!(!h1.matched);

        let mut with_a1 = t1.clone();
        with_a1.push(turn("assistant", "a1"));
        correlator.record_response(&h1, &with_a1).await;

        // T2: [S, U1, A1, U2] -> A2
        let mut t2 = with_a1.clone();
        t2.push(turn("user", "u2"));
        let h2 = correlator.resolve(None, &t2).await;
        assert!(h2.matched);
        assert_eq!(h2.conversation_id, h1.conversation_id);

        let mut with_a2 = t2.clone();
        with_a2.push(turn("assistant", "a2"));
        correlator.record_response(&h2, &with_a2).await;

        // T3: [S, U1, A1, U2, A2, U3] -> A3
        let mut t3 = with_a2.clone();
        t3.push(turn("user", "u3"));
        let h3 = correlator.resolve(None, &t3).await;
        assert!(h3.matched);
        assert_eq!(h3.conversation_id, h1.conversation_id);

        // Every stored entry was consumed along the way
        let again = correlator.resolve(None, &t3).await;
        assert!(!again.matched);
        assert_ne!(again.conversation_id, h1.conversation_id);
    }

    #[tokio::test]
    async fn expired_entry_starts_new_conversation() {
        let correlator = correlator(Duration::from_millis(20));

        let t1 = vec![turn("user", "u1")];
        let h1 = correlator.resolve(None, &t1).await;

        let mut with_a1 = t1.clone();
        with_a1.push(turn("assistant", "a1"));
        correlator.record_response(&h1, &with_a1).await;

        tokio::time::sleep(Duration::from_millis(40)).await;

        let mut t2 = with_a1.clone();
        t2.push(turn("user", "u2"));
        let h2 = correlator.resolve(None, &t2).await;
        assert!(!h2.matched);
        assert_ne!(h2.conversation_id, h1.conversation_id);
    }
}
