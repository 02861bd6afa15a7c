//! Recommended-question sampling. Questions live in a JSON pool on disk;
//! each caller session has its own cursor of already-shown question ids, so
//! one user's browsing never hides questions from another. A session's
//! cursor resets once it has seen the whole (filtered) pool.

use lru::LruCache;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::models::{QuickAnswer, RecommendedQuestion};

/// How many per-session cursors to keep before evicting the least recently
/// used one. An evicted cursor just means that session may see repeats.
const MAX_CURSORS: usize = 4_096;

#[derive(Debug, Serialize, Deserialize, Default)]
struct QuestionFile {
    questions: Vec<RecommendedQuestion>,
}

pub struct RecommendationPool {
    path: PathBuf,
    questions: Vec<RecommendedQuestion>,
    shown: Mutex<LruCache<String, HashSet<String>>>,
}

impl RecommendationPool {
    /// Load the pool, seeding the file with a starter structure when it does
    /// not exist yet.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let seed = QuestionFile {
                questions: default_questions(),
            };
            std::fs::write(path, serde_json::to_string_pretty(&seed)?)?;
            tracing::info!(path = %path.display(), "seeded recommended-question pool");
        }

        let data = std::fs::read_to_string(path)?;
        let file: QuestionFile = serde_json::from_str(&data).unwrap_or_else(|e| {
            tracing::error!(path = %path.display(), "unreadable question pool: {e}");
            QuestionFile::default()
        });

        let cap = NonZeroUsize::new(MAX_CURSORS).expect("constant is nonzero");
        Ok(Self {
            path: path.to_path_buf(),
            questions: file.questions,
            shown: Mutex::new(LruCache::new(cap)),
        })
    }

    /// Sample up to `count` questions the session has not seen yet,
    /// optionally filtered by knowledge-base type. When the session has
    /// exhausted the filtered pool, its cursor resets and sampling starts
    /// over.
    pub fn sample(&self, session_id: &str, count: usize, kb_type: &str) -> Vec<RecommendedQuestion> {
        let filtered: Vec<&RecommendedQuestion> = self
            .questions
            .iter()
            .filter(|q| kb_type == "all" || q.kb_type == kb_type)
            .collect();
        if filtered.is_empty() || count == 0 {
            return Vec::new();
        }

        let mut shown = self.shown.lock();
        if !shown.contains(session_id) {
            shown.put(session_id.to_string(), HashSet::new());
        }
        let cursor = match shown.get_mut(session_id) {
            Some(cursor) => cursor,
            None => return Vec::new(),
        };

        let mut available: Vec<&RecommendedQuestion> = filtered
            .iter()
            .copied()
            .filter(|q| !cursor.contains(&q.id))
            .collect();
        if available.is_empty() {
            // This session has seen everything; start its cycle over.
            for q in &filtered {
                cursor.remove(&q.id);
            }
            available = filtered;
        }

        let mut rng = rand::thread_rng();
        available.shuffle(&mut rng);
        available.truncate(count);

        for q in &available {
            cursor.insert(q.id.clone());
        }

        available.into_iter().cloned().collect()
    }

    /// Look up the canned answer for a question id.
    pub fn quick_answer(&self, question_id: &str) -> Option<QuickAnswer> {
        self.questions
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| QuickAnswer {
                id: q.id.clone(),
                question: q.question.clone(),
                answer: if q.answer.is_empty() {
                    "No canned answer is available for this question yet.".to_string()
                } else {
                    q.answer.clone()
                },
            })
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn default_questions() -> Vec<RecommendedQuestion> {
    vec![
        RecommendedQuestion {
            id: "q1".to_string(),
            question: "What can this assistant help me with?".to_string(),
            category: "getting started".to_string(),
            kb_type: "general".to_string(),
            answer: "I answer questions from the configured knowledge bases and \
                     cite the passages each answer is based on."
                .to_string(),
        },
        RecommendedQuestion {
            id: "q2".to_string(),
            question: "How do I search a specific knowledge base?".to_string(),
            category: "getting started".to_string(),
            kb_type: "general".to_string(),
            answer: "Pick a knowledge scope when asking; retrieval is restricted \
                     to that scope's documents."
                .to_string(),
        },
    ]
}
