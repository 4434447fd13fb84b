use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{LeaderboardError, Result};
use crate::record::{ScoreRecord, checked_total};
use crate::repository::{LeaderboardRepository, Lookup};

/// Longest nickname accepted, in characters.
pub const MAX_NAME_CHARS: usize = 64;

// 24 hours
const SESSION_DURATION_SECS: i64 = 24 * 60 * 60;

/// One participant's in-progress answers.
///
/// The scores always add up to a total that fits in an `i64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSession {
    name: String,
    scores: Vec<i64>,
    lookup: Lookup,
}

/// A live session shared between requests. Edits hold the lock across the
/// save so they reach the sheet in the order they were applied.
pub type SessionHandle = Arc<Mutex<ScoreSession>>;

/// Trims a nickname and rejects empty or oversized ones.
///
/// # Errors
/// * `InvalidName` if the trimmed name is empty or too long
pub fn normalize_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(LeaderboardError::InvalidName(
            "nickname cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(LeaderboardError::InvalidName(format!(
            "nickname longer than {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

impl ScoreSession {
    /// Starts a session for `name`, seeded from the sheet.
    ///
    /// Lookup failures are not propagated: the session starts from zeros and
    /// the [`Lookup`] tells the caller why.
    pub async fn identify(repo: &LeaderboardRepository, name: &str) -> (Self, Lookup) {
        let n = repo.question_count();
        let lookup = repo.lookup(name).await;
        let scores = match &lookup {
            Lookup::Found(scores) if scores.len() == n => scores.clone(),
            Lookup::Found(_) | Lookup::NotFound => vec![0; n],
            Lookup::Unavailable(e) => {
                log::warn!("lookup for {:?} failed, starting from zeros: {}", name, e);
                vec![0; n]
            }
        };
        let mut session = ScoreSession::new(name, scores);
        session.lookup = lookup.clone();
        (session, lookup)
    }

    pub fn new(name: impl Into<String>, scores: Vec<i64>) -> Self {
        ScoreSession {
            name: name.into(),
            scores,
            lookup: Lookup::NotFound,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scores(&self) -> &[i64] {
        &self.scores
    }

    /// How the saved scores were found when the participant joined.
    pub fn lookup(&self) -> &Lookup {
        &self.lookup
    }

    pub fn total(&self) -> i64 {
        checked_total(&self.scores).unwrap_or_default()
    }

    pub fn to_record(&self) -> ScoreRecord {
        ScoreRecord::new(self.name.clone(), self.scores.clone())
    }

    /// Sets one answer in memory without saving.
    ///
    /// # Errors
    /// * `ScoreIndex` if `index` is out of range
    /// * `TotalOverflow` if the new total would not fit in an `i64`; the
    ///   previous value is kept
    pub fn update(&mut self, index: usize, value: i64) -> Result<()> {
        let len = self.scores.len();
        let Some(slot) = self.scores.get_mut(index) else {
            return Err(LeaderboardError::ScoreIndex { index, len });
        };
        let previous = std::mem::replace(slot, value);
        if checked_total(&self.scores).is_none() {
            self.scores[index] = previous;
            return Err(LeaderboardError::TotalOverflow { index, value });
        }
        Ok(())
    }

    /// Sets one answer and saves the whole row.
    ///
    /// # Errors
    /// * `ScoreIndex` or `TotalOverflow` if the edit is rejected (nothing
    ///   is saved)
    /// * Store errors from the upsert; the in-memory value is kept
    pub async fn set_score(
        &mut self,
        repo: &LeaderboardRepository,
        index: usize,
        value: i64,
    ) -> Result<()> {
        self.update(index, value)?;
        repo.upsert(&self.to_record()).await
    }
}

struct Entry {
    session: SessionHandle,
    expires_at: DateTime<Utc>,
}

/// Live sessions keyed by an opaque id.
///
/// The map lock is only held to look a handle up; it is never held across
/// a store call.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Duration::seconds(SESSION_DURATION_SECS))
    }
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Stores `session` and returns its new id. Expired sessions are
    /// dropped at the same time.
    pub fn create(&self, session: ScoreSession) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut sessions = self.write();
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(
            id.clone(),
            Entry {
                session: Arc::new(Mutex::new(session)),
                expires_at: now + self.ttl,
            },
        );
        id
    }

    /// The session, if it exists and has not expired.
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        let sessions = self.read();
        sessions
            .get(id)
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.session.clone())
    }

    pub fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.write().remove(id).map(|entry| entry.session)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
