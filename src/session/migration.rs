use crate::models::AuthenticatedUser;
use crate::storage::{LegacyEntry, PersistentUserCache};

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    NotNeeded,
    /// Moved to the current key. The caller adopts this user as-is.
    Migrated { user: AuthenticatedUser },
    DiscardedCorrupt,
}

/// One-shot move of the pre-migration cache slot to the current key.
///
/// Runs only while the current key is empty, and removes the legacy slot
/// once moved, so it never fires twice. Delete this step once no clients
/// carry the old key.
pub struct LegacyMigration<'a> {
    cache: &'a PersistentUserCache,
}

impl<'a> LegacyMigration<'a> {
    pub fn new(cache: &'a PersistentUserCache) -> Self {
        Self { cache }
    }

    pub fn run(&self) -> MigrationOutcome {
        let legacy = self.cache.load_legacy();
        if legacy == LegacyEntry::Absent || self.cache.has_entry() {
            return MigrationOutcome::NotNeeded;
        }

        match legacy {
            LegacyEntry::Valid(user) => {
                self.cache.save(Some(&user));
                self.cache.remove_legacy();
                tracing::info!(
                    user_id = %user.id,
                    from = %self.cache.legacy_key(),
                    to = %self.cache.key(),
                    "Migrated legacy cached user"
                );
                MigrationOutcome::Migrated { user }
            }
            LegacyEntry::Corrupt => {
                // unreadable under any key, nothing to carry over
                self.cache.remove_legacy();
                tracing::warn!(key = %self.cache.legacy_key(), "Removed malformed legacy cache entry");
                MigrationOutcome::DiscardedCorrupt
            }
            LegacyEntry::Absent => MigrationOutcome::NotNeeded,
        }
    }
}
