use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::MigrationError;

/// Marker separating individual statements inside one migration file.
pub const STATEMENT_BREAKPOINT: &str = "--> statement-breakpoint";

/// Default name of the ledger table recording applied migrations.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "__drizzle_migrations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationJournal {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub dialect: String,
    pub entries: Vec<MigrationEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationEntry {
    pub idx: u32,
    #[serde(default)]
    pub version: String,
    /// Creation time in unix millis; doubles as the ledger's logical clock.
    pub when: i64,
    pub tag: String,
    #[serde(default = "default_breakpoints")]
    pub breakpoints: bool,
}

fn default_breakpoints() -> bool {
    true
}

impl MigrationEntry {
    /// Key of this entry's SQL body in [`MigrationConfig::migrations`].
    pub fn key(&self) -> String {
        format!("m{:04}", self.idx)
    }
}

impl MigrationJournal {
    pub fn empty() -> Self {
        Self {
            version: String::new(),
            dialect: "sqlite".into(),
            entries: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, MigrationError> {
        let journal: MigrationJournal = serde_json::from_str(json)
            .map_err(|e| MigrationError::InvalidJournal(e.to_string()))?;
        journal.validate()?;
        Ok(journal)
    }

    /// Indices must be dense from zero and timestamps must not go backwards.
    pub fn validate(&self) -> Result<(), MigrationError> {
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.idx as usize != position {
                return Err(MigrationError::InvalidJournal(format!(
                    "entry {} has idx {}, expected {}",
                    entry.tag, entry.idx, position
                )));
            }
        }

        for pair in self.entries.windows(2) {
            if pair[1].when < pair[0].when {
                return Err(MigrationError::InvalidJournal(format!(
                    "entry {} is older than its predecessor {}",
                    pair[1].tag, pair[0].tag
                )));
            }
        }

        Ok(())
    }
}

/// Journal plus SQL bodies, keyed `m0000`, `m0001`, ...
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub journal: MigrationJournal,
    pub migrations: BTreeMap<String, String>,
    pub migrations_table: String,
}

impl MigrationConfig {
    pub fn new(journal: MigrationJournal, migrations: BTreeMap<String, String>) -> Self {
        Self {
            journal,
            migrations,
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    /// The schema shipped with this crate.
    pub fn bundled() -> Result<Self, MigrationError> {
        let journal = MigrationJournal::from_json(include_str!("../../migrations/meta/_journal.json"))?;

        let mut migrations = BTreeMap::new();
        migrations.insert(
            "m0000".to_string(),
            include_str!("../../migrations/0000_initial.sql").to_string(),
        );
        migrations.insert(
            "m0001".to_string(),
            include_str!("../../migrations/0001_entry_readability.sql").to_string(),
        );
        migrations.insert(
            "m0002".to_string(),
            include_str!("../../migrations/0002_subscription_visibility.sql").to_string(),
        );

        Ok(Self::new(journal, migrations))
    }
}

/// A journal entry resolved against its SQL body.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationMeta {
    pub tag: String,
    pub sql: Vec<String>,
    pub folder_millis: i64,
    pub hash: String,
    pub breakpoints: bool,
}

/// Resolve every journal entry to its statements.
///
/// Fails before anything is executed if any body is missing.
pub fn read_migration_files(config: &MigrationConfig) -> Result<Vec<MigrationMeta>, MigrationError> {
    config.journal.validate()?;

    config
        .journal
        .entries
        .iter()
        .map(|entry| {
            let key = entry.key();
            let body = config
                .migrations
                .get(&key)
                .ok_or_else(|| MigrationError::MissingMigration {
                    tag: entry.tag.clone(),
                    key: key.clone(),
                })?;

            Ok(MigrationMeta {
                tag: entry.tag.clone(),
                sql: split_statements(body, entry.breakpoints),
                folder_millis: entry.when,
                hash: hash_sql(body),
                breakpoints: entry.breakpoints,
            })
        })
        .collect()
}

pub fn split_statements(body: &str, breakpoints: bool) -> Vec<String> {
    if !breakpoints {
        let trimmed = body.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    body.split(STATEMENT_BREAKPOINT)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn hash_sql(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(idx: u32, when: i64) -> MigrationEntry {
        MigrationEntry {
            idx,
            version: "6".into(),
            when,
            tag: format!("{:04}_test", idx),
            breakpoints: true,
        }
    }

    #[test]
    fn test_split_on_breakpoints() {
        let sql = "CREATE TABLE a (id text);\n--> statement-breakpoint\nCREATE TABLE b (id text);\n";
        let statements = split_statements(sql, true);
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id text);", "CREATE TABLE b (id text);"]
        );
    }

    #[test]
    fn test_no_split_without_breakpoints() {
        let sql = "CREATE TABLE a (id text);\n--> statement-breakpoint\nCREATE TABLE b (id text);";
        assert_eq!(split_statements(sql, false).len(), 1);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = hash_sql("CREATE TABLE a (id text);");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_sql("CREATE TABLE a (id text);"));
    }

    #[test]
    fn test_validate_rejects_gaps() {
        let journal = MigrationJournal {
            entries: vec![entry(0, 1), entry(2, 2)],
            ..MigrationJournal::empty()
        };
        assert!(matches!(
            journal.validate(),
            Err(MigrationError::InvalidJournal(_))
        ));
    }

    #[test]
    fn test_validate_rejects_time_going_backwards() {
        let journal = MigrationJournal {
            entries: vec![entry(0, 10), entry(1, 5)],
            ..MigrationJournal::empty()
        };
        assert!(journal.validate().is_err());
    }

    #[test]
    fn test_missing_body_is_fatal() {
        let journal = MigrationJournal {
            entries: vec![entry(0, 1), entry(1, 2)],
            ..MigrationJournal::empty()
        };
        let mut migrations = BTreeMap::new();
        migrations.insert("m0000".to_string(), "CREATE TABLE a (id text);".to_string());

        let err = read_migration_files(&MigrationConfig::new(journal, migrations)).unwrap_err();
        match err {
            MigrationError::MissingMigration { key, .. } => assert_eq!(key, "m0001"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bundled_journal_resolves() {
        let config = MigrationConfig::bundled().unwrap();
        let metas = read_migration_files(&config).unwrap();
        assert_eq!(metas.len(), 3);
        assert_eq!(metas[0].tag, "0000_initial");
        assert!(metas[0].sql.len() > 1);
        assert!(metas.windows(2).all(|w| w[0].folder_millis <= w[1].folder_millis));
    }
}
