//! The ordered migration list.
//!
//! Migrations are SQL scripts in the canonical dialect, embedded at compile
//! time. Version numbers only record presence or absence — gaps are legal
//! and stay legal (a withdrawn migration keeps its number retired).

use crate::error::MigrateError;

/// One schema migration: a version and the script that produces it.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Schema version this script establishes. Applied at most once per
    /// store, ever.
    pub version: i64,
    /// Canonical-dialect SQL, replayable under schema-mode tolerance.
    pub script: &'static str,
}

/// An ordered, gap-tolerant list of migrations.
#[derive(Debug, Clone)]
pub struct Registry {
    migrations: Vec<Migration>,
}

impl Registry {
    /// Builds a registry, validating that versions are non-negative and
    /// strictly ascending.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Registry` on a negative, duplicate, or
    /// out-of-order version.
    pub fn new(migrations: Vec<Migration>) -> Result<Self, MigrateError> {
        let mut previous: Option<i64> = None;
        for migration in &migrations {
            if migration.version < 0 {
                return Err(MigrateError::Registry(format!(
                    "version {} is negative; negative versions are reserved markers",
                    migration.version
                )));
            }
            if let Some(prev) = previous {
                if migration.version <= prev {
                    return Err(MigrateError::Registry(format!(
                        "version {} does not ascend past {}",
                        migration.version, prev
                    )));
                }
            }
            previous = Some(migration.version);
        }
        Ok(Self { migrations })
    }

    /// The Lectern application schema.
    pub fn builtin() -> Self {
        // 004 (cohort sharing) was withdrawn before release; its number
        // stays retired.
        Self {
            migrations: vec![
                Migration {
                    version: 1,
                    script: include_str!("migrations/001_base.sql"),
                },
                Migration {
                    version: 2,
                    script: include_str!("migrations/002_review.sql"),
                },
                Migration {
                    version: 3,
                    script: include_str!("migrations/003_gamification.sql"),
                },
                Migration {
                    version: 5,
                    script: include_str!("migrations/005_billing.sql"),
                },
            ],
        }
    }

    /// Migrations in ascending version order.
    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter()
    }

    /// The base-schema migration — the lowest version, which every later
    /// script builds on.
    pub fn base(&self) -> Option<&Migration> {
        self.migrations.first()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_valid() {
        let registry = Registry::builtin();
        Registry::new(registry.migrations.clone()).expect("built-in registry should validate");
        assert_eq!(registry.base().expect("should have a base").version, 1);
    }

    #[test]
    fn gaps_are_legal() {
        let registry = Registry::new(vec![
            Migration { version: 1, script: "SELECT 1" },
            Migration { version: 5, script: "SELECT 1" },
            Migration { version: 7, script: "SELECT 1" },
        ])
        .expect("gaps should validate");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = Registry::new(vec![
            Migration { version: 2, script: "SELECT 1" },
            Migration { version: 2, script: "SELECT 1" },
        ])
        .expect_err("duplicate versions should fail");
        assert!(matches!(err, MigrateError::Registry(_)));
    }

    #[test]
    fn descending_order_is_rejected() {
        let err = Registry::new(vec![
            Migration { version: 3, script: "SELECT 1" },
            Migration { version: 1, script: "SELECT 1" },
        ])
        .expect_err("descending versions should fail");
        assert!(matches!(err, MigrateError::Registry(_)));
    }

    #[test]
    fn negative_versions_are_rejected() {
        let err = Registry::new(vec![Migration { version: -1, script: "SELECT 1" }])
            .expect_err("reserved versions should fail");
        assert!(matches!(err, MigrateError::Registry(_)));
    }
}
