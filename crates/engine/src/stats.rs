//! Live table statistics

use fleetvault_core::restore_order;
use fleetvault_storage::Store;
use serde::Serialize;

use crate::error::EngineResult;

/// Row count of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    /// Entity type name
    pub entity: &'static str,
    /// Rows currently stored
    pub rows: u64,
}

/// Row counts of every entity type, in restore order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Per entity type
    pub tables: Vec<TableCount>,
    /// Sum over all entity types
    pub total: u64,
}

impl TableStats {
    /// Rows of one entity type
    pub fn rows(&self, entity: &str) -> Option<u64> {
        self.tables.iter().find(|t| t.entity == entity).map(|t| t.rows)
    }

    /// Two-column text table with a total line
    pub fn render_table(&self) -> String {
        let width = self
            .tables
            .iter()
            .map(|t| t.entity.len())
            .max()
            .unwrap_or(0)
            .max("entity".len());
        let mut out = format!("{:<width$}  {:>8}\n", "entity", "rows");
        for table in &self.tables {
            out.push_str(&format!("{:<width$}  {:>8}\n", table.entity, table.rows));
        }
        out.push_str(&format!("{:<width$}  {:>8}\n", "total", self.total));
        out
    }
}

/// Count the rows of every entity type in one read-only session
pub fn table_stats(store: &dyn Store) -> EngineResult<TableStats> {
    let mut session = store.begin()?;
    let mut stats = TableStats::default();
    for entity in restore_order()?.iter().copied() {
        let rows = session.count(entity)?;
        stats.total += rows;
        stats.tables.push(TableCount {
            entity: entity.name,
            rows,
        });
    }
    session.rollback()?;
    Ok(stats)
}
