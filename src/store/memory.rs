//! In-process [`Store`] used by tests and local runs without PostgreSQL.
//!
//! Each transaction works on a private copy of the tables and records a
//! journal of its writes; `commit` replays the journal against the shared
//! state under a write lock, so concurrent transactions serialize at commit.
//! Foreign keys, unique columns and delete actions mirror the SQL schema.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use super::{Filter, OnDelete, Page, Reader, Relation, Row, Store, StoreError, Table, Transaction};

/// A one-shot failure injected into the next matching store operation.
#[derive(Debug, Clone)]
pub struct Fault {
    point: FaultPoint,
    skip: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultPoint {
    Insert(Table),
    Link(Relation),
    Commit,
}

impl Fault {
    pub fn insert_into(table: Table) -> Self {
        Self {
            point: FaultPoint::Insert(table),
            skip: 0,
        }
    }

    pub fn link(relation: Relation) -> Self {
        Self {
            point: FaultPoint::Link(relation),
            skip: 0,
        }
    }

    pub fn commit() -> Self {
        Self {
            point: FaultPoint::Commit,
            skip: 0,
        }
    }

    /// Let `successes` matching operations through before failing.
    pub fn after(mut self, successes: usize) -> Self {
        self.skip = successes;
        self
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<Table, Vec<Row>>,
    links: HashMap<Relation, Vec<(String, String)>>,
}

#[derive(Debug, Clone)]
enum Op {
    Insert(Table, Row),
    Update(Table, String, Row),
    UpdateWhere(Table, String, Vec<Filter>, Row),
    Delete(Table, String),
    DeleteWhere(Table, Vec<Filter>),
    Link(Relation, String, Vec<String>),
    UnlinkAll(Relation, String),
}

enum Outcome {
    Row(Option<Row>),
    Count(u64),
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|filter| row.get(filter.column).unwrap_or(&Value::Null) == &filter.value)
}

fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn check_columns(table: Table, row: &Row) -> Result<(), StoreError> {
    match row.keys().find(|key| !table.has_column(key)) {
        Some(column) => Err(StoreError::UnknownColumn {
            table: table.name(),
            column: column.clone(),
        }),
        None => Ok(()),
    }
}

impl Tables {
    fn table(&self, table: Table) -> &[Row] {
        self.rows.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn contains(&self, table: Table, id: &str) -> bool {
        self.table(table).iter().any(|row| row_id(row) == Some(id))
    }

    fn fetch(&self, table: Table, id: &str) -> Option<Row> {
        self.table(table).iter().find(|row| row_id(row) == Some(id)).cloned()
    }

    fn select(&self, table: Table, filters: &[Filter]) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .table(table)
            .iter()
            .filter(|row| matches(row, filters))
            .cloned()
            .collect();

        // Rows are kept in insertion order, which is creation order.
        if table.order_column() == "position" {
            rows.sort_by_key(|row| row.get("position").and_then(Value::as_i64).unwrap_or_default());
        }
        rows
    }

    fn linked(&self, relation: Relation, parent_id: &str) -> Vec<String> {
        self.links
            .get(&relation)
            .map(|links| {
                links
                    .iter()
                    .filter(|(parent, _)| parent == parent_id)
                    .map(|(_, child)| child.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check_constraints(&self, table: Table, row: &Row) -> Result<(), StoreError> {
        for key in table.foreign_keys() {
            if let Some(target) = row.get(key.column).and_then(Value::as_str) {
                if !self.contains(key.references, target) {
                    return Err(StoreError::ForeignKey(format!(
                        "{}.{} references missing {} row {}",
                        table.name(),
                        key.column,
                        key.references.name(),
                        target
                    )));
                }
            }
        }

        let id = row_id(row);
        for column in table.unique_columns() {
            let Some(value) = row.get(*column).filter(|value| !value.is_null()) else {
                continue;
            };
            let duplicate = self
                .table(table)
                .iter()
                .any(|other| row_id(other) != id && other.get(*column) == Some(value));
            if duplicate {
                return Err(StoreError::UniqueViolation(format!("{}.{}", table.name(), column)));
            }
        }

        Ok(())
    }

    fn insert(&mut self, table: Table, mut row: Row) -> Result<Row, StoreError> {
        check_columns(table, &row)?;
        for column in table.columns() {
            row.entry(column.to_string()).or_insert(Value::Null);
        }

        let id = row_id(&row)
            .ok_or_else(|| StoreError::UnknownColumn {
                table: table.name(),
                column: "id".to_string(),
            })?
            .to_string();
        if self.contains(table, &id) {
            return Err(StoreError::UniqueViolation(format!("{}.id {}", table.name(), id)));
        }

        self.check_constraints(table, &row)?;
        self.rows.entry(table).or_default().push(row.clone());
        Ok(row)
    }

    fn update(&mut self, table: Table, id: &str, changes: Row) -> Result<Option<Row>, StoreError> {
        check_columns(table, &changes)?;
        let Some(mut row) = self.fetch(table, id) else {
            return Ok(None);
        };

        for (column, value) in changes {
            if column != "id" {
                row.insert(column, value);
            }
        }
        self.check_constraints(table, &row)?;

        if let Some(slot) = self
            .rows
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(id)))
        {
            *slot = row.clone();
        }
        Ok(Some(row))
    }

    fn delete(&mut self, table: Table, id: &str) -> Result<bool, StoreError> {
        if !self.contains(table, id) {
            return Ok(false);
        }

        for other in Table::ALL {
            for key in other.foreign_keys().iter().filter(|key| key.references == table) {
                let referencing: Vec<String> = self
                    .table(other)
                    .iter()
                    .filter(|row| row.get(key.column).and_then(Value::as_str) == Some(id))
                    .filter_map(|row| row_id(row).map(str::to_string))
                    .filter(|other_id| other != table || other_id != id)
                    .collect();
                if referencing.is_empty() {
                    continue;
                }

                match key.on_delete {
                    OnDelete::Restrict => {
                        return Err(StoreError::ForeignKey(format!(
                            "{} row {} is still referenced by {}.{}",
                            table.name(),
                            id,
                            other.name(),
                            key.column
                        )))
                    }
                    OnDelete::Cascade => {
                        for other_id in referencing {
                            self.delete(other, &other_id)?;
                        }
                    }
                    OnDelete::SetNull => {
                        if let Some(rows) = self.rows.get_mut(&other) {
                            for row in rows
                                .iter_mut()
                                .filter(|row| row.get(key.column).and_then(Value::as_str) == Some(id))
                            {
                                row.insert(key.column.to_string(), Value::Null);
                            }
                        }
                    }
                }
            }
        }

        for relation in Relation::ALL {
            if let Some(links) = self.links.get_mut(&relation) {
                if relation.parent() == table {
                    links.retain(|(parent, _)| parent != id);
                }
                if relation.child() == table {
                    links.retain(|(_, child)| child != id);
                }
            }
        }

        if let Some(rows) = self.rows.get_mut(&table) {
            rows.retain(|row| row_id(row) != Some(id));
        }
        Ok(true)
    }

    fn link(&mut self, relation: Relation, parent_id: &str, child_ids: &[String]) -> Result<(), StoreError> {
        if !self.contains(relation.parent(), parent_id) {
            return Err(StoreError::ForeignKey(format!(
                "{} parent {} does not exist",
                relation.name(),
                parent_id
            )));
        }
        if let Some(missing) = child_ids.iter().find(|id| !self.contains(relation.child(), id)) {
            return Err(StoreError::ForeignKey(format!(
                "{} child {} does not exist",
                relation.name(),
                missing
            )));
        }

        let links = self.links.entry(relation).or_default();
        for child in child_ids {
            if !links.iter().any(|(parent, existing)| parent == parent_id && existing == child) {
                links.push((parent_id.to_string(), child.clone()));
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: &Op) -> Result<Outcome, StoreError> {
        match op {
            Op::Insert(table, row) => self.insert(*table, row.clone()).map(|row| Outcome::Row(Some(row))),
            Op::Update(table, id, changes) => self.update(*table, id, changes.clone()).map(Outcome::Row),
            Op::UpdateWhere(table, id, filters, changes) => match self.fetch(*table, id) {
                Some(row) if matches(&row, filters) => self.update(*table, id, changes.clone()).map(Outcome::Row),
                _ => Ok(Outcome::Row(None)),
            },
            Op::Delete(table, id) => self.delete(*table, id).map(|deleted| Outcome::Count(deleted as u64)),
            Op::DeleteWhere(table, filters) => {
                let ids: Vec<String> = self
                    .select(*table, filters)
                    .iter()
                    .filter_map(|row| row_id(row).map(str::to_string))
                    .collect();
                let mut deleted = 0;
                for id in ids {
                    if self.delete(*table, &id)? {
                        deleted += 1;
                    }
                }
                Ok(Outcome::Count(deleted))
            }
            Op::Link(relation, parent_id, child_ids) => self
                .link(*relation, parent_id, child_ids)
                .map(|_| Outcome::Count(child_ids.len() as u64)),
            Op::UnlinkAll(relation, parent_id) => {
                let links = self.links.entry(*relation).or_default();
                let before = links.len();
                links.retain(|(parent, _)| parent != parent_id);
                Ok(Outcome::Count((before - links.len()) as u64))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<Tables>>,
    faults: Arc<Mutex<Vec<Fault>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a fault for the next matching operation.
    pub async fn inject(&self, fault: Fault) {
        self.faults.lock().await.push(fault);
    }

    /// Inserts a row in its own committed transaction.
    pub async fn seed(&self, table: Table, row: Row) -> Result<Row, StoreError> {
        let mut tx = self.begin().await?;
        let row = tx.insert(table, row).await?;
        tx.commit().await?;
        Ok(row)
    }

    pub async fn row_count(&self, table: Table) -> usize {
        self.state.read().await.table(table).len()
    }

    pub async fn link_count(&self, relation: Relation) -> usize {
        self.state
            .read()
            .await
            .links
            .get(&relation)
            .map(Vec::len)
            .unwrap_or_default()
    }
}

async fn trip(faults: &Mutex<Vec<Fault>>, point: FaultPoint) -> Result<(), StoreError> {
    let mut faults = faults.lock().await;
    let Some(index) = faults.iter().position(|fault| fault.point == point) else {
        return Ok(());
    };

    if faults[index].skip > 0 {
        faults[index].skip -= 1;
        return Ok(());
    }
    faults.remove(index);
    Err(StoreError::Unavailable(format!("injected fault at {point:?}")))
}

#[async_trait]
impl Reader for MemoryStore {
    async fn fetch(&self, table: Table, id: &str) -> Result<Option<Row>, StoreError> {
        Ok(self.state.read().await.fetch(table, id))
    }

    async fn fetch_all(&self, table: Table, filters: &[Filter], page: Page) -> Result<Vec<Row>, StoreError> {
        let rows = self.state.read().await.select(table, filters);
        Ok(rows
            .into_iter()
            .skip(page.skip as usize)
            .take(page.take as usize)
            .collect())
    }

    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
        Ok(self.state.read().await.select(table, filters).len() as u64)
    }

    async fn linked(&self, relation: Relation, parent_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.state.read().await.linked(relation, parent_id))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let working = self.state.read().await.clone();
        Ok(Box::new(MemoryTransaction {
            shared: self.state.clone(),
            faults: self.faults.clone(),
            working,
            journal: Vec::new(),
        }))
    }
}

/// Dropping without `commit` discards the working copy.
pub struct MemoryTransaction {
    shared: Arc<RwLock<Tables>>,
    faults: Arc<Mutex<Vec<Fault>>>,
    working: Tables,
    journal: Vec<Op>,
}

impl MemoryTransaction {
    /// Applies one statement atomically to the working copy and journals it.
    fn stage(&mut self, op: Op) -> Result<Outcome, StoreError> {
        let mut next = self.working.clone();
        let outcome = next.apply(&op)?;
        self.working = next;
        // A conditional update that matched nothing has no effect to replay.
        if !matches!((&op, &outcome), (Op::UpdateWhere(..), Outcome::Row(None))) {
            self.journal.push(op);
        }
        Ok(outcome)
    }

    fn count(outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Count(count) => count,
            Outcome::Row(row) => row.is_some() as u64,
        }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn insert(&mut self, table: Table, row: Row) -> Result<Row, StoreError> {
        trip(&self.faults, FaultPoint::Insert(table)).await?;
        match self.stage(Op::Insert(table, row))? {
            Outcome::Row(Some(row)) => Ok(row),
            _ => Err(StoreError::Unavailable(format!("insert into {} returned no row", table.name()))),
        }
    }

    async fn update(&mut self, table: Table, id: &str, changes: Row) -> Result<Option<Row>, StoreError> {
        match self.stage(Op::Update(table, id.to_string(), changes))? {
            Outcome::Row(row) => Ok(row),
            Outcome::Count(_) => Ok(None),
        }
    }

    async fn update_where(
        &mut self,
        table: Table,
        id: &str,
        filters: &[Filter],
        changes: Row,
    ) -> Result<Option<Row>, StoreError> {
        match self.stage(Op::UpdateWhere(table, id.to_string(), filters.to_vec(), changes))? {
            Outcome::Row(row) => Ok(row),
            Outcome::Count(_) => Ok(None),
        }
    }

    async fn delete(&mut self, table: Table, id: &str) -> Result<bool, StoreError> {
        let outcome = self.stage(Op::Delete(table, id.to_string()))?;
        Ok(Self::count(outcome) > 0)
    }

    async fn delete_where(&mut self, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
        let outcome = self.stage(Op::DeleteWhere(table, filters.to_vec()))?;
        Ok(Self::count(outcome))
    }

    async fn fetch(&mut self, table: Table, id: &str) -> Result<Option<Row>, StoreError> {
        Ok(self.working.fetch(table, id))
    }

    async fn fetch_all(&mut self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        Ok(self.working.select(table, filters))
    }

    async fn link(&mut self, relation: Relation, parent_id: &str, child_ids: &[String]) -> Result<(), StoreError> {
        trip(&self.faults, FaultPoint::Link(relation)).await?;
        self.stage(Op::Link(relation, parent_id.to_string(), child_ids.to_vec()))?;
        Ok(())
    }

    async fn unlink_all(&mut self, relation: Relation, parent_id: &str) -> Result<u64, StoreError> {
        let outcome = self.stage(Op::UnlinkAll(relation, parent_id.to_string()))?;
        Ok(Self::count(outcome))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        trip(&self.faults, FaultPoint::Commit).await?;

        let mut shared = self.shared.write().await;
        let mut next = shared.clone();
        for op in &self.journal {
            let outcome = next.apply(op)?;
            if let (Op::UpdateWhere(table, id, ..), Outcome::Row(None)) = (op, outcome) {
                return Err(StoreError::Conflict(format!("{} {id} was changed by another transaction", table.name())));
            }
        }
        *shared = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
