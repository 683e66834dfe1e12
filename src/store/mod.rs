//! Persistence abstraction.
//!
//! Entities are persisted as flat JSON rows (camelCase keys) addressed by a
//! [`Table`]. Many-to-many associations are ordered link sets addressed by a
//! [`Relation`]. Every write happens inside a [`Transaction`], and a
//! transaction that is dropped without `commit` is rolled back.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::{Fault, MemoryStore};
pub use postgres::PgStore;

/// A persisted record keyed by camelCase field name.
pub type Row = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("foreign key violation: {0}")]
    ForeignKey(String),
    #[error("unique constraint violation: {0}")]
    UniqueViolation(String),
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("unknown column {column} on {table}")]
    UnknownColumn { table: &'static str, column: String },
    #[error("row mapping error: {0}")]
    Mapping(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// What happens to referencing rows when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Restrict,
    Cascade,
    SetNull,
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: Table,
    pub on_delete: OnDelete,
}

const fn fk(column: &'static str, references: Table, on_delete: OnDelete) -> ForeignKey {
    ForeignKey {
        column,
        references,
        on_delete,
    }
}

const OWNER: ForeignKey = fk("accountId", Table::Accounts, OnDelete::Restrict);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Accounts,
    Plans,
    Subscriptions,
    Notifications,
    Protocols,
    Diets,
    Meals,
    Foods,
    Trains,
    Exercises,
    WorkoutSets,
    Reps,
    HormonalProtocols,
    Hormones,
    ExtraCompounds,
}

impl Table {
    pub const ALL: [Table; 15] = [
        Table::Accounts,
        Table::Plans,
        Table::Subscriptions,
        Table::Notifications,
        Table::Protocols,
        Table::Diets,
        Table::Meals,
        Table::Foods,
        Table::Trains,
        Table::Exercises,
        Table::WorkoutSets,
        Table::Reps,
        Table::HormonalProtocols,
        Table::Hormones,
        Table::ExtraCompounds,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Accounts => "accounts",
            Table::Plans => "plans",
            Table::Subscriptions => "subscriptions",
            Table::Notifications => "notifications",
            Table::Protocols => "protocols",
            Table::Diets => "diets",
            Table::Meals => "meals",
            Table::Foods => "foods",
            Table::Trains => "trains",
            Table::Exercises => "exercises",
            Table::WorkoutSets => "workout_sets",
            Table::Reps => "reps",
            Table::HormonalProtocols => "hormonal_protocols",
            Table::Hormones => "hormones",
            Table::ExtraCompounds => "extra_compounds",
        }
    }

    /// Persisted fields, camelCase.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Accounts => &[
                "id",
                "name",
                "email",
                "passwordHash",
                "accountType",
                "coachId",
                "accountImageUrl",
                "createdAt",
                "updatedAt",
            ],
            Table::Plans => &["id", "name", "price", "duration", "accountId", "createdAt", "updatedAt"],
            Table::Subscriptions => &[
                "id",
                "planId",
                "accountId",
                "active",
                "activatedAt",
                "createdAt",
                "updatedAt",
            ],
            Table::Notifications => &[
                "id",
                "accountId",
                "title",
                "message",
                "read",
                "createdAt",
                "updatedAt",
            ],
            Table::Protocols => &[
                "id",
                "name",
                "description",
                "accountId",
                "clientId",
                "createdAt",
                "updatedAt",
            ],
            Table::Diets | Table::HormonalProtocols => {
                &["id", "name", "description", "accountId", "createdAt", "updatedAt"]
            }
            Table::Meals => &[
                "id",
                "name",
                "description",
                "mealType",
                "accountId",
                "createdAt",
                "updatedAt",
            ],
            Table::Foods => &[
                "id",
                "name",
                "description",
                "quantity",
                "unit",
                "calories",
                "proteins",
                "carbs",
                "fats",
                "accountId",
                "createdAt",
                "updatedAt",
            ],
            Table::Trains => &[
                "id",
                "name",
                "description",
                "weekDays",
                "accountId",
                "createdAt",
                "updatedAt",
            ],
            Table::Exercises => &[
                "id",
                "name",
                "description",
                "type",
                "muscleGroup",
                "equipment",
                "accountId",
                "createdAt",
                "updatedAt",
            ],
            Table::WorkoutSets => &["id", "exerciseId", "position", "createdAt", "updatedAt"],
            Table::Reps => &[
                "id",
                "setId",
                "position",
                "quantity",
                "weight",
                "setType",
                "createdAt",
                "updatedAt",
            ],
            Table::Hormones => &[
                "id",
                "name",
                "description",
                "quantity",
                "unit",
                "concentration",
                "concentrationUnit",
                "hormoneType",
                "accountId",
                "createdAt",
                "updatedAt",
            ],
            Table::ExtraCompounds => &[
                "id",
                "name",
                "description",
                "quantity",
                "unit",
                "concentration",
                "concentrationUnit",
                "accountId",
                "createdAt",
                "updatedAt",
            ],
        }
    }

    pub fn has_column(self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    pub fn foreign_keys(self) -> &'static [ForeignKey] {
        const PLAN_FKS: [ForeignKey; 1] = [fk("accountId", Table::Accounts, OnDelete::SetNull)];
        const SUBSCRIPTION_FKS: [ForeignKey; 2] = [
            fk("planId", Table::Plans, OnDelete::Restrict),
            fk("accountId", Table::Accounts, OnDelete::SetNull),
        ];
        const ACCOUNT_FKS: [ForeignKey; 1] = [fk("coachId", Table::Accounts, OnDelete::SetNull)];
        const PROTOCOL_FKS: [ForeignKey; 2] = [OWNER, fk("clientId", Table::Accounts, OnDelete::Restrict)];
        const OWNED: [ForeignKey; 1] = [OWNER];
        const SET_FKS: [ForeignKey; 1] = [fk("exerciseId", Table::Exercises, OnDelete::Cascade)];
        const REP_FKS: [ForeignKey; 1] = [fk("setId", Table::WorkoutSets, OnDelete::Cascade)];

        match self {
            Table::Accounts => &ACCOUNT_FKS,
            Table::Plans => &PLAN_FKS,
            Table::Subscriptions => &SUBSCRIPTION_FKS,
            Table::Protocols => &PROTOCOL_FKS,
            Table::WorkoutSets => &SET_FKS,
            Table::Reps => &REP_FKS,
            Table::Notifications
            | Table::Diets
            | Table::Meals
            | Table::Foods
            | Table::Trains
            | Table::Exercises
            | Table::HormonalProtocols
            | Table::Hormones
            | Table::ExtraCompounds => &OWNED,
        }
    }

    /// Columns with a uniqueness constraint.
    pub fn unique_columns(self) -> &'static [&'static str] {
        match self {
            Table::Accounts => &["email"],
            _ => &[],
        }
    }

    /// Column that defines natural read order.
    pub fn order_column(self) -> &'static str {
        match self {
            Table::WorkoutSets | Table::Reps => "position",
            _ => "createdAt",
        }
    }
}

/// Many-to-many link sets between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    ProtocolDiets,
    ProtocolTrains,
    ProtocolHormonalProtocols,
    ProtocolExtraCompounds,
    DietMeals,
    MealFoods,
    TrainExercises,
    HormonalProtocolHormones,
}

impl Relation {
    pub const ALL: [Relation; 8] = [
        Relation::ProtocolDiets,
        Relation::ProtocolTrains,
        Relation::ProtocolHormonalProtocols,
        Relation::ProtocolExtraCompounds,
        Relation::DietMeals,
        Relation::MealFoods,
        Relation::TrainExercises,
        Relation::HormonalProtocolHormones,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Relation::ProtocolDiets => "protocol_diets",
            Relation::ProtocolTrains => "protocol_trains",
            Relation::ProtocolHormonalProtocols => "protocol_hormonal_protocols",
            Relation::ProtocolExtraCompounds => "protocol_extra_compounds",
            Relation::DietMeals => "diet_meals",
            Relation::MealFoods => "meal_foods",
            Relation::TrainExercises => "train_exercises",
            Relation::HormonalProtocolHormones => "hormonal_protocol_hormones",
        }
    }

    pub fn parent(self) -> Table {
        match self {
            Relation::ProtocolDiets
            | Relation::ProtocolTrains
            | Relation::ProtocolHormonalProtocols
            | Relation::ProtocolExtraCompounds => Table::Protocols,
            Relation::DietMeals => Table::Diets,
            Relation::MealFoods => Table::Meals,
            Relation::TrainExercises => Table::Trains,
            Relation::HormonalProtocolHormones => Table::HormonalProtocols,
        }
    }

    pub fn child(self) -> Table {
        match self {
            Relation::ProtocolDiets => Table::Diets,
            Relation::ProtocolTrains => Table::Trains,
            Relation::ProtocolHormonalProtocols => Table::HormonalProtocols,
            Relation::ProtocolExtraCompounds => Table::ExtraCompounds,
            Relation::DietMeals => Table::Meals,
            Relation::MealFoods => Table::Foods,
            Relation::TrainExercises => Table::Exercises,
            Relation::HormonalProtocolHormones => Table::Hormones,
        }
    }
}

/// Equality filter on one column. A `null` value matches missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub value: Value,
}

impl Filter {
    pub fn equals(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

/// Offset window for list reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    pub take: u64,
}

impl Page {
    pub fn all() -> Self {
        Self {
            skip: 0,
            take: i64::MAX as u64,
        }
    }
}

/// Read operations shared by the store and its transactions.
#[async_trait]
pub trait Reader: Send + Sync {
    async fn fetch(&self, table: Table, id: &str) -> Result<Option<Row>, StoreError>;

    async fn fetch_all(&self, table: Table, filters: &[Filter], page: Page) -> Result<Vec<Row>, StoreError>;

    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError>;

    /// Child ids linked to `parent_id`, in link order.
    async fn linked(&self, relation: Relation, parent_id: &str) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait Store: Reader {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}

/// A unit of work. Implementations roll back when dropped uncommitted.
#[async_trait]
pub trait Transaction: Send {
    async fn insert(&mut self, table: Table, row: Row) -> Result<Row, StoreError>;

    /// Applies `changes` to the row with `id`; `None` if it does not exist.
    async fn update(&mut self, table: Table, id: &str, changes: Row) -> Result<Option<Row>, StoreError>;

    /// Like [`Transaction::update`], but only while the row still matches
    /// `filters`; `None` otherwise. A concurrent writer that changes the row
    /// first makes this a no-op or fails the commit with [`StoreError::Conflict`].
    async fn update_where(
        &mut self,
        table: Table,
        id: &str,
        filters: &[Filter],
        changes: Row,
    ) -> Result<Option<Row>, StoreError>;

    async fn delete(&mut self, table: Table, id: &str) -> Result<bool, StoreError>;

    async fn delete_where(&mut self, table: Table, filters: &[Filter]) -> Result<u64, StoreError>;

    async fn fetch(&mut self, table: Table, id: &str) -> Result<Option<Row>, StoreError>;

    async fn fetch_all(&mut self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, StoreError>;

    /// Appends `child_ids` to the link set of `parent_id`, skipping existing links.
    async fn link(&mut self, relation: Relation, parent_id: &str, child_ids: &[String]) -> Result<(), StoreError>;

    async fn unlink_all(&mut self, relation: Relation, parent_id: &str) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Runs `work` inside one transaction: commit on `Ok`, rollback on `Err`.
///
/// The transaction is released exactly once on every path. A cancelled
/// future drops the transaction, which rolls it back.
pub async fn in_transaction<T, E, F>(store: &dyn Store, work: F) -> Result<T, E>
where
    F: for<'t> FnOnce(&'t mut dyn Transaction) -> BoxFuture<'t, Result<T, E>> + Send,
    T: Send,
    E: From<StoreError> + Send,
{
    let mut tx = store.begin().await?;

    match work(tx.as_mut()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}

/// A typed record persisted in one [`Table`].
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: Table;

    fn id(&self) -> &str;
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::Mapping(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        )))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Inserts a typed entity and returns it as stored.
pub async fn insert<T: Entity>(tx: &mut dyn Transaction, entity: &T) -> Result<T, StoreError> {
    let row = tx.insert(T::TABLE, to_row(entity)?).await?;
    from_row(row)
}

pub async fn find<T: Entity, R: Reader + ?Sized>(reader: &R, id: &str) -> Result<Option<T>, StoreError> {
    reader.fetch(T::TABLE, id).await?.map(from_row).transpose()
}

pub async fn find_in<T: Entity>(tx: &mut dyn Transaction, id: &str) -> Result<Option<T>, StoreError> {
    tx.fetch(T::TABLE, id).await?.map(from_row).transpose()
}

pub async fn list<T: Entity, R: Reader + ?Sized>(reader: &R, filters: &[Filter], page: Page) -> Result<Vec<T>, StoreError> {
    reader
        .fetch_all(T::TABLE, filters, page)
        .await?
        .into_iter()
        .map(from_row)
        .collect()
}

pub async fn list_in<T: Entity>(tx: &mut dyn Transaction, filters: &[Filter]) -> Result<Vec<T>, StoreError> {
    tx.fetch_all(T::TABLE, filters)
        .await?
        .into_iter()
        .map(from_row)
        .collect()
}

/// Loads the entities linked to `parent_id`, in link order.
pub async fn linked<T: Entity, R: Reader + ?Sized>(
    reader: &R,
    relation: Relation,
    parent_id: &str,
) -> Result<Vec<T>, StoreError> {
    let ids = reader.linked(relation, parent_id).await?;
    let rows = futures::future::try_join_all(ids.iter().map(|id| reader.fetch(T::TABLE, id))).await?;

    rows.into_iter().flatten().map(from_row).collect()
}
