//! Owner-scoped CRUD shared by every protocol component.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

use crate::auth::AccountSession;
use crate::error::ApiError;
use crate::models::{
    new_id, CreateDiet, CreateHormonalProtocol, CreateMeal, CreateTrain, Diet, DietDetails, Exercise, ExerciseDetails,
    ExercisePayload, ExtraCompound, ExtraCompoundPayload, Food, FoodPayload, HormonalProtocol, HormonalProtocolDetails,
    Hormone, HormonePayload, Meal, MealDetails, Train, TrainDetails, UpdateDiet, UpdateExercise, UpdateExtraCompound,
    UpdateFood, UpdateHormonalProtocol, UpdateHormone, UpdateMeal, UpdateTrain, WorkoutSet,
};
use crate::services::assembly::Assembly;
use crate::services::graph;
use crate::store::{self, Entity, Filter, Page, Relation, Store, StoreError};

/// An entity exposed through the generic CRUD routes.
#[async_trait]
pub trait CrudResource: Entity + Clone + 'static {
    /// Name used in messages, e.g. "Diet not found".
    const LABEL: &'static str;

    type Create: DeserializeOwned + JsonSchema + Send + 'static;
    /// Serializes to exactly the columns it changes.
    type Update: Serialize + DeserializeOwned + JsonSchema + Send + Sync + 'static;
    type View: Serialize + Send + 'static;

    fn owner(&self) -> &str;

    async fn create(assembly: &mut Assembly<'_>, payload: Self::Create) -> Result<Self, ApiError>;

    /// Applies the relation changes an update carries.
    async fn after_update(_assembly: &mut Assembly<'_>, _id: &str, _payload: Self::Update) -> Result<(), ApiError> {
        Ok(())
    }

    async fn view(store: &dyn Store, entity: Self) -> Result<Self::View, StoreError>;
}

#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn Store>,
}

impl ResourceService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list<T: CrudResource>(&self, session: &AccountSession, page: Page) -> Result<Vec<T::View>, ApiError> {
        let filters = [Filter::equals("accountId", session.account_id.as_str())];
        let entities = store::list::<T, _>(self.store.as_ref(), &filters, page).await?;

        Ok(try_join_all(entities.into_iter().map(|entity| T::view(self.store.as_ref(), entity))).await?)
    }

    pub async fn get<T: CrudResource>(&self, session: &AccountSession, id: &str) -> Result<T::View, ApiError> {
        let entity = store::find::<T, _>(self.store.as_ref(), id)
            .await?
            .filter(|entity| entity.owner() == session.account_id)
            .ok_or(ApiError::NotFound(T::LABEL))?;

        Ok(T::view(self.store.as_ref(), entity).await?)
    }

    pub async fn create<T: CrudResource>(&self, session: &AccountSession, payload: T::Create) -> Result<T::View, ApiError> {
        let owner = session.account_id.clone();

        let entity = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut assembly = Assembly::new(tx, &owner);
                T::create(&mut assembly, payload).await
            })
        })
        .await?;

        tracing::info!(resource = T::LABEL, id = %entity.id(), "resource created");

        Ok(T::view(self.store.as_ref(), entity).await?)
    }

    pub async fn update<T: CrudResource>(
        &self,
        session: &AccountSession,
        id: &str,
        payload: T::Update,
    ) -> Result<T::View, ApiError> {
        let owner = session.account_id.clone();
        let id = id.to_string();

        let entity = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut assembly = Assembly::new(tx, &owner);
                owned::<T>(&mut assembly, &id).await?;

                let mut changes = store::to_row(&payload)?;
                changes.insert("updatedAt".to_string(), json!(assembly.now()));
                let row = assembly
                    .tx()
                    .update(T::TABLE, &id, changes)
                    .await?
                    .ok_or(ApiError::NotFound(T::LABEL))?;

                T::after_update(&mut assembly, &id, payload).await?;

                Ok::<_, ApiError>(store::from_row::<T>(row)?)
            })
        })
        .await?;

        tracing::info!(resource = T::LABEL, id = %entity.id(), "resource updated");

        Ok(T::view(self.store.as_ref(), entity).await?)
    }

    pub async fn delete<T: CrudResource>(&self, session: &AccountSession, id: &str) -> Result<(), ApiError> {
        let owner = session.account_id.clone();
        let id = id.to_string();

        store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut assembly = Assembly::new(tx, &owner);
                owned::<T>(&mut assembly, &id).await?;
                assembly.tx().delete(T::TABLE, &id).await?;

                tracing::info!(resource = T::LABEL, id = %id, "resource deleted");
                Ok::<_, ApiError>(())
            })
        })
        .await
    }
}

async fn owned<T: CrudResource>(assembly: &mut Assembly<'_>, id: &str) -> Result<T, ApiError> {
    let owner = assembly.owner().to_string();

    store::find_in::<T>(assembly.tx(), id)
        .await?
        .filter(|entity| entity.owner() == owner)
        .ok_or(ApiError::NotFound(T::LABEL))
}

/// Connects owned children on create, replaces the whole set on update.
async fn connect(
    assembly: &mut Assembly<'_>,
    relation: Relation,
    parent_id: &str,
    child_ids: &[String],
    label: &'static str,
) -> Result<(), ApiError> {
    assembly.ensure_owned(relation.child(), child_ids, label).await?;
    assembly.relink(relation, parent_id, child_ids).await
}

#[async_trait]
impl CrudResource for Diet {
    const LABEL: &'static str = "Diet";

    type Create = CreateDiet;
    type Update = UpdateDiet;
    type View = DietDetails;

    fn owner(&self) -> &str {
        &self.account_id
    }

    async fn create(assembly: &mut Assembly<'_>, payload: CreateDiet) -> Result<Self, ApiError> {
        let diet = Diet {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            account_id: assembly.owner().to_string(),
            created_at: assembly.now(),
            updated_at: assembly.now(),
        };
        let diet = store::insert(assembly.tx(), &diet).await?;
        connect(assembly, Relation::DietMeals, &diet.id, &payload.meals, "Meal").await?;

        Ok(diet)
    }

    async fn after_update(assembly: &mut Assembly<'_>, id: &str, payload: UpdateDiet) -> Result<(), ApiError> {
        if let Some(meals) = payload.meals {
            connect(assembly, Relation::DietMeals, id, &meals, "Meal").await?;
        }
        Ok(())
    }

    async fn view(store: &dyn Store, entity: Self) -> Result<DietDetails, StoreError> {
        graph::diet_details(store, entity).await
    }
}

#[async_trait]
impl CrudResource for Meal {
    const LABEL: &'static str = "Meal";

    type Create = CreateMeal;
    type Update = UpdateMeal;
    type View = MealDetails;

    fn owner(&self) -> &str {
        &self.account_id
    }

    async fn create(assembly: &mut Assembly<'_>, payload: CreateMeal) -> Result<Self, ApiError> {
        let meal = Meal {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            meal_type: payload.meal_type,
            account_id: assembly.owner().to_string(),
            created_at: assembly.now(),
            updated_at: assembly.now(),
        };
        let meal = store::insert(assembly.tx(), &meal).await?;
        connect(assembly, Relation::MealFoods, &meal.id, &payload.foods, "Food").await?;

        Ok(meal)
    }

    async fn after_update(assembly: &mut Assembly<'_>, id: &str, payload: UpdateMeal) -> Result<(), ApiError> {
        if let Some(foods) = payload.foods {
            connect(assembly, Relation::MealFoods, id, &foods, "Food").await?;
        }
        Ok(())
    }

    async fn view(store: &dyn Store, entity: Self) -> Result<MealDetails, StoreError> {
        graph::meal_details(store, entity).await
    }
}

#[async_trait]
impl CrudResource for Food {
    const LABEL: &'static str = "Food";

    type Create = FoodPayload;
    type Update = UpdateFood;
    type View = Food;

    fn owner(&self) -> &str {
        &self.account_id
    }

    async fn create(assembly: &mut Assembly<'_>, payload: FoodPayload) -> Result<Self, ApiError> {
        assembly.food(payload).await
    }

    async fn view(_store: &dyn Store, entity: Self) -> Result<Food, StoreError> {
        Ok(entity)
    }
}

#[async_trait]
impl CrudResource for Train {
    const LABEL: &'static str = "Train";

    type Create = CreateTrain;
    type Update = UpdateTrain;
    type View = TrainDetails;

    fn owner(&self) -> &str {
        &self.account_id
    }

    async fn create(assembly: &mut Assembly<'_>, payload: CreateTrain) -> Result<Self, ApiError> {
        let train = Train {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            week_days: payload.week_days,
            account_id: assembly.owner().to_string(),
            created_at: assembly.now(),
            updated_at: assembly.now(),
        };
        let train = store::insert(assembly.tx(), &train).await?;
        connect(assembly, Relation::TrainExercises, &train.id, &payload.exercises, "Exercise").await?;

        Ok(train)
    }

    async fn after_update(assembly: &mut Assembly<'_>, id: &str, payload: UpdateTrain) -> Result<(), ApiError> {
        if let Some(exercises) = payload.exercises {
            connect(assembly, Relation::TrainExercises, id, &exercises, "Exercise").await?;
        }
        Ok(())
    }

    async fn view(store: &dyn Store, entity: Self) -> Result<TrainDetails, StoreError> {
        graph::train_details(store, entity).await
    }
}

#[async_trait]
impl CrudResource for Exercise {
    const LABEL: &'static str = "Exercise";

    type Create = ExercisePayload;
    type Update = UpdateExercise;
    type View = ExerciseDetails;

    fn owner(&self) -> &str {
        &self.account_id
    }

    async fn create(assembly: &mut Assembly<'_>, payload: ExercisePayload) -> Result<Self, ApiError> {
        Ok(assembly.exercise(payload).await?.exercise)
    }

    /// New sets replace the old ones; their reps go with them.
    async fn after_update(assembly: &mut Assembly<'_>, id: &str, payload: UpdateExercise) -> Result<(), ApiError> {
        if let Some(sets) = payload.sets {
            assembly
                .tx()
                .delete_where(WorkoutSet::TABLE, &[Filter::equals("exerciseId", id)])
                .await?;
            assembly.sets(id, sets).await?;
        }
        Ok(())
    }

    async fn view(store: &dyn Store, entity: Self) -> Result<ExerciseDetails, StoreError> {
        graph::exercise_details(store, entity).await
    }
}

#[async_trait]
impl CrudResource for HormonalProtocol {
    const LABEL: &'static str = "HormonalProtocol";

    type Create = CreateHormonalProtocol;
    type Update = UpdateHormonalProtocol;
    type View = HormonalProtocolDetails;

    fn owner(&self) -> &str {
        &self.account_id
    }

    async fn create(assembly: &mut Assembly<'_>, payload: CreateHormonalProtocol) -> Result<Self, ApiError> {
        let hormonal_protocol = HormonalProtocol {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            account_id: assembly.owner().to_string(),
            created_at: assembly.now(),
            updated_at: assembly.now(),
        };
        let hormonal_protocol = store::insert(assembly.tx(), &hormonal_protocol).await?;
        connect(
            assembly,
            Relation::HormonalProtocolHormones,
            &hormonal_protocol.id,
            &payload.hormones,
            "Hormone",
        )
        .await?;

        Ok(hormonal_protocol)
    }

    async fn after_update(
        assembly: &mut Assembly<'_>,
        id: &str,
        payload: UpdateHormonalProtocol,
    ) -> Result<(), ApiError> {
        if let Some(hormones) = payload.hormones {
            connect(assembly, Relation::HormonalProtocolHormones, id, &hormones, "Hormone").await?;
        }
        Ok(())
    }

    async fn view(store: &dyn Store, entity: Self) -> Result<HormonalProtocolDetails, StoreError> {
        graph::hormonal_protocol_details(store, entity).await
    }
}

#[async_trait]
impl CrudResource for Hormone {
    const LABEL: &'static str = "Hormone";

    type Create = HormonePayload;
    type Update = UpdateHormone;
    type View = Hormone;

    fn owner(&self) -> &str {
        &self.account_id
    }

    async fn create(assembly: &mut Assembly<'_>, payload: HormonePayload) -> Result<Self, ApiError> {
        assembly.hormone(payload).await
    }

    async fn view(_store: &dyn Store, entity: Self) -> Result<Hormone, StoreError> {
        Ok(entity)
    }
}

#[async_trait]
impl CrudResource for ExtraCompound {
    const LABEL: &'static str = "ExtraCompound";

    type Create = ExtraCompoundPayload;
    type Update = UpdateExtraCompound;
    type View = ExtraCompound;

    fn owner(&self) -> &str {
        &self.account_id
    }

    async fn create(assembly: &mut Assembly<'_>, payload: ExtraCompoundPayload) -> Result<Self, ApiError> {
        assembly.extra_compound(payload).await
    }

    async fn view(_store: &dyn Store, entity: Self) -> Result<ExtraCompound, StoreError> {
        Ok(entity)
    }
}
