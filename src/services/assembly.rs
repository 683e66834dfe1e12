//! Creation steps for nested component graphs.
//!
//! An [`Assembly`] borrows one open transaction and stamps every row it
//! creates with the same owner and timestamp. It never commits: the caller
//! that opened the transaction decides the outcome.

use chrono::{DateTime, Utc};

use crate::error::ApiError;
use crate::models::{
    new_id, Account, Diet, DietDetails, DietPayload, Exercise, ExerciseDetails, ExercisePayload, ExtraCompound,
    ExtraCompoundPayload, Food, FoodPayload, FullProtocolRequest, HormonalProtocol, HormonalProtocolDetails,
    HormonalProtocolPayload, Hormone, HormonePayload, Meal, MealDetails, MealPayload, Protocol, ProtocolDetails,
    Rep, SetDetails, SetPayload, Train, TrainDetails, TrainPayload, WorkoutSet,
};
use crate::store::{self, Relation, Table, Transaction};

pub struct Assembly<'t> {
    tx: &'t mut dyn Transaction,
    owner: String,
    now: DateTime<Utc>,
}

impl<'t> Assembly<'t> {
    pub fn new(tx: &'t mut dyn Transaction, owner: &str) -> Self {
        Self {
            tx,
            owner: owner.to_string(),
            now: Utc::now(),
        }
    }

    pub fn tx(&mut self) -> &mut dyn Transaction {
        &mut *self.tx
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Creates the whole protocol graph: diet, trains, hormonal protocol and
    /// extra compounds first, then the protocol row, then its links.
    pub async fn full_protocol(&mut self, request: FullProtocolRequest) -> Result<ProtocolDetails, ApiError> {
        self.ensure_client(&request.client_id).await?;

        let diets = match request.diet {
            Some(diet) => vec![self.diet(diet).await?],
            None => Vec::new(),
        };

        let mut trains = Vec::new();
        for train in request.trains.unwrap_or_default() {
            trains.push(self.train(train).await?);
        }

        let hormonal_protocols = match request.hormonal_protocol {
            Some(hormonal_protocol) => vec![self.hormonal_protocol(hormonal_protocol).await?],
            None => Vec::new(),
        };

        let mut extra_compounds = Vec::new();
        for extra_compound in request.extra_compounds.unwrap_or_default() {
            extra_compounds.push(self.extra_compound(extra_compound).await?);
        }

        let protocol = Protocol {
            id: new_id(),
            name: request.name,
            description: request.description,
            account_id: self.owner.clone(),
            client_id: request.client_id,
            created_at: self.now,
            updated_at: self.now,
        };
        let protocol = store::insert(&mut *self.tx, &protocol).await?;

        let diet_ids: Vec<String> = diets.iter().map(|d| d.diet.id.clone()).collect();
        let train_ids: Vec<String> = trains.iter().map(|t| t.train.id.clone()).collect();
        let hormonal_ids: Vec<String> = hormonal_protocols.iter().map(|h| h.hormonal_protocol.id.clone()).collect();
        let extra_ids: Vec<String> = extra_compounds.iter().map(|e| e.id.clone()).collect();

        self.link(Relation::ProtocolDiets, &protocol.id, &diet_ids).await?;
        self.link(Relation::ProtocolTrains, &protocol.id, &train_ids).await?;
        self.link(Relation::ProtocolHormonalProtocols, &protocol.id, &hormonal_ids).await?;
        self.link(Relation::ProtocolExtraCompounds, &protocol.id, &extra_ids).await?;

        Ok(ProtocolDetails {
            protocol,
            diets,
            trains,
            hormonal_protocols,
            extra_compounds,
        })
    }

    pub async fn ensure_client(&mut self, client_id: &str) -> Result<Account, ApiError> {
        store::find_in::<Account>(&mut *self.tx, client_id)
            .await?
            .ok_or(ApiError::NotFound("Client"))
    }

    pub async fn diet(&mut self, payload: DietPayload) -> Result<DietDetails, ApiError> {
        let diet = Diet {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            account_id: self.owner.clone(),
            created_at: self.now,
            updated_at: self.now,
        };
        let diet = store::insert(&mut *self.tx, &diet).await?;

        let mut meals = Vec::with_capacity(payload.meals.len());
        for meal in payload.meals {
            meals.push(self.meal(meal).await?);
        }

        let meal_ids: Vec<String> = meals.iter().map(|m| m.meal.id.clone()).collect();
        self.link(Relation::DietMeals, &diet.id, &meal_ids).await?;

        Ok(DietDetails { diet, meals })
    }

    pub async fn meal(&mut self, payload: MealPayload) -> Result<MealDetails, ApiError> {
        let meal = Meal {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            meal_type: payload.meal_type,
            account_id: self.owner.clone(),
            created_at: self.now,
            updated_at: self.now,
        };
        let meal = store::insert(&mut *self.tx, &meal).await?;

        let mut foods = Vec::with_capacity(payload.foods.len());
        for food in payload.foods {
            foods.push(self.food(food).await?);
        }

        let food_ids: Vec<String> = foods.iter().map(|f| f.id.clone()).collect();
        self.link(Relation::MealFoods, &meal.id, &food_ids).await?;

        Ok(MealDetails { meal, foods })
    }

    pub async fn food(&mut self, payload: FoodPayload) -> Result<Food, ApiError> {
        let food = Food {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            quantity: payload.quantity,
            unit: payload.unit,
            calories: payload.calories,
            proteins: payload.proteins,
            carbs: payload.carbs,
            fats: payload.fats,
            account_id: self.owner.clone(),
            created_at: self.now,
            updated_at: self.now,
        };

        Ok(store::insert(&mut *self.tx, &food).await?)
    }

    pub async fn train(&mut self, payload: TrainPayload) -> Result<TrainDetails, ApiError> {
        let train = Train {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            week_days: payload.week_days,
            account_id: self.owner.clone(),
            created_at: self.now,
            updated_at: self.now,
        };
        let train = store::insert(&mut *self.tx, &train).await?;

        let mut exercises = Vec::with_capacity(payload.exercises.len());
        for exercise in payload.exercises {
            exercises.push(self.exercise(exercise).await?);
        }

        let exercise_ids: Vec<String> = exercises.iter().map(|e| e.exercise.id.clone()).collect();
        self.link(Relation::TrainExercises, &train.id, &exercise_ids).await?;

        Ok(TrainDetails { train, exercises })
    }

    pub async fn exercise(&mut self, payload: ExercisePayload) -> Result<ExerciseDetails, ApiError> {
        let exercise = Exercise {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            exercise_type: payload.exercise_type,
            muscle_group: payload.muscle_group,
            equipment: payload.equipment,
            account_id: self.owner.clone(),
            created_at: self.now,
            updated_at: self.now,
        };
        let exercise = store::insert(&mut *self.tx, &exercise).await?;
        let sets = self.sets(&exercise.id, payload.sets).await?;

        Ok(ExerciseDetails { exercise, sets })
    }

    /// Sets belong to exactly one exercise; submission order becomes `position`.
    pub async fn sets(&mut self, exercise_id: &str, payload: Vec<SetPayload>) -> Result<Vec<SetDetails>, ApiError> {
        let mut sets = Vec::with_capacity(payload.len());

        for (position, set) in (0..).zip(payload) {
            let workout_set = WorkoutSet {
                id: new_id(),
                exercise_id: exercise_id.to_string(),
                position,
                created_at: self.now,
                updated_at: self.now,
            };
            let workout_set = store::insert(&mut *self.tx, &workout_set).await?;

            let mut reps = Vec::with_capacity(set.reps.len());
            for (position, rep) in (0..).zip(set.reps) {
                let rep = Rep {
                    id: new_id(),
                    set_id: workout_set.id.clone(),
                    position,
                    quantity: rep.quantity,
                    weight: rep.weight,
                    set_type: rep.set_type,
                    created_at: self.now,
                    updated_at: self.now,
                };
                reps.push(store::insert(&mut *self.tx, &rep).await?);
            }

            sets.push(SetDetails { set: workout_set, reps });
        }

        Ok(sets)
    }

    pub async fn hormonal_protocol(
        &mut self,
        payload: HormonalProtocolPayload,
    ) -> Result<HormonalProtocolDetails, ApiError> {
        let hormonal_protocol = HormonalProtocol {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            account_id: self.owner.clone(),
            created_at: self.now,
            updated_at: self.now,
        };
        let hormonal_protocol = store::insert(&mut *self.tx, &hormonal_protocol).await?;

        let mut hormones = Vec::with_capacity(payload.hormones.len());
        for hormone in payload.hormones {
            hormones.push(self.hormone(hormone).await?);
        }

        let hormone_ids: Vec<String> = hormones.iter().map(|h| h.id.clone()).collect();
        self.link(Relation::HormonalProtocolHormones, &hormonal_protocol.id, &hormone_ids)
            .await?;

        Ok(HormonalProtocolDetails {
            hormonal_protocol,
            hormones,
        })
    }

    pub async fn hormone(&mut self, payload: HormonePayload) -> Result<Hormone, ApiError> {
        let hormone = Hormone {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            quantity: payload.quantity,
            unit: payload.unit,
            concentration: payload.concentration,
            concentration_unit: payload.concentration_unit,
            hormone_type: payload.hormone_type,
            account_id: self.owner.clone(),
            created_at: self.now,
            updated_at: self.now,
        };

        Ok(store::insert(&mut *self.tx, &hormone).await?)
    }

    pub async fn extra_compound(&mut self, payload: ExtraCompoundPayload) -> Result<ExtraCompound, ApiError> {
        let extra_compound = ExtraCompound {
            id: new_id(),
            name: payload.name,
            description: payload.description,
            quantity: payload.quantity,
            unit: payload.unit,
            concentration: payload.concentration,
            concentration_unit: payload.concentration_unit,
            account_id: self.owner.clone(),
            created_at: self.now,
            updated_at: self.now,
        };

        Ok(store::insert(&mut *self.tx, &extra_compound).await?)
    }

    /// Checks that every id names a row of `table` owned by the assembling account.
    pub async fn ensure_owned(&mut self, table: Table, ids: &[String], label: &'static str) -> Result<(), ApiError> {
        for id in ids {
            let owned = self
                .tx
                .fetch(table, id)
                .await?
                .and_then(|row| row.get("accountId").and_then(|owner| owner.as_str().map(str::to_owned)))
                .is_some_and(|owner| owner == self.owner);

            if !owned {
                return Err(ApiError::NotFound(label));
            }
        }

        Ok(())
    }

    /// Replaces the link set of `parent_id` with exactly `child_ids`.
    pub async fn relink(&mut self, relation: Relation, parent_id: &str, child_ids: &[String]) -> Result<(), ApiError> {
        self.tx.unlink_all(relation, parent_id).await?;
        self.link(relation, parent_id, child_ids).await
    }

    pub async fn link(&mut self, relation: Relation, parent_id: &str, child_ids: &[String]) -> Result<(), ApiError> {
        if child_ids.is_empty() {
            return Ok(());
        }

        self.tx.link(relation, parent_id, child_ids).await?;
        Ok(())
    }
}
