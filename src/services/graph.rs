//! Read-side materialization of component graphs, in link order.

use futures::future::try_join_all;

use crate::models::{
    Diet, DietDetails, Exercise, ExerciseDetails, ExtraCompound, HormonalProtocol, HormonalProtocolDetails, Hormone,
    Meal, MealDetails, Food, Protocol, ProtocolDetails, ProtocolOverview, Rep, SetDetails, Train, TrainDetails,
    WorkoutSet,
};
use crate::store::{self, Filter, Page, Reader, Relation, StoreError};

pub async fn meal_details<R: Reader + ?Sized>(reader: &R, meal: Meal) -> Result<MealDetails, StoreError> {
    let foods = store::linked::<Food, _>(reader, Relation::MealFoods, &meal.id).await?;

    Ok(MealDetails { meal, foods })
}

pub async fn diet_details<R: Reader + ?Sized>(reader: &R, diet: Diet) -> Result<DietDetails, StoreError> {
    let meals = store::linked::<Meal, _>(reader, Relation::DietMeals, &diet.id).await?;
    let meals = try_join_all(meals.into_iter().map(|meal| meal_details(reader, meal))).await?;

    Ok(DietDetails { diet, meals })
}

pub async fn set_details<R: Reader + ?Sized>(reader: &R, set: WorkoutSet) -> Result<SetDetails, StoreError> {
    let reps = store::list::<Rep, _>(reader, &[Filter::equals("setId", set.id.as_str())], Page::all()).await?;

    Ok(SetDetails { set, reps })
}

pub async fn exercise_details<R: Reader + ?Sized>(reader: &R, exercise: Exercise) -> Result<ExerciseDetails, StoreError> {
    let sets =
        store::list::<WorkoutSet, _>(reader, &[Filter::equals("exerciseId", exercise.id.as_str())], Page::all()).await?;
    let sets = try_join_all(sets.into_iter().map(|set| set_details(reader, set))).await?;

    Ok(ExerciseDetails { exercise, sets })
}

pub async fn train_details<R: Reader + ?Sized>(reader: &R, train: Train) -> Result<TrainDetails, StoreError> {
    let exercises = store::linked::<Exercise, _>(reader, Relation::TrainExercises, &train.id).await?;
    let exercises = try_join_all(exercises.into_iter().map(|exercise| exercise_details(reader, exercise))).await?;

    Ok(TrainDetails { train, exercises })
}

pub async fn hormonal_protocol_details<R: Reader + ?Sized>(
    reader: &R,
    hormonal_protocol: HormonalProtocol,
) -> Result<HormonalProtocolDetails, StoreError> {
    let hormones = store::linked::<Hormone, _>(reader, Relation::HormonalProtocolHormones, &hormonal_protocol.id).await?;

    Ok(HormonalProtocolDetails {
        hormonal_protocol,
        hormones,
    })
}

/// The protocol with every component expanded down to the leaves.
pub async fn protocol_details<R: Reader + ?Sized>(reader: &R, protocol: Protocol) -> Result<ProtocolDetails, StoreError> {
    let diets = store::linked::<Diet, _>(reader, Relation::ProtocolDiets, &protocol.id).await?;
    let trains = store::linked::<Train, _>(reader, Relation::ProtocolTrains, &protocol.id).await?;
    let hormonal_protocols =
        store::linked::<HormonalProtocol, _>(reader, Relation::ProtocolHormonalProtocols, &protocol.id).await?;
    let extra_compounds = store::linked::<ExtraCompound, _>(reader, Relation::ProtocolExtraCompounds, &protocol.id).await?;

    let diets = try_join_all(diets.into_iter().map(|diet| diet_details(reader, diet))).await?;
    let trains = try_join_all(trains.into_iter().map(|train| train_details(reader, train))).await?;
    let hormonal_protocols =
        try_join_all(hormonal_protocols.into_iter().map(|hp| hormonal_protocol_details(reader, hp))).await?;

    Ok(ProtocolDetails {
        protocol,
        diets,
        trains,
        hormonal_protocols,
        extra_compounds,
    })
}

/// The protocol with its direct components only.
pub async fn protocol_overview<R: Reader + ?Sized>(reader: &R, protocol: Protocol) -> Result<ProtocolOverview, StoreError> {
    let (diets, trains, hormonal_protocols, extra_compounds) = futures::try_join!(
        store::linked::<Diet, _>(reader, Relation::ProtocolDiets, &protocol.id),
        store::linked::<Train, _>(reader, Relation::ProtocolTrains, &protocol.id),
        store::linked::<HormonalProtocol, _>(reader, Relation::ProtocolHormonalProtocols, &protocol.id),
        store::linked::<ExtraCompound, _>(reader, Relation::ProtocolExtraCompounds, &protocol.id),
    )?;

    Ok(ProtocolOverview {
        protocol,
        diets,
        trains,
        hormonal_protocols,
        extra_compounds,
    })
}
