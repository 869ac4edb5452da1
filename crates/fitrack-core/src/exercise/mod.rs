//! Exercise domain module.

mod model;

pub use model::{
    Exercise, ExerciseState, FinishedExercise, RunningExercise, completion_fraction,
};
