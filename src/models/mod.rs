pub mod catalog;
pub mod document;
pub mod exercise;
pub mod filter;
pub mod loaders;
pub mod settings;

pub use document::{DocumentTree, Variant};
pub use exercise::{Difficulty, Exercise, ExerciseBody, ExerciseType, ParsedExercise, UNDEFINED_MARKER};
pub use filter::FilterState;
pub use loaders::{parse_manifest, ManifestEntry};
pub use settings::{GlobalSettings, SettingsPatch};
