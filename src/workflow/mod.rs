pub mod game;
pub mod selection;
pub mod store;

pub use game::{GameRunner, GameSession, GameState, GameTimer, GameView};
pub use selection::Selection;
pub use store::ExerciseStore;
