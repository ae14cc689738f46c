//! Pipeline steps

pub mod orchestrator;
pub mod specialist;

pub use orchestrator::{CombineStep, InitiateStep, COMBINE_STEP_ID, INITIATE_STEP_ID};
pub use specialist::{degraded_answer, specialist_step_id, SpecialistStep};
