//! Read and rewrite JMeter test plans.
//!
//! Plans are never deserialized and re-serialized. Scenario groups and samplers are located by
//! scanning start tags in the raw text, and patching replaces only the enabled flag spans, so
//! listener and GUI metadata the engine round-trips lossily stays exactly as written.

mod error;
mod inspect;
mod patch;
mod scan;

pub use error::{PlanError, PlanResult};
pub use inspect::{
    active_samplers_in, groups_in, inspect_active_samplers, inspect_groups, inspect_samplers,
    samplers_in, SAMPLER_CLASSES, SCENARIO_GROUP_CLASSES,
};
pub use patch::{patch_plan, patch_plan_text, patched_plan_path, PatchOutcome, PATCHED_PLAN_SUFFIX};
