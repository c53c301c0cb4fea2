//! Application services for agent assembly.

mod assembly;
mod instruction;
mod plan;

pub use assembly::{AgentAssemblyService, AssembledAgent, AssemblyError, AssemblyFailure};
pub use instruction::render_route_instruction;
pub use plan::{AssemblyPlan, PlanError, SubAgentPlan, default_plan};
