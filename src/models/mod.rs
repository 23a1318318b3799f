pub mod agent;
pub mod beacon;
pub mod execution;
pub mod plan;
pub mod result;
pub mod scenario;
pub mod schedule;
pub mod technique;

pub use agent::{Agent, AgentStatus};
pub use beacon::{BeaconRequest, BeaconResponse, BeaconResult, TaskInstruction};
pub use execution::{Execution, ExecutionStatus, SecurityScore, StartExecutionRequest};
pub use plan::{Plan, PlannedTask, SkippedTechnique};
pub use result::{ExecutionResult, ResultStatus};
pub use scenario::{CreateScenarioRequest, Phase, Scenario};
pub use schedule::{
    CreateScheduleRequest, Frequency, Schedule, ScheduleRun, ScheduleRunStatus, ScheduleStatus,
};
pub use technique::{ExecutorVariant, Technique};
