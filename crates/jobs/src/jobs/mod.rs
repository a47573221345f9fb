mod pull_request;
mod workflow_run;

pub use pull_request::{PullRequestRiskJob, process_pull_request_risk};
pub use workflow_run::{WorkflowFailureJob, process_workflow_failure};
