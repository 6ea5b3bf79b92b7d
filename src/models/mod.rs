pub mod sla;
pub mod workflow;
