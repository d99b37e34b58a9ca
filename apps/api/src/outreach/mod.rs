pub mod agent;
pub mod delivery;
pub mod messages;
pub mod pipeline;
pub mod prompts;
pub mod research;
pub mod scoring;
pub mod selection;
pub mod steps;
