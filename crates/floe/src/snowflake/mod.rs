mod backwards;
mod generator;
mod layout;
#[cfg(test)]
mod tests;
mod worker;

pub use backwards::ClockBackwardsPolicy;
pub use generator::SnowflakeIdGenerator;
pub use layout::{SnowflakeIdParts, SnowflakeLayout};
pub use worker::{StaticWorkerIdAssigner, WorkerIdAssigner};
