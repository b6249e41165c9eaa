pub mod client;
pub mod compete;
pub mod error;

pub use client::{ActiveCompetition, Client, QueryFilter};
pub use compete::{Intake, ParticipationLoop, Registry, Strategy, StrategyBook};
pub use error::ClientError;
