pub mod competition;
pub mod frame;
pub mod scoring;
pub mod submission;

pub use competition::{CompetitionSpec, CompetitionType, SpecError, TargetSpec};
pub use frame::{Frame, Row};
pub use submission::{PayloadFormat, SubmissionPayload};
