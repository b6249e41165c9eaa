use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use tracing::info;

use crate::entity::{competition, submission};
use crate::views::{
    VIEW_COMPETITIONS, VIEW_LEADERBOARD, VIEW_SUBMISSIONS, ViewPropagator, competition_admin_row,
    competition_public_row, submission_admin_row, submission_public_row,
};

/// Host the view tables with their initial rows from the database.
pub async fn seed_views(db: &DatabaseConnection, views: &ViewPropagator) -> Result<(), DbErr> {
    let competitions = competition::Entity::find().all(db).await?;
    let submissions = submission::Entity::find().all(db).await?;

    views.public().host(
        VIEW_COMPETITIONS,
        competitions
            .iter()
            .map(|c| (c.id, competition_public_row(c)))
            .collect(),
    );
    views.admin().host(
        VIEW_COMPETITIONS,
        competitions
            .iter()
            .map(|c| (c.id, competition_admin_row(c)))
            .collect(),
    );

    views.admin().host(
        VIEW_SUBMISSIONS,
        submissions
            .iter()
            .map(|s| (s.id, submission_admin_row(s)))
            .collect(),
    );
    // Only resolved submissions rank on the public board.
    views.public().host(
        VIEW_LEADERBOARD,
        submissions
            .iter()
            .filter(|s| s.score.is_some())
            .map(|s| (s.id, submission_public_row(s)))
            .collect(),
    );

    info!(
        competitions = competitions.len(),
        submissions = submissions.len(),
        "Hosted view tables"
    );
    Ok(())
}
