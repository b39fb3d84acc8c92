use crate::{
    db_types::{Donation, NewProject, Project},
    donation_api::project_objects::{ProjectQueryFilter, ProjectSummary, ProjectTotalDrift, ProjectUpdate},
    traits::LedgerError,
};

/// The `ProjectManagement` trait defines behaviour for managing fundraising projects.
///
/// A project's `current_amount` is only ever credited by the ledger when a donation completes. The only other writer
/// is [`ProjectManagement::recalculate_project_totals`], which rebuilds every total from the completed donations.
#[allow(async_fn_in_trait)]
pub trait ProjectManagement {
    async fn fetch_project(&self, id: i64) -> Result<Option<Project>, LedgerError>;

    /// Lists projects with their completed-donation counts, newest first.
    async fn fetch_projects(&self, query: ProjectQueryFilter) -> Result<Vec<ProjectSummary>, LedgerError>;

    /// The number of completed donations for the project.
    async fn count_completed_donations(&self, project_id: i64) -> Result<i64, LedgerError>;

    /// The most recent completed donations for the project, newest first.
    async fn fetch_recent_donations_for_project(
        &self,
        project_id: i64,
        limit: i64,
    ) -> Result<Vec<Donation>, LedgerError>;

    async fn count_projects(&self) -> Result<i64, LedgerError>;

    async fn insert_project(&self, project: NewProject) -> Result<Project, LedgerError>;

    /// Applies the non-empty fields of `update`. Returns `None` if the project does not exist.
    async fn update_project(&self, id: i64, update: ProjectUpdate) -> Result<Option<Project>, LedgerError>;

    /// Deletes the project and, by cascade, its donations. Returns false if there was no such project.
    async fn delete_project(&self, id: i64) -> Result<bool, LedgerError>;

    /// Sets every project's `current_amount` to the sum of its completed donations. Returns the projects whose stored
    /// total differed from the computed one, with their values before the correction.
    async fn recalculate_project_totals(&self) -> Result<Vec<ProjectTotalDrift>, LedgerError>;
}
