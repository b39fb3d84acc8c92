use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewProject, Project},
    donation_api::{
        donation_objects::PublicDonation,
        errors::ProjectApiError,
        project_objects::{
            sample_projects,
            ProjectDetail,
            ProjectQueryFilter,
            ProjectSummary,
            ProjectTotalDrift,
            ProjectUpdate,
            RECENT_PROJECT_DONATIONS,
        },
    },
    helpers::{validation::require_text, ValidationError},
    traits::ProjectManagement,
};

/// Browsing and curation of fundraising projects.
pub struct ProjectApi<B> {
    db: B,
}

impl<B> Debug for ProjectApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProjectApi")
    }
}

impl<B> ProjectApi<B>
where B: ProjectManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn list_projects(&self, query: ProjectQueryFilter) -> Result<Vec<ProjectSummary>, ProjectApiError> {
        query.status_filter().map_err(ValidationError::InvalidField)?;
        let projects = self.db.fetch_projects(query).await?;
        Ok(projects)
    }

    /// The project with its completed-donation count and its 10 most recent completed donations, anonymized.
    pub async fn fetch_project(&self, id: i64) -> Result<ProjectDetail, ProjectApiError> {
        let project = self.db.fetch_project(id).await?.ok_or(ProjectApiError::ProjectNotFound(id))?;
        let donation_count = self.db.count_completed_donations(id).await?;
        let recent_donations = self
            .db
            .fetch_recent_donations_for_project(id, RECENT_PROJECT_DONATIONS)
            .await?
            .into_iter()
            .map(|d| PublicDonation::new(d, Some(project.title.clone())))
            .collect();
        Ok(ProjectDetail { project, donation_count, recent_donations })
    }

    pub async fn create_project(&self, project: NewProject) -> Result<Project, ProjectApiError> {
        require_text("title", &project.title)?;
        require_text("description", &project.description)?;
        require_text("category", &project.category)?;
        if !project.target_amount.is_positive() {
            return Err(ValidationError::InvalidField("target_amount must be greater than zero".into()).into());
        }
        let project = self.db.insert_project(project).await?;
        info!("💻️ Project #{} ({}) created with a target of {}", project.id, project.title, project.target_amount);
        Ok(project)
    }

    pub async fn update_project(&self, id: i64, update: ProjectUpdate) -> Result<Project, ProjectApiError> {
        if update.is_empty() {
            return Err(ProjectApiError::EmptyUpdate);
        }
        for (field, value) in
            [("title", &update.title), ("description", &update.description), ("category", &update.category)]
        {
            if let Some(v) = value {
                require_text(field, v)?;
            }
        }
        if update.target_amount.map(|t| !t.is_positive()).unwrap_or(false) {
            return Err(ValidationError::InvalidField("target_amount must be greater than zero".into()).into());
        }
        let project = self.db.update_project(id, update).await?.ok_or(ProjectApiError::ProjectNotFound(id))?;
        debug!("💻️ Project #{id} updated");
        Ok(project)
    }

    /// Deletes the project together with its donations and their outbox entries.
    pub async fn delete_project(&self, id: i64) -> Result<(), ProjectApiError> {
        if self.db.delete_project(id).await? {
            info!("💻️ Project #{id} deleted");
            Ok(())
        } else {
            Err(ProjectApiError::ProjectNotFound(id))
        }
    }

    /// Rebuilds every project total from its completed donations and reports the projects that had drifted.
    pub async fn recalculate_project_totals(&self) -> Result<Vec<ProjectTotalDrift>, ProjectApiError> {
        let drift = self.db.recalculate_project_totals().await?;
        for d in &drift {
            warn!(
                "🔄️ Project #{} ({}) total drifted. Stored {}, computed {}. Corrected.",
                d.project_id, d.title, d.stored_amount, d.computed_amount
            );
        }
        Ok(drift)
    }

    /// Inserts the sample projects if there are no projects at all. Returns how many were inserted.
    pub async fn seed_sample_projects(&self) -> Result<usize, ProjectApiError> {
        if self.db.count_projects().await? > 0 {
            debug!("🚀️ Projects already exist. Skipping sample data.");
            return Ok(0);
        }
        let samples = sample_projects();
        let count = samples.len();
        for project in samples {
            self.db.insert_project(project).await?;
        }
        info!("🚀️ {count} sample projects created");
        Ok(count)
    }
}
