use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    db_types::{Kes, NewProject, Project, ProjectStatus},
    donation_api::donation_objects::PublicDonation,
};

pub const MAX_PROJECT_LIST_LIMIT: i64 = 100;
pub const RECENT_PROJECT_DONATIONS: i64 = 10;

/// Query parameters for listing projects. `status` defaults to `active`. The literal `all` disables the status filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectQueryFilter {
    pub status: Option<String>,
    pub category: Option<String>,
    pub limit: Option<i64>,
}

/// The status criterion of a [`ProjectQueryFilter`], once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatusFilter {
    Only(ProjectStatus),
    All,
}

impl ProjectQueryFilter {
    pub fn all() -> Self {
        Self { status: Some("all".into()), ..Default::default() }
    }

    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn status_filter(&self) -> Result<ProjectStatusFilter, String> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(ProjectStatusFilter::Only(ProjectStatus::Active)),
            Some("all") => Ok(ProjectStatusFilter::All),
            Some(s) => s.parse::<ProjectStatus>().map(ProjectStatusFilter::Only).map_err(|e| e.to_string()),
        }
    }

    pub fn effective_limit(&self) -> Option<i64> {
        self.limit.map(|l| l.clamp(1, MAX_PROJECT_LIST_LIMIT))
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ProjectSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub donation_count: i64,
}

/// A project together with its most recent completed donations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub donation_count: i64,
    pub recent_donations: Vec<PublicDonation>,
}

/// A partial update of a project. Only the fields that are set are changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_amount: Option<Kes>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub status: Option<ProjectStatus>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() &&
            self.description.is_none() &&
            self.target_amount.is_none() &&
            self.category.is_none() &&
            self.image_url.is_none() &&
            self.status.is_none()
    }

    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A project whose stored total disagreed with the sum of its completed donations.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectTotalDrift {
    pub project_id: i64,
    pub title: String,
    pub stored_amount: Kes,
    pub computed_amount: Kes,
}

/// The projects inserted when an empty database is seeded for demos.
pub fn sample_projects() -> Vec<NewProject> {
    vec![
        NewProject::new(
            "Clean Water Initiative",
            "Providing clean drinking water to rural communities through sustainable well construction and water \
             purification systems.",
            Kes::from(50_000),
            "Health & Environment",
        ),
        NewProject::new(
            "Education for All",
            "Supporting underprivileged children with school supplies, uniforms, and educational resources to ensure \
             quality education.",
            Kes::from(75_000),
            "Education",
        ),
        NewProject::new(
            "Community Food Bank",
            "Establishing a sustainable food bank to provide nutritious meals to families facing food insecurity.",
            Kes::from(30_000),
            "Food Security",
        ),
        NewProject::new(
            "Healthcare Mobile Clinic",
            "Bringing essential healthcare services to remote areas through a fully equipped mobile medical clinic.",
            Kes::from(100_000),
            "Healthcare",
        ),
        NewProject::new(
            "Youth Skills Training",
            "Empowering young people with vocational skills and entrepreneurship training to create sustainable \
             livelihoods.",
            Kes::from(40_000),
            "Skills Development",
        ),
    ]
}
