//! Project lifecycle: provisioning, replacement, project-level settings, deletion.

use syncman_types::models::config::DEFAULT_CONTEXT_TIME_GRAPHQL;
use syncman_types::{Modules, ProjectConfig, ProjectError, ProjectSummary};
use tracing::{debug, info, warn};

use super::{lookup, Manager};
use crate::error::SyncResult;

impl Manager {
    /// Provision a project, or refresh the provisioning fields of an existing one.
    ///
    /// An existing project keeps its modules tree. A new project starts with an
    /// empty one and is created on the runner first, when a runner is configured.
    pub async fn apply_project_config(&self, mut project: ProjectConfig) -> SyncResult<()> {
        if project.id.trim().is_empty() {
            return Err(ProjectError::Invalid { message: "project id is required".to_string() }.into());
        }

        let mut state = self.inner.state.write().await;

        if !self.inner.admin.validate_sync_operation(&state.config, &project) {
            return Err(ProjectError::Forbidden {
                id: project.id.clone(),
                reason: "please upgrade your instance".to_string(),
            }
            .into());
        }

        let token = self.internal_token()?;

        if project.context_time_graphql == 0 {
            project.context_time_graphql = DEFAULT_CONTEXT_TIME_GRAPHQL;
        }

        let previous = state.config.project(&project.id).cloned();
        let updated = match &previous {
            Some(existing) => {
                let mut merged = existing.clone();
                merged.merge_mutable_fields(&project);
                merged
            },
            None => {
                project.modules = Some(Modules::default());
                if let Some(runner) = &self.inner.runner {
                    // A runner project left over from a failed persist is reused.
                    if state.runner_provisioned.contains(&project.id) {
                        debug!(project_id = %project.id, "project already provisioned on runner");
                    } else {
                        runner.create_project(&project.id, &token).await?;
                        state.runner_provisioned.insert(project.id.clone());
                    }
                }
                info!(project_id = %project.id, "provisioned new project");
                project
            },
        };

        state.config.upsert_project(updated.clone());
        if let Err(e) = self.inner.modules.set_project_config(&state.config) {
            warn!(project_id = %updated.id, "dependent modules rejected project config: {}", e);
        }

        self.persist(&mut state, previous, &updated).await?;
        state.runner_provisioned.remove(&updated.id);
        Ok(())
    }

    /// Replace a whole project. Idempotent for identical input.
    pub async fn set_project_config(&self, project: ProjectConfig) -> SyncResult<()> {
        if project.id.trim().is_empty() {
            return Err(ProjectError::Invalid { message: "project id is required".to_string() }.into());
        }

        let mut state = self.inner.state.write().await;
        let previous = state.config.project(&project.id).cloned();

        let mut candidate = state.config.clone();
        candidate.upsert_project(project.clone());
        self.inner.modules.set_project_config(&candidate)?;

        self.commit(&mut state, previous, project).await
    }

    /// Update name, secrets, AES key and GraphQL context timeout.
    pub async fn set_project_global_config(&self, project: &ProjectConfig) -> SyncResult<()> {
        let mut state = self.inner.state.write().await;
        let previous = lookup(&state.config, &project.id)?;

        self.inner.modules.set_global_config(
            &project.id,
            &project.name,
            &project.secrets,
            &project.aes_key,
        )?;

        let mut updated = previous.clone();
        updated.name.clone_from(&project.name);
        updated.secrets.clone_from(&project.secrets);
        updated.aes_key.clone_from(&project.aes_key);
        updated.context_time_graphql = project.context_time_graphql;

        self.commit(&mut state, Some(previous), updated).await
    }

    /// Remove a project everywhere. Deleting an unknown project succeeds.
    pub async fn delete_project_config(&self, project_id: &str) -> SyncResult<()> {
        let mut state = self.inner.state.write().await;
        let token = self.internal_token()?;

        if let Some(runner) = &self.inner.runner {
            runner.delete_project(project_id, &token).await?;
        }
        state.runner_provisioned.remove(project_id);

        let previous = state.config.remove_project(project_id);

        if let Err(e) = self.inner.modules.delete_project(project_id) {
            warn!(project_id, "dependent modules failed to drop project: {}", e);
        }
        if let Err(e) = self.inner.modules.set_project_config(&state.config) {
            warn!(project_id, "dependent modules rejected project config: {}", e);
        }

        if let Err(e) = self.inner.store.delete_project(project_id).await {
            if let Some(project) = previous {
                self.restore(&mut state, project_id, Some(project));
            }
            return Err(e.into());
        }

        info!(project_id, existed = previous.is_some(), "project deleted");
        Ok(())
    }

    /// Deep copy of one project.
    pub async fn get_config(&self, project_id: &str) -> SyncResult<ProjectConfig> {
        let state = self.inner.state.read().await;
        lookup(&state.config, project_id)
    }

    /// Project summaries (no modules tree). `"*"` lists every project.
    pub async fn get_project_config(&self, project_id: &str) -> SyncResult<Vec<ProjectSummary>> {
        let state = self.inner.state.read().await;
        if project_id == "*" {
            return Ok(state.config.projects.iter().map(ProjectConfig::summary).collect());
        }
        Ok(vec![lookup(&state.config, project_id)?.summary()])
    }
}
