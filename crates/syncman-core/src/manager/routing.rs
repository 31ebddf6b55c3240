//! Ingress routes.

use syncman_types::models::Route;
use syncman_types::ProjectError;

use super::{lookup, Manager};
use crate::error::SyncResult;

impl Manager {
    /// Insert or replace the route with id `route_id`.
    pub async fn set_project_route(&self, project: &str, route_id: &str, mut route: Route) -> SyncResult<()> {
        route.id = route_id.to_string();
        route.project = project.to_string();
        self.mutate_modules(
            project,
            |modules| {
                match modules.routes.iter_mut().find(|r| r.id == route.id) {
                    Some(existing) => *existing = route,
                    None => modules.routes.push(route),
                }
                Ok(())
            },
            |m, id, modules| m.set_routing_config(id, &modules.routes),
        )
        .await
    }

    /// Replace every route of the project.
    pub async fn set_project_routes(&self, project: &str, mut routes: Vec<Route>) -> SyncResult<()> {
        for route in &mut routes {
            route.project = project.to_string();
        }
        self.mutate_modules(
            project,
            |modules| {
                modules.routes = routes;
                Ok(())
            },
            |m, id, modules| m.set_routing_config(id, &modules.routes),
        )
        .await
    }

    pub async fn delete_project_route(&self, project: &str, route_id: &str) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                let index = modules
                    .routes
                    .iter()
                    .position(|r| r.id == route_id)
                    .ok_or_else(|| ProjectError::resource(project, "route", route_id))?;
                modules.routes.remove(index);
                Ok(())
            },
            |m, id, modules| m.set_routing_config(id, &modules.routes),
        )
        .await
    }

    pub async fn get_project_routes(&self, project: &str) -> SyncResult<Vec<Route>> {
        let state = self.inner.state.read().await;
        Ok(lookup(&state.config, project)?.modules.unwrap_or_default().routes)
    }
}
