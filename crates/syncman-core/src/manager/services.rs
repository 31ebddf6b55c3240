//! Remote services and user management.

use syncman_types::models::{AuthStub, Service};

use super::Manager;
use crate::error::SyncResult;

impl Manager {
    pub async fn set_service(&self, project: &str, service_id: &str, mut service: Service) -> SyncResult<()> {
        service.id = service_id.to_string();
        self.mutate_modules(
            project,
            |modules| {
                modules.services.external_services.insert(service_id.to_string(), service);
                Ok(())
            },
            |m, id, modules| m.set_services_config(id, &modules.services),
        )
        .await
    }

    pub async fn set_delete_service(&self, project: &str, service_id: &str) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.services.external_services.remove(service_id);
                Ok(())
            },
            |m, id, modules| m.set_services_config(id, &modules.services),
        )
        .await
    }

    /// Configure one auth provider.
    pub async fn set_user_management(
        &self,
        project: &str,
        provider: &str,
        mut stub: AuthStub,
    ) -> SyncResult<()> {
        stub.id = provider.to_string();
        self.mutate_modules(
            project,
            |modules| {
                modules.auth.insert(provider.to_string(), stub);
                Ok(())
            },
            |m, id, modules| m.set_userman_config(id, &modules.auth),
        )
        .await
    }
}
