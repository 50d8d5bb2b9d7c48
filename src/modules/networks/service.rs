use tracing::{info, instrument};

use genera_core::AppError;
use genera_core::permissions::{MANAGE_NETWORKS, SUPERVISE_NETWORK_SCHOOLS};
use genera_db::AccessStore;
use genera_models::ids::{NetworkId, SchoolId};
use genera_models::organizations::{
    CreateNetworkDto, Network, NetworkMembership, NetworkUpdate, NetworkWithSchools,
    UpdateNetworkDto,
};

use crate::authz::{AccessContext, NO_PERMISSION_MESSAGE};

pub struct NetworkService;

impl NetworkService {
    #[instrument(skip(store, access))]
    pub async fn list_networks(
        store: &dyn AccessStore,
        access: &AccessContext,
    ) -> Result<Vec<Network>, AppError> {
        access.require_permission(MANAGE_NETWORKS)?;
        Ok(store.list_networks().await?)
    }

    #[instrument(skip(store, access, dto), fields(name = %dto.name))]
    pub async fn create_network(
        store: &dyn AccessStore,
        access: &AccessContext,
        dto: CreateNetworkDto,
    ) -> Result<Network, AppError> {
        access.require_permission(MANAGE_NETWORKS)?;
        let network = store
            .create_network(
                dto.name.trim(),
                dto.description.as_deref(),
                Some(access.user_id()),
            )
            .await?;
        info!(network.id = %network.id, "Network created");
        Ok(network)
    }

    #[instrument(skip(store, access, dto))]
    pub async fn update_network(
        store: &dyn AccessStore,
        access: &AccessContext,
        network_id: NetworkId,
        dto: UpdateNetworkDto,
    ) -> Result<Network, AppError> {
        access.require_permission(MANAGE_NETWORKS)?;
        let network = store
            .update_network(network_id, NetworkUpdate::from(dto))
            .await?;
        info!(network.id = %network.id, name = %network.name, "Network updated");
        Ok(network)
    }

    /// Refused while supervisors are assigned to the network.
    #[instrument(skip(store, access))]
    pub async fn delete_network(
        store: &dyn AccessStore,
        access: &AccessContext,
        network_id: NetworkId,
    ) -> Result<(), AppError> {
        access.require_permission(MANAGE_NETWORKS)?;
        store.delete_network(network_id).await?;
        info!(network.id = %network_id, "Network deleted");
        Ok(())
    }

    /// Schools of a network. Network managers see every network; supervisors
    /// only the networks they are assigned to.
    #[instrument(skip(store, access))]
    pub async fn network_schools(
        store: &dyn AccessStore,
        access: &AccessContext,
        network_id: NetworkId,
    ) -> Result<NetworkWithSchools, AppError> {
        let network = store.get_network(network_id).await?;
        if !access.has_permission(MANAGE_NETWORKS)
            && !access.covers_network(SUPERVISE_NETWORK_SCHOOLS, network_id)
        {
            return Err(AppError::forbidden(NO_PERMISSION_MESSAGE));
        }
        let schools = store.list_network_schools(network_id).await?;
        Ok(NetworkWithSchools { network, schools })
    }

    #[instrument(skip(store, access))]
    pub async fn add_school(
        store: &dyn AccessStore,
        access: &AccessContext,
        network_id: NetworkId,
        school_id: SchoolId,
    ) -> Result<NetworkMembership, AppError> {
        access.require_permission(MANAGE_NETWORKS)?;
        let membership = store
            .add_network_school(network_id, school_id, Some(access.user_id()))
            .await?;
        info!(network.id = %network_id, school.id = %school_id, "School added to network");
        Ok(membership)
    }

    #[instrument(skip(store, access))]
    pub async fn remove_school(
        store: &dyn AccessStore,
        access: &AccessContext,
        network_id: NetworkId,
        school_id: SchoolId,
    ) -> Result<(), AppError> {
        access.require_permission(MANAGE_NETWORKS)?;
        store.remove_network_school(network_id, school_id).await?;
        info!(network.id = %network_id, school.id = %school_id, "School removed from network");
        Ok(())
    }
}
