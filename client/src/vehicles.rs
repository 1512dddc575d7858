//! # Vehicle store
//!
//! Caches what the vehicle views show: the vehicle list, the vehicle being edited and the
//! vehicle-type enumeration.

use std::sync::Arc;

use tracing::debug;

use crate::{
    backend::{BackendClient, BackendError},
    models::{SelectOption, Vehicle, VehicleType, VehicleUpdate},
};

pub struct VehicleStore {
    backend: Arc<dyn BackendClient>,
    vehicles: Vec<Vehicle>,
    current: Option<Vehicle>,
    vehicle_types: Vec<VehicleType>,
}

impl VehicleStore {
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self {
            backend,
            vehicles: Vec::new(),
            current: None,
            vehicle_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &dyn BackendClient {
        self.backend.as_ref()
    }

    #[must_use]
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    #[must_use]
    pub fn current(&self) -> Option<&Vehicle> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn vehicle_types(&self) -> &[VehicleType] {
        &self.vehicle_types
    }

    /// Loads the vehicle list, optionally restricted to one client.
    pub async fn fetch_vehicles(
        &mut self,
        client_id: Option<i64>,
    ) -> Result<&[Vehicle], BackendError> {
        self.vehicles = self.backend.list_vehicles(client_id).await?;
        debug!(count = self.vehicles.len(), ?client_id, "Fetched vehicles");
        Ok(&self.vehicles)
    }

    /// Loads one vehicle and makes it the current one.
    pub async fn fetch_vehicle(&mut self, id: i64) -> Result<&Vehicle, BackendError> {
        let vehicle = self.backend.get_vehicle(id).await?;
        Ok(self.current.insert(vehicle))
    }

    pub async fn fetch_vehicle_types(&mut self) -> Result<&[VehicleType], BackendError> {
        self.vehicle_types = self.backend.list_vehicle_types().await?;
        debug!(count = self.vehicle_types.len(), "Fetched vehicle types");
        Ok(&self.vehicle_types)
    }

    /// Vehicle types as select options, valued by id.
    #[must_use]
    pub fn vehicle_type_options(&self) -> Vec<SelectOption> {
        self.vehicle_types
            .iter()
            .map(|t| SelectOption::new(t.id, t.label.clone()))
            .collect()
    }

    /// Adds newly created vehicles to the cached list.
    pub fn extend(&mut self, created: impl IntoIterator<Item = Vehicle>) {
        self.vehicles.extend(created);
    }

    /// Sends a partial update and merges the stored result into the cache.
    pub async fn update_vehicle(
        &mut self,
        id: i64,
        update: &VehicleUpdate,
    ) -> Result<Vehicle, BackendError> {
        let updated = self.backend.update_vehicle(id, update).await?;
        if let Some(cached) = self.vehicles.iter_mut().find(|v| v.id == id) {
            cached.clone_from(&updated);
        }
        if self.current.as_ref().is_some_and(|v| v.id == id) {
            self.current = Some(updated.clone());
        }
        debug!(id, "Vehicle updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::clients::memory::MemoryBackend,
        models::{Role, VehicleRequest},
    };

    fn request(client: i64, vin: &str) -> VehicleRequest {
        VehicleRequest {
            client,
            year_brand_model: "2019 Lexus RX".to_string(),
            vin: vin.to_string(),
            v_type: None,
            price: None,
            container_number: None,
            arrival_date: None,
            transporter: None,
            recipient: None,
            comment: None,
            status: None,
            document_photos: Vec::new(),
        }
    }

    async fn tools() -> (VehicleStore, MemoryBackend, i64) {
        let backend = MemoryBackend::new();
        let client = backend.add_account("+998900000001", "Secret1!", Role::Client, true, true);
        let other = backend.add_account("+998900000002", "Secret1!", Role::Client, true, true);
        backend
            .create_vehicles(&[request(client, "A1"), request(other, "B2"), request(client, "C3")])
            .await
            .expect("expected seeding vehicles to succeed");
        (VehicleStore::new(Arc::new(backend.clone())), backend, client)
    }

    #[tokio::test]
    async fn test_fetch_vehicles_by_client() {
        let (mut store, _, client) = tools().await;
        let vins: Vec<_> = store
            .fetch_vehicles(Some(client))
            .await
            .unwrap()
            .iter()
            .map(|v| v.vin.clone())
            .collect();
        assert_eq!(vins, ["A1", "C3"]);
        assert_eq!(store.fetch_vehicles(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_type_options() {
        let (mut store, backend, _) = tools().await;
        let sedan = backend.add_vehicle_type("Sedan");
        backend.add_vehicle_type("Truck");
        store.fetch_vehicle_types().await.unwrap();
        let options = store.vehicle_type_options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0], SelectOption::new(sedan, "Sedan"));
    }

    #[tokio::test]
    async fn test_update_merges_into_cache() {
        let (mut store, _, client) = tools().await;
        store.fetch_vehicles(Some(client)).await.unwrap();
        let id = store.vehicles()[1].id;
        store.fetch_vehicle(id).await.unwrap();

        let update = VehicleUpdate {
            comment: Some("windshield cracked".to_string()),
            ..VehicleUpdate::new()
        };
        store.update_vehicle(id, &update).await.unwrap();

        assert_eq!(
            store.vehicles()[1].comment.as_deref(),
            Some("windshield cracked")
        );
        assert_eq!(
            store.current().and_then(|v| v.comment.as_deref()),
            Some("windshield cracked")
        );
    }

    #[tokio::test]
    async fn test_missing_vehicle_is_not_found() {
        let (mut store, _, _) = tools().await;
        let error = store.fetch_vehicle(9999).await.unwrap_err();
        assert_eq!(error.status(), Some(404));
        assert!(store.current().is_none());
    }
}
