use std::sync::Arc;

use serde_json::json;

use crate::auth::AccountSession;
use crate::error::ApiError;
use crate::models::{
    CreateProtocol, FullProtocolRequest, Protocol, ProtocolDetails, ProtocolOverview, Train, TrainDetails,
    UpdateProtocol,
};
use crate::services::assembly::Assembly;
use crate::services::graph;
use crate::services::{NotificationOutbox, OutboundNotification};
use crate::store::{self, Entity, Filter, Page, Relation, Store, Table};

#[derive(Clone)]
pub struct ProtocolService {
    store: Arc<dyn Store>,
    outbox: NotificationOutbox,
}

impl ProtocolService {
    pub fn new(store: Arc<dyn Store>, outbox: NotificationOutbox) -> Self {
        Self { store, outbox }
    }

    /// Creates a protocol and its whole component graph in one transaction.
    ///
    /// The client is notified only once the transaction has committed, and a
    /// failed notification never affects the result.
    pub async fn create_full_protocol(
        &self,
        session: &AccountSession,
        request: FullProtocolRequest,
    ) -> Result<ProtocolDetails, ApiError> {
        let owner = session.account_id.clone();

        let details = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move { Assembly::new(tx, &owner).full_protocol(request).await })
        })
        .await?;

        tracing::info!(
            protocol_id = %details.protocol.id,
            account_id = %details.protocol.account_id,
            client_id = %details.protocol.client_id,
            diets = details.diets.len(),
            trains = details.trains.len(),
            extra_compounds = details.extra_compounds.len(),
            "full protocol created"
        );

        self.outbox.publish(OutboundNotification::new(
            details.protocol.client_id.as_str(),
            "New full protocol assigned to you",
            format!(
                "Protocol {} was assigned to you with all of its components",
                details.protocol.name
            ),
        ));

        Ok(details)
    }

    /// Coaches see the protocols they own; customers the ones assigned to them.
    pub async fn list(&self, session: &AccountSession, page: Page) -> Result<Vec<ProtocolOverview>, ApiError> {
        let filters = [Self::scope(session)];
        let protocols = store::list::<Protocol, _>(self.store.as_ref(), &filters, page).await?;

        let overviews = futures::future::try_join_all(
            protocols
                .into_iter()
                .map(|protocol| graph::protocol_overview(self.store.as_ref(), protocol)),
        )
        .await?;

        Ok(overviews)
    }

    pub async fn get(&self, session: &AccountSession, id: &str) -> Result<ProtocolDetails, ApiError> {
        let protocol = store::find::<Protocol, _>(self.store.as_ref(), id)
            .await?
            .filter(|protocol| Self::visible(session, protocol))
            .ok_or(ApiError::NotFound("Protocol"))?;

        Ok(graph::protocol_details(self.store.as_ref(), protocol).await?)
    }

    /// Most recent protocol assigned to `client_id` that the caller may see.
    pub async fn by_client(&self, session: &AccountSession, client_id: &str) -> Result<ProtocolDetails, ApiError> {
        let protocols = store::list::<Protocol, _>(
            self.store.as_ref(),
            &[Filter::equals("clientId", client_id)],
            Page::all(),
        )
        .await?;

        let latest = protocols
            .into_iter()
            .filter(|protocol| Self::visible(session, protocol))
            .max_by_key(|protocol| protocol.created_at)
            .ok_or(ApiError::NotFound("Protocol"))?;

        Ok(graph::protocol_details(self.store.as_ref(), latest).await?)
    }

    /// Trains of a protocol the caller may see, fully materialized.
    pub async fn trains(&self, session: &AccountSession, protocol_id: &str) -> Result<Vec<TrainDetails>, ApiError> {
        let protocol = store::find::<Protocol, _>(self.store.as_ref(), protocol_id)
            .await?
            .filter(|protocol| Self::visible(session, protocol))
            .ok_or(ApiError::NotFound("Protocol"))?;

        let reader = self.store.as_ref();
        let trains = store::linked::<Train, _>(reader, Relation::ProtocolTrains, &protocol.id).await?;
        let details =
            futures::future::try_join_all(trains.into_iter().map(|train| graph::train_details(reader, train))).await?;

        Ok(details)
    }

    pub async fn count(&self, session: &AccountSession) -> Result<u64, ApiError> {
        let filters = [Filter::equals("accountId", session.account_id.as_str())];

        Ok(self.store.count(Protocol::TABLE, &filters).await?)
    }

    /// Creates a protocol that connects components the caller already owns.
    pub async fn create(&self, session: &AccountSession, request: CreateProtocol) -> Result<ProtocolDetails, ApiError> {
        let owner = session.account_id.clone();

        let protocol = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut assembly = Assembly::new(tx, &owner);
                assembly.ensure_client(&request.client_id).await?;

                let diets: Vec<String> = request.diet.into_iter().collect();
                let hormonal_protocols: Vec<String> = request.hormonal_protocol.into_iter().collect();
                assembly.ensure_owned(Table::Diets, &diets, "Diet").await?;
                assembly.ensure_owned(Table::Trains, &request.trains, "Train").await?;
                assembly
                    .ensure_owned(Table::HormonalProtocols, &hormonal_protocols, "HormonalProtocol")
                    .await?;
                assembly
                    .ensure_owned(Table::ExtraCompounds, &request.extra_compounds, "ExtraCompound")
                    .await?;

                let now = assembly.now();
                let protocol = Protocol {
                    id: crate::models::new_id(),
                    name: request.name,
                    description: request.description,
                    account_id: owner.clone(),
                    client_id: request.client_id,
                    created_at: now,
                    updated_at: now,
                };
                let protocol = store::insert(assembly.tx(), &protocol).await?;

                assembly.link(Relation::ProtocolDiets, &protocol.id, &diets).await?;
                assembly.link(Relation::ProtocolTrains, &protocol.id, &request.trains).await?;
                assembly
                    .link(Relation::ProtocolHormonalProtocols, &protocol.id, &hormonal_protocols)
                    .await?;
                assembly
                    .link(Relation::ProtocolExtraCompounds, &protocol.id, &request.extra_compounds)
                    .await?;

                Ok::<_, ApiError>(protocol)
            })
        })
        .await?;

        tracing::info!(protocol_id = %protocol.id, client_id = %protocol.client_id, "protocol created");
        self.notify_client(&protocol, "New protocol assigned to you", "was assigned to you");

        Ok(graph::protocol_details(self.store.as_ref(), protocol).await?)
    }

    /// Updates columns and replaces every relation present in the request.
    pub async fn update(
        &self,
        session: &AccountSession,
        id: &str,
        request: UpdateProtocol,
    ) -> Result<ProtocolDetails, ApiError> {
        let owner = session.account_id.clone();
        let id = id.to_string();

        let protocol = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut assembly = Assembly::new(tx, &owner);
                owned_protocol(&mut assembly, &id).await?;

                if let Some(client_id) = &request.client_id {
                    assembly.ensure_client(client_id).await?;
                }

                let mut changes = store::to_row(&request)?;
                changes.insert("updatedAt".to_string(), json!(assembly.now()));
                let row = assembly
                    .tx()
                    .update(Protocol::TABLE, &id, changes)
                    .await?
                    .ok_or(ApiError::NotFound("Protocol"))?;

                if let Some(diet) = request.diet {
                    let diets = vec![diet];
                    assembly.ensure_owned(Table::Diets, &diets, "Diet").await?;
                    assembly.relink(Relation::ProtocolDiets, &id, &diets).await?;
                }
                if let Some(trains) = request.trains {
                    assembly.ensure_owned(Table::Trains, &trains, "Train").await?;
                    assembly.relink(Relation::ProtocolTrains, &id, &trains).await?;
                }
                if let Some(hormonal_protocol) = request.hormonal_protocol {
                    let hormonal_protocols = vec![hormonal_protocol];
                    assembly
                        .ensure_owned(Table::HormonalProtocols, &hormonal_protocols, "HormonalProtocol")
                        .await?;
                    assembly
                        .relink(Relation::ProtocolHormonalProtocols, &id, &hormonal_protocols)
                        .await?;
                }
                if let Some(extra_compounds) = request.extra_compounds {
                    assembly
                        .ensure_owned(Table::ExtraCompounds, &extra_compounds, "ExtraCompound")
                        .await?;
                    assembly
                        .relink(Relation::ProtocolExtraCompounds, &id, &extra_compounds)
                        .await?;
                }

                Ok::<_, ApiError>(store::from_row::<Protocol>(row)?)
            })
        })
        .await?;

        tracing::info!(protocol_id = %protocol.id, "protocol updated");
        self.notify_client(&protocol, "Protocol updated", "was updated");

        Ok(graph::protocol_details(self.store.as_ref(), protocol).await?)
    }

    /// Deletes the protocol and its links; the components stay.
    pub async fn delete(&self, session: &AccountSession, id: &str) -> Result<(), ApiError> {
        let owner = session.account_id.clone();
        let protocol_id = id.to_string();
        let id = id.to_string();

        store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut assembly = Assembly::new(tx, &owner);
                owned_protocol(&mut assembly, &id).await?;

                for relation in [
                    Relation::ProtocolDiets,
                    Relation::ProtocolTrains,
                    Relation::ProtocolHormonalProtocols,
                    Relation::ProtocolExtraCompounds,
                ] {
                    assembly.tx().unlink_all(relation, &id).await?;
                }
                assembly.tx().delete(Protocol::TABLE, &id).await?;

                Ok::<_, ApiError>(())
            })
        })
        .await?;

        tracing::info!(protocol_id = %protocol_id, "protocol deleted");
        Ok(())
    }

    fn notify_client(&self, protocol: &Protocol, title: &str, what_happened: &str) {
        self.outbox.publish(OutboundNotification::new(
            protocol.client_id.as_str(),
            title,
            format!("Protocol {} {what_happened}", protocol.name),
        ));
    }

    fn scope(session: &AccountSession) -> Filter {
        if session.is_coach() {
            Filter::equals("accountId", session.account_id.as_str())
        } else {
            Filter::equals("clientId", session.account_id.as_str())
        }
    }

    fn visible(session: &AccountSession, protocol: &Protocol) -> bool {
        protocol.account_id == session.account_id || protocol.client_id == session.account_id
    }
}

async fn owned_protocol(assembly: &mut Assembly<'_>, id: &str) -> Result<Protocol, ApiError> {
    let owner = assembly.owner().to_string();

    store::find_in::<Protocol>(assembly.tx(), id)
        .await?
        .filter(|protocol| protocol.account_id == owner)
        .ok_or(ApiError::NotFound("Protocol"))
}
