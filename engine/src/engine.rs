//! One handle over the whole engine.
//!
//! Wires the catalog, the read path, admission, bounded retry and
//! cancellation over a shared store and change notifier. Collaborators
//! talk to this; the parts stay independently constructible for tests.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::SqlitePool;

use catalog::model::ResourceKind;
use catalog::service::{CascadeOutcome, CatalogService};
use catalog::store::CatalogStore;
use catalog::store::sqlite_store::SqliteCatalogStore;
use notify::{ChangeFeed, ChangeNotifier};
use reservation::model::{KindId, OwnerId, Reservation, ReservationId};
use reservation::store::ReservationStore;
use reservation::store::sqlite_store::SqliteReservationStore;

use crate::admission::AdmissionController;
use crate::availability::AvailabilityQuery;
use crate::cancellation::CancellationService;
use crate::config::EngineConfig;
use crate::notification::{LoggingNotificationSink, NotificationSink};
use crate::retry::{ConflictRetry, RetryPolicy};
use crate::types::{
    AdmissionOutcome, AdmissionRequest, Availability, CancelOutcome, Clock, LocalClock, Requester,
};

pub struct ReservationEngine<C: CatalogStore, R: ReservationStore> {
    catalog: Arc<CatalogService<C, R>>,
    reservations: Arc<R>,
    availability: Arc<AvailabilityQuery<C, R>>,
    admission: Arc<AdmissionController<C, R>>,
    retry: ConflictRetry<C, R>,
    cancellation: CancellationService<R>,
    notifier: ChangeNotifier,
    clock: Arc<dyn Clock>,
}

impl ReservationEngine<SqliteCatalogStore, SqliteReservationStore> {
    /// Connect to the configured database, ensure the schema, and wire the
    /// engine with the local clock and the logging sink.
    pub async fn connect(cfg: &EngineConfig) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(&cfg.database_url).await?;
        SqliteCatalogStore::migrate(&pool).await?;
        SqliteReservationStore::migrate(&pool).await?;

        Ok(Self::from_pool(pool, cfg))
    }

    /// Wire the engine over an existing pool whose schema is already in
    /// place.
    pub fn from_pool(pool: SqlitePool, cfg: &EngineConfig) -> Self {
        Self::new(
            Arc::new(SqliteCatalogStore::from_pool(pool.clone())),
            Arc::new(SqliteReservationStore::from_pool(pool)),
            cfg.retry_policy(),
            cfg.notifier_capacity,
            Arc::new(LocalClock),
            Arc::new(LoggingNotificationSink),
        )
    }
}

impl<C, R> ReservationEngine<C, R>
where
    C: CatalogStore + 'static,
    R: ReservationStore + 'static,
{
    pub fn new(
        catalog_store: Arc<C>,
        reservation_store: Arc<R>,
        retry_policy: RetryPolicy,
        notifier_capacity: usize,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let notifier = ChangeNotifier::new(notifier_capacity);
        let catalog = Arc::new(CatalogService::new(
            catalog_store,
            reservation_store.clone(),
            notifier.clone(),
        ));
        let _ = catalog.clone().spawn_cache_invalidation(notifier.subscribe());

        let availability = Arc::new(AvailabilityQuery::new(
            catalog.clone(),
            reservation_store.clone(),
        ));
        let admission = Arc::new(AdmissionController::new(
            catalog.clone(),
            reservation_store.clone(),
            notifier.clone(),
            sink.clone(),
            clock.clone(),
        ));
        let retry = ConflictRetry::new(
            admission.clone(),
            availability.clone(),
            reservation_store.clone(),
            retry_policy,
        );
        let cancellation = CancellationService::new(
            reservation_store.clone(),
            notifier.clone(),
            sink,
            clock.clone(),
        );

        Self {
            catalog,
            reservations: reservation_store,
            availability,
            admission,
            retry,
            cancellation,
            notifier,
            clock,
        }
    }

    // ---- read path ----

    pub async fn availability(
        &self,
        kind: &KindId,
        date: NaiveDate,
    ) -> anyhow::Result<Option<Availability>> {
        self.availability.availability(kind, date).await
    }

    pub async fn reservations_of(&self, owner: &OwnerId) -> anyhow::Result<Vec<Reservation>> {
        self.reservations.list_for_owner(owner).await
    }

    // ---- write path ----

    pub async fn admit(&self, req: AdmissionRequest) -> anyhow::Result<AdmissionOutcome> {
        self.admission.admit(req).await
    }

    pub async fn admit_with_retry(
        &self,
        req: AdmissionRequest,
    ) -> anyhow::Result<AdmissionOutcome> {
        self.retry.admit_with_retry(req).await
    }

    pub async fn cancel(
        &self,
        id: ReservationId,
        requester: &Requester,
    ) -> anyhow::Result<CancelOutcome> {
        self.cancellation.cancel(id, requester).await
    }

    pub async fn admin_cancel(&self, id: ReservationId) -> anyhow::Result<CancelOutcome> {
        self.cancellation.admin_cancel(id).await
    }

    // ---- catalog administration ----

    pub async fn define_kind(&self, def: ResourceKind) -> anyhow::Result<()> {
        self.catalog.define_kind(def).await
    }

    pub async fn set_kind_active(&self, kind: &KindId, active: bool) -> anyhow::Result<bool> {
        self.catalog.set_active(kind, active).await
    }

    pub async fn delete_kind_cascade(&self, kind: &KindId) -> anyhow::Result<CascadeOutcome> {
        self.catalog
            .delete_kind_cascade(kind, self.clock.today())
            .await
    }

    pub async fn list_active_kinds(&self) -> anyhow::Result<Vec<ResourceKind>> {
        self.catalog.list_active_kinds().await
    }

    /// Advisory change feed. On any event, re-query; never patch local state
    /// from the event itself.
    pub fn subscribe(&self) -> ChangeFeed {
        self.notifier.subscribe()
    }
}
