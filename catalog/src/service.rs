//! Admin-facing catalog of resource kinds.
//!
//! Holds a fetch-through policy cache so admission checks don't hit the
//! store on every request. The cache is invalidated by change events, never
//! trusted past one: consumers always go through `policy()`, which falls
//! back to the store on a miss.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use notify::{ChangeEvent, ChangeFeed, ChangeNotifier, Table};
use reservation::model::KindId;
use reservation::store::ReservationStore;

use crate::model::ResourceKind;
use crate::store::CatalogStore;

/// Result of a cascading kind deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub kind_existed: bool,

    /// How many future-dated reservations were purged with the kind. Past
    /// rows are retained for audit.
    pub purged_reservations: u64,
}

pub struct CatalogService<C: CatalogStore, R: ReservationStore> {
    store: Arc<C>,
    reservations: Arc<R>,
    cache: Mutex<HashMap<KindId, ResourceKind>>,
    notifier: ChangeNotifier,
}

impl<C, R> CatalogService<C, R>
where
    C: CatalogStore + 'static,
    R: ReservationStore + 'static,
{
    pub fn new(store: Arc<C>, reservations: Arc<R>, notifier: ChangeNotifier) -> Self {
        Self {
            store,
            reservations,
            cache: Mutex::new(HashMap::new()),
            notifier,
        }
    }

    /// Policy for one kind, cache first. `None` means the kind is not in the
    /// catalog at all (deleted or never defined).
    pub async fn policy(&self, kind: &KindId) -> anyhow::Result<Option<ResourceKind>> {
        {
            let cache = self.cache.lock().await;
            if let Some(hit) = cache.get(kind) {
                return Ok(Some(hit.clone()));
            }
        }

        let fetched = self.store.get(kind).await?;
        if let Some(ref k) = fetched {
            let mut cache = self.cache.lock().await;
            cache.insert(kind.clone(), k.clone());
        }
        Ok(fetched)
    }

    pub async fn list_active_kinds(&self) -> anyhow::Result<Vec<ResourceKind>> {
        self.store.list_active().await
    }

    pub async fn list_kinds(&self) -> anyhow::Result<Vec<ResourceKind>> {
        self.store.list_all().await
    }

    /// Create or update a kind and announce the change.
    pub async fn define_kind(&self, def: ResourceKind) -> anyhow::Result<()> {
        self.store.upsert(&def).await?;

        {
            let mut cache = self.cache.lock().await;
            cache.insert(def.kind.clone(), def.clone());
        }

        tracing::info!(kind = %def.kind, capacity = def.capacity_per_day, "kind defined");
        self.notifier.publish(Table::ResourceKinds);
        Ok(())
    }

    /// Deactivation blocks new admissions only; existing reservations are
    /// left untouched.
    pub async fn set_active(&self, kind: &KindId, active: bool) -> anyhow::Result<bool> {
        let found = self.store.set_active(kind, active).await?;
        if found {
            let mut cache = self.cache.lock().await;
            cache.remove(kind);
            drop(cache);

            tracing::info!(kind = %kind, active, "kind active flag changed");
            self.notifier.publish(Table::ResourceKinds);
        }
        Ok(found)
    }

    /// Delete a kind and purge its reservations dated `today` or later, as
    /// one logical operation. Past reservations stay for audit.
    pub async fn delete_kind_cascade(
        &self,
        kind: &KindId,
        today: NaiveDate,
    ) -> anyhow::Result<CascadeOutcome> {
        let purged_reservations = self.reservations.delete_future_for_kind(kind, today).await?;
        let kind_existed = self.store.delete(kind).await?;

        {
            let mut cache = self.cache.lock().await;
            cache.remove(kind);
        }

        tracing::info!(
            kind = %kind,
            purged = purged_reservations,
            existed = kind_existed,
            "kind deleted with cascade"
        );

        if purged_reservations > 0 {
            self.notifier.publish(Table::Reservations);
        }
        if kind_existed {
            self.notifier.publish(Table::ResourceKinds);
        }

        Ok(CascadeOutcome {
            kind_existed,
            purged_reservations,
        })
    }

    pub async fn invalidate_all(&self) {
        let mut cache = self.cache.lock().await;
        cache.clear();
    }

    /// Keep the policy cache honest against changes published elsewhere in
    /// the process. Coalesced/lagged feeds clear everything.
    pub fn spawn_cache_invalidation(
        self: Arc<Self>,
        mut feed: ChangeFeed,
    ) -> tokio::task::JoinHandle<()> {
        let service = self;
        tokio::spawn(async move {
            while let Some(event) = feed.changed().await {
                match event {
                    ChangeEvent::Touched(Table::ResourceKinds) | ChangeEvent::Resync => {
                        service.invalidate_all().await;
                    }
                    ChangeEvent::Touched(Table::Reservations) => {}
                }
            }
        })
    }
}
