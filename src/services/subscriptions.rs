// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transactional operations on a subscription and its deliveries.
//!
//! Each operation follows the same cycle:
//! 1. take the subscription's in-process lock;
//! 2. re-read the subscription and its deliveries;
//! 3. apply the pure lifecycle/ledger/calendar functions in memory;
//! 4. commit every touched document in one [`ChangeSet`] guarded by the
//!    subscription's `version`.

use crate::db::{collections, ChangeSet, Query, Store};
use crate::error::{AppError, Result};
use crate::models::{
    Delivery, DeliveryStatus, GeoPoint, MenuItem, Notification, Subscription, User,
};
use crate::services::gate::Session;
use crate::services::ledger::{self, NewSubscription};
use crate::services::lifecycle::{self, LifecycleError};
use crate::services::calendar;
use crate::time_utils::{self, Clock};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-subscription mutexes shared by every request in this instance.
pub type SubscriptionLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Holds one subscription's lock. On release the map entry is dropped
/// unless another request holds or awaits the same mutex.
struct SubscriptionGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: SubscriptionLocks,
    subscription_id: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.guard.take();
        // The map's own reference is the only one left when idle.
        self.locks
            .remove_if(&self.subscription_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct SubscriptionService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    locks: SubscriptionLocks,
    utc_offset_minutes: i32,
}

/// Working copy of one subscription aggregate.
struct Aggregate {
    sub: Subscription,
    deliveries: Vec<Delivery>,
    changes: ChangeSet,
}

impl Aggregate {
    fn delivery_mut(&mut self, delivery_id: &str) -> Result<&mut Delivery> {
        self.deliveries
            .iter_mut()
            .find(|d| d.delivery_id == delivery_id)
            .ok_or_else(|| AppError::NotFound("Delivery not found".to_string()))
    }

    fn put_delivery(&mut self, delivery_id: &str) -> Result<()> {
        let delivery = self
            .deliveries
            .iter()
            .find(|d| d.delivery_id == delivery_id)
            .ok_or_else(|| AppError::NotFound("Delivery not found".to_string()))?;
        self.changes
            .put(collections::DELIVERIES, &delivery.delivery_id, delivery)?;
        Ok(())
    }

    fn notify(&mut self, notification: Notification) -> Result<()> {
        self.changes.put(
            collections::NOTIFICATIONS,
            &notification.notification_id,
            &notification,
        )?;
        Ok(())
    }
}

impl SubscriptionService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        locks: SubscriptionLocks,
        utc_offset_minutes: i32,
    ) -> Self {
        Self {
            store,
            clock,
            locks,
            utc_offset_minutes,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Kitchen-local wall-clock time.
    pub fn local_now(&self) -> NaiveDateTime {
        time_utils::local_now(self.clock.now(), self.utc_offset_minutes)
    }

    pub fn today(&self) -> NaiveDate {
        self.local_now().date()
    }

    async fn lock(&self, subscription_id: &str) -> SubscriptionGuard {
        let lock = self
            .locks
            .entry(subscription_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        SubscriptionGuard {
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
            subscription_id: subscription_id.to_string(),
        }
    }

    // ─── Loading ─────────────────────────────────────────────────

    pub async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription> {
        self.store
            .get_doc(collections::SUBSCRIPTIONS, subscription_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))
    }

    pub async fn get_delivery(&self, delivery_id: &str) -> Result<Delivery> {
        self.store
            .get_doc(collections::DELIVERIES, delivery_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Delivery not found".to_string()))
    }

    pub async fn deliveries_of(&self, subscription_id: &str) -> Result<Vec<Delivery>> {
        let mut deliveries: Vec<Delivery> = self
            .store
            .query_docs(
                collections::DELIVERIES,
                &Query::new().eq("subscription_id", subscription_id),
            )
            .await?;
        deliveries.sort_by(|a, b| {
            (a.delivery_date, a.meal_period).cmp(&(b.delivery_date, b.meal_period))
        });
        Ok(deliveries)
    }

    async fn active_menu(&self, kitchen_id: &str) -> Result<Vec<MenuItem>> {
        Ok(self
            .store
            .query_docs(
                collections::MENU_ITEMS,
                &Query::new()
                    .eq("kitchen_id", kitchen_id)
                    .eq("is_active", true),
            )
            .await?)
    }

    async fn load(&self, subscription_id: &str) -> Result<Aggregate> {
        Ok(Aggregate {
            sub: self.get_subscription(subscription_id).await?,
            deliveries: self.deliveries_of(subscription_id).await?,
            changes: ChangeSet::new(),
        })
    }

    /// Fill free slots after today and refresh the status.
    async fn top_up(&self, agg: &mut Aggregate, now: DateTime<Utc>) -> Result<usize> {
        let tomorrow = self.today() + Duration::days(1);
        let menu = self.active_menu(&agg.sub.kitchen_id).await?;
        let added = calendar::top_up(&agg.sub, &agg.deliveries, tomorrow, &menu, now);
        for delivery in &added {
            agg.changes
                .put(collections::DELIVERIES, &delivery.delivery_id, delivery)?;
        }
        let count = added.len();
        agg.deliveries.extend(added);
        ledger::refresh_status(&mut agg.sub, &agg.deliveries, self.today());
        Ok(count)
    }

    /// Bump the version and commit the aggregate's change set.
    async fn commit(&self, agg: &mut Aggregate, now: DateTime<Utc>) -> Result<()> {
        let expected = agg.sub.version;
        agg.sub.version = expected + 1;
        agg.sub.updated_at = now;
        let mut changes = std::mem::take(&mut agg.changes);
        changes.guard_version(
            collections::SUBSCRIPTIONS,
            &agg.sub.subscription_id,
            Some(expected),
        );
        changes.put(
            collections::SUBSCRIPTIONS,
            &agg.sub.subscription_id,
            &agg.sub,
        )?;
        self.store.commit(changes).await?;
        Ok(())
    }

    // ─── Ledger operations ───────────────────────────────────────

    /// Open a subscription and generate its full calendar before returning.
    pub async fn create(&self, new: NewSubscription) -> Result<(Subscription, Vec<Delivery>)> {
        let _guard = self.lock(&new.subscription_id).await;
        let now = self.now();
        let today = self.today();

        let mut sub = ledger::open(new, today, now)?;
        let menu = self.active_menu(&sub.kitchen_id).await?;
        let deliveries = calendar::top_up(&sub, &[], today, &menu, now);
        ledger::refresh_status(&mut sub, &deliveries, today);
        sub.version = 1;

        let mut changes = ChangeSet::new();
        changes.guard_version(collections::SUBSCRIPTIONS, &sub.subscription_id, None);
        changes.put(collections::SUBSCRIPTIONS, &sub.subscription_id, &sub)?;
        for delivery in &deliveries {
            changes.put(collections::DELIVERIES, &delivery.delivery_id, delivery)?;
        }
        self.store.commit(changes).await?;

        tracing::info!(
            subscription_id = %sub.subscription_id,
            customer_id = %sub.customer_id,
            kitchen_id = %sub.kitchen_id,
            plan_type = sub.plan_type.as_str(),
            total = sub.total_deliveries,
            generated = deliveries.len(),
            "Subscription created"
        );
        Ok((sub, deliveries))
    }

    pub async fn pause(&self, subscription_id: &str, dates: &[NaiveDate]) -> Result<Subscription> {
        let _guard = self.lock(subscription_id).await;
        let now = self.now();
        let mut agg = self.load(subscription_id).await?;

        let removed = ledger::pause(&mut agg.sub, dates, &agg.deliveries, self.today(), now)?;
        for id in &removed {
            agg.changes.delete(collections::DELIVERIES, id);
        }
        agg.deliveries.retain(|d| !removed.contains(&d.delivery_id));
        ledger::refresh_status(&mut agg.sub, &agg.deliveries, self.today());
        self.commit(&mut agg, now).await?;

        tracing::info!(
            subscription_id,
            dates = dates.len(),
            removed = removed.len(),
            "Subscription dates paused"
        );
        Ok(agg.sub)
    }

    pub async fn resume(&self, subscription_id: &str, dates: &[NaiveDate]) -> Result<Subscription> {
        let _guard = self.lock(subscription_id).await;
        let now = self.now();
        let mut agg = self.load(subscription_id).await?;

        ledger::resume(&mut agg.sub, dates, self.today(), now)?;
        let restored = self.top_up(&mut agg, now).await?;
        self.commit(&mut agg, now).await?;

        tracing::info!(
            subscription_id,
            dates = dates.len(),
            restored,
            "Subscription dates resumed"
        );
        Ok(agg.sub)
    }

    /// Admin cancellation of the whole subscription.
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
        session: &Session,
    ) -> Result<Subscription> {
        let _guard = self.lock(subscription_id).await;
        let now = self.now();
        let mut agg = self.load(subscription_id).await?;

        let cancelled = ledger::close(&mut agg.sub, &mut agg.deliveries, &session.user_id, now)?;
        for id in &cancelled {
            agg.put_delivery(id)?;
        }
        let customer_id = agg.sub.customer_id.clone();
        agg.notify(Notification::new(
            &customer_id,
            "subscription_cancelled",
            "Subscription cancelled",
            "Your meal subscription has been cancelled.",
            now,
        ))?;
        self.commit(&mut agg, now).await?;

        tracing::info!(
            subscription_id,
            cancelled = cancelled.len(),
            role = %session.role,
            "Subscription cancelled"
        );
        Ok(agg.sub)
    }

    // ─── Lifecycle operations ────────────────────────────────────

    pub async fn advance(
        &self,
        delivery_id: &str,
        target: DeliveryStatus,
        session: &Session,
    ) -> Result<Delivery> {
        let subscription_id = self.get_delivery(delivery_id).await?.subscription_id;
        let _guard = self.lock(&subscription_id).await;
        let now = self.now();
        let mut agg = self.load(&subscription_id).await?;

        let transition = lifecycle::advance(agg.delivery_mut(delivery_id)?, target, session, now)?;
        agg.put_delivery(delivery_id)?;

        let customer_id = agg.sub.customer_id.clone();
        match transition.to {
            DeliveryStatus::Dispatched => {
                agg.notify(
                    Notification::new(
                        &customer_id,
                        "delivery_dispatched",
                        "Your meal is on the way",
                        "Your meal has left the kitchen.",
                        now,
                    )
                    .for_delivery(delivery_id),
                )?;
            }
            DeliveryStatus::Delivered => {
                ledger::record_delivered(&mut agg.sub, now);
                ledger::refresh_status(&mut agg.sub, &agg.deliveries, self.today());
                agg.notify(
                    Notification::new(
                        &customer_id,
                        "delivery_delivered",
                        "Meal delivered",
                        "Enjoy your meal!",
                        now,
                    )
                    .for_delivery(delivery_id),
                )?;
            }
            _ => {}
        }
        self.commit(&mut agg, now).await?;

        tracing::info!(
            delivery_id,
            subscription_id = %subscription_id,
            from = %transition.from,
            to = %transition.to,
            role = %session.role,
            "Delivery status changed"
        );
        agg.delivery_mut(delivery_id).map(|d| d.clone())
    }

    pub async fn assign(
        &self,
        delivery_id: &str,
        delivery_boy: &User,
        session: &Session,
    ) -> Result<Delivery> {
        let subscription_id = self.get_delivery(delivery_id).await?.subscription_id;
        let _guard = self.lock(&subscription_id).await;
        let now = self.now();
        let mut agg = self.load(&subscription_id).await?;

        lifecycle::assign(agg.delivery_mut(delivery_id)?, delivery_boy, session, now)?;
        agg.put_delivery(delivery_id)?;
        agg.notify(
            Notification::new(
                &delivery_boy.user_id,
                "delivery_assigned",
                "New delivery assigned",
                "A delivery has been assigned to you.",
                now,
            )
            .for_delivery(delivery_id),
        )?;
        self.commit(&mut agg, now).await?;

        tracing::info!(
            delivery_id,
            subscription_id = %subscription_id,
            delivery_boy_id = %delivery_boy.user_id,
            role = %session.role,
            "Delivery assigned"
        );
        agg.delivery_mut(delivery_id).map(|d| d.clone())
    }

    /// Cancel one delivery inside an already-loaded aggregate: extend the
    /// window by a day and notify the customer.
    fn cancel_in(
        &self,
        agg: &mut Aggregate,
        delivery_id: &str,
        session: &Session,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let local_now = self.local_now();
        let delivery = agg.delivery_mut(delivery_id)?;
        let from = delivery.status;
        let kind = lifecycle::cancel(delivery, session, reason, local_now, now)?;
        agg.put_delivery(delivery_id)?;
        ledger::extend(&mut agg.sub, 1, now);

        let customer_id = agg.sub.customer_id.clone();
        let end_date = agg.sub.end_date;
        agg.notify(
            Notification::new(
                &customer_id,
                "delivery_cancelled",
                "Delivery cancelled",
                format!(
                    "Your delivery was cancelled. Your plan now ends on {}.",
                    end_date
                ),
                now,
            )
            .for_delivery(delivery_id),
        )?;

        tracing::info!(
            delivery_id,
            subscription_id = %agg.sub.subscription_id,
            from = %from,
            to = %DeliveryStatus::Cancelled,
            role = %session.role,
            by = ?kind,
            "Delivery cancelled"
        );
        Ok(())
    }

    pub async fn cancel_delivery(
        &self,
        delivery_id: &str,
        session: &Session,
        reason: Option<String>,
    ) -> Result<Delivery> {
        let subscription_id = self.get_delivery(delivery_id).await?.subscription_id;
        let _guard = self.lock(&subscription_id).await;
        let now = self.now();
        let mut agg = self.load(&subscription_id).await?;

        self.cancel_in(&mut agg, delivery_id, session, reason, now)?;
        self.top_up(&mut agg, now).await?;
        self.commit(&mut agg, now).await?;

        agg.delivery_mut(delivery_id).map(|d| d.clone())
    }

    /// Staff skip of every pending delivery on `date`.
    pub async fn skip_date(
        &self,
        subscription_id: &str,
        date: NaiveDate,
        session: &Session,
        reason: &str,
    ) -> Result<Vec<Delivery>> {
        let _guard = self.lock(subscription_id).await;
        let now = self.now();
        let mut agg = self.load(subscription_id).await?;

        let ids: Vec<String> = agg
            .deliveries
            .iter()
            .filter(|d| d.delivery_date == date && !d.status.is_terminal())
            .map(|d| d.delivery_id.clone())
            .collect();
        if ids.is_empty() {
            return Err(LifecycleError::InvalidDate {
                date,
                reason: "no pending delivery on this date".to_string(),
            }
            .into());
        }
        for id in &ids {
            self.cancel_in(&mut agg, id, session, Some(reason.to_string()), now)?;
        }
        self.top_up(&mut agg, now).await?;
        self.commit(&mut agg, now).await?;

        Ok(agg
            .deliveries
            .into_iter()
            .filter(|d| ids.contains(&d.delivery_id))
            .collect())
    }

    /// Move the scheduled deliveries of `from` to `to`.
    pub async fn reschedule(
        &self,
        subscription_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        session: &Session,
    ) -> Result<Vec<Delivery>> {
        let _guard = self.lock(subscription_id).await;
        let now = self.now();
        let mut agg = self.load(subscription_id).await?;
        let sub = &agg.sub;

        let invalid = |date: NaiveDate, reason: &str| -> AppError {
            LifecycleError::InvalidDate {
                date,
                reason: reason.to_string(),
            }
            .into()
        };
        if sub.status.is_closed() {
            return Err(LifecycleError::NotPermitted(format!(
                "Subscription is {}",
                sub.status.as_str()
            ))
            .into());
        }
        if to <= self.today() {
            return Err(invalid(to, "only future dates can be requested"));
        }
        if to < sub.start_date || to > sub.end_date {
            return Err(invalid(to, "outside the subscription window"));
        }
        if !sub.delivers_on(to) || sub.is_paused_on(to) {
            return Err(invalid(to, "not a delivery day for this subscription"));
        }

        let moving: Vec<Delivery> = agg
            .deliveries
            .iter()
            .filter(|d| d.delivery_date == from && d.status == DeliveryStatus::Scheduled)
            .cloned()
            .collect();
        if moving.is_empty() {
            return Err(invalid(from, "no scheduled delivery on this date"));
        }
        if moving.iter().any(|m| {
            agg.deliveries
                .iter()
                .any(|d| d.delivery_date == to && d.meal_period == m.meal_period)
        }) {
            return Err(invalid(to, "a delivery already exists on this date"));
        }

        let day_number = calendar::day_number_of(sub, to);
        let mut moved = Vec::with_capacity(moving.len());
        for old in moving {
            let mut new = old.clone();
            new.delivery_id =
                calendar::delivery_id_for(&old.subscription_id, to, old.meal_period);
            new.delivery_date = to;
            new.day_number = day_number;
            new.updated_at = now;
            agg.changes.delete(collections::DELIVERIES, &old.delivery_id);
            agg.changes
                .put(collections::DELIVERIES, &new.delivery_id, &new)?;
            agg.deliveries.retain(|d| d.delivery_id != old.delivery_id);
            agg.deliveries.push(new.clone());
            moved.push(new);
        }
        // Keep later top-ups from refilling the date the meals left.
        agg.sub.moved_dates.retain(|d| *d != to);
        agg.sub.moved_dates.push(from);
        agg.sub.moved_dates.sort();
        agg.sub.moved_dates.dedup();
        self.commit(&mut agg, now).await?;

        tracing::info!(
            subscription_id,
            %from,
            %to,
            moved = moved.len(),
            role = %session.role,
            "Deliveries rescheduled"
        );
        Ok(moved)
    }

    /// Record the assigned partner's position while the meal is out.
    pub async fn update_location(
        &self,
        delivery_id: &str,
        point: GeoPoint,
        session: &Session,
    ) -> Result<Delivery> {
        let subscription_id = self.get_delivery(delivery_id).await?.subscription_id;
        let _guard = self.lock(&subscription_id).await;
        let now = self.now();
        let mut agg = self.load(&subscription_id).await?;

        lifecycle::record_location(agg.delivery_mut(delivery_id)?, point, session, now)?;
        agg.put_delivery(delivery_id)?;
        self.commit(&mut agg, now).await?;

        tracing::debug!(delivery_id, "Delivery location updated");
        agg.delivery_mut(delivery_id).map(|d| d.clone())
    }
}
