// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Catalog routes: plans, menu items, weekly menu templates and banners.

use crate::db::{collections, Query, Store};
use crate::error::{AppError, Result};
use crate::models::{
    Banner, DeliveryDay, DietType, Kitchen, MealPeriod, MenuItem, MenuTemplate, Plan, PlanType,
    TemplateSlot,
};
use crate::routes::{load, new_id};
use crate::services::gate::{authorize, Action};
use crate::services::ledger::{self, PlanSelection};
use crate::services::{audit, Session};
use crate::AppState;
use axum::{
    extract::{Path, Query as QueryParams, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/plans", get(list_plans))
        .route("/api/plans/{id}", get(get_plan))
        .route("/api/banners", get(list_banners))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/plans", post(create_plan))
        .route("/api/plans/{id}", put(update_plan).delete(deactivate_plan))
        .route("/api/menu-items", get(list_menu_items).post(create_menu_item))
        .route(
            "/api/menu-items/{id}",
            get(get_menu_item)
                .put(update_menu_item)
                .delete(deactivate_menu_item),
        )
        .route(
            "/api/menu-templates",
            get(list_menu_templates).post(create_menu_template),
        )
        .route("/api/banners", post(create_banner))
        .route("/api/banners/{id}", put(update_banner).delete(delete_banner))
}

#[derive(Deserialize, Default)]
struct ActiveFilter {
    #[serde(default)]
    include_inactive: bool,
}

fn active_query(filter: &ActiveFilter) -> Query {
    if filter.include_inactive {
        Query::new()
    } else {
        Query::new().eq("is_active", true)
    }
}

// ─── Plans ───────────────────────────────────────────────────

async fn list_plans(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<ActiveFilter>,
) -> Result<Json<Vec<Plan>>> {
    let mut plans: Vec<Plan> = state
        .store
        .query_docs(collections::PLANS, &active_query(&filter))
        .await?;
    plans.sort_by(|a, b| a.price.total_cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
    Ok(Json(plans))
}

async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Plan>> {
    Ok(Json(
        load(state.store.as_ref(), collections::PLANS, &id, "Plan").await?,
    ))
}

#[derive(Deserialize, Validate)]
pub struct PlanRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    plan_type: PlanType,
    diet_type: DietType,
    #[serde(alias = "meals")]
    meal_periods: Vec<MealPeriod>,
    #[validate(range(min = 0.0))]
    price: f64,
    #[serde(default)]
    #[validate(length(max = 1000))]
    description: Option<String>,
    #[serde(default)]
    is_active: Option<bool>,
}

impl PlanRequest {
    /// Check the plan against the fixed plan catalog.
    fn check(&self) -> Result<()> {
        self.validate()?;
        ledger::validate_plan(&PlanSelection {
            plan_type: self.plan_type,
            diet_type: self.diet_type,
            meal_periods: self.meal_periods.clone(),
            delivery_days: None,
            delivery_day_count: None,
            validity_days: None,
        })?;
        Ok(())
    }
}

async fn create_plan(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<Plan>> {
    authorize(&session, Action::ManagePlans)?;
    req.check()?;

    let now = state.clock.now();
    let plan = Plan {
        plan_id: new_id("plan"),
        name: req.name.trim().to_string(),
        plan_type: req.plan_type,
        diet_type: req.diet_type,
        meal_periods: req.meal_periods,
        price: req.price,
        description: req.description,
        is_active: req.is_active.unwrap_or(true),
        created_at: now,
    };
    let store = state.store.as_ref();
    store.put_doc(collections::PLANS, &plan.plan_id, &plan).await?;

    audit::record(store, &session, "create", "plan", &plan.plan_id, None, now).await;
    Ok(Json(plan))
}

async fn update_plan(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<Plan>> {
    authorize(&session, Action::ManagePlans)?;
    req.check()?;
    let store = state.store.as_ref();
    let mut plan: Plan = load(store, collections::PLANS, &id, "Plan").await?;

    plan.name = req.name.trim().to_string();
    plan.plan_type = req.plan_type;
    plan.diet_type = req.diet_type;
    plan.meal_periods = req.meal_periods;
    plan.price = req.price;
    plan.description = req.description;
    if let Some(active) = req.is_active {
        plan.is_active = active;
    }
    store.put_doc(collections::PLANS, &id, &plan).await?;

    audit::record(store, &session, "update", "plan", &id, None, state.clock.now()).await;
    Ok(Json(plan))
}

/// Plans stay readable for the subscriptions that reference them.
async fn deactivate_plan(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Plan>> {
    authorize(&session, Action::ManagePlans)?;
    let store = state.store.as_ref();
    let mut plan: Plan = load(store, collections::PLANS, &id, "Plan").await?;
    plan.is_active = false;
    store.put_doc(collections::PLANS, &id, &plan).await?;

    audit::record(store, &session, "deactivate", "plan", &id, None, state.clock.now()).await;
    Ok(Json(plan))
}

// ─── Menu items ──────────────────────────────────────────────

#[derive(Deserialize)]
struct MenuFilter {
    kitchen_id: Option<String>,
    meal_period: Option<MealPeriod>,
    diet_type: Option<DietType>,
    #[serde(default)]
    include_inactive: bool,
}

async fn list_menu_items(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<MenuFilter>,
) -> Result<Json<Vec<MenuItem>>> {
    let mut query = Query::new()
        .eq_opt("kitchen_id", filter.kitchen_id)
        .eq_opt("meal_period", filter.meal_period.map(MealPeriod::as_str));
    if !filter.include_inactive {
        query = query.eq("is_active", true);
    }
    let mut items: Vec<MenuItem> = state
        .store
        .query_docs(collections::MENU_ITEMS, &query)
        .await?;
    if let Some(diet) = filter.diet_type {
        items.retain(|item| item.diet_type == diet);
    }
    items.sort_by(|a, b| {
        (a.meal_period, &a.category, &a.name).cmp(&(b.meal_period, &b.category, &b.name))
    });
    Ok(Json(items))
}

async fn get_menu_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MenuItem>> {
    Ok(Json(
        load(state.store.as_ref(), collections::MENU_ITEMS, &id, "Menu item").await?,
    ))
}

#[derive(Deserialize, Validate)]
pub struct MenuItemRequest {
    #[validate(length(min = 1))]
    kitchen_id: String,
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(length(min = 1, max = 50))]
    category: String,
    meal_period: MealPeriod,
    diet_type: DietType,
    #[validate(range(max = 5000))]
    calories: u32,
    #[validate(range(min = 0.0, max = 1000.0))]
    protein: f64,
    #[validate(range(min = 0.0, max = 1000.0))]
    carbs: f64,
    #[validate(range(min = 0.0, max = 1000.0))]
    fat: f64,
    #[serde(default)]
    #[validate(length(max = 500))]
    image_url: Option<String>,
    #[serde(default)]
    is_active: Option<bool>,
}

/// Menu writes need the menu permission and, for kitchen managers, their
/// own kitchen.
fn authorize_menu(session: &Session, kitchen_id: &str) -> Result<()> {
    authorize(session, Action::ManageMenu)?;
    if !session.owns_kitchen(kitchen_id) {
        return Err(AppError::Forbidden(
            "Menu belongs to another kitchen".to_string(),
        ));
    }
    Ok(())
}

async fn active_kitchen(store: &dyn Store, kitchen_id: &str) -> Result<Kitchen> {
    let kitchen: Kitchen = load(store, collections::KITCHENS, kitchen_id, "Kitchen").await?;
    if !kitchen.is_active {
        return Err(AppError::BadRequest("Kitchen is not active".to_string()));
    }
    Ok(kitchen)
}

async fn create_menu_item(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<MenuItemRequest>,
) -> Result<Json<MenuItem>> {
    authorize_menu(&session, &req.kitchen_id)?;
    req.validate()?;
    let store = state.store.as_ref();
    let kitchen = active_kitchen(store, &req.kitchen_id).await?;

    let now = state.clock.now();
    let item = MenuItem {
        item_id: new_id("item"),
        kitchen_id: kitchen.kitchen_id,
        name: req.name.trim().to_string(),
        category: req.category,
        meal_period: req.meal_period,
        diet_type: req.diet_type,
        calories: req.calories,
        protein: req.protein,
        carbs: req.carbs,
        fat: req.fat,
        image_url: req.image_url,
        is_active: req.is_active.unwrap_or(true),
        created_at: now,
    };
    store
        .put_doc(collections::MENU_ITEMS, &item.item_id, &item)
        .await?;

    audit::record(store, &session, "create", "menu_item", &item.item_id, None, now).await;
    Ok(Json(item))
}

async fn update_menu_item(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<MenuItemRequest>,
) -> Result<Json<MenuItem>> {
    req.validate()?;
    let store = state.store.as_ref();
    let mut item: MenuItem = load(store, collections::MENU_ITEMS, &id, "Menu item").await?;
    authorize_menu(&session, &item.kitchen_id)?;
    if req.kitchen_id != item.kitchen_id {
        return Err(AppError::BadRequest(
            "Menu items cannot move between kitchens".to_string(),
        ));
    }

    item.name = req.name.trim().to_string();
    item.category = req.category;
    item.meal_period = req.meal_period;
    item.diet_type = req.diet_type;
    item.calories = req.calories;
    item.protein = req.protein;
    item.carbs = req.carbs;
    item.fat = req.fat;
    item.image_url = req.image_url;
    if let Some(active) = req.is_active {
        item.is_active = active;
    }
    store.put_doc(collections::MENU_ITEMS, &id, &item).await?;

    audit::record(store, &session, "update", "menu_item", &id, None, state.clock.now()).await;
    Ok(Json(item))
}

async fn deactivate_menu_item(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<MenuItem>> {
    let store = state.store.as_ref();
    let mut item: MenuItem = load(store, collections::MENU_ITEMS, &id, "Menu item").await?;
    authorize_menu(&session, &item.kitchen_id)?;
    item.is_active = false;
    store.put_doc(collections::MENU_ITEMS, &id, &item).await?;

    audit::record(store, &session, "deactivate", "menu_item", &id, None, state.clock.now()).await;
    Ok(Json(item))
}

// ─── Menu templates ──────────────────────────────────────────

#[derive(Deserialize)]
struct TemplateFilter {
    kitchen_id: Option<String>,
}

async fn list_menu_templates(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    QueryParams(filter): QueryParams<TemplateFilter>,
) -> Result<Json<Vec<MenuTemplate>>> {
    authorize(&session, Action::ViewMenuTemplates)?;
    // Kitchen-bound roles only see their own kitchen's templates.
    let kitchen_id = if session.role.requires_kitchen() {
        session.kitchen_id.clone()
    } else {
        filter.kitchen_id
    };
    let mut templates: Vec<MenuTemplate> = state
        .store
        .query_docs(
            collections::MENU_TEMPLATES,
            &Query::new().eq_opt("kitchen_id", kitchen_id),
        )
        .await?;
    templates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(templates))
}

#[derive(Deserialize, Validate)]
pub struct MenuTemplateRequest {
    #[validate(length(min = 1))]
    kitchen_id: String,
    #[validate(length(min = 1, max = 100))]
    name: String,
    diet_type: DietType,
    #[validate(length(min = 1, max = 100))]
    slots: Vec<TemplateSlot>,
}

/// Every slot must name an item of the template's kitchen served in the
/// slot's meal period, and no slot may fall on Sunday.
fn check_slots(slots: &[TemplateSlot], items: &HashMap<String, MenuItem>) -> Result<()> {
    for slot in slots {
        if slot.weekday == DeliveryDay::Sunday {
            return Err(AppError::BadRequest(
                "Menu templates cannot include Sunday".to_string(),
            ));
        }
        match items.get(&slot.item_id) {
            None => {
                return Err(AppError::BadRequest(format!(
                    "Menu item {} is not on this kitchen's menu",
                    slot.item_id
                )));
            }
            Some(item) if item.meal_period != slot.meal_period => {
                return Err(AppError::BadRequest(format!(
                    "{} is a {} item",
                    item.name, item.meal_period
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

async fn create_menu_template(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<MenuTemplateRequest>,
) -> Result<Json<MenuTemplate>> {
    authorize_menu(&session, &req.kitchen_id)?;
    req.validate()?;
    let store = state.store.as_ref();
    let kitchen = active_kitchen(store, &req.kitchen_id).await?;

    let items: HashMap<String, MenuItem> = store
        .query_docs::<MenuItem>(
            collections::MENU_ITEMS,
            &Query::new().eq("kitchen_id", kitchen.kitchen_id.as_str()),
        )
        .await?
        .into_iter()
        .map(|item| (item.item_id.clone(), item))
        .collect();
    check_slots(&req.slots, &items)?;

    let now = state.clock.now();
    let template = MenuTemplate {
        template_id: new_id("tmpl"),
        kitchen_id: kitchen.kitchen_id,
        name: req.name.trim().to_string(),
        diet_type: req.diet_type,
        slots: req.slots,
        created_at: now,
    };
    store
        .put_doc(collections::MENU_TEMPLATES, &template.template_id, &template)
        .await?;

    audit::record(
        store,
        &session,
        "create",
        "menu_template",
        &template.template_id,
        None,
        now,
    )
    .await;
    Ok(Json(template))
}

// ─── Banners ─────────────────────────────────────────────────

async fn list_banners(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<ActiveFilter>,
) -> Result<Json<Vec<Banner>>> {
    let mut banners: Vec<Banner> = state
        .store
        .query_docs(collections::BANNERS, &active_query(&filter))
        .await?;
    banners.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(banners))
}

#[derive(Deserialize, Validate)]
pub struct BannerRequest {
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[validate(length(min = 1, max = 500))]
    image_url: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    link: Option<String>,
    #[serde(default)]
    is_active: Option<bool>,
}

async fn create_banner(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<BannerRequest>,
) -> Result<Json<Banner>> {
    authorize(&session, Action::ManageBanners)?;
    req.validate()?;

    let now = state.clock.now();
    let banner = Banner {
        banner_id: new_id("banner"),
        title: req.title,
        image_url: req.image_url,
        link: req.link,
        is_active: req.is_active.unwrap_or(true),
        created_at: now,
    };
    let store = state.store.as_ref();
    store
        .put_doc(collections::BANNERS, &banner.banner_id, &banner)
        .await?;

    audit::record(store, &session, "create", "banner", &banner.banner_id, None, now).await;
    Ok(Json(banner))
}

async fn update_banner(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<BannerRequest>,
) -> Result<Json<Banner>> {
    authorize(&session, Action::ManageBanners)?;
    req.validate()?;
    let store = state.store.as_ref();
    let mut banner: Banner = load(store, collections::BANNERS, &id, "Banner").await?;

    banner.title = req.title;
    banner.image_url = req.image_url;
    banner.link = req.link;
    if let Some(active) = req.is_active {
        banner.is_active = active;
    }
    store.put_doc(collections::BANNERS, &id, &banner).await?;

    audit::record(store, &session, "update", "banner", &id, None, state.clock.now()).await;
    Ok(Json(banner))
}

async fn delete_banner(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<crate::routes::auth::MessageResponse>> {
    authorize(&session, Action::ManageBanners)?;
    let store = state.store.as_ref();
    let _: Banner = load(store, collections::BANNERS, &id, "Banner").await?;
    store.delete(collections::BANNERS, &id).await?;

    audit::record(store, &session, "delete", "banner", &id, None, state.clock.now()).await;
    Ok(Json(crate::routes::auth::MessageResponse {
        message: "Banner deleted".to_string(),
    }))
}
