use chrono::{Duration, NaiveDate, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use foodfleet::models::{DeliveryStatus, DietType, MealPeriod, PlanType};
use foodfleet::services::calendar;
use foodfleet::services::ledger::{self, NewSubscription, PlanSelection};

fn monthly_subscription() -> foodfleet::models::Subscription {
    let today = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
    ledger::open(
        NewSubscription {
            subscription_id: "sub_bench".to_string(),
            customer_id: "cust_bench".to_string(),
            kitchen_id: "kit_bench".to_string(),
            plan_id: None,
            plan: PlanSelection {
                plan_type: PlanType::Monthly,
                diet_type: DietType::Mixed,
                meal_periods: MealPeriod::ALL.to_vec(),
                delivery_days: None,
                delivery_day_count: None,
                validity_days: None,
            },
            start_date: today + Duration::days(1),
            amount: Some(8999.0),
            address: "12 MG Road".to_string(),
            location: None,
            allergy_notes: None,
        },
        today,
        Utc::now(),
    )
    .expect("valid plan")
}

fn benchmark_calendar(c: &mut Criterion) {
    let sub = monthly_subscription();
    let full = calendar::top_up(&sub, &[], sub.start_date, &[], Utc::now());

    // Every fourth delivery cancelled, as after a run of skips.
    let mut holed = full.clone();
    for delivery in holed.iter_mut().step_by(4) {
        delivery.status = DeliveryStatus::Cancelled;
    }

    let mut group = c.benchmark_group("calendar");

    group.bench_function("monthly_three_meals_fresh", |b| {
        b.iter(|| calendar::plan_top_up(black_box(&sub), &[], sub.start_date))
    });

    group.bench_function("monthly_three_meals_top_up", |b| {
        b.iter(|| calendar::plan_top_up(black_box(&sub), black_box(&holed), sub.start_date))
    });

    group.finish();
}

criterion_group!(benches, benchmark_calendar);
criterion_main!(benches);
