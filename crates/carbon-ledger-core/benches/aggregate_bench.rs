use criterion::{criterion_group, criterion_main, Criterion};
use carbon_ledger_core::{
    by_category, by_month_and_scope, summarize, DataQuality, EmissionRecord, RecordedAmount, Scope,
    VerificationStatus,
};
use serde_json::Map;

const CATEGORIES: [(&str, Scope); 6] = [
    ("Stationary Combustion", Scope::Scope1),
    ("Mobile Combustion", Scope::Scope1),
    ("Electricity", Scope::Scope2),
    ("Business Travel", Scope::Scope3),
    ("Freight Transportation", Scope::Scope3),
    ("Waste Management", Scope::Scope3),
];

fn mk_record(index: usize) -> EmissionRecord {
    let (category, scope) = CATEGORIES[index % CATEGORIES.len()];
    let quantity = f64::from(u32::try_from(index % 997).unwrap_or(0)) + 1.0;
    let emission_factor = 0.6815;

    EmissionRecord {
        date: format!("2024-{:02}-{:02}", index % 12 + 1, index % 28 + 1),
        business_unit: "Corporate".to_string(),
        project: "Not Applicable".to_string(),
        scope,
        category: category.to_string(),
        activity: "bench".to_string(),
        country: "Bangladesh".to_string(),
        facility: String::new(),
        responsible_person: String::new(),
        quantity,
        unit: "kWh".to_string(),
        emission_factor,
        emissions_kgco2e: RecordedAmount::Numeric(quantity * emission_factor),
        data_quality: DataQuality::Medium,
        verification_status: VerificationStatus::Unverified,
        notes: String::new(),
        extra: Map::new(),
    }
}

fn bench_category(c: &mut Criterion) {
    let records = (0..10_000).map(mk_record).collect::<Vec<_>>();

    c.bench_function("by_category_10000_records", |b| {
        b.iter(|| {
            let totals = by_category(&records);
            if totals.len() != CATEGORIES.len() {
                panic!("category benchmark produced {} groups", totals.len());
            }
        });
    });
}

fn bench_monthly(c: &mut Criterion) {
    let records = (0..10_000).map(mk_record).collect::<Vec<_>>();

    c.bench_function("by_month_and_scope_10000_records", |b| {
        b.iter(|| {
            let totals = by_month_and_scope(&records);
            if totals.is_empty() {
                panic!("monthly benchmark produced no groups");
            }
        });
    });
}

fn bench_summary(c: &mut Criterion) {
    let records = (0..10_000).map(mk_record).collect::<Vec<_>>();

    c.bench_function("summarize_10000_records", |b| {
        b.iter(|| summarize(&records));
    });
}

criterion_group!(aggregate_benches, bench_category, bench_monthly, bench_summary);
criterion_main!(aggregate_benches);
