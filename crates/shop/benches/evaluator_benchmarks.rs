use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

use storefront_catalog::{CategoryId, ProductId};
use storefront_core::UserId;
use storefront_events::execute;
use storefront_shop::{
    CartLine, CartSnapshot, CreateDiscountCode, Customer, DiscountCode, DiscountCodeCommand,
    DiscountCodeId, DiscountRules, DiscountType, evaluate,
};

fn discount(code: &str, discount_type: DiscountType) -> DiscountCode {
    let id = DiscountCodeId::for_code(code);
    let mut products = BTreeSet::new();
    for i in (0..1000).step_by(3) {
        products.insert(ProductId::for_slug(&format!("product-{i}")));
    }
    let rules = DiscountRules {
        description: String::new(),
        discount_type,
        discount_value: Decimal::new(5, 0),
        free_shipping: false,
        expires_at: Utc::now() + Duration::days(7),
        usage_limit: 0,
        usage_limit_per_user: 0,
        min_amount: None,
        max_amount: None,
        exclude_sale_items: true,
        individual_use_only: false,
        products,
        excluded_products: BTreeSet::new(),
        categories: BTreeSet::new(),
        excluded_categories: [CategoryId::for_slug("gift-cards")].into_iter().collect(),
        allowed_emails: String::new(),
    };

    let mut discount = DiscountCode::empty(id);
    execute(
        &mut discount,
        &DiscountCodeCommand::Create(CreateDiscountCode {
            code_id: id,
            code: code.to_string(),
            rules,
            is_active: true,
            occurred_at: Utc::now(),
        }),
    )
    .unwrap();
    discount
}

fn cart(lines: usize) -> CartSnapshot {
    CartSnapshot::new(
        (0..lines)
            .map(|i| CartLine {
                product_id: ProductId::for_slug(&format!("product-{i}")),
                category_id: Some(CategoryId::for_slug(if i % 7 == 0 { "gift-cards" } else { "mugs" })),
                quantity: (i % 5) as u32 + 1,
                unit_price: Decimal::new(1999, 2),
                on_sale: i % 4 == 0,
            })
            .collect(),
    )
}

fn bench_evaluate(c: &mut Criterion) {
    let codes: HashMap<String, DiscountCode> = [
        discount("PER-ITEM", DiscountType::FixedProduct),
        discount("TEN-PCT", DiscountType::Percentage),
    ]
    .into_iter()
    .map(|d| (d.code().to_string(), d))
    .collect();
    let customer = Customer {
        user_id: UserId::new(),
        email: Some("bench@example.com".to_string()),
    };

    let mut group = c.benchmark_group("discount_evaluation");
    for size in [10usize, 100, 1000] {
        let snapshot = cart(size);
        group.throughput(Throughput::Elements(size as u64));

        for code in ["PER-ITEM", "TEN-PCT"] {
            group.bench_with_input(BenchmarkId::new(code, size), &snapshot, |b, snapshot| {
                b.iter(|| {
                    evaluate(&codes, black_box(code), &customer, black_box(snapshot), Utc::now()).unwrap()
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
