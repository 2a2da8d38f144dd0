//! Per-item eligibility for `fixed_product` discounts.
//!
//! An empty inclusion set admits everything; an empty exclusion set excludes
//! nothing. A line is eligible only if every rule admits it.

use super::code::DiscountRules;
use super::evaluator::CartLine;

type ItemRule = fn(&DiscountRules, &CartLine) -> bool;

const ITEM_RULES: &[ItemRule] = &[
    included_product,
    not_excluded_product,
    included_category,
    not_excluded_category,
    sale_items_allowed,
];

pub fn is_eligible(rules: &DiscountRules, line: &CartLine) -> bool {
    ITEM_RULES.iter().all(|rule| rule(rules, line))
}

fn included_product(rules: &DiscountRules, line: &CartLine) -> bool {
    rules.products.is_empty() || rules.products.contains(&line.product_id)
}

fn not_excluded_product(rules: &DiscountRules, line: &CartLine) -> bool {
    !rules.excluded_products.contains(&line.product_id)
}

fn included_category(rules: &DiscountRules, line: &CartLine) -> bool {
    rules.categories.is_empty()
        || line
            .category_id
            .is_some_and(|category| rules.categories.contains(&category))
}

fn not_excluded_category(rules: &DiscountRules, line: &CartLine) -> bool {
    line.category_id
        .is_none_or(|category| !rules.excluded_categories.contains(&category))
}

fn sale_items_allowed(rules: &DiscountRules, line: &CartLine) -> bool {
    !(rules.exclude_sale_items && line.on_sale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::code::DiscountType;
    use crate::discount::code::tests::rules;
    use rust_decimal::Decimal;
    use storefront_catalog::{CategoryId, ProductId};

    fn line(product: &str, category: Option<&str>, on_sale: bool) -> CartLine {
        CartLine {
            product_id: ProductId::for_slug(product),
            category_id: category.map(CategoryId::for_slug),
            quantity: 1,
            unit_price: Decimal::new(10, 0),
            on_sale,
        }
    }

    #[test]
    fn unrestricted_rules_admit_everything() {
        let r = rules(DiscountType::FixedProduct, 1);
        assert!(is_eligible(&r, &line("mug", None, true)));
        assert!(is_eligible(&r, &line("tee", Some("apparel"), false)));
    }

    #[test]
    fn product_sets_include_and_exclude() {
        let mut r = rules(DiscountType::FixedProduct, 1);
        r.products.insert(ProductId::for_slug("mug"));
        assert!(is_eligible(&r, &line("mug", None, false)));
        assert!(!is_eligible(&r, &line("tee", None, false)));

        let mut r = rules(DiscountType::FixedProduct, 1);
        r.excluded_products.insert(ProductId::for_slug("mug"));
        assert!(!is_eligible(&r, &line("mug", None, false)));
        assert!(is_eligible(&r, &line("tee", None, false)));
    }

    #[test]
    fn category_sets_include_and_exclude() {
        let mut r = rules(DiscountType::FixedProduct, 1);
        r.categories.insert(CategoryId::for_slug("kitchen"));
        assert!(is_eligible(&r, &line("mug", Some("kitchen"), false)));
        assert!(!is_eligible(&r, &line("tee", Some("apparel"), false)));
        assert!(!is_eligible(&r, &line("loose", None, false)));

        let mut r = rules(DiscountType::FixedProduct, 1);
        r.excluded_categories.insert(CategoryId::for_slug("apparel"));
        assert!(!is_eligible(&r, &line("tee", Some("apparel"), false)));
        assert!(is_eligible(&r, &line("loose", None, false)));
    }

    #[test]
    fn sale_items_can_be_excluded() {
        let mut r = rules(DiscountType::FixedProduct, 1);
        r.exclude_sale_items = true;
        assert!(!is_eligible(&r, &line("mug", None, true)));
        assert!(is_eligible(&r, &line("mug", None, false)));
    }
}
