//! Discount evaluation: decide whether a code applies to a cart and how much it takes off.
//!
//! Evaluation is read-only. Recording a redemption is a separate command on the
//! `DiscountCode` aggregate, issued once the order exists.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_catalog::{CategoryId, ProductId};
use storefront_core::{Money, UserId, round_money};

use super::code::{DiscountCode, DiscountRules, DiscountType};
use super::rules::is_eligible;

/// One cart line as priced right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub category_id: Option<CategoryId>,
    pub quantity: u32,
    pub unit_price: Money,
    pub on_sale: bool,
}

impl CartLine {
    /// Saturates instead of overflowing; see [`CartLine::checked_line_total`].
    pub fn line_total(&self) -> Money {
        self.unit_price.saturating_mul(Money::from(self.quantity))
    }

    pub fn checked_line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(Money::from(self.quantity))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    pub fn new(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::ZERO, |acc, line| acc.saturating_add(line.line_total()))
    }

    /// `None` when the total does not fit in a decimal.
    pub fn checked_total(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::ZERO, |acc, line| acc.checked_add(line.checked_line_total()?))
    }
}

/// The user a code is evaluated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub user_id: UserId,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountOutcome {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Money,
    pub discount_amount: Money,
    pub free_shipping: bool,
}

/// Why a code does not apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountRejection {
    #[error("a discount code is required")]
    MissingCode,
    #[error("discount code not found")]
    CodeNotFound,
    #[error("discount code is expired or inactive")]
    CodeExpired,
    #[error("you have already used this discount code the maximum number of times")]
    PerUserLimitExceeded,
    #[error("this discount code is not available for your email address")]
    EmailNotAllowed,
    #[error("cart total must be at least {minimum}")]
    BelowMinimum { minimum: Money },
    #[error("cart total must be at most {maximum}")]
    AboveMaximum { maximum: Money },
    #[error("cart or discount amount is out of range")]
    AmountOutOfRange,
}

impl DiscountRejection {
    /// Stable machine-readable reason.
    pub fn reason_code(&self) -> &'static str {
        match self {
            DiscountRejection::MissingCode => "missing_code",
            DiscountRejection::CodeNotFound => "code_not_found",
            DiscountRejection::CodeExpired => "code_expired",
            DiscountRejection::PerUserLimitExceeded => "per_user_limit_exceeded",
            DiscountRejection::EmailNotAllowed => "email_not_allowed",
            DiscountRejection::BelowMinimum { .. } => "below_minimum",
            DiscountRejection::AboveMaximum { .. } => "above_maximum",
            DiscountRejection::AmountOutOfRange => "amount_out_of_range",
        }
    }

    /// 404 for an unknown code, 400 for everything else.
    pub fn status_code(&self) -> u16 {
        match self {
            DiscountRejection::CodeNotFound => 404,
            _ => 400,
        }
    }
}

#[derive(Debug, Error)]
pub enum EvaluationError<E> {
    #[error(transparent)]
    Rejected(#[from] DiscountRejection),
    #[error("discount lookup failed: {0:?}")]
    Lookup(E),
}

/// Source of discount codes, by exact code string.
pub trait DiscountLookup {
    type Error: core::fmt::Debug;

    fn find_code(&self, code: &str) -> Result<Option<DiscountCode>, Self::Error>;
}

impl DiscountLookup for HashMap<String, DiscountCode> {
    type Error = Infallible;

    fn find_code(&self, code: &str) -> Result<Option<DiscountCode>, Self::Error> {
        Ok(self.get(code).cloned())
    }
}

impl DiscountLookup for BTreeMap<String, DiscountCode> {
    type Error = Infallible;

    fn find_code(&self, code: &str) -> Result<Option<DiscountCode>, Self::Error> {
        Ok(self.get(code).cloned())
    }
}

struct EvaluationContext<'a> {
    discount: &'a DiscountCode,
    rules: &'a DiscountRules,
    customer: &'a Customer,
    cart_total: Money,
    now: DateTime<Utc>,
}

type Check = fn(&EvaluationContext<'_>) -> Result<(), DiscountRejection>;

/// Checks that run once the code has been found, in order.
const CHECKS: &[Check] = &[
    check_live,
    check_per_user_limit,
    check_email,
    check_minimum,
    check_maximum,
];

fn check_live(ctx: &EvaluationContext<'_>) -> Result<(), DiscountRejection> {
    if ctx.discount.is_live_at(ctx.now) {
        Ok(())
    } else {
        Err(DiscountRejection::CodeExpired)
    }
}

fn check_per_user_limit(ctx: &EvaluationContext<'_>) -> Result<(), DiscountRejection> {
    let limit = ctx.rules.usage_limit_per_user;
    if limit > 0 && ctx.discount.usage_count_for(ctx.customer.user_id) >= limit as usize {
        return Err(DiscountRejection::PerUserLimitExceeded);
    }
    Ok(())
}

fn check_email(ctx: &EvaluationContext<'_>) -> Result<(), DiscountRejection> {
    if ctx.rules.allows_email(ctx.customer.email.as_deref()) {
        Ok(())
    } else {
        Err(DiscountRejection::EmailNotAllowed)
    }
}

fn check_minimum(ctx: &EvaluationContext<'_>) -> Result<(), DiscountRejection> {
    match ctx.rules.min_amount {
        Some(minimum) if ctx.cart_total < minimum => Err(DiscountRejection::BelowMinimum { minimum }),
        _ => Ok(()),
    }
}

fn check_maximum(ctx: &EvaluationContext<'_>) -> Result<(), DiscountRejection> {
    match ctx.rules.max_amount {
        Some(maximum) if ctx.cart_total > maximum => Err(DiscountRejection::AboveMaximum { maximum }),
        _ => Ok(()),
    }
}

fn discount_amount(rules: &DiscountRules, cart: &CartSnapshot, cart_total: Money) -> Option<Money> {
    let raw = match rules.discount_type {
        DiscountType::Percentage => cart_total.checked_mul(rules.discount_value)? / Money::ONE_HUNDRED,
        DiscountType::FixedCart => rules.discount_value,
        DiscountType::FixedProduct => cart
            .lines
            .iter()
            .filter(|line| is_eligible(rules, line))
            .try_fold(Money::ZERO, |acc, line| {
                acc.checked_add(rules.discount_value.checked_mul(Money::from(line.quantity))?)
            })?,
    };
    Some(round_money(raw))
}

/// Evaluate `code` for `customer` against the current `cart`.
///
/// Short-circuits on the first failing check. Global `usage_limit` and
/// `individual_use_only` are not considered here.
pub fn evaluate<L>(
    lookup: &L,
    code: &str,
    customer: &Customer,
    cart: &CartSnapshot,
    now: DateTime<Utc>,
) -> Result<DiscountOutcome, EvaluationError<L::Error>>
where
    L: DiscountLookup + ?Sized,
{
    if code.is_empty() {
        return Err(DiscountRejection::MissingCode.into());
    }
    let discount = lookup
        .find_code(code)
        .map_err(EvaluationError::Lookup)?
        .ok_or(DiscountRejection::CodeNotFound)?;
    let rules = discount.rules().ok_or(DiscountRejection::CodeNotFound)?;

    let ctx = EvaluationContext {
        discount: &discount,
        rules,
        customer,
        cart_total: cart.checked_total().ok_or(DiscountRejection::AmountOutOfRange)?,
        now,
    };
    for check in CHECKS {
        check(&ctx)?;
    }
    let amount = discount_amount(rules, cart, ctx.cart_total).ok_or(DiscountRejection::AmountOutOfRange)?;

    Ok(DiscountOutcome {
        code: discount.code().to_string(),
        discount_type: rules.discount_type,
        discount_value: rules.discount_value,
        discount_amount: amount,
        free_shipping: rules.free_shipping,
    })
}
