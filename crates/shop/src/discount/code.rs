use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::{CategoryId, ProductId};
use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, UserId, ensure_storable};
use storefront_events::Event;

use crate::order::OrderId;

pub const MAX_CODE_LENGTH: usize = 50;

/// Discount code identifier, derived from the code string.
///
/// Two `CreateDiscountCode` commands for the same code land on the same
/// stream, so uniqueness falls out of the optimistic append.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountCodeId(pub AggregateId);

impl DiscountCodeId {
    pub fn for_code(code: &str) -> Self {
        Self(AggregateId::derived("shop.discount", code.as_bytes()))
    }
}

impl core::fmt::Display for DiscountCodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` percent of the cart total.
    Percentage,
    /// Flat `discount_value` off the cart.
    FixedCart,
    /// `discount_value` per eligible unit.
    FixedProduct,
}

impl DiscountType {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::FixedCart => "fixed_cart",
            DiscountType::FixedProduct => "fixed_product",
        }
    }
}

/// Every editable property of a code (everything except the code string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRules {
    #[serde(default)]
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: Money,
    #[serde(default)]
    pub free_shipping: bool,
    pub expires_at: DateTime<Utc>,
    /// 0 = unlimited.
    #[serde(default)]
    pub usage_limit: u32,
    /// 0 = unlimited.
    #[serde(default)]
    pub usage_limit_per_user: u32,
    #[serde(default)]
    pub min_amount: Option<Money>,
    #[serde(default)]
    pub max_amount: Option<Money>,
    #[serde(default)]
    pub exclude_sale_items: bool,
    #[serde(default)]
    pub individual_use_only: bool,
    #[serde(default)]
    pub products: BTreeSet<ProductId>,
    #[serde(default)]
    pub excluded_products: BTreeSet<ProductId>,
    #[serde(default)]
    pub categories: BTreeSet<CategoryId>,
    #[serde(default)]
    pub excluded_categories: BTreeSet<CategoryId>,
    /// One address per line; empty means anyone may use the code.
    #[serde(default)]
    pub allowed_emails: String,
}

impl DiscountRules {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.discount_value < Money::ZERO {
            return Err(DomainError::validation("discount value must not be negative"));
        }
        if self.discount_type == DiscountType::Percentage && self.discount_value > Money::ONE_HUNDRED {
            return Err(DomainError::validation("percentage discount must not exceed 100"));
        }
        ensure_storable("discount value", self.discount_value)?;
        if self.min_amount.is_some_and(|m| m < Money::ZERO) || self.max_amount.is_some_and(|m| m < Money::ZERO) {
            return Err(DomainError::validation("amount bounds must not be negative"));
        }
        for bound in [self.min_amount, self.max_amount].into_iter().flatten() {
            ensure_storable("amount bound", bound)?;
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(DomainError::validation("min_amount must not exceed max_amount"));
            }
        }
        Ok(())
    }

    /// Parsed allow-list: trimmed, non-blank lines.
    pub fn allowed_email_list(&self) -> impl Iterator<Item = &str> {
        self.allowed_emails
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }

    pub fn restricts_emails(&self) -> bool {
        self.allowed_email_list().next().is_some()
    }

    /// Email comparison is ASCII case-insensitive; no email never matches.
    pub fn allows_email(&self, email: Option<&str>) -> bool {
        if !self.restricts_emails() {
            return true;
        }
        let Some(email) = email.map(str::trim) else {
            return false;
        };
        self.allowed_email_list().any(|allowed| allowed.eq_ignore_ascii_case(email))
    }
}

/// One recorded redemption of a code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountUsage {
    pub user_id: UserId,
    pub order_id: OrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub used_at: DateTime<Utc>,
}

/// Aggregate root: DiscountCode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountCode {
    id: DiscountCodeId,
    code: String,
    rules: Option<DiscountRules>,
    is_active: bool,
    times_used: u32,
    usages: Vec<DiscountUsage>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
}

impl DiscountCode {
    pub fn empty(id: DiscountCodeId) -> Self {
        Self {
            id,
            code: String::new(),
            rules: None,
            is_active: false,
            times_used: 0,
            usages: Vec::new(),
            created_at: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> DiscountCodeId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Rules of a created code. `None` until `DiscountCodeCreated` is applied.
    pub fn rules(&self) -> Option<&DiscountRules> {
        self.rules.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn times_used(&self) -> u32 {
        self.times_used
    }

    pub fn usages(&self) -> &[DiscountUsage] {
        &self.usages
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn exists(&self) -> bool {
        self.rules.is_some()
    }

    /// Active and not yet expired at `now`. Expiry is never extended implicitly.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.rules.as_ref().is_some_and(|r| now < r.expires_at)
    }

    pub fn usage_count_for(&self, user_id: UserId) -> usize {
        self.usages.iter().filter(|u| u.user_id == user_id).count()
    }

    pub fn has_usage_for_order(&self, order_id: OrderId) -> bool {
        self.usages.iter().any(|u| u.order_id == order_id)
    }
}

impl AggregateRoot for DiscountCode {
    type Id = DiscountCodeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDiscountCode {
    pub code_id: DiscountCodeId,
    pub code: String,
    pub rules: DiscountRules,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDiscountRules {
    pub code_id: DiscountCodeId,
    pub rules: DiscountRules,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateDiscountCode {
    pub code_id: DiscountCodeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateDiscountCode {
    pub code_id: DiscountCodeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordRedemption. Issued only once the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRedemption {
    pub code_id: DiscountCodeId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountCodeCommand {
    Create(CreateDiscountCode),
    UpdateRules(UpdateDiscountRules),
    Activate(ActivateDiscountCode),
    Deactivate(DeactivateDiscountCode),
    RecordRedemption(RecordRedemption),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCodeCreated {
    pub code_id: DiscountCodeId,
    pub code: String,
    pub rules: DiscountRules,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRulesUpdated {
    pub code_id: DiscountCodeId,
    pub rules: DiscountRules,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCodeActivated {
    pub code_id: DiscountCodeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCodeDeactivated {
    pub code_id: DiscountCodeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRedeemed {
    pub code_id: DiscountCodeId,
    pub usage: DiscountUsage,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountCodeEvent {
    Created(DiscountCodeCreated),
    RulesUpdated(DiscountRulesUpdated),
    Activated(DiscountCodeActivated),
    Deactivated(DiscountCodeDeactivated),
    Redeemed(DiscountRedeemed),
}

impl Event for DiscountCodeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DiscountCodeEvent::Created(_) => "shop.discount.created",
            DiscountCodeEvent::RulesUpdated(_) => "shop.discount.rules_updated",
            DiscountCodeEvent::Activated(_) => "shop.discount.activated",
            DiscountCodeEvent::Deactivated(_) => "shop.discount.deactivated",
            DiscountCodeEvent::Redeemed(_) => "shop.discount.redeemed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DiscountCodeEvent::Created(e) => e.occurred_at,
            DiscountCodeEvent::RulesUpdated(e) => e.occurred_at,
            DiscountCodeEvent::Activated(e) => e.occurred_at,
            DiscountCodeEvent::Deactivated(e) => e.occurred_at,
            DiscountCodeEvent::Redeemed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for DiscountCode {
    type Command = DiscountCodeCommand;
    type Event = DiscountCodeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DiscountCodeEvent::Created(e) => {
                self.id = e.code_id;
                self.code = e.code.clone();
                self.rules = Some(e.rules.clone());
                self.is_active = e.is_active;
                self.created_at = Some(e.occurred_at);
            }
            DiscountCodeEvent::RulesUpdated(e) => {
                self.rules = Some(e.rules.clone());
            }
            DiscountCodeEvent::Activated(_) => {
                self.is_active = true;
            }
            DiscountCodeEvent::Deactivated(_) => {
                self.is_active = false;
            }
            DiscountCodeEvent::Redeemed(e) => {
                self.usages.push(e.usage.clone());
                self.times_used = self.times_used.saturating_add(1);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DiscountCodeCommand::Create(cmd) => self.handle_create(cmd),
            DiscountCodeCommand::UpdateRules(cmd) => {
                self.ensure_created(cmd.code_id)?;
                cmd.rules.validate()?;
                Ok(vec![DiscountCodeEvent::RulesUpdated(DiscountRulesUpdated {
                    code_id: cmd.code_id,
                    rules: cmd.rules.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            DiscountCodeCommand::Activate(cmd) => {
                self.ensure_created(cmd.code_id)?;
                if self.is_active {
                    return Err(DomainError::invariant("discount code is already active"));
                }
                Ok(vec![DiscountCodeEvent::Activated(DiscountCodeActivated {
                    code_id: cmd.code_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            DiscountCodeCommand::Deactivate(cmd) => {
                self.ensure_created(cmd.code_id)?;
                if !self.is_active {
                    return Err(DomainError::invariant("discount code is already inactive"));
                }
                Ok(vec![DiscountCodeEvent::Deactivated(DiscountCodeDeactivated {
                    code_id: cmd.code_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            DiscountCodeCommand::RecordRedemption(cmd) => self.handle_redemption(cmd),
        }
    }
}

impl DiscountCode {
    fn ensure_created(&self, code_id: DiscountCodeId) -> Result<&DiscountRules, DomainError> {
        let Some(rules) = self.rules.as_ref() else {
            return Err(DomainError::not_found());
        };
        if code_id != self.id {
            return Err(DomainError::invariant("code_id mismatch"));
        }
        Ok(rules)
    }

    fn handle_create(&self, cmd: &CreateDiscountCode) -> Result<Vec<DiscountCodeEvent>, DomainError> {
        if self.exists() {
            return Err(DomainError::conflict(format!("discount code '{}' already exists", cmd.code)));
        }
        validate_code(&cmd.code)?;
        if cmd.code_id != DiscountCodeId::for_code(&cmd.code) {
            return Err(DomainError::invariant("code_id does not match code"));
        }
        cmd.rules.validate()?;

        Ok(vec![DiscountCodeEvent::Created(DiscountCodeCreated {
            code_id: cmd.code_id,
            code: cmd.code.clone(),
            rules: cmd.rules.clone(),
            is_active: cmd.is_active,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_redemption(&self, cmd: &RecordRedemption) -> Result<Vec<DiscountCodeEvent>, DomainError> {
        let rules = self.ensure_created(cmd.code_id)?;

        if self.has_usage_for_order(cmd.order_id) {
            return Err(DomainError::conflict("discount code already redeemed for this order"));
        }
        if !self.is_live_at(cmd.occurred_at) {
            return Err(DomainError::conflict("discount code is no longer valid"));
        }
        if rules.usage_limit > 0 && self.times_used >= rules.usage_limit {
            return Err(DomainError::conflict("discount code usage limit reached"));
        }
        if rules.usage_limit_per_user > 0
            && self.usage_count_for(cmd.user_id) >= rules.usage_limit_per_user as usize
        {
            return Err(DomainError::conflict("discount code per-user limit reached"));
        }

        Ok(vec![DiscountCodeEvent::Redeemed(DiscountRedeemed {
            code_id: cmd.code_id,
            usage: DiscountUsage {
                user_id: cmd.user_id,
                order_id: cmd.order_id,
                email: cmd.email.clone(),
                used_at: cmd.occurred_at,
            },
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn validate_code(code: &str) -> Result<(), DomainError> {
    if code.is_empty() {
        return Err(DomainError::validation("code must not be empty"));
    }
    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(DomainError::validation(format!(
            "code must be at most {MAX_CODE_LENGTH} characters"
        )));
    }
    if code.trim() != code {
        return Err(DomainError::validation("code must not start or end with whitespace"));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use storefront_events::execute;

    pub(crate) fn rules(discount_type: DiscountType, value: i64) -> DiscountRules {
        DiscountRules {
            description: String::new(),
            discount_type,
            discount_value: Decimal::new(value, 0),
            free_shipping: false,
            expires_at: Utc::now() + Duration::days(30),
            usage_limit: 0,
            usage_limit_per_user: 0,
            min_amount: None,
            max_amount: None,
            exclude_sale_items: false,
            individual_use_only: false,
            products: BTreeSet::new(),
            excluded_products: BTreeSet::new(),
            categories: BTreeSet::new(),
            excluded_categories: BTreeSet::new(),
            allowed_emails: String::new(),
        }
    }

    pub(crate) fn created(code: &str, rules: DiscountRules) -> DiscountCode {
        let id = DiscountCodeId::for_code(code);
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

    pub(crate) fn redeem(discount: &mut DiscountCode, user_id: UserId, order_id: OrderId) -> Result<(), DomainError> {
        let cmd = DiscountCodeCommand::RecordRedemption(RecordRedemption {
            code_id: discount.id_typed(),
            user_id,
            order_id,
            email: None,
            occurred_at: Utc::now(),
        });
        execute(discount, &cmd).map(|_| ())
    }

    #[test]
    fn create_rejects_invalid_rules() {
        let id = DiscountCodeId::for_code("BAD");
        let discount = DiscountCode::empty(id);
        let create = |rules| {
            DiscountCodeCommand::Create(CreateDiscountCode {
                code_id: id,
                code: "BAD".to_string(),
                rules,
                is_active: true,
                occurred_at: Utc::now(),
            })
        };

        assert!(discount.handle(&create(rules(DiscountType::Percentage, 101))).is_err());
        assert!(discount.handle(&create(rules(DiscountType::FixedCart, -1))).is_err());

        let mut inverted = rules(DiscountType::FixedCart, 5);
        inverted.min_amount = Some(Decimal::new(100, 0));
        inverted.max_amount = Some(Decimal::new(50, 0));
        assert!(discount.handle(&create(inverted)).is_err());

        assert!(discount.handle(&create(rules(DiscountType::Percentage, 100))).is_ok());
    }

    #[test]
    fn amounts_above_ten_digits_are_rejected() {
        let mut huge = rules(DiscountType::FixedProduct, 5);
        huge.discount_value = Decimal::MAX / Decimal::TWO;
        assert!(huge.validate().is_err());

        let mut bound = rules(DiscountType::FixedCart, 5);
        bound.max_amount = Some(Decimal::new(10_000_000_000, 2));
        assert!(bound.validate().is_err());

        let mut edge = rules(DiscountType::FixedProduct, 5);
        edge.discount_value = Decimal::new(9_999_999_999, 2);
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn code_length_and_emptiness_are_validated() {
        assert!(validate_code("").is_err());
        assert!(validate_code(" SPACED").is_err());
        assert!(validate_code(&"X".repeat(MAX_CODE_LENGTH)).is_ok());
        assert!(validate_code(&"X".repeat(MAX_CODE_LENGTH + 1)).is_err());
    }

    #[test]
    fn duplicate_code_conflicts() {
        let discount = created("SUMMER", rules(DiscountType::FixedCart, 5));
        let err = discount
            .handle(&DiscountCodeCommand::Create(CreateDiscountCode {
                code_id: DiscountCodeId::for_code("SUMMER"),
                code: "SUMMER".to_string(),
                rules: rules(DiscountType::FixedCart, 9),
                is_active: true,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn redemption_records_usage_and_counts() {
        let mut discount = created("SUMMER", rules(DiscountType::FixedCart, 5));
        let user = UserId::new();

        redeem(&mut discount, user, OrderId::generate()).unwrap();
        redeem(&mut discount, user, OrderId::generate()).unwrap();

        assert_eq!(discount.times_used(), 2);
        assert_eq!(discount.usage_count_for(user), 2);
        assert_eq!(discount.usage_count_for(UserId::new()), 0);
    }

    #[test]
    fn one_usage_per_order() {
        let mut discount = created("SUMMER", rules(DiscountType::FixedCart, 5));
        let order = OrderId::generate();

        redeem(&mut discount, UserId::new(), order).unwrap();
        let err = redeem(&mut discount, UserId::new(), order).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn global_and_per_user_limits_are_enforced_at_redemption() {
        let mut limited = rules(DiscountType::FixedCart, 5);
        limited.usage_limit = 2;
        let mut discount = created("TWICE", limited);

        redeem(&mut discount, UserId::new(), OrderId::generate()).unwrap();
        redeem(&mut discount, UserId::new(), OrderId::generate()).unwrap();
        assert!(redeem(&mut discount, UserId::new(), OrderId::generate()).is_err());

        let mut per_user = rules(DiscountType::FixedCart, 5);
        per_user.usage_limit_per_user = 1;
        let mut discount = created("ONCE", per_user);
        let user = UserId::new();

        redeem(&mut discount, user, OrderId::generate()).unwrap();
        assert!(redeem(&mut discount, user, OrderId::generate()).is_err());
        assert!(redeem(&mut discount, UserId::new(), OrderId::generate()).is_ok());
    }

    #[test]
    fn inactive_codes_cannot_be_redeemed() {
        let mut discount = created("PAUSED", rules(DiscountType::FixedCart, 5));
        let code_id = discount.id_typed();
        execute(
            &mut discount,
            &DiscountCodeCommand::Deactivate(DeactivateDiscountCode {
                code_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert!(!discount.is_active());
        assert!(redeem(&mut discount, UserId::new(), OrderId::generate()).is_err());
    }

    #[test]
    fn allow_list_is_trimmed_and_case_insensitive() {
        let mut restricted = rules(DiscountType::FixedCart, 5);
        restricted.allowed_emails = "  alice@example.com \n\nBOB@example.com\n".to_string();

        assert!(restricted.allows_email(Some("Alice@Example.com")));
        assert!(restricted.allows_email(Some("bob@example.com")));
        assert!(!restricted.allows_email(Some("carol@example.com")));
        assert!(!restricted.allows_email(None));

        assert!(rules(DiscountType::FixedCart, 5).allows_email(None));
    }
}
