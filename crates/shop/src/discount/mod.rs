//! Discount codes: the event-sourced code aggregate, item eligibility rules
//! and the read-only evaluator used at cart/checkout time.

pub mod code;
pub mod evaluator;
pub mod rules;

pub use code::{
    ActivateDiscountCode, CreateDiscountCode, DeactivateDiscountCode, DiscountCode,
    DiscountCodeActivated, DiscountCodeCommand, DiscountCodeCreated, DiscountCodeDeactivated,
    DiscountCodeEvent, DiscountCodeId, DiscountRedeemed, DiscountRules, DiscountRulesUpdated,
    DiscountType, DiscountUsage, RecordRedemption, UpdateDiscountRules,
};
pub use evaluator::{
    CartLine, CartSnapshot, Customer, DiscountLookup, DiscountOutcome, DiscountRejection,
    EvaluationError, evaluate,
};
