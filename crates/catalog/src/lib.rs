//! Shop catalog: categories, products and reviews (event-sourced, no IO).

pub mod category;
pub mod product;
pub mod review;
pub mod slug;

pub use category::{
    Category, CategoryCommand, CategoryCreated, CategoryEvent, CategoryId, CategoryUpdated,
    CreateCategory, UpdateCategory,
};
pub use product::{
    AdjustStock, ArchiveProduct, CreateProduct, Pricing, PricingUpdated, Product, ProductArchived,
    ProductCommand, ProductCreated, ProductEvent, ProductId, ProductStatus, ProductType,
    StockAdjusted, UpdatePricing,
};
pub use review::{
    EditReview, MAX_RATING, MIN_RATING, ModerateReview, Review, ReviewCommand, ReviewEdited, ReviewEvent,
    ReviewId, ReviewModerated, ReviewSubmitted, SubmitReview,
};
pub use slug::validate_slug;
