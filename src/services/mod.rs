pub mod checkout_fields;
pub mod commerce;
pub mod recommendations;

pub use checkout_fields::CheckoutCustomizer;
pub use recommendations::{AffinityRecommender, RecommenderSettings};
