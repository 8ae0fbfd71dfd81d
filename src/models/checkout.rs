use serde::{Deserialize, Serialize};

use super::Category;

/// Input widget used to render a checkout field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Select,
    Checkbox,
}

/// Checkout form group a field is rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSection {
    Billing,
    Shipping,
    Account,
    Order,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// An extra checkout field shown when its rule matches the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutField {
    pub key: String,
    pub kind: FieldKind,
    pub label: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    pub section: FieldSection,
}

impl CheckoutField {
    /// Order meta key the submitted value is stored under
    pub fn meta_key(&self) -> String {
        format!("_{}", self.key)
    }

    /// Whether `value` is an allowed choice; fields without options accept anything
    pub fn accepts(&self, value: &str) -> bool {
        match self.kind {
            FieldKind::Select => self
                .options
                .iter()
                .any(|option| !option.value.is_empty() && option.value == value),
            _ => true,
        }
    }
}

/// Condition on the cart that activates a field rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CartCondition {
    /// Any cart product belongs to a category with one of these slugs (case-insensitive)
    AnyCategorySlug(Vec<String>),
}

impl CartCondition {
    pub fn matches(&self, categories: &[Category]) -> bool {
        match self {
            CartCondition::AnyCategorySlug(slugs) => categories.iter().any(|category| {
                slugs
                    .iter()
                    .any(|slug| slug.eq_ignore_ascii_case(&category.slug))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub condition: CartCondition,
    pub field: CheckoutField,
}

impl FieldRule {
    /// Required operating-system selector for carts holding electronics
    pub fn operating_system(electronic_slugs: Vec<String>) -> Self {
        Self {
            condition: CartCondition::AnyCategorySlug(electronic_slugs),
            field: CheckoutField {
                key: "operating_system".to_string(),
                kind: FieldKind::Select,
                label: "Operating System".to_string(),
                required: true,
                options: vec![
                    FieldOption::new("", "Select Operating System"),
                    FieldOption::new("windows", "Windows"),
                    FieldOption::new("macos", "macOS"),
                    FieldOption::new("linux", "Linux"),
                    FieldOption::new("other", "Other"),
                ],
                section: FieldSection::Order,
            },
        }
    }
}

/// A checkout value written to order meta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedField {
    pub key: String,
    pub meta_key: String,
    pub value: String,
}
