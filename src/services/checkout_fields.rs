use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{Category, CheckoutField, FieldRule, OrderId, ProductId, SavedField},
    services::commerce::CommerceStore,
};

/// Longest raw value accepted for a single checkout field, in bytes
pub const MAX_FIELD_VALUE_LEN: usize = 1024;

/// Adds checkout fields based on cart contents and stores the submitted values
///
/// Rules are evaluated in order; each contributes its field at most once no
/// matter how many cart items match it.
#[derive(Clone)]
pub struct CheckoutCustomizer {
    store: Arc<dyn CommerceStore>,
    rules: Vec<FieldRule>,
}

impl CheckoutCustomizer {
    pub fn new(store: Arc<dyn CommerceStore>, rules: Vec<FieldRule>) -> Self {
        Self { store, rules }
    }

    /// Customizer with the operating system selector for the given category slugs
    pub fn with_default_rules(store: Arc<dyn CommerceStore>, electronic_slugs: Vec<String>) -> Self {
        Self::new(store, vec![FieldRule::operating_system(electronic_slugs)])
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Category memberships of every cart product that still exists
    async fn cart_categories(&self, cart: &[ProductId]) -> AppResult<Vec<Vec<Category>>> {
        let mut seen = HashSet::new();
        let mut categories = Vec::with_capacity(cart.len());

        for &product_id in cart {
            if !seen.insert(product_id) {
                continue;
            }
            match self.store.categories_of(product_id).await {
                Ok(found) => categories.push(found),
                Err(AppError::NotFound(_)) => {
                    tracing::debug!(product_id = %product_id, "Cart product not found, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(categories)
    }

    /// Extra checkout fields activated by the cart
    pub async fn fields_for_cart(&self, cart: &[ProductId]) -> AppResult<Vec<CheckoutField>> {
        let cart_categories = self.cart_categories(cart).await?;

        let mut keys = HashSet::new();
        let fields: Vec<CheckoutField> = self
            .rules
            .iter()
            .filter(|rule| {
                cart_categories
                    .iter()
                    .any(|categories| rule.condition.matches(categories))
            })
            .filter(|rule| keys.insert(rule.field.key.clone()))
            .map(|rule| rule.field.clone())
            .collect();

        tracing::debug!(
            cart_size = cart.len(),
            field_count = fields.len(),
            "Checkout fields resolved"
        );

        Ok(fields)
    }

    /// Validates submitted values for the cart's fields and writes them to order meta
    ///
    /// Nothing is written unless every active field validates. Submitted keys
    /// that are not active for this cart are ignored. A store failure while
    /// writing is returned as is; keys written before it stay written.
    pub async fn save_submitted_fields(
        &self,
        order_id: OrderId,
        cart: &[ProductId],
        values: &HashMap<String, String>,
    ) -> AppResult<Vec<SavedField>> {
        let fields = self.fields_for_cart(cart).await?;

        let mut to_save = Vec::new();
        for field in &fields {
            let raw = values.get(&field.key).map(String::as_str).unwrap_or_default();
            if raw.len() > MAX_FIELD_VALUE_LEN {
                return Err(AppError::InvalidInput(format!(
                    "{} must be at most {} bytes",
                    field.label, MAX_FIELD_VALUE_LEN
                )));
            }
            let value = sanitize_text_field(raw);

            if value.is_empty() {
                if field.required {
                    return Err(AppError::InvalidInput(format!(
                        "{} is a required field",
                        field.label
                    )));
                }
                continue;
            }

            if !field.accepts(&value) {
                return Err(AppError::InvalidInput(format!(
                    "{} is not a valid option for {}",
                    value, field.label
                )));
            }

            to_save.push(SavedField {
                key: field.key.clone(),
                meta_key: field.meta_key(),
                value,
            });
        }

        for (written, saved) in to_save.iter().enumerate() {
            self.store
                .save_order_meta(order_id, &saved.meta_key, &saved.value)
                .await
                .inspect_err(|e| {
                    let already_written: Vec<&str> = to_save[..written]
                        .iter()
                        .map(|s| s.meta_key.as_str())
                        .collect();
                    tracing::error!(
                        order_id = %order_id,
                        meta_key = %saved.meta_key,
                        already_written = ?already_written,
                        error = %e,
                        "Checkout field write failed"
                    );
                })?;
        }

        tracing::info!(
            order_id = %order_id,
            saved = to_save.len(),
            "Checkout fields saved"
        );

        Ok(to_save)
    }
}

/// Cleans a free-form form value before it is stored
///
/// Strips markup tags and percent-encoded octets, collapses whitespace
/// (including line breaks and tabs) to single spaces and trims the result.
pub fn sanitize_text_field(raw: &str) -> String {
    let without_tags = strip_tags(raw);
    let without_octets = strip_percent_octets(&without_tags);
    without_octets.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        let opens_tag = c == '<'
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_alphabetic() || matches!(*next, '/' | '!' | '?'));
        if opens_tag {
            // unterminated tags swallow the rest of the input
            for skipped in chars.by_ref() {
                if skipped == '>' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }

    out
}

fn strip_percent_octets(raw: &str) -> String {
    // removing an octet can expose a new one ("%%4141" -> "%41"), so check
    // the tail after every push
    let mut out: Vec<char> = Vec::with_capacity(raw.len());
    for c in raw.chars() {
        out.push(c);
        let n = out.len();
        if n >= 3
            && out[n - 3] == '%'
            && out[n - 2].is_ascii_hexdigit()
            && out[n - 1].is_ascii_hexdigit()
        {
            out.truncate(n - 3);
        }
    }
    out.into_iter().collect()
}
