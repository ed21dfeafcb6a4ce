//! Restaurants, products and customers used to place orders.
//!
//! The built-in catalog is a fixed seed of five São Paulo restaurants with
//! five products each and ten customers, embedded at compile time.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::GeoPoint;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// A restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    /// Restaurant id, e.g. `rest_1`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Typical kitchen time before any per-product extra.
    pub avg_prep_time_min: u32,
}

impl Restaurant {
    /// Location of the restaurant.
    #[must_use]
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// A product sold by one restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product id, e.g. `prod_1`.
    pub id: String,
    /// Restaurant selling it.
    pub restaurant_id: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: f64,
    /// Extra preparation minutes this product adds.
    pub additional_prep_min: u32,
}

/// A customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer id, e.g. `cust_1`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Phone number in E.164 form.
    pub whatsapp_phone: String,
}

impl Customer {
    /// Delivery location of the customer.
    #[must_use]
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// The set of restaurants, products and customers orders refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// All restaurants.
    pub restaurants: Vec<Restaurant>,
    /// All products.
    pub products: Vec<Product>,
    /// All customers.
    pub customers: Vec<Customer>,
}

impl Catalog {
    /// The embedded seed catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded data fails to parse or validate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse and validate a catalog document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or [`validate`](Self::validate)
    /// fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check ids are unique, every product belongs to a known restaurant and
    /// every phone number is E.164.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCatalog`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        let all_ids = self
            .restaurants
            .iter()
            .map(|r| &r.id)
            .chain(self.products.iter().map(|p| &p.id))
            .chain(self.customers.iter().map(|c| &c.id));
        for id in all_ids {
            if !ids.insert(id.as_str()) {
                return Err(Error::InvalidCatalog(format!("duplicate id {id}")));
            }
        }

        if let Some(product) = self
            .products
            .iter()
            .find(|p| self.restaurant(&p.restaurant_id).is_none())
        {
            return Err(Error::InvalidCatalog(format!(
                "product {} refers to unknown restaurant {}",
                product.id, product.restaurant_id
            )));
        }

        if let Some(customer) = self
            .customers
            .iter()
            .find(|c| !is_e164(&c.whatsapp_phone))
        {
            return Err(Error::InvalidCatalog(format!(
                "customer {} has a malformed phone number {}",
                customer.id, customer.whatsapp_phone
            )));
        }

        Ok(())
    }

    /// Look up a restaurant.
    #[must_use]
    pub fn restaurant(&self, id: &str) -> Option<&Restaurant> {
        self.restaurants.iter().find(|r| r.id == id)
    }

    /// Look up a product.
    #[must_use]
    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Look up a customer.
    #[must_use]
    pub fn customer(&self, id: &str) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == id)
    }

    /// Products sold by `restaurant_id`, in catalog order.
    pub fn products_for<'a>(&'a self, restaurant_id: &'a str) -> impl Iterator<Item = &'a Product> {
        self.products
            .iter()
            .filter(move |p| p.restaurant_id == restaurant_id)
    }

    /// Like [`restaurant`](Self::restaurant) but an unknown id is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCatalogEntry`].
    pub fn require_restaurant(&self, id: &str) -> Result<&Restaurant> {
        self.restaurant(id)
            .ok_or_else(|| Error::unknown("restaurant", id))
    }

    /// Like [`product`](Self::product) but an unknown id is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCatalogEntry`].
    pub fn require_product(&self, id: &str) -> Result<&Product> {
        self.product(id).ok_or_else(|| Error::unknown("product", id))
    }

    /// Like [`customer`](Self::customer) but an unknown id is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCatalogEntry`].
    pub fn require_customer(&self, id: &str) -> Result<&Customer> {
        self.customer(id).ok_or_else(|| Error::unknown("customer", id))
    }
}

fn e164_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+[1-9]\d{7,14}$").expect("E.164 pattern is valid"))
}

/// Whether `phone` is an E.164 number such as `+5511987654321`.
#[must_use]
pub fn is_e164(phone: &str) -> bool {
    e164_pattern().is_match(phone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.restaurants.len(), 5);
        assert_eq!(catalog.products.len(), 25);
        assert_eq!(catalog.customers.len(), 10);
    }

    #[test]
    fn test_each_restaurant_sells_five_products() {
        let catalog = Catalog::builtin().unwrap();
        for restaurant in &catalog.restaurants {
            assert_eq!(catalog.products_for(&restaurant.id).count(), 5);
        }
    }

    #[test]
    fn test_lookups() {
        let catalog = Catalog::builtin().unwrap();

        let restaurant = catalog.restaurant("rest_3").unwrap();
        assert_eq!(restaurant.name, "Sushi Tokyo");
        assert_eq!(restaurant.avg_prep_time_min, 30);

        let product = catalog.product("prod_12").unwrap();
        assert_eq!(product.name, "Combo Especial");
        assert_eq!(product.restaurant_id, "rest_3");
        assert_eq!(product.additional_prep_min, 15);

        let customer = catalog.customer("cust_10").unwrap();
        assert_eq!(customer.name, "João Pedro");

        assert!(catalog.restaurant("rest_9").is_none());
    }

    #[test]
    fn test_require_unknown_is_error() {
        let catalog = Catalog::builtin().unwrap();
        let err = catalog.require_product("prod_99").unwrap_err();
        assert_eq!(err.to_string(), "unknown product: prod_99");
        assert!(catalog.require_customer("cust_1").is_ok());
    }

    #[test]
    fn test_e164() {
        assert!(is_e164("+5511987654321"));
        assert!(is_e164("+14155552671"));
        assert!(!is_e164("5511987654321"));
        assert!(!is_e164("+0511987654321"));
        assert!(!is_e164("+55 11 98765-4321"));
        assert!(!is_e164("+1234"));
    }

    #[test]
    fn test_rejects_bad_phone() {
        let mut catalog = Catalog::builtin().unwrap();
        catalog.customers[0].whatsapp_phone = "11 98765-4321".to_string();
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("cust_1"));
    }

    #[test]
    fn test_rejects_orphan_product() {
        let mut catalog = Catalog::builtin().unwrap();
        catalog.products[0].restaurant_id = "rest_42".to_string();
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("rest_42"));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut catalog = Catalog::builtin().unwrap();
        catalog.customers[1].id = "cust_1".to_string();
        assert!(matches!(catalog.validate(), Err(Error::InvalidCatalog(_))));
    }
}
