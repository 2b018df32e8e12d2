use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

const BUILTIN_CATALOG: &str = include_str!("../data/products.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
}

/// Text projection of a product that gets embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: Product,
}

impl Product {
    pub fn to_document(&self) -> Document {
        Document {
            content: format!(
                "{}: {}. Category: {}. Price: ${}",
                self.name, self.description, self.category, self.price
            ),
            metadata: self.clone(),
        }
    }

    /// One line of the prompt context handed to the model.
    pub fn context_line(&self) -> String {
        format!("{}: {} (${})", self.name, self.description, self.price)
    }
}

/// Product records loaded once at startup.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Loads the catalog from a JSON file, or the built-in one when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, RagError> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|e| {
                    RagError::Catalog(format!("failed to read {}: {}", path.display(), e))
                })?;
                Self::from_json(&raw)
            }
            None => Self::builtin(),
        }
    }

    pub fn builtin() -> Result<Self, RagError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(raw: &str) -> Result<Self, RagError> {
        let products: Vec<Product> = serde_json::from_str(raw)
            .map_err(|e| RagError::Catalog(format!("malformed catalog: {}", e)))?;
        Self::new(products)
    }

    pub fn new(products: Vec<Product>) -> Result<Self, RagError> {
        if products.is_empty() {
            return Err(RagError::Catalog("catalog contains no products".to_string()));
        }

        let mut seen = HashSet::new();
        for product in &products {
            if !seen.insert(product.id) {
                return Err(RagError::Catalog(format!("duplicate product id {}", product.id)));
            }
        }

        Ok(Self { products })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn get(&self, id: u64) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn headphones() -> Product {
        Product {
            id: 1,
            name: "Headphones".to_string(),
            description: "Wireless over-ear".to_string(),
            category: "Electronics".to_string(),
            price: 199.99,
        }
    }

    #[test]
    fn test_document_content_template() {
        let doc = headphones().to_document();
        assert_eq!(
            doc.content,
            "Headphones: Wireless over-ear. Category: Electronics. Price: $199.99"
        );
        assert_eq!(doc.metadata, headphones());
    }

    #[test]
    fn test_document_content_is_deterministic() {
        let product = headphones();
        assert_eq!(product.to_document(), product.to_document());
    }

    #[test]
    fn test_whole_prices_render_without_decimals() {
        let mut product = headphones();
        product.price = 25.0;
        assert_eq!(product.context_line(), "Headphones: Wireless over-ear ($25)");
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        assert!(!catalog.is_empty());
        assert!(catalog
            .products()
            .iter()
            .any(|p| p.name.to_lowercase().contains("headphones")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&vec![headphones()]).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let catalog = Catalog::load(Some(file.path())).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(1), Some(&headphones()));
    }

    #[test]
    fn test_missing_file_is_catalog_error() {
        let result = Catalog::load(Some(Path::new("/nonexistent/products.json")));
        assert!(matches!(result, Err(RagError::Catalog(_))));
    }

    #[test]
    fn test_malformed_and_empty_catalogs_rejected() {
        assert!(matches!(Catalog::from_json("{not json"), Err(RagError::Catalog(_))));
        assert!(matches!(Catalog::from_json("[]"), Err(RagError::Catalog(_))));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Catalog::new(vec![headphones(), headphones()]);
        assert!(matches!(result, Err(RagError::Catalog(_))));
    }
}
