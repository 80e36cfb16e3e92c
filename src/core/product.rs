//! Purpose: Wire-facing product records, statistics and the paged envelope.
//! Exports: `Product`, `ProductDraft`, `Statistics`, `Page`.
//! Role: Serde models matching the backend's JSON field names.
//! Invariants: Prices are integer minor units end to end.
//! Invariants: `deletedAt == null` means active; anything else means soft-deleted.
use crate::core::category::Category;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "preco")]
    pub price_minor: i64,
    #[serde(rename = "categoria")]
    pub category: Category,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    #[serde(rename = "deletedAt", default)]
    pub deleted_at: Option<String>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Body of create and update requests.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "preco")]
    pub price_minor: i64,
    #[serde(rename = "categoria")]
    pub category: Category,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(rename = "qntProdutos", default)]
    pub active_count: u64,
    #[serde(rename = "precoMedio", default)]
    pub average_price_minor: f64,
}

/// Paged collection envelope; pagination flags are carried, not interpreted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_pages: u64,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub last: bool,
}

#[cfg(test)]
mod tests {
    use super::{Page, Product, ProductDraft, Statistics};
    use crate::core::category::Category;
    use serde_json::json;

    #[test]
    fn decodes_backend_product() {
        let value = json!({
            "id": 7,
            "nome": "Tênis de corrida",
            "preco": 29990,
            "categoria": "SHOES",
            "createdAt": "2025-01-02T10:00:00",
            "updatedAt": "2025-01-02T10:00:00",
            "deletedAt": null
        });
        let product: Product = serde_json::from_value(value).expect("product");
        assert_eq!(product.category, Category::Footwear);
        assert_eq!(product.price_minor, 29990);
        assert!(product.is_active());
    }

    #[test]
    fn deleted_at_marks_soft_delete() {
        let value = json!({
            "id": 1,
            "nome": "Boné",
            "preco": 4500,
            "categoria": "acessorios",
            "createdAt": "2025-01-02T10:00:00",
            "updatedAt": "2025-01-03T10:00:00",
            "deletedAt": "2025-01-04T09:30:00"
        });
        let product: Product = serde_json::from_value(value).expect("product");
        assert!(!product.is_active());
    }

    #[test]
    fn draft_uses_wire_names() {
        let draft = ProductDraft {
            name: "Meia".to_string(),
            price_minor: 1999,
            category: Category::Underwear,
        };
        let value = serde_json::to_value(&draft).expect("encode");
        assert_eq!(
            value,
            json!({"nome": "Meia", "preco": 1999, "categoria": "roupas_intimas"})
        );
    }

    #[test]
    fn statistics_tolerate_integer_average() {
        let stats: Statistics =
            serde_json::from_value(json!({"qntProdutos": 2, "precoMedio": 1500})).expect("stats");
        assert_eq!(stats.active_count, 2);
        assert_eq!(stats.average_price_minor, 1500.0);
    }

    #[test]
    fn page_keeps_pagination_flags() {
        let page: Page<u64> = serde_json::from_value(json!({
            "content": [1, 2],
            "totalPages": 3,
            "totalElements": 5,
            "number": 0,
            "size": 2,
            "first": true,
            "last": false
        }))
        .expect("page");
        assert_eq!(page.content, vec![1, 2]);
        assert_eq!(page.total_pages, 3);
        assert!(page.first);
        assert!(!page.last);
    }
}
