//! Purpose: In-memory product repository backing `prodcat serve`.
//! Exports: `ProductStore`, `StoredProduct`, `ProductInput`, `ListQuery`, `PageSlice`, `SortSpec`.
//! Role: Pure business rules (filtering, sorting, paging, soft delete, statistics).
//! Invariants: Ids are assigned monotonically starting at 1 and never reused.
//! Invariants: Delete only stamps `deleted_at`; records are never removed.
use prodcat::api::{Category, Error, ErrorKind};
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PRICE: i64 = i32::MAX as i64;

#[derive(Clone, Debug, PartialEq)]
pub struct StoredProduct {
    pub id: u64,
    pub name: String,
    pub price: i64,
    pub category: Category,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl StoredProduct {
    /// Response DTO; categories go out as backend enum constants.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "nome": self.name,
            "preco": self.price,
            "categoria": self.category.constant(),
            "createdAt": self.created_at,
            "updatedAt": self.updated_at,
            "deletedAt": self.deleted_at,
        })
    }
}

/// Create/update payload; every field is optional on the wire.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductInput {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub category: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SortField {
    Id,
    Name,
    Price,
    CreatedAt,
    UpdatedAt,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SortSpec {
    field: SortField,
    descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Id,
            descending: false,
        }
    }
}

impl SortSpec {
    /// Parse `field[,asc|desc]`; a missing or unknown direction means ascending.
    pub fn parse(raw: Option<&str>) -> Result<Self, Error> {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Ok(Self::default());
        };
        let mut parts = raw.split(',');
        let field = match parts.next().unwrap_or_default().trim() {
            "id" => SortField::Id,
            "nome" => SortField::Name,
            "preco" => SortField::Price,
            "createdAt" => SortField::CreatedAt,
            "updatedAt" => SortField::UpdatedAt,
            other => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("Campo de ordenação inválido: {other}")));
            }
        };
        let descending = parts
            .next()
            .is_some_and(|direction| direction.trim().eq_ignore_ascii_case("desc"));
        Ok(Self { field, descending })
    }

    fn compare(&self, a: &StoredProduct, b: &StoredProduct) -> Ordering {
        let ordering = match self.field {
            SortField::Id => a.id.cmp(&b.id),
            SortField::Name => a.name.cmp(&b.name),
            SortField::Price => a.price.cmp(&b.price),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        let ordering = if self.descending {
            ordering.reverse()
        } else {
            ordering
        };
        ordering.then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub category: Option<Category>,
    pub sort: SortSpec,
    pub page: u64,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageSlice {
    pub content: Vec<StoredProduct>,
    pub total_elements: u64,
    pub total_pages: u64,
    pub number: u64,
    pub size: u64,
}

impl PageSlice {
    pub fn to_json(&self) -> Value {
        let content: Vec<Value> = self.content.iter().map(StoredProduct::to_json).collect();
        json!({
            "content": content,
            "totalPages": self.total_pages,
            "totalElements": self.total_elements,
            "number": self.number,
            "size": self.size,
            "numberOfElements": self.content.len(),
            "first": self.number == 0,
            "last": self.number.saturating_add(1) >= self.total_pages,
            "empty": self.content.is_empty(),
        })
    }
}

/// Parse an optional category parameter; blank means "no filter".
pub fn parse_category_param(raw: Option<&str>) -> Result<Option<Category>, Error> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => Category::lookup(raw).map(Some).ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message(format!("Categoria inválida: {raw}"))
        }),
    }
}

#[derive(Debug)]
pub struct ProductStore {
    products: BTreeMap<u64, StoredProduct>,
    next_id: u64,
}

impl Default for ProductStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductStore {
    pub fn new() -> Self {
        Self {
            products: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn with_demo_data(now: &str) -> Self {
        let mut store = Self::new();
        let demo = [
            ("Camiseta básica", 4990, "roupas"),
            ("Calça jeans", 15990, "roupas"),
            ("Cueca boxer", 2990, "roupas_intimas"),
            ("Tênis de corrida", 29990, "calcados"),
            ("Sandália", 8990, "calcados"),
            ("Boné", 4500, "acessorios"),
        ];
        for (name, price, category) in demo {
            let input = ProductInput {
                name: Some(name.to_string()),
                price: Some(price),
                category: Some(category.to_string()),
            };
            if let Err(err) = store.create(input, now) {
                tracing::warn!(error = %err, "skipping demo product");
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn list(&self, deleted: bool, query: &ListQuery) -> PageSlice {
        let mut matching: Vec<&StoredProduct> = self
            .products
            .values()
            .filter(|product| product.deleted_at.is_some() == deleted)
            .filter(|product| query.category.is_none_or(|category| product.category == category))
            .collect();
        matching.sort_by(|a, b| query.sort.compare(a, b));

        let size = if query.size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            query.size
        };
        let total_elements = matching.len() as u64;
        let total_pages = total_elements.div_ceil(size);
        let content = matching
            .into_iter()
            .skip(query.page.saturating_mul(size) as usize)
            .take(size as usize)
            .cloned()
            .collect();
        PageSlice {
            content,
            total_elements,
            total_pages,
            number: query.page,
            size,
        }
    }

    pub fn get(&self, id: u64) -> Result<&StoredProduct, Error> {
        self.products.get(&id).ok_or_else(|| not_found(id))
    }

    pub fn create(&mut self, input: ProductInput, now: &str) -> Result<StoredProduct, Error> {
        let name = input
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| bad_request("O campo nome é obrigatório."))?;
        let price = input
            .price
            .ok_or_else(|| bad_request("O campo preco é obrigatório."))?;
        ensure_price_range(price)?;
        let category = parse_category_param(input.category.as_deref())?
            .ok_or_else(|| bad_request("O campo categoria é obrigatório."))?;

        let product = StoredProduct {
            id: self.next_id,
            name,
            price,
            category,
            created_at: now.to_string(),
            updated_at: now.to_string(),
            deleted_at: None,
        };
        self.next_id += 1;
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    /// Apply only the fields that are present and non-blank.
    pub fn update(&mut self, id: u64, input: ProductInput, now: &str) -> Result<StoredProduct, Error> {
        let category = parse_category_param(input.category.as_deref())?;
        if let Some(price) = input.price {
            ensure_price_range(price)?;
        }
        let product = self.products.get_mut(&id).ok_or_else(|| not_found(id))?;
        if let Some(name) = input.name.map(|name| name.trim().to_string()) {
            if !name.is_empty() {
                product.name = name;
            }
        }
        if let Some(price) = input.price {
            product.price = price;
        }
        if let Some(category) = category {
            product.category = category;
        }
        product.updated_at = now.to_string();
        Ok(product.clone())
    }

    pub fn soft_delete(&mut self, id: u64, now: &str) -> Result<(), Error> {
        let product = self.products.get_mut(&id).ok_or_else(|| not_found(id))?;
        product.deleted_at = Some(now.to_string());
        Ok(())
    }

    /// Active count and integer average price, optionally per category.
    pub fn statistics(&self, category: Option<Category>) -> (u64, i64) {
        let (count, total) = self
            .products
            .values()
            .filter(|product| product.deleted_at.is_none())
            .filter(|product| category.is_none_or(|category| product.category == category))
            .fold((0u64, 0i128), |(count, total), product| {
                (count + 1, total + i128::from(product.price))
            });
        if count == 0 {
            return (0, 0);
        }
        let average = total / i128::from(count);
        (count, i64::try_from(average).unwrap_or(i64::MAX))
    }
}

/// Prices are stored as 32-bit cents, the backend's column type.
fn ensure_price_range(price: i64) -> Result<(), Error> {
    if price <= 0 {
        return Err(bad_request("O preço deve ser maior que 0."));
    }
    if price > MAX_PRICE {
        return Err(bad_request(&format!("O preço deve ser no máximo {MAX_PRICE}.")));
    }
    Ok(())
}

fn bad_request(message: &str) -> Error {
    Error::new(ErrorKind::Usage).with_message(message)
}

fn not_found(id: u64) -> Error {
    Error::new(ErrorKind::NotFound).with_message(format!("Produto não encontrado com ID: {id}"))
}

#[cfg(test)]
mod tests {
    use super::{ListQuery, MAX_PRICE, ProductInput, ProductStore, SortSpec, parse_category_param};
    use prodcat::api::{Category, ErrorKind};

    const T0: &str = "2025-01-01T10:00:00Z";
    const T1: &str = "2025-01-02T10:00:00Z";

    fn input(name: &str, price: i64, category: &str) -> ProductInput {
        ProductInput {
            name: Some(name.to_string()),
            price: Some(price),
            category: Some(category.to_string()),
        }
    }

    fn seeded() -> ProductStore {
        let mut store = ProductStore::new();
        store.create(input("Camisa", 3000, "roupas"), T0).expect("a");
        store.create(input("Tênis", 1000, "calcados"), T0).expect("b");
        store.create(input("Bota", 2000, "calcados"), T0).expect("c");
        store
    }

    #[test]
    fn ids_are_sequential() {
        let store = seeded();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(3).expect("c").name, "Bota");
        assert_eq!(store.get(9).expect_err("missing").kind(), ErrorKind::NotFound);
    }

    #[test]
    fn list_filters_and_sorts_by_price() {
        let store = seeded();
        let query = ListQuery {
            category: Some(Category::Footwear),
            sort: SortSpec::parse(Some("preco,desc")).expect("sort"),
            ..ListQuery::default()
        };
        let page = store.list(false, &query);
        let prices: Vec<i64> = page.content.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![2000, 1000]);
        assert_eq!(page.total_elements, 2);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn soft_delete_moves_record_between_listings() {
        let mut store = seeded();
        store.soft_delete(2, T1).expect("delete");
        let active = store.list(false, &ListQuery::default());
        let deleted = store.list(true, &ListQuery::default());
        assert_eq!(active.content.len(), 2);
        assert_eq!(deleted.content.len(), 1);
        assert_eq!(deleted.content[0].deleted_at.as_deref(), Some(T1));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn statistics_use_active_products_only() {
        let mut store = seeded();
        assert_eq!(store.statistics(None), (3, 2000));
        assert_eq!(store.statistics(Some(Category::Footwear)), (2, 1500));
        store.soft_delete(1, T1).expect("delete");
        assert_eq!(store.statistics(None), (2, 1500));
        assert_eq!(store.statistics(Some(Category::Accessories)), (0, 0));
    }

    #[test]
    fn paging_splits_results() {
        let store = seeded();
        let query = ListQuery {
            size: 2,
            page: 1,
            ..ListQuery::default()
        };
        let page = store.list(false, &query);
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.total_pages, 2);
        let json = page.to_json();
        assert_eq!(json["last"], true);
        assert_eq!(json["first"], false);
    }

    #[test]
    fn update_is_partial() {
        let mut store = seeded();
        let patch = ProductInput {
            name: Some("   ".to_string()),
            price: Some(3500),
            category: None,
        };
        let updated = store.update(1, patch, T1).expect("update");
        assert_eq!(updated.name, "Camisa");
        assert_eq!(updated.price, 3500);
        assert_eq!(updated.category, Category::Clothes);
        assert_eq!(updated.updated_at, T1);
        assert_eq!(updated.created_at, T0);
    }

    #[test]
    fn create_rejects_bad_input() {
        let mut store = ProductStore::new();
        let err = store.create(ProductInput::default(), T0).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = store.create(input("Meia", 0, "roupas"), T0).expect_err("zero");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = store.create(input("Meia", 100, "chapeus"), T0).expect_err("category");
        assert_eq!(err.message(), Some("Categoria inválida: chapeus"));
        assert!(store.is_empty());
    }

    #[test]
    fn prices_above_integer_column_are_rejected() {
        let mut store = ProductStore::new();
        let err = store
            .create(input("Relógio", i64::MAX / 2 + 1, "acessorios"), T0)
            .expect_err("too large");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.message(), Some("O preço deve ser no máximo 2147483647."));

        store.create(input("Relógio", MAX_PRICE, "acessorios"), T0).expect("max");
        store.create(input("Anel", MAX_PRICE, "acessorios"), T0).expect("max");
        let patch = ProductInput {
            price: Some(MAX_PRICE + 1),
            ..ProductInput::default()
        };
        assert!(store.update(1, patch, T1).is_err());
        assert_eq!(store.statistics(None), (2, MAX_PRICE));
    }

    #[test]
    fn page_past_the_end_is_empty_and_last() {
        let store = seeded();
        let query = ListQuery {
            page: u64::MAX,
            ..ListQuery::default()
        };
        let page = store.list(false, &query);
        assert!(page.content.is_empty());
        let json = page.to_json();
        assert_eq!(json["last"], true);
        assert_eq!(json["empty"], true);
        assert_eq!(json["number"], u64::MAX);
    }

    #[test]
    fn sort_spec_defaults_and_rejects_unknown_fields() {
        assert_eq!(SortSpec::parse(None).expect("default"), SortSpec::default());
        assert_eq!(SortSpec::parse(Some("id,asc")).expect("id"), SortSpec::default());
        assert!(SortSpec::parse(Some("cor,asc")).is_err());
        assert_eq!(parse_category_param(Some("  ")).expect("blank"), None);
    }

    #[test]
    fn response_json_uses_enum_constants() {
        let store = seeded();
        let value = store.get(2).expect("b").to_json();
        assert_eq!(value["categoria"], "SHOES");
        assert_eq!(value["deletedAt"], serde_json::Value::Null);
    }
}
