use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewProduct, Product, ProductId},
    traits::{CatalogApiError, CatalogManagement},
};

pub struct CatalogApi<B> {
    db: B,
}

impl<B: Debug> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi ({:?})", self.db)
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn list_products(&self, only_in_stock: bool) -> Result<Vec<Product>, CatalogApiError> {
        self.db.fetch_products(only_in_stock).await
    }

    pub async fn product_by_id(&self, product_id: &ProductId) -> Result<Option<Product>, CatalogApiError> {
        self.db.fetch_product(product_id).await
    }

    pub async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, CatalogApiError> {
        self.db.fetch_product_by_slug(slug).await
    }

    pub async fn create_product(&self, product: NewProduct) -> Result<Product, CatalogApiError> {
        validate_new_product(&product)?;
        if self.db.fetch_product_by_slug(&product.slug).await?.is_some() {
            return Err(CatalogApiError::SlugAlreadyExists(product.slug));
        }
        let product = self.db.insert_product(product).await?;
        info!("🗃️ Product '{}' ({}) added to the catalog with {} in stock", product.name, product.slug, product.stock);
        Ok(product)
    }

    pub async fn set_stock(&self, product_id: &ProductId, stock: i64) -> Result<Product, CatalogApiError> {
        if stock < 0 {
            return Err(CatalogApiError::NegativeStock(stock));
        }
        let product = self.db.set_stock(product_id, stock).await?;
        info!("🗃️ Stock for '{}' set to {stock}", product.slug);
        Ok(product)
    }
}

fn validate_new_product(product: &NewProduct) -> Result<(), CatalogApiError> {
    if product.name.trim().is_empty() {
        return Err(CatalogApiError::InvalidProduct("The product name is empty".into()));
    }
    let slug_ok = !product.slug.is_empty() &&
        product.slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !slug_ok {
        return Err(CatalogApiError::InvalidProduct(format!(
            "'{}' is not a valid slug. Use lower-case letters, digits and dashes",
            product.slug
        )));
    }
    if product.price_elurc.is_negative() || product.price_eur.value() < 0 {
        return Err(CatalogApiError::InvalidProduct("Prices cannot be negative".into()));
    }
    if product.stock < 0 {
        return Err(CatalogApiError::NegativeStock(product.stock));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use elurc_common::{EuroCents, Lamports};

    use super::*;

    fn product(slug: &str) -> NewProduct {
        NewProduct {
            name: "Organic apples".into(),
            slug: slug.into(),
            price_elurc: Lamports::from(2_500_000),
            price_eur: EuroCents::from(199),
            stock: 10,
            category: Some("fruit".into()),
            images: vec![],
        }
    }

    #[test]
    fn slug_validation() {
        assert!(validate_new_product(&product("organic-apples-1kg")).is_ok());
        assert!(validate_new_product(&product("Organic Apples")).is_err());
        assert!(validate_new_product(&product("")).is_err());
    }

    #[test]
    fn negative_values_are_rejected() {
        let mut p = product("apples");
        p.stock = -1;
        assert!(matches!(validate_new_product(&p), Err(CatalogApiError::NegativeStock(-1))));
        let mut p = product("apples");
        p.price_elurc = Lamports::from(-5);
        assert!(matches!(validate_new_product(&p), Err(CatalogApiError::InvalidProduct(_))));
    }
}
