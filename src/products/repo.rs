use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::db::contains_pattern;
use crate::products::repo_types::{
    Category, Product, ProductData, ProductFilter, ProductTagRow, Tag, Unit,
};

const PRODUCT_COLUMNS: &str = "id, active, created_at, updated_at, name, description, price, \
                               image, expiry_date, unit_id, category_id";

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Product>>;
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Product>>;
    async fn save(&self, data: ProductData) -> anyhow::Result<Product>;
    /// Replaces every column and the tag set.
    async fn update(&self, id: i64, data: ProductData) -> anyhow::Result<Product>;
    /// Clears the tag links, then removes the product. Tags themselves are kept.
    async fn delete(&self, id: i64) -> anyhow::Result<()>;
    async fn find_all_with_filter(&self, filter: &ProductFilter) -> anyhow::Result<Vec<Product>>;
    async fn find_unit(&self, id: i64) -> anyhow::Result<Option<Unit>>;
    async fn find_category(&self, id: i64) -> anyhow::Result<Option<Category>>;
    async fn find_tags(&self, ids: &[i64]) -> anyhow::Result<Vec<Tag>>;
}

#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_tags(&self, mut products: Vec<Product>) -> anyhow::Result<Vec<Product>> {
        if products.is_empty() {
            return Ok(products);
        }
        let ids: Vec<i64> = products.iter().map(|p| p.base.id).collect();
        let rows = sqlx::query_as::<_, ProductTagRow>(
            r#"
            SELECT pt.product_id, t.id, t.active, t.created_at, t.updated_at, t.name, t.description
              FROM product_tag pt
              JOIN tag t ON t.id = pt.tag_id
             WHERE pt.product_id = ANY($1)
             ORDER BY t.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .context("load product tags")?;

        let mut by_product: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in rows {
            by_product.entry(row.product_id).or_default().push(row.tag);
        }
        for p in &mut products {
            p.tags = by_product.remove(&p.base.id).unwrap_or_default();
        }
        Ok(products)
    }
}

async fn link_tags(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
    tag_ids: &[i64],
) -> anyhow::Result<()> {
    for tag_id in tag_ids {
        sqlx::query(
            "INSERT INTO product_tag (product_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(product_id)
        .bind(tag_id)
        .execute(&mut **tx)
        .await
        .context("insert product tag")?;
    }
    Ok(())
}

async fn clear_tags(tx: &mut Transaction<'_, Postgres>, product_id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM product_tag WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut **tx)
        .await
        .context("clear product tags")?;
    Ok(())
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = $1");
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("find product by id")?;
        match row {
            Some(p) => Ok(self.attach_tags(vec![p]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE name = $1");
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("find product by name")?;
        Ok(row)
    }

    async fn save(&self, d: ProductData) -> anyhow::Result<Product> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let sql = format!(
            r#"
            INSERT INTO product (name, description, price, image, expiry_date, unit_id, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(&d.name)
            .bind(&d.description)
            .bind(d.price)
            .bind(&d.image)
            .bind(d.expiry_date)
            .bind(d.unit_id)
            .bind(d.category_id)
            .fetch_one(&mut *tx)
            .await
            .context("insert product")?;
        link_tags(&mut tx, product.base.id, &d.tag_ids).await?;
        tx.commit().await.context("commit tx")?;

        Ok(self.attach_tags(vec![product]).await?.remove(0))
    }

    async fn update(&self, id: i64, d: ProductData) -> anyhow::Result<Product> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let sql = format!(
            r#"
            UPDATE product
               SET name = $2, description = $3, price = $4, image = $5, expiry_date = $6,
                   unit_id = $7, category_id = $8, updated_at = now()
             WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(&d.name)
            .bind(&d.description)
            .bind(d.price)
            .bind(&d.image)
            .bind(d.expiry_date)
            .bind(d.unit_id)
            .bind(d.category_id)
            .fetch_one(&mut *tx)
            .await
            .context("update product")?;
        clear_tags(&mut tx, id).await?;
        link_tags(&mut tx, id, &d.tag_ids).await?;
        tx.commit().await.context("commit tx")?;

        Ok(self.attach_tags(vec![product]).await?.remove(0))
    }

    async fn delete(&self, id: i64) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        clear_tags(&mut tx, id).await?;
        let res = sqlx::query("DELETE FROM product WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete product")?;
        if res.rows_affected() == 0 {
            return Err(anyhow::Error::from(sqlx::Error::RowNotFound).context("delete product"));
        }
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn find_all_with_filter(&self, f: &ProductFilter) -> anyhow::Result<Vec<Product>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE active = TRUE"
        ));
        if let Some(name) = &f.name {
            qb.push(" AND name ILIKE ")
                .push_bind(contains_pattern(name))
                .push(r" ESCAPE '\'");
        }
        if let Some(category_id) = f.category_id {
            qb.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(from) = f.from_price {
            qb.push(" AND price >= ").push_bind(from);
        }
        if let Some(to) = f.to_price {
            qb.push(" AND price <= ").push_bind(to);
        }
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(f.page_size)
            .push(" OFFSET ")
            .push_bind(f.offset());

        let rows = qb
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await
            .context("list products")?;
        self.attach_tags(rows).await
    }

    async fn find_unit(&self, id: i64) -> anyhow::Result<Option<Unit>> {
        let row = sqlx::query_as::<_, Unit>(
            "SELECT id, active, created_at, updated_at, name, abbreviation FROM unit WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find unit")?;
        Ok(row)
    }

    async fn find_category(&self, id: i64) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, active, created_at, updated_at, name, description FROM category WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find category")?;
        Ok(row)
    }

    async fn find_tags(&self, ids: &[i64]) -> anyhow::Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>(
            "SELECT id, active, created_at, updated_at, name, description FROM tag WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("find tags")?;
        Ok(rows)
    }
}
