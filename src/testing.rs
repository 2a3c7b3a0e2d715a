//! In-memory repositories and a storage stub for unit tests.
//!
//! The store enforces the same uniqueness and cascade rules as the SQL schema in
//! `migrations/`, so service tests observe the same effects as against Postgres.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;

use crate::customers::repo::CustomerRepository;
use crate::customers::repo_types::{Customer, CustomerFilter, CustomerProfile};
use crate::entity::BaseEntity;
use crate::orders::repo::OrderRepository;
use crate::orders::repo_types::{Invoice, NewOrder, Order, OrderDetails, OrderStatus};
use crate::products::repo::ProductRepository;
use crate::products::repo_types::{Category, Product, ProductData, ProductFilter, Tag, Unit};
use crate::storage::StorageClient;
use crate::users::repo::UserRepository;
use crate::users::repo_types::{NewUser, User, UserRole};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    customers: Vec<Customer>,
    orders: Vec<Order>,
    details: Vec<OrderDetails>,
    invoices: Vec<Invoice>,
    products: Vec<Product>,
    product_tags: Vec<(i64, i64)>,
    tags: Vec<Tag>,
    units: Vec<Unit>,
    categories: Vec<Category>,
}

impl Tables {
    fn base(&mut self) -> BaseEntity {
        self.next_id += 1;
        BaseEntity::new(self.next_id)
    }

    fn with_tags(&self, mut p: Product) -> Product {
        p.tags = self
            .product_tags
            .iter()
            .filter(|(pid, _)| *pid == p.base.id)
            .filter_map(|(_, tid)| self.tags.iter().find(|t| t.base.id == *tid).cloned())
            .collect();
        p
    }

    fn remove_order(&mut self, order_id: i64) {
        self.details.retain(|d| d.order_id != order_id);
        self.invoices.retain(|i| i.order_id != order_id);
        self.orders.retain(|o| o.base.id != order_id);
    }
}

fn not_found(what: &str) -> anyhow::Error {
    anyhow::Error::from(sqlx::Error::RowNotFound).context(what.to_string())
}

fn contains_ci(value: &Option<String>, needle: &str) -> bool {
    value
        .as_deref()
        .map_or(false, |v| v.to_lowercase().contains(&needle.to_lowercase()))
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_user_update: AtomicBool,
}

impl MemoryStore {
    pub fn add_unit(&self, name: &str) -> i64 {
        let mut t = self.tables.lock().unwrap();
        let base = t.base();
        let id = base.id;
        t.units.push(Unit {
            base,
            name: name.into(),
            abbreviation: None,
        });
        id
    }

    pub fn add_category(&self, name: &str) -> i64 {
        let mut t = self.tables.lock().unwrap();
        let base = t.base();
        let id = base.id;
        t.categories.push(Category {
            base,
            name: name.into(),
            description: None,
        });
        id
    }

    pub fn add_tag(&self, name: &str) -> i64 {
        let mut t = self.tables.lock().unwrap();
        let base = t.base();
        let id = base.id;
        t.tags.push(Tag {
            base,
            name: name.into(),
            description: None,
        });
        id
    }

    pub fn set_role(&self, username: &str, role: UserRole) {
        let mut t = self.tables.lock().unwrap();
        if let Some(u) = t.users.iter_mut().find(|u| u.username == username) {
            u.user_role = role;
        }
    }

    /// Makes the next `UserRepository::update` fail like a lost connection.
    pub fn fail_next_user_update(&self) {
        self.fail_user_update.store(true, Ordering::SeqCst);
    }

    pub fn tag_count(&self) -> usize {
        self.tables.lock().unwrap().tags.len()
    }

    pub fn product_tag_links(&self) -> usize {
        self.tables.lock().unwrap().product_tags.len()
    }

    pub fn detail_count(&self) -> usize {
        self.tables.lock().unwrap().details.len()
    }

    pub fn invoice_count(&self) -> usize {
        self.tables.lock().unwrap().invoices.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create(&self, new: NewUser, profile: Option<CustomerProfile>) -> anyhow::Result<User> {
        let mut t = self.tables.lock().unwrap();
        if t.users
            .iter()
            .any(|u| u.username == new.username || u.email == new.email)
        {
            anyhow::bail!("duplicate key value violates unique constraint");
        }
        let base = t.base();
        let user = User {
            base,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            avatar: None,
            user_role: new.user_role,
            confirmed: false,
            last_login: None,
        };
        t.users.push(user.clone());
        if let Some(p) = profile {
            let base = t.base();
            t.customers.push(Customer {
                base,
                first_name: p.first_name,
                last_name: p.last_name,
                address: p.address,
                phone: p.phone,
                user_id: user.id(),
            });
        }
        Ok(user)
    }

    async fn update(&self, user: &User, profile: Option<CustomerProfile>) -> anyhow::Result<User> {
        if self.fail_user_update.swap(false, Ordering::SeqCst) {
            anyhow::bail!("connection reset while updating user");
        }
        let mut t = self.tables.lock().unwrap();
        let stored = t
            .users
            .iter_mut()
            .find(|u| u.id() == user.id())
            .ok_or_else(|| not_found("update user"))?;
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.avatar = user.avatar.clone();
        stored.base.touch();
        let updated = stored.clone();

        if let Some(p) = profile {
            match t.customers.iter_mut().find(|c| c.user_id == user.id()) {
                Some(c) => {
                    c.first_name = p.first_name.or(c.first_name.take());
                    c.last_name = p.last_name.or(c.last_name.take());
                    c.address = p.address.or(c.address.take());
                    c.phone = p.phone.or(c.phone.take());
                    c.base.touch();
                }
                None => {
                    let base = t.base();
                    t.customers.push(Customer {
                        base,
                        first_name: p.first_name,
                        last_name: p.last_name,
                        address: p.address,
                        phone: p.phone,
                        user_id: user.id(),
                    });
                }
            }
        }
        Ok(updated)
    }

    async fn update_last_login(&self, username: &str, at: OffsetDateTime) -> anyhow::Result<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(u) = t.users.iter_mut().find(|u| u.username == username) {
            u.last_login = Some(at);
        }
        Ok(())
    }

    async fn confirm(&self, id: i64) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().unwrap();
        match t.users.iter_mut().find(|u| u.id() == id) {
            Some(u) if !u.confirmed => {
                u.confirmed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> anyhow::Result<()> {
        let mut t = self.tables.lock().unwrap();
        if !t.users.iter().any(|u| u.id() == id) {
            return Err(not_found("delete user"));
        }
        let owned: Vec<i64> = t
            .orders
            .iter()
            .filter(|o| o.user_id == id)
            .map(|o| o.base.id)
            .collect();
        for order_id in owned {
            t.remove_order(order_id);
        }
        t.invoices.retain(|i| i.user_id != id);
        t.customers.retain(|c| c.user_id != id);
        t.users.retain(|u| u.id() != id);
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Customer>> {
        let t = self.tables.lock().unwrap();
        Ok(t.customers.iter().find(|c| c.base.id == id).cloned())
    }

    async fn find_by_user(&self, user_id: i64) -> anyhow::Result<Option<Customer>> {
        let t = self.tables.lock().unwrap();
        Ok(t.customers.iter().find(|c| c.user_id == user_id).cloned())
    }

    async fn count(&self) -> anyhow::Result<i64> {
        Ok(self.tables.lock().unwrap().customers.len() as i64)
    }

    async fn find_all_with_filter(&self, f: &CustomerFilter) -> anyhow::Result<Vec<Customer>> {
        let t = self.tables.lock().unwrap();
        Ok(t.customers
            .iter()
            .filter(|c| c.base.active)
            .filter(|c| f.first_name.as_deref().map_or(true, |v| contains_ci(&c.first_name, v)))
            .filter(|c| f.last_name.as_deref().map_or(true, |v| contains_ci(&c.last_name, v)))
            .filter(|c| f.address.as_deref().map_or(true, |v| contains_ci(&c.address, v)))
            .filter(|c| f.phone.as_ref().map_or(true, |v| c.phone.as_ref() == Some(v)))
            .skip(f.offset() as usize)
            .take(f.page_size as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create(&self, new: NewOrder) -> anyhow::Result<Order> {
        let mut t = self.tables.lock().unwrap();
        if t.orders.iter().any(|o| o.order_number == new.order_number) {
            anyhow::bail!("duplicate key value violates unique constraint");
        }
        let total = new.total();
        let base = t.base();
        let order = Order {
            base,
            order_number: new.order_number,
            order_type: new.order_type,
            order_status: OrderStatus::Pending,
            expected_delivery: new.expected_delivery,
            user_id: new.user_id,
            delivery_schedule_id: None,
        };
        t.orders.push(order.clone());
        for line in new.lines {
            let base = t.base();
            t.details.push(OrderDetails {
                base,
                order_id: order.base.id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }
        let base = t.base();
        t.invoices.push(Invoice {
            base,
            order_id: order.base.id,
            user_id: new.user_id,
            total_amount: total,
            paid: false,
        });
        Ok(order)
    }

    async fn find_by_order_number(&self, order_number: &str) -> anyhow::Result<Option<Order>> {
        let t = self.tables.lock().unwrap();
        Ok(t.orders.iter().find(|o| o.order_number == order_number).cloned())
    }

    async fn find_details(&self, order_id: i64) -> anyhow::Result<Vec<OrderDetails>> {
        let t = self.tables.lock().unwrap();
        Ok(t.details.iter().filter(|d| d.order_id == order_id).cloned().collect())
    }

    async fn find_invoice(&self, order_id: i64) -> anyhow::Result<Option<Invoice>> {
        let t = self.tables.lock().unwrap();
        Ok(t.invoices.iter().find(|i| i.order_id == order_id).cloned())
    }

    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> anyhow::Result<Vec<Order>> {
        let t = self.tables.lock().unwrap();
        Ok(t.orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> anyhow::Result<Option<Order>> {
        let mut t = self.tables.lock().unwrap();
        let Some(order) = t
            .orders
            .iter_mut()
            .find(|o| o.base.id == order_id && o.order_status == from)
        else {
            return Ok(None);
        };
        order.order_status = to;
        order.base.touch();
        Ok(Some(order.clone()))
    }

    async fn delete(&self, order_id: i64) -> anyhow::Result<()> {
        let mut t = self.tables.lock().unwrap();
        if !t.orders.iter().any(|o| o.base.id == order_id) {
            return Err(not_found("delete order"));
        }
        t.remove_order(order_id);
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Product>> {
        let t = self.tables.lock().unwrap();
        let found = t.products.iter().find(|p| p.base.id == id).cloned();
        Ok(found.map(|p| t.with_tags(p)))
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Product>> {
        let t = self.tables.lock().unwrap();
        Ok(t.products.iter().find(|p| p.name == name).cloned())
    }

    async fn save(&self, d: ProductData) -> anyhow::Result<Product> {
        let mut t = self.tables.lock().unwrap();
        if t.products.iter().any(|p| p.name == d.name) {
            anyhow::bail!("duplicate key value violates unique constraint");
        }
        let base = t.base();
        let product = Product {
            base,
            name: d.name,
            description: d.description,
            price: d.price,
            image: d.image,
            expiry_date: d.expiry_date,
            unit_id: d.unit_id,
            category_id: d.category_id,
            tags: Vec::new(),
        };
        t.products.push(product.clone());
        for tag_id in d.tag_ids {
            t.product_tags.push((product.base.id, tag_id));
        }
        Ok(t.with_tags(product))
    }

    async fn update(&self, id: i64, d: ProductData) -> anyhow::Result<Product> {
        let mut t = self.tables.lock().unwrap();
        let stored = t
            .products
            .iter_mut()
            .find(|p| p.base.id == id)
            .ok_or_else(|| not_found("update product"))?;
        stored.name = d.name;
        stored.description = d.description;
        stored.price = d.price;
        stored.image = d.image;
        stored.expiry_date = d.expiry_date;
        stored.unit_id = d.unit_id;
        stored.category_id = d.category_id;
        stored.base.touch();
        let product = stored.clone();
        t.product_tags.retain(|(pid, _)| *pid != id);
        for tag_id in d.tag_ids {
            t.product_tags.push((id, tag_id));
        }
        Ok(t.with_tags(product))
    }

    async fn delete(&self, id: i64) -> anyhow::Result<()> {
        let mut t = self.tables.lock().unwrap();
        if !t.products.iter().any(|p| p.base.id == id) {
            return Err(not_found("delete product"));
        }
        t.product_tags.retain(|(pid, _)| *pid != id);
        t.details.retain(|d| d.product_id != id);
        t.products.retain(|p| p.base.id != id);
        Ok(())
    }

    async fn find_all_with_filter(&self, f: &ProductFilter) -> anyhow::Result<Vec<Product>> {
        let t = self.tables.lock().unwrap();
        let rows: Vec<Product> = t
            .products
            .iter()
            .filter(|p| p.base.active)
            .filter(|p| {
                f.name
                    .as_deref()
                    .map_or(true, |n| p.name.to_lowercase().contains(&n.to_lowercase()))
            })
            .filter(|p| f.category_id.map_or(true, |c| p.category_id == Some(c)))
            .filter(|p| f.from_price.map_or(true, |v| p.price >= v))
            .filter(|p| f.to_price.map_or(true, |v| p.price <= v))
            .skip(f.offset() as usize)
            .take(f.page_size as usize)
            .cloned()
            .collect();
        Ok(rows.into_iter().map(|p| t.with_tags(p)).collect())
    }

    async fn find_unit(&self, id: i64) -> anyhow::Result<Option<Unit>> {
        let t = self.tables.lock().unwrap();
        Ok(t.units.iter().find(|u| u.base.id == id).cloned())
    }

    async fn find_category(&self, id: i64) -> anyhow::Result<Option<Category>> {
        let t = self.tables.lock().unwrap();
        Ok(t.categories.iter().find(|c| c.base.id == id).cloned())
    }

    async fn find_tags(&self, ids: &[i64]) -> anyhow::Result<Vec<Tag>> {
        let t = self.tables.lock().unwrap();
        Ok(t.tags
            .iter()
            .filter(|tag| ids.contains(&tag.base.id))
            .cloned()
            .collect())
    }
}

/// Records uploads and deletions instead of talking to S3.
#[derive(Default)]
pub struct FakeStorage {
    pub stored: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _ct: &str) -> anyhow::Result<()> {
        self.stored.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn presign_get(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
        Ok(format!("https://fake.local/{}", key))
    }
}
