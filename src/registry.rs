//! Collection registration.
//!
//! A [`Registry`] is an ordinary value owned by the application; it tracks
//! which model types and names are taken and hands out typed [`Collection`]
//! handles. Registration never touches the store.

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::pool::Pool;
use crate::query::Query;
use crate::schema::{CollectionDescriptor, Model};

/// Random id for a model saved without one.
pub fn new_model_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    /// Collection name; defaults to the type's name without its module path.
    pub name: Option<String>,
    /// Keep a primary index of live ids. Required by counts, bulk reads and
    /// deletes, and queries.
    pub index: bool,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn index(mut self, index: bool) -> Self {
        self.index = index;
        self
    }
}

#[derive(Default)]
struct Registered {
    types: HashMap<TypeId, String>,
    names: HashMap<String, Arc<CollectionDescriptor>>,
}

pub struct Registry {
    pool: Pool,
    registered: Mutex<Registered>,
}

impl Registry {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            registered: Mutex::new(Registered::default()),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Register model type `T`. Fails if `T` or the name is already registered,
    /// the name is invalid, or the schema does not validate.
    pub fn register<T: Model>(&self, options: CollectionOptions) -> Result<Collection<T>> {
        let type_name = std::any::type_name::<T>();
        let name = options
            .name
            .unwrap_or_else(|| short_type_name(type_name).to_string());

        let mut registered = self.registered.lock().unwrap_or_else(|e| e.into_inner());
        if registered.types.contains_key(&TypeId::of::<T>()) {
            return Err(Error::DuplicateType(type_name));
        }
        if registered.names.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }

        let desc = Arc::new(CollectionDescriptor::new(&name, options.index, T::schema())?);
        registered.types.insert(TypeId::of::<T>(), name.clone());
        registered.names.insert(name.clone(), Arc::clone(&desc));
        tracing::info!(
            "Registered collection {} ({} fields, indexed: {})",
            name,
            desc.fields().len(),
            desc.is_indexed()
        );

        Ok(Collection {
            desc,
            pool: self.pool.clone(),
            _model: PhantomData,
        })
    }

    /// Descriptor of a registered collection.
    pub fn descriptor(&self, name: &str) -> Option<Arc<CollectionDescriptor>> {
        let registered = self.registered.lock().unwrap_or_else(|e| e.into_inner());
        registered.names.get(name).cloned()
    }

    /// Registered collection names, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let registered = self.registered.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = registered.names.keys().cloned().collect();
        names.sort();
        names
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Typed handle to a registered collection.
pub struct Collection<T> {
    desc: Arc<CollectionDescriptor>,
    pool: Pool,
    _model: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            desc: Arc::clone(&self.desc),
            pool: self.pool.clone(),
            _model: PhantomData,
        }
    }
}

impl<T: Model> Collection<T> {
    pub fn name(&self) -> &str {
        self.desc.name()
    }

    pub fn descriptor(&self) -> &CollectionDescriptor {
        &self.desc
    }

    pub(crate) fn shared_descriptor(&self) -> Arc<CollectionDescriptor> {
        Arc::clone(&self.desc)
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn query(&self) -> Query<T> {
        Query::new(self.clone())
    }

    /// Save `model`, assigning an id if it has none.
    pub async fn save(&self, model: &mut T) -> Result<()> {
        let mut tx = self.pool.transaction();
        tx.save(self, model);
        tx.exec().await
    }

    /// Save only the named fields of an already-saved model.
    pub async fn save_fields(&self, model: &T, fields: &[&str]) -> Result<()> {
        let mut tx = self.pool.transaction();
        tx.save_fields(self, model, fields);
        tx.exec().await
    }

    pub async fn find(&self, id: &str) -> Result<T> {
        let mut model = T::default();
        let mut tx = self.pool.transaction();
        tx.find(self, id, &mut model);
        tx.exec().await?;
        Ok(model)
    }

    /// Read only the named fields; the rest keep their default values.
    pub async fn find_fields(&self, id: &str, fields: &[&str]) -> Result<T> {
        let mut model = T::default();
        let mut tx = self.pool.transaction();
        tx.find_fields(self, id, fields, &mut model);
        tx.exec().await?;
        Ok(model)
    }

    pub async fn find_all(&self) -> Result<Vec<T>> {
        let mut models = Vec::new();
        let mut tx = self.pool.transaction();
        tx.find_all(self, &mut models);
        tx.exec().await?;
        Ok(models)
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        let mut exists = false;
        let mut tx = self.pool.transaction();
        tx.exists(self, id, &mut exists);
        tx.exec().await?;
        Ok(exists)
    }

    /// Delete record `id`; returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut deleted = false;
        let mut tx = self.pool.transaction();
        tx.delete(self, id, &mut deleted);
        tx.exec().await?;
        Ok(deleted)
    }

    /// Delete every record; returns how many were deleted.
    pub async fn delete_all(&self) -> Result<usize> {
        let mut count = 0;
        let mut tx = self.pool.transaction();
        tx.delete_all(self, &mut count);
        tx.exec().await?;
        Ok(count)
    }

    pub async fn count(&self) -> Result<usize> {
        let mut count = 0;
        let mut tx = self.pool.transaction();
        tx.count(self, &mut count);
        tx.exec().await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("app::models::Person"), "Person");
        assert_eq!(short_type_name("Person"), "Person");
        assert_eq!(short_type_name("app::Wrapper<app::Inner>"), "Wrapper");
    }

    #[test]
    fn test_model_ids_are_unique() {
        let a = new_model_id();
        let b = new_model_id();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
