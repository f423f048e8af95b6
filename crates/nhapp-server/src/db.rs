use std::sync::{Arc, Mutex};

use nhapp_store::Database;

use crate::error::ServerError;

/// The process-wide store handle.
///
/// SQLite calls are short and synchronous, so handlers take the lock inside
/// [`SharedDb::call`] and release it before any `.await`.
#[derive(Clone)]
pub struct SharedDb(Arc<Mutex<Database>>);

impl SharedDb {
    pub fn new(db: Database) -> Self {
        Self(Arc::new(Mutex::new(db)))
    }

    pub fn call<T, E>(&self, f: impl FnOnce(&Database) -> Result<T, E>) -> Result<T, ServerError>
    where
        ServerError: From<E>,
    {
        let db = self
            .0
            .lock()
            .map_err(|_| ServerError::Internal("database lock poisoned".to_string()))?;
        Ok(f(&*db)?)
    }
}
