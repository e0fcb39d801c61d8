use crate::{
    buffer_pool::{BufferPool, DEFAULT_PAGES},
    catalog::Catalog,
};

/// The top-level handle tying a catalog and a buffer pool together.
///
/// There is deliberately no process-wide instance: every test (and every
/// embedding) builds its own `Database` and passes it by reference into
/// heap files, iterators and operators.
pub struct Database {
    catalog: Catalog,
    buffer_pool: BufferPool,
}

impl Database {
    pub fn new() -> Self {
        Self::with_pool_capacity(DEFAULT_PAGES)
    }

    pub fn with_pool_capacity(capacity: usize) -> Self {
        Self {
            catalog: Catalog::new(),
            buffer_pool: BufferPool::new(capacity),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
