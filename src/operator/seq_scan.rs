use std::sync::Arc;

use super::{OpIterator, OpState};
use crate::{
    database::Database,
    error::{DbError, DbResult},
    storage::{FieldItem, HeapFile, HeapFileIterator, Schema, Tuple},
    transaction::Transaction,
};

/// Sequential scan over one table, the leaf of every operator tree.
pub struct SeqScan<'d> {
    db: &'d Database,
    tx: Transaction,
    file: Arc<HeapFile>,
    table_alias: String,

    iter: Option<HeapFileIterator<'d>>,
    state: OpState,
    lookahead: Option<Tuple>,
}

impl<'d> SeqScan<'d> {
    pub fn new(db: &'d Database, tx: &Transaction, table_id: u32, table_alias: &str) -> DbResult<Self> {
        let file = db.catalog().get_file(table_id)?;
        Ok(Self {
            db,
            tx: *tx,
            file,
            table_alias: table_alias.to_string(),
            iter: None,
            state: OpState::Closed,
            lookahead: None,
        })
    }

    fn produce(&mut self) -> DbResult<Option<Tuple>> {
        match self.iter.as_mut() {
            Some(iter) => iter.next_tuple(),
            None => Ok(None),
        }
    }
}

impl OpIterator for SeqScan<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.iter = Some(self.file.iter(self.db, &self.tx));
        self.state = OpState::Open;
        self.lookahead = None;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        match self.state {
            OpState::Closed => Err(DbError::db("seq scan is not open")),
            OpState::Exhausted => Ok(false),
            OpState::Open => {
                if self.lookahead.is_none() {
                    self.lookahead = self.produce()?;
                    if self.lookahead.is_none() {
                        self.state = OpState::Exhausted;
                    }
                }
                Ok(self.lookahead.is_some())
            }
        }
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if !self.has_next()? {
            return Err(DbError::no_such_element("seq scan exhausted"));
        }
        Ok(self.lookahead.take().unwrap())
    }

    fn rewind(&mut self) -> DbResult<()> {
        match self.iter.as_mut() {
            Some(iter) => iter.rewind(),
            None => return Err(DbError::db("seq scan is not open")),
        }
        self.state = OpState::Open;
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.iter = None;
        self.state = OpState::Closed;
        self.lookahead = None;
    }

    /// The table's schema with every field name prefixed by the scan's
    /// alias, so fields stay distinguishable after a self-join.
    fn get_schema(&self) -> Schema {
        let schema = self.file.get_schema();
        let fields = schema
            .get_fields()
            .iter()
            .map(|item| FieldItem {
                field_type: item.field_type,
                field_name: item
                    .field_name
                    .as_ref()
                    .map(|name| format!("{}.{}", self.table_alias, name)),
            })
            .collect();
        Schema::new(fields)
    }
}
