//! Generic in-memory query pipeline: filter → search → orderby → skip → top.
//!
//! Stores hand over a lazy stream of materialized entities together with the
//! stages they did not already apply themselves.

use log::debug;

use super::capabilities::EntityIter;
use super::options::QueryOptions;
use super::transaction::Transaction;
use crate::error::ODataError;
use crate::expression::ast::Node;
use crate::expression::eval::EvalContext;
use crate::expression::orderby::{compare_entities, SortKey};
use crate::expression::search::SearchExpr;
use crate::model::entity::Entity;

/// Stages still to be applied to an entity stream.
#[derive(Debug, Clone, Copy)]
pub struct Stages<'t> {
    pub filter: Option<&'t Node>,
    pub search: Option<&'t SearchExpr>,
    pub orderby: &'t [SortKey],
    pub skip: Option<u64>,
    pub top: Option<u64>,
}

impl<'t> Stages<'t> {
    pub fn from_options(options: &'t QueryOptions) -> Self {
        Self {
            filter: options.filter.as_ref(),
            search: options.search.as_ref(),
            orderby: &options.orderby,
            skip: options.skip,
            top: options.top,
        }
    }

    /// Drops ordering and paging, as counting ignores both.
    pub fn unpaged(self) -> Self {
        Self {
            orderby: &[],
            skip: None,
            top: None,
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_none()
            && self.search.is_none()
            && self.orderby.is_empty()
            && self.skip.is_none()
            && self.top.is_none()
    }
}

/// Applies `stages` to `entities`. Only ordering forces the stream to be collected.
pub fn run<'t>(
    tx: &'t Transaction<'t>,
    entities: EntityIter<'t>,
    stages: Stages<'t>,
) -> Result<EntityIter<'t>, ODataError> {
    let model = tx.model();
    let set = tx.entity_set().name();
    let mut iter = entities;

    if let Some(filter) = stages.filter {
        debug!("Evaluating filter {} over {} in memory", filter, set);
        iter = Box::new(iter.filter_map(move |item| {
            let entity = match item {
                Ok(entity) => entity,
                Err(e) => return Some(Err(e)),
            };
            let keep = EvalContext::new(model, set, &entity).matches(filter);
            match keep {
                Ok(true) => Some(Ok(entity)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            }
        }));
    }

    if let Some(search) = stages.search {
        let case_sensitive = tx.config().search_case_sensitive;
        iter = Box::new(iter.filter(move |item| match item {
            Ok(entity) => search.matches(entity, case_sensitive),
            Err(_) => true,
        }));
    }

    if !stages.orderby.is_empty() {
        let mut entities: Vec<Entity> = iter.collect::<Result<_, _>>()?;
        // sort_by is stable, so full ties keep storage order
        entities.sort_by(|a, b| compare_entities(a, b, stages.orderby));
        iter = Box::new(entities.into_iter().map(Ok));
    }

    if let Some(skip) = stages.skip {
        let mut skipped = 0u64;
        iter = Box::new(iter.filter(move |item| {
            if item.is_ok() && skipped < skip {
                skipped += 1;
                false
            } else {
                true
            }
        }));
    }

    if let Some(top) = stages.top {
        let mut inner = iter;
        let mut remaining = top;
        iter = Box::new(std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let item = inner.next()?;
            if item.is_ok() {
                remaining -= 1;
            }
            Some(item)
        }));
    }

    Ok(iter)
}

/// Counts what [`run`] yields for `stages` without paging.
pub fn count<'t>(tx: &'t Transaction<'t>, entities: EntityIter<'t>, stages: Stages<'t>) -> Result<u64, ODataError> {
    run(tx, entities, stages.unpaged())?.try_fold(0u64, |n, item| item.map(|_| n + 1))
}
