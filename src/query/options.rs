use log::debug;
use serde::{Deserialize, Serialize};

use super::capabilities::{Capabilities, Capability};
use crate::entity_set::EntitySet;
use crate::error::ODataError;
use crate::expression::ast::Node;
use crate::expression::errors::ExpressionError;
use crate::expression::expand::{parse_expand, split_nested_options};
use crate::expression::orderby::{parse_orderby, SortKey};
use crate::expression::parser::parse_filter;
use crate::expression::search::{parse_search, SearchExpr};
use crate::model::entity_type::NavigationProperty;
use crate::model::Model;

/// Query options as received, before any parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawQueryOptions {
    pub filter: Option<String>,
    pub search: Option<String>,
    pub orderby: Option<String>,
    pub skip: Option<String>,
    pub top: Option<String>,
    pub count: Option<String>,
    pub select: Option<String>,
    pub expand: Option<String>,
}

impl RawQueryOptions {
    /// Collects `$name=value` pairs. Names without a `$` prefix are custom options and
    /// are ignored; unknown or repeated system options are rejected.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, ODataError>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut raw = RawQueryOptions::default();
        for (name, value) in pairs {
            let name = name.as_ref().trim();
            let Some(option) = name.strip_prefix('$') else {
                continue;
            };
            let slot = match option {
                "filter" => &mut raw.filter,
                "search" => &mut raw.search,
                "orderby" => &mut raw.orderby,
                "skip" => &mut raw.skip,
                "top" => &mut raw.top,
                "count" => &mut raw.count,
                "select" => &mut raw.select,
                "expand" => &mut raw.expand,
                _ => {
                    return Err(ODataError::bad_request(
                        "unknown_option",
                        format!("Unknown query option `{}`", name),
                    ))
                }
            };
            if slot.is_some() {
                return Err(ODataError::bad_request(
                    "duplicate_option",
                    format!("Query option `{}` given more than once", name),
                ));
            }
            *slot = Some(value.into());
        }
        Ok(raw)
    }
}

/// A `$expand` item resolved against the model.
#[derive(Debug, Clone)]
pub struct ExpandRequest {
    pub navigation: NavigationProperty,
    pub target_set: String,
    pub options: QueryOptions,
}

/// Parsed query options for one entity set.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filter: Option<Node>,
    pub search: Option<SearchExpr>,
    pub orderby: Vec<SortKey>,
    pub skip: Option<u64>,
    pub top: Option<u64>,
    pub count: bool,
    pub select: Option<Vec<String>>,
    pub expand: Vec<ExpandRequest>,
}

impl QueryOptions {
    /// ANDs `node` into the filter.
    pub fn and_filter(mut self, node: Node) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => Node::and(existing, node),
            None => node,
        });
        self
    }

    /// Parses every present option against `entity_set`, rejecting options the set
    /// does not support.
    pub fn parse(model: &Model, entity_set: &dyn EntitySet, raw: &RawQueryOptions) -> Result<Self, ODataError> {
        check_capabilities(entity_set.capabilities(), raw)?;
        let entity_type = entity_set.entity_type();
        let mut options = QueryOptions::default();

        if let Some(filter) = &raw.filter {
            let tree = parse_filter(model, entity_set.name(), filter)?;
            debug!("Parsed $filter for {}: {}", entity_set.name(), tree);
            options.filter = Some(tree);
        }
        if let Some(search) = &raw.search {
            options.search = Some(parse_search(search, model.config())?);
        }
        if let Some(orderby) = &raw.orderby {
            options.orderby = parse_orderby(orderby, entity_type)?;
        }
        if let Some(skip) = &raw.skip {
            options.skip = Some(parse_page_value("$skip", skip)?);
        }
        if let Some(top) = &raw.top {
            options.top = Some(parse_page_value("$top", top)?);
        }
        if let Some(count) = &raw.count {
            options.count = match count.trim() {
                "true" => true,
                "false" => false,
                other => {
                    return Err(ODataError::bad_request(
                        "invalid_count",
                        format!("$count must be true or false, got `{}`", other),
                    ))
                }
            };
        }
        if let Some(select) = &raw.select {
            options.select = parse_select(select, entity_set)?;
        }
        if let Some(expand) = &raw.expand {
            options.expand = parse_expand_requests(model, entity_set, expand)?;
        }
        Ok(options)
    }
}

fn check_capabilities(capabilities: Capabilities, raw: &RawQueryOptions) -> Result<(), ODataError> {
    let requirements = [
        (raw.filter.is_some(), Capability::Filter, "$filter"),
        (raw.search.is_some(), Capability::Search, "$search"),
        (raw.orderby.is_some(), Capability::Sort, "$orderby"),
        (raw.skip.is_some(), Capability::Paginate, "$skip"),
        (raw.top.is_some(), Capability::Paginate, "$top"),
        (raw.count.is_some(), Capability::Count, "$count"),
        (raw.select.is_some(), Capability::Select, "$select"),
        (raw.expand.is_some(), Capability::Expand, "$expand"),
    ];
    for (present, capability, option) in requirements {
        if present && !capabilities.contains(capability) {
            return Err(ODataError::UnsupportedOption(option));
        }
    }
    Ok(())
}

/// Parses a `$skip` / `$top` value: a non-negative integer.
pub fn parse_page_value(option: &'static str, raw: &str) -> Result<u64, ODataError> {
    raw.trim().parse::<u64>().map_err(|_| {
        ODataError::bad_request(
            "invalid_pagination",
            format!("{} must be a non-negative integer, got `{}`", option, raw),
        )
    })
}

fn parse_select(select: &str, entity_set: &dyn EntitySet) -> Result<Option<Vec<String>>, ODataError> {
    let names: Vec<&str> = select.split(',').map(str::trim).collect();
    if names.contains(&"*") {
        return Ok(None);
    }
    let entity_type = entity_set.entity_type();
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        if entity_type.declared_property(name).is_none() {
            return Err(ExpressionError::UnknownProperty(name.to_string()).into());
        }
        selected.push(name.to_string());
    }
    Ok(Some(selected))
}

fn parse_expand_requests(
    model: &Model,
    entity_set: &dyn EntitySet,
    expand: &str,
) -> Result<Vec<ExpandRequest>, ODataError> {
    let mut requests = Vec::new();
    for item in parse_expand(expand)? {
        let navigation = entity_set
            .entity_type()
            .navigation_property(&item.navigation)
            .ok_or_else(|| ExpressionError::UnknownProperty(item.navigation.clone()))?
            .clone();
        let target_set = model
            .navigation_target(entity_set.name(), &item.navigation)
            .ok_or_else(|| ExpressionError::UnboundNavigation(item.navigation.clone()))?
            .to_string();
        let target = model
            .entity_set(&target_set)
            .ok_or_else(|| ExpressionError::UnknownEntitySet(target_set.clone()))?;

        let nested = match &item.options {
            Some(text) => RawQueryOptions::from_pairs(split_nested_options(text)?)?,
            None => RawQueryOptions::default(),
        };
        let options = QueryOptions::parse(model, target.as_ref(), &nested)?;
        requests.push(ExpandRequest {
            navigation,
            target_set,
            options,
        });
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use test_case::test_case;

    #[test_case("xyz" ; "non numeric")]
    #[test_case("-2" ; "negative")]
    #[test_case("1.5" ; "fractional")]
    fn test_invalid_page_values(raw: &str) {
        let err = parse_page_value("$top", raw).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.code(), "invalid_pagination");
    }

    #[test]
    fn test_from_pairs() {
        let raw = RawQueryOptions::from_pairs([("$filter", "id eq 1"), ("$top", "2"), ("custom", "x")]).unwrap();
        assert_eq!(raw.filter.as_deref(), Some("id eq 1"));
        assert_eq!(raw.top.as_deref(), Some("2"));

        assert!(RawQueryOptions::from_pairs([("$format", "json")]).is_err());
        assert!(RawQueryOptions::from_pairs([("$top", "1"), ("$top", "2")]).is_err());
    }

    #[test]
    fn test_parse_all_options() {
        let model = testing::model();
        let set = model.entity_set("flights").unwrap();
        let raw = RawQueryOptions {
            filter: Some("gate gt 1".into()),
            orderby: Some("gate desc".into()),
            skip: Some("1".into()),
            top: Some("2".into()),
            count: Some("true".into()),
            select: Some("origin, gate".into()),
            expand: Some("passengers($orderby=name desc;$top=1),originAirport".into()),
            ..Default::default()
        };
        let options = QueryOptions::parse(&model, set.as_ref(), &raw).unwrap();
        assert!(options.filter.is_some());
        assert_eq!(options.orderby.len(), 1);
        assert_eq!((options.skip, options.top), (Some(1), Some(2)));
        assert!(options.count);
        assert_eq!(options.select, Some(vec!["origin".to_string(), "gate".to_string()]));
        assert_eq!(options.expand.len(), 2);
        assert_eq!(options.expand[0].target_set, "passengers");
        assert_eq!(options.expand[0].options.top, Some(1));
    }

    #[test]
    fn test_invalid_count_and_select() {
        let model = testing::model();
        let set = model.entity_set("flights").unwrap();
        let raw = RawQueryOptions {
            count: Some("yes".into()),
            ..Default::default()
        };
        assert_eq!(QueryOptions::parse(&model, set.as_ref(), &raw).unwrap_err().code(), "invalid_count");

        let raw = RawQueryOptions {
            select: Some("altitude".into()),
            ..Default::default()
        };
        assert!(QueryOptions::parse(&model, set.as_ref(), &raw).is_err());
    }

    #[test]
    fn test_unsupported_option_is_rejected() {
        let model = testing::model();
        let set = model.entity_set("countries").unwrap();
        let raw = RawQueryOptions {
            search: Some("uk".into()),
            ..Default::default()
        };
        assert!(matches!(
            QueryOptions::parse(&model, set.as_ref(), &raw),
            Err(ODataError::UnsupportedOption("$search"))
        ));
    }

    #[test]
    fn test_and_filter_combines() {
        let model = testing::model();
        let a = parse_filter(&model, "flights", "gate gt 1").unwrap();
        let b = parse_filter(&model, "flights", "gate lt 20").unwrap();
        let options = QueryOptions::default().and_filter(a).and_filter(b);
        assert_eq!(options.filter.unwrap().to_string(), "((gate gt 1) and (gate lt 20))");
    }
}
