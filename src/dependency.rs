//! Resolution of what must be evaluated before a group of functionals runs.
//!
//! For every weak-form key the problem collects the names its functionals declare and resolves
//! them once, at setup, into the fields to interpolate and the value functionals to run, in
//! dependency order.

use crate::error::ConfigurationError;
use crate::field::FieldInfo;
use crate::functional::ValueFunctional;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};

/// Resolved dependency set of one weak-form key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// Primary fields to interpolate.
    pub fields: Vec<usize>,
    /// Auxiliary fields to interpolate.
    pub aux_fields: Vec<usize>,
    /// Value functionals to evaluate, in evaluation order.
    pub values: Vec<usize>,
    /// Names under which consumers see the values, with the providing value functional.
    pub value_names: Vec<(String, usize)>,
}

pub struct DependencyResolver<'a> {
    fields: &'a [FieldInfo],
    aux_fields: &'a [FieldInfo],
    values: &'a [Box<dyn ValueFunctional>],
    /// `name@region` of every provided value.
    providers: BTreeMap<String, usize>,
}

fn qualified(name: &str, region: &str) -> String {
    format!("{name}@{region}")
}

enum Resolved {
    Field(usize),
    AuxField(usize),
    Value(usize),
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        fields: &'a [FieldInfo],
        aux_fields: &'a [FieldInfo],
        values: &'a [Box<dyn ValueFunctional>],
    ) -> Result<Self, ConfigurationError> {
        let mut providers = BTreeMap::new();
        for (index, value) in values.iter().enumerate() {
            let name = value.name();
            let clashes_with_field = fields.iter().chain(aux_fields).any(|field| field.name == name);
            if clashes_with_field {
                return Err(ConfigurationError::Invalid(format!(
                    "value '{name}' has the same name as a field"
                )));
            }
            if providers.insert(qualified(name, value.region()), index).is_some() {
                return Err(ConfigurationError::DuplicateValue(qualified(name, value.region())));
            }
        }
        Ok(Self {
            fields,
            aux_fields,
            values,
            providers,
        })
    }

    fn lookup(&self, name: &str, region: &str) -> Option<Resolved> {
        if let Some(field) = self.fields.iter().position(|field| field.name == name) {
            return Some(Resolved::Field(field));
        }
        if let Some(field) = self.aux_fields.iter().position(|field| field.name == name) {
            return Some(Resolved::AuxField(field));
        }
        // A value provided on the region itself takes precedence over an unrestricted one
        self.providers
            .get(&qualified(name, region))
            .or_else(|| self.providers.get(&qualified(name, "")))
            .map(|&index| Resolved::Value(index))
    }

    /// Resolves the names declared by the functionals of one key on `region`.
    pub fn resolve<'d>(
        &self,
        region: &str,
        declared: impl IntoIterator<Item = &'d BTreeSet<String>>,
    ) -> Result<Dependencies, ConfigurationError> {
        let mut fields = BTreeSet::new();
        let mut aux_fields = BTreeSet::new();
        let mut values = BTreeSet::new();
        let mut value_names = BTreeMap::new();

        let mut pending: Vec<String> = declared.into_iter().flatten().cloned().collect();
        while let Some(name) = pending.pop() {
            match self.lookup(&name, region) {
                Some(Resolved::Field(field)) => {
                    fields.insert(field);
                }
                Some(Resolved::AuxField(field)) => {
                    aux_fields.insert(field);
                }
                Some(Resolved::Value(index)) => {
                    value_names.insert(name, index);
                    if values.insert(index) {
                        pending.extend(self.values[index].dependent_values().iter().cloned());
                    }
                }
                None => {
                    return Err(ConfigurationError::UnknownDependency {
                        region: region.to_string(),
                        name,
                    })
                }
            }
        }

        let order = self.evaluation_order(region, &values)?;
        Ok(Dependencies {
            fields: fields.into_iter().collect(),
            aux_fields: aux_fields.into_iter().collect(),
            values: order,
            value_names: value_names.into_iter().collect(),
        })
    }

    /// Orders the given value functionals so that providers run before their consumers.
    fn evaluation_order(&self, region: &str, values: &BTreeSet<usize>) -> Result<Vec<usize>, ConfigurationError> {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: BTreeMap<usize, NodeIndex> = values.iter().map(|&index| (index, graph.add_node(index))).collect();
        for (&consumer, &consumer_node) in &nodes {
            for name in self.values[consumer].dependent_values() {
                if let Some(Resolved::Value(provider)) = self.lookup(name, region) {
                    graph.add_edge(nodes[&provider], consumer_node, ());
                }
            }
        }
        toposort(&graph, None)
            .map(|sorted| sorted.into_iter().map(|node| graph[node]).collect())
            .map_err(|cycle| {
                let name = self.values[graph[cycle.node_id()]].name();
                ConfigurationError::CyclicDependency(name.to_string())
            })
    }
}
