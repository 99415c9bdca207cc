//! Value payloads carried by source graph nodes.
//!
//! A payload is the semantic content of a [`crate::Value`]: a scalar, an array,
//! a matrix, a time tree, an alignment, or one of the bookkeeping kinds (text,
//! taxa, sequence types) that only feed other generators.

use std::collections::BTreeMap;
use std::fmt;

use crate::errors::ModelError;

/// Kind tag of a [`Payload`], used by converters and exclusion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PayloadKind {
    Real,
    Integer,
    Boolean,
    RealArray,
    IntegerArray,
    BooleanArray,
    RealMatrix,
    Text,
    TextArray,
    Map,
    Taxa,
    SequenceType,
    Tree,
    Alignment,
    Compound,
}

impl PayloadKind {
    /// Stable type name used in diagnostics.
    pub fn type_name(self) -> &'static str {
        match self {
            PayloadKind::Real => "Double",
            PayloadKind::Integer => "Integer",
            PayloadKind::Boolean => "Boolean",
            PayloadKind::RealArray => "Double[]",
            PayloadKind::IntegerArray => "Integer[]",
            PayloadKind::BooleanArray => "Boolean[]",
            PayloadKind::RealMatrix => "Double[][]",
            PayloadKind::Text => "String",
            PayloadKind::TextArray => "String[]",
            PayloadKind::Map => "Map",
            PayloadKind::Taxa => "Taxa",
            PayloadKind::SequenceType => "SequenceType",
            PayloadKind::Tree => "TimeTree",
            PayloadKind::Alignment => "Alignment",
            PayloadKind::Compound => "Vector",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Abstract sequence kinds, mapped to engine datatypes by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SequenceType {
    Nucleotide,
    AminoAcid,
    Binary,
    Continuous,
    Standard { states: usize },
    Other(String),
}

impl SequenceType {
    /// Key under which the datatype table stores this sequence kind.
    pub fn key(&self) -> &str {
        match self {
            SequenceType::Nucleotide => "nucleotide",
            SequenceType::AminoAcid => "aminoacid",
            SequenceType::Binary => "binary",
            SequenceType::Continuous => "continuous",
            SequenceType::Standard { .. } => "standard",
            SequenceType::Other(name) => name,
        }
    }

    /// Number of character states, if the kind is discrete and known.
    pub fn state_count(&self) -> Option<usize> {
        match self {
            SequenceType::Nucleotide => Some(4),
            SequenceType::AminoAcid => Some(20),
            SequenceType::Binary => Some(2),
            SequenceType::Standard { states } => Some(*states),
            SequenceType::Continuous | SequenceType::Other(_) => None,
        }
    }
}

/// One node of a [`TimeTree`]. Heights are ages before the present.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeNode {
    pub name: Option<String>,
    pub height: f64,
    pub parent: Option<usize>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: BTreeMap<String, String>,
}

impl TreeNode {
    pub fn leaf(name: impl Into<String>, height: f64, parent: usize) -> Self {
        TreeNode {
            name: Some(name.into()),
            height,
            parent: Some(parent),
            metadata: BTreeMap::new(),
        }
    }

    pub fn internal(height: f64, parent: Option<usize>) -> Self {
        TreeNode {
            name: None,
            height,
            parent,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A rooted time tree stored as a parent-pointer array.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeTree {
    pub nodes: Vec<TreeNode>,
}

impl TimeTree {
    pub fn new(nodes: Vec<TreeNode>) -> Result<Self, ModelError> {
        let tree = TimeTree { nodes };
        tree.validate()?;
        Ok(tree)
    }

    /// Checks that parents are in range, that there is exactly one root and
    /// that every node reaches it.
    pub fn validate(&self) -> Result<(), ModelError> {
        let n = self.nodes.len();
        if n == 0 {
            return Err(ModelError::InvalidTree("tree has no nodes".into()));
        }
        let mut roots = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            match node.parent {
                None => roots += 1,
                Some(p) if p >= n || p == i => {
                    return Err(ModelError::InvalidTree(format!(
                        "node {} has invalid parent {}",
                        i, p
                    )))
                }
                Some(_) => {}
            }
        }
        if roots != 1 {
            return Err(ModelError::InvalidTree(format!(
                "expected one root, found {}",
                roots
            )));
        }
        for start in 0..n {
            let mut cur = start;
            let mut steps = 0;
            while let Some(p) = self.nodes[cur].parent {
                cur = p;
                steps += 1;
                if steps > n {
                    return Err(ModelError::InvalidTree(format!(
                        "cycle through node {}",
                        start
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn root(&self) -> Option<usize> {
        self.nodes.iter().position(|n| n.parent.is_none())
    }

    pub fn children(&self, index: usize) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent == Some(index))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_leaf(&self, index: usize) -> bool {
        !self.nodes.iter().any(|n| n.parent == Some(index))
    }

    pub fn leaves(&self) -> Vec<usize> {
        (0..self.nodes.len()).filter(|&i| self.is_leaf(i)).collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    pub fn internal_node_count(&self) -> usize {
        self.nodes.len() - self.leaf_count()
    }

    pub fn root_height(&self) -> f64 {
        self.root().map(|r| self.nodes[r].height).unwrap_or(0.0)
    }

    /// Leaf names in node order; unnamed leaves are reported by index.
    pub fn taxa_names(&self) -> Vec<String> {
        self.leaves()
            .into_iter()
            .map(|i| {
                self.nodes[i]
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("t{}", i))
            })
            .collect()
    }

    /// Metadata value `key` for every leaf, as `(taxon, value)` pairs.
    pub fn leaf_metadata(&self, key: &str) -> Vec<(String, String)> {
        let names = self.taxa_names();
        self.leaves()
            .into_iter()
            .zip(names)
            .filter_map(|(i, name)| self.nodes[i].metadata.get(key).map(|v| (name, v.clone())))
            .collect()
    }

    /// Renders the tree in Newick format with branch lengths.
    pub fn to_newick(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root() {
            self.write_newick(root, &mut out);
        }
        out.push(';');
        out
    }

    fn write_newick(&self, index: usize, out: &mut String) {
        let children = self.children(index);
        if !children.is_empty() {
            out.push('(');
            for (k, child) in children.iter().enumerate() {
                if k > 0 {
                    out.push(',');
                }
                self.write_newick(*child, out);
            }
            out.push(')');
        }
        let node = &self.nodes[index];
        match &node.name {
            Some(name) => out.push_str(name),
            None if children.is_empty() => out.push_str(&format!("t{}", index)),
            None => {}
        }
        let branch = node
            .parent
            .map(|p| self.nodes[p].height - node.height)
            .unwrap_or(0.0);
        out.push(':');
        out.push_str(&format!("{}", branch));
    }
}

/// A multiple sequence alignment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alignment {
    pub taxa: Vec<String>,
    pub sequences: Vec<String>,
    pub sequence_type: SequenceType,
}

impl Alignment {
    pub fn ntaxa(&self) -> usize {
        self.taxa.len()
    }

    pub fn nchar(&self) -> usize {
        self.sequences.first().map(|s| s.chars().count()).unwrap_or(0)
    }
}

/// Semantic content of a value node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value"))]
pub enum Payload {
    Real(f64),
    Integer(i64),
    Boolean(bool),
    RealArray(Vec<f64>),
    IntegerArray(Vec<i64>),
    BooleanArray(Vec<bool>),
    RealMatrix(Vec<Vec<f64>>),
    Text(String),
    TextArray(Vec<String>),
    Map(BTreeMap<String, String>),
    Taxa(Vec<String>),
    SequenceType(SequenceType),
    Tree(TimeTree),
    Alignment(Alignment),
    Compound(Vec<Payload>),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Real(_) => PayloadKind::Real,
            Payload::Integer(_) => PayloadKind::Integer,
            Payload::Boolean(_) => PayloadKind::Boolean,
            Payload::RealArray(_) => PayloadKind::RealArray,
            Payload::IntegerArray(_) => PayloadKind::IntegerArray,
            Payload::BooleanArray(_) => PayloadKind::BooleanArray,
            Payload::RealMatrix(_) => PayloadKind::RealMatrix,
            Payload::Text(_) => PayloadKind::Text,
            Payload::TextArray(_) => PayloadKind::TextArray,
            Payload::Map(_) => PayloadKind::Map,
            Payload::Taxa(_) => PayloadKind::Taxa,
            Payload::SequenceType(_) => PayloadKind::SequenceType,
            Payload::Tree(_) => PayloadKind::Tree,
            Payload::Alignment(_) => PayloadKind::Alignment,
            Payload::Compound(_) => PayloadKind::Compound,
        }
    }

    /// Number of scalar slots (or tree nodes) the payload occupies.
    pub fn dimension(&self) -> usize {
        match self {
            Payload::RealArray(v) => v.len(),
            Payload::IntegerArray(v) => v.len(),
            Payload::BooleanArray(v) => v.len(),
            Payload::RealMatrix(rows) => rows.iter().map(Vec::len).sum(),
            Payload::TextArray(v) => v.len(),
            Payload::Taxa(v) => v.len(),
            Payload::Tree(t) => t.nodes.len(),
            Payload::Alignment(a) => a.ntaxa(),
            Payload::Compound(items) => items.len(),
            _ => 1,
        }
    }

    /// Numeric view of a scalar or array payload.
    pub fn as_reals(&self) -> Option<Vec<f64>> {
        match self {
            Payload::Real(x) => Some(vec![*x]),
            Payload::Integer(x) => Some(vec![*x as f64]),
            Payload::RealArray(v) => Some(v.clone()),
            Payload::IntegerArray(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Payload::RealMatrix(rows) => Some(rows.iter().flatten().copied().collect()),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Payload::Real(x) => Some(*x),
            Payload::Integer(x) => Some(*x as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Payload::Integer(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Payload::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_texts(&self) -> Option<&[String]> {
        match self {
            Payload::TextArray(v) | Payload::Taxa(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&TimeTree> {
        match self {
            Payload::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_alignment(&self) -> Option<&Alignment> {
        match self {
            Payload::Alignment(a) => Some(a),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_taxon_tree() -> TimeTree {
        TimeTree::new(vec![
            TreeNode::internal(2.0, None),
            TreeNode::internal(1.0, Some(0)),
            TreeNode::leaf("A", 0.0, 1),
            TreeNode::leaf("B", 0.0, 1),
            TreeNode::leaf("C", 0.5, 0),
        ])
        .unwrap()
    }

    #[test]
    fn tree_counts_and_newick() {
        let tree = three_taxon_tree();
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.internal_node_count(), 2);
        assert_eq!(tree.root_height(), 2.0);
        assert_eq!(tree.taxa_names(), vec!["A", "B", "C"]);
        assert_eq!(tree.to_newick(), "((A:1,B:1):1,C:1.5):0;");
    }

    #[test]
    fn tree_validation_rejects_two_roots() {
        let err = TimeTree::new(vec![
            TreeNode::internal(1.0, None),
            TreeNode::internal(1.0, None),
        ])
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidTree(_)));
    }

    #[test]
    fn tree_validation_rejects_cycles() {
        let tree = TimeTree {
            nodes: vec![
                TreeNode::internal(1.0, None),
                TreeNode::internal(1.0, Some(2)),
                TreeNode::internal(1.0, Some(1)),
            ],
        };
        assert!(tree.validate().is_err());
    }

    #[test]
    fn leaf_metadata_is_keyed_by_taxon() {
        let tree = TimeTree::new(vec![
            TreeNode::internal(1.0, None),
            TreeNode::leaf("A", 0.0, 0).with_metadata("deme", "X"),
            TreeNode::leaf("B", 0.0, 0).with_metadata("deme", "Y"),
        ])
        .unwrap();
        assert_eq!(
            tree.leaf_metadata("deme"),
            vec![("A".into(), "X".into()), ("B".into(), "Y".into())]
        );
    }

    #[test]
    fn payload_dimensions() {
        assert_eq!(Payload::Real(1.0).dimension(), 1);
        assert_eq!(Payload::RealArray(vec![0.1; 4]).dimension(), 4);
        assert_eq!(Payload::RealMatrix(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).dimension(), 4);
        assert_eq!(Payload::IntegerArray(vec![1, 2]).as_reals(), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn sequence_type_keys() {
        assert_eq!(SequenceType::Nucleotide.key(), "nucleotide");
        assert_eq!(SequenceType::Standard { states: 3 }.state_count(), Some(3));
        assert_eq!(SequenceType::Other("codon".into()).key(), "codon");
    }
}
