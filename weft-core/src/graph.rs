//! 引用图校验
//!
//! 用于检测命名引用（例如命名切点之间的引用）中缺失的目标和循环引用。

use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// 引用图校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceGraphError {
    /// 引用了不存在的节点，`chain` 为从起点到缺失节点的完整引用链
    #[error("Undefined reference '{missing}' (reference chain: {})", .chain.join(" -> "))]
    Missing { missing: String, chain: Vec<String> },

    /// 检测到循环引用，`cycle` 首尾为同一节点
    #[error("Circular reference detected: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },
}

/// 校验引用图
///
/// `graph` 的键为节点名，值为该节点引用的其他节点。遍历顺序按节点名排序，
/// 保证同一张图总是报告同一个错误。
pub fn validate_reference_graph(
    graph: &BTreeMap<String, Vec<String>>,
) -> Result<(), ReferenceGraphError> {
    let mut visited = HashSet::new();
    let mut stack = Vec::new();

    for node in graph.keys() {
        if !visited.contains(node.as_str()) {
            visit(node, graph, &mut visited, &mut stack)?;
        }
    }

    Ok(())
}

fn visit(
    node: &str,
    graph: &BTreeMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
) -> Result<(), ReferenceGraphError> {
    visited.insert(node.to_string());
    stack.push(node.to_string());

    if let Some(references) = graph.get(node) {
        for reference in references {
            if !graph.contains_key(reference) {
                let mut chain = stack.clone();
                chain.push(reference.clone());
                return Err(ReferenceGraphError::Missing {
                    missing: reference.clone(),
                    chain,
                });
            }

            if let Some(start) = stack.iter().position(|n| n == reference) {
                let mut cycle = stack[start..].to_vec();
                cycle.push(reference.clone());
                return Err(ReferenceGraphError::Cycle { cycle });
            }

            if !visited.contains(reference.as_str()) {
                visit(reference, graph, visited, stack)?;
            }
        }
    }

    stack.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: Vec<(&str, Vec<&str>)>) -> BTreeMap<String, Vec<String>> {
        edges
            .into_iter()
            .map(|(node, refs)| {
                (
                    node.to_string(),
                    refs.iter().map(|r| r.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_valid_graph() {
        let g = graph(vec![
            ("A->all", vec![]),
            ("A->services", vec!["A->all"]),
            ("B->audited", vec!["A->services", "A->all"]),
        ]);
        assert!(validate_reference_graph(&g).is_ok());
    }

    #[test]
    fn test_missing_reference_reports_chain() {
        let g = graph(vec![("A->outer", vec!["A->inner"]), ("A->inner", vec!["B->gone"])]);

        match validate_reference_graph(&g) {
            Err(ReferenceGraphError::Missing { missing, chain }) => {
                assert_eq!(missing, "B->gone");
                assert_eq!(chain, vec!["A->inner", "B->gone"]);
            }
            other => panic!("expected missing reference, got {:?}", other),
        }
    }

    #[test]
    fn test_two_node_cycle() {
        let g = graph(vec![
            ("A->pointcutA", vec!["A->pointcutB"]),
            ("A->pointcutB", vec!["A->pointcutA"]),
        ]);

        match validate_reference_graph(&g) {
            Err(ReferenceGraphError::Cycle { cycle }) => {
                assert_eq!(cycle, vec!["A->pointcutA", "A->pointcutB", "A->pointcutA"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference() {
        let g = graph(vec![("A->self", vec!["A->self"])]);
        let err = validate_reference_graph(&g).unwrap_err();
        assert_eq!(
            err,
            ReferenceGraphError::Cycle {
                cycle: vec!["A->self".to_string(), "A->self".to_string()]
            }
        );
        assert!(err.to_string().contains("A->self -> A->self"));
    }
}
