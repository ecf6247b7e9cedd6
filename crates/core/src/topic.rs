//! Topic Knowledge Graph
//!
//! A static table of learnable topics connected by prerequisite edges. The
//! graph is built once at startup (from the built-in table or a JSON file)
//! and is never mutated afterwards; the API shares it behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Stable identifier of a topic, e.g. `"javascript-basics"`.
pub type TopicId = String;

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// The fixed set of topic categories. The order of `ALL` is the order of the
/// category slots in every embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[serde(alias = "JavaScript")]
    Javascript,
    #[serde(alias = "CSS")]
    Css,
    #[serde(alias = "React")]
    React,
    #[serde(alias = "TypeScript")]
    Typescript,
    #[serde(alias = "Backend")]
    Backend,
    #[serde(alias = "Databases")]
    Databases,
    #[serde(alias = "Testing")]
    Testing,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Javascript,
        Category::Css,
        Category::React,
        Category::Typescript,
        Category::Backend,
        Category::Databases,
        Category::Testing,
    ];

    /// Position of this category in `ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Javascript => "javascript",
            Category::Css => "css",
            Category::React => "react",
            Category::Typescript => "typescript",
            Category::Backend => "backend",
            Category::Databases => "databases",
            Category::Testing => "testing",
        }
    }

    /// Human-facing name used in reasoning strings.
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Javascript => "JavaScript",
            Category::Css => "CSS",
            Category::React => "React",
            Category::Typescript => "TypeScript",
            Category::Backend => "Backend",
            Category::Databases => "Databases",
            Category::Testing => "Testing",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| ParseEnumError {
                kind: "category",
                value: s.to_string(),
            })
    }
}

/// Difficulty of a topic. The order of `ALL` is the order of the difficulty
/// slots in every embedding, shared with `SkillLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str() == needle)
            .ok_or_else(|| ParseEnumError {
                kind: "difficulty",
                value: s.to_string(),
            })
    }
}

/// A topic as declared in a graph table. Successors are not declared; they
/// are derived from the prerequisite edges when the graph is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDefinition {
    pub id: TopicId,
    pub name: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub prerequisites: Vec<TopicId>,
}

/// A node of the built knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicNode {
    pub id: TopicId,
    pub name: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub estimated_minutes: u32,
    pub prerequisites: Vec<TopicId>,
    pub successors: Vec<TopicId>,
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("duplicate topic id '{0}'")]
    DuplicateId(TopicId),
    #[error("topic '{topic}' lists unknown prerequisite '{prerequisite}'")]
    UnknownPrerequisite { topic: TopicId, prerequisite: TopicId },
    #[error("prerequisite cycle involving topics: {0:?}")]
    Cycle(Vec<TopicId>),
    #[error("failed to read topic graph: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse topic graph: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable arena of topic nodes keyed by id.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    nodes: Vec<TopicNode>,
    by_id: HashMap<TopicId, usize>,
    by_name: HashMap<String, usize>,
}

impl KnowledgeGraph {
    /// A graph with no topics.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds and validates a graph from its definitions.
    pub fn from_nodes(definitions: Vec<TopicDefinition>) -> Result<Self, GraphError> {
        let mut by_id = HashMap::with_capacity(definitions.len());
        for (idx, def) in definitions.iter().enumerate() {
            if by_id.insert(def.id.clone(), idx).is_some() {
                return Err(GraphError::DuplicateId(def.id.clone()));
            }
        }

        let mut successors: Vec<Vec<TopicId>> = vec![Vec::new(); definitions.len()];
        for def in &definitions {
            for prereq in &def.prerequisites {
                let Some(&p) = by_id.get(prereq) else {
                    return Err(GraphError::UnknownPrerequisite {
                        topic: def.id.clone(),
                        prerequisite: prereq.clone(),
                    });
                };
                successors[p].push(def.id.clone());
            }
        }

        check_acyclic(&definitions, &by_id)?;

        let nodes: Vec<TopicNode> = definitions
            .into_iter()
            .zip(successors)
            .map(|(def, successors)| TopicNode {
                id: def.id,
                name: def.name,
                category: def.category,
                difficulty: def.difficulty,
                estimated_minutes: def.estimated_minutes,
                prerequisites: def.prerequisites,
                successors,
            })
            .collect();

        let by_name = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (normalize_name(&node.name), idx))
            .collect();

        Ok(Self {
            nodes,
            by_id,
            by_name,
        })
    }

    /// Loads a graph from a JSON array of topic definitions.
    pub fn from_json_file(path: &Path) -> Result<Self, GraphError> {
        let raw = std::fs::read_to_string(path)?;
        let definitions: Vec<TopicDefinition> = serde_json::from_str(&raw)?;
        Self::from_nodes(definitions)
    }

    /// The built-in web development curriculum.
    pub fn builtin() -> Self {
        Self::from_nodes(builtin_definitions())
            .unwrap_or_else(|e| unreachable!("built-in topic table is invalid: {e}"))
    }

    /// Builds a graph without validation, for exercising tables whose
    /// prerequisites live outside the graph.
    #[cfg(test)]
    pub(crate) fn unchecked(nodes: Vec<TopicNode>) -> Self {
        let by_id = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id.clone(), idx))
            .collect();
        let by_name = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (normalize_name(&node.name), idx))
            .collect();
        Self {
            nodes,
            by_id,
            by_name,
        }
    }

    pub fn get(&self, id: &str) -> Option<&TopicNode> {
        self.by_id.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Maps an id or an exact display name (case-insensitive) to its node.
    pub fn resolve(&self, key: &str) -> Option<&TopicNode> {
        self.get(key.trim()).or_else(|| {
            self.by_name
                .get(&normalize_name(key))
                .map(|&idx| &self.nodes[idx])
        })
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[TopicNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Kahn's algorithm over prerequisite edges; anything left over sits on a cycle.
fn check_acyclic(
    definitions: &[TopicDefinition],
    by_id: &HashMap<TopicId, usize>,
) -> Result<(), GraphError> {
    let mut in_degree: Vec<usize> = definitions.iter().map(|d| d.prerequisites.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); definitions.len()];
    for (idx, def) in definitions.iter().enumerate() {
        for prereq in &def.prerequisites {
            dependents[by_id[prereq]].push(idx);
        }
    }

    let mut queue: VecDeque<usize> = (0..definitions.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();
    let mut visited = HashSet::new();
    while let Some(idx) = queue.pop_front() {
        visited.insert(idx);
        for &next in &dependents[idx] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if visited.len() == definitions.len() {
        return Ok(());
    }
    let stuck = definitions
        .iter()
        .enumerate()
        .filter(|(i, _)| !visited.contains(i))
        .map(|(_, d)| d.id.clone())
        .collect();
    Err(GraphError::Cycle(stuck))
}

fn topic(
    id: &str,
    name: &str,
    category: Category,
    difficulty: Difficulty,
    estimated_minutes: u32,
    prerequisites: &[&str],
) -> TopicDefinition {
    TopicDefinition {
        id: id.to_string(),
        name: name.to_string(),
        category,
        difficulty,
        estimated_minutes,
        prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
    }
}

fn builtin_definitions() -> Vec<TopicDefinition> {
    use Category::*;
    use Difficulty::*;
    vec![
        topic("javascript-basics", "JavaScript Basics", Javascript, Beginner, 120, &[]),
        topic("javascript-dom", "DOM Manipulation", Javascript, Beginner, 90, &["javascript-basics"]),
        topic("javascript-async", "Asynchronous JavaScript", Javascript, Intermediate, 120, &["javascript-basics"]),
        topic("javascript-es6", "Modern JavaScript (ES6+)", Javascript, Intermediate, 90, &["javascript-basics"]),
        topic("css-basics", "CSS Fundamentals", Css, Beginner, 90, &[]),
        topic("css-flexbox", "Flexbox Layout", Css, Intermediate, 60, &["css-basics"]),
        topic("css-grid", "CSS Grid", Css, Intermediate, 60, &["css-basics"]),
        topic("css-responsive", "Responsive Design", Css, Intermediate, 90, &["css-flexbox", "css-grid"]),
        topic("react-basics", "React Fundamentals", React, Intermediate, 150, &["javascript-dom", "javascript-es6"]),
        topic("react-hooks", "React Hooks", React, Intermediate, 120, &["react-basics", "javascript-async"]),
        topic("react-state", "State Management", React, Advanced, 150, &["react-hooks"]),
        topic("react-styling", "Styling React Apps", React, Intermediate, 60, &["react-basics", "css-responsive"]),
        topic("typescript-basics", "TypeScript Basics", Typescript, Intermediate, 120, &["javascript-es6"]),
        topic("typescript-react", "TypeScript with React", Typescript, Advanced, 120, &["typescript-basics", "react-hooks"]),
        topic("node-basics", "Node.js Fundamentals", Backend, Intermediate, 120, &["javascript-async"]),
        topic("node-express", "REST APIs with Express", Backend, Intermediate, 150, &["node-basics"]),
        topic("databases-sql", "SQL Databases", Databases, Intermediate, 120, &["node-express"]),
        topic("databases-nosql", "NoSQL Databases", Databases, Advanced, 120, &["node-express"]),
        topic("testing-jest", "Unit Testing with Jest", Testing, Intermediate, 90, &["javascript-es6"]),
        topic("testing-react", "Testing React Components", Testing, Advanced, 90, &["testing-jest", "react-hooks"]),
    ]
}
