//! Bone hierarchy
//!
//! A [`Skeleton`] is an immutable parent → children relation table rooted at a
//! single bone. The hierarchical bone order (every parent before its children)
//! is computed once at construction and reused; positions and rotations are
//! zipped against it by index everywhere downstream.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::error::TopologyError;

/// Name of the root bone when none is given explicitly
pub const DEFAULT_ROOT: &str = "root";

/// Column order of the HDM05 motion-capture dataset (MESSIF `.data` exports)
pub const HDM05_BONE_ORDER: [&str; 31] = [
    "root",
    "lhipjoint",
    "lfemur",
    "ltibia",
    "lfoot",
    "ltoes",
    "rhipjoint",
    "rfemur",
    "rtibia",
    "rfoot",
    "rtoes",
    "lowerback",
    "upperback",
    "thorax",
    "lowerneck",
    "upperneck",
    "head",
    "lclavicle",
    "lhumerus",
    "lradius",
    "lwrist",
    "lhand",
    "lfingers",
    "lthumb",
    "rclavicle",
    "rhumerus",
    "rradius",
    "rwrist",
    "rhand",
    "rfingers",
    "rthumb",
];

/// Parent → children table of the HDM05 skeleton
const HDM05_RELATIONS: &[(&str, &[&str])] = &[
    ("root", &["lowerback", "lhipjoint", "rhipjoint"]),
    ("lowerback", &["upperback"]),
    ("upperback", &["thorax"]),
    ("thorax", &["lowerneck", "lclavicle", "rclavicle"]),
    ("lowerneck", &["upperneck"]),
    ("upperneck", &["head"]),
    ("lclavicle", &["lhumerus"]),
    ("lhumerus", &["lradius"]),
    ("lradius", &["lwrist"]),
    ("lwrist", &["lhand", "lthumb"]),
    ("lhand", &["lfingers"]),
    ("rclavicle", &["rhumerus"]),
    ("rhumerus", &["rradius"]),
    ("rradius", &["rwrist"]),
    ("rwrist", &["rhand", "rthumb"]),
    ("rhand", &["rfingers"]),
    ("lhipjoint", &["lfemur"]),
    ("lfemur", &["ltibia"]),
    ("ltibia", &["lfoot"]),
    ("lfoot", &["ltoes"]),
    ("rhipjoint", &["rfemur"]),
    ("rfemur", &["rtibia"]),
    ("rtibia", &["rfoot"]),
    ("rfoot", &["rtoes"]),
];

/// Serialized form: root name plus the relation table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonDef {
    #[serde(default = "default_root")]
    pub root: String,
    pub relations: HashMap<String, Vec<String>>,
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}

/// Immutable, validated bone hierarchy
///
/// Cheap to share behind an [`Arc`]; one instance per topology is enough for
/// any number of conversions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SkeletonDef", into = "SkeletonDef")]
pub struct Skeleton {
    root: String,
    relations: HashMap<String, Vec<String>>,
    /// Hierarchical order, root first
    order: Vec<String>,
    /// Bone name -> position in `order`
    index: HashMap<String, usize>,
    /// Index of each bone's parent in `order` (`None` for the root)
    parents: Vec<Option<usize>>,
}

impl Skeleton {
    /// Build a skeleton rooted at [`DEFAULT_ROOT`]
    pub fn new<I, K, C, V>(relations: I) -> Result<Self, TopologyError>
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::with_root(DEFAULT_ROOT, relations)
    }

    /// Build a skeleton rooted at `root`
    ///
    /// Fails when `root` has no entry in the table, when a bone is reachable
    /// twice (cycle or second parent), or when a bone named in the table cannot
    /// be reached from the root.
    pub fn with_root<I, K, C, V>(root: impl Into<String>, relations: I) -> Result<Self, TopologyError>
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let root = root.into();
        let relations: HashMap<String, Vec<String>> = relations
            .into_iter()
            .map(|(parent, children)| {
                (
                    parent.into(),
                    children.into_iter().map(Into::into).collect(),
                )
            })
            .collect();

        if !relations.contains_key(&root) {
            return Err(TopologyError::MissingRoot(root));
        }

        let (order, parents) = traverse(&root, &relations)?;

        let index: HashMap<String, usize> = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        // Anything named in the table must have been visited
        for (parent, children) in &relations {
            for bone in std::iter::once(parent).chain(children) {
                if !index.contains_key(bone) {
                    return Err(TopologyError::Unreachable(bone.clone()));
                }
            }
        }

        tracing::debug!(root = %root, bones = order.len(), "skeleton built");

        Ok(Self {
            root,
            relations,
            order,
            index,
            parents,
        })
    }

    /// Shared HDM05 dataset skeleton (31 bones)
    pub fn hdm05() -> Arc<Skeleton> {
        static HDM05: OnceLock<Arc<Skeleton>> = OnceLock::new();
        HDM05
            .get_or_init(|| {
                let skeleton = Skeleton::new(
                    HDM05_RELATIONS
                        .iter()
                        .map(|(parent, children)| (*parent, children.iter().copied())),
                )
                .unwrap_or_else(|err| unreachable!("built-in HDM05 table is a tree: {err}"));
                Arc::new(skeleton)
            })
            .clone()
    }

    /// Name of the root bone
    pub fn root(&self) -> &str {
        &self.root
    }

    /// All bones in hierarchical order (root first, parents before children)
    pub fn bones(&self) -> &[String] {
        &self.order
    }

    /// Alias of [`Skeleton::bones`]
    pub fn hierarchical_order(&self) -> &[String] {
        &self.order
    }

    /// Ordered children of `bone`; empty for leaves and unknown names
    pub fn children_of(&self, bone: &str) -> &[String] {
        self.relations.get(bone).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parent of `bone`, `None` for the root and unknown names
    pub fn parent_of(&self, bone: &str) -> Option<&str> {
        let index = *self.index.get(bone)?;
        self.parents[index].map(|p| self.order[p].as_str())
    }

    /// Parent index (in hierarchical order) of the bone at `index`
    pub fn parent_index(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    /// Position of `bone` in the hierarchical order
    pub fn index_of(&self, bone: &str) -> Option<usize> {
        self.index.get(bone).copied()
    }

    pub fn contains(&self, bone: &str) -> bool {
        self.index.contains_key(bone)
    }

    /// Number of bones
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Walk the table from `root`, recording the visit order and parent links
///
/// Children are appended to the order when their parent is expanded and the
/// expansion itself is last-in first-out, so the order is deterministic for a
/// given table and a parent always precedes its children.
fn traverse(
    root: &str,
    relations: &HashMap<String, Vec<String>>,
) -> Result<(Vec<String>, Vec<Option<usize>>), TopologyError> {
    let mut order = vec![root.to_string()];
    let mut parents = vec![None];
    let mut seen: HashMap<&str, usize> = HashMap::new();
    seen.insert(root, 0);

    let mut stack = vec![0usize];
    while let Some(current) = stack.pop() {
        let Some(children) = relations.get(order[current].as_str()) else {
            continue;
        };
        for child in children {
            if let Some(&existing) = seen.get(child.as_str()) {
                let parent = order[current].clone();
                return Err(if parents[existing] == Some(current) {
                    TopologyError::DuplicateChild {
                        bone: child.clone(),
                        parent,
                    }
                } else if is_ancestor(existing, current, &parents) {
                    TopologyError::Cycle {
                        bone: child.clone(),
                        parent,
                    }
                } else {
                    let first = parents[existing]
                        .map(|p| order[p].clone())
                        .unwrap_or_else(|| order[current].clone());
                    TopologyError::MultipleParents {
                        bone: child.clone(),
                        first,
                        second: parent,
                    }
                });
            }
            let index = order.len();
            order.push(child.clone());
            parents.push(Some(current));
            seen.insert(child.as_str(), index);
            stack.push(index);
        }
    }

    Ok((order, parents))
}

/// True when `candidate` is `bone` itself or one of its ancestors
fn is_ancestor(candidate: usize, bone: usize, parents: &[Option<usize>]) -> bool {
    let mut cursor = Some(bone);
    while let Some(index) = cursor {
        if index == candidate {
            return true;
        }
        cursor = parents[index];
    }
    false
}

impl TryFrom<SkeletonDef> for Skeleton {
    type Error = TopologyError;

    fn try_from(def: SkeletonDef) -> Result<Self, Self::Error> {
        Skeleton::with_root(def.root, def.relations)
    }
}

impl From<Skeleton> for SkeletonDef {
    fn from(skeleton: Skeleton) -> Self {
        SkeletonDef {
            root: skeleton.root,
            relations: skeleton.relations,
        }
    }
}
