//! Typed target registry.
//!
//! Every tool and component declared in `Keel.toml` gets a typed id when
//! the registry is built. Build graph construction turns names into
//! [`ToolDep`] / [`ComponentDep`] values through the lookup methods here;
//! once the plan exists nothing looks targets up by name again.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::error::BuildError;

/// Dependency on a generator tool. Carries no executable path; that only
/// exists once the bootstrap has produced a `ToolHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ToolDep(usize);

/// Dependency on a declared component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentDep(usize);

impl ToolDep {
    pub fn index(self) -> usize {
        self.0
    }
}

impl ComponentDep {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Any registered target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum TargetId {
    Tool(ToolDep),
    Component(ComponentDep),
}

/// Borrowed view of a registered target.
#[derive(Debug, Clone, Copy)]
pub enum TargetDescriptor<'a> {
    Tool(&'a ToolTarget),
    Component(&'a ComponentTarget),
}

impl<'a> TargetDescriptor<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            TargetDescriptor::Tool(t) => &t.name,
            TargetDescriptor::Component(c) => &c.name,
        }
    }
}

/// How a generator tool is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolSource {
    /// Built from source with the host toolchain.
    Build {
        /// Source directory, relative to the project root
        dir: PathBuf,
        /// Source file patterns, relative to `dir`
        sources: Vec<String>,
        includes: Vec<String>,
        cflags: Vec<String>,
        cxxflags: Vec<String>,
        ldflags: Vec<String>,
        libs: Vec<String>,
    },
    /// Prebuilt executable, by path or PATH lookup.
    Program(PathBuf),
}

/// A generator tool target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolTarget {
    pub name: String,
    pub source: ToolSource,
}

/// One declared interface definition of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceEntry {
    /// Relative to the component dir, or `#`-anchored
    pub path: String,
    pub includes: Vec<String>,
}

/// A component target as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentTarget {
    pub name: String,
    /// Relative to the project root
    pub dir: PathBuf,
    pub sources: Vec<String>,
    pub interfaces: Vec<InterfaceEntry>,
    pub includes: Vec<String>,
    pub uses: Vec<String>,
    /// Generator tool name for this component's interfaces
    pub generator: Option<String>,
    pub defines: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    /// Overrides the profile's `include_defaults`
    pub include_defaults: Option<bool>,
}

/// Registry of all declared targets.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    tools: Vec<ToolTarget>,
    components: Vec<ComponentTarget>,
    tool_names: HashMap<String, ToolDep>,
    component_names: HashMap<String, ComponentDep>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Registering the same name again replaces it.
    pub fn add_tool(&mut self, tool: ToolTarget) -> ToolDep {
        if let Some(&dep) = self.tool_names.get(&tool.name) {
            self.tools[dep.0] = tool;
            return dep;
        }
        let dep = ToolDep(self.tools.len());
        self.tool_names.insert(tool.name.clone(), dep);
        self.tools.push(tool);
        dep
    }

    /// Register a component. Registering the same name again replaces it.
    pub fn add_component(&mut self, component: ComponentTarget) -> ComponentDep {
        if let Some(&dep) = self.component_names.get(&component.name) {
            self.components[dep.0] = component;
            return dep;
        }
        let dep = ComponentDep(self.components.len());
        self.component_names.insert(component.name.clone(), dep);
        self.components.push(component);
        dep
    }

    /// Look up a tool needed by `requested_by`.
    pub fn tool_dep(&self, name: &str, requested_by: &str) -> Result<ToolDep, BuildError> {
        self.tool_names
            .get(name)
            .copied()
            .ok_or_else(|| BuildError::ToolNotFound {
                tool: name.to_string(),
                requested_by: requested_by.to_string(),
            })
    }

    /// Look up a component used by `requested_by`.
    pub fn component_dep(
        &self,
        name: &str,
        requested_by: &str,
    ) -> Result<ComponentDep, BuildError> {
        self.component_names
            .get(name)
            .copied()
            .ok_or_else(|| BuildError::UnknownComponent {
                component: name.to_string(),
                requested_by: requested_by.to_string(),
            })
    }

    pub fn tool(&self, dep: ToolDep) -> &ToolTarget {
        &self.tools[dep.0]
    }

    pub fn component(&self, dep: ComponentDep) -> &ComponentTarget {
        &self.components[dep.0]
    }

    pub fn descriptor(&self, id: TargetId) -> TargetDescriptor<'_> {
        match id {
            TargetId::Tool(dep) => TargetDescriptor::Tool(self.tool(dep)),
            TargetId::Component(dep) => TargetDescriptor::Component(self.component(dep)),
        }
    }

    /// Tools in declaration order.
    pub fn tools(&self) -> impl Iterator<Item = (ToolDep, &ToolTarget)> {
        self.tools.iter().enumerate().map(|(i, t)| (ToolDep(i), t))
    }

    /// Components in declaration order.
    pub fn components(&self) -> impl Iterator<Item = (ComponentDep, &ComponentTarget)> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| (ComponentDep(i), c))
    }

    /// `roots` plus everything they transitively use, in first-visit order.
    pub fn uses_closure(&self, roots: &[ComponentDep]) -> Result<Vec<ComponentDep>, BuildError> {
        let mut seen = Vec::new();
        let mut stack: Vec<ComponentDep> = roots.iter().rev().copied().collect();

        while let Some(dep) = stack.pop() {
            if seen.contains(&dep) {
                continue;
            }
            seen.push(dep);
            let component = self.component(dep);
            for used in component.uses.iter().rev() {
                stack.push(self.component_dep(used, &component.name)?);
            }
        }

        Ok(seen)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetId::Tool(dep) => write!(f, "tool#{}", dep.0),
            TargetId::Component(dep) => write!(f, "component#{}", dep.0),
        }
    }
}
