use {
    crate::{
        ast::VarType,
        error::{CompileError, SemanticError},
    },
    tracing::debug,
};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Shape {
    Scalar,
    Array(u32),

    /// An array passed in as a parameter. Its slot holds the address of the caller's array.
    ArrayParam,
}

impl Shape {
    pub fn is_array(&self) -> bool {
        !matches!(self, Shape::Scalar)
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum SymbolKind {
    Variable,
    Function { param_count: usize },
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct SymbolEntry {
    pub name: String,
    pub kind: SymbolKind,
    pub var_type: VarType,
    pub scope: usize,
    pub shape: Shape,
    pub offset: i32,
    pub initialized: bool,
}

impl SymbolEntry {
    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { .. })
    }

    pub fn is_global(&self) -> bool {
        self.scope == 0
    }
}

/// Refers to one entry for as long as its scope is alive.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct SymbolHandle {
    scope: usize,
    index: usize,
}

/// Innermost scope is last. The global scope is pushed on construction and lives for the
/// whole program.
#[derive(Debug)]
pub struct SymbolTableStack {
    scopes: Vec<Vec<SymbolEntry>>,
}

impl Default for SymbolTableStack {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTableStack {
    pub fn new() -> SymbolTableStack {
        SymbolTableStack {
            scopes: vec![vec![]],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(vec![]);
        debug!(depth = self.depth(), "push scope");
    }

    pub fn pop_scope(&mut self) {
        // The global scope is never popped.
        if self.scopes.len() > 1 {
            let scope = self.scopes.pop();
            debug!(depth = self.depth(), released = scope.map_or(0, |s| s.len()), "pop scope");
        }
    }

    fn insert(&mut self, entry: SymbolEntry, line: u32) -> Result<SymbolHandle, CompileError> {
        let scope = self.depth();
        let innermost = &mut self.scopes[scope];

        if innermost.iter().any(|existing| existing.name == entry.name) {
            return Err(CompileError::semantic(line, SemanticError::Duplicate(entry.name)));
        }

        debug!(name = %entry.name, scope, offset = entry.offset, "declare");
        innermost.push(entry);
        Ok(SymbolHandle {
            scope,
            index: innermost.len() - 1,
        })
    }

    pub fn declare_variable(
        &mut self,
        name: &str,
        var_type: VarType,
        shape: Shape,
        offset: i32,
        initialized: bool,
        line: u32,
    ) -> Result<SymbolHandle, CompileError> {
        let entry = SymbolEntry {
            name: String::from(name),
            kind: SymbolKind::Variable,
            var_type,
            scope: self.depth(),
            shape,
            offset,
            initialized,
        };
        self.insert(entry, line)
    }

    /// The parameter count is filled in later with `set_param_count`, once the parameters have
    /// been seen.
    pub fn declare_function(
        &mut self,
        name: &str,
        return_type: VarType,
        line: u32,
    ) -> Result<SymbolHandle, CompileError> {
        let entry = SymbolEntry {
            name: String::from(name),
            kind: SymbolKind::Function { param_count: 0 },
            var_type: return_type,
            scope: self.depth(),
            shape: Shape::Scalar,
            offset: 0,
            initialized: true,
        };
        self.insert(entry, line)
    }

    pub fn set_param_count(&mut self, handle: SymbolHandle, count: usize) {
        if let Some(entry) = self.get_mut(handle) {
            entry.kind = SymbolKind::Function { param_count: count };
        }
    }

    pub fn get(&self, handle: SymbolHandle) -> Option<&SymbolEntry> {
        self.scopes.get(handle.scope).and_then(|scope| scope.get(handle.index))
    }

    pub fn get_mut(&mut self, handle: SymbolHandle) -> Option<&mut SymbolEntry> {
        self.scopes
            .get_mut(handle.scope)
            .and_then(|scope| scope.get_mut(handle.index))
    }

    /// Finds the innermost declaration visible under this name.
    pub fn find(&self, name: &str) -> Option<SymbolHandle> {
        self.scopes.iter().enumerate().rev().find_map(|(scope, entries)| {
            entries
                .iter()
                .position(|entry| entry.name == name)
                .map(|index| SymbolHandle { scope, index })
        })
    }

    pub fn lookup(&self, name: &str, line: u32) -> Result<&SymbolEntry, CompileError> {
        self.find(name)
            .and_then(|handle| self.get(handle))
            .ok_or_else(|| {
                CompileError::semantic(line, SemanticError::Undeclared(String::from(name)))
            })
    }

    pub fn mark_initialized(&mut self, name: &str) {
        if let Some(entry) = self.find(name).and_then(|handle| self.get_mut(handle)) {
            entry.initialized = true;
        }
    }
}
